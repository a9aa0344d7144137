//! SleepLock - pode bloquear o contexto
//!
//! # Diferença do Spinlock
//!
//! - SleepLock PODE ser retido através de I/O síncrono
//! - Spinlock NÃO pode (busy-wait com interrupções desabilitadas)
//!
//! Use SleepLock para posse longa de dados (payload de um buffer de bloco);
//! nunca adquira um SleepLock com um Spinlock retido.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Lock bloqueante: o contexto cede a CPU enquanto espera.
///
/// A espera passa pelo hook [`crate::hal::CpuHal::relax`]: o kernel mapeia
/// para o scheduler, o host para yield de thread.
pub struct SleepLock<T> {
    /// Estado do lock
    locked: AtomicBool,
    /// ID (cpu+1) do dono (para debug; 0 = livre)
    holder: AtomicUsize,
    /// Dados protegidos
    data: UnsafeCell<T>,
}

// SAFETY: SleepLock protege acesso com lock
unsafe impl<T: Send> Send for SleepLock<T> {}
unsafe impl<T: Send> Sync for SleepLock<T> {}

impl<T> SleepLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            holder: AtomicUsize::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// Adquire o lock (pode bloquear)
    pub fn lock(&self) -> SleepLockGuard<'_, T> {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // TODO: estacionar o contexto no scheduler do kernel quando o
            // hook de wait/wakeup existir na HAL; por enquanto, relax().
            crate::hal::cpu().relax();
        }

        self.holder
            .store(crate::hal::current_cpu() + 1, Ordering::Relaxed);

        SleepLockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// O lock está retido (por alguém)?
    ///
    /// A posse em si é garantida estaticamente pelo guard; isto existe para
    /// as verificações de disciplina do cache de blocos.
    pub fn is_held(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Libera o lock. Liberar um lock livre é violação de integridade.
    fn unlock(&self) {
        if !self.locked.load(Ordering::Acquire) {
            crate::kerror!("(SleepLock) release sem posse do lock");
            panic!("sleeplock: release sem posse");
        }
        self.holder.store(0, Ordering::Relaxed);
        self.locked.store(false, Ordering::Release);
    }
}

/// Guard do SleepLock - libera ao sair do escopo.
///
/// Não é `Send`: o contexto que adquiriu é o que libera.
pub struct SleepLockGuard<'a, T> {
    lock: &'a SleepLock<T>,
    _not_send: PhantomData<*mut ()>,
}

impl<T> Deref for SleepLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: Lock está adquirido
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SleepLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: Lock está adquirido
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SleepLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[test]
    fn test_lock_basico() {
        crate::hal::testcpu::install();
        let lock = SleepLock::new([0u8; 8]);
        {
            let mut g = lock.lock();
            g[0] = 7;
            assert!(lock.is_held());
        }
        assert!(!lock.is_held());
        assert_eq!(lock.lock()[0], 7);
    }

    #[test]
    fn test_espera_ate_liberar() {
        crate::hal::testcpu::install();
        let lock = Arc::new(SleepLock::new(0u32));
        let turnos = Arc::new(AtomicU32::new(0));

        let g = lock.lock();
        let l2 = Arc::clone(&lock);
        let t2 = Arc::clone(&turnos);
        let handle = std::thread::spawn(move || {
            crate::hal::testcpu::on_cpu(1);
            let mut g = l2.lock();
            // Só entramos aqui depois que o dono liberar
            assert_eq!(t2.load(Ordering::SeqCst), 1);
            *g = 99;
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        turnos.store(1, Ordering::SeqCst);
        drop(g);

        handle.join().unwrap();
        assert_eq!(*lock.lock(), 99);
    }

    #[test]
    #[should_panic(expected = "sleeplock: release sem posse")]
    fn test_release_sem_posse_e_fatal() {
        crate::hal::testcpu::install();
        let lock = SleepLock::new(());
        // Violação deliberada de disciplina: liberar um lock livre.
        lock.unlock();
    }
}
