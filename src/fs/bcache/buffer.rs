//! Slot de buffer do cache de blocos.
//!
//! Cada slot guarda a cópia em memória de UM bloco de disco mais os
//! metadados de arbitragem. A disciplina de acesso tem três camadas:
//!
//! - **payload**: só com o [`SleepLock`] do slot retido (lock bloqueante,
//!   pode atravessar I/O síncrono);
//! - **metadados** (chave, flags, refcnt, stamp): mutados sob o lock do
//!   bucket dono (ou pool+bucket durante migração), mas armazenados como
//!   atômicos porque o scan global de eviction os LÊ sem lock e re-verifica
//!   depois sob lock;
//! - **link de cadeia** (`next`): exclusivamente sob o lock do bucket dono.

use crate::drivers::block::BLOCK_SIZE;
use crate::sync::{SleepLock, SleepLockGuard};
use bitflags::bitflags;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

bitflags! {
    /// Estado de um buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufFlags: u8 {
        /// Conteúdo reflete o disco
        const VALID = 1 << 0;
        /// Modificado em memória e ainda não escrito
        const DIRTY = 1 << 1;
    }
}

/// Empacota `(dev, blockno)` numa palavra atômica única.
#[inline]
pub(super) const fn pack_key(dev: u32, blockno: u32) -> u64 {
    ((dev as u64) << 32) | blockno as u64
}

/// Desempacota a chave para logs e verificações.
#[inline]
pub(super) const fn unpack_key(key: u64) -> (u32, u32) {
    ((key >> 32) as u32, key as u32)
}

/// Fim de cadeia de bucket
pub(super) const NIL: u32 = u32::MAX;

/// Um slot fixo do pool de buffers.
pub(super) struct BufSlot {
    /// Chave `(dev << 32) | blockno`
    key: AtomicU64,
    /// Bits de [`BufFlags`]
    flags: AtomicU8,
    /// Referências ativas (holders + pins)
    refcnt: AtomicU32,
    /// Tick lógico do último release que zerou o refcnt
    stamp: AtomicU64,
    /// Próximo slot na cadeia do bucket dono
    next: UnsafeCell<u32>,
    /// Payload do bloco
    data: SleepLock<[u8; BLOCK_SIZE]>,
}

// SAFETY: `next` só é tocado sob o lock do bucket dono (pool+bucket na
// migração); o resto é atômico ou protegido pelo SleepLock.
unsafe impl Sync for BufSlot {}

impl BufSlot {
    pub(super) const fn new() -> Self {
        Self {
            key: AtomicU64::new(0),
            flags: AtomicU8::new(0),
            refcnt: AtomicU32::new(0),
            stamp: AtomicU64::new(0),
            next: UnsafeCell::new(NIL),
            data: SleepLock::new([0; BLOCK_SIZE]),
        }
    }

    // --- chave -------------------------------------------------------------

    pub(super) fn key(&self) -> u64 {
        self.key.load(Ordering::Relaxed)
    }

    /// Chamador retém o lock do bucket dono (e o do pool, na migração).
    pub(super) fn set_key(&self, key: u64) {
        self.key.store(key, Ordering::Relaxed);
    }

    // --- flags -------------------------------------------------------------

    pub(super) fn flags(&self) -> BufFlags {
        BufFlags::from_bits_truncate(self.flags.load(Ordering::Relaxed))
    }

    pub(super) fn clear_flags(&self) {
        self.flags.store(0, Ordering::Relaxed);
    }

    pub(super) fn insert_flags(&self, f: BufFlags) {
        self.flags.fetch_or(f.bits(), Ordering::Relaxed);
    }

    pub(super) fn remove_flags(&self, f: BufFlags) {
        self.flags.fetch_and(!f.bits(), Ordering::Relaxed);
    }

    // --- refcnt / stamp ----------------------------------------------------

    pub(super) fn refcnt(&self) -> u32 {
        self.refcnt.load(Ordering::Relaxed)
    }

    /// Chamador retém o lock do bucket dono.
    pub(super) fn refcnt_inc(&self) {
        self.refcnt.fetch_add(1, Ordering::Relaxed);
    }

    /// Retorna o valor ANTERIOR. Chamador retém o lock do bucket dono.
    pub(super) fn refcnt_dec(&self) -> u32 {
        self.refcnt.fetch_sub(1, Ordering::Relaxed)
    }

    /// Chamador retém pool+bucket e verificou refcnt==0.
    pub(super) fn refcnt_set(&self, v: u32) {
        self.refcnt.store(v, Ordering::Relaxed);
    }

    pub(super) fn stamp(&self) -> u64 {
        self.stamp.load(Ordering::Relaxed)
    }

    /// Chamador retém o lock do bucket dono.
    pub(super) fn set_stamp(&self, t: u64) {
        self.stamp.store(t, Ordering::Relaxed);
    }

    // --- cadeia ------------------------------------------------------------

    /// # Safety
    ///
    /// Chamador retém o lock do bucket que contém este slot.
    pub(super) unsafe fn next(&self) -> u32 {
        *self.next.get()
    }

    /// # Safety
    ///
    /// Chamador retém o lock do bucket que contém (ou vai conter) este slot.
    pub(super) unsafe fn set_next(&self, n: u32) {
        *self.next.get() = n;
    }

    // --- payload -----------------------------------------------------------

    /// Adquire o lock de exclusividade do payload (pode bloquear).
    pub(super) fn lock_data(&self) -> SleepLockGuard<'_, [u8; BLOCK_SIZE]> {
        self.data.lock()
    }

    /// O lock de exclusividade está retido?
    pub(super) fn data_is_held(&self) -> bool {
        self.data.is_held()
    }
}
