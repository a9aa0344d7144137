//! Hardware Abstraction Layer (HAL)
//!
//! Uma biblioteca de subsistemas não enxerga hardware diretamente: o kernel
//! registra aqui a implementação de [`CpuHal`] no boot, antes de inicializar
//! PMM ou cache de blocos. Sem registro, um fallback single-core mantém o
//! crate funcional (e os locks corretos) em ambientes de um núcleo só.

pub mod traits;

pub use traits::CpuHal;

use core::sync::atomic::{AtomicBool, Ordering};
use spin::Once;

static CPU_HAL: Once<&'static dyn CpuHal> = Once::new();

/// Registra a HAL de CPU. Chamadas subsequentes são ignoradas.
pub fn install_cpu(hal: &'static dyn CpuHal) {
    CPU_HAL.call_once(|| hal);
}

/// HAL ativa (a registrada, ou o fallback single-core).
pub fn cpu() -> &'static dyn CpuHal {
    match CPU_HAL.get() {
        Some(hal) => *hal,
        None => &NULL_CPU,
    }
}

// =============================================================================
// SEÇÕES CRÍTICAS DE INTERRUPÇÃO
// =============================================================================

/// Guard de interrupções: desabilita na criação, restaura no drop.
///
/// Equivalente estruturado do par push_off/pop_off: aninhamentos funcionam
/// porque cada guard interno observa "já desabilitado" e restaura para
/// desabilitado.
pub struct IrqGuard {
    were_enabled: bool,
}

/// Desabilita interrupções e devolve o guard que as restaura.
pub fn irq_save() -> IrqGuard {
    let hal = cpu();
    let were_enabled = hal.interrupts_enabled();
    hal.disable_interrupts();
    IrqGuard { were_enabled }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            cpu().enable_interrupts();
        }
    }
}

/// ID da CPU atual, amostrado com interrupções desabilitadas.
///
/// Sem o guard, uma preempção entre ler o ID e usá-lo migraria a operação
/// para a lista/cache do core errado.
pub fn current_cpu() -> usize {
    let _guard = irq_save();
    cpu().id()
}

// =============================================================================
// FALLBACK SINGLE-CORE
// =============================================================================

/// Fallback usado antes de `install_cpu`: um core, flag de interrupção
/// apenas modelada (não há hardware para mascarar).
struct NullCpu;

static NULL_IRQ_ON: AtomicBool = AtomicBool::new(true);

static NULL_CPU: NullCpu = NullCpu;

impl CpuHal for NullCpu {
    fn id(&self) -> usize {
        0
    }

    fn count(&self) -> usize {
        1
    }

    fn interrupts_enabled(&self) -> bool {
        NULL_IRQ_ON.load(Ordering::Relaxed)
    }

    fn disable_interrupts(&self) {
        NULL_IRQ_ON.store(false, Ordering::Relaxed);
    }

    fn enable_interrupts(&self) {
        NULL_IRQ_ON.store(true, Ordering::Relaxed);
    }
}

// =============================================================================
// MOCK DE TESTE
// =============================================================================

/// HAL de teste: ID de CPU por thread, flag de interrupção por thread.
///
/// Os testes de concorrência fixam o "core" de cada thread com `on_cpu`,
/// reproduzindo cenários SMP num processo de host.
#[cfg(test)]
pub(crate) mod testcpu {
    use super::CpuHal;
    use std::cell::Cell;

    pub const TEST_CPUS: usize = 4;

    thread_local! {
        static CPU_ID: Cell<usize> = const { Cell::new(0) };
        static IRQ_ON: Cell<bool> = const { Cell::new(true) };
    }

    pub struct TestCpu;

    pub static TEST_CPU: TestCpu = TestCpu;

    impl CpuHal for TestCpu {
        fn id(&self) -> usize {
            CPU_ID.with(|c| c.get())
        }

        fn count(&self) -> usize {
            TEST_CPUS
        }

        fn interrupts_enabled(&self) -> bool {
            IRQ_ON.with(|c| c.get())
        }

        fn disable_interrupts(&self) {
            IRQ_ON.with(|c| c.set(false));
        }

        fn enable_interrupts(&self) {
            IRQ_ON.with(|c| c.set(true));
        }

        fn relax(&self) {
            std::thread::yield_now();
        }
    }

    /// Instala o mock (idempotente; compartilhado por todos os testes).
    pub fn install() {
        super::install_cpu(&TEST_CPU);
    }

    /// Fixa o "core" da thread atual.
    pub fn on_cpu(id: usize) {
        CPU_ID.with(|c| c.set(id % TEST_CPUS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irq_guard_restaura() {
        testcpu::install();
        assert!(cpu().interrupts_enabled());
        {
            let _g = irq_save();
            assert!(!cpu().interrupts_enabled());
            {
                let _g2 = irq_save();
                assert!(!cpu().interrupts_enabled());
            }
            // Guard aninhado não reabilita antes da hora
            assert!(!cpu().interrupts_enabled());
        }
        assert!(cpu().interrupts_enabled());
    }

    #[test]
    fn test_current_cpu_segue_thread() {
        testcpu::install();
        testcpu::on_cpu(2);
        assert_eq!(current_cpu(), 2);

        let handle = std::thread::spawn(|| {
            testcpu::on_cpu(1);
            current_cpu()
        });
        assert_eq!(handle.join().unwrap(), 1);
    }
}
