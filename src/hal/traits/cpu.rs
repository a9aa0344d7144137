//! Trait de CPU
//!
//! Abstrai as primitivas de identidade e de controle de interrupção que os
//! gerenciadores de recursos consomem. O kernel que embute o crate registra
//! a implementação real (APIC/GS no x86_64, MPIDR no aarch64); os testes de
//! host registram um mock por-thread.

/// Abstração de CPU
pub trait CpuHal: Send + Sync {
    /// Retorna ID da CPU atual.
    ///
    /// Só é estável enquanto interrupções estiverem desabilitadas: use
    /// [`crate::hal::current_cpu`] para amostrar sem corrida com preempção.
    fn id(&self) -> usize;

    /// Número de CPUs online (limitado por `MAX_CPUS`)
    fn count(&self) -> usize;

    /// Interrupções habilitadas nesta CPU?
    fn interrupts_enabled(&self) -> bool;

    /// Desabilita interrupções
    fn disable_interrupts(&self);

    /// Habilita interrupções
    fn enable_interrupts(&self);

    /// Hint de espera em loops de contenção.
    ///
    /// Locks bloqueantes chamam isto enquanto esperam; o kernel pode mapear
    /// para yield do scheduler, o default é apenas o hint de spin da CPU.
    fn relax(&self) {
        core::hint::spin_loop();
    }
}
