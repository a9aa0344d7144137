//! # Synchronization Primitives
//!
//! Primitivas de sincronização para ambiente SMP.
//!
//! ## Hierarquia de Uso
//!
//! ```text
//! Spinlock   → Seções críticas curtas (não pode dormir)
//! SleepLock  → Posse longa de payload (pode bloquear o contexto)
//! ```
//!
//! ## Regras
//!
//! - **Spinlock**: metadados (listas de cores, buckets, registro). Nunca
//!   atravessa I/O nem sleep; desabilita interrupções enquanto retido.
//! - **SleepLock**: payload de buffers do cache. Pode ser retido através de
//!   I/O síncrono; nunca adquirir com um Spinlock retido.
//! - **Ordem de Lock**: sempre adquirir na mesma ordem para evitar deadlock.

// =============================================================================
// PRIMITIVAS
// =============================================================================

/// Spinlock (busy-wait, não dorme)
pub mod spinlock;

/// SleepLock (bloqueia o contexto)
pub mod sleeplock;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use sleeplock::{SleepLock, SleepLockGuard};
pub use spinlock::{Spinlock, SpinlockGuard};
