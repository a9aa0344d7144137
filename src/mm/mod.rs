//! # Memory Management Subsystem (MM)
//!
//! O módulo `mm` gerencia a percepção que o kernel tem da memória física.
//!
//! ## 🏗️ Arquitetura dos Módulos
//!
//! | Módulo   | Responsabilidade                                   | Estado |
//! |----------|----------------------------------------------------|--------|
//! | `pmm`    | Frames físicos (4KiB) em listas por-core + steal.  | **Funcional** |
//! | `heap`   | Alocador dinâmico (`Box`, `Vec`, `Arc`).           | **Funcional** (linked_list_allocator) |
//! | `addr`   | Wrapper type-safe de endereço físico.              | **Estável** |
//! | `config` | Constantes (PAGE_SIZE, padrões de lixo, SMP).      | **Estável** |
//!
//! ## Ordem de Inicialização
//!
//! ```text
//! hal::install_cpu  ──▶ identidade de core disponível
//!  │
//!  ▼
//! pmm::init         ──▶ particiona o intervalo livre entre os cores
//!  │
//!  ▼
//! heap::init        ──▶ Arc/Vec funcionam (registro de devices, etc)
//! ```
//!
//! ❗ O PMM consulta `hal::cpu().count()` no init: a HAL vem primeiro.
//! ❗ A ordem NÃO é opcional.

pub mod addr;
pub mod config;
pub mod heap;
pub mod pmm;

#[cfg(feature = "self_test")]
pub mod test;

pub use addr::PhysAddr;
pub use pmm::PhysFrame;
