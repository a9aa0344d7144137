//! Fornalha - Núcleo de Recursos do Brasa OS.
//!
//! Ponto central de exportação dos gerenciadores de recursos do kernel:
//! o alocador de páginas físicas (PMM por-core) e o cache de blocos.
//! O binário de boot do kernel embute este crate e registra a HAL real;
//! em testes de host a HAL é mockada e o harness padrão do Rust roda.

#![cfg_attr(not(test), no_std)]

// Habilitar alocação dinâmica (necessário para Vec/Arc no registro de devices)
extern crate alloc;

// --- Módulos de Baixo Nível (Hardware) ---
pub mod hal; // Primitivas consumidas (CPU id, interrupções)
pub mod drivers; // Dispositivos de bloco (trait + ramdisk)

// --- Módulos Centrais (Lógica do Kernel) ---
pub mod core; // Logging
pub mod mm; // Gerenciamento de Memória Física (PMM, Heap)
pub mod sync; // Primitivas de Sincronização (Spinlock, SleepLock)

// --- Subsistemas ---
pub mod fs; // Cache de blocos (camada abaixo do filesystem)
