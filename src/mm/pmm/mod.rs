//! # PMM - Physical Memory Manager
//!
//! Gerencia alocação de frames físicos em listas por-core.

pub mod frame;
pub mod percore;
pub mod stats;

pub use frame::PhysFrame;
pub use percore::PerCoreFrameAllocator;
pub use stats::PmmStats;

/// Tamanho de um frame (4KB)
pub const FRAME_SIZE: usize = crate::mm::config::PAGE_SIZE;

/// Alocador global de frames físicos
pub static FRAME_ALLOCATOR: PerCoreFrameAllocator = PerCoreFrameAllocator::new();

/// Atalho para inicializar o PMM
///
/// # Safety
///
/// Ver [`PerCoreFrameAllocator::init`].
pub unsafe fn init(base: *mut u8, size: usize) {
    FRAME_ALLOCATOR.init(base, size);
}

/// Aloca um frame do pool global
pub fn alloc_page() -> Option<PhysFrame> {
    FRAME_ALLOCATOR.allocate()
}

/// Devolve um frame ao pool global
///
/// # Safety
///
/// Ver [`PerCoreFrameAllocator::free`].
pub unsafe fn free_page(frame: PhysFrame) {
    FRAME_ALLOCATOR.free(frame)
}
