//! Kernel Heap Allocator.
//!
//! Implementa `GlobalAlloc` sobre o `Heap` do `linked_list_allocator`,
//! permitindo `Box`/`Vec`/`Arc` no kernel (o registro de dispositivos de
//! bloco precisa de `Arc`). O kernel inicializa com uma região já mapeada.
//!
//! Em testes de host o allocator global é o da std; a struct continua
//! testável isoladamente.

use crate::sync::Spinlock;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;
use linked_list_allocator::Heap;

pub struct LockedHeap {
    inner: Spinlock<Heap>,
}

impl LockedHeap {
    pub const fn empty() -> Self {
        Self {
            inner: Spinlock::new(Heap::empty()),
        }
    }

    /// # Safety
    ///
    /// `start..start+size` deve ser memória mapeada, exclusiva do heap e
    /// válida pelo resto da vida do kernel.
    pub unsafe fn init(&self, start: usize, size: usize) {
        self.inner.lock().init(start as *mut u8, size);
        crate::kinfo!("(Heap) Inicializado: {} KiB em {:#x}", size / 1024, start);
    }
}

unsafe impl GlobalAlloc for LockedHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.inner
            .lock()
            .allocate_first_fit(layout)
            .map(|p| p.as_ptr())
            .unwrap_or(core::ptr::null_mut())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            self.inner.lock().deallocate(ptr, layout);
        }
    }
}

/// Allocator global do kernel (fora de testes: a std é dona do heap lá)
#[cfg(not(test))]
#[global_allocator]
pub static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Atalho para inicializar o heap do kernel
///
/// # Safety
///
/// Ver [`LockedHeap::init`].
#[cfg(not(test))]
pub unsafe fn init(start: usize, size: usize) {
    ALLOCATOR.init(start, size);
}
