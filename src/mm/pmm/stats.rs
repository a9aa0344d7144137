use core::sync::atomic::{AtomicUsize, Ordering};

/// Contadores do PMM (relaxed: são diagnóstico, não sincronização)
#[derive(Debug, Default)]
pub struct PmmStats {
    pub total_frames: AtomicUsize,
    pub used_frames: AtomicUsize,
    pub steals: AtomicUsize,
    pub failed_allocs: AtomicUsize,
}

impl PmmStats {
    pub const fn new() -> Self {
        Self {
            total_frames: AtomicUsize::new(0),
            used_frames: AtomicUsize::new(0),
            steals: AtomicUsize::new(0),
            failed_allocs: AtomicUsize::new(0),
        }
    }

    pub fn inc_alloc(&self) {
        self.used_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_free(&self) {
        self.used_frames.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn inc_steal(&self) {
        self.steals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.failed_allocs.fetch_add(1, Ordering::Relaxed);
    }
}
