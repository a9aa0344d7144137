//! # Alocador de Frames Por-Core
//!
//! Gerencia a memória física em listas de frames livres, uma por core.
//!
//! ## 🎯 Propósito
//!
//! Um lock global no alocador de páginas vira o ponto de contenção número
//! um de um kernel SMP: toda criação de processo, page table e pipe passa
//! por aqui. Com uma lista (e um lock) por core, o caminho comum não
//! disputa nada com os outros cores.
//!
//! ## 🏗️ Arquitetura
//!
//! ```text
//! core 0: Spinlock → [frame 12] → [frame 8] → [frame 4] → ∅
//! core 1: Spinlock → [frame 13] → [frame 9] → ∅
//! ...
//! ```
//!
//! - A lista é intrusiva e por índice: os 4 primeiros bytes de uma página
//!   LIVRE guardam o índice do próximo frame livre (nada de aritmética de
//!   ponteiro encadeada).
//! - `allocate()` tira da lista do core corrente; se vazia, ROUBA
//!   exatamente um frame de outro core (work stealing) e re-alimenta a
//!   lista local. Nunca retemos dois locks de core simultaneamente.
//! - `free()` devolve para a lista do core que liberou (não a de origem):
//!   localidade natural, o frame quente fica onde foi usado.
//!
//! ## Invariantes
//!
//! - Todo frame do intervalo gerenciado está OU em exatamente uma lista
//!   OU em posse de quem alocou. Nunca em duas listas.
//! - Página livre = preenchida com `JUNK_FREE` (fora o link); página
//!   recém-alocada = preenchida com `JUNK_ALLOC`.
//! - `free()` de endereço desalinhado ou fora do intervalo é FATAL:
//!   aceitar corromperia o pool silenciosamente.

use super::frame::PhysFrame;
use super::stats::PmmStats;
use crate::mm::addr::PhysAddr;
use crate::mm::config::{is_aligned, JUNK_ALLOC, JUNK_FREE, MAX_CPUS, PAGE_SIZE};
use crate::sync::Spinlock;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Índice sentinela: fim de lista
const NIL: u32 = u32::MAX;

// =============================================================================
// LISTA LIVRE DE UM CORE
// =============================================================================

/// Cabeça da lista intrusiva de frames livres de um core.
struct CoreList {
    head: u32,
    len: usize,
}

impl CoreList {
    const fn new() -> Self {
        Self { head: NIL, len: 0 }
    }

    /// Empilha o frame `idx`.
    ///
    /// # Safety
    ///
    /// Chamador retém o lock desta lista; a página `idx` está livre e é
    /// exclusiva do pool (ninguém mais escreve nela).
    unsafe fn push(&mut self, base: usize, idx: u32) {
        link_slot(base, idx).write(self.head);
        self.head = idx;
        self.len += 1;
    }

    /// Desempilha um frame, se houver.
    ///
    /// # Safety
    ///
    /// Chamador retém o lock desta lista.
    unsafe fn pop(&mut self, base: usize) -> Option<u32> {
        if self.head == NIL {
            return None;
        }
        let idx = self.head;
        self.head = link_slot(base, idx).read();
        self.len -= 1;
        Some(idx)
    }
}

/// Campo de link intrusivo: primeiros 4 bytes de uma página livre.
///
/// # Safety
///
/// `idx` deve estar dentro do intervalo gerenciado.
unsafe fn link_slot(base: usize, idx: u32) -> *mut u32 {
    (base + idx as usize * PAGE_SIZE) as *mut u32
}

/// Preenche a página inteira com o padrão de lixo.
///
/// Escrita volátil (como o memset do boot): o padrão é diagnóstico, o
/// otimizador não pode elidi-lo.
///
/// # Safety
///
/// A página deve pertencer ao pool e não pode ter outro dono ativo.
unsafe fn fill_page(base: usize, idx: u32, pattern: u8) {
    let word = u64::from_ne_bytes([pattern; 8]);
    let ptr = (base + idx as usize * PAGE_SIZE) as *mut u64;
    let mut i = 0;
    while i < PAGE_SIZE / 8 {
        core::ptr::write_volatile(ptr.add(i), word);
        i += 1;
    }
}

// =============================================================================
// ALOCADOR
// =============================================================================

/// PerCoreFrameAllocator - listas livres por core com work stealing.
pub struct PerCoreFrameAllocator {
    /// Base do intervalo gerenciado (0 = não inicializado)
    base: AtomicUsize,
    /// Número de frames gerenciados
    nframes: AtomicUsize,
    /// Número de cores entre os quais o pool foi particionado
    ncores: AtomicUsize,
    /// Uma célula independentemente lockável por core
    cores: [Spinlock<CoreList>; MAX_CPUS],
    /// Estatísticas
    stats: PmmStats,
}

impl PerCoreFrameAllocator {
    pub const fn new() -> Self {
        const EMPTY: Spinlock<CoreList> = Spinlock::new(CoreList::new());
        Self {
            base: AtomicUsize::new(0),
            nframes: AtomicUsize::new(0),
            ncores: AtomicUsize::new(0),
            cores: [EMPTY; MAX_CPUS],
            stats: PmmStats::new(),
        }
    }

    /// Inicializa o alocador com o intervalo `[base, base+size)`.
    ///
    /// Chamado uma vez no boot, depois de `hal::install_cpu`. Base
    /// desalinhada, intervalo vazio ou init duplicado são FATAIS.
    ///
    /// # Safety
    ///
    /// O intervalo deve ser memória mapeada, livre, e exclusiva do pool.
    pub unsafe fn init(&self, base: *mut u8, size: usize) {
        crate::kinfo!("(PMM) Inicializando alocador por-core...");

        if base.is_null() || !is_aligned(base as usize, PAGE_SIZE) {
            crate::kerror!("(PMM) base desalinhada: {:p}", base);
            panic!("pmm: base desalinhada");
        }
        let nframes = size / PAGE_SIZE;
        if nframes == 0 {
            crate::kerror!("(PMM) intervalo vazio ({} bytes)", size);
            panic!("pmm: intervalo vazio");
        }
        if self
            .base
            .compare_exchange(0, base as usize, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            crate::kerror!("(PMM) init duplicado");
            panic!("pmm: init duplicado");
        }

        let ncores = crate::hal::cpu().count().clamp(1, MAX_CPUS);
        self.ncores.store(ncores, Ordering::Release);
        self.nframes.store(nframes, Ordering::Release);
        self.stats.total_frames.store(nframes, Ordering::Relaxed);

        // Particiona round-robin: cada core começa com ~nframes/ncores.
        // O stealing corrige qualquer desequilíbrio em runtime.
        for idx in 0..nframes as u32 {
            fill_page(base as usize, idx, JUNK_FREE);
            let core = idx as usize % ncores;
            self.cores[core].lock().push(base as usize, idx);
        }

        crate::kinfo!(
            "(PMM) {} frames ({} KiB) distribuídos entre {} cores",
            nframes,
            nframes * PAGE_SIZE / 1024,
            ncores
        );
    }

    /// Aloca um frame de 4KiB.
    ///
    /// Retorna `None` apenas quando TODAS as listas estão vazias: condição
    /// recuperável, quem decide se OOM é fatal é o chamador.
    pub fn allocate(&self) -> Option<PhysFrame> {
        let base = self.base.load(Ordering::Acquire);
        if base == 0 {
            crate::kerror!("(PMM) allocate antes de init");
            panic!("pmm: allocate antes de init");
        }
        let ncores = self.ncores.load(Ordering::Acquire);

        // Identidade do core amostrada com interrupções desabilitadas:
        // uma migração no meio da operação usaria a lista errada.
        let me = crate::hal::current_cpu() % ncores;

        // Caminho rápido: lista local, lock local, zero contenção.
        let mut idx = {
            let mut local = self.cores[me].lock();
            // SAFETY: lock local retido.
            unsafe { local.pop(base) }
        };

        // Exaustão local: WORK STEALING. Varre os outros cores e rouba
        // exatamente um frame do primeiro que tiver. Um lock de core por
        // vez: pop sob o lock da vítima, push+pop sob o lock local.
        if idx.is_none() {
            for victim in 0..ncores {
                if victim == me {
                    continue;
                }
                let stolen = {
                    let mut other = self.cores[victim].lock();
                    // SAFETY: lock da vítima retido.
                    unsafe { other.pop(base) }
                };
                if let Some(page) = stolen {
                    self.stats.inc_steal();
                    crate::ktrace!(
                        "(PMM) core {} roubou frame {} do core {}",
                        me,
                        page,
                        victim
                    );
                    let mut local = self.cores[me].lock();
                    // SAFETY: lock local retido; o frame roubado é nosso.
                    unsafe {
                        local.push(base, page);
                        idx = local.pop(base);
                    }
                    break;
                }
            }
        }

        match idx {
            Some(i) => {
                // SAFETY: o frame acabou de sair do pool, sem outro dono.
                unsafe { fill_page(base, i, JUNK_ALLOC) };
                self.stats.inc_alloc();
                Some(PhysFrame::from_start_address(PhysAddr::new(
                    (base + i as usize * PAGE_SIZE) as u64,
                )))
            }
            None => {
                self.stats.inc_failed();
                crate::kdebug!("(PMM) sem frames livres (OOM)");
                None
            }
        }
    }

    /// Devolve um frame ao pool (para a lista do core CORRENTE).
    ///
    /// Endereço desalinhado ou fora do intervalo gerenciado é FATAL.
    ///
    /// # Safety
    ///
    /// O frame deve ter vindo de `allocate()` e não pode ter mais nenhuma
    /// referência viva: a página é preenchida com lixo imediatamente.
    pub unsafe fn free(&self, frame: PhysFrame) {
        let base = self.base.load(Ordering::Acquire);
        if base == 0 {
            crate::kerror!("(PMM) free antes de init");
            panic!("pmm: free antes de init");
        }
        let nframes = self.nframes.load(Ordering::Acquire);
        let addr = frame.start_address().as_usize();

        if !is_aligned(addr, PAGE_SIZE) || addr < base || addr >= base + nframes * PAGE_SIZE {
            crate::kerror!("(PMM) free de endereço inválido: {:#x}", addr);
            panic!("pmm: free invalido");
        }

        let idx = ((addr - base) / PAGE_SIZE) as u32;

        // Lixo primeiro, link depois (o push reusa os 4 primeiros bytes).
        fill_page(base, idx, JUNK_FREE);

        let ncores = self.ncores.load(Ordering::Acquire);
        let me = crate::hal::current_cpu() % ncores;
        {
            let mut local = self.cores[me].lock();
            local.push(base, idx);
        }
        self.stats.inc_free();
    }

    /// Total de frames livres (soma das listas, sob os locks). Diagnóstico.
    pub fn free_frames(&self) -> usize {
        let ncores = self.ncores.load(Ordering::Acquire).max(1);
        let mut total = 0;
        for core in 0..ncores {
            total += self.cores[core].lock().len;
        }
        total
    }

    /// Contadores do alocador
    pub fn stats(&self) -> &PmmStats {
        &self.stats
    }
}

// =============================================================================
// TESTES
// =============================================================================
