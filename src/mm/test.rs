//! Testes de Memória do Kernel
//!
//! Executa testes de integridade do PMM no boot.
//! Todos os resultados são enviados para o sink de log.
//!
//! # Uso
//! Chamar `run_memory_tests()` logo após `pmm::init()` no boot.

use crate::mm::config::{JUNK_ALLOC, PAGE_SIZE};
use crate::mm::pmm::{self, FRAME_SIZE};

/// Executa todos os testes de memória no boot
pub fn run_memory_tests() {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DE MEMÓRIA               ║");
    crate::kinfo!("╚════════════════════════════════════════╝");

    test_pmm_basic();
    test_pmm_junk_pattern();

    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║  ✅ TODOS OS TESTES PASSARAM!          ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
}

/// Teste básico do PMM: alocar e desalocar frames
fn test_pmm_basic() {
    crate::kinfo!("┌─ Teste PMM ─────────────────────────────┐");
    crate::kdebug!("(PMM) Teste: alocando 10 frames...");

    let mut frames = [None; 10];

    for (i, slot) in frames.iter_mut().enumerate() {
        crate::ktrace!("(PMM) Teste: alocando frame {}...", i);
        let frame = pmm::alloc_page();

        if frame.is_none() {
            crate::kerror!("(PMM) FALHA: OOM ao alocar frame {}", i);
            panic!("Teste PMM falhou: OOM");
        }

        let f = frame.unwrap();

        // Verificar alinhamento
        if f.addr() % FRAME_SIZE as u64 != 0 {
            crate::kerror!("(PMM) FALHA: frame {} não alinhado: {:#x}", i, f.addr());
            panic!("Teste PMM falhou: alinhamento");
        }

        crate::ktrace!("(PMM) Teste: frame {} = {:#x}", i, f.addr());
        *slot = Some(f);
    }

    crate::kdebug!("(PMM) Teste: 10 frames alocados OK");
    crate::kdebug!("(PMM) Teste: desalocando frames...");

    for slot in frames.iter_mut() {
        if let Some(f) = slot.take() {
            // SAFETY: frames recém-alocados acima, sem outras referências.
            unsafe { pmm::free_page(f) };
        }
    }

    crate::kinfo!("└─ Teste PMM: OK ─────────────────────────┘");
}

/// Verifica o padrão de lixo de páginas recém-alocadas
fn test_pmm_junk_pattern() {
    crate::kinfo!("┌─ Teste Junk Pattern ────────────────────┐");

    let f = match pmm::alloc_page() {
        Some(f) => f,
        None => {
            crate::kerror!("(PMM) FALHA: OOM no teste de padrão");
            panic!("Teste PMM falhou: OOM");
        }
    };

    // SAFETY: frame recém-alocado, exclusivo deste teste.
    let bytes = unsafe { core::slice::from_raw_parts(f.as_mut_ptr(), PAGE_SIZE) };
    for (i, &b) in bytes.iter().enumerate() {
        if b != JUNK_ALLOC {
            crate::kerror!("(PMM) FALHA: byte {} = {:#x} (esperado JUNK_ALLOC)", i, b);
            panic!("Teste PMM falhou: padrão de alocação");
        }
    }

    // SAFETY: sem referências vivas além do slice já descartado.
    unsafe { pmm::free_page(f) };

    crate::kinfo!("└─ Teste Junk Pattern: OK ────────────────┘");
}
