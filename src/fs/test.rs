//! Testes do Cache de Blocos no Boot
//!
//! Executa testes de integridade do bcache com um ramdisk dedicado.
//! Todos os resultados são enviados para o sink de log.
//!
//! # Uso
//! Chamar `run_bcache_tests()` depois de `mm::heap::init()` no boot (o
//! registro de dispositivos usa `Arc`).

use crate::drivers::block::{RamDisk, BLOCK_SIZE};
use crate::fs::bcache::BlockCache;
use alloc::sync::Arc;

/// Cache dedicado aos testes de boot (não toca o BCACHE global)
static TEST_CACHE: BlockCache<8, 2> = BlockCache::new();

/// Executa todos os testes do cache no boot
pub fn run_bcache_tests() {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DO CACHE DE BLOCOS       ║");
    crate::kinfo!("╚════════════════════════════════════════╝");

    TEST_CACHE.init();
    TEST_CACHE.attach_device(0, Arc::new(RamDisk::<16>::new()));

    test_bcache_roundtrip();
    test_bcache_lru();

    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║  ✅ TODOS OS TESTES PASSARAM!          ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
}

/// Escreve um bloco, invalida por eviction, relê do disco
fn test_bcache_roundtrip() {
    crate::kinfo!("┌─ Teste BCache Roundtrip ────────────────┐");

    {
        let mut buf = match TEST_CACHE.read(0, 7) {
            Ok(b) => b,
            Err(e) => {
                crate::kerror!("(BCache) FALHA: read bloco 7: {}", e);
                panic!("Teste BCache falhou: read");
            }
        };
        buf.data_mut()[0] = 0xB5;
        buf.data_mut()[BLOCK_SIZE - 1] = 0x5B;
        if buf.write().is_err() {
            crate::kerror!("(BCache) FALHA: write bloco 7");
            panic!("Teste BCache falhou: write");
        }
    }

    let buf = match TEST_CACHE.read(0, 7) {
        Ok(b) => b,
        Err(e) => {
            crate::kerror!("(BCache) FALHA: reread bloco 7: {}", e);
            panic!("Teste BCache falhou: reread");
        }
    };
    if buf.data()[0] != 0xB5 || buf.data()[BLOCK_SIZE - 1] != 0x5B {
        crate::kerror!("(BCache) FALHA: conteúdo do bloco 7 não persistiu");
        panic!("Teste BCache falhou: conteúdo");
    }

    crate::kinfo!("└─ Teste BCache Roundtrip: OK ────────────┘");
}

/// Percorre mais chaves que o pool: eviction LRU precisa reciclar
fn test_bcache_lru() {
    crate::kinfo!("┌─ Teste BCache LRU ──────────────────────┐");

    for blockno in 0..12u32 {
        crate::ktrace!("(BCache) Teste: bloco {}...", blockno);
        let buf = TEST_CACHE.acquire(0, blockno);
        if buf.blockno() != blockno {
            crate::kerror!("(BCache) FALHA: chave errada no bloco {}", blockno);
            panic!("Teste BCache falhou: chave");
        }
    }

    crate::kinfo!("└─ Teste BCache LRU: OK ──────────────────┘");
}
