//! # Configuração do Módulo de Memória
//!
//! Define constantes e configurações globais do módulo MM.

// =============================================================================
// CONSTANTES DE TAMANHO
// =============================================================================

/// Tamanho de uma página (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Máscara para alinhar endereços a página
pub const PAGE_MASK: usize = !(PAGE_SIZE - 1);

// =============================================================================
// CONFIGURAÇÃO SMP
// =============================================================================

/// Número máximo de CPUs suportadas
pub const MAX_CPUS: usize = 64;

/// Tamanho de linha de cache (para evitar false sharing)
pub const CACHE_LINE_SIZE: usize = 64;

// =============================================================================
// PADRÕES DE PREENCHIMENTO (DIAGNÓSTICO)
// =============================================================================
//
// Páginas livres e recém-alocadas são preenchidas com lixo conhecido:
// um use-after-free lê JUNK_FREE, uma leitura não inicializada lê
// JUNK_ALLOC. Ambos aparecem imediatamente num dump de memória.
//

/// Padrão escrito em toda página ao ser liberada
pub const JUNK_FREE: u8 = 0x01;

/// Padrão escrito em toda página ao ser alocada
pub const JUNK_ALLOC: u8 = 0x05;

// =============================================================================
// FUNÇÕES UTILITÁRIAS
// =============================================================================

/// Alinha valor para cima ao múltiplo de align
#[inline(always)]
pub const fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Alinha valor para baixo ao múltiplo de align
#[inline(always)]
pub const fn align_down(val: usize, align: usize) -> usize {
    val & !(align - 1)
}

/// Verifica se valor está alinhado
#[inline(always)]
pub const fn is_aligned(val: usize, align: usize) -> bool {
    val & (align - 1) == 0
}
