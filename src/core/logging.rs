// =============================================================================
// KERNEL LOGGING SYSTEM - ZERO OVERHEAD
// =============================================================================
//
// Sistema de logging da Fornalha com custo ZERO em release.
//
// ARQUITETURA:
// Este sistema foi projetado para ser completamente removível em release:
// - Usa features do Cargo para compile-time filtering
// - Com feature "no_logs", TODOS os macros viram expressões vazias
// - Saída via LogSink registrado pelo kernel que embute o crate (uma
//   biblioteca não é dona da serial; o kernel pluga o driver no boot)
// - Sem sink registrado, os macros não emitem nada
//
// NÍVEIS DE LOG (do mais crítico ao menos):
// - ERROR: Erros fatais ou críticos
// - WARN:  Situações suspeitas mas recuperáveis
// - INFO:  Fluxo normal de execução
// - DEBUG: Informações de debugging
// - TRACE: Detalhes extremos (cada operação)
//
// FEATURES:
// - no_logs:   Remove 100% dos logs (custo zero no binário)
// - log_info:  Apenas ERROR, WARN, INFO
// - log_trace: Todos os níveis (padrão)
//
// =============================================================================

use core::fmt;
use spin::{Mutex, Once};

// =============================================================================
// PREFIXOS COM CORES ANSI
// =============================================================================
//
// Cores ANSI para terminais que suportam (como o QEMU serial console).
// Cada prefixo inclui: código de cor + texto + reset de cor.
//

pub const P_ERROR: &str = "\x1b[1;31m[ERRO]\x1b[0m ";
pub const P_WARN: &str = "\x1b[1;33m[WARN]\x1b[0m ";
pub const P_INFO: &str = "\x1b[32m[INFO]\x1b[0m ";
pub const P_DEBUG: &str = "\x1b[36m[DEBG]\x1b[0m ";
pub const P_TRACE: &str = "\x1b[35m[TRAC]\x1b[0m ";

// =============================================================================
// SINK DE SAÍDA
// =============================================================================

/// Destino das linhas de log (serial, framebuffer, buffer de teste...).
///
/// O kernel registra um sink no boot via [`install_sink`]. Implementações
/// devem ser reentrantes o suficiente para serem chamadas de qualquer
/// contexto que os subsistemas deste crate rodem.
pub trait LogSink: Send + Sync {
    fn write_str(&self, s: &str);
}

static SINK: Once<&'static dyn LogSink> = Once::new();

/// Serializa linhas inteiras; sem isto, logs de cores distintos intercalam.
static LINE_LOCK: Mutex<()> = Mutex::new(());

/// Registra o sink de log. Chamadas subsequentes são ignoradas.
pub fn install_sink(sink: &'static dyn LogSink) {
    SINK.call_once(|| sink);
}

struct SinkWriter {
    sink: &'static dyn LogSink,
}

impl fmt::Write for SinkWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.sink.write_str(s);
        Ok(())
    }
}

/// Emite uma linha com prefixo de nível. Uso interno dos macros `k*!`.
#[doc(hidden)]
pub fn log(prefix: &str, args: fmt::Arguments<'_>) {
    if let Some(sink) = SINK.get() {
        let _guard = LINE_LOCK.lock();
        let mut writer = SinkWriter { sink: *sink };
        let _ = fmt::Write::write_str(&mut writer, prefix);
        let _ = fmt::write(&mut writer, args);
        let _ = fmt::Write::write_str(&mut writer, "\n");
    }
}

// =============================================================================
// MACROS DE LOG - NÍVEL ERROR
// =============================================================================
//
// kerror! - Sempre ativo (exceto com no_logs)
// Usado para erros críticos que podem causar crash.
//

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        $crate::core::logging::log($crate::core::logging::P_ERROR, format_args!($($arg)*));
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL WARN
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        $crate::core::logging::log($crate::core::logging::P_WARN, format_args!($($arg)*));
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL INFO
// =============================================================================

#[cfg(all(
    not(feature = "no_logs"),
    any(feature = "log_info", feature = "log_debug", feature = "log_trace")
))]
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        $crate::core::logging::log($crate::core::logging::P_INFO, format_args!($($arg)*));
    }};
}

#[cfg(not(all(
    not(feature = "no_logs"),
    any(feature = "log_info", feature = "log_debug", feature = "log_trace")
)))]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL DEBUG
// =============================================================================

#[cfg(all(
    not(feature = "no_logs"),
    any(feature = "log_debug", feature = "log_trace")
))]
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{
        $crate::core::logging::log($crate::core::logging::P_DEBUG, format_args!($($arg)*));
    }};
}

#[cfg(not(all(
    not(feature = "no_logs"),
    any(feature = "log_debug", feature = "log_trace")
)))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL TRACE
// =============================================================================

#[cfg(all(not(feature = "no_logs"), feature = "log_trace"))]
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        $crate::core::logging::log($crate::core::logging::P_TRACE, format_args!($($arg)*));
    }};
}

#[cfg(not(all(not(feature = "no_logs"), feature = "log_trace")))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// TESTES
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;
    use std::sync::Mutex as StdMutex;

    struct CaptureSink {
        lines: StdMutex<String>,
    }

    impl LogSink for CaptureSink {
        fn write_str(&self, s: &str) {
            self.lines.lock().unwrap().push_str(s);
        }
    }

    static CAPTURE: CaptureSink = CaptureSink {
        lines: StdMutex::new(String::new()),
    };

    #[test]
    fn test_macros_atravessam_sink() {
        install_sink(&CAPTURE);

        crate::kinfo!("(Log) valor={:#x}", 0x1000u64);
        crate::kerror!("(Log) falha simulada");

        let captured = CAPTURE.lines.lock().unwrap().clone();
        assert!(captured.contains("valor=0x1000"));
        assert!(captured.contains("falha simulada"));
        assert!(captured.contains("[INFO]"));
        assert!(captured.contains("[ERRO]"));
    }

    #[test]
    fn test_log_sem_sink_nao_explode() {
        // Antes do install_sink em outra thread de teste, ou com Once já
        // resolvido, o caminho sem sink apenas descarta.
        log(P_TRACE, format_args!("descartado {}", 1));
    }
}
