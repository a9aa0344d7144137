//! Núcleo do crate: logging e diagnóstico.

pub mod logging;
