//! Camada de armazenamento abaixo do filesystem.
//!
//! O VFS e os filesystems reais vivem no repositório do kernel; aqui fica
//! apenas o cache de blocos que eles consomem.

pub mod bcache;

#[cfg(feature = "self_test")]
pub mod test;

pub use bcache::{BlockCache, BufGuard, PinnedBlock};
