//! Definições de Sistema
//!
//! Tipos e códigos compartilhados por todos os subsistemas do kernel.

pub mod error;
pub mod types;

pub use error::Errno;
