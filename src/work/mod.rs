//! Execução diferida.

pub mod deferred;

pub use deferred::{DeferredCall, DeferredCallQueue};
