//! Objeto de thread e contabilidade de recursos.

pub mod accounting;
pub mod thread;

pub use thread::{Thread, ThreadEntry, ThreadState};
