//! Caminho de boot do kernel.

pub mod entry;
