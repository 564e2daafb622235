//! # Synchronization Primitives
//!
//! Primitivas de sincronização do kernel.
//!
//! ## Regras
//!
//! - **Spinlock**: usar para estado compartilhado com handlers de interrupção
//!   (salva e restaura o estado de interrupções automaticamente).
//! - **spin::Mutex**: usar para estado de driver simples que nunca é tocado
//!   em contexto de interrupção.
//! - **Ordem de Lock**: sempre adquirir na mesma ordem para evitar deadlock.

pub mod irq;
pub mod spinlock;

pub use irq::InterruptDisabler;
pub use spinlock::{Spinlock, SpinlockGuard};
