//! Contadores globais de eventos do kernel.
//!
//! Observabilidade barata para o shell de debug e para os self-tests
//! verificarem quantas vezes um caminho foi percorrido.

use core::sync::atomic::{AtomicU64, Ordering};

pub struct Counter(AtomicU64);

impl Counter {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Trocas de contexto completadas
pub static CONTEXT_SWITCHES: Counter = Counter::new();
/// Traps processados (entrada + saída completas)
pub static TRAPS_HANDLED: Counter = Counter::new();
/// Execuções da verificação de invocação do scheduler
pub static SCHEDULER_CHECKS: Counter = Counter::new();
/// Deferred calls executadas
pub static DEFERRED_EXECUTED: Counter = Counter::new();

/// Despeja os contadores no log.
pub fn dump() {
    crate::kinfo!(
        "(Stats) switches={} traps={} sched_checks={} deferred={}",
        CONTEXT_SWITCHES.get(),
        TRAPS_HANDLED.get(),
        SCHEDULER_CHECKS.get(),
        DEFERRED_EXECUTED.get()
    );
}
