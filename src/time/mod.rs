//! Relógio do kernel.
//!
//! Duas fontes de tempo:
//! - `now_cycles()`: o CSR `time` (sombra do mtime), monotônico, usado
//!   pela contabilidade de tempo de execução das threads.
//! - jiffies: contador de ticks incrementado pela interrupção de timer.

use core::sync::atomic::{AtomicU64, Ordering};

/// Ticks desde o boot.
static JIFFIES: AtomicU64 = AtomicU64::new(0);

/// Frequência nominal do tick (ticks por segundo).
pub const HZ: u64 = 100;

/// Leitura monotônica do contador de ciclos do timer da plataforma.
#[inline]
pub fn now_cycles() -> u64 {
    riscv::register::time::read() as u64
}

/// Retorna o número atual de jiffies.
#[inline]
pub fn jiffies() -> u64 {
    JIFFIES.load(Ordering::Relaxed)
}

/// Incrementa o contador de jiffies.
/// Deve ser chamado APENAS pelo handler de interrupção do timer.
#[inline]
pub fn tick() {
    JIFFIES.fetch_add(1, Ordering::Relaxed);
}
