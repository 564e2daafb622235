//! Guard de interrupções desabilitadas.
//!
//! Salva o estado atual de entrega de interrupções, desabilita, e restaura
//! ao sair do escopo. Seções de múltiplos passos sobre campos por-CPU devem
//! rodar sob este guard.

use crate::arch::{Cpu, CpuOps};

/// Estado de entrega de interrupções, capturado para restauração posterior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptsState {
    Enabled,
    Disabled,
}

impl InterruptsState {
    /// Captura o estado atual sem alterá-lo.
    pub fn capture() -> Self {
        if Cpu::are_interrupts_enabled() {
            InterruptsState::Enabled
        } else {
            InterruptsState::Disabled
        }
    }

    /// Reaplica o estado capturado.
    ///
    /// # Safety
    /// Habilitar interrupções pode causar preempção imediata.
    pub unsafe fn restore(self) {
        match self {
            InterruptsState::Enabled => Cpu::enable_interrupts(),
            InterruptsState::Disabled => Cpu::disable_interrupts(),
        }
    }
}

/// Desabilita interrupções enquanto estiver vivo.
pub struct InterruptDisabler {
    previous: InterruptsState,
}

impl InterruptDisabler {
    pub fn new() -> Self {
        let previous = InterruptsState::capture();
        unsafe { Cpu::disable_interrupts() };
        Self { previous }
    }

    /// Estado que será restaurado no drop.
    pub fn previous_state(&self) -> InterruptsState {
        self.previous
    }
}

impl Default for InterruptDisabler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InterruptDisabler {
    fn drop(&mut self) {
        unsafe { self.previous.restore() };
    }
}
