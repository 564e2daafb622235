//! Guard de seção crítica com escopo.
//!
//! Envolve o par enter/leave do contador do `Processor` em aquisição por
//! escopo: a saída é garantida pelo drop mesmo em retornos antecipados.
//! O par cru `clear_critical`/`restore_critical` continua existindo para
//! o caminho de saída de trap, onde a liberação por escopo não casa com o
//! fluxo de controle.

use core::marker::PhantomData;

use crate::cpu::Processor;

/// Seção crítica viva enquanto o guard existir.
///
/// Não é `Send`: a seção pertence ao núcleo em que foi aberta.
pub struct ScopedCritical {
    _not_send: PhantomData<*mut ()>,
}

impl ScopedCritical {
    pub fn new() -> Self {
        Processor::current().enter_critical();
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Default for ScopedCritical {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScopedCritical {
    fn drop(&mut self) {
        Processor::current().leave_critical();
    }
}
