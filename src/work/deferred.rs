//! Fila por-CPU de deferred calls
//!
//! Código rodando com interrupções desabilitadas, ou dentro de um handler
//! de interrupção, usa esta fila para agendar trabalho que precisa rodar
//! fora desse contexto - tipicamente desbloqueios de thread. Os itens são
//! drenados em pontos seguros bem definidos (hoje, o portão de saída de
//! trap), em ordem FIFO estrita, cada um exatamente uma vez.
//!
//! Regras:
//! 1. A fila tem capacidade fixa; esgotamento é FATAL. Descartar uma
//!    deferred call silenciosamente descartaria um wakeup.
//! 2. `execute_pending` não pode ser chamada de dentro de si mesma.
//!    Enfileirar novos itens de dentro de um item é permitido - eles são
//!    drenados na mesma passada.

use alloc::boxed::Box;
use core::cell::{Cell, UnsafeCell};

use crate::sync::InterruptDisabler;

/// Um item de trabalho: fecho de zero argumentos, consumido na execução.
pub type DeferredCall = Box<dyn FnOnce() + Send>;

/// Capacidade da fila de cada núcleo.
pub const QUEUE_CAPACITY: usize = 32;

/// Fila FIFO de capacidade fixa, um exemplar por `Processor`.
pub struct DeferredCallQueue {
    slots: UnsafeCell<[Option<DeferredCall>; QUEUE_CAPACITY]>,
    head: Cell<usize>,
    len: Cell<usize>,
    /// Guarda de reentrância de execute_pending
    draining: Cell<bool>,
}

// SAFETY: a fila pertence a um Processor e segue a mesma disciplina
// single-owner-per-core; toda mutação acontece no núcleo dono com
// interrupções mascaradas durante a manipulação dos índices.
unsafe impl Sync for DeferredCallQueue {}

impl DeferredCallQueue {
    pub const fn new() -> Self {
        Self {
            slots: UnsafeCell::new([const { None }; QUEUE_CAPACITY]),
            head: Cell::new(0),
            len: Cell::new(0),
            draining: Cell::new(false),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len.get()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len.get() == 0
    }

    /// Acrescenta um item à cauda da fila deste núcleo.
    ///
    /// Sempre sucede, exceto por esgotamento - que é um bug fatal de
    /// dimensionamento, não um erro recuperável.
    pub fn enqueue(&self, call: DeferredCall) {
        let _irq = InterruptDisabler::new();

        let len = self.len.get();
        if len == QUEUE_CAPACITY {
            panic!(
                "fila de deferred calls esgotada (capacidade {})",
                QUEUE_CAPACITY
            );
        }

        let tail = (self.head.get() + len) % QUEUE_CAPACITY;
        // SAFETY: interrupções mascaradas; slot `tail` está livre.
        unsafe {
            (*self.slots.get())[tail] = Some(call);
        }
        self.len.set(len + 1);
    }

    /// Remove o item da cabeça, se houver.
    fn pop(&self) -> Option<DeferredCall> {
        let _irq = InterruptDisabler::new();

        let len = self.len.get();
        if len == 0 {
            return None;
        }

        let head = self.head.get();
        // SAFETY: interrupções mascaradas; slot `head` está ocupado.
        let call = unsafe { (*self.slots.get())[head].take() };
        self.head.set((head + 1) % QUEUE_CAPACITY);
        self.len.set(len - 1);
        call
    }

    /// Executa itens da cabeça até a fila esvaziar, em ordem FIFO.
    ///
    /// Itens podem enfileirar trabalho novo durante a drenagem - ele é
    /// consumido na mesma passada. Chamar de dentro de um item em
    /// execução é uma violação fatal de invariante.
    pub fn execute_pending(&self) {
        if self.draining.replace(true) {
            panic!("execute_pending reentrante na fila de deferred calls");
        }

        while let Some(call) = self.pop() {
            call();
            crate::debug::stats::DEFERRED_EXECUTED.inc();
        }

        self.draining.set(false);
    }
}

impl Default for DeferredCallQueue {
    fn default() -> Self {
        Self::new()
    }
}
