//! Escalonador round-robin mínimo.
//!
//! Mantém a fila de prontas e a dona da thread corrente. A decisão de
//! *quando* trocar não é daqui: o Processor sinaliza via need_resched e o
//! portão de saída de trap (ou um yield voluntário) chama `invoke` quando
//! as profundidades chegam a zero.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::pin::Pin;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::{Cpu, CpuOps};
use crate::cpu::Processor;
use crate::sched::core::switch;
use crate::sched::task::thread::{Thread, ThreadEntry, ThreadState};
use crate::sync::irq::InterruptsState;
use crate::sync::{InterruptDisabler, Spinlock};
use crate::sys::types::Tid;

/// Fila de threads prontas deste núcleo.
static RUNQUEUE: Spinlock<VecDeque<Pin<Box<Thread>>>> = Spinlock::new(VecDeque::new());

/// Dona da thread atualmente em execução. O ponteiro cru espelhado em
/// `Processor::current_thread` aponta para dentro desta Box fixada.
static CURRENT: Spinlock<Option<Pin<Box<Thread>>>> = Spinlock::new(None);

/// Threads encerradas aguardando coleta. A pilha de uma thread não pode
/// ser liberada enquanto ela ainda executa sobre a própria pilha, então o
/// encerramento estaciona a Box aqui e outro fluxo a recolhe depois.
static ZOMBIES: Spinlock<Vec<Pin<Box<Thread>>>> = Spinlock::new(Vec::new());

static NEXT_TID: AtomicU32 = AtomicU32::new(1);

/// Inicializa o escalonador adotando o fluxo de boot como thread 0.
pub fn init(boot_name: &'static str) {
    let _irq = InterruptDisabler::new();

    let mut boot = Box::pin(Thread::new(Tid::new(0), boot_name, unreachable_entry, 0));
    // SAFETY: a Box está fixada; o ponteiro registrado permanece válido.
    unsafe {
        let boot_ref = Pin::get_unchecked_mut(boot.as_mut());
        switch::init_context_switching(boot_ref);
    }

    let mut current = CURRENT.lock();
    assert!(current.is_none(), "escalonador inicializado duas vezes");
    *current = Some(boot);

    crate::kinfo!("[SCHED] Sistema de escalonamento pronto.");
}

/// Entry sentinela da thread de boot: o contexto dela nunca é semeado por
/// init_context, então esta função não tem como ser alcançada.
extern "C" fn unreachable_entry(_arg: usize) -> ! {
    panic!("entry sentinela da thread de boot executada");
}

/// Cria uma thread de kernel pronta para rodar.
pub fn spawn_kernel(name: &'static str, entry: ThreadEntry, arg: usize) -> Tid {
    // Preparação e publicação da thread como um passo único, sem
    // preempção no meio.
    let _critical = crate::cpu::ScopedCritical::new();

    let tid = Tid::new(NEXT_TID.fetch_add(1, Ordering::Relaxed));
    let mut thread = Box::pin(Thread::new(tid, name, entry, arg));

    // SAFETY: Box fixada; init_context roda antes de qualquer retomada.
    unsafe {
        let thread_ref = Pin::get_unchecked_mut(thread.as_mut());
        switch::init_context(thread_ref, true);
        thread_ref.state = ThreadState::Ready;
    }

    RUNQUEUE.lock().push_back(thread);
    crate::kdebug!("(Sched) thread {} ({}) pronta", tid.as_u32(), name);
    tid
}

/// Marca que uma troca deve acontecer no próximo ponto seguro.
pub fn set_need_resched() {
    Processor::current().set_need_resched();
}

/// Threads prontas na fila (sem contar a corrente).
pub fn runnable_count() -> usize {
    RUNQUEUE.lock().len()
}

/// Executa `f` com uma referência à thread corrente, sob o lock dela.
/// Para diagnóstico e self-tests; `f` não pode reescalonar.
pub fn with_current<R>(f: impl FnOnce(&Thread) -> R) -> R {
    let guard = CURRENT.lock();
    let thread = guard.as_ref().expect("with_current sem thread corrente");
    f(thread.as_ref().get_ref())
}

/// Ponto único de invocação vindo de `check_invoke_scheduler`.
/// Pré-condição (garantida pelo Processor): as duas profundidades zeradas.
pub(crate) fn invoke() {
    let _irq = InterruptDisabler::new();
    reschedule(false);
}

/// Cede a CPU voluntariamente.
pub fn yield_now() {
    let _irq = InterruptDisabler::new();
    reschedule(true);
}

/// Troca para a próxima thread pronta, se houver. Retorna (na retomada
/// futura do chamador) sem trocar quando a fila está vazia.
///
/// Chamar com interrupções mascaradas.
fn reschedule(voluntary: bool) {
    let next = {
        let mut queue = RUNQUEUE.lock();
        match queue.pop_front() {
            Some(thread) => thread,
            None => return,
        }
    };

    let mut current_guard = CURRENT.lock();
    let Some(mut old) = current_guard.take() else {
        // O fluxo de boot ainda não foi adotado; devolve a thread à fila
        // e deixa a decisão para o próximo ponto seguro.
        RUNQUEUE.lock().push_front(next);
        return;
    };

    // SAFETY: Boxes fixadas; os ponteiros sobrevivem à movimentação das
    // Boxes entre as filas (só o ponteiro externo se move).
    unsafe {
        let old_ptr = Pin::get_unchecked_mut(old.as_mut()) as *mut Thread;
        (*old_ptr).state = ThreadState::Ready;
        (*old_ptr).accounting.account_switch(voluntary);

        let mut next = next;
        let next_ptr = Pin::get_unchecked_mut(next.as_mut()) as *mut Thread;
        (*next_ptr).state = ThreadState::Running;

        RUNQUEUE.lock().push_back(old);
        *current_guard = Some(next);
        // Solta o lock antes da troca: a thread retomada pode precisar
        // dele imediatamente.
        drop(current_guard);

        switch::switch_context(&mut *old_ptr, &mut *next_ptr);
    }
    // Retomada do chamador em um momento futuro.
}

/// Encerra a thread corrente e nunca retorna.
///
/// Profundidade de seção crítica residual aqui é um erro fatal de
/// contagem - o scheduler ficaria travado para sempre.
pub fn exit_current(exit_code: i32) -> ! {
    unsafe { Cpu::disable_interrupts() };

    let processor = Processor::current();
    processor.verify_critical_clean_on_exit();

    let mut current_guard = CURRENT.lock();
    let mut old = current_guard
        .take()
        .expect("exit_current sem thread corrente");

    // SAFETY: Box fixada.
    unsafe {
        let old_ref = Pin::get_unchecked_mut(old.as_mut());
        old_ref.state = ThreadState::Dead;
        crate::kdebug!(
            "(Sched) thread {} ({}) encerrada com código {}",
            old_ref.tid.as_u32(),
            old_ref.name,
            exit_code
        );
    }
    ZOMBIES.lock().push(old);

    let next = RUNQUEUE.lock().pop_front();
    match next {
        Some(mut next) => unsafe {
            let next_ptr = Pin::get_unchecked_mut(next.as_mut()) as *mut Thread;
            (*next_ptr).state = ThreadState::Running;
            *current_guard = Some(next);
            drop(current_guard);

            // Mão única: o contexto desta thread morta é descartado.
            switch::assume_context(&mut *next_ptr, InterruptsState::Enabled)
        },
        None => {
            // Nada mais para executar neste núcleo.
            drop(current_guard);
            unsafe { processor.set_current_thread(core::ptr::null_mut()) };
            processor.halt();
        }
    }
}

/// Recolhe threads mortas, liberando pilhas e contextos.
/// Chamado por um fluxo que comprovadamente não é nenhuma delas.
pub fn reap_zombies() -> usize {
    let mut zombies = ZOMBIES.lock();
    let count = zombies.len();
    zombies.clear();
    if count > 0 {
        crate::kdebug!("(Sched) {} thread(s) morta(s) recolhida(s)", count);
    }
    count
}
