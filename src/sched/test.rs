//! Testes do motor de troca de contexto e do protocolo de trap

use alloc::boxed::Box;
use core::pin::Pin;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::arch::riscv64::context::thread_first_enter_asm;
use crate::arch::riscv64::trap::{RegisterState, TrapFrame};
use crate::cpu::Processor;
use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};
use crate::sched::core::scheduler;
use crate::sched::core::switch;
use crate::sched::task::thread::{Thread, ThreadState};
use crate::sync::InterruptDisabler;
use crate::sys::types::{ExecutionMode, Tid};

/// Casos de teste do motor
const SCHED_TESTS: &[TestCase] = &[
    TestCase::new("init_context_kernel", test_init_context_kernel),
    TestCase::new("init_context_fpu_template", test_init_context_fpu_template),
    TestCase::new("init_context_user_frame", test_init_context_user_frame),
    TestCase::new("trap_exit_outermost", test_trap_exit_outermost),
    TestCase::new("trap_exit_nested", test_trap_exit_nested),
    TestCase::new("switch_roundtrip", test_switch_roundtrip),
    TestCase::new("fpu_dirty_tracking", test_fpu_dirty_tracking),
    TestCase::new("deferred_wakeup_schedules", test_deferred_wakeup_schedules),
    TestCase::new("stack_trace_stub_enosys", test_stack_trace_stub_enosys),
];

/// Executa todos os testes do motor
pub fn run_sched_tests() -> (usize, usize, usize) {
    run_test_suite("Sched", SCHED_TESTS)
}

extern "C" fn never_entry(_arg: usize) -> ! {
    panic!("entry de thread de teste executada");
}

/// init_context semeia a primeira retomada: trampolim em ra, entry e
/// argumento nos registradores s, pilha alinhada dentro da área alocada.
fn test_init_context_kernel() -> TestResult {
    let mut thread = Box::pin(Thread::new(Tid::new(900), "t-init", never_entry, 0x55AA));
    // SAFETY: Box fixada, nunca enfileirada.
    let thread = unsafe { Pin::get_unchecked_mut(thread.as_mut()) };

    switch::init_context(thread, true);

    if !thread.context_initialized || thread.state != ThreadState::Created {
        return TestResult::Failed;
    }
    if thread.context.ra != thread_first_enter_asm as usize as u64 {
        return TestResult::Failed;
    }
    if thread.context.s[1] != never_entry as usize as u64 || thread.context.s[2] != 0x55AA {
        return TestResult::Failed;
    }
    if thread.context.sp % 16 != 0
        || thread.context.sp <= thread.stack_base()
        || thread.context.sp > thread.stack_top()
    {
        return TestResult::Failed;
    }
    if thread.mode != ExecutionMode::Kernel {
        return TestResult::Failed;
    }

    TestResult::Passed
}

/// Uma thread recém-inicializada observa exatamente o template limpo de
/// FPU, nunca lixo de outra thread.
fn test_init_context_fpu_template() -> TestResult {
    let mut thread = Box::pin(Thread::new(Tid::new(901), "t-fpu", never_entry, 0));
    let thread = unsafe { Pin::get_unchecked_mut(thread.as_mut()) };

    switch::init_context(thread, true);

    if thread.fpu != *Processor::clean_fpu_state() || thread.fpu_touched {
        return TestResult::Failed;
    }
    TestResult::Passed
}

/// Threads de usuário ganham um frame inicial com sepc no entry,
/// SPP = User e SPIE ligado.
fn test_init_context_user_frame() -> TestResult {
    let mut thread = Box::pin(Thread::new(Tid::new(902), "t-user", never_entry, 7));
    let thread = unsafe { Pin::get_unchecked_mut(thread.as_mut()) };

    switch::init_context(thread, false);

    if thread.mode != ExecutionMode::User {
        return TestResult::Failed;
    }
    let frame = thread.initial_user_frame;
    if frame.is_null() {
        return TestResult::Failed;
    }
    // SAFETY: frame aponta para a pilha da thread de teste, viva.
    let state = unsafe { &*frame };
    if state.sepc != never_entry as usize as u64 {
        return TestResult::Failed;
    }
    if state.sstatus & (1 << 8) != 0 {
        // SPP deveria ser User (0)
        return TestResult::Failed;
    }
    if state.sstatus & (1 << 5) == 0 {
        // SPIE deveria estar ligado
        return TestResult::Failed;
    }
    if state.x[9] != 7 {
        // a0 = argumento
        return TestResult::Failed;
    }

    TestResult::Passed
}

/// Saída do trap mais externo: sem frame aninhado, o modo anterior vira
/// Kernel (o controle está voltando ao modo usuário) e a cadeia esvazia.
fn test_trap_exit_outermost() -> TestResult {
    let _irq = InterruptDisabler::new();
    let processor = Processor::current();

    let mut regs = RegisterState::zeroed();
    regs.sstatus = 1 << 8; // interrompido em modo kernel
    let mut frame = TrapFrame::new(&mut regs);

    unsafe {
        processor.enter_trap(&mut frame, true);
        if processor.in_irq() != 1 {
            return TestResult::Failed;
        }
        processor.exit_trap(&mut frame);
    }

    if processor.in_irq() != 0 || processor.in_critical() != 0 {
        return TestResult::Failed;
    }
    let (mode, chain_empty) =
        scheduler::with_current(|t| (t.previous_mode(), t.current_trap.is_null()));
    if mode != ExecutionMode::Kernel || !chain_empty {
        return TestResult::Failed;
    }

    TestResult::Passed
}

/// Saída de um trap aninhado: o modo anterior vem do frame externo (aqui,
/// User), NÃO do default "kernel", e a cadeia recua um frame.
fn test_trap_exit_nested() -> TestResult {
    let _irq = InterruptDisabler::new();
    let processor = Processor::current();

    let mut outer_regs = RegisterState::zeroed();
    outer_regs.sstatus = 0; // trap externo interrompeu modo usuário
    let mut outer = TrapFrame::new(&mut outer_regs);

    let mut inner_regs = RegisterState::zeroed();
    inner_regs.sstatus = 1 << 8; // trap interno interrompeu modo kernel
    let mut inner = TrapFrame::new(&mut inner_regs);

    unsafe {
        processor.enter_trap(&mut outer, true);
        processor.enter_trap(&mut inner, true);
        if processor.in_irq() != 2 {
            return TestResult::Failed;
        }

        processor.exit_trap(&mut inner);
    }

    // A profundidade zera de uma vez; o aninhamento restante vive na
    // cadeia de frames.
    if processor.in_irq() != 0 {
        return TestResult::Failed;
    }
    let (mode, chain_ok) = scheduler::with_current(|t| {
        (
            t.previous_mode(),
            core::ptr::eq(t.current_trap, &outer as *const TrapFrame),
        )
    });
    if mode != ExecutionMode::User || !chain_ok {
        return TestResult::Failed;
    }

    unsafe { processor.exit_trap(&mut outer) };
    let mode = scheduler::with_current(|t| t.previous_mode());
    if mode != ExecutionMode::Kernel {
        return TestResult::Failed;
    }

    TestResult::Passed
}

static ROUNDTRIP_STEPS: AtomicUsize = AtomicUsize::new(0);

extern "C" fn roundtrip_worker(_arg: usize) -> ! {
    ROUNDTRIP_STEPS.fetch_add(1, Ordering::Relaxed);
    scheduler::yield_now();
    ROUNDTRIP_STEPS.fetch_add(1, Ordering::Relaxed);
    scheduler::exit_current(0);
}

/// Ida e volta X -> Y -> X: os dois fluxos continuam exatamente de onde
/// pararam, sobre pilhas distintas.
fn test_switch_roundtrip() -> TestResult {
    ROUNDTRIP_STEPS.store(0, Ordering::Relaxed);

    scheduler::spawn_kernel("t-roundtrip", roundtrip_worker, 0);

    scheduler::yield_now(); // roda o worker até o yield dele
    if ROUNDTRIP_STEPS.load(Ordering::Relaxed) != 1 {
        return TestResult::Failed;
    }

    scheduler::yield_now(); // worker completa e encerra
    if ROUNDTRIP_STEPS.load(Ordering::Relaxed) != 2 {
        return TestResult::Failed;
    }

    scheduler::reap_zombies();
    TestResult::Passed
}

extern "C" fn fpu_noop_worker(_arg: usize) -> ! {
    scheduler::exit_current(0);
}

/// Uma thread que sujou a FPU tem o snapshot salvo na troca e restaurado
/// na volta; o bit de rastreio fica registrado na thread.
fn test_fpu_dirty_tracking() -> TestResult {
    const SENTINEL: u64 = 0x3FF0_0000_0000_0000; // 1.0 em IEEE-754

    // Suja f1 no fluxo de boot.
    unsafe {
        core::arch::asm!("fmv.d.x f1, {}", in(reg) SENTINEL);
    }

    scheduler::spawn_kernel("t-fpu-noop", fpu_noop_worker, 0);
    scheduler::yield_now(); // troca para o worker (salva nossa FPU) e volta

    let (touched, saved_f1) = scheduler::with_current(|t| (t.fpu_touched, t.fpu.f[1]));
    if !touched {
        return TestResult::Failed;
    }
    if saved_f1 != SENTINEL {
        crate::kerror!("(Sched) f1 salvo = {:#x}", saved_f1);
        return TestResult::Failed;
    }

    scheduler::reap_zombies();
    TestResult::Passed
}

static WAKEUP_RAN: AtomicUsize = AtomicUsize::new(0);

extern "C" fn wakeup_worker(_arg: usize) -> ! {
    WAKEUP_RAN.store(1, Ordering::Relaxed);
    scheduler::exit_current(0);
}

/// Cenário completo: um "handler" enfileira uma deferred call que torna
/// outra thread pronta; a saída do trap drena a fila ANTES da decisão de
/// escalonamento, e a verificação observa a thread e troca para ela.
fn test_deferred_wakeup_schedules() -> TestResult {
    WAKEUP_RAN.store(0, Ordering::Relaxed);

    let _irq = InterruptDisabler::new();
    let processor = Processor::current();

    let mut regs = RegisterState::zeroed();
    regs.sstatus = 1 << 8;
    let mut frame = TrapFrame::new(&mut regs);

    unsafe {
        processor.enter_trap(&mut frame, true);

        // O que um handler de dispositivo faria: não pode trocar de
        // contexto aqui dentro, então adia o despertar.
        processor.defer(|| {
            scheduler::spawn_kernel("t-wakeup", wakeup_worker, 0);
            scheduler::set_need_resched();
        });

        // exit_trap drena a fila (worker fica pronto) e então invoca o
        // scheduler: o worker roda antes deste fluxo continuar.
        processor.exit_trap(&mut frame);
    }

    if WAKEUP_RAN.load(Ordering::Relaxed) != 1 {
        return TestResult::Failed;
    }

    scheduler::reap_zombies();
    TestResult::Passed
}

fn test_stack_trace_stub_enosys() -> TestResult {
    use crate::sys::Errno;

    let thread = Thread::new(Tid::new(903), "t-trace", never_entry, 0);
    match Processor::current().capture_stack_trace(&thread, 32) {
        Err(Errno::ENOSYS) => TestResult::Passed,
        _ => TestResult::Failed,
    }
}
