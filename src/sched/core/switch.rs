//! Motor de Troca de Contexto
//!
//! Máquina de estados sobre execuções de thread, por núcleo:
//! Created -> Running -> Ready (suspensa, contexto salvo) -> Running ...
//!
//! O motor nunca roda por conta própria: é invocado apenas pelo portão de
//! saída de trap (via check_invoke_scheduler) ou por pontos explícitos de
//! yield. Não há modo de falha parcial - ou a transição completa, ou o
//! sistema não pode continuar com segurança (pânico).

use crate::arch::riscv64::context::{self, CpuContext};
use crate::arch::riscv64::cpu::{RvCpu, SstatusFlags};
use crate::arch::riscv64::trap::RegisterState;
use crate::arch::{Cpu, CpuOps};
use crate::cpu::Processor;
use crate::debug::stats;
use crate::sched::config::USER_FRAME_RESERVE;
use crate::sched::task::thread::{Thread, ThreadState};
use crate::sync::irq::InterruptsState;
use crate::sys::types::ExecutionMode;

/// Prepara o contexto salvo e a pilha inicial de uma thread que nunca
/// executou, de modo que a primeira retomada entre no ponto de entrada
/// designado, no modo de privilégio pedido, com a FPU igual ao template
/// limpo.
///
/// Chamar uma única vez por thread; uma segunda chamada em uma thread
/// viva é um bug fatal de uso.
pub fn init_context(thread: &mut Thread, is_kernel_thread: bool) {
    if thread.context_initialized {
        panic!(
            "init_context duas vezes para a thread {} ({})",
            thread.tid.as_u32(),
            thread.name
        );
    }

    thread.mode = if is_kernel_thread {
        ExecutionMode::Kernel
    } else {
        ExecutionMode::User
    };
    let _ = thread.set_previous_mode(thread.mode);

    // Estado de FPU arquitetural, não lixo: cópia do template capturado
    // no boot.
    thread.fpu = Processor::clean_fpu_state().clone();
    thread.fpu_touched = false;

    let stack_top = thread.stack_top();
    let thread_ptr = thread as *mut Thread as u64;

    if is_kernel_thread {
        thread.context.setup_first_entry(
            stack_top,
            thread_ptr,
            thread.entry as usize as u64,
            thread.entry_arg as u64,
            InterruptsState::Enabled,
        );
    } else {
        // Threads de usuário entram via sret: o frame inicial vive no
        // topo da pilha de kernel e o trampolim de primeira entrada o
        // restaura inteiro.
        let frame_addr = (stack_top - USER_FRAME_RESERVE as u64) & !0xF;
        let frame = frame_addr as *mut RegisterState;

        // sstatus do primeiro sret: SPP=0 (usuário), SPIE=1 (interrupções
        // ligadas ao entrar), FS=Initial (bit 13).
        let sstatus = SstatusFlags::SPIE.bits() | (1 << 13);

        // SAFETY: frame_addr aponta para dentro da pilha recém-alocada da
        // thread, alinhado e com espaço reservado.
        unsafe {
            let mut state = RegisterState::zeroed();
            state.sepc = thread.entry as usize as u64;
            state.sstatus = sstatus;
            state.x[9] = thread.entry_arg as u64; // x10 = a0
            frame.write(state);
        }
        thread.initial_user_frame = frame;

        thread
            .context
            .setup_first_entry(frame_addr, thread_ptr, 0, 0, InterruptsState::Disabled);
    }

    thread.context_initialized = true;

    crate::ktrace!(
        "(Switch) contexto inicial da thread {} ({}): sp={:#x}",
        thread.tid.as_u32(),
        thread.name,
        thread.context.sp
    );
}

/// Adota o fluxo de boot como a primeira thread deste núcleo.
///
/// O contexto não é semeado: ele será preenchido pela primeira troca que
/// suspender o fluxo de boot. Executa uma única vez por núcleo.
pub unsafe fn init_context_switching(boot_thread: &mut Thread) {
    let processor = Processor::current();
    assert!(
        processor.current_thread().is_none(),
        "(CPU{}) init_context_switching com thread corrente já definida",
        processor.core_id().0
    );

    boot_thread.context_initialized = true;
    boot_thread.first_entered = true;
    boot_thread.state = ThreadState::Running;
    boot_thread.accounting.stamp(crate::time::now_cycles());

    processor.set_current_thread(boot_thread as *mut Thread);

    crate::kinfo!(
        "(Switch) fluxo de boot adotado como thread {} ({})",
        boot_thread.tid.as_u32(),
        boot_thread.name
    );
}

/// Suspende `from` e retoma `to`.
///
/// Salva o estado completo de registradores de `from` (incluindo FPU, se
/// a thread tocou a unidade desde o último save), restaura o de `to` e
/// transfere o controle. Retorna apenas quando `from` for retomada por
/// uma troca futura.
///
/// # Safety
///
/// - Interrupções devem estar mascaradas.
/// - `from` e `to` devem ser threads distintas, fixadas em memória.
/// - A transição vive entre duas pilhas e não é reentrante: o chamador
///   não pode estar no meio de outra troca.
pub unsafe fn switch_context(from: &mut Thread, to: &mut Thread) {
    assert!(!Cpu::are_interrupts_enabled(), "switch_context com interrupções ativas");
    assert!(
        to.context_initialized,
        "troca para contexto não inicializado (thread {})",
        to.tid.as_u32()
    );
    assert!(
        !core::ptr::eq(from, to),
        "switch_context de uma thread para ela mesma"
    );

    let processor = Processor::current();

    // A troca em andamento conta como seção crítica: o lado retomado
    // (retorno abaixo, ou o trampolim de primeira entrada) fecha.
    processor.enter_critical();

    // O hardware marca sstatus.FS = Dirty na primeira escrita de registrador
    // de FP; só salvamos quando houve sujeira real.
    if RvCpu::fpu_is_dirty() {
        context::fpu_store(&mut from.fpu);
        from.fpu_touched = true;
    }

    if to.fpu_touched {
        context::fpu_load(&to.fpu);
    } else {
        context::fpu_load(Processor::clean_fpu_state());
    }
    RvCpu::set_fpu_clean();

    processor.set_current_thread(to as *mut Thread);
    to.accounting.stamp(crate::time::now_cycles());
    stats::CONTEXT_SWITCHES.inc();

    context::switch(&mut from.context, &to.context);

    // Retomada de `from`, em um momento futuro: fecha a seção crítica
    // aberta pela troca que nos retomou.
    Processor::current().leave_critical();
}

/// Variante de mão única: retoma `to` descartando o contexto chamador.
///
/// Usada quando o fluxo corrente está sendo abandonado (ex: encerramento
/// de thread) - restaura apenas, nunca salva um `from`.
///
/// # Safety
/// Mesmas exigências de `switch_context`; além disso o chamador aceita
/// que sua pilha nunca mais será retomada.
pub unsafe fn assume_context(to: &mut Thread, interrupts: InterruptsState) -> ! {
    assert!(!Cpu::are_interrupts_enabled(), "assume_context com interrupções ativas");
    assert!(
        to.context_initialized,
        "assume para contexto não inicializado (thread {})",
        to.tid.as_u32()
    );

    let processor = Processor::current();
    processor.enter_critical();

    if to.fpu_touched {
        context::fpu_load(&to.fpu);
    } else {
        context::fpu_load(Processor::clean_fpu_state());
    }
    RvCpu::set_fpu_clean();

    // Uma thread nunca executada recebe o estado de interrupções pedido
    // na primeira entrada; uma thread suspensa restabelece o estado no
    // próprio ponto de suspensão.
    if !to.first_entered {
        to.context.s[3] = match interrupts {
            InterruptsState::Enabled => 1,
            InterruptsState::Disabled => 0,
        };
    }

    processor.set_current_thread(to as *mut Thread);
    to.accounting.stamp(crate::time::now_cycles());
    stats::CONTEXT_SWITCHES.inc();

    let mut discarded = CpuContext::new();
    context::switch(&mut discarded, &to.context);

    unreachable!("assume_context retomou um contexto descartado");
}

/// Hook de primeira entrada, chamado por `thread_first_enter_asm`
/// imediatamente após a primeira restauração de uma thread. Roda
/// exatamente uma vez por thread.
#[no_mangle]
extern "C" fn context_first_enter(thread: *mut Thread, entry: u64, arg: u64, interrupts: u64) -> ! {
    // SAFETY: o ponteiro foi semeado por init_context a partir de uma
    // thread fixada; a troca que nos trouxe garante exclusividade.
    let thread = unsafe { &mut *thread };

    if thread.first_entered {
        panic!(
            "primeira entrada re-executada para a thread {} ({})",
            thread.tid.as_u32(),
            thread.name
        );
    }
    thread.first_entered = true;
    thread.state = ThreadState::Running;
    thread.accounting.stamp(crate::time::now_cycles());

    // Fecha a seção crítica aberta pela troca que nos trouxe até aqui.
    Processor::current().leave_critical();

    crate::ktrace!(
        "(Switch) primeira entrada da thread {} ({})",
        thread.tid.as_u32(),
        thread.name
    );

    match thread.mode {
        ExecutionMode::Kernel => {
            if interrupts == 1 {
                // SAFETY: ambiente da thread pronto; preempção é legal.
                unsafe { Cpu::enable_interrupts() };
            }
            // SAFETY: `entry` foi semeado por init_context a partir de um
            // ThreadEntry válido.
            let entry: crate::sched::task::thread::ThreadEntry =
                unsafe { core::mem::transmute(entry as usize) };
            entry(arg as usize)
        }
        ExecutionMode::User => {
            let frame = thread.initial_user_frame;
            assert!(
                !frame.is_null(),
                "thread de usuário sem frame inicial (thread {})",
                thread.tid.as_u32()
            );
            // SAFETY: frame preparado por init_context no topo da pilha
            // de kernel desta thread; sret entrega em modo usuário.
            unsafe { context::user_context_restore_asm(frame as u64) }
        }
    }
}
