//! Entry Point Lógico do Kernel.
//!
//! `kernel_main` é o primeiro código Rust de alto nível a executar depois
//! do trampolim em assembly (`_start`). Inicializa os subsistemas na
//! ordem estrita de dependência e nunca retorna.

use crate::arch::{Cpu, CpuOps};
use crate::cpu::Processor;
use crate::debug::stats;
use crate::sched::core::scheduler;
use crate::sys::types::CoreId;

/// Função principal do kernel.
///
/// Chamada pelo `_start` com a pilha configurada, BSS zerada e o hart ID
/// em `a0` (e já espelhado em `tp`).
pub extern "C" fn kernel_main(hart_id: usize, _dtb: usize) -> ! {
    // 1. Console serial: a partir daqui kinfo!/kerror! funcionam.
    crate::drivers::serial::init();
    crate::kinfo!("Cinder OS Kernel - iniciando ({})", Cpu::platform_string());

    // 2. Fase cedo: identidade do núcleo e slot no registro por-CPU.
    let processor = Processor::early_initialize(CoreId(hart_id as u32));

    // 3. Heap do kernel (necessário antes de threads e deferred calls).
    crate::mm::heap::init();

    // 4. Fase tardia: FPU + template limpo + vetor de traps + interrupções.
    processor.initialize();

    // 5. Escalonador: o fluxo de boot vira a thread 0 deste núcleo.
    scheduler::init("boot");

    // 6. Self-tests de subsistema (feature self_test).
    #[cfg(feature = "self_test")]
    run_self_tests();

    // 7. Demonstração de multitarefa cooperativa.
    run_demo_threads();

    // 8. Fim de vida: estatísticas e parada definitiva do núcleo.
    stats::dump();
    crate::kinfo!("Boot completo; nada mais a executar.");
    processor.halt();
}

/// Executa as suites de self-test e reporta o agregado.
#[cfg(feature = "self_test")]
fn run_self_tests() {
    let mut failed = 0;

    failed += crate::arch::test::run_arch_tests().1;
    failed += crate::cpu::test::run_cpu_tests().1;
    failed += crate::sched::test::run_sched_tests().1;

    if failed > 0 {
        crate::kerror!("(SelfTest) {} caso(s) FALHARAM", failed);
    } else {
        crate::kinfo!("(SelfTest) todas as suites passaram");
    }
}

/// Dois workers de kernel que se alternam com o fluxo de boot até
/// encerrarem; exercita spawn, yield, troca de contexto e coleta.
fn run_demo_threads() {
    scheduler::spawn_kernel("worker-a", demo_worker, 1);
    scheduler::spawn_kernel("worker-b", demo_worker, 2);

    while scheduler::runnable_count() > 0 {
        scheduler::yield_now();
    }
    scheduler::reap_zombies();
}

extern "C" fn demo_worker(arg: usize) -> ! {
    for round in 0..3 {
        crate::kinfo!("(Demo) worker {} rodada {}", arg, round);
        scheduler::yield_now();
    }
    scheduler::exit_current(0);
}
