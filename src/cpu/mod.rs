//! # Bloco de Controle por-CPU (Processor)
//!
//! O `Processor` é o singleton por núcleo que concentra o estado de
//! concorrência local: profundidade de seção crítica, profundidade de
//! interrupção, referência à thread em execução e a fila de deferred
//! calls. É também o portão de saída de traps: `exit_trap` é o ÚNICO
//! lugar onde se decide se o scheduler roda antes de retornar de uma
//! interrupção.
//!
//! ## Invariantes
//! - Exatamente um `Processor` por núcleo, criado no boot e nunca destruído.
//! - Os campos mutáveis só são tocados pelo próprio núcleo, com
//!   interrupções mascaradas em atualizações de múltiplos passos.
//! - O scheduler só pode ser invocado com as duas profundidades em zero.
//!
//! Limitação documentada: apenas um núcleo é ativamente escalonado hoje
//! (o despertar de outros harts é um stub ENOSYS), mas todo o estado já é
//! por-núcleo para que SMP não exija remodelagem.

pub mod critical;
pub mod percpu;

#[cfg(feature = "self_test")]
pub mod test;

use core::cell::Cell;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::arch::riscv64::context::{fpu_store, FpuState};
use crate::arch::riscv64::cpu::RvCpu;
use crate::arch::riscv64::tlb;
use crate::arch::riscv64::trap::TrapFrame;
use crate::arch::{Cpu, CpuOps};
use crate::debug::stats;
use crate::mm::VirtAddr;
use crate::sched::task::thread::Thread;
use crate::sync::InterruptDisabler;
use crate::sys::types::{CoreId, ExecutionMode};
use crate::sys::Errno;
use crate::work::deferred::DeferredCallQueue;

pub use critical::ScopedCritical;

/// Template limpo de FPU, capturado uma única vez em `initialize()` logo
/// após habilitar a unidade. Imutável depois disso; novas threads copiam
/// daqui para observar os valores arquiteturais iniciais.
static CLEAN_FPU_STATE: spin::Once<FpuState> = spin::Once::new();

/// Bloco de controle de um núcleo físico.
pub struct Processor {
    core_id: CoreId,
    /// Profundidade de seção crítica (0 = preempção permitida)
    in_critical: AtomicU32,
    /// Profundidade de interrupção (0 = fora de handler)
    in_irq: AtomicU32,
    /// Thread atualmente em execução neste núcleo (null = nenhuma).
    /// Reatribuída apenas pelo motor de troca de contexto.
    current_thread: Cell<*mut Thread>,
    /// Troca de contexto pendente, consumida por check_invoke_scheduler
    need_resched: AtomicBool,
    /// Fila de trabalho diferido deste núcleo
    deferred_calls: DeferredCallQueue,
}

// SAFETY: os campos mutáveis são disciplina single-owner-per-core - só o
// próprio núcleo os acessa (Processor::current), com interrupções
// mascaradas em atualizações compostas. `by_id` expõe somente leituras de
// diagnóstico.
unsafe impl Sync for Processor {}

impl Processor {
    fn new(core_id: CoreId) -> Self {
        Self {
            core_id,
            in_critical: AtomicU32::new(0),
            in_irq: AtomicU32::new(0),
            current_thread: Cell::new(core::ptr::null_mut()),
            need_resched: AtomicBool::new(false),
            deferred_calls: DeferredCallQueue::new(),
        }
    }

    // =========================================================================
    // Inicialização (duas fases, uma vez por núcleo)
    // =========================================================================

    /// Fase cedo do boot: atribui a identidade do núcleo e publica o slot
    /// no registro por-CPU. Nada além de logging pode acontecer antes.
    pub fn early_initialize(core_id: CoreId) -> &'static Processor {
        let processor = percpu::install(core_id, Processor::new(core_id));
        crate::kinfo!("(CPU{}) early_initialize: identidade atribuída", core_id.0);
        processor
    }

    /// Fase tardia do boot: habilita a FPU, captura o template limpo,
    /// instala o vetor de traps e liga a entrega de interrupções.
    pub fn initialize(&self) {
        // Habilitar a FPU antes de capturar o template: com FS = Off as
        // instruções fsd do snapshot seriam Illegal Instruction.
        unsafe { RvCpu::enable_fpu() };

        CLEAN_FPU_STATE.call_once(|| {
            let mut clean = FpuState::zeroed();
            unsafe { fpu_store(&mut clean) };
            clean
        });

        unsafe {
            crate::arch::riscv64::trap::init();
            Cpu::enable_interrupts();
        }

        crate::kinfo!("(CPU{}) initialize: FPU + traps + interrupções ativas", self.core_id.0);
    }

    // =========================================================================
    // Acessores
    // =========================================================================

    /// O bloco de controle do núcleo em que este código executa.
    #[inline]
    pub fn current() -> &'static Processor {
        percpu::current()
    }

    /// Bloco de controle de um núcleo específico (diagnóstico).
    pub fn by_id(core_id: CoreId) -> Result<&'static Processor, Errno> {
        percpu::by_id(core_id)
    }

    #[inline]
    pub fn core_id(&self) -> CoreId {
        self.core_id
    }

    /// Template limpo de FPU capturado no boot.
    ///
    /// Pânico se chamado antes de `initialize()` - nenhuma thread pode
    /// existir antes da fase tardia.
    pub fn clean_fpu_state() -> &'static FpuState {
        CLEAN_FPU_STATE
            .get()
            .expect("clean_fpu_state antes de Processor::initialize")
    }

    /// Thread atualmente em execução neste núcleo.
    #[inline]
    pub fn current_thread(&self) -> Option<NonNull<Thread>> {
        NonNull::new(self.current_thread.get())
    }

    /// Reatribui a thread corrente. Uso exclusivo do motor de troca de
    /// contexto e do adota-thread do boot.
    ///
    /// # Safety
    /// `thread` deve apontar para uma Thread viva e fixada em memória, e a
    /// chamada deve acontecer com interrupções mascaradas.
    pub unsafe fn set_current_thread(&self, thread: *mut Thread) {
        self.current_thread.set(thread);
    }

    // =========================================================================
    // Seção crítica (contador de aninhamento)
    // =========================================================================

    #[inline]
    pub fn in_critical(&self) -> u32 {
        self.in_critical.load(Ordering::Relaxed)
    }

    /// Entra em seção crítica (incrementa o aninhamento).
    #[inline]
    pub fn enter_critical(&self) {
        self.in_critical.fetch_add(1, Ordering::Relaxed);
    }

    /// Sai de seção crítica. Ao chegar em zero fora de interrupção, roda a
    /// verificação de invocação do scheduler.
    pub fn leave_critical(&self) {
        let previous = self.in_critical.fetch_sub(1, Ordering::Relaxed);
        if previous == 0 {
            panic!(
                "(CPU{}) leave_critical sem enter correspondente (profundidade negativa)",
                self.core_id.0
            );
        }
        if previous == 1 && self.in_irq() == 0 {
            self.check_invoke_scheduler();
        }
    }

    /// Lê e zera a profundidade atomicamente, com interrupções mascaradas
    /// durante o read-modify-write. Retorna a profundidade anterior para um
    /// `restore_critical` posterior (padrão save/restore aninhado).
    pub fn clear_critical(&self) -> u32 {
        let _irq = InterruptDisabler::new();
        let previous = self.in_critical.swap(0, Ordering::Relaxed);
        if self.in_irq() == 0 {
            self.check_invoke_scheduler();
        }
        previous
    }

    /// Restaura uma profundidade salva por `clear_critical`.
    pub fn restore_critical(&self, previous: u32) {
        let _irq = InterruptDisabler::new();
        self.in_critical.store(previous, Ordering::Relaxed);
    }

    /// Profundidade residual no encerramento de uma thread é um bug de
    /// contagem que deixaria o scheduler permanentemente bloqueado.
    pub fn verify_critical_clean_on_exit(&self) {
        let depth = self.in_critical();
        if depth != 0 {
            panic!(
                "(CPU{}) thread encerrando com seção crítica residual (profundidade {})",
                self.core_id.0, depth
            );
        }
    }

    // =========================================================================
    // Protocolo de trap
    // =========================================================================

    #[inline]
    pub fn in_irq(&self) -> u32 {
        self.in_irq.load(Ordering::Relaxed)
    }

    /// Metade de entrada do protocolo: encadeia o frame na thread atual e
    /// registra a transição de modo.
    ///
    /// # Safety
    /// Chamar com interrupções mascaradas, com `trap.regs` apontando para
    /// o snapshot vivo na pilha do vetor.
    pub unsafe fn enter_trap(&self, trap: &mut TrapFrame, raise_irq: bool) {
        debug_assert!(!Cpu::are_interrupts_enabled());

        if raise_irq {
            self.in_irq.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(thread) = self.current_thread() {
            let thread = &mut *thread.as_ptr();
            trap.next_trap = thread.current_trap;
            thread.current_trap = trap as *mut TrapFrame;

            let mode = (*trap.regs).previous_mode();
            if let Some(old_mode) = thread.set_previous_mode(mode) {
                thread
                    .accounting
                    .charge(crate::time::now_cycles(), old_mode);
            }
        }
    }

    /// Portão de saída de trap: executado imediatamente antes de todo
    /// retorno de interrupção/exceção. É o único ponto que decide se uma
    /// outra thread deve ser retomada antes do retorno.
    ///
    /// # Safety
    /// Chamar com interrupções mascaradas, no núcleo dono deste bloco,
    /// exatamente uma vez por trap (pareado com `enter_trap`).
    pub unsafe fn exit_trap(&self, trap: &mut TrapFrame) {
        debug_assert!(!Cpu::are_interrupts_enabled());
        debug_assert!(core::ptr::eq(Processor::current(), self));

        // Seção crítica temporária: seções entradas e saídas dentro da
        // drenagem abaixo não podem disparar uma troca no meio desta
        // rotina. Não usamos ScopedCritical - veja o passo de saída.
        self.in_critical.fetch_add(1, Ordering::Relaxed);

        // O trap sendo encerrado conta como totalmente tratado: a
        // profundidade volta a zero de uma vez, não por decremento. Traps
        // aninhados desenrolam para fora um frame por chamada, e a cadeia
        // de frames da thread é a única fonte de verdade do aninhamento.
        self.in_irq.store(0, Ordering::Relaxed);

        // Drenar a fila de deferred calls. Garante que qualquer
        // desbloqueio de thread enfileirado durante o trap seja aplicado
        // antes da decisão de escalonamento.
        self.deferred_calls.execute_pending();

        if let Some(thread) = self.current_thread() {
            let thread = &mut *thread.as_ptr();
            thread.current_trap = trap.next_trap;

            let new_previous_mode = if !trap.next_trap.is_null() {
                // Este trap interrompeu outro trap: propaga o modo do
                // frame interno.
                let outer = &*trap.next_trap;
                assert!(
                    !outer.regs.is_null(),
                    "(CPU{}) trap frame aninhado sem snapshot",
                    self.core_id.0
                );
                (*outer.regs).previous_mode()
            } else {
                // Sem trap mais externo: o controle volta ao modo usuário,
                // e o modo anterior a esse retorno só pode ser kernel.
                ExecutionMode::Kernel
            };

            if let Some(old_mode) = thread.set_previous_mode(new_previous_mode) {
                thread
                    .accounting
                    .charge(crate::time::now_cycles(), old_mode);
            }
        }

        debug_assert!(!Cpu::are_interrupts_enabled());

        // Sai da seção crítica SEM reabilitar interrupções (assimétrico
        // com leave_critical de propósito): a troca de contexto só pode
        // acontecer dentro de check_invoke_scheduler, e as interrupções
        // ficam mascaradas até o sret restaurá-las do sstatus salvo.
        let previous = self.in_critical.fetch_sub(1, Ordering::Relaxed);
        assert!(previous > 0, "(CPU{}) exit_trap com contagem corrompida", self.core_id.0);

        if self.in_irq() == 0 && self.in_critical() == 0 {
            self.check_invoke_scheduler();
        }

        stats::TRAPS_HANDLED.inc();
    }

    // =========================================================================
    // Invocação do scheduler
    // =========================================================================

    /// Sinaliza que uma troca de contexto deve acontecer no próximo ponto
    /// seguro (saída de trap ou saída de seção crítica).
    #[inline]
    pub fn set_need_resched(&self) {
        self.need_resched.store(true, Ordering::Relaxed);
    }

    /// Verificação única de invocação do scheduler. Só é alcançada com as
    /// duas profundidades em zero; consome o pedido pendente, se houver.
    pub fn check_invoke_scheduler(&self) {
        stats::SCHEDULER_CHECKS.inc();
        debug_assert!(self.in_irq() == 0 && self.in_critical() == 0);

        if self.need_resched.swap(false, Ordering::Relaxed) {
            crate::sched::core::scheduler::invoke();
        }
    }

    // =========================================================================
    // Trabalho diferido
    // =========================================================================

    #[inline]
    pub fn deferred_call_queue(&self) -> &DeferredCallQueue {
        &self.deferred_calls
    }

    /// Enfileira trabalho para o próximo ponto seguro de drenagem. Pode
    /// ser chamado com interrupções desabilitadas ou dentro de um handler.
    pub fn defer<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.deferred_calls.enqueue(alloc::boxed::Box::new(work));
    }

    // =========================================================================
    // TLB (mecanismo; a política é do gerenciador de memória)
    // =========================================================================

    pub fn flush_tlb_local(&self, vaddr: VirtAddr, page_count: usize) {
        tlb::flush_local(vaddr, page_count);
    }

    pub fn flush_entire_tlb_local(&self) {
        tlb::flush_all_local();
    }

    // =========================================================================
    // Espera e parada
    // =========================================================================

    /// Estaciona o núcleo até a próxima interrupção e retorna.
    #[inline]
    pub fn wait_for_interrupt(&self) {
        Cpu::wait_for_interrupt();
    }

    /// Para o núcleo em definitivo. Mascara TODAS as fontes de interrupção
    /// (zerar sstatus.SIE não basta: o WFI ignora esse bit) e estaciona.
    pub fn halt(&self) -> ! {
        crate::kinfo!("(CPU{}) halt: mascarando fontes e estacionando", self.core_id.0);
        unsafe {
            Cpu::disable_interrupts();
            Cpu::mask_all_interrupt_sources();
        }
        loop {
            Cpu::wait_for_interrupt();
        }
    }

    // =========================================================================
    // Capacidades ainda não suportadas (falham alto, nunca fabricam dados)
    // =========================================================================

    /// Acorda até `count` núcleos ociosos. Sem IPI via SBI não há como
    /// acordar outro hart.
    pub fn smp_wake_idle_processors(&self, _count: u32) -> Result<u32, Errno> {
        crate::kwarn!("(CPU{}) smp_wake_idle_processors: não suportado", self.core_id.0);
        Err(Errno::ENOSYS)
    }

    /// Endereço base de TLS da thread corrente. Neste porte o registrador
    /// `tp` guarda o hart ID, então TLS de usuário exige outro mecanismo
    /// (troca de tp no retorno ao usuário) que ainda não existe.
    pub fn set_thread_specific_data(&self, _addr: VirtAddr) -> Result<(), Errno> {
        crate::kwarn!("(CPU{}) set_thread_specific_data: não suportado", self.core_id.0);
        Err(Errno::ENOSYS)
    }

    /// Captura de stack trace de uma thread. Exige um frame walker que
    /// este porte ainda não tem; devolve ENOSYS em vez de um trace vazio
    /// que pareceria legítimo.
    pub fn capture_stack_trace(
        &self,
        _thread: &Thread,
        _max_frames: usize,
    ) -> Result<alloc::vec::Vec<u64>, Errno> {
        crate::kwarn!("(CPU{}) capture_stack_trace: não suportado", self.core_id.0);
        Err(Errno::ENOSYS)
    }
}
