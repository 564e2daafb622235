//! Implementação riscv64 das operações de CPU (HAL).
//!
//! Usa o crate `riscv` para acesso a CSRs e instruções privilegiadas,
//! com assembly inline apenas onde o crate não cobre a operação
//! (escrita integral do CSR `sie`, leitura do registrador `tp`).
//!
//! # Segurança
//! Esta implementação assume modo supervisor (S-mode) em um hart RV64GC.

use core::arch::asm;

use bitflags::bitflags;
use riscv::register::sstatus::{self, FS};

use crate::arch::traits::cpu::CpuOps;
use crate::sys::types::CoreId;
use crate::sys::Errno;

bitflags! {
    /// Bits do CSR `sstatus` manipulados pelo kernel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SstatusFlags: u64 {
        /// Supervisor Interrupt Enable
        const SIE = 1 << 1;
        /// Supervisor Previous Interrupt Enable (restaurado pelo `sret`)
        const SPIE = 1 << 5;
        /// Supervisor Previous Privilege (0 = User, 1 = Supervisor)
        const SPP = 1 << 8;
        /// Permite acesso do supervisor a páginas de usuário
        const SUM = 1 << 18;
    }
}

pub struct RvCpu;

impl RvCpu {
    /// Habilita a unidade de ponto flutuante (sstatus.FS = Initial).
    ///
    /// Antes disso qualquer instrução de FP gera Illegal Instruction.
    /// Chamado uma única vez por núcleo, na fase tardia de inicialização.
    pub unsafe fn enable_fpu() {
        sstatus::set_fs(FS::Initial);
        crate::ktrace!("(Arch) FPU habilitada (sstatus.FS = Initial)");
    }

    /// Verifica se a thread atual sujou os registradores de FP desde a
    /// última troca (sstatus.FS == Dirty). O hardware mantém esse bit.
    pub fn fpu_is_dirty() -> bool {
        sstatus::read().fs() == FS::Dirty
    }

    /// Marca o estado de FP como limpo após um save/restore.
    ///
    /// # Safety
    /// Só chamar imediatamente após salvar ou restaurar os registradores.
    pub unsafe fn set_fpu_clean() {
        sstatus::set_fs(FS::Clean);
    }
}

impl CpuOps for RvCpu {
    fn platform_string() -> &'static str {
        "riscv64"
    }

    /// Retorna o ID do núcleo atual.
    ///
    /// O `_start` copia o hart ID (passado pelo SBI em `a0`) para `tp`
    /// antes de qualquer código Rust executar.
    #[inline]
    fn current_id() -> CoreId {
        let tp: u64;
        unsafe {
            asm!("mv {}, tp", out(reg) tp, options(nomem, nostack, preserves_flags));
        }
        CoreId(tp as u32)
    }

    /// O hart 0 é o núcleo de boot; os demais ficam estacionados no `_start`
    /// enquanto o despertar multi-core não é suportado.
    fn is_boot_core() -> bool {
        Self::current_id().0 == 0
    }

    /// Para a CPU até a próxima interrupção (WFI).
    #[inline]
    fn wait_for_interrupt() {
        unsafe { riscv::asm::wfi() };
    }

    #[inline]
    fn relax() {
        core::hint::spin_loop();
    }

    /// Barreira de memória completa (FENCE rw,rw).
    #[inline]
    fn memory_fence() {
        unsafe {
            asm!("fence rw, rw", options(nostack, preserves_flags));
        }
    }

    /// Desabilita interrupções (sstatus.SIE = 0).
    #[inline]
    unsafe fn disable_interrupts() {
        sstatus::clear_sie();
    }

    /// Habilita interrupções (sstatus.SIE = 1).
    #[inline]
    unsafe fn enable_interrupts() {
        sstatus::set_sie();
    }

    /// Verifica sstatus.SIE.
    #[inline]
    fn are_interrupts_enabled() -> bool {
        sstatus::read().sie()
    }

    /// Zera o CSR `sie` inteiro, mascarando todas as fontes (timer,
    /// software e externa). Necessário porque o WFI ignora sstatus.SIE:
    /// com fontes habilitadas o núcleo acordaria mesmo com SIE = 0.
    #[inline]
    unsafe fn mask_all_interrupt_sources() -> u64 {
        let previous: u64;
        asm!(
            "csrrw {}, sie, zero",
            out(reg) previous,
            options(nomem, nostack, preserves_flags),
        );
        previous
    }

    #[inline]
    unsafe fn restore_interrupt_sources(mask: u64) {
        asm!(
            "csrw sie, {}",
            in(reg) mask,
            options(nomem, nostack, preserves_flags),
        );
    }

    // --- Suporte a SMP (stub até o driver de IPI via SBI estar pronto) ---

    fn send_ipi(_target: CoreId, _vector: u8) -> Result<(), Errno> {
        // Requer a extensão sbi_send_ipi; sem ela não há como acordar
        // outro hart.
        Err(Errno::ENOSYS)
    }

    fn broadcast_ipi(_vector: u8) -> Result<(), Errno> {
        Err(Errno::ENOSYS)
    }
}
