//! Interface Abstrata de CPU (HAL).
//! Define as operações que qualquer arquitetura deve implementar.

use crate::sys::types::CoreId;
use crate::sys::Errno;

pub trait CpuOps {
    /// Nome da família de instruções, para diagnóstico e capability reporting.
    fn platform_string() -> &'static str;

    /// Retorna o ID do núcleo atual.
    fn current_id() -> CoreId;

    /// Verifica se este é o núcleo de boot.
    fn is_boot_core() -> bool;

    /// Para a execução da CPU até a próxima interrupção.
    /// Economiza energia em loops ociosos; retorna normalmente.
    fn wait_for_interrupt();

    /// Dica para a CPU que estamos em um spin loop.
    fn relax();

    /// Barreira de memória completa.
    fn memory_fence();

    /// Desabilita a entrega de interrupções neste núcleo.
    ///
    /// # Safety
    /// Requer privilégio de supervisor.
    unsafe fn disable_interrupts();

    /// Habilita a entrega de interrupções neste núcleo.
    ///
    /// # Safety
    /// Pode causar preempção imediata.
    unsafe fn enable_interrupts();

    /// Verifica se as interrupções estão habilitadas.
    fn are_interrupts_enabled() -> bool;

    /// Mascara TODAS as fontes de interrupção (não apenas o enable global).
    /// Retorna a máscara anterior, para restauração.
    ///
    /// # Safety
    /// Depois desta chamada nenhuma interrupção acorda o núcleo.
    unsafe fn mask_all_interrupt_sources() -> u64;

    /// Restaura uma máscara de fontes salva por `mask_all_interrupt_sources`.
    ///
    /// # Safety
    /// A máscara deve ter vindo de `mask_all_interrupt_sources`.
    unsafe fn restore_interrupt_sources(mask: u64);

    /// Entra em loop infinito de espera com interrupções mascaradas.
    /// Usado em pânicos irrecuperáveis.
    fn hang() -> ! {
        unsafe {
            Self::disable_interrupts();
            Self::mask_all_interrupt_sources();
        }
        loop {
            Self::wait_for_interrupt();
        }
    }

    // --- Suporte a SMP (stub até o driver de IPI via SBI estar pronto) ---

    fn send_ipi(target: CoreId, vector: u8) -> Result<(), Errno>;

    fn broadcast_ipi(vector: u8) -> Result<(), Errno>;
}
