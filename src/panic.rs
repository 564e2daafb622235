//! Panic Handler - Tratamento de pânicos do kernel
//!
//! Violações de invariante neste núcleo não têm caminho de recuperação:
//! o pânico loga o contexto de diagnóstico (núcleo, localização,
//! mensagem) e estaciona o hardware em definitivo.

use core::panic::PanicInfo;

use crate::arch::{Cpu, CpuOps};

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    // Mascarar já: o estado que levou ao pânico não pode processar traps.
    unsafe { Cpu::disable_interrupts() };

    crate::kerror!("================ KERNEL PANIC ================");
    crate::kerror!("Núcleo: {}", Cpu::current_id().0);
    if let Some(location) = info.location() {
        crate::kerror!("Local: {}:{}", location.file(), location.line());
    }
    crate::kerror!("{}", info.message());
    crate::kerror!("==============================================");

    Cpu::hang();
}
