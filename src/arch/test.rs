//! Testes do HAL (riscv64)

use core::mem::{offset_of, size_of};

use crate::arch::riscv64::context::{CpuContext, FpuState};
use crate::arch::riscv64::trap::RegisterState;
use crate::arch::{Cpu, CpuOps};
use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};
use crate::sys::types::ExecutionMode;

/// Casos de teste do HAL
const ARCH_TESTS: &[TestCase] = &[
    TestCase::new("platform_string", test_platform_string),
    TestCase::new("context_layout", test_context_layout),
    TestCase::new("previous_mode_decode", test_previous_mode_decode),
    TestCase::new("interrupt_toggle", test_interrupt_toggle),
    TestCase::new("mask_all_sources", test_mask_all_sources),
    TestCase::new("ipi_stub_enosys", test_ipi_stub_enosys),
];

/// Executa todos os testes do HAL
pub fn run_arch_tests() -> (usize, usize, usize) {
    run_test_suite("Arch", ARCH_TESTS)
}

fn test_platform_string() -> TestResult {
    if Cpu::platform_string() != "riscv64" {
        return TestResult::Failed;
    }
    TestResult::Passed
}

/// Os offsets são contrato com o assembly de troca; qualquer desvio
/// corromperia registradores silenciosamente.
fn test_context_layout() -> TestResult {
    if size_of::<CpuContext>() != 0x70 {
        crate::kerror!("(Arch) CpuContext com tamanho {}", size_of::<CpuContext>());
        return TestResult::Failed;
    }
    if offset_of!(CpuContext, ra) != 0x00
        || offset_of!(CpuContext, sp) != 0x08
        || offset_of!(CpuContext, s) != 0x10
    {
        return TestResult::Failed;
    }
    if size_of::<FpuState>() != 33 * 8 {
        return TestResult::Failed;
    }
    if offset_of!(RegisterState, sepc) != 0xF8
        || offset_of!(RegisterState, sstatus) != 0x100
        || offset_of!(RegisterState, scause) != 0x108
        || offset_of!(RegisterState, stval) != 0x110
    {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_previous_mode_decode() -> TestResult {
    let mut state = RegisterState::zeroed();

    state.sstatus = 1 << 8; // SPP = 1
    if state.previous_mode() != ExecutionMode::Kernel {
        return TestResult::Failed;
    }

    state.sstatus = 0; // SPP = 0
    if state.previous_mode() != ExecutionMode::User {
        return TestResult::Failed;
    }

    TestResult::Passed
}

fn test_interrupt_toggle() -> TestResult {
    let was_enabled = Cpu::are_interrupts_enabled();

    unsafe { Cpu::disable_interrupts() };
    if Cpu::are_interrupts_enabled() {
        return TestResult::Failed;
    }

    if was_enabled {
        unsafe { Cpu::enable_interrupts() };
        if !Cpu::are_interrupts_enabled() {
            return TestResult::Failed;
        }
    }

    TestResult::Passed
}

/// A máscara total precisa zerar o CSR `sie` inteiro (o WFI ignora
/// sstatus.SIE) e a restauração precisa devolver as fontes originais.
fn test_mask_all_sources() -> TestResult {
    let previous = unsafe { Cpu::mask_all_interrupt_sources() };

    let masked = riscv::register::sie::read().bits();
    let restored_ok;
    unsafe {
        Cpu::restore_interrupt_sources(previous);
        restored_ok = riscv::register::sie::read().bits() == previous as usize;
    }

    if masked != 0 {
        crate::kerror!("(Arch) sie não zerado: {:#x}", masked);
        return TestResult::Failed;
    }
    if !restored_ok {
        return TestResult::Failed;
    }
    TestResult::Passed
}

/// Capacidades não implementadas falham alto com ENOSYS, nunca fingem
/// sucesso.
fn test_ipi_stub_enosys() -> TestResult {
    use crate::sys::types::CoreId;
    use crate::sys::Errno;

    if Cpu::send_ipi(CoreId(1), 0) != Err(Errno::ENOSYS) {
        return TestResult::Failed;
    }
    if Cpu::broadcast_ipi(0) != Err(Errno::ENOSYS) {
        return TestResult::Failed;
    }
    TestResult::Passed
}
