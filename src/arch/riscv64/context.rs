//! Contexto de execução salvo (riscv64)
//!
//! Define os registros de contexto consumidos pelo assembly de troca:
//! `CpuContext` (registradores callee-saved + ra + sp) e `FpuState`
//! (f0-f31 + fcsr). O layout é `#[repr(C)]` e os offsets são parte do
//! contrato com o assembly abaixo - alterar um exige alterar o outro.

use crate::sync::irq::InterruptsState;

/// Contexto de CPU (registradores salvos)
///
/// Somente os callee-saved precisam ser preservados: a troca de contexto
/// acontece dentro de uma chamada de função, então a ABI já garante que os
/// caller-saved foram salvos por quem chamou.
#[repr(C)]
#[derive(Debug)]
pub struct CpuContext {
    /// Endereço de retomada (ra)
    pub ra: u64,
    /// Ponteiro de pilha (sp)
    pub sp: u64,
    /// s0-s11 (callee-saved, SysV RISC-V ABI)
    pub s: [u64; 12],
}

impl CpuContext {
    pub const fn new() -> Self {
        Self {
            ra: 0,
            sp: 0,
            s: [0; 12],
        }
    }

    /// Semeia o contexto para a primeira entrada de uma thread.
    ///
    /// A primeira retomada cai em `thread_first_enter_asm`, que move os
    /// registradores s semeados aqui para os registradores de argumento e
    /// chama o hook de primeira entrada.
    pub fn setup_first_entry(
        &mut self,
        stack_top: u64,
        thread_ptr: u64,
        entry: u64,
        arg: u64,
        interrupts: InterruptsState,
    ) {
        self.ra = thread_first_enter_asm as usize as u64;
        self.sp = stack_top & !0xF; // ABI exige pilha alinhada a 16 bytes
        self.s = [0; 12];
        self.s[0] = thread_ptr;
        self.s[1] = entry;
        self.s[2] = arg;
        self.s[3] = match interrupts {
            InterruptsState::Enabled => 1,
            InterruptsState::Disabled => 0,
        };
    }
}

impl Default for CpuContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot da unidade de ponto flutuante (f0-f31 + fcsr).
///
/// Um template "limpo" é capturado uma única vez no boot, logo após
/// habilitar a FPU, e usado para inicializar o estado de novas threads
/// com os valores arquiteturais (não lixo).
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpuState {
    pub f: [u64; 32],
    pub fcsr: u64,
}

impl FpuState {
    pub const fn zeroed() -> Self {
        Self { f: [0; 32], fcsr: 0 }
    }
}

/// Realiza a troca de contexto entre duas threads.
///
/// Salva os registradores vivos em `old`, restaura `new` e transfere o
/// controle. Retorna apenas quando o contexto `old` for retomado por uma
/// troca futura.
///
/// # Safety
///
/// - Interrupções devem estar desabilitadas
/// - `old` e `new` devem ser ponteiros válidos e distintos
/// - `new` deve ter sido inicializado (primeira entrada semeada ou troca
///   anterior salva)
pub unsafe fn switch(old: *mut CpuContext, new: *const CpuContext) {
    context_switch_asm(old as u64, new as u64);
}

/// Salva os registradores de ponto flutuante e o fcsr em `state`.
///
/// # Safety
/// A FPU deve estar habilitada (sstatus.FS != Off).
pub unsafe fn fpu_store(state: *mut FpuState) {
    fpu_store_asm(state as u64);
}

/// Restaura os registradores de ponto flutuante e o fcsr de `state`.
///
/// # Safety
/// A FPU deve estar habilitada (sstatus.FS != Off).
pub unsafe fn fpu_load(state: *const FpuState) {
    fpu_load_asm(state as u64);
}

// Assembly de troca de contexto.
// a0 = contexto antigo (salva), a1 = contexto novo (restaura)
// Offsets (CpuContext): 0x00:ra 0x08:sp 0x10..0x68:s0-s11
core::arch::global_asm!(
    r#"
.global context_switch_asm
context_switch_asm:
    // Salvar registradores callee-saved
    sd ra,  0x00(a0)
    sd sp,  0x08(a0)
    sd s0,  0x10(a0)
    sd s1,  0x18(a0)
    sd s2,  0x20(a0)
    sd s3,  0x28(a0)
    sd s4,  0x30(a0)
    sd s5,  0x38(a0)
    sd s6,  0x40(a0)
    sd s7,  0x48(a0)
    sd s8,  0x50(a0)
    sd s9,  0x58(a0)
    sd s10, 0x60(a0)
    sd s11, 0x68(a0)

    // --- Ponto de Troca ---

    ld ra,  0x00(a1)
    ld sp,  0x08(a1)
    ld s0,  0x10(a1)
    ld s1,  0x18(a1)
    ld s2,  0x20(a1)
    ld s3,  0x28(a1)
    ld s4,  0x30(a1)
    ld s5,  0x38(a1)
    ld s6,  0x40(a1)
    ld s7,  0x48(a1)
    ld s8,  0x50(a1)
    ld s9,  0x58(a1)
    ld s10, 0x60(a1)
    ld s11, 0x68(a1)

    // Retoma no ra restaurado (ponto de suspensão ou first-enter)
    ret

.global thread_first_enter_asm
thread_first_enter_asm:
    // Primeira retomada de uma thread recém-criada. Os registradores s
    // foram semeados por init_context; o hook Rust nunca retorna e nunca
    // pode ser re-executado para a mesma thread.
    mv a0, s0      // *mut Thread
    mv a1, s1      // entry point
    mv a2, s2      // argumento
    mv a3, s3      // estado de interrupções (1 = habilitar)
    call context_first_enter
    unimp

.global fpu_store_asm
fpu_store_asm:
    // a0 = FpuState*
    fsd f0,  0*8(a0)
    fsd f1,  1*8(a0)
    fsd f2,  2*8(a0)
    fsd f3,  3*8(a0)
    fsd f4,  4*8(a0)
    fsd f5,  5*8(a0)
    fsd f6,  6*8(a0)
    fsd f7,  7*8(a0)
    fsd f8,  8*8(a0)
    fsd f9,  9*8(a0)
    fsd f10, 10*8(a0)
    fsd f11, 11*8(a0)
    fsd f12, 12*8(a0)
    fsd f13, 13*8(a0)
    fsd f14, 14*8(a0)
    fsd f15, 15*8(a0)
    fsd f16, 16*8(a0)
    fsd f17, 17*8(a0)
    fsd f18, 18*8(a0)
    fsd f19, 19*8(a0)
    fsd f20, 20*8(a0)
    fsd f21, 21*8(a0)
    fsd f22, 22*8(a0)
    fsd f23, 23*8(a0)
    fsd f24, 24*8(a0)
    fsd f25, 25*8(a0)
    fsd f26, 26*8(a0)
    fsd f27, 27*8(a0)
    fsd f28, 28*8(a0)
    fsd f29, 29*8(a0)
    fsd f30, 30*8(a0)
    fsd f31, 31*8(a0)
    csrr t0, fcsr
    sd t0, 32*8(a0)
    ret

.global fpu_load_asm
fpu_load_asm:
    // a0 = FpuState*
    fld f0,  0*8(a0)
    fld f1,  1*8(a0)
    fld f2,  2*8(a0)
    fld f3,  3*8(a0)
    fld f4,  4*8(a0)
    fld f5,  5*8(a0)
    fld f6,  6*8(a0)
    fld f7,  7*8(a0)
    fld f8,  8*8(a0)
    fld f9,  9*8(a0)
    fld f10, 10*8(a0)
    fld f11, 11*8(a0)
    fld f12, 12*8(a0)
    fld f13, 13*8(a0)
    fld f14, 14*8(a0)
    fld f15, 15*8(a0)
    fld f16, 16*8(a0)
    fld f17, 17*8(a0)
    fld f18, 18*8(a0)
    fld f19, 19*8(a0)
    fld f20, 20*8(a0)
    fld f21, 21*8(a0)
    fld f22, 22*8(a0)
    fld f23, 23*8(a0)
    fld f24, 24*8(a0)
    fld f25, 25*8(a0)
    fld f26, 26*8(a0)
    fld f27, 27*8(a0)
    fld f28, 28*8(a0)
    fld f29, 29*8(a0)
    fld f30, 30*8(a0)
    fld f31, 31*8(a0)
    ld t0, 32*8(a0)
    csrw fcsr, t0
    ret

.global user_context_restore_asm
user_context_restore_asm:
    // a0 = RegisterState* preparado por init_context no topo da pilha de
    // kernel da thread. Carrega o snapshot inteiro e executa sret para o
    // modo de privilégio indicado em sstatus.SPP.
    ld t0, 0xF8(a0)
    csrw sepc, t0
    ld t0, 0x100(a0)
    csrw sstatus, t0

    ld x1,  0x00(a0)
    ld x2,  0x08(a0)
    ld x3,  0x10(a0)
    ld x4,  0x18(a0)
    ld x5,  0x20(a0)
    ld x6,  0x28(a0)
    ld x7,  0x30(a0)
    ld x8,  0x38(a0)
    ld x9,  0x40(a0)
    // x10 (a0) é o registrador base: restaurado por último
    ld x11, 0x50(a0)
    ld x12, 0x58(a0)
    ld x13, 0x60(a0)
    ld x14, 0x68(a0)
    ld x15, 0x70(a0)
    ld x16, 0x78(a0)
    ld x17, 0x80(a0)
    ld x18, 0x88(a0)
    ld x19, 0x90(a0)
    ld x20, 0x98(a0)
    ld x21, 0xA0(a0)
    ld x22, 0xA8(a0)
    ld x23, 0xB0(a0)
    ld x24, 0xB8(a0)
    ld x25, 0xC0(a0)
    ld x26, 0xC8(a0)
    ld x27, 0xD0(a0)
    ld x28, 0xD8(a0)
    ld x29, 0xE0(a0)
    ld x30, 0xE8(a0)
    ld x31, 0xF0(a0)
    ld x10, 0x48(a0)
    sret
"#
);

extern "C" {
    fn context_switch_asm(old: u64, new: u64);
    fn fpu_store_asm(state: u64);
    fn fpu_load_asm(state: u64);
    pub fn thread_first_enter_asm();
    pub fn user_context_restore_asm(frame: u64) -> !;
}
