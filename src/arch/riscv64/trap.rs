//! Vetor de traps e snapshot de registradores (riscv64)
//!
//! O vetor salva o estado completo do fluxo interrompido em um
//! `RegisterState` na pilha, monta um `TrapFrame` encadeável e percorre o
//! protocolo de entrada/saída do bloco de controle por-CPU:
//! `enter_trap` -> despacho -> `exit_trap` -> restauração -> `sret`.
//!
//! O vetor assume que o trap chegou com uma pilha de kernel válida em `sp`.
//! TODO: trocar para a pilha do kernel via sscratch quando a entrega de
//! traps em modo usuário for habilitada junto com o VMM.

use riscv::register::mtvec::TrapMode;
use riscv::register::{scause, sie, stvec};

use crate::arch::riscv64::cpu::SstatusFlags;
use crate::cpu::Processor;
use crate::sys::types::ExecutionMode;

/// Snapshot completo dos registradores no momento do trap.
///
/// Layout `#[repr(C)]` compartilhado com o assembly do vetor e com
/// `user_context_restore_asm`: x1..x31 seguidos dos CSRs capturados.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct RegisterState {
    /// x1..x31 (x0 é constante zero e não é salvo). `x[i]` = registrador x(i+1).
    pub x: [u64; 31],
    /// Endereço da instrução interrompida (0xF8)
    pub sepc: u64,
    /// sstatus no momento do trap (0x100)
    pub sstatus: u64,
    /// Causa do trap (0x108)
    pub scause: u64,
    /// Endereço/valor associado à causa (0x110)
    pub stval: u64,
}

impl RegisterState {
    pub const fn zeroed() -> Self {
        Self {
            x: [0; 31],
            sepc: 0,
            sstatus: 0,
            scause: 0,
            stval: 0,
        }
    }

    /// Modo de privilégio em que o fluxo interrompido executava,
    /// decodificado de sstatus.SPP.
    pub fn previous_mode(&self) -> ExecutionMode {
        if SstatusFlags::from_bits_truncate(self.sstatus).contains(SstatusFlags::SPP) {
            ExecutionMode::Kernel
        } else {
            ExecutionMode::User
        }
    }

    /// Ponteiro de pilha do fluxo interrompido.
    pub fn stack_pointer(&self) -> u64 {
        self.x[1] // x2 = sp
    }
}

/// Frame de trap encadeável.
///
/// Cada trap ativo de uma thread forma uma lista ligada via `next_trap`
/// (o trap mais recente na cabeça). A cadeia é a única fonte de verdade
/// sobre aninhamento de traps.
#[repr(C)]
pub struct TrapFrame {
    pub regs: *mut RegisterState,
    pub next_trap: *mut TrapFrame,
}

impl TrapFrame {
    pub fn new(regs: *mut RegisterState) -> Self {
        Self {
            regs,
            next_trap: core::ptr::null_mut(),
        }
    }
}

/// Instala o vetor de traps e habilita as fontes de interrupção do
/// supervisor. Chamado uma vez por núcleo na inicialização tardia.
pub unsafe fn init() {
    stvec::write(trap_vector_asm as usize, TrapMode::Direct);

    // Fontes individuais; a entrega global (sstatus.SIE) é ligada depois,
    // pelo chamador.
    sie::set_ssoft();
    sie::set_stimer();
    sie::set_sext();

    crate::ktrace!("(Arch) Vetor de traps instalado, fontes S habilitadas");
}

// Códigos de interrupção do supervisor (scause com bit de interrupção)
const INT_SUPERVISOR_SOFT: usize = 1;
const INT_SUPERVISOR_TIMER: usize = 5;
const INT_SUPERVISOR_EXTERNAL: usize = 9;

/// Handler central de traps, chamado pelo vetor com o snapshot na pilha.
///
/// Monta o `TrapFrame` desta entrada, encadeia-o na thread atual via
/// `enter_trap` e garante que `exit_trap` rode no caminho de retorno -
/// é ali que drenagem de deferred calls e a decisão de escalonamento
/// acontecem.
#[no_mangle]
extern "C" fn trap_handler(regs: &mut RegisterState) {
    let mut frame = TrapFrame::new(regs as *mut RegisterState);
    let scause = scause::read();

    let processor = Processor::current();
    unsafe { processor.enter_trap(&mut frame, scause.is_interrupt()) };

    if scause.is_interrupt() {
        match scause.code() {
            INT_SUPERVISOR_SOFT => {
                unsafe { riscv::register::sip::clear_ssoft() };
                crate::kdebug!("(Trap) Interrupção de software");
            }
            INT_SUPERVISOR_TIMER => {
                crate::time::tick();
                crate::sched::core::scheduler::set_need_resched();
            }
            INT_SUPERVISOR_EXTERNAL => {
                // Sem roteamento de PLIC neste núcleo; apenas registra.
                crate::kdebug!("(Trap) Interrupção externa sem consumidor");
            }
            code => {
                crate::kwarn!("(Trap) Interrupção desconhecida: código {}", code);
            }
        }
    } else {
        handle_exception(regs, scause.code());
    }

    unsafe { processor.exit_trap(&mut frame) };
}

/// Exceções síncronas. Breakpoint é informativo; o resto é fatal -
/// continuar depois de um estado inválido corromperia execução futura.
fn handle_exception(regs: &mut RegisterState, code: usize) {
    use crate::arch::traits::CpuOps;

    const EXC_BREAKPOINT: usize = 3;

    if code == EXC_BREAKPOINT {
        crate::kinfo!("EXCEPTION: BREAKPOINT em {:#x}", regs.sepc);
        // Avança sobre o ebreak (4 bytes, não comprimido)
        regs.sepc += 4;
        return;
    }

    crate::kerror!(
        "EXCEPTION: scause={} sepc={:#x} stval={:#x} core={}",
        code,
        regs.sepc,
        regs.stval,
        crate::arch::Cpu::current_id().0
    );
    crate::arch::Cpu::hang();
}

// Vetor de traps.
// Reserva 288 bytes (RegisterState + padding de alinhamento de 16) e salva
// x1..x31 + CSRs nos offsets do struct. O sp original é reconstruído
// (sp + 288) antes de ser salvo no slot de x2.
core::arch::global_asm!(
    r#"
.balign 4
.global trap_vector_asm
trap_vector_asm:
    addi sp, sp, -288

    sd x1,  0x00(sp)
    // x2 (sp) salvo depois, via t0
    sd x3,  0x10(sp)
    sd x4,  0x18(sp)
    sd x5,  0x20(sp)
    sd x6,  0x28(sp)
    sd x7,  0x30(sp)
    sd x8,  0x38(sp)
    sd x9,  0x40(sp)
    sd x10, 0x48(sp)
    sd x11, 0x50(sp)
    sd x12, 0x58(sp)
    sd x13, 0x60(sp)
    sd x14, 0x68(sp)
    sd x15, 0x70(sp)
    sd x16, 0x78(sp)
    sd x17, 0x80(sp)
    sd x18, 0x88(sp)
    sd x19, 0x90(sp)
    sd x20, 0x98(sp)
    sd x21, 0xA0(sp)
    sd x22, 0xA8(sp)
    sd x23, 0xB0(sp)
    sd x24, 0xB8(sp)
    sd x25, 0xC0(sp)
    sd x26, 0xC8(sp)
    sd x27, 0xD0(sp)
    sd x28, 0xD8(sp)
    sd x29, 0xE0(sp)
    sd x30, 0xE8(sp)
    sd x31, 0xF0(sp)

    addi t0, sp, 288
    sd t0, 0x08(sp)

    csrr t0, sepc
    sd t0, 0xF8(sp)
    csrr t0, sstatus
    sd t0, 0x100(sp)
    csrr t0, scause
    sd t0, 0x108(sp)
    csrr t0, stval
    sd t0, 0x110(sp)

    mv a0, sp
    call trap_handler

    // exit_trap deixou as interrupções mascaradas; o sret restaura a
    // entrega conforme o sstatus salvo (SPIE).
    ld t0, 0xF8(sp)
    csrw sepc, t0
    ld t0, 0x100(sp)
    csrw sstatus, t0

    ld x1,  0x00(sp)
    ld x3,  0x10(sp)
    ld x4,  0x18(sp)
    ld x5,  0x20(sp)
    ld x6,  0x28(sp)
    ld x7,  0x30(sp)
    ld x8,  0x38(sp)
    ld x9,  0x40(sp)
    ld x10, 0x48(sp)
    ld x11, 0x50(sp)
    ld x12, 0x58(sp)
    ld x13, 0x60(sp)
    ld x14, 0x68(sp)
    ld x15, 0x70(sp)
    ld x16, 0x78(sp)
    ld x17, 0x80(sp)
    ld x18, 0x88(sp)
    ld x19, 0x90(sp)
    ld x20, 0x98(sp)
    ld x21, 0xA0(sp)
    ld x22, 0xA8(sp)
    ld x23, 0xB0(sp)
    ld x24, 0xB8(sp)
    ld x25, 0xC0(sp)
    ld x26, 0xC8(sp)
    ld x27, 0xD0(sp)
    ld x28, 0xD8(sp)
    ld x29, 0xE0(sp)
    ld x30, 0xE8(sp)
    ld x31, 0xF0(sp)

    ld sp, 0x08(sp)
    sret
"#
);

extern "C" {
    pub fn trap_vector_asm();
}
