//! Cinder Kernel - Binário Principal.
//!
//! Responsabilidade do `_start`:
//! 1. Guardar o hart ID em `tp` (identidade do núcleo para `current_id`).
//! 2. Estacionar harts secundários (apenas o hart 0 é escalonado).
//! 3. Configurar a pilha de boot.
//! 4. **ZERAR BSS** (o firmware não garante a seção limpa).
//! 5. Saltar para `boot::entry::kernel_main` (da biblioteca `cinder`).

#![no_std]
#![no_main]

// Pilha de boot do núcleo (64 KiB)
const BOOT_STACK_SIZE: usize = 64 * 1024;

#[repr(align(16))]
struct KernelStack([u8; BOOT_STACK_SIZE]);

#[no_mangle]
static mut KERNEL_STACK: KernelStack = KernelStack([0; BOOT_STACK_SIZE]);

core::arch::global_asm!(
    r#"
.section .text._start
.global _start
_start:
    // Convenção SBI: a0 = hart ID, a1 = ponteiro do device tree
    mv tp, a0
    bnez a0, 2f

    // Pilha de boot (cresce para baixo a partir do topo)
    la sp, {stack}
    li t0, {stack_size}
    add sp, sp, t0

    // Zerar BSS (__bss_start/__bss_end vêm do linker script)
    la t0, __bss_start
    la t1, __bss_end
1:
    bgeu t0, t1, 3f
    sd zero, 0(t0)
    addi t0, t0, 8
    j 1b
3:
    call {main}

2:
    // Harts secundários estacionam aqui até o despertar SMP existir
    wfi
    j 2b
"#,
    stack = sym KERNEL_STACK,
    stack_size = const BOOT_STACK_SIZE,
    main = sym cinder::boot::entry::kernel_main,
);
