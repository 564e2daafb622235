//! Implementação riscv64 do HAL.
//!
//! Convenções assumidas por todo o módulo:
//! - O kernel roda em modo supervisor (S-mode), carregado pelo OpenSBI.
//! - O registrador `tp` guarda o ID do hart desde o `_start` e não é
//!   reutilizado para TLS de kernel.

pub mod context;
pub mod cpu;
pub mod tlb;
pub mod trap;

pub use cpu::RvCpu as Cpu;
