//! # Hardware Abstraction Layer (HAL)
//!
//! O módulo `arch` atua como a **única** ponte entre o núcleo lógico do
//! kernel e o hardware real. Toda interação com CSRs, instruções
//! privilegiadas e controle de CPU deve passar por aqui.
//!
//! ## Arquitetura e Fluxo
//! 1. O núcleo importa `crate::arch::Cpu`.
//! 2. `Cpu` é um *type alias* para a implementação concreta (`riscv64::RvCpu`).
//! 3. Funções como `Cpu::halt()` viram instruções específicas (ex: `wfi`).

pub mod traits;

// Seleção de Arquitetura: riscv64
#[cfg(target_arch = "riscv64")]
pub mod riscv64;

#[cfg(target_arch = "riscv64")]
pub use riscv64 as platform;

// Re-exports globais para o kernel usar
pub use platform::Cpu;
pub use traits::*;

#[cfg(feature = "self_test")]
pub mod test;
