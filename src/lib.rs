//! Cinder Kernel Library.
//!
//! Ponto central de exportação dos módulos do Kernel.
//! Define a estrutura hierárquica do sistema operacional.

#![no_std]

// Habilitar alocação dinâmica (necessário para Box/VecDeque)
extern crate alloc;

// --- Módulos de Baixo Nível (Hardware) ---
pub mod arch; // HAL (CPU, contexto, trap, TLB)
pub mod drivers; // Drivers Específicos (Serial)

// --- Módulos Centrais (Lógica do Kernel) ---
pub mod boot; // Entry point lógico (kernel_main)
pub mod cpu; // Bloco de controle por-CPU (Processor)
pub mod debug; // Logging e estatísticas
pub mod klib; // Utilitários internos (framework de testes)
pub mod mm; // Gerenciamento de memória (Heap, endereços)
pub mod sync; // Primitivas de sincronização (Spinlock)
pub mod sys; // Definições de sistema (erros, tipos)
pub mod time; // Relógio monotônico
pub mod work; // Execução diferida (deferred calls)

// --- Subsistemas Avançados ---
pub mod sched; // Motor de troca de contexto e threads

mod panic;
