//! # Threads & Motor de Troca de Contexto
//!
//! O módulo `sched` contém a máquina de estados de execução de threads e
//! o motor de troca de contexto, mais um escalonador round-robin mínimo.
//!
//! A política de escalonamento é deliberadamente trivial: o contrato
//! deste núcleo é o ponto de encaixe (`check_invoke_scheduler` no
//! `Processor` + `invoke` aqui), não a heurística de escolha. Qualquer
//! política futura se pluga no mesmo seam sem tocar no motor.

pub mod config;
pub mod core;
pub mod task;

#[cfg(feature = "self_test")]
pub mod test;
