//! Constantes do subsistema de threads.

/// Tamanho da pilha de kernel de cada thread (16 KiB)
pub const THREAD_STACK_SIZE: usize = 16 * 1024;

/// Bytes reservados no topo da pilha para o frame inicial de threads de
/// modo usuário (RegisterState + alinhamento).
pub const USER_FRAME_RESERVE: usize = 288;
