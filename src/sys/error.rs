//! # Standard Error Codes (Errno)
//!
//! Define os códigos de erro retornados pelo kernel.
//! Baseado no padrão POSIX para compatibilidade com ferramentas existentes.
//!
//! Dentro do núcleo por-CPU não existe canal de erro recuperável: violações
//! de invariante derrubam o sistema via panic. `Errno` existe para as
//! operações de capacidade ainda não suportadas (ex: `ENOSYS`) e para as
//! interfaces com colaboradores externos.

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    EPERM = 1,    // Operation not permitted
    ESRCH = 3,    // No such process
    EINTR = 4,    // Interrupted system call
    EIO = 5,      // I/O error
    EAGAIN = 11,  // Try again
    ENOMEM = 12,  // Out of memory
    EFAULT = 14,  // Bad address
    EBUSY = 16,   // Device or resource busy
    ENODEV = 19,  // No such device
    EINVAL = 22,  // Invalid argument
    ENOSPC = 28,  // No space left on device
    ENOSYS = 38,  // Function not implemented
}

impl Errno {
    pub fn as_usize(self) -> usize {
        self as usize
    }

    pub fn as_isize(self) -> isize {
        -(self as i32) as isize
    }
}
