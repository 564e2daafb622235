//! Gerenciamento de Memória.
//!
//! Neste núcleo o subsistema de memória se resume ao heap do kernel e aos
//! tipos de endereço; paginação e page tables pertencem a um colaborador
//! externo que só pede invalidações de TLB ao bloco de controle por-CPU.

pub mod addr;
pub mod heap;

pub use addr::VirtAddr;
