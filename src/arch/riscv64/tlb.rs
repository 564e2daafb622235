//! Invalidação de TLB (riscv64)
//!
//! Este núcleo fornece apenas o mecanismo; quem decide *quando* invalidar
//! é o gerenciador de page tables. Sem suporte a SMP não há shootdown -
//! toda invalidação é local ao hart.

use crate::mm::addr::VirtAddr;

/// Invalida as traduções de um intervalo de páginas neste hart.
///
/// TODO: invalidar somente as páginas afetadas com `sfence.vma rs1` por
/// página quando page_count for pequeno; por ora o flush é sempre total.
pub fn flush_local(_vaddr: VirtAddr, _page_count: usize) {
    flush_all_local();
}

/// Invalida todas as traduções deste hart (sfence.vma).
pub fn flush_all_local() {
    unsafe { riscv::asm::sfence_vma_all() };
}
