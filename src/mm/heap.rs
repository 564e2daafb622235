//! Heap do kernel
//!
//! Alocador de lista encadeada sobre uma arena estática. Suficiente para
//! as estruturas dinâmicas deste núcleo (threads, deferred calls, filas);
//! um PMM/VMM de verdade substituirá a arena no futuro.

use linked_list_allocator::LockedHeap;

/// Tamanho da arena do heap (1 MiB)
const HEAP_SIZE: usize = 1024 * 1024;

#[repr(align(16))]
struct HeapArena([u8; HEAP_SIZE]);

static mut HEAP_ARENA: HeapArena = HeapArena([0; HEAP_SIZE]);

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Inicializa o heap do kernel. Chamar exatamente uma vez, antes de
/// qualquer alocação.
pub fn init() {
    unsafe {
        let base = core::ptr::addr_of_mut!(HEAP_ARENA.0) as *mut u8;
        ALLOCATOR.lock().init(base, HEAP_SIZE);
    }
    crate::kinfo!("(MM) Heap do kernel: {} KiB", HEAP_SIZE / 1024);
}
