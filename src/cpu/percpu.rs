//! Registro por-CPU de blocos de controle.
//!
//! Um slot por núcleo, indexado pelo hart ID que o `_start` deixou em
//! `tp`. O acesso de escrita é restrito ao slot do próprio núcleo; não há
//! variável global mutável solta - todo acesso passa por `current()` ou
//! pelo acessor de diagnóstico `by_id()`.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::{Cpu, CpuOps};
use crate::cpu::Processor;
use crate::sys::types::CoreId;
use crate::sys::Errno;

/// Número máximo de núcleos suportados.
pub const MAX_CORES: usize = 8;

struct Registry {
    slots: [UnsafeCell<Option<Processor>>; MAX_CORES],
    online: [AtomicBool; MAX_CORES],
}

// SAFETY: cada slot é escrito uma única vez, pelo próprio núcleo, durante
// o boot (antes de qualquer concorrência); depois disso só há leituras.
unsafe impl Sync for Registry {}

static REGISTRY: Registry = Registry {
    slots: [const { UnsafeCell::new(None) }; MAX_CORES],
    online: [const { AtomicBool::new(false) }; MAX_CORES],
};

/// Publica o bloco de controle de um núcleo. Chamado exatamente uma vez
/// por núcleo, em `Processor::early_initialize`.
pub(super) fn install(core_id: CoreId, processor: Processor) -> &'static Processor {
    let index = core_id.as_usize();
    assert!(
        index < MAX_CORES,
        "(CPU{}) hart ID fora do registro (máx {})",
        core_id.0,
        MAX_CORES
    );
    assert!(
        core_id == Cpu::current_id(),
        "(CPU{}) early_initialize executando no núcleo errado",
        core_id.0
    );

    if REGISTRY.online[index].load(Ordering::Acquire) {
        panic!("(CPU{}) bloco de controle registrado duas vezes", core_id.0);
    }

    // SAFETY: slot do próprio núcleo, ainda não publicado.
    let slot = unsafe { &mut *REGISTRY.slots[index].get() };
    *slot = Some(processor);
    REGISTRY.online[index].store(true, Ordering::Release);

    slot.as_ref().unwrap()
}

/// Bloco de controle do núcleo atual.
///
/// Só é válido depois de `early_initialize` deste núcleo; antes disso é
/// um bug fatal de ordem de boot.
#[inline]
pub fn current() -> &'static Processor {
    let index = Cpu::current_id().as_usize();
    assert!(
        index < MAX_CORES && REGISTRY.online[index].load(Ordering::Acquire),
        "Processor::current antes de early_initialize deste núcleo"
    );

    // SAFETY: publicado e imutável estruturalmente após o boot.
    unsafe { (*REGISTRY.slots[index].get()).as_ref().unwrap() }
}

/// Bloco de controle de um núcleo específico, para diagnóstico.
pub fn by_id(core_id: CoreId) -> Result<&'static Processor, Errno> {
    let index = core_id.as_usize();
    if index >= MAX_CORES || !REGISTRY.online[index].load(Ordering::Acquire) {
        return Err(Errno::ENODEV);
    }

    // SAFETY: publicado e imutável estruturalmente após o boot.
    Ok(unsafe { (*REGISTRY.slots[index].get()).as_ref().unwrap() })
}

/// Quantos núcleos já publicaram seus blocos.
pub fn online_count() -> usize {
    REGISTRY
        .online
        .iter()
        .filter(|flag| flag.load(Ordering::Acquire))
        .count()
}
