//! Spinlock - bloqueio com busy-wait
//!
//! # Quando usar
//!
//! - Seções críticas MUITO curtas
//! - Estado compartilhado com handlers de interrupção
//! - Quando não pode chamar o scheduler
//!
//! O lock desabilita interrupções enquanto estiver adquirido; sem isso, um
//! handler que tentasse o mesmo lock no mesmo núcleo ficaria em deadlock.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::CpuOps;
use crate::sync::irq::InterruptsState;

pub struct Spinlock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: Spinlock protege acesso com lock atômico
unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Adquire o lock, desabilitando interrupções durante a posse.
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        let previous = InterruptsState::capture();
        unsafe { crate::arch::Cpu::disable_interrupts() };

        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }

        SpinlockGuard {
            lock: self,
            previous_interrupts: previous,
        }
    }

    /// Tenta adquirir sem bloquear.
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        let previous = InterruptsState::capture();
        unsafe { crate::arch::Cpu::disable_interrupts() };

        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinlockGuard {
                lock: self,
                previous_interrupts: previous,
            })
        } else {
            unsafe { previous.restore() };
            None
        }
    }
}

/// Guard do spinlock - libera ao sair do escopo
pub struct SpinlockGuard<'a, T> {
    lock: &'a Spinlock<T>,
    previous_interrupts: InterruptsState,
}

impl<T> Deref for SpinlockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: Lock está adquirido
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: Lock está adquirido
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        unsafe { self.previous_interrupts.restore() };
    }
}
