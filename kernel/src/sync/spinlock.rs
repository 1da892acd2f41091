/*
 * IRQ-Saving Spinlock
 *
 * LOCKING PROTOCOL:
 * =================
 *
 * lock():
 * 1. Save the local interrupt flag and disable interrupts
 * 2. Try the atomic test-and-set on the lock word
 * 3. On failure: put the saved flag back, spin reading the lock word until
 *    it looks free, then go to 1
 *
 * unlock (guard drop):
 * 1. Release the lock word
 * 2. Restore the saved interrupt flag
 *
 * Releasing before restoring matters: if interrupts came back first, a
 * handler on this core could fire while the lock is still held and spin on
 * it forever.
 *
 * While spinning the interrupt flag is whatever the caller had, so a CPU
 * waiting for a contended run-queue still takes its timer tick. A caller that
 * already runs with interrupts off (an interrupt handler, or code holding
 * another IrqSpinLock) keeps them off the whole time.
 *
 * The interrupt controller is a type parameter. Kernels use the hardware
 * one; tests use a per-thread simulated flag.
 */

use core::fmt;
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use spin::{Mutex, MutexGuard};

use crate::arch::{InterruptControl, IrqState};

/// Spinlock that keeps local interrupts disabled while held
pub struct IrqSpinLock<T, I: InterruptControl> {
    inner: Mutex<T>,
    _irq: PhantomData<fn() -> I>,
}

impl<T, I: InterruptControl> IrqSpinLock<T, I> {
    /// Create an unlocked spinlock
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            _irq: PhantomData,
        }
    }

    /// Acquire the lock, spinning until it is free
    ///
    /// Local interrupts are disabled when this returns and stay disabled
    /// until the guard is dropped.
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T, I> {
        loop {
            let state = I::disable_save();
            if let Some(guard) = self.inner.try_lock() {
                return IrqSpinLockGuard::new(guard, state);
            }
            I::restore(state);

            while self.inner.is_locked() {
                core::hint::spin_loop();
            }
        }
    }

    /// Single acquisition attempt
    ///
    /// Returns `None` with the interrupt flag unchanged if the lock is held.
    pub fn try_lock(&self) -> Option<IrqSpinLockGuard<'_, T, I>> {
        let state = I::disable_save();
        match self.inner.try_lock() {
            Some(guard) => Some(IrqSpinLockGuard::new(guard, state)),
            None => {
                I::restore(state);
                None
            }
        }
    }

    /// Snapshot of the lock word (diagnostics only)
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Access the data through an exclusive borrow, no locking needed
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T, I: InterruptControl> fmt::Debug for IrqSpinLock<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrqSpinLock")
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// Scoped ownership of an IrqSpinLock
pub struct IrqSpinLockGuard<'a, T, I: InterruptControl> {
    guard: ManuallyDrop<MutexGuard<'a, T>>,
    state: IrqState,
    _irq: PhantomData<fn() -> I>,
}

impl<'a, T, I: InterruptControl> IrqSpinLockGuard<'a, T, I> {
    fn new(guard: MutexGuard<'a, T>, state: IrqState) -> Self {
        Self {
            guard: ManuallyDrop::new(guard),
            state,
            _irq: PhantomData,
        }
    }

    /// Interrupt state that will be restored on drop
    pub fn saved_state(&self) -> IrqState {
        self.state
    }
}

impl<T, I: InterruptControl> Deref for IrqSpinLockGuard<'_, T, I> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, I: InterruptControl> DerefMut for IrqSpinLockGuard<'_, T, I> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T, I: InterruptControl> Drop for IrqSpinLockGuard<'_, T, I> {
    fn drop(&mut self) {
        // SAFETY: the guard is dropped exactly once, here, and never used
        // afterwards.
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        I::restore(self.state);
    }
}

/// Local interrupts disabled for the lifetime of the value
///
/// Used where a critical section outlives any single lock, e.g. the span
/// between releasing the run-queue lock and the context switch.
pub struct IrqGuard<I: InterruptControl> {
    state: IrqState,
    _irq: PhantomData<fn() -> I>,
}

impl<I: InterruptControl> IrqGuard<I> {
    pub fn new() -> Self {
        Self {
            state: I::disable_save(),
            _irq: PhantomData,
        }
    }
}

impl<I: InterruptControl> Default for IrqGuard<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: InterruptControl> Drop for IrqGuard<I> {
    fn drop(&mut self) {
        I::restore(self.state);
    }
}
