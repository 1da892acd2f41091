/*
 * Synchronization Primitives
 *
 * Every structure shared between CPUs (run-queues, the thread arena) sits
 * behind an IrqSpinLock. Taking the lock disables local interrupts first, so
 * an interrupt handler on the same core can never spin on a lock its own
 * interrupted context holds.
 */

pub mod spinlock;

pub use spinlock::{IrqGuard, IrqSpinLock, IrqSpinLockGuard};
