/*
 * Interrupt Management Module
 *
 * This module provides the x86_64 implementation of InterruptControl on top
 * of the RFLAGS.IF flag. It is the interrupt half of every IrqSpinLock used
 * on real hardware.
 *
 * Why this is important:
 * - Disabling local interrupts before taking a spinlock keeps an interrupt
 *   handler on the same core from spinning on a lock its own CPU holds
 * - The same flag marks scheduler critical sections on a uniprocessor
 */

use x86_64::instructions::interrupts;

use crate::arch::InterruptControl;

/// RFLAGS.IF based interrupt control
pub struct X86Irq;

impl InterruptControl for X86Irq {
    /// Check if interrupts are enabled
    #[inline]
    fn are_enabled() -> bool {
        interrupts::are_enabled()
    }

    /// Enable interrupts on this core
    ///
    /// Should only be called after the IDT has been properly initialized.
    #[inline]
    fn enable() {
        interrupts::enable();
    }

    /// Disable interrupts on this core
    #[inline]
    fn disable() {
        interrupts::disable();
    }
}

/// Atomically enable interrupts and halt until the next one arrives
///
/// `sti; hlt` leaves no window for a wake-up interrupt to slip in between
/// the two instructions, so the idle loop cannot sleep through it.
pub fn enable_and_wait() {
    interrupts::enable_and_hlt();
}
