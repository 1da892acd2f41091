/*
 * Architecture Abstraction Layer
 *
 * The scheduler never touches hardware directly. Everything it needs from
 * the CPU goes through two traits:
 *
 * - InterruptControl: the local interrupt flag. Stateless (associated
 *   functions only) so IrqSpinLock can name it as a type parameter and still
 *   be built in a `const` context.
 * - Platform: CPU identity, thread context creation, the context-switch
 *   primitive, reschedule IPIs and the idle halt.
 *
 * Backends:
 * - x86_64: real hardware (RFLAGS.IF, x2APIC IPIs, callee-saved stack switch)
 * - host:   test-only simulation where every std thread is a "CPU"
 */

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(test)]
pub mod host;

use crate::error::SchedError;
use crate::scheduler::{CpuId, ThreadEntry};

/// Saved local interrupt-enable state
///
/// Returned by `InterruptControl::disable_save` and handed back to
/// `InterruptControl::restore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqState {
    enabled: bool,
}

impl IrqState {
    pub const ENABLED: IrqState = IrqState { enabled: true };
    pub const DISABLED: IrqState = IrqState { enabled: false };

    pub const fn was_enabled(self) -> bool {
        self.enabled
    }
}

/// Local interrupt flag control
pub trait InterruptControl {
    /// Check if interrupts are enabled on the calling CPU
    fn are_enabled() -> bool;

    /// Enable interrupts on the calling CPU
    fn enable();

    /// Disable interrupts on the calling CPU
    fn disable();

    /// Disable interrupts and return the previous state
    fn disable_save() -> IrqState {
        let state = if Self::are_enabled() {
            IrqState::ENABLED
        } else {
            IrqState::DISABLED
        };
        Self::disable();
        state
    }

    /// Put the interrupt flag back to a state saved by `disable_save`
    fn restore(state: IrqState) {
        if state.was_enabled() {
            Self::enable();
        } else {
            Self::disable();
        }
    }
}

/// Hardware services consumed by the scheduler
pub trait Platform: Send + Sync + 'static {
    /// Interrupt flag control for this platform
    type Irq: InterruptControl;

    /// Saved register/stack state of a thread, opaque to the scheduler
    ///
    /// `Default` is the "nothing saved yet" context used for a CPU's idle
    /// flow; the first switch away from idle fills it in.
    type Context: Default + Send + 'static;

    /// Index of the calling CPU
    fn cpu_id(&self) -> CpuId;

    /// Called when a CPU is installed in the per-CPU table
    fn cpu_online(&self, _cpu: CpuId, _apic_id: u32) {}

    /// Build the initial context of a new thread
    ///
    /// The first switch into the returned context must start executing
    /// `entry(arg)` with interrupts enabled.
    fn new_context(&self, entry: ThreadEntry, arg: usize) -> Result<Self::Context, SchedError>;

    /// Save the running state into `prev` and resume `next`
    ///
    /// Returns when some later switch resumes `prev`.
    ///
    /// # Safety
    /// Both pointers must be valid for the whole switch, must not alias, and
    /// local interrupts must be disabled.
    unsafe fn switch_context(&self, prev: *mut Self::Context, next: *const Self::Context);

    /// Ask `target` to run its scheduler
    fn send_ipi(&self, target: CpuId);

    /// Acknowledge the reschedule IPI on the calling CPU
    fn ack_ipi(&self);

    /// Halt the calling CPU until the next interrupt
    fn wait_for_interrupt(&self);
}
