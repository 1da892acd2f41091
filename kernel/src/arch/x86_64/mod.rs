/*
 * x86_64 Architecture Support Module
 *
 * This module contains the x86_64 implementation of the Platform trait.
 *
 * Submodules:
 * - interrupts: RFLAGS.IF control (InterruptControl)
 * - context:    kernel stack switching and first-run thread frames
 * - apic:       x2APIC id, reschedule IPIs and EOI
 *
 * Wiring expected from the kernel:
 * - IDT vector 32 (timer) signals EOI with apic::end_of_interrupt() first,
 *   then calls Scheduler::on_timer_tick(cpu)
 * - IDT vector RESCHEDULE_VECTOR calls Scheduler::on_reschedule_ipi(cpu),
 *   which signals EOI itself through Platform::ack_ipi before switching
 * - Each core calls Scheduler::idle_loop(cpu) once its bring-up is done
 *
 * EOI has to come before the scheduler call. A switch into a thread that has
 * never run starts it at its entry point, so the handler frame that would
 * have sent a late EOI is not resumed until that thread is switched out
 * again. Until then the local APIC holds back every interrupt at or below
 * the in-service vector, timer included.
 *
 * cpu_id() panics on a core whose APIC id was never passed to cpu_online().
 */

pub mod apic;
pub mod context;
pub mod interrupts;

use core::sync::atomic::{AtomicU32, Ordering};

pub use context::X86Context;
pub use interrupts::X86Irq;

use crate::arch::Platform;
use crate::config::{MAX_CPUS, RESCHEDULE_VECTOR};
use crate::error::{InvariantViolation, SchedError};
use crate::scheduler::{CpuId, ThreadEntry};

/// Marks a per-CPU slot whose APIC id is not known yet
const NO_APIC: u32 = u32::MAX;

/// x86_64 hardware platform
pub struct X86_64Platform {
    /// CPU index -> local APIC id, filled as cores come online
    apic_ids: [AtomicU32; MAX_CPUS],

    /// Where a thread goes when its entry function returns
    thread_exit: fn() -> !,
}

impl X86_64Platform {
    /// Create the platform
    ///
    /// `thread_exit` is usually a function that calls
    /// `Scheduler::exit_current(cpu, 0)` on the kernel's static scheduler.
    pub const fn new(thread_exit: fn() -> !) -> Self {
        Self {
            apic_ids: [const { AtomicU32::new(NO_APIC) }; MAX_CPUS],
            thread_exit,
        }
    }

    /// CPU index registered for `apic_id`
    fn cpu_for_apic(&self, apic_id: u32) -> Option<CpuId> {
        self.apic_ids
            .iter()
            .position(|id| id.load(Ordering::Acquire) == apic_id)
            .map(|idx| CpuId(idx as u32))
    }
}

impl Platform for X86_64Platform {
    type Irq = X86Irq;
    type Context = X86Context;

    fn cpu_id(&self) -> CpuId {
        let apic_id = apic::local_apic_id();
        match self.cpu_for_apic(apic_id) {
            Some(cpu) => cpu,
            // Guessing a CPU here would let two cores share one run-queue
            None => invariant_violation!(InvariantViolation::UnregisteredCpu { apic_id }),
        }
    }

    fn cpu_online(&self, cpu: CpuId, apic_id: u32) {
        if let Some(slot) = self.apic_ids.get(cpu.as_usize()) {
            slot.store(apic_id, Ordering::Release);
        }
    }

    fn new_context(&self, entry: ThreadEntry, arg: usize) -> Result<X86Context, SchedError> {
        X86Context::for_thread(entry, arg, self.thread_exit)
    }

    unsafe fn switch_context(&self, prev: *mut X86Context, next: *const X86Context) {
        unsafe { context::switch(prev, next) }
    }

    fn send_ipi(&self, target: CpuId) {
        let Some(slot) = self.apic_ids.get(target.as_usize()) else {
            return;
        };
        let apic_id = slot.load(Ordering::Acquire);
        if apic_id == NO_APIC {
            log::warn!("IPI to CPU {} before its APIC id is known", target.0);
            return;
        }
        // SAFETY: the vector is reserved for reschedule IPIs and the kernel
        // enables x2APIC before bringing the scheduler online.
        unsafe { apic::send_fixed_ipi(apic_id, RESCHEDULE_VECTOR) };
    }

    fn ack_ipi(&self) {
        // SAFETY: only called from the reschedule IPI handler.
        unsafe { apic::end_of_interrupt() };
    }

    fn wait_for_interrupt(&self) {
        interrupts::enable_and_wait();
    }
}
