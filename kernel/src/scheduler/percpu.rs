/*
 * Per-CPU Scheduler State
 *
 * One PerCpu per logical CPU: identity, the thread it is running, its
 * run-queue and a few counters.
 *
 * OWNERSHIP RULES:
 * ================
 *
 * - `current` is written only by the owning CPU, inside the switch critical
 *   section. Other CPUs may read it (to decide whether a wake-up should
 *   preempt) but never write it.
 * - The run-queue may be touched by any CPU, always under its IrqSpinLock.
 * - The idle context is used only by the owning CPU with interrupts off.
 *
 * CPU 0 is built in a const context so a `static` scheduler exists before
 * the heap does. Secondary CPUs are installed once each, during SMP
 * bring-up, into spin::Once slots.
 */

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use bitflags::bitflags;
use spin::Once;

use super::runqueue::RunQueue;
use super::thread::ThreadId;
use super::types::CpuId;
use crate::arch::Platform;
use crate::config::{MAX_CPUS, NR_PRIORITIES};
use crate::error::SchedError;
use crate::sync::IrqSpinLock;

bitflags! {
    /// Scheduling flags of one CPU
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CpuFlags: u32 {
        /// Installed and accepting threads
        const ONLINE = 1 << 0;
        /// Run the scheduler at the next opportunity
        const NEED_RESCHED = 1 << 1;
        /// Executing the idle context
        const IDLE = 1 << 2;
    }
}

/// `current` value while the CPU runs its idle context
const NO_THREAD: u32 = u32::MAX;

fn encode(tid: Option<ThreadId>) -> u32 {
    tid.map_or(NO_THREAD, |t| t.0)
}

fn decode(raw: u32) -> Option<ThreadId> {
    (raw != NO_THREAD).then_some(ThreadId(raw))
}

/// Per-CPU descriptor
pub struct PerCpu<P: Platform> {
    cpu_id: CpuId,
    apic_id: AtomicU32,
    current: AtomicU32,
    flags: AtomicU32,

    pub(crate) runqueue: IrqSpinLock<RunQueue<NR_PRIORITIES>, P::Irq>,

    // Saved state of the flow that was running before the first switch
    // (boot code on CPU 0, the AP entry path elsewhere)
    idle_context: UnsafeCell<Option<P::Context>>,

    // Thread switched away from by the last switch; its on_cpu flag is
    // cleared by the next scheduler entry on this CPU
    switched_out: AtomicU32,

    total_ticks: AtomicU64,
    idle_ticks: AtomicU64,
    context_switches: AtomicU64,
}

// SAFETY: idle_context is only accessed by the owning CPU with local
// interrupts disabled; everything else is atomic or behind a lock.
unsafe impl<P: Platform> Sync for PerCpu<P> {}

impl<P: Platform> PerCpu<P> {
    pub const fn new(cpu_id: CpuId) -> Self {
        Self {
            cpu_id,
            apic_id: AtomicU32::new(0),
            current: AtomicU32::new(NO_THREAD),
            flags: AtomicU32::new(0),
            runqueue: IrqSpinLock::new(RunQueue::new(cpu_id)),
            idle_context: UnsafeCell::new(None),
            switched_out: AtomicU32::new(NO_THREAD),
            total_ticks: AtomicU64::new(0),
            idle_ticks: AtomicU64::new(0),
            context_switches: AtomicU64::new(0),
        }
    }

    pub fn cpu_id(&self) -> CpuId {
        self.cpu_id
    }

    pub fn apic_id(&self) -> u32 {
        self.apic_id.load(Ordering::Acquire)
    }

    pub(crate) fn set_apic_id(&self, apic_id: u32) {
        self.apic_id.store(apic_id, Ordering::Release);
    }

    /// Thread executing on this CPU, `None` while idle
    pub fn current(&self) -> Option<ThreadId> {
        decode(self.current.load(Ordering::Acquire))
    }

    pub(crate) fn set_current(&self, tid: Option<ThreadId>) {
        self.current.store(encode(tid), Ordering::Release);
    }

    pub fn flags(&self) -> CpuFlags {
        CpuFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub(crate) fn set_flags(&self, flags: CpuFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub(crate) fn clear_flags(&self, flags: CpuFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    pub fn is_online(&self) -> bool {
        self.flags().contains(CpuFlags::ONLINE)
    }

    pub fn need_resched(&self) -> bool {
        self.flags().contains(CpuFlags::NEED_RESCHED)
    }

    /// Raw pointer to the idle context, created on first use
    ///
    /// # Safety
    /// Only the owning CPU may call this, with local interrupts disabled.
    pub(crate) unsafe fn idle_context(&self) -> *mut P::Context {
        // SAFETY: per the contract nobody else holds a reference into the cell.
        unsafe { (*self.idle_context.get()).get_or_insert_with(Default::default) }
    }

    pub(crate) fn set_switched_out(&self, tid: Option<ThreadId>) {
        self.switched_out.store(encode(tid), Ordering::Release);
    }

    pub(crate) fn take_switched_out(&self) -> Option<ThreadId> {
        decode(self.switched_out.swap(NO_THREAD, Ordering::AcqRel))
    }

    pub(crate) fn count_tick(&self, idle: bool) {
        self.total_ticks.fetch_add(1, Ordering::Relaxed);
        if idle {
            self.idle_ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn count_switch(&self) {
        self.context_switches.fetch_add(1, Ordering::Relaxed);
    }

    /// Counters and run-queue occupancy
    pub fn stats(&self) -> CpuStats {
        let queued = self.runqueue.lock().len();
        CpuStats {
            cpu: self.cpu_id,
            apic_id: self.apic_id(),
            online: self.is_online(),
            current: self.current(),
            queued,
            total_ticks: self.total_ticks.load(Ordering::Relaxed),
            idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
            context_switches: self.context_switches.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of one CPU's scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuStats {
    pub cpu: CpuId,
    pub apic_id: u32,
    pub online: bool,
    pub current: Option<ThreadId>,
    /// Threads linked in the run-queue, the running one included
    pub queued: usize,
    pub total_ticks: u64,
    pub idle_ticks: u64,
    pub context_switches: u64,
}

/// All per-CPU descriptors
pub struct CpuTable<P: Platform> {
    bsp: PerCpu<P>,
    aps: [Once<PerCpu<P>>; MAX_CPUS - 1],
}

impl<P: Platform> CpuTable<P> {
    pub const fn new() -> Self {
        Self {
            bsp: PerCpu::new(CpuId::BSP),
            aps: [const { Once::new() }; MAX_CPUS - 1],
        }
    }

    pub fn bsp(&self) -> &PerCpu<P> {
        &self.bsp
    }

    /// Descriptor of an installed CPU
    pub fn get(&self, cpu: CpuId) -> Option<&PerCpu<P>> {
        match cpu.as_usize() {
            0 => Some(&self.bsp),
            n => self.aps.get(n - 1)?.get(),
        }
    }

    /// Install the descriptor of a secondary CPU
    pub fn install(&self, cpu: CpuId) -> Result<&PerCpu<P>, SchedError> {
        if cpu == CpuId::BSP {
            return Err(SchedError::CpuAlreadyOnline(cpu));
        }
        let slot = self
            .aps
            .get(cpu.as_usize() - 1)
            .ok_or(SchedError::InvalidCpu(cpu))?;

        let mut fresh = false;
        let percpu = slot.call_once(|| {
            fresh = true;
            PerCpu::new(cpu)
        });
        if fresh {
            Ok(percpu)
        } else {
            Err(SchedError::CpuAlreadyOnline(cpu))
        }
    }

    /// Installed CPUs with the ONLINE flag, in id order
    pub fn online(&self) -> impl Iterator<Item = &PerCpu<P>> {
        core::iter::once(&self.bsp)
            .chain(self.aps.iter().filter_map(Once::get))
            .filter(|percpu| percpu.is_online())
    }
}

impl<P: Platform> Default for CpuTable<P> {
    fn default() -> Self {
        Self::new()
    }
}
