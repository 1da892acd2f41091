/*
 * Host Test Platform
 *
 * Lets the scheduler run under `cargo test`. Each std thread plays one CPU:
 * its interrupt flag and CPU index are thread-locals. Context switches do
 * not move stacks; they only record that the switch happened, which is all
 * the scheduler's contract needs ("after the call, the next context is the
 * one executing").
 */

use core::sync::atomic::{AtomicUsize, Ordering};
use std::cell::Cell;
use std::sync::Mutex;
use std::vec::Vec;

use super::{InterruptControl, Platform};
use crate::error::SchedError;
use crate::scheduler::{CpuId, ThreadEntry};

std::thread_local! {
    static IRQ_ENABLED: Cell<bool> = const { Cell::new(true) };
    static CPU: Cell<u32> = const { Cell::new(0) };
}

/// Thread-local interrupt flag
pub struct HostIrq;

impl InterruptControl for HostIrq {
    fn are_enabled() -> bool {
        IRQ_ENABLED.with(|f| f.get())
    }

    fn enable() {
        IRQ_ENABLED.with(|f| f.set(true));
    }

    fn disable() {
        IRQ_ENABLED.with(|f| f.set(false));
    }
}

/// Make the calling std thread act as `cpu`
pub fn set_current_cpu(cpu: CpuId) {
    CPU.with(|c| c.set(cpu.0));
}

/// Saved "context" of a simulated thread
#[derive(Debug, Default)]
pub struct HostContext {
    pub entry: Option<ThreadEntry>,
    pub arg: usize,
    /// How many times a switch saved into this context
    pub saved: u32,
}

/// Recording platform
#[derive(Default)]
pub struct HostPlatform {
    switches: AtomicUsize,
    halts: AtomicUsize,
    acks: AtomicUsize,
    ipis: Mutex<Vec<CpuId>>,
    loaded: Mutex<Vec<Option<usize>>>,
    online: Mutex<Vec<(CpuId, u32)>>,
}

impl HostPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn switches(&self) -> usize {
        self.switches.load(Ordering::SeqCst)
    }

    pub fn halts(&self) -> usize {
        self.halts.load(Ordering::SeqCst)
    }

    pub fn acks(&self) -> usize {
        self.acks.load(Ordering::SeqCst)
    }

    /// Drain the IPIs sent so far
    pub fn take_ipis(&self) -> Vec<CpuId> {
        core::mem::take(&mut *self.ipis.lock().unwrap())
    }

    /// Argument of every context loaded so far (`None` = an idle context)
    pub fn loaded(&self) -> Vec<Option<usize>> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn online_cpus(&self) -> Vec<(CpuId, u32)> {
        self.online.lock().unwrap().clone()
    }
}

impl Platform for HostPlatform {
    type Irq = HostIrq;
    type Context = HostContext;

    fn cpu_id(&self) -> CpuId {
        CpuId(CPU.with(|c| c.get()))
    }

    fn cpu_online(&self, cpu: CpuId, apic_id: u32) {
        self.online.lock().unwrap().push((cpu, apic_id));
    }

    fn new_context(&self, entry: ThreadEntry, arg: usize) -> Result<HostContext, SchedError> {
        Ok(HostContext {
            entry: Some(entry),
            arg,
            saved: 0,
        })
    }

    unsafe fn switch_context(&self, prev: *mut HostContext, next: *const HostContext) {
        assert!(!HostIrq::are_enabled(), "context switch with interrupts enabled");
        // SAFETY: caller guarantees both contexts are live and distinct.
        let loaded = unsafe {
            (*prev).saved += 1;
            (*next).entry.map(|_| (*next).arg)
        };
        self.loaded.lock().unwrap().push(loaded);
        self.switches.fetch_add(1, Ordering::SeqCst);
    }

    fn send_ipi(&self, target: CpuId) {
        self.ipis.lock().unwrap().push(target);
    }

    fn ack_ipi(&self) {
        self.acks.fetch_add(1, Ordering::SeqCst);
    }

    fn wait_for_interrupt(&self) {
        self.halts.fetch_add(1, Ordering::SeqCst);
    }
}
