/*
 * Scheduler Core - Preemption Glue
 *
 * Scheduler ties the pieces together:
 * 1. Owns the thread arena and the per-CPU table
 * 2. Turns timer ticks and reschedule IPIs into scheduling decisions
 * 3. Provides the thread lifecycle API (spawn, yield, block, wake, exit)
 * 4. Drives context switches through the Platform
 *
 * Every entry point takes the CPU it runs on as an explicit argument. The
 * interrupt glue gets it from Platform::cpu_id(); tests pass it directly.
 *
 * RUNNING THREADS STAY QUEUED:
 * ============================
 *
 * The thread a CPU runs remains linked at the head of its level, so
 * pick_next returning `current` means "keep going". Round-robin rotation is
 * dequeue + enqueue_tail of the running thread. Blocking and exiting
 * dequeue it.
 *
 * TIMESLICES:
 * ===========
 *
 * A slice is refilled at spawn, at wake-up and when the thread rotates
 * (expiry or yield). Being preempted by a more urgent thread does not
 * refill it, so a thread that keeps getting interrupted still reaches the
 * end of its slice and lets its peers run.
 *
 * LOCK ORDER:
 * ===========
 *
 * 1. Run-queue locks, in ascending CPU id (migration and balancing hold two)
 * 2. The thread arena lock
 *
 * Both are IrqSpinLocks, so interrupts are off whenever either is held.
 *
 * SWITCH PROTOCOL:
 * ================
 *
 * 1. Disable local interrupts for the whole decision (IrqGuard)
 * 2. Take this CPU's run-queue lock, then the arena lock
 * 3. Apply the disposition of `current` (keep, rotate, block, exit)
 * 4. pick_next; if it is `current`, stop here
 * 5. Update thread states, `current` and the counters
 * 6. Capture raw pointers to both contexts, release the locks
 * 7. Platform::switch_context, still with interrupts disabled
 *
 * The outgoing thread keeps `on_cpu` set until the next scheduler entry on
 * the same CPU, which can only happen once its registers are saved. Until
 * then it cannot be reaped or migrated, so its context never moves while
 * the switch is in flight.
 */

use super::percpu::{CpuFlags, CpuStats, CpuTable, PerCpu};
use super::thread::{Thread, ThreadId, ThreadInfo, ThreadState, ThreadTable};
use super::types::{CpuId, Placement, Priority, SwitchOutcome, ThreadEntry, TimeSliceTicks};
use crate::arch::Platform;
use crate::config::{NR_PRIORITIES, SchedConfig};
use crate::error::{InvariantViolation, SchedError};
use crate::sync::{IrqGuard, IrqSpinLock, IrqSpinLockGuard};

type RunQueueGuard<'a, P> =
    IrqSpinLockGuard<'a, super::RunQueue<NR_PRIORITIES>, <P as Platform>::Irq>;

/// What happens to `current` at a scheduling point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Stays where it is; switch only if something more urgent is queued
    Keep,
    /// Moves to the tail of its level (timeslice expired, yield)
    Rotate,
    /// Leaves the run-queue until woken
    Block,
    /// Leaves the run-queue for good
    Exit(i32),
}

/// Thread creation request
#[derive(Debug, Clone, Copy)]
pub struct SpawnSpec {
    pub name: &'static str,
    pub entry: ThreadEntry,
    pub arg: usize,
    pub priority: Priority,
    /// Target CPU; the spawning CPU when `None`
    pub cpu: Option<CpuId>,
}

impl SpawnSpec {
    pub const fn new(name: &'static str, entry: ThreadEntry, priority: Priority) -> Self {
        Self {
            name,
            entry,
            arg: 0,
            priority,
            cpu: None,
        }
    }

    pub const fn arg(mut self, arg: usize) -> Self {
        self.arg = arg;
        self
    }

    pub const fn on_cpu(mut self, cpu: CpuId) -> Self {
        self.cpu = Some(cpu);
        self
    }
}

/// Multi-CPU O(1) priority scheduler
pub struct Scheduler<P: Platform> {
    platform: P,
    config: SchedConfig,
    threads: IrqSpinLock<ThreadTable<P::Context>, P::Irq>,
    cpus: CpuTable<P>,
}

impl<P: Platform> Scheduler<P> {
    /// Build a scheduler; usable in a `static`
    ///
    /// Nothing runs until `init_bsp` brings CPU 0 online.
    pub const fn new(platform: P, config: SchedConfig) -> Self {
        Self {
            platform,
            config,
            threads: IrqSpinLock::new(ThreadTable::new()),
            cpus: CpuTable::new(),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    /// CPU executing the caller, as reported by the platform
    pub fn this_cpu(&self) -> CpuId {
        self.platform.cpu_id()
    }

    // ============================================================================================
    // BRING-UP
    // ============================================================================================

    /// Bring the bootstrap CPU online
    ///
    /// The code calling this becomes CPU 0's idle flow: its state is saved
    /// into the idle context by the first switch to a thread.
    pub fn init_bsp(&self, apic_id: u32) -> Result<(), SchedError> {
        self.config.validate()?;
        let bsp = self.cpus.bsp();
        if bsp.is_online() {
            return Err(SchedError::CpuAlreadyOnline(CpuId::BSP));
        }
        self.online(bsp, apic_id);
        log::info!(
            "sched: {} CPU(s) configured, {} priorities, {}us timeslice",
            self.config.nr_cpus,
            NR_PRIORITIES,
            self.config.timeslice_us()
        );
        Ok(())
    }

    /// Install and online a secondary CPU (SMP bring-up)
    pub fn bring_up_cpu(&self, cpu: CpuId, apic_id: u32) -> Result<(), SchedError> {
        if cpu == CpuId::BSP {
            return self.init_bsp(apic_id);
        }
        if cpu.as_usize() >= self.config.nr_cpus {
            return Err(SchedError::InvalidCpu(cpu));
        }
        let percpu = self.cpus.install(cpu)?;
        self.online(percpu, apic_id);
        Ok(())
    }

    fn online(&self, percpu: &PerCpu<P>, apic_id: u32) {
        percpu.set_apic_id(apic_id);
        self.platform.cpu_online(percpu.cpu_id(), apic_id);
        percpu.set_flags(CpuFlags::ONLINE | CpuFlags::IDLE);
        log::info!("sched: CPU {} online (APIC {})", percpu.cpu_id().0, apic_id);
    }

    /// Descriptor of an online, configured CPU
    fn cpu(&self, cpu: CpuId) -> Result<&PerCpu<P>, SchedError> {
        if cpu.as_usize() >= self.config.nr_cpus {
            return Err(SchedError::InvalidCpu(cpu));
        }
        match self.cpus.get(cpu) {
            Some(percpu) if percpu.is_online() => Ok(percpu),
            _ => Err(SchedError::CpuOffline(cpu)),
        }
    }

    fn timeslice(&self) -> TimeSliceTicks {
        TimeSliceTicks(self.config.timeslice_ticks)
    }

    // ============================================================================================
    // THREAD LIFECYCLE
    // ============================================================================================

    /// Create a thread and queue it at the tail of its level
    ///
    /// # Arguments
    /// * `from` - CPU making the call
    /// * `spec` - Thread body, priority and placement
    ///
    /// If the new thread is more urgent than what the target CPU runs, the
    /// target is asked to reschedule (by IPI when it is another CPU).
    pub fn spawn(&self, from: CpuId, spec: SpawnSpec) -> Result<ThreadId, SchedError> {
        if spec.priority.index() >= NR_PRIORITIES {
            return Err(SchedError::InvalidPriority(spec.priority));
        }
        let target = spec.cpu.unwrap_or(from);
        let percpu = self.cpu(target)?;

        // Stack allocation stays outside the locks
        let context = self.platform.new_context(spec.entry, spec.arg)?;
        let timeslice = self.timeslice();

        let (tid, preempt) = {
            let mut rq = percpu.runqueue.lock();
            let mut threads = self.threads.lock();
            let tid = threads.insert(|id| {
                Thread::new(id, spec.name, spec.priority, target, context, timeslice)
            })?;
            rq.enqueue_tail(&mut *threads, tid);
            (tid, Self::preempts(&threads, percpu, spec.priority))
        };

        log::info!(
            "sched: spawned {} '{}' priority {} on CPU {}",
            tid,
            spec.name,
            spec.priority.0,
            target.0
        );
        if preempt {
            self.kick(from, percpu);
        }
        Ok(tid)
    }

    /// Give up the rest of the timeslice to threads of the same level
    pub fn yield_now(&self, cpu: CpuId) -> Result<SwitchOutcome, SchedError> {
        let percpu = self.cpu(cpu)?;
        let disposition = match percpu.current() {
            Some(_) => Disposition::Rotate,
            None => Disposition::Keep,
        };
        Ok(self.schedule(percpu, disposition))
    }

    /// Put the running thread to sleep and run something else
    ///
    /// Whoever owns the event the thread waits for calls `wake` later.
    pub fn block_current(&self, cpu: CpuId) -> Result<SwitchOutcome, SchedError> {
        let percpu = self.cpu(cpu)?;
        percpu.current().ok_or(SchedError::NoCurrentThread(cpu))?;
        Ok(self.schedule(percpu, Disposition::Block))
    }

    /// Terminate the running thread
    ///
    /// On hardware this does not return: nothing ever switches back into a
    /// terminated thread.
    pub fn exit_current(&self, cpu: CpuId, code: i32) -> Result<SwitchOutcome, SchedError> {
        let percpu = self.cpu(cpu)?;
        let tid = percpu.current().ok_or(SchedError::NoCurrentThread(cpu))?;
        log::debug!("sched: {} exiting with code {} on CPU {}", tid, code, cpu.0);
        Ok(self.schedule(percpu, Disposition::Exit(code)))
    }

    /// Make a blocked thread runnable at the configured default placement
    pub fn wake(&self, from: CpuId, tid: ThreadId) -> Result<(), SchedError> {
        self.wake_with(from, tid, self.config.wake_placement)
    }

    /// Make a blocked thread runnable on its home CPU
    ///
    /// `Placement::Head` puts it in front of every thread of its level,
    /// including the one currently running there.
    pub fn wake_with(
        &self,
        from: CpuId,
        tid: ThreadId,
        placement: Placement,
    ) -> Result<(), SchedError> {
        let home = self
            .threads
            .lock()
            .get(tid)
            .ok_or(SchedError::NoSuchThread(tid))?
            .home_cpu;
        let percpu = self.cpu(home)?;

        let preempt = {
            let mut rq = percpu.runqueue.lock();
            let mut threads = self.threads.lock();
            let thread = threads.get_mut(tid).ok_or(SchedError::NoSuchThread(tid))?;
            if thread.state != ThreadState::Blocked {
                return Err(SchedError::InvalidState {
                    tid,
                    state: thread.state,
                });
            }
            thread.transition(ThreadState::Runnable);
            thread.timeslice = self.timeslice();
            let priority = thread.priority;

            match placement {
                Placement::Head => rq.enqueue_head(&mut *threads, tid),
                Placement::Tail => rq.enqueue_tail(&mut *threads, tid),
            }
            Self::preempts(&threads, percpu, priority)
        };

        log::debug!(
            "sched: woke {} on CPU {} ({:?}) from CPU {}",
            tid,
            home.0,
            placement,
            from.0
        );
        if preempt {
            self.kick(from, percpu);
        }
        Ok(())
    }

    /// Free a terminated thread, returning its exit code
    ///
    /// Fails with `ThreadRunning` while the CPU that ran it has not yet
    /// passed through the scheduler again.
    pub fn reap(&self, tid: ThreadId) -> Result<i32, SchedError> {
        let thread = {
            let mut threads = self.threads.lock();
            let thread = threads.get(tid).ok_or(SchedError::NoSuchThread(tid))?;
            if thread.state != ThreadState::Terminated {
                return Err(SchedError::InvalidState {
                    tid,
                    state: thread.state,
                });
            }
            if thread.on_cpu {
                return Err(SchedError::ThreadRunning(tid));
            }
            threads.remove(tid).ok_or(SchedError::NoSuchThread(tid))?
        };

        // The context (and its stack) is freed here, outside the lock
        let code = thread.exit_code.unwrap_or(0);
        log::debug!("sched: reaped {} '{}' (exit code {})", tid, thread.name, code);
        Ok(code)
    }

    // ============================================================================================
    // CROSS-CPU PLACEMENT
    // ============================================================================================

    /// Move a waiting thread to another CPU's run-queue
    ///
    /// Only runnable threads that are not on a CPU can move.
    pub fn migrate(&self, from: CpuId, tid: ThreadId, to: CpuId) -> Result<(), SchedError> {
        let dst = self.cpu(to)?;
        let src_cpu = self
            .threads
            .lock()
            .get(tid)
            .ok_or(SchedError::NoSuchThread(tid))?
            .home_cpu;
        if src_cpu == to {
            return Ok(());
        }
        let src = self.cpu(src_cpu)?;

        let preempt = {
            let _irq = IrqGuard::<P::Irq>::new();
            let (mut src_rq, mut dst_rq) = Self::lock_pair(src, dst);
            let mut threads = self.threads.lock();

            let thread = threads.get(tid).ok_or(SchedError::NoSuchThread(tid))?;
            if thread.on_cpu {
                return Err(SchedError::ThreadRunning(tid));
            }
            if thread.state != ThreadState::Runnable || thread.home_cpu != src_cpu {
                return Err(SchedError::InvalidState {
                    tid,
                    state: thread.state,
                });
            }
            let priority = thread.priority;

            src_rq.dequeue(&mut *threads, tid);
            dst_rq.enqueue_tail(&mut *threads, tid);
            Self::thread_mut(&mut threads, tid).home_cpu = to;
            Self::preempts(&threads, dst, priority)
        };

        log::debug!("sched: migrated {} from CPU {} to CPU {}", tid, src_cpu.0, to.0);
        if preempt {
            self.kick(from, dst);
        }
        Ok(())
    }

    /// Pull one waiting thread from the busiest CPU
    ///
    /// Acts only when the busiest run-queue holds at least two threads more
    /// than `cpu`'s. The most urgent thread that is not on a CPU moves.
    pub fn balance(&self, cpu: CpuId) -> Result<Option<ThreadId>, SchedError> {
        let me = self.cpu(cpu)?;
        let my_len = me.runqueue.lock().len();
        let busiest = self
            .cpus
            .online()
            .filter(|c| c.cpu_id() != cpu && c.cpu_id().as_usize() < self.config.nr_cpus)
            .map(|c| (c, c.runqueue.lock().len()))
            .max_by_key(|(_, len)| *len);
        let Some((src, src_len)) = busiest else {
            return Ok(None);
        };
        if src_len < my_len + 2 {
            return Ok(None);
        }

        let (tid, preempt) = {
            let _irq = IrqGuard::<P::Irq>::new();
            let (mut src_rq, mut my_rq) = Self::lock_pair(src, me);
            let mut threads = self.threads.lock();

            // Lengths may have moved since the unlocked look
            if src_rq.len() < my_rq.len() + 2 {
                return Ok(None);
            }

            let candidate = {
                let queue = &*src_rq;
                let table = &*threads;
                (0..NR_PRIORITIES)
                    .flat_map(move |level| queue.iter_level(table, Priority(level as u8)))
                    .find(|tid| {
                        table
                            .get(*tid)
                            .is_some_and(|t| t.state == ThreadState::Runnable && !t.on_cpu)
                    })
            };
            let Some(tid) = candidate else {
                return Ok(None);
            };

            src_rq.dequeue(&mut *threads, tid);
            my_rq.enqueue_tail(&mut *threads, tid);
            let thread = Self::thread_mut(&mut threads, tid);
            thread.home_cpu = cpu;
            let priority = thread.priority;
            (tid, Self::preempts(&threads, me, priority))
        };

        log::debug!("sched: CPU {} pulled {} from CPU {}", cpu.0, tid, src.cpu_id().0);
        if preempt {
            self.kick(cpu, me);
        }
        Ok(Some(tid))
    }

    // ============================================================================================
    // INTERRUPT ENTRY POINTS
    // ============================================================================================

    /// Timer interrupt handler body
    ///
    /// Charges the tick to the running thread. When its timeslice runs out
    /// it rotates to the tail of its level; a pending reschedule request
    /// switches without rotation. An idle CPU switches as soon as it has
    /// work.
    pub fn on_timer_tick(&self, cpu: CpuId) -> Result<SwitchOutcome, SchedError> {
        let percpu = self.cpu(cpu)?;

        let disposition = {
            let rq = percpu.runqueue.lock();
            let mut threads = self.threads.lock();
            Self::retire_switched_out(percpu, &mut threads);

            match percpu.current() {
                Some(tid) => {
                    percpu.count_tick(false);
                    let thread = Self::thread_mut(&mut threads, tid);
                    thread.ticks_run += 1;
                    if thread.timeslice.tick() {
                        Some(Disposition::Rotate)
                    } else if percpu.need_resched() {
                        Some(Disposition::Keep)
                    } else {
                        None
                    }
                }
                None => {
                    percpu.count_tick(true);
                    (!rq.is_empty() || percpu.need_resched()).then_some(Disposition::Keep)
                }
            }
        };

        Ok(match disposition {
            Some(disposition) => self.schedule(percpu, disposition),
            None => SwitchOutcome::Continued,
        })
    }

    /// Reschedule IPI handler body
    pub fn on_reschedule_ipi(&self, cpu: CpuId) -> Result<SwitchOutcome, SchedError> {
        self.platform.ack_ipi();
        let percpu = self.cpu(cpu)?;
        Ok(self.schedule(percpu, Disposition::Keep))
    }

    /// Thread `cpu` would run next (the running one if nothing beats it)
    pub fn pick_next(&self, cpu: CpuId) -> Result<Option<ThreadId>, SchedError> {
        Ok(self.cpu(cpu)?.runqueue.lock().pick_next())
    }

    /// One pass of the idle loop
    ///
    /// Runs queued work if there is any; otherwise halts until the next
    /// interrupt. Returns whether the CPU halted.
    pub fn run_idle(&self, cpu: CpuId) -> Result<bool, SchedError> {
        let percpu = self.cpu(cpu)?;
        self.schedule(percpu, Disposition::Keep);
        if percpu.current().is_some() {
            return Ok(false);
        }
        self.platform.wait_for_interrupt();
        Ok(true)
    }

    /// Idle flow of a CPU, entered once bring-up is done
    pub fn idle_loop(&self, cpu: CpuId) -> ! {
        loop {
            if let Err(err) = self.run_idle(cpu) {
                log::error!("sched: idle loop on CPU {}: {}", cpu.0, err);
                self.platform.wait_for_interrupt();
            }
        }
    }

    // ============================================================================================
    // INTROSPECTION
    // ============================================================================================

    /// Thread running on `cpu`, `None` while idle
    pub fn current(&self, cpu: CpuId) -> Result<Option<ThreadId>, SchedError> {
        Ok(self.cpu(cpu)?.current())
    }

    pub fn stats(&self, cpu: CpuId) -> Result<CpuStats, SchedError> {
        Ok(self.cpu(cpu)?.stats())
    }

    pub fn thread_info(&self, tid: ThreadId) -> Option<ThreadInfo> {
        self.threads.lock().get(tid).map(Thread::info)
    }

    /// Number of live threads, terminated ones included until reaped
    pub fn thread_count(&self) -> usize {
        self.threads.lock().len()
    }

    /// Full structural check of one CPU's run-queue
    ///
    /// A CPU that is not online has no run-queue to check and is reported as
    /// `InvalidCpu`/`CpuOffline`, never as consistent.
    pub fn verify(&self, cpu: CpuId) -> Result<(), SchedError> {
        let percpu = self.cpu(cpu)?;
        let rq = percpu.runqueue.lock();
        let threads = self.threads.lock();
        rq.verify(&*threads).map_err(SchedError::Inconsistent)
    }

    // ============================================================================================
    // MECHANISM
    // ============================================================================================

    /// Scheduling point on the calling CPU
    fn schedule(&self, percpu: &PerCpu<P>, disposition: Disposition) -> SwitchOutcome {
        let _irq = IrqGuard::<P::Irq>::new();
        let cpu = percpu.cpu_id();

        let (prev, next, prev_ctx, next_ctx) = {
            let mut rq = percpu.runqueue.lock();
            let mut threads = self.threads.lock();
            Self::retire_switched_out(percpu, &mut threads);

            let prev = percpu.current();
            if let Some(tid) = prev {
                match disposition {
                    Disposition::Keep => {}
                    Disposition::Rotate => {
                        rq.dequeue(&mut *threads, tid);
                        rq.enqueue_tail(&mut *threads, tid);
                        Self::thread_mut(&mut threads, tid).timeslice = self.timeslice();
                    }
                    Disposition::Block => {
                        rq.dequeue(&mut *threads, tid);
                        Self::thread_mut(&mut threads, tid).transition(ThreadState::Blocked);
                    }
                    Disposition::Exit(code) => {
                        rq.dequeue(&mut *threads, tid);
                        let thread = Self::thread_mut(&mut threads, tid);
                        thread.transition(ThreadState::Terminated);
                        thread.exit_code = Some(code);
                    }
                }
            }
            percpu.clear_flags(CpuFlags::NEED_RESCHED);

            let next = rq.pick_next();
            if next == prev {
                return SwitchOutcome::Continued;
            }

            if let Some(tid) = prev {
                let thread = Self::thread_mut(&mut threads, tid);
                if thread.state == ThreadState::Running {
                    thread.transition(ThreadState::Runnable);
                }
            }
            if let Some(tid) = next {
                let thread = Self::thread_mut(&mut threads, tid);
                // A preempted thread resumes with what is left of its slice
                thread.transition(ThreadState::Running);
                thread.switches_in += 1;
                thread.on_cpu = true;
            }

            percpu.set_current(next);
            percpu.set_switched_out(prev);
            percpu.count_switch();
            match next {
                Some(_) => percpu.clear_flags(CpuFlags::IDLE),
                None => percpu.set_flags(CpuFlags::IDLE),
            }

            // SAFETY: interrupts are off and this is the owning CPU.
            let idle = unsafe { percpu.idle_context() };
            let prev_ctx: *mut P::Context = match prev {
                Some(tid) => &raw mut Self::thread_mut(&mut threads, tid).context,
                None => idle,
            };
            let next_ctx: *const P::Context = match next {
                Some(tid) => &raw const Self::thread_mut(&mut threads, tid).context,
                None => idle,
            };
            (prev, next, prev_ctx, next_ctx)
        };

        log::trace!("sched: CPU {} switch {:?} -> {:?}", cpu.0, prev, next);

        // SAFETY: both contexts belong to threads marked on_cpu (or to this
        // CPU's idle slot), so neither is freed or moved before the switch
        // completes; prev != next; interrupts are disabled by `_irq`.
        unsafe { self.platform.switch_context(prev_ctx, next_ctx) };

        SwitchOutcome::Switched {
            from: prev,
            to: next,
        }
    }

    /// Finish the bookkeeping of the previous switch on this CPU
    fn retire_switched_out(percpu: &PerCpu<P>, threads: &mut ThreadTable<P::Context>) {
        if let Some(tid) = percpu.take_switched_out() {
            if let Some(thread) = threads.get_mut(tid) {
                thread.on_cpu = false;
            }
        }
    }

    /// Should a thread of `priority` queued on `target` preempt it?
    fn preempts(threads: &ThreadTable<P::Context>, target: &PerCpu<P>, priority: Priority) -> bool {
        match target.current() {
            None => true,
            Some(current) => threads
                .get(current)
                .is_none_or(|thread| priority.beats(thread.priority)),
        }
    }

    /// Ask `target` to reschedule, by IPI if it is not the calling CPU
    fn kick(&self, from: CpuId, target: &PerCpu<P>) {
        target.set_flags(CpuFlags::NEED_RESCHED);
        if target.cpu_id() != from {
            self.platform.send_ipi(target.cpu_id());
        }
    }

    /// Lock two run-queues in ascending CPU order
    ///
    /// Returns the guards in argument order. The caller must hold an
    /// IrqGuard so the guards can drop in any order.
    fn lock_pair<'a>(
        a: &'a PerCpu<P>,
        b: &'a PerCpu<P>,
    ) -> (RunQueueGuard<'a, P>, RunQueueGuard<'a, P>) {
        if a.cpu_id() < b.cpu_id() {
            let first = a.runqueue.lock();
            (first, b.runqueue.lock())
        } else {
            let first = b.runqueue.lock();
            (a.runqueue.lock(), first)
        }
    }

    fn thread_mut(threads: &mut ThreadTable<P::Context>, tid: ThreadId) -> &mut Thread<P::Context> {
        match threads.get_mut(tid) {
            Some(thread) => thread,
            None => invariant_violation!(InvariantViolation::UnknownThread(tid)),
        }
    }
}
