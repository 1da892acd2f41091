/*
 * Scheduler Scenario Tests
 *
 * End-to-end scenarios driven through the public Scheduler API on the host
 * platform. Unit tests of the individual pieces (bitmap, run-queue, spinlock,
 * per-CPU table) sit next to their code.
 *
 * - preemption: timer ticks, timeslice rotation, priority preemption, yield
 * - lifecycle:  spawn validation, block/wake, exit/reap, the idle pass
 * - smp:        bring-up, reschedule IPIs, migration, load balancing, and
 *               two std threads driving two CPUs at once
 */

mod smp;

use crate::arch::host::HostPlatform;
use crate::{CpuId, Priority, SchedConfig, Scheduler, SpawnSpec, ThreadId};

type HostScheduler = Scheduler<HostPlatform>;

/// Scheduler with CPU 0 online
fn scheduler(config: SchedConfig) -> HostScheduler {
    let sched = Scheduler::new(HostPlatform::new(), config);
    sched.init_bsp(0).unwrap();
    sched
}

fn body(_arg: usize) {}

/// Spawn a worker on CPU 0 from CPU 0
fn spawn(sched: &HostScheduler, priority: u8, arg: usize) -> ThreadId {
    spawn_on(sched, CpuId::BSP, CpuId::BSP, priority, arg)
}

fn spawn_on(sched: &HostScheduler, from: CpuId, cpu: CpuId, priority: u8, arg: usize) -> ThreadId {
    let spec = SpawnSpec::new("worker", body, Priority(priority))
        .arg(arg)
        .on_cpu(cpu);
    sched.spawn(from, spec).unwrap()
}
