/*
 * O(1) Priority Scheduler
 *
 * Fixed-priority preemptive scheduler with one run-queue per CPU.
 *
 * PRIORITIES:
 * ===========
 *
 * NR_PRIORITIES levels, 0 is the most urgent. A CPU always runs the first
 * thread of its most urgent non-empty level. Threads of the same level share
 * the CPU round-robin, one timeslice each.
 *
 * THREAD LIFECYCLE:
 * =================
 *
 *   spawn -> Runnable -> Running -> Runnable   (timeslice expired, preempted, yield)
 *                           |
 *                           +----> Blocked -> Runnable   (wake)
 *                           |
 *                           +----> Terminated -> reap
 *
 * Any other transition is a fatal invariant violation.
 *
 * MODULES:
 * ========
 *
 * - types:      CpuId, Priority, Placement, SwitchOutcome
 * - bitmap:     fixed-width priority bitmap with find-first-set
 * - thread:     thread descriptors and the slot arena
 * - runqueue:   the O(1) run-queue (enqueue, dequeue, pick_next)
 * - percpu:     per-CPU descriptors and the CPU table
 * - sched_core: Scheduler, the timer/IPI glue and the lifecycle API
 */

pub mod bitmap;
pub mod percpu;
pub mod runqueue;
pub mod sched_core;
pub mod thread;
pub mod types;

pub use bitmap::PriorityBitmap;
pub use percpu::{CpuFlags, CpuStats, CpuTable, PerCpu};
pub use runqueue::{RunQueue, RunQueueNodes};
pub use sched_core::{Scheduler, SpawnSpec};
pub use thread::{Link, Node, Thread, ThreadId, ThreadInfo, ThreadState, ThreadTable};
pub use types::{CpuId, Placement, Priority, SwitchOutcome, ThreadEntry, TimeSliceTicks};
