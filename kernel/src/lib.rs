/*
 * O1 Scheduler Core
 *
 * This crate is the scheduling core of a small multi-architecture kernel.
 * It picks which thread runs next on each CPU, drives thread lifecycle
 * transitions from timer and inter-processor interrupts, and keeps every
 * shared structure behind IRQ-saving spinlocks.
 *
 * Layout:
 * - sync:       IrqSpinLock and IrqGuard (interrupt-disable critical sections)
 * - scheduler:  priority bitmap, thread arena, O(1) run-queue, per-CPU table,
 *               and the preemption glue (Scheduler)
 * - arch:       the Platform seam plus the x86_64 backend
 * - config:     compile-time limits and the runtime SchedConfig
 * - error:      recoverable SchedError and fatal InvariantViolation
 * - utils:      kernel logger adapter and the invariant macro
 *
 * The crate is no_std. Under `cargo test` it links std so the host platform
 * can simulate CPUs with ordinary threads.
 */

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
pub mod utils;

pub mod arch;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod sync;

#[cfg(test)]
mod tests;

pub use arch::{InterruptControl, IrqState, Platform};
pub use config::{MAX_CPUS, MAX_THREADS, NR_PRIORITIES, SchedConfig};
pub use error::{InvariantViolation, SchedError};
pub use scheduler::{
    CpuId, CpuStats, Placement, Priority, RunQueue, Scheduler, SpawnSpec, SwitchOutcome,
    ThreadId, ThreadInfo, ThreadState,
};
pub use sync::{IrqGuard, IrqSpinLock, IrqSpinLockGuard};
