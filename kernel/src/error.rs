/*
 * Scheduler Errors
 *
 * Two families:
 * - SchedError: recoverable, returned to the caller (bad priority, arena
 *   full, CPU not online, wrong thread state for the request).
 * - InvariantViolation: structural corruption of a run-queue or a thread
 *   descriptor. These are never returned from the hot path; they are fed to
 *   `invariant_violation!`, which logs and panics. `RunQueue::verify` also
 *   reports them as values so tests can inspect them.
 */

use core::fmt;

use crate::scheduler::{CpuId, Priority, ThreadId, ThreadState};

/// Recoverable scheduler error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// Priority is outside `[0, NR_PRIORITIES)`
    InvalidPriority(Priority),
    /// Thread arena has no free slot
    TooManyThreads,
    /// CPU index is outside the configured range
    InvalidCpu(CpuId),
    /// CPU exists but has not been brought online
    CpuOffline(CpuId),
    /// CPU was already installed
    CpuAlreadyOnline(CpuId),
    /// Platform could not build a context (stack allocation failed)
    ContextAlloc,
    /// No thread with this id
    NoSuchThread(ThreadId),
    /// Thread is not in the state the request needs
    InvalidState {
        tid: ThreadId,
        state: ThreadState,
    },
    /// Thread is still executing (or its switch-out is not finished yet)
    ThreadRunning(ThreadId),
    /// The CPU is running its idle context
    NoCurrentThread(CpuId),
    /// Configuration rejected by `SchedConfig::validate`
    InvalidConfig(&'static str),
    /// Structural check of a run-queue failed
    Inconsistent(InvariantViolation),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::InvalidPriority(p) => write!(f, "Invalid priority {}", p.0),
            SchedError::TooManyThreads => write!(f, "Thread table full"),
            SchedError::InvalidCpu(cpu) => write!(f, "Invalid CPU {}", cpu.0),
            SchedError::CpuOffline(cpu) => write!(f, "CPU {} is offline", cpu.0),
            SchedError::CpuAlreadyOnline(cpu) => write!(f, "CPU {} already online", cpu.0),
            SchedError::ContextAlloc => write!(f, "Failed to allocate thread context"),
            SchedError::NoSuchThread(tid) => write!(f, "{} not found", tid),
            SchedError::InvalidState { tid, state } => {
                write!(f, "{} is in state {:?}", tid, state)
            }
            SchedError::ThreadRunning(tid) => write!(f, "{} is still on a CPU", tid),
            SchedError::NoCurrentThread(cpu) => write!(f, "CPU {} is idle", cpu.0),
            SchedError::InvalidConfig(why) => write!(f, "Invalid config: {}", why),
            SchedError::Inconsistent(violation) => {
                write!(f, "Run-queue inconsistent: {}", violation)
            }
        }
    }
}

/// Structural fault in scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Thread enqueued while already linked somewhere
    DoubleEnqueue { tid: ThreadId, queued_on: CpuId },
    /// Thread dequeued from a run-queue that does not hold it
    NotQueued { tid: ThreadId, cpu: CpuId },
    /// Thread priority does not index a level of this run-queue
    PriorityOutOfRange { tid: ThreadId, priority: Priority },
    /// Bitmap bit disagrees with the emptiness of its level
    BitmapDesync { cpu: CpuId, level: usize, bit_set: bool },
    /// next/prev pointers of neighbours do not agree
    BrokenLink { cpu: CpuId, level: usize },
    /// Walked length of a level differs from its counter
    LevelCount { cpu: CpuId, level: usize, counted: usize, recorded: usize },
    /// Thread id has no descriptor in the arena
    UnknownThread(ThreadId),
    /// Thread found on a level other than its own priority
    WrongLevel { tid: ThreadId, level: usize },
    /// State machine edge that does not exist
    IllegalTransition { tid: ThreadId, from: ThreadState, to: ThreadState },
    /// Interrupted core whose APIC id was never registered with a CPU index
    UnregisteredCpu { apic_id: u32 },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::DoubleEnqueue { tid, queued_on } => {
                write!(f, "double enqueue of {} (already on CPU {})", tid, queued_on.0)
            }
            InvariantViolation::NotQueued { tid, cpu } => {
                write!(f, "dequeue of {} absent from CPU {} run-queue", tid, cpu.0)
            }
            InvariantViolation::PriorityOutOfRange { tid, priority } => {
                write!(f, "priority {} of {} out of range", priority.0, tid)
            }
            InvariantViolation::BitmapDesync { cpu, level, bit_set } => write!(
                f,
                "bitmap desync on CPU {} level {} (bit {}, list {})",
                cpu.0,
                level,
                if *bit_set { "set" } else { "clear" },
                if *bit_set { "empty" } else { "non-empty" }
            ),
            InvariantViolation::BrokenLink { cpu, level } => {
                write!(f, "broken list links on CPU {} level {}", cpu.0, level)
            }
            InvariantViolation::LevelCount { cpu, level, counted, recorded } => write!(
                f,
                "level {} on CPU {} holds {} threads, counter says {}",
                level, cpu.0, counted, recorded
            ),
            InvariantViolation::UnknownThread(tid) => write!(f, "unknown thread {}", tid),
            InvariantViolation::WrongLevel { tid, level } => {
                write!(f, "{} linked on foreign level {}", tid, level)
            }
            InvariantViolation::IllegalTransition { tid, from, to } => {
                write!(f, "illegal transition of {}: {:?} -> {:?}", tid, from, to)
            }
            InvariantViolation::UnregisteredCpu { apic_id } => {
                write!(f, "core with APIC id {} is not a registered CPU", apic_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn messages_name_the_fault() {
        let v = InvariantViolation::DoubleEnqueue { tid: ThreadId(3), queued_on: CpuId(1) };
        assert_eq!(v.to_string(), "double enqueue of Thread(3) (already on CPU 1)");

        let v = InvariantViolation::BitmapDesync { cpu: CpuId(0), level: 2, bit_set: true };
        assert_eq!(v.to_string(), "bitmap desync on CPU 0 level 2 (bit set, list empty)");

        let e = SchedError::InvalidPriority(Priority(200));
        assert_eq!(e.to_string(), "Invalid priority 200");

        let e = SchedError::Inconsistent(InvariantViolation::UnknownThread(ThreadId(5)));
        assert_eq!(e.to_string(), "Run-queue inconsistent: unknown thread Thread(5)");
    }
}
