/*
 * Scheduler Type Definitions
 *
 * This module defines the core types used throughout the scheduler subsystem.
 * These types are lightweight and Copy-able so they can cross lock and
 * interrupt boundaries by value.
 */

use crate::config::NR_PRIORITIES;

/// CPU identifier
///
/// Index of a logical CPU in the per-CPU table. CPU 0 is the bootstrap
/// processor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuId(pub u32);

impl CpuId {
    /// Bootstrap processor (CPU 0)
    pub const BSP: CpuId = CpuId(0);

    /// Get the CPU ID as a usize for indexing
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Thread priority
///
/// Lower values are more urgent: 0 always wins against 1. Valid priorities
/// are `0..NR_PRIORITIES`; anything else is rejected at thread creation
/// rather than clamped.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u8);

impl Priority {
    /// Most urgent level
    pub const HIGHEST: Priority = Priority(0);

    /// Least urgent level
    pub const LOWEST: Priority = Priority((NR_PRIORITIES - 1) as u8);

    /// Middle of the range, used for ordinary kernel threads
    pub const DEFAULT: Priority = Priority((NR_PRIORITIES / 2) as u8);

    /// Level index in a run-queue
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// True if `self` should preempt a thread running at `other`
    pub const fn beats(self, other: Priority) -> bool {
        self.0 < other.0
    }
}

/// Time slice duration in timer ticks
///
/// With a 100Hz timer (10ms per tick), TimeSliceTicks(1) = 10ms.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimeSliceTicks(pub u32);

impl TimeSliceTicks {
    /// Get the value as u32
    pub fn get(self) -> u32 {
        self.0
    }

    /// Consume one tick; true once the slice is used up
    pub fn tick(&mut self) -> bool {
        self.0 = self.0.saturating_sub(1);
        self.0 == 0
    }
}

/// Where a thread lands inside its priority level
///
/// `Tail` keeps strict arrival order. `Head` lets the thread run before
/// every other thread of its level (a thread that only blocked for a very
/// short time, for instance). The run-queue never chooses on its own; the
/// caller states it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Head,
    Tail,
}

/// Thread body: called once with the spawn argument
pub type ThreadEntry = fn(usize);

/// Result of a scheduling point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The same flow keeps the CPU
    Continued,
    /// The CPU switched flows; `None` is the idle context
    Switched {
        from: Option<super::ThreadId>,
        to: Option<super::ThreadId>,
    },
}

impl SwitchOutcome {
    pub fn switched(self) -> bool {
        matches!(self, SwitchOutcome::Switched { .. })
    }
}
