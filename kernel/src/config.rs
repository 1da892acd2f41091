/*
 * Scheduler Configuration
 *
 * Compile-time limits size the static structures (run-queue heads, thread
 * arena, per-CPU table). Everything that may differ between boards or boot
 * command lines lives in SchedConfig, which is a plain Copy value so it can
 * be embedded in a `static` Scheduler.
 */

use crate::error::SchedError;
use crate::scheduler::Placement;

/// Number of priority levels per run-queue (0 = most urgent)
pub const NR_PRIORITIES: usize = 64;

/// Maximum number of logical CPUs the per-CPU table can hold
pub const MAX_CPUS: usize = 16;

/// Capacity of the thread arena
pub const MAX_THREADS: usize = 256;

/// Kernel thread stack size (64 KiB per thread)
pub const THREAD_STACK_SIZE: usize = 64 * 1024;

/// Interrupt vector used for reschedule IPIs
pub const RESCHEDULE_VECTOR: u8 = 0xF0;

/// Runtime scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    /// Number of CPUs that may be brought online
    pub nr_cpus: usize,

    /// Period of the scheduler tick in microseconds
    pub tick_interval_us: u32,

    /// Ticks a thread may run before round-robin rotation
    pub timeslice_ticks: u32,

    /// Where a woken thread lands in its priority level when the caller
    /// does not choose explicitly
    pub wake_placement: Placement,
}

impl SchedConfig {
    /// Uniprocessor, 100Hz tick, 10 tick (100ms) timeslice, FIFO wake-ups
    pub const DEFAULT: SchedConfig = SchedConfig {
        nr_cpus: 1,
        tick_interval_us: 10_000,
        timeslice_ticks: 10,
        wake_placement: Placement::Tail,
    };

    pub const fn with_cpus(mut self, nr_cpus: usize) -> Self {
        self.nr_cpus = nr_cpus;
        self
    }

    pub const fn with_tick_interval_us(mut self, us: u32) -> Self {
        self.tick_interval_us = us;
        self
    }

    pub const fn with_timeslice_ticks(mut self, ticks: u32) -> Self {
        self.timeslice_ticks = ticks;
        self
    }

    pub const fn with_wake_placement(mut self, placement: Placement) -> Self {
        self.wake_placement = placement;
        self
    }

    /// Length of one timeslice in microseconds
    pub const fn timeslice_us(&self) -> u64 {
        self.tick_interval_us as u64 * self.timeslice_ticks as u64
    }

    /// Reject configurations the static tables cannot hold
    pub fn validate(&self) -> Result<(), SchedError> {
        if self.nr_cpus == 0 || self.nr_cpus > MAX_CPUS {
            return Err(SchedError::InvalidConfig("nr_cpus must be in 1..=MAX_CPUS"));
        }
        if self.tick_interval_us == 0 {
            return Err(SchedError::InvalidConfig("tick interval must be non-zero"));
        }
        if self.timeslice_ticks == 0 {
            return Err(SchedError::InvalidConfig("timeslice must be at least one tick"));
        }
        Ok(())
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(SchedConfig::default().validate(), Ok(()));
        assert_eq!(SchedConfig::DEFAULT.timeslice_us(), 100_000);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let too_many = SchedConfig::DEFAULT.with_cpus(MAX_CPUS + 1);
        assert!(matches!(too_many.validate(), Err(SchedError::InvalidConfig(_))));

        let no_cpus = SchedConfig::DEFAULT.with_cpus(0);
        assert!(no_cpus.validate().is_err());

        let zero_slice = SchedConfig::DEFAULT.with_timeslice_ticks(0);
        assert!(zero_slice.validate().is_err());

        let zero_tick = SchedConfig::DEFAULT.with_tick_interval_us(0);
        assert!(zero_tick.validate().is_err());
    }

    #[test]
    fn builders_compose() {
        let cfg = SchedConfig::DEFAULT
            .with_cpus(4)
            .with_tick_interval_us(1_000)
            .with_timeslice_ticks(5)
            .with_wake_placement(Placement::Head);
        assert_eq!(cfg.nr_cpus, 4);
        assert_eq!(cfg.timeslice_us(), 5_000);
        assert_eq!(cfg.wake_placement, Placement::Head);
    }
}
