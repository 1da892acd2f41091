/*
 * Kernel Logging Adapter
 *
 * The scheduler logs through the `log` facade. This module provides the
 * `log::Log` implementation a kernel installs at boot: records are formatted
 * as `[LEVEL] target: message` and handed to a sink function supplied by the
 * console driver (COM port, framebuffer console, ...).
 *
 * The sink is called from interrupt context too (timer tick, IPIs), so it
 * must not take locks that non-IRQ code holds with interrupts enabled.
 */

use core::fmt;

use log::{LevelFilter, Metadata, Record, SetLoggerError};
use spin::Once;

/// Output function for formatted log lines (one call per record)
pub type LogSink = fn(fmt::Arguments<'_>);

struct SchedLogger;

static SINK: Once<LogSink> = Once::new();

static LOGGER: SchedLogger = SchedLogger;

impl log::Log for SchedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = SINK.get() {
            sink(format_args!(
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            ));
        }
    }

    fn flush(&self) {}
}

/// Install the kernel logger
///
/// # Arguments
///
/// * `sink` - Console write function receiving each formatted record
/// * `level` - Maximum level that reaches the sink
///
/// Fails if another logger was installed first. The first sink passed wins.
pub fn init(sink: LogSink, level: LevelFilter) -> Result<(), SetLoggerError> {
    SINK.call_once(|| sink);
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;
    use std::sync::Mutex;
    use std::vec::Vec;

    static LINES: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn capture(args: fmt::Arguments<'_>) {
        LINES.lock().unwrap().push(std::format!("{}", args));
    }

    #[test]
    fn records_reach_the_sink_with_level_prefix() {
        init(capture, LevelFilter::Trace).expect("logger installed twice");

        log::warn!(target: "o1_sched::probe", "tick storm on CPU {}", 3);

        let lines = LINES.lock().unwrap();
        assert!(
            lines
                .iter()
                .any(|l| l == "[WARN] o1_sched::probe: tick storm on CPU 3")
        );
    }
}
