/// Abort on corrupted scheduler state
///
/// Logs the violation through the kernel logger first so the message reaches
/// the serial console even if the panic handler only halts.
#[macro_export]
macro_rules! invariant_violation {
    ($violation:expr) => {{
        let violation: $crate::error::InvariantViolation = $violation;
        log::error!("scheduler invariant violated: {}", violation);
        panic!("scheduler invariant violated: {}", violation)
    }};
}

/// Check a condition and abort with the given violation if it fails
#[macro_export]
macro_rules! sched_assert {
    ($cond:expr, $violation:expr) => {
        if !$cond {
            $crate::invariant_violation!($violation);
        }
    };
}
