//! Internal consistency checks.
//!
//! Two tiers, matching how the collector treats its own bookkeeping:
//!
//! - [`gc_guarantee!`] is always compiled in. A failure is a defect in the
//!   collector (illegal state transition, capacity overflow, use of a torn
//!   down set) and aborts the current thread with a descriptive panic.
//! - [`gc_verify!`] only runs with `debug_assertions` or the `verify`
//!   feature. It guards properties that are expensive to re-derive, such as
//!   recomputed byte sums or per-element range checks.

/// `true` when the `gc_verify!` tier is active.
pub const VERIFY_ENABLED: bool = cfg!(any(debug_assertions, feature = "verify"));

macro_rules! gc_guarantee {
    ($cond:expr $(,)?) => {
        if !$cond {
            panic!("guarantee({}) failed", stringify!($cond));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            panic!(
                "guarantee({}) failed: {}",
                stringify!($cond),
                format_args!($($arg)+)
            );
        }
    };
}

macro_rules! gc_verify {
    ($($arg:tt)+) => {
        if $crate::invariant::VERIFY_ENABLED {
            $crate::invariant::gc_guarantee!($($arg)+);
        }
    };
}

pub(crate) use gc_guarantee;
pub(crate) use gc_verify;
