//! Operation logging macros
//!
//! A lifecycle operation logs one `start` event and then exactly one `end`
//! or `end_error`. Extra `tracing` fields may follow the fixed ones.
//! Callers must depend on `tracing` directly.

/// `start` event for `$op`
///
/// ```
/// # use persistx_core::log_op_start;
/// log_op_start!("provider.initialize");
/// log_op_start!("provider.initialize", descriptor = "persistx.toml");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_START,
            $($($field)*)?
        )
    };
}

/// `end` event for `$op` with its duration
///
/// ```
/// # use persistx_core::log_op_end;
/// log_op_end!("provider.shutdown", duration_ms = 3);
/// log_op_end!("provider.shutdown", duration_ms = 3, registry_id = "r-1");
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_END,
            duration_ms = $duration,
            $($($field)*)?
        )
    };
}

/// `end_error` event for `$op`
///
/// `$err` must be an `ExError`; it is only borrowed. Besides the error's own
/// code the event carries `cause_code`, the code at the bottom of its
/// source chain.
///
/// ```
/// # use persistx_core::log_op_error;
/// use persistx_core::errors::{initialization_error, ExError, ExErrorKind};
/// let err = initialization_error(ExError::new(ExErrorKind::ConfigNotFound));
/// log_op_error!("provider.initialize", err, duration_ms = 10);
/// assert_eq!(err.root_cause().code(), "ERR_CONFIG_NOT_FOUND");
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: &$crate::errors::ExError = &$err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            cause_code = ex_err.root_cause().code(),
            error = %ex_err,
            $($($field)*)?
        )
    }};
}
