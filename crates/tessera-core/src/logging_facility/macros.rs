//! Operation boundary macros
//!
//! An engine operation emits one `start` event and then exactly one of
//! `end` or `end_error`. All three carry `component` (the calling module),
//! `op` and `event`; callers append their own fields after the fixed ones.

#[doc(hidden)]
#[macro_export]
macro_rules! __log_op {
    ($level:ident, $op:expr, $event:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = module_path!(),
            op = $op,
            event = $event,
            $($($field)*)?
        )
    };
}

/// Log the start of an operation
///
/// ```
/// # use tessera_core::log_op_start;
/// log_op_start!("status");
/// log_op_start!("apply_patch", no_commit = true);
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        $crate::__log_op!(info, $op, $crate::schema::EVENT_START $(, $($field)*)?);
    };
}

/// Log the successful end of an operation; `duration_ms` is required
///
/// ```
/// # use tessera_core::log_op_end;
/// log_op_end!("show", duration_ms = 3_u64, commit = "3f2a9c1");
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        $crate::__log_op!(
            info,
            $op,
            $crate::schema::EVENT_END,
            duration_ms = $duration
            $(, $($field)*)?
        );
    };
}

/// Log a failed operation with the error's kind and stable code
///
/// `$err` is borrowed, so the caller can still return it.
///
/// ```
/// # use tessera_core::log_op_error;
/// # use tessera_core::errors::{ExError, ExErrorKind};
/// let err = ExError::new(ExErrorKind::NoChanges);
/// log_op_error!("apply_patch", &err, duration_ms = 10_u64);
/// assert_eq!(err.kind(), ExErrorKind::NoChanges);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let err: &$crate::errors::ExError = $err;
        $crate::__log_op!(
            error,
            $op,
            $crate::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?err.kind(),
            err_code = err.code()
            $(, $($field)*)?
        );
    }};
}
