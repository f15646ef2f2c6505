//! Utility macros shared across the gateway implementation.

/// Returns early with the given error when the predicate does not hold.
///
/// Works like `assert!`, but hands an error back to the caller instead of
/// panicking.
///
/// # Example
///
/// ```ignore
/// ensure!(headers.status().is_none(), ProtocolError::duplicate_directive("Status"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
