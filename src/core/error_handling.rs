//! Error reporting helpers
//!
//! Distinguishes errors the operator can fix (bad stream names, unreadable
//! config files) from system errors (transport failures, poisoned locks) so
//! the binary can print the right level of detail.

/// Trait for errors that know whether the user can act on them
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`; otherwise it should return `None`.
pub trait ContextualError: std::error::Error {
    /// True if the error carries a message that should be shown as-is
    fn is_user_actionable(&self) -> bool;

    /// The message to show for user-actionable errors
    fn user_message(&self) -> Option<&str>;
}

/// Log a fatal error with detail appropriate to its kind
///
/// User-actionable errors log their own message; system errors log the
/// operation context and keep the details at debug level.
///
/// ```rust,no_run
/// # use kinetic::core::error_handling::log_error_with_context;
/// # use kinetic::stream::StreamError;
/// let err = StreamError::Config { message: "stream name must not be empty".to_string() };
/// log_error_with_context(&err, "Creating producer");
/// // Logs: "FATAL: stream name must not be empty"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
