//! Fatal error reporting
//!
//! Errors that stop the listener runtime fall into two groups: problems the
//! operator can fix (a bad listener config, an unreadable settings file) and
//! system failures (the queue backend refused the connection). The first
//! group logs its own message; the second logs the operation context and
//! keeps the detail at debug level.

/// Errors that know whether their message is actionable by an operator
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`. When it returns `false`, `user_message()` returns `None`.
pub trait ContextualError: std::error::Error {
    fn is_user_actionable(&self) -> bool;

    fn user_message(&self) -> Option<&str>;
}

/// Log a fatal error with detail matched to who can act on it
///
/// ```rust,no_run
/// # use joblistener::core::error_handling::log_error_with_context;
/// # use joblistener::listener::api::ListenerError;
/// let err = ListenerError::InvalidConfig {
///     listener: "emails".to_string(),
///     reason: "workers must be at least 1".to_string(),
/// };
/// log_error_with_context(&err, "Listener registration");
/// // Logs: "FATAL: workers must be at least 1"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}: {}", operation_context, error),
    }
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
