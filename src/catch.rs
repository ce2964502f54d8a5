//! Run a fallible operation and fall back to a default value.
//!
//! The caller names the operation, attaches the fields worth logging and
//! decides what a failure turns into.
//!
//! ```ignore
//! let exists = Catch::new("rule_exists")
//!     .field("name", name)
//!     .message("Firewall rule lookup failed")
//!     .default(false)
//!     .call(|| lookup(name))?;
//! ```

use std::fmt::{self, Debug, Display};

/// Severity used when a caught failure is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevels {
    /// Expected failures, only visible with debug logging enabled.
    #[default]
    SilentExc,
    #[allow(dead_code)]
    Trace,
    #[allow(dead_code)]
    Debug,
    #[allow(dead_code)]
    Info,
    Warning,
    Error,
}

/// Name of the guarded operation plus the arguments worth logging.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    function: &'static str,
    fields: Vec<(&'static str, String)>,
}

impl CallContext {
    pub fn new(function: &'static str) -> Self {
        Self {
            function,
            fields: Vec::new(),
        }
    }

    pub fn push(&mut self, key: &'static str, value: impl Display) {
        self.fields.push((key, value.to_string()));
    }
}

impl Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.fields {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}={:?}", key, value)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Catch<D = ()> {
    context: CallContext,
    level: LogLevels,
    reraise: bool,
    log_traceback: bool,
    message: Option<String>,
    default: D,
}

impl Catch {
    pub fn new(function: &'static str) -> Self {
        Self {
            context: CallContext::new(function),
            level: LogLevels::default(),
            reraise: false,
            log_traceback: false,
            message: None,
            default: (),
        }
    }
}

impl<D> Catch<D> {
    pub fn field(mut self, key: &'static str, value: impl Display) -> Self {
        self.context.push(key, value);
        self
    }

    pub fn level(mut self, level: LogLevels) -> Self {
        self.level = level;
        self
    }

    #[allow(dead_code)]
    pub fn reraise(mut self, reraise: bool) -> Self {
        self.reraise = reraise;
        self
    }

    pub fn log_traceback(mut self, log_traceback: bool) -> Self {
        self.log_traceback = log_traceback;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Value returned in place of a swallowed error.
    pub fn default<N>(self, default: N) -> Catch<N> {
        Catch {
            context: self.context,
            level: self.level,
            reraise: self.reraise,
            log_traceback: self.log_traceback,
            message: self.message,
            default,
        }
    }

    /// Runs `f`. A failure is logged (when a message is set) and replaced by
    /// the default, unless `reraise` is on.
    pub fn call<T, E, F>(self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        D: Into<T>,
        E: Display + Debug,
    {
        let error = match f() {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if let Some(message) = &self.message {
            self.emit(message, &error);
        }

        if self.reraise {
            return Err(error);
        }

        if self.log_traceback {
            tracing::error!(
                function = self.context.function,
                error = ?error,
                "Exception in {}",
                self.context.function
            );
        }

        Ok(self.default.into())
    }

    fn emit<E: Display>(&self, message: &str, error: &E) {
        let function = self.context.function;
        let context = &self.context;
        match self.level {
            LogLevels::SilentExc => {
                tracing::debug!(silent = true, function, %context, %error, "{}", message)
            }
            LogLevels::Trace => tracing::trace!(function, %context, %error, "{}", message),
            LogLevels::Debug => tracing::debug!(function, %context, %error, "{}", message),
            LogLevels::Info => tracing::info!(function, %context, %error, "{}", message),
            LogLevels::Warning => tracing::warn!(function, %context, %error, "{}", message),
            LogLevels::Error => tracing::error!(function, %context, %error, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tracing_test::traced_test;

    fn failing() -> Result<bool, io::Error> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no such rule"))
    }

    #[test]
    fn success_passes_value_through() {
        let value = Catch::new("lookup")
            .default(false)
            .call(|| Ok::<_, io::Error>(true))
            .unwrap();
        assert!(value);
    }

    #[test]
    fn failure_is_replaced_by_default() {
        let value = Catch::new("lookup").default(false).call(failing).unwrap();
        assert!(!value);
    }

    #[test]
    fn unit_default_swallows_error() {
        let result = Catch::new("cleanup").call(|| Err::<(), _>(io::Error::other("boom")));
        assert!(result.is_ok());
    }

    #[test]
    fn reraise_returns_original_error() {
        let err = Catch::new("lookup")
            .reraise(true)
            .default(false)
            .call(failing)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn context_renders_fields_in_order() {
        let mut context = CallContext::new("rule_exists");
        context.push("name", "Block_GTA5_Network");
        context.push("attempt", 2);
        assert_eq!(
            context.to_string(),
            r#"name="Block_GTA5_Network" attempt="2""#
        );
    }

    #[test]
    fn default_level_is_silent() {
        assert_eq!(LogLevels::default(), LogLevels::SilentExc);
    }

    #[traced_test]
    #[test]
    fn message_is_logged_with_context() {
        let _ = Catch::new("rule_exists")
            .field("name", "Block_GTA5_Network")
            .level(LogLevels::Warning)
            .message("Firewall rule lookup failed")
            .default(false)
            .call(failing);

        assert!(logs_contain("Firewall rule lookup failed"));
        assert!(logs_contain("Block_GTA5_Network"));
        assert!(logs_contain("no such rule"));
    }

    #[traced_test]
    #[test]
    fn silent_failures_are_marked() {
        let _ = Catch::new("rule_exists")
            .message("Firewall rule lookup failed")
            .default(false)
            .call(failing);

        assert!(logs_contain("Firewall rule lookup failed"));
        assert!(logs_contain("silent=true"));
    }

    #[traced_test]
    #[test]
    fn traceback_names_the_function() {
        let value = Catch::new("cleanup")
            .level(LogLevels::Error)
            .log_traceback(true)
            .default(false)
            .call(failing)
            .unwrap();

        assert!(!value);
        assert!(logs_contain("Exception in cleanup"));
        assert!(logs_contain("NotFound"));
    }

    #[traced_test]
    #[test]
    fn reraised_errors_skip_the_traceback() {
        let _ = Catch::new("cleanup")
            .reraise(true)
            .log_traceback(true)
            .default(false)
            .call(failing);

        assert!(!logs_contain("Exception in cleanup"));
    }

    #[traced_test]
    #[test]
    fn nothing_is_logged_without_message() {
        let _ = Catch::new("quiet").default(false).call(failing);
        assert!(!logs_contain("no such rule"));
    }
}
