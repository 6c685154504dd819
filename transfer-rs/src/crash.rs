//! Crash reporting for parser faults
//!
//! Reporting is best-effort: a failing reporter never fails a migration.

use tracing::error;

use crate::error::Result;

/// Receives diagnostics when the message parser faults
pub trait CrashReporter: Send + Sync {
    fn report(&self, diagnostic: &str) -> Result<()>;
}

/// Reporter writing the diagnostic to the log
#[derive(Debug, Default, Clone)]
pub struct LogCrashReporter;

impl CrashReporter for LogCrashReporter {
    fn report(&self, diagnostic: &str) -> Result<()> {
        error!(diagnostic = %diagnostic, "Message parser crashed");
        Ok(())
    }
}
