pub mod cleanup;
pub mod pipeline;
pub mod reconcile;

pub use cleanup::{CleanupCommand, CleanupMode, CleanupOptions};
pub use reconcile::{ReconcileCommand, ReconcileOptions};

use crate::error::ErrorKind;

/// Input rejected by the safety gate
pub const EXIT_SAFETY_VIOLATION: i32 = 125;
/// Unusable configuration or unreachable IaC backend
pub const EXIT_FATAL: i32 = 126;
/// Operator cancelled
pub const EXIT_CANCELLED: i32 = 130;

/// Process exit code for an error that aborted a command
pub fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ErrorKind>() {
        Some(ErrorKind::SafetyViolation(_)) => EXIT_SAFETY_VIOLATION,
        Some(ErrorKind::UserCancellation) => EXIT_CANCELLED,
        _ => EXIT_FATAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes() {
        let safety = anyhow::Error::new(ErrorKind::SafetyViolation("prod".into()));
        assert_eq!(exit_code_for_error(&safety), 125);

        let cancelled: anyhow::Result<()> = Err(ErrorKind::UserCancellation).context("while confirming");
        assert_eq!(exit_code_for_error(&cancelled.unwrap_err()), 130);

        assert_eq!(exit_code_for_error(&anyhow::anyhow!("boom")), 126);
    }
}
