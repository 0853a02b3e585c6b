//! Running external audio tools (soundstretch, ffmpeg)

use std::process::{Command, Output};

use tracing::debug;

use crate::error::{Result, SpotmixError};

/// Run a command to completion, mapping spawn failures and non-zero exits.
///
/// Blocks until the process exits. There is no timeout.
pub(crate) fn run_tool(tool: &str, command: &mut Command) -> Result<Output> {
    debug!("Running {}: {:?}", tool, command);

    let output = command.output().map_err(|e| SpotmixError::ToolUnavailable {
        tool: tool.to_string(),
        source: e,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SpotmixError::ToolFailed {
            tool: tool.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary() {
        let result = run_tool(
            "nonexistent",
            &mut Command::new("/nonexistent/bin/spotmix-tool"),
        );
        assert!(matches!(result, Err(SpotmixError::ToolUnavailable { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit() {
        let result = run_tool("false", &mut Command::new("false"));
        match result {
            Err(SpotmixError::ToolFailed { exit_code, .. }) => assert_eq!(exit_code, 1),
            other => panic!("expected ToolFailed, got {:?}", other),
        }
    }
}
