use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

/// Run an external credential helper with a hard time bound, returning trimmed stdout.
///
/// The child is killed if the bound elapses, so a hung helper can never stall
/// credential resolution.
pub async fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<String> {
    tracing::debug!(cmd, timeout_ms = timeout.as_millis() as u64, "Running helper command");

    let child = tokio::process::Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .with_context(|| format!("`{}` timed out after {}s", cmd, timeout.as_secs()))?
        .with_context(|| format!("Failed to execute `{}`", cmd))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("`{}` exited with {}: {}", cmd, output.status, stderr.trim());
    }

    let stdout =
        String::from_utf8(output.stdout).with_context(|| format!("Non-UTF8 output from `{}`", cmd))?;
    Ok(stdout.trim().to_string())
}

/// Locate a binary on PATH.
pub fn which(binary: &str) -> Option<PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .flat_map(|dir| {
                let plain = dir.join(binary);
                let exe = dir.join(format!("{}.exe", binary));
                [plain, exe]
            })
            .find(|p| p.is_file())
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn which_finds_sh() {
        assert!(which("sh").is_some());
    }

    #[test]
    fn which_returns_none_for_missing_binary() {
        assert!(which("definitely_not_a_real_binary_42").is_none());
    }

    #[tokio::test]
    async fn run_command_trims_stdout() {
        let out = run_command("echo", &["  token  "], Duration::from_secs(5)).await;
        assert_eq!(out.unwrap(), "token");
    }

    #[tokio::test]
    async fn run_command_reports_failure_status() {
        let result = run_command("false", &[], Duration::from_secs(5)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn run_command_times_out() {
        let err = run_command("sleep", &["5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
