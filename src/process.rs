//! Process spawn and termination primitives.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::config::ProcessSpec;
use crate::errors::{ProcessError, ProcessResult};

/// Resolve the declared script against the working directory and verify it
/// exists. Runs before every spawn.
pub fn resolve_script(spec: &ProcessSpec) -> ProcessResult<PathBuf> {
    let resolved = if spec.script.is_absolute() {
        spec.script.clone()
    } else {
        match &spec.cwd {
            Some(cwd) => cwd.join(&spec.script),
            None => spec.script.clone(),
        }
    };

    if !resolved.is_file() {
        return Err(ProcessError::script_not_found(
            &spec.name,
            resolved.display().to_string(),
        ));
    }

    // Without an interpreter the script itself must be executable
    #[cfg(unix)]
    if spec.interpreter.is_none() && !is_executable(&resolved) {
        return Err(ProcessError::script_not_executable(
            &spec.name,
            resolved.display().to_string(),
        ));
    }

    Ok(resolved)
}

/// Build the launch command from the declaration
pub fn build_command(spec: &ProcessSpec, capture_output: bool) -> Command {
    let (program, argv) = spec.argv();
    let mut cmd = Command::new(program);
    cmd.args(argv);

    if let Some(ref cwd) = spec.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    if capture_output {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    }
    cmd.stdin(Stdio::null());

    cmd
}

/// Deliver SIGTERM to request a graceful shutdown of a running child
#[cfg(unix)]
pub fn terminate_gracefully(name: &str, pid: u32) -> ProcessResult<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    debug!("Sending SIGTERM to process {} (PID: {})", name, pid);
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => Ok(()),
        // Process already terminated
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(ProcessError::stop_failed(name, e.to_string())),
    }
}

#[cfg(windows)]
pub fn terminate_gracefully(name: &str, _pid: u32) -> ProcessResult<()> {
    Err(ProcessError::stop_failed(
        name,
        "graceful termination is not implemented on Windows".to_string(),
    ))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_spec(dir: &TempDir) -> ProcessSpec {
        ProcessSpec {
            name: "test-process".to_string(),
            script: PathBuf::from("run.py"),
            interpreter: Some("python".to_string()),
            args: vec!["--config".to_string(), "config.okx.json".to_string()],
            cwd: Some(dir.path().to_path_buf()),
            autorestart: true,
            watch: false,
            max_restarts: 5,
            restart_delay: Duration::ZERO,
            min_uptime: Duration::from_secs(1),
            kill_timeout: Duration::from_secs(1),
            env: HashMap::new(),
            out_file: None,
            error_file: None,
            merge_logs: false,
        }
    }

    #[test]
    fn test_resolve_script_missing() {
        let dir = TempDir::new().unwrap();
        let spec = create_test_spec(&dir);

        let err = resolve_script(&spec).unwrap_err();
        assert!(matches!(err, ProcessError::ScriptNotFound { .. }));
    }

    #[test]
    fn test_resolve_script_relative_to_cwd() {
        let dir = TempDir::new().unwrap();
        let spec = create_test_spec(&dir);
        std::fs::write(dir.path().join("run.py"), "print('ok')\n").unwrap();

        let resolved = resolve_script(&spec).unwrap();
        assert_eq!(resolved, dir.path().join("run.py"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_script_needs_exec_bit_without_interpreter() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let mut spec = create_test_spec(&dir);
        spec.interpreter = None;
        let path = dir.path().join("run.py");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();

        let err = resolve_script(&spec).unwrap_err();
        assert!(matches!(err, ProcessError::ScriptNotExecutable { .. }));

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(resolve_script(&spec).is_ok());
    }
}
