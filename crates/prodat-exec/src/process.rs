use std::process::Command;

use crate::error::ExecError;

/// Start time of a live process as the OS reports it, `None` if there is no
/// such process.
pub fn start_marker(pid: u32) -> Option<String> {
    let output = if cfg!(windows) {
        Command::new("powershell")
            .args([
                "-NoProfile",
                "-Command",
                &format!("(Get-Process -Id {pid}).StartTime.Ticks"),
            ])
            .output()
    } else {
        Command::new("ps")
            .args(["-o", "lstart=", "-p", &pid.to_string()])
            .output()
    }
    .ok()?;
    if !output.status.success() {
        return None;
    }
    let marker = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!marker.is_empty()).then_some(marker)
}

/// Whether `pid` is alive and is the process that was recorded as started at `recorded`.
pub fn is_same_process(pid: u32, recorded: Option<&str>) -> bool {
    match (recorded, start_marker(pid)) {
        (Some(recorded), Some(current)) => recorded == current,
        _ => false,
    }
}

/// `kill -TERM` on Unix, `taskkill /T /F` on Windows.
pub fn terminate(pid: u32) -> Result<(), ExecError> {
    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("taskkill");
        cmd.args(["/PID", &pid.to_string(), "/T", "/F"]);
        cmd
    } else {
        let mut cmd = Command::new("kill");
        cmd.args(["-TERM", &pid.to_string()]);
        cmd
    };
    let output = cmd.output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(ExecError::Driver(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}
