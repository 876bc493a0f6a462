use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::error::ExecError;

/// What a finished process left behind.
#[derive(Debug, Clone)]
pub struct Captured {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Interleaved stdout and stderr.
    pub output: Vec<u8>,
}

/// A spawned process whose output is being teed to the terminal and a buffer.
pub struct CapturedProcess {
    child: Child,
    buffer: Arc<Mutex<Vec<u8>>>,
    readers: Vec<JoinHandle<()>>,
}

impl CapturedProcess {
    /// Spawn `cmd`. With `interactive` the process inherits the terminal and
    /// nothing is captured.
    pub fn spawn(mut cmd: Command, quiet: bool, interactive: bool) -> Result<Self, ExecError> {
        if interactive {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
        let program = cmd.get_program().to_string_lossy().into_owned();
        let mut child = cmd
            .spawn()
            .map_err(|e| ExecError::Spawn(format!("{program}: {e}")))?;

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tee(stdout, Arc::clone(&buffer), quiet, false));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tee(stderr, Arc::clone(&buffer), quiet, true));
        }
        Ok(Self {
            child,
            buffer,
            readers,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Wait for exit and for both streams to drain.
    pub fn wait(mut self) -> Result<Captured, ExecError> {
        let status = self.child.wait()?;
        for reader in self.readers {
            let _ = reader.join();
        }
        let output = self
            .buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default();
        Ok(Captured {
            exit_code: status.code(),
            output,
        })
    }
}

/// Reader thread: stream -> terminal (unless quiet) + capture buffer
fn tee<R: Read + Send + 'static>(
    mut stream: R,
    buffer: Arc<Mutex<Vec<u8>>>,
    quiet: bool,
    to_stderr: bool,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if !quiet {
                        if to_stderr {
                            let mut err = std::io::stderr();
                            let _ = err.write_all(&buf[..n]);
                            let _ = err.flush();
                        } else {
                            let mut out = std::io::stdout();
                            let _ = out.write_all(&buf[..n]);
                            let _ = out.flush();
                        }
                    }
                    if let Ok(mut capture) = buffer.lock() {
                        capture.extend_from_slice(&buf[..n]);
                    }
                }
                Err(_) => break,
            }
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn test_captures_both_streams() {
        let process = CapturedProcess::spawn(sh("echo out; echo err 1>&2"), true, false).unwrap();
        assert!(process.pid() > 0);
        let captured = process.wait().unwrap();
        assert_eq!(captured.exit_code, Some(0));
        let text = String::from_utf8(captured.output).unwrap();
        assert!(text.contains("out\n"));
        assert!(text.contains("err\n"));
    }

    #[test]
    fn test_exit_code() {
        let captured = CapturedProcess::spawn(sh("exit 3"), true, false)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(captured.exit_code, Some(3));
        assert!(captured.output.is_empty());
    }

    #[test]
    fn test_spawn_failure() {
        let result = CapturedProcess::spawn(Command::new("/nonexistent/prodat-binary"), true, false);
        assert!(matches!(result, Err(ExecError::Spawn(_))));
    }
}
