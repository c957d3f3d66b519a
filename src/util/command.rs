use std::io::Read;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, VolvaultError};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long a killed command's pipes may stay open before its output is abandoned.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.code == 0
    }
}

pub fn describe_command(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().to_string())
        .collect();
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Run `cmd` to completion, capturing stdout and stderr. With a timeout the
/// child's whole process group is killed once it expires and the output is
/// marked `timed_out`.
pub fn run_captured(cmd: &mut Command, timeout: Option<Duration>) -> Result<CommandOutput> {
    let program = cmd.get_program().to_string_lossy().to_string();
    if timeout.is_some() {
        cmd.process_group(0);
    }
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| VolvaultError::message(format!("{}: {}", program, e)))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let (code, timed_out) = wait_child(&mut child, timeout)
        .map_err(|e| VolvaultError::message(format!("{}: {}", program, e)))?;

    let grace = timed_out.then_some(DRAIN_GRACE);
    Ok(CommandOutput {
        code,
        stdout: collect_drain(stdout, grace),
        stderr: collect_drain(stderr, grace),
        timed_out,
    })
}

fn wait_child(child: &mut Child, timeout: Option<Duration>) -> std::io::Result<(i32, bool)> {
    let Some(timeout) = timeout else {
        let status = child.wait()?;
        return Ok((status.code().unwrap_or(1), false));
    };
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status.code().unwrap_or(1), false));
        }
        if Instant::now() >= deadline {
            kill_group(child);
            let _ = child.kill();
            let status = child.wait()?;
            return Ok((status.code().unwrap_or(1), true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// rsync forks helpers and `-e ssh` adds an ssh client; they all share the
/// group created in `run_captured`, so one signal takes down the transfer.
fn kill_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers; a negative pid addresses the group.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).to_string());
        });
        rx
    })
}

/// Without a grace period this waits for the pipe to close; with one, output
/// still held open by a stray descendant is given up on.
fn collect_drain(rx: Option<Receiver<String>>, grace: Option<Duration>) -> String {
    let Some(rx) = rx else {
        return String::new();
    };
    match grace {
        Some(grace) => rx.recv_timeout(grace).unwrap_or_default(),
        None => rx.recv().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stderr_and_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo out; echo broken >&2; exit 3");
        let out = run_captured(&mut cmd, None).expect("run");
        assert_eq!(out.code, 3);
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "broken");
        assert!(!out.success());
    }

    #[test]
    fn timeout_kills_the_child() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = Instant::now();
        let out = run_captured(&mut cmd, Some(Duration::from_millis(200))).expect("run");
        assert!(out.timed_out);
        assert!(!out.success());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn timeout_also_kills_forked_descendants() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 4; echo done");
        let started = Instant::now();
        let out = run_captured(&mut cmd, Some(Duration::from_millis(200))).expect("run");
        assert!(out.timed_out);
        assert!(!out.stdout.contains("done"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn background_descendant_holding_the_pipe_does_not_block() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("(sleep 4; echo late) & sleep 4");
        let started = Instant::now();
        let out = run_captured(&mut cmd, Some(Duration::from_millis(200))).expect("run");
        assert!(out.timed_out);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn missing_program_is_an_error() {
        let mut cmd = Command::new("volvault-no-such-binary");
        assert!(run_captured(&mut cmd, None).is_err());
    }

    #[test]
    fn describe_joins_program_and_args() {
        let mut cmd = Command::new("rsync");
        cmd.arg("-rlptD").arg("/a/").arg("/b/");
        assert_eq!(describe_command(&cmd), "rsync -rlptD /a/ /b/");
    }
}
