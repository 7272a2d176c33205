//! Live handle on a server process, spawned by us or adopted from a previous
//! session.
//!
//! The handle is the only writer of the process' stdin. Writes go through an
//! async mutex so that commands issued from different call sites never
//! interleave on the pipe. Exit is observed by an [`ExitWatch`] that the
//! supervisor drives on its own task.

use chrono::{DateTime, Local, TimeZone};
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, watch};

use super::launcher::LaunchPlan;

const ADOPTED_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOrigin {
    Spawned,
    Adopted,
}

/// How the process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    pub code: Option<i32>,
    pub description: String,
}

impl ExitReport {
    fn from_wait(result: io::Result<std::process::ExitStatus>) -> Self {
        match result {
            Ok(status) => Self {
                code: status.code(),
                description: status.to_string(),
            },
            Err(e) => Self {
                code: None,
                description: format!("failed to wait for process: {}", e),
            },
        }
    }

    /// Code as reported to users; `-1` when the OS gave none (signal, adopted process).
    pub fn display_code(&self) -> i32 {
        self.code.unwrap_or(-1)
    }
}

pub struct ProcessHandle {
    pid: u32,
    origin: HandleOrigin,
    started_at: DateTime<Local>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    /// Longest a single command may spend writing to a full pipe.
    write_timeout: Duration,
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
    exited_rx: watch::Receiver<bool>,
}

/// Output pipes of a freshly spawned process.
pub struct ProcessOutput {
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
}

enum Watched {
    Child(Child),
    Pid(u32),
}

/// Owns the process side of a handle: waits for exit (or performs a kill)
/// and flips the handle to exited once the supervisor has processed it.
pub struct ExitWatch {
    watched: Watched,
    kill_rx: oneshot::Receiver<()>,
    exited_tx: watch::Sender<bool>,
}

impl ProcessHandle {
    fn new(
        pid: u32,
        origin: HandleOrigin,
        started_at: DateTime<Local>,
        stdin: Option<ChildStdin>,
        write_timeout: Duration,
        watched: Watched,
    ) -> (Arc<Self>, ExitWatch) {
        let (kill_tx, kill_rx) = oneshot::channel();
        let (exited_tx, exited_rx) = watch::channel(false);
        let handle = Arc::new(Self {
            pid,
            origin,
            started_at,
            stdin: tokio::sync::Mutex::new(stdin),
            write_timeout,
            kill_tx: Mutex::new(Some(kill_tx)),
            exited_rx,
        });
        let watch = ExitWatch {
            watched,
            kill_rx,
            exited_tx,
        };
        (handle, watch)
    }

    /// Spawns the plan with all three standard streams piped.
    pub fn spawn(
        plan: &LaunchPlan,
        write_timeout: Duration,
    ) -> io::Result<(Arc<Self>, ExitWatch, ProcessOutput)> {
        let mut cmd = Command::new(&plan.program);
        cmd.args(&plan.args)
            .current_dir(&plan.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = cmd.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "process exited before its pid was read"))?;

        let output = ProcessOutput {
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
        };
        let stdin = child.stdin.take();
        let (handle, watch) = Self::new(
            pid,
            HandleOrigin::Spawned,
            Local::now(),
            stdin,
            write_timeout,
            Watched::Child(child),
        );
        Ok((handle, watch, output))
    }

    /// Takes over an already-running process. It has no console input.
    pub fn adopt(pid: u32) -> (Arc<Self>, ExitWatch) {
        let started_at = process_start_time(pid).unwrap_or_else(Local::now);
        Self::new(
            pid,
            HandleOrigin::Adopted,
            started_at,
            None,
            Duration::ZERO,
            Watched::Pid(pid),
        )
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn origin(&self) -> HandleOrigin {
        self.origin
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn is_alive(&self) -> bool {
        !*self.exited_rx.borrow()
    }

    /// Writes one newline-terminated command to stdin.
    ///
    /// A write that cannot complete within the write timeout means the process
    /// stopped reading its console. The pipe is then closed, since a partial
    /// line is already in it, and every later write fails immediately.
    pub async fn send_line(&self, line: &str) -> io::Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "console input is not available")
        })?;
        let write = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        let outcome = tokio::time::timeout(self.write_timeout, write).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                *guard = None;
                tracing::warn!("Process {} is not reading its console, input closed", self.pid);
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "console input is not being read",
                ))
            }
        }
    }

    /// Resolves once the exit has been processed by the supervisor.
    pub async fn wait_exited(&self) {
        let mut rx = self.exited_rx.clone();
        let _ = rx.wait_for(|exited| *exited).await;
    }

    /// Requests forced termination. Later calls are no-ops.
    pub fn kill(&self) {
        let tx = self
            .kill_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(());
        }
    }
}

impl ExitWatch {
    pub async fn wait(&mut self) -> ExitReport {
        match &mut self.watched {
            Watched::Child(child) => {
                let kill_requested = tokio::select! {
                    status = child.wait() => return ExitReport::from_wait(status),
                    res = &mut self.kill_rx => res.is_ok(),
                };
                if kill_requested {
                    if let Err(e) = child.start_kill() {
                        tracing::warn!("Failed to kill process {:?}: {}", child.id(), e);
                    }
                }
                ExitReport::from_wait(child.wait().await)
            }
            Watched::Pid(pid) => {
                let pid = *pid;
                let mut kill_seen = false;
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(ADOPTED_POLL_INTERVAL) => {
                            if !is_alive_async(pid).await {
                                return ExitReport {
                                    code: None,
                                    description: format!("process {} is gone", pid),
                                };
                            }
                        }
                        res = &mut self.kill_rx, if !kill_seen => {
                            kill_seen = true;
                            if res.is_ok() {
                                kill_pid(pid);
                            }
                        }
                    }
                }
            }
        }
    }

    pub fn mark_exited(self) {
        let _ = self.exited_tx.send(true);
    }
}

/// Forwards every line of `reader` to `on_line`. Invalid UTF-8 is replaced
/// rather than ending the stream.
pub async fn pump_lines<R, F>(reader: R, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                on_line(text.trim_end_matches(['\r', '\n']));
            }
            Err(e) => {
                tracing::debug!("Output stream closed: {}", e);
                break;
            }
        }
    }
}

// ── sysinfo probes ─────────────────────────────────────────
// Process table scans are synchronous; async callers go through spawn_blocking.

/// Lower-cased image name without a `.exe` suffix.
pub fn process_name(pid: u32) -> Option<String> {
    let mut sys = System::new();
    let spid = Pid::from_u32(pid);
    sys.refresh_processes(ProcessesToUpdate::Some(&[spid]), true);
    sys.process(spid).map(|p| {
        let name = p.name().to_string_lossy().to_lowercase();
        name.strip_suffix(".exe").map(String::from).unwrap_or(name)
    })
}

/// Exited-but-unreaped processes count as gone.
pub fn is_alive(pid: u32) -> bool {
    let mut sys = System::new();
    let spid = Pid::from_u32(pid);
    sys.refresh_processes(ProcessesToUpdate::Some(&[spid]), true);
    sys.process(spid)
        .map_or(false, |p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
}

pub async fn is_alive_async(pid: u32) -> bool {
    tokio::task::spawn_blocking(move || is_alive(pid))
        .await
        .unwrap_or(false)
}

fn kill_pid(pid: u32) {
    let mut sys = System::new();
    let spid = Pid::from_u32(pid);
    sys.refresh_processes(ProcessesToUpdate::Some(&[spid]), true);
    match sys.process(spid) {
        Some(p) if p.kill() => tracing::info!("Killed adopted process {}", pid),
        Some(_) => tracing::warn!("Could not kill adopted process {}", pid),
        None => {}
    }
}

fn process_start_time(pid: u32) -> Option<DateTime<Local>> {
    let mut sys = System::new();
    let spid = Pid::from_u32(pid);
    sys.refresh_processes(ProcessesToUpdate::Some(&[spid]), true);
    let secs = sys.process(spid)?.start_time();
    Local.timestamp_opt(secs as i64, 0).single()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const WRITE: Duration = Duration::from_secs(5);

    fn plan(script: &str) -> LaunchPlan {
        LaunchPlan {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            working_dir: PathBuf::from("."),
        }
    }

    #[tokio::test]
    async fn exit_code_is_reported() {
        let (handle, mut watch, _out) = ProcessHandle::spawn(&plan("exit 3"), WRITE).unwrap();
        assert!(handle.is_alive());
        let report = watch.wait().await;
        watch.mark_exited();
        assert_eq!(report.code, Some(3));
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn stdin_lines_reach_the_process() {
        let (handle, mut watch, out) =
            ProcessHandle::spawn(&plan("read a; read b; echo \"$a|$b\""), WRITE).unwrap();
        let reader = tokio::spawn(async move {
            let mut lines = Vec::new();
            pump_lines(out.stdout.unwrap(), |l| lines.push(l.to_string())).await;
            lines
        });

        handle.send_line("first").await.unwrap();
        handle.send_line("second").await.unwrap();
        watch.wait().await;
        watch.mark_exited();

        assert_eq!(reader.await.unwrap(), vec!["first|second".to_string()]);
    }

    #[tokio::test]
    async fn kill_ends_an_unresponsive_process() {
        let (handle, mut watch, _out) = ProcessHandle::spawn(&plan("sleep 30"), WRITE).unwrap();
        let waiter = tokio::spawn(async move {
            let report = watch.wait().await;
            watch.mark_exited();
            report
        });
        handle.kill();
        handle.kill();
        tokio::time::timeout(Duration::from_secs(5), handle.wait_exited())
            .await
            .expect("killed process must exit");
        assert_ne!(waiter.await.unwrap().code, Some(0));
    }

    #[tokio::test]
    async fn stalled_console_fails_fast_after_one_timeout() {
        let (handle, mut watch, _out) =
            ProcessHandle::spawn(&plan("exec sleep 30"), Duration::from_millis(200)).unwrap();
        let payload = "x".repeat(4096);

        let began = std::time::Instant::now();
        let err = loop {
            if let Err(e) = handle.send_line(&payload).await {
                break e;
            }
        };
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(began.elapsed() < Duration::from_secs(3));

        let err = handle.send_line("list").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        handle.kill();
        watch.wait().await;
        watch.mark_exited();
    }

    #[test]
    fn own_process_is_alive() {
        assert!(is_alive(std::process::id()));
    }
}
