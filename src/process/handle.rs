// src/process/handle.rs

//! Supervision of a single external process.

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use crate::errors::{CirunError, Result};

use super::command::CommandSpec;
use super::reader::{ReaderOutput, read_merged};
use super::registry::ProcessRegistry;
use super::sink::{ConsoleSink, LineSink};

/// Exit code reported when the OS gives us neither a code nor a signal.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Lifecycle of a [`ProcessHandle`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Completed(i32),
    Killed,
}

impl ProcessState {
    pub fn is_finished(&self) -> bool {
        matches!(self, ProcessState::Completed(_) | ProcessState::Killed)
    }
}

/// Result of a bounded wait for the next line of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    Line(String),
    /// Nothing arrived within the timeout; try again later.
    Empty,
    /// Output is exhausted and the process has exited.
    Closed,
}

/// Per-handle options.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Tee every line to `sink` the moment it is read.
    pub echo: bool,
    pub sink: Arc<dyn LineSink>,
    /// How long `wait()` gives the reader to drain after the process exits.
    pub reader_join_grace: Duration,
    /// Run-wide set this process joins while it is alive.
    pub registry: Option<ProcessRegistry>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            echo: false,
            sink: Arc::new(ConsoleSink::new()),
            reader_join_grace: Duration::from_secs(2),
            registry: None,
        }
    }
}

impl ProcessOptions {
    pub fn echo_to(sink: Arc<dyn LineSink>) -> Self {
        Self {
            echo: true,
            sink,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Terminate,
    Kill,
}

/// Everything needed to stop a running process without the handle itself.
///
/// Signals go straight to the process group from the calling thread. The
/// supervisor only hears about it to `start_kill` the direct child as well.
#[derive(Debug, Clone)]
pub(crate) struct KillSwitch {
    label: String,
    pid: Option<u32>,
    state: Arc<Mutex<ProcessState>>,
    shutdown: Arc<AtomicBool>,
    control: mpsc::UnboundedSender<Control>,
}

impl KillSwitch {
    pub(crate) fn kill(&self) -> bool {
        let mut state = lock(&self.state);
        self.kill_locked(&mut state)
    }

    fn kill_locked(&self, state: &mut ProcessState) -> bool {
        if *state != ProcessState::Running {
            return false;
        }
        *state = ProcessState::Killed;
        self.shutdown.store(true, Ordering::SeqCst);
        // If the leader was just reaped this still reaches the rest of its group.
        let signalled = signal_group(self.pid, Control::Kill);
        // Supervisor gone means the process has already been reaped.
        let _ = self.control.send(Control::Kill);
        info!(label = %self.label, pid = self.pid, signalled, "kill issued");
        true
    }

    fn terminate(&self) {
        let state = lock(&self.state);
        if *state != ProcessState::Running {
            return;
        }
        let signalled = signal_group(self.pid, Control::Terminate);
        if !signalled {
            let _ = self.control.send(Control::Terminate);
        }
        debug!(label = %self.label, signalled, "terminate issued");
    }
}

/// Set once by `start()`.
#[derive(Debug)]
struct Started {
    switch: KillSwitch,
}

/// One external process plus its merged stdout/stderr stream.
///
/// All methods take `&self`, so a handle can be shared (`Arc<ProcessHandle>`)
/// between the loop that consumes its output and whoever may need to kill it.
///
/// The exit status is reaped exactly once, by an internal supervisor task.
/// `wait()` and `poll()` only ever observe the recorded value, so repeated
/// waits and a `kill()` racing a natural exit are both harmless.
pub struct ProcessHandle {
    spec: CommandSpec,
    options: ProcessOptions,
    state: Arc<Mutex<ProcessState>>,
    shutdown: Arc<AtomicBool>,
    started: OnceLock<Started>,
    line_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    line_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    exit_tx: Mutex<Option<watch::Sender<Option<i32>>>>,
    exit_rx: watch::Receiver<Option<i32>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("label", &self.spec.label)
            .field("command", &self.spec.argv)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ProcessHandle {
    pub fn new(spec: CommandSpec, options: ProcessOptions) -> Self {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        Self {
            spec,
            options,
            state: Arc::new(Mutex::new(ProcessState::NotStarted)),
            shutdown: Arc::new(AtomicBool::new(false)),
            started: OnceLock::new(),
            line_tx: Mutex::new(Some(line_tx)),
            line_rx: tokio::sync::Mutex::new(line_rx),
            exit_tx: Mutex::new(Some(exit_tx)),
            exit_rx,
            reader: Mutex::new(None),
        }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn label(&self) -> &str {
        &self.spec.label
    }

    pub fn state(&self) -> ProcessState {
        *lock(&self.state)
    }

    pub fn pid(&self) -> Option<u32> {
        self.started.get().and_then(|s| s.switch.pid)
    }

    /// Spawn the process and its reader task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if *state != ProcessState::NotStarted {
            return Err(CirunError::InvalidState {
                command: self.spec.to_string(),
                reason: format!("start() called in state {:?}", *state),
            });
        }

        let Some((program, args)) = self.spec.argv.split_first() else {
            return Err(CirunError::Startup {
                command: self.spec.label.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.spec.cwd {
            cmd.current_dir(cwd);
        }
        // Own process group, so signals reach compiler subprocesses too.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| CirunError::Startup {
            command: self.spec.to_string(),
            source,
        })?;

        let pid = child.id();
        info!(label = %self.spec.label, pid, cmd = %self.spec, "process started");

        let (Some(line_tx), Some(exit_tx)) = (lock(&self.line_tx).take(), lock(&self.exit_tx).take())
        else {
            // Only reachable if a previous start() spawned and then lost its
            // channels, which the state check above rules out.
            return Err(CirunError::InvalidState {
                command: self.spec.to_string(),
                reason: "output channels already taken".to_string(),
            });
        };

        let output = ReaderOutput {
            label: self.spec.label.clone(),
            lines: line_tx,
            shutdown: Arc::clone(&self.shutdown),
            echo: self.options.echo.then(|| Arc::clone(&self.options.sink)),
        };
        let reader = tokio::spawn(read_merged(child.stdout.take(), child.stderr.take(), output));
        *lock(&self.reader) = Some(reader);

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let switch = KillSwitch {
            label: self.spec.label.clone(),
            pid,
            state: Arc::clone(&self.state),
            shutdown: Arc::clone(&self.shutdown),
            control: control_tx,
        };

        let mut refused = false;
        let registration = match &self.options.registry {
            Some(registry) => match registry.register(switch.clone(), self.exit_rx.clone()) {
                Some(id) => Some((registry.clone(), id)),
                None => {
                    refused = true;
                    None
                }
            },
            None => None,
        };

        tokio::spawn(supervise(
            child,
            self.spec.label.clone(),
            control_rx,
            Arc::clone(&self.state),
            exit_tx,
            registration,
        ));

        // `state` is still held, so nobody can race us into a second start.
        *state = ProcessState::Running;
        if refused {
            warn!(label = %self.spec.label, "run is shutting down; killing new process");
            switch.kill_locked(&mut state);
        }
        let _ = self.started.set(Started { switch });
        Ok(())
    }

    /// Exit code if the process has exited; `None` before start and while
    /// running.
    pub fn poll(&self) -> Option<i32> {
        *self.exit_rx.borrow()
    }

    /// Next line of merged output, waiting at most `wait_for`.
    pub async fn get_next_line(&self, wait_for: Duration) -> LineRead {
        if self.started.get().is_none() {
            return LineRead::Empty;
        }
        let asked_at = Instant::now();

        let mut rx = self.line_rx.lock().await;
        match timeout(wait_for, rx.recv()).await {
            Ok(Some(line)) => LineRead::Line(line),
            Err(_) => LineRead::Empty,
            Ok(None) => {
                // Reader is done; the stream is closed once the exit is recorded.
                let left = wait_for.saturating_sub(asked_at.elapsed());
                let mut exit_rx = self.exit_rx.clone();
                match timeout(left, exit_rx.wait_for(Option::is_some)).await {
                    Ok(_) => LineRead::Closed,
                    Err(_) => LineRead::Empty,
                }
            }
        }
    }

    /// Wait for the process to exit and return its exit code.
    ///
    /// After the exit, the reader gets `reader_join_grace` to finish draining.
    /// If it does not, that is logged and the exit code is returned anyway.
    pub async fn wait(&self) -> Result<i32> {
        if self.started.get().is_none() {
            return Err(CirunError::InvalidState {
                command: self.spec.to_string(),
                reason: "wait() called before start()".to_string(),
            });
        }

        let mut exit_rx = self.exit_rx.clone();
        let code = match exit_rx.wait_for(Option::is_some).await {
            Ok(recorded) => (*recorded).unwrap_or(UNKNOWN_EXIT_CODE),
            Err(_) => {
                return Err(CirunError::Other(anyhow::anyhow!(
                    "supervisor for `{}` ended without recording an exit status",
                    self.spec.label
                )));
            }
        };

        self.join_reader().await;
        Ok(code)
    }

    async fn join_reader(&self) {
        let Some(mut reader) = lock(&self.reader).take() else {
            return;
        };
        let grace = self.options.reader_join_grace;
        if timeout(grace, &mut reader).await.is_err() {
            let err = CirunError::ReaderJoinTimeout {
                command: self.spec.to_string(),
                grace,
            };
            warn!(label = %self.spec.label, error = %err, "output may be incomplete");
            if self.shutdown.load(Ordering::SeqCst) {
                reader.abort();
            }
        }
    }

    /// Forcefully stop the process right now.
    ///
    /// On unix the whole process group has been sent `SIGKILL` by the time
    /// this returns. Returns `true` if a kill was issued, `false` if the
    /// handle had already finished (nothing to do). Killing a handle that was
    /// never started marks it killed so it can no longer be started.
    pub fn kill(&self) -> bool {
        let mut state = lock(&self.state);
        match (*state, self.started.get()) {
            (ProcessState::Running, Some(started)) => started.switch.kill_locked(&mut state),
            (ProcessState::NotStarted, _) => {
                *state = ProcessState::Killed;
                debug!(label = %self.spec.label, "killed before start");
                false
            }
            _ => false,
        }
    }

    /// Ask the process group to exit (`SIGTERM`). It may ignore the request.
    /// Platforms without process groups get a kill instead.
    pub fn terminate(&self) {
        if let Some(started) = self.started.get() {
            started.switch.terminate();
        }
    }

    /// `terminate()`, then `kill()` if the process is still around after
    /// `grace`. Returns the exit code.
    pub async fn terminate_then_kill(&self, grace: Duration) -> Result<i32> {
        self.terminate();
        match timeout(grace, self.wait()).await {
            Ok(res) => res,
            Err(_) => {
                warn!(label = %self.spec.label, ?grace, "terminate ignored; killing");
                self.kill();
                self.wait().await
            }
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.state() == ProcessState::Running && self.kill() {
            debug!(label = %self.spec.label, "handle dropped while running; killed");
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the child: the only place its exit status is ever reaped.
async fn supervise(
    mut child: Child,
    label: String,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
    state: Arc<Mutex<ProcessState>>,
    exit_tx: watch::Sender<Option<i32>>,
    registration: Option<(ProcessRegistry, u64)>,
) {
    // The group has already been signalled; this covers the direct child
    // and platforms without process groups.
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(ctrl) = control_rx.recv() => {
                if let Err(e) = child.start_kill() {
                    debug!(label = %label, ?ctrl, error = %e, "start_kill failed; process likely gone");
                }
            }
        }
    };

    let code = match status {
        Ok(status) => exit_code_of(&status),
        Err(e) => {
            warn!(label = %label, error = %e, "failed waiting for process");
            UNKNOWN_EXIT_CODE
        }
    };

    {
        let mut state = lock(&state);
        if *state == ProcessState::Running {
            *state = ProcessState::Completed(code);
        }
    }
    info!(label = %label, exit_code = code, "process exited");
    let _ = exit_tx.send(Some(code));
    if let Some((registry, id)) = registration {
        registry.unregister(id);
    }
}

fn exit_code_of(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    UNKNOWN_EXIT_CODE
}

/// Signal the child's whole process group. Returns `false` when no signal
/// could be delivered this way.
#[cfg(unix)]
fn signal_group(pid: Option<u32>, ctrl: Control) -> bool {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return false };
    let Ok(raw) = i32::try_from(pid) else { return false };
    let signal = match ctrl {
        Control::Kill => Signal::SIGKILL,
        Control::Terminate => Signal::SIGTERM,
    };
    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) => true,
        Err(e) => {
            debug!(pid, ?signal, error = %e, "killpg failed");
            false
        }
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: Option<u32>, _ctrl: Control) -> bool {
    false
}
