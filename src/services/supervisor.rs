//! Lifecycle state machine for one server profile.
//!
//! The supervisor exclusively owns the process handle. Every state change
//! happens under one runtime lock that is never held across an await, and
//! the exit of a process is processed exactly once, by the task that watches
//! it. Exit transitions (handle released, players reset, sampler stopped)
//! are applied before the handle is marked exited, so anything waiting on
//! that handle observes a consistent `Stopped`/`Restarting` state.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backup_service;
use super::confirm::Confirmer;
use super::console::{self, CommandHistory, PlayerAction};
use super::discord_service::{Notifier, COLOR_GREEN, COLOR_ORANGE, COLOR_RED};
use super::eula;
use super::launcher;
use super::log_sink::LogSink;
use super::metrics;
use super::pid_file::PidFiles;
use super::players::{ConnectedPlayers, PlayerPatterns, PresenceChange};
use super::process_handle::{
    pump_lines, ExitReport, ExitWatch, HandleOrigin, ProcessHandle, ProcessOutput,
};
use super::scheduler;
use super::validation;
use crate::config::Timings;
use crate::error::SupervisorError;
use crate::models::{ProcessMetrics, ServerProfile, ServerState, SharedProfile, SupervisorEvent};
use crate::utils::memory::max_heap_mb;

const EVENT_CAPACITY: usize = 256;
/// Extra wait for the process to disappear after a kill.
const KILL_GRACE: Duration = Duration::from_secs(5);

pub const EULA_PROMPT: &str =
    "The Minecraft EULA (https://aka.ms/MinecraftEULA) has not been accepted for this server. Accept it?";
const KICK_REASON: &str = "Server is shutting down";
const RESTART_WARNING: &str = "Scheduled restart, the server will be back in a moment.";
const RESTART_TITLE: &str = "Restarting";

/// What the exit handler does with the next exit of the current process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExitIntent {
    /// Nobody asked for it: notify and retry after a delay.
    #[default]
    Crash,
    Stop,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Started { pid: u32 },
    AlreadyRunning,
    EulaDeclined,
    /// A delayed retry found itself cancelled.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped,
    Killed,
    AlreadyStopped,
    AlreadyStopping,
    /// No process was running but a crash/restart retry was pending.
    RetryCancelled,
}

#[derive(Debug, Clone, Copy)]
enum StartOrigin {
    Manual,
    Retry(u64),
}

/// Everything a supervisor needs from the application, shared by all of them.
#[derive(Clone)]
pub struct SupervisorContext {
    pub patterns: Arc<PlayerPatterns>,
    pub notifier: Arc<dyn Notifier>,
    pub confirmer: Arc<dyn Confirmer>,
    pub pid_files: PidFiles,
    pub timings: Timings,
    pub log_display_cap: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    pub state: ServerState,
    pub running: bool,
    pub busy: bool,
    pub pid: Option<u32>,
    /// Reattached from a previous session; console input is unavailable.
    pub adopted: bool,
    pub player_count: usize,
    pub players: Vec<String>,
    pub metrics: Option<ProcessMetrics>,
    pub last_auto_restart: Option<NaiveDate>,
    pub retry_pending: bool,
}

#[derive(Default)]
struct Runtime {
    state: ServerState,
    backup_in_progress: bool,
    intent: ExitIntent,
    handle: Option<Arc<ProcessHandle>>,
    /// Incremented for every installed handle; stale output is ignored.
    generation: u64,
    /// Epoch of the delayed start a crash or restart scheduled, if any.
    pending_retry: Option<u64>,
    retry_epoch: u64,
    last_auto_restart: Option<NaiveDate>,
    players: ConnectedPlayers,
    sampler: Option<JoinHandle<()>>,
    shutting_down: bool,
}

impl Runtime {
    fn busy(&self) -> bool {
        self.state.is_transition() || self.backup_in_progress
    }

    fn live_handle(&self) -> Option<Arc<ProcessHandle>> {
        self.handle.as_ref().filter(|h| h.is_alive()).cloned()
    }
}

pub struct Supervisor {
    id: String,
    profile: SharedProfile,
    log: Arc<LogSink>,
    patterns: Arc<PlayerPatterns>,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    pid_files: PidFiles,
    timings: Timings,
    events: broadcast::Sender<SupervisorEvent>,
    metrics: watch::Sender<Option<ProcessMetrics>>,
    history: Mutex<CommandHistory>,
    runtime: Mutex<Runtime>,
}

/// Clears the backup flag when dropped.
pub struct BackupGuard<'a> {
    supervisor: &'a Supervisor,
}

impl Drop for BackupGuard<'_> {
    fn drop(&mut self) {
        self.supervisor.lock().backup_in_progress = false;
        self.supervisor.emit_state();
    }
}

impl Supervisor {
    pub fn new(profile: ServerProfile, ctx: SupervisorContext) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (metrics, _) = watch::channel(None);
        Arc::new(Self {
            id: profile.id.clone(),
            profile: profile.into_shared(),
            log: Arc::new(LogSink::new(ctx.log_display_cap)),
            patterns: ctx.patterns,
            notifier: ctx.notifier,
            confirmer: ctx.confirmer,
            pid_files: ctx.pid_files,
            timings: ctx.timings,
            events,
            metrics,
            history: Mutex::new(CommandHistory::default()),
            runtime: Mutex::new(Runtime::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Runtime> {
        self.runtime.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn history_lock(&self) -> MutexGuard<'_, CommandHistory> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Accessors ──────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn profile(&self) -> &SharedProfile {
        &self.profile
    }

    pub fn log(&self) -> &Arc<LogSink> {
        &self.log
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    pub fn watch_metrics(&self) -> watch::Receiver<Option<ProcessMetrics>> {
        self.metrics.subscribe()
    }

    pub fn state(&self) -> ServerState {
        self.lock().state
    }

    pub fn is_busy(&self) -> bool {
        self.lock().busy()
    }

    /// True iff a process handle exists and has not exited.
    pub fn is_running(&self) -> bool {
        self.lock().live_handle().is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.lock().handle.as_ref().map(|h| h.pid())
    }

    pub fn player_count(&self) -> usize {
        self.lock().players.count()
    }

    pub fn players(&self) -> Vec<String> {
        self.lock().players.names().to_vec()
    }

    pub fn retry_pending(&self) -> bool {
        self.lock().pending_retry.is_some()
    }

    pub fn status(&self) -> SupervisorStatus {
        let metrics = self.metrics.borrow().clone();
        let rt = self.lock();
        SupervisorStatus {
            state: rt.state,
            running: rt.live_handle().is_some(),
            busy: rt.busy(),
            pid: rt.handle.as_ref().map(|h| h.pid()),
            adopted: rt
                .handle
                .as_ref()
                .map_or(false, |h| h.origin() == HandleOrigin::Adopted),
            player_count: rt.players.count(),
            players: rt.players.names().to_vec(),
            metrics,
            last_auto_restart: rt.last_auto_restart,
            retry_pending: rt.pending_retry.is_some(),
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.history_lock().entries()
    }

    pub fn history_previous(&self) -> Option<String> {
        self.history_lock().recall_previous().map(String::from)
    }

    /// An empty string once navigation moves past the newest entry.
    pub fn history_next(&self) -> String {
        self.history_lock()
            .recall_next()
            .map(String::from)
            .unwrap_or_default()
    }

    pub fn is_current_handle(&self, handle: &Arc<ProcessHandle>) -> bool {
        self.lock()
            .handle
            .as_ref()
            .map_or(false, |current| Arc::ptr_eq(current, handle))
    }

    // ── Events & logging ───────────────────────────────────

    fn emit(&self, event: SupervisorEvent) {
        let _ = self.events.send(event);
    }

    fn emit_state(&self) {
        let (state, busy) = {
            let rt = self.lock();
            (rt.state, rt.busy())
        };
        self.emit(SupervisorEvent::StateChanged { state, busy });
    }

    fn set_state(&self, state: ServerState) {
        self.lock().state = state;
        self.emit_state();
    }

    /// Writes a `>>>` line into the console and the same text to tracing.
    pub fn lifecycle(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        self.log.append(&format!(">>> {}", message));
        info!("[{}] {}", self.id, message);
    }

    pub fn publish_metrics(&self, sample: ProcessMetrics) {
        self.metrics.send_replace(Some(sample.clone()));
        self.emit(SupervisorEvent::Metrics(sample));
    }

    pub(crate) async fn notify(&self, title: &str, body: String, color: u32) {
        let url = self.profile.read().await.webhook_url().map(String::from);
        if let Some(url) = url {
            self.notifier.notify(&url, title, &body, color);
        }
    }

    async fn display_name(&self) -> String {
        self.profile.read().await.display_name.clone()
    }

    // ── Start ──────────────────────────────────────────────

    /// Starts the server. A no-op when it is already running.
    pub async fn start(self: &Arc<Self>) -> Result<StartOutcome, SupervisorError> {
        self.start_inner(StartOrigin::Manual).await
    }

    async fn start_inner(self: &Arc<Self>, origin: StartOrigin) -> Result<StartOutcome, SupervisorError> {
        if self.lock().handle.is_some() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let profile = self.profile.read().await.clone();
        let problems = validation::validate_profile(&profile);
        if !problems.is_empty() {
            for problem in &problems {
                warn!("[{}] Cannot start: {}", self.id, problem);
            }
            if let StartOrigin::Retry(epoch) = origin {
                self.abandon_retry(epoch);
            }
            return Err(SupervisorError::Validation(problems));
        }

        {
            let mut rt = self.lock();
            if rt.handle.is_some() {
                return Ok(StartOutcome::AlreadyRunning);
            }
            match origin {
                StartOrigin::Manual => {
                    if rt.shutting_down || rt.busy() {
                        return Err(SupervisorError::Busy);
                    }
                }
                StartOrigin::Retry(epoch) => {
                    if rt.pending_retry != Some(epoch) || rt.shutting_down {
                        return Ok(StartOutcome::Cancelled);
                    }
                    if rt.backup_in_progress {
                        rt.pending_retry = None;
                        rt.state = ServerState::Stopped;
                        drop(rt);
                        self.emit_state();
                        return Err(SupervisorError::Busy);
                    }
                }
            }
            // A manual start supersedes any pending retry.
            rt.pending_retry = None;
            rt.state = ServerState::Starting;
            rt.intent = ExitIntent::Crash;
        }
        self.emit_state();

        match self.launch(&profile).await {
            Ok(StartOutcome::Started { pid }) => Ok(StartOutcome::Started { pid }),
            Ok(other) => {
                self.set_state(ServerState::Stopped);
                Ok(other)
            }
            Err(e) => {
                self.set_state(ServerState::Stopped);
                Err(e)
            }
        }
    }

    async fn launch(self: &Arc<Self>, profile: &ServerProfile) -> Result<StartOutcome, SupervisorError> {
        let folder = &profile.folder_path;

        if eula::needs_agreement(folder).await {
            if !self.confirmer.ask_yes_no(EULA_PROMPT).await {
                self.lifecycle("EULA was not accepted, start cancelled");
                return Ok(StartOutcome::EulaDeclined);
            }
            eula::accept(folder).await?;
            self.lifecycle("EULA accepted");
        }

        if profile.clear_logs_on_start {
            self.log.clear();
        }

        self.lifecycle(format!("Starting {}...", profile.display_name));

        let plan = launcher::prepare(profile)
            .await
            .map_err(|e| self.spawn_failed(e))?;

        if self.lock().shutting_down {
            return Err(SupervisorError::Busy);
        }

        let (handle, watch, output) =
            ProcessHandle::spawn(&plan, self.timings.command_write_timeout)
                .map_err(|e| self.spawn_failed(e))?;
        let pid = handle.pid();

        // Written before the exit task exists, so its removal always comes last.
        if let Err(e) = self.pid_files.write(&self.id, pid) {
            warn!("[{}] Could not write pid file: {}", self.id, e);
        }

        self.install(handle, watch, Some(output), max_heap_mb(&profile.jvm_arguments));

        self.lifecycle(format!("Server started (pid {})", pid));
        self.notify(
            "Server started",
            format!("{} is starting up.", profile.display_name),
            COLOR_GREEN,
        )
        .await;

        Ok(StartOutcome::Started { pid })
    }

    fn spawn_failed(&self, e: std::io::Error) -> SupervisorError {
        self.log.append(&format!("[ERROR] Failed to start server: {}", e));
        error!("[{}] Failed to start server: {}", self.id, e);
        SupervisorError::Spawn(e)
    }

    /// Makes `handle` the live process and wires its output, exit watch and sampler.
    fn install(
        self: &Arc<Self>,
        handle: Arc<ProcessHandle>,
        watch: ExitWatch,
        output: Option<ProcessOutput>,
        max_memory_mb: Option<f64>,
    ) {
        let sampler = metrics::spawn(
            Arc::clone(self),
            Arc::clone(&handle),
            self.timings.sampler_period,
            max_memory_mb,
        );

        let generation = {
            let mut rt = self.lock();
            rt.generation += 1;
            rt.handle = Some(Arc::clone(&handle));
            rt.state = ServerState::Running;
            rt.intent = ExitIntent::Crash;
            rt.players.clear();
            if let Some(old) = rt.sampler.replace(sampler) {
                old.abort();
            }
            rt.generation
        };
        self.metrics.send_replace(None);

        if let Some(output) = output {
            self.spawn_output_pumps(generation, output);
        }
        self.spawn_exit_watch(handle, watch);
        self.emit(SupervisorEvent::PlayersReset);
        self.emit_state();
    }

    fn spawn_output_pumps(self: &Arc<Self>, generation: u64, output: ProcessOutput) {
        if let Some(stdout) = output.stdout {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                pump_lines(stdout, |line| this.on_output_line(generation, line)).await;
            });
        }
        if let Some(stderr) = output.stderr {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                pump_lines(stderr, |line| this.on_output_line(generation, line)).await;
            });
        }
    }

    fn on_output_line(&self, generation: u64, line: &str) {
        self.log.append(line);

        let Some(change) = self.patterns.parse(line) else {
            return;
        };
        let event = {
            let mut rt = self.lock();
            if rt.generation != generation || rt.handle.is_none() || !rt.players.apply(&change) {
                return;
            }
            let count = rt.players.count();
            match change {
                PresenceChange::Joined(name) => SupervisorEvent::PlayerJoined { name, count },
                PresenceChange::Left(name) => SupervisorEvent::PlayerLeft { name, count },
            }
        };
        self.emit(event);
    }

    /// Takes over a process left running by a previous session.
    pub async fn adopt(self: &Arc<Self>, pid: u32) -> bool {
        if self.lock().handle.is_some() {
            return false;
        }
        let max_memory = max_heap_mb(&self.profile.read().await.jvm_arguments);
        let (handle, watch) = ProcessHandle::adopt(pid);
        self.install(handle, watch, None, max_memory);
        self.lifecycle(format!(
            "Reattached to running server process {} (console input unavailable)",
            pid
        ));
        true
    }

    // ── Exit handling ──────────────────────────────────────

    fn spawn_exit_watch(self: &Arc<Self>, handle: Arc<ProcessHandle>, mut watch: ExitWatch) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let report = watch.wait().await;
            this.handle_exit(&handle, report, watch).await;
        });
    }

    async fn handle_exit(self: &Arc<Self>, handle: &Arc<ProcessHandle>, report: ExitReport, watch: ExitWatch) {
        let (intent, retry) = {
            let mut rt = self.lock();
            let is_current = rt
                .handle
                .as_ref()
                .map_or(false, |current| Arc::ptr_eq(current, handle));
            if !is_current {
                drop(rt);
                watch.mark_exited();
                return;
            }

            rt.handle = None;
            rt.players.clear();
            if let Some(sampler) = rt.sampler.take() {
                sampler.abort();
            }
            let intent = std::mem::take(&mut rt.intent);

            let retry = match intent {
                ExitIntent::Stop => None,
                _ if rt.shutting_down => None,
                ExitIntent::Restart => Some(self.timings.restart_delay),
                ExitIntent::Crash => Some(self.timings.crash_retry_delay),
            };
            rt.state = match (intent, retry) {
                (ExitIntent::Restart, Some(_)) => ServerState::Restarting,
                _ => ServerState::Stopped,
            };
            let retry = retry.map(|delay| {
                rt.retry_epoch += 1;
                rt.pending_retry = Some(rt.retry_epoch);
                (rt.retry_epoch, delay)
            });
            (intent, retry)
        };

        self.metrics.send_replace(None);
        self.pid_files.delete(&self.id);
        self.emit(SupervisorEvent::PlayersReset);
        self.emit_state();
        watch.mark_exited();

        let name = self.display_name().await;
        match (intent, retry) {
            // A restart overtaken by shutdown ends as a plain stop.
            (ExitIntent::Stop, _) | (ExitIntent::Restart, None) => {
                self.lifecycle("Server stopped");
                self.notify("Server stopped", format!("{} was stopped manually.", name), COLOR_RED)
                    .await;
            }
            (ExitIntent::Restart, Some((_, delay))) => {
                self.lifecycle(format!("Server stopped, restarting in {}s", delay.as_secs()));
                self.notify(
                    "Server restarting",
                    format!("{} is restarting.", name),
                    COLOR_ORANGE,
                )
                .await;
            }
            (ExitIntent::Crash, _) => {
                let code = report.display_code();
                self.log.append(&format!(
                    "[ERROR] Server exited unexpectedly with code {} ({})",
                    code, report.description
                ));
                warn!("[{}] Server crashed with exit code {}", self.id, code);
                if let Some((_, delay)) = retry {
                    self.lifecycle(format!("Restarting in {}s", delay.as_secs()));
                }
                self.notify(
                    "Server crashed",
                    format!("{} stopped unexpectedly (exit code {}).", name, code),
                    COLOR_RED,
                )
                .await;
            }
        }

        if let Some((epoch, delay)) = retry {
            self.spawn_retry(epoch, delay);
        }
    }

    fn spawn_retry(self: &Arc<Self>, epoch: u64, delay: Duration) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match this.start_inner(StartOrigin::Retry(epoch)).await {
                Ok(StartOutcome::Cancelled) => debug!("[{}] Pending restart was cancelled", this.id),
                Ok(_) => {}
                Err(e) => {
                    this.log.append(&format!("[ERROR] Automatic restart failed: {}", e));
                    error!("[{}] Automatic restart failed: {}", this.id, e);
                }
            }
        });
    }

    /// Drops the pending retry `epoch` and leaves the compound restart state.
    fn abandon_retry(&self, epoch: u64) {
        {
            let mut rt = self.lock();
            if rt.pending_retry != Some(epoch) {
                return;
            }
            rt.pending_retry = None;
            if rt.state == ServerState::Restarting {
                rt.state = ServerState::Stopped;
            }
        }
        self.emit_state();
    }

    // ── Stop / restart / kill ──────────────────────────────

    /// Graceful stop: kick everyone, send `stop`, kill after the stop timeout.
    pub async fn stop(self: &Arc<Self>) -> Result<StopOutcome, SupervisorError> {
        self.request_stop(ExitIntent::Stop, false).await
    }

    /// Graceful stop followed by a start after the restart delay.
    pub async fn restart(self: &Arc<Self>) -> Result<StopOutcome, SupervisorError> {
        if !self.is_running() {
            return Err(SupervisorError::NotRunning);
        }
        self.request_stop(ExitIntent::Restart, false).await
    }

    async fn request_stop(
        self: &Arc<Self>,
        intent: ExitIntent,
        ignore_backup: bool,
    ) -> Result<StopOutcome, SupervisorError> {
        let handle = {
            let mut rt = self.lock();
            let Some(handle) = rt.handle.clone() else {
                if rt.state == ServerState::Starting {
                    return Err(SupervisorError::Busy);
                }
                if rt.pending_retry.take().is_none() {
                    return Ok(StopOutcome::AlreadyStopped);
                }
                rt.state = ServerState::Stopped;
                drop(rt);
                self.emit_state();
                self.lifecycle("Pending restart cancelled");
                return Ok(StopOutcome::RetryCancelled);
            };

            if rt.state == ServerState::Stopping {
                // A manual stop wins over a scheduled restart, never the reverse.
                if intent == ExitIntent::Stop {
                    rt.intent = ExitIntent::Stop;
                }
                return Ok(StopOutcome::AlreadyStopping);
            }
            if rt.backup_in_progress && !ignore_backup {
                return Err(SupervisorError::Busy);
            }
            rt.intent = intent;
            rt.state = ServerState::Stopping;
            handle
        };
        self.emit_state();

        self.lifecycle("Stop requested");
        // One deadline covers delivery too: a process that stopped reading
        // stdin must still be killed on time.
        let deadline = tokio::time::Instant::now() + self.timings.stop_timeout;
        let graceful = async {
            let _ = self.deliver(&handle, &console::kick_all(KICK_REASON)).await;
            let _ = self.deliver(&handle, console::STOP).await;
            handle.wait_exited().await;
        };
        if tokio::time::timeout_at(deadline, graceful).await.is_ok() {
            return Ok(StopOutcome::Stopped);
        }

        warn!(
            "[{}] Server did not stop within {}s, killing it",
            self.id,
            self.timings.stop_timeout.as_secs()
        );
        self.lifecycle("Server did not stop in time, forcing termination");
        self.force_kill(&handle).await;
        Ok(StopOutcome::Killed)
    }

    /// Immediate termination. Counts as an intentional stop.
    pub async fn kill(self: &Arc<Self>) -> Result<StopOutcome, SupervisorError> {
        let handle = {
            let mut rt = self.lock();
            let Some(handle) = rt.handle.clone() else {
                if rt.pending_retry.take().is_none() {
                    return Ok(StopOutcome::AlreadyStopped);
                }
                rt.state = ServerState::Stopped;
                drop(rt);
                self.emit_state();
                return Ok(StopOutcome::RetryCancelled);
            };
            rt.intent = ExitIntent::Stop;
            rt.state = ServerState::Stopping;
            handle
        };
        self.emit_state();
        self.lifecycle("Killing server process");
        self.force_kill(&handle).await;
        Ok(StopOutcome::Killed)
    }

    async fn force_kill(&self, handle: &Arc<ProcessHandle>) {
        handle.kill();
        if tokio::time::timeout(KILL_GRACE, handle.wait_exited())
            .await
            .is_err()
        {
            error!("[{}] Process {} survived a kill request", self.id, handle.pid());
        }
    }

    /// Stops for good: cancels any pending retry and refuses later starts.
    /// Used by whole-application shutdown and profile removal.
    pub async fn shutdown(self: &Arc<Self>) -> StopOutcome {
        self.lock().shutting_down = true;

        match self.request_stop(ExitIntent::Stop, true).await {
            Ok(StopOutcome::AlreadyStopping) => {
                // Another stop is in flight and bounded by its own timeout.
                let handle = self.lock().handle.clone();
                if let Some(handle) = handle {
                    let wait = self.timings.stop_timeout + KILL_GRACE;
                    if tokio::time::timeout(wait, handle.wait_exited()).await.is_err() {
                        self.force_kill(&handle).await;
                        return StopOutcome::Killed;
                    }
                }
                StopOutcome::Stopped
            }
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("[{}] Shutdown stop failed: {}", self.id, e);
                StopOutcome::AlreadyStopped
            }
        }
    }

    // ── Scheduled restart ──────────────────────────────────

    /// Called once per sampler tick. Fires the restart at most once per day.
    pub async fn check_scheduled_restart(self: &Arc<Self>, now: NaiveDateTime) -> bool {
        let (enabled, time) = {
            let p = self.profile.read().await;
            (p.auto_restart_enabled, p.auto_restart_time.clone())
        };

        {
            let mut rt = self.lock();
            if rt.state != ServerState::Running || rt.live_handle().is_none() {
                return false;
            }
            if !scheduler::restart_due(enabled, &time, rt.last_auto_restart, now) {
                return false;
            }
            rt.last_auto_restart = Some(now.date());
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.perform_scheduled_restart().await {
                warn!("[{}] Scheduled restart failed: {}", this.id, e);
            }
        });
        true
    }

    /// Warns players, then stops with a restart pending.
    pub async fn perform_scheduled_restart(self: &Arc<Self>) -> Result<StopOutcome, SupervisorError> {
        let handle = self.lock().live_handle().ok_or(SupervisorError::NotRunning)?;
        self.lifecycle("Scheduled restart");
        let _ = self.deliver(&handle, &console::say(RESTART_WARNING)).await;
        let _ = self.deliver(&handle, &console::title_all(RESTART_TITLE)).await;
        self.request_stop(ExitIntent::Restart, false).await
    }

    // ── Console ────────────────────────────────────────────

    /// Sends one console command. Blank input is ignored.
    pub async fn send_command(&self, text: &str) -> Result<(), SupervisorError> {
        let command = text.trim();
        if command.is_empty() {
            return Ok(());
        }
        if command.contains(['\n', '\r']) {
            return Err(SupervisorError::Validation(vec![
                "Console commands must be a single line".to_string(),
            ]));
        }
        let handle = self.lock().live_handle().ok_or(SupervisorError::NotRunning)?;
        self.history_lock().push(command);
        self.deliver(&handle, command).await
    }

    /// Sends a command on the supervisor's own behalf, outside the history.
    pub async fn send_internal(&self, command: &str) -> Result<(), SupervisorError> {
        let handle = self.lock().live_handle().ok_or(SupervisorError::NotRunning)?;
        self.deliver(&handle, command).await
    }

    pub async fn player_action(&self, action: PlayerAction, name: &str) -> Result<(), SupervisorError> {
        let command = console::player_command(action, name).ok_or_else(|| {
            SupervisorError::Validation(vec![format!("'{}' is not a valid player name", name)])
        })?;
        self.send_command(&command).await
    }

    async fn deliver(&self, handle: &ProcessHandle, command: &str) -> Result<(), SupervisorError> {
        handle.send_line(command).await.map_err(|e| {
            self.log
                .append(&format!("[ERROR] Could not send '{}': {}", command, e));
            warn!("[{}] Command '{}' not delivered: {}", self.id, command, e);
            SupervisorError::CommandDelivery(e)
        })
    }

    // ── Backup ─────────────────────────────────────────────

    pub(crate) fn begin_backup(&self) -> Result<BackupGuard<'_>, SupervisorError> {
        {
            let mut rt = self.lock();
            if rt.busy() {
                return Err(SupervisorError::Busy);
            }
            rt.backup_in_progress = true;
        }
        self.emit_state();
        Ok(BackupGuard { supervisor: self })
    }

    pub async fn perform_backup(&self) -> Result<std::path::PathBuf, SupervisorError> {
        backup_service::perform_backup(self).await
    }
}
