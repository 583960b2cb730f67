//! Driving a feed session from a single task.
//!
//! The runner owns the [`FeedController`], the retry interval, the in-flight
//! probe and any local tracks. Callers talk to it through a [`FeedHandle`];
//! state is published on a `watch` channel. Shutting down (or dropping every
//! handle) cancels the timer, aborts the probe and stops the tracks.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::controller::{FeedController, FeedSource, FeedState, LoadTicket};
use super::probe::FeedProbe;
use crate::device::CaptureDevice;
use crate::error::{Error, Result};
use crate::identity::SessionIdentity;

/// Command queue depth; commands are user actions, so this is generous.
const COMMAND_BUFFER: usize = 32;

/// What observers see of a feed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSnapshot {
    /// Current state.
    pub state: FeedState,
    /// Current source, if active.
    pub source: Option<FeedSource>,
    /// Current stream URL.
    pub source_url: Option<String>,
    /// Most recent load failure.
    pub last_error: Option<String>,
    /// Generation of the current load attempt.
    pub generation: u64,
}

impl FeedSnapshot {
    fn of(controller: &FeedController) -> Self {
        let session = controller.session();
        Self {
            state: controller.state(),
            source: controller.source().cloned(),
            source_url: session.source_url.clone(),
            last_error: session.last_error.clone(),
            generation: controller.current_ticket().generation(),
        }
    }
}

enum FeedCommand {
    Start(Option<SessionIdentity>),
    StartLocal {
        device: Arc<dyn CaptureDevice>,
        reply: oneshot::Sender<Result<()>>,
    },
    ManualRetry,
    Stop,
    Shutdown,
}

/// Handle to a running feed session task.
#[derive(Debug)]
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
    snapshots: watch::Receiver<FeedSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for FeedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start(identity) => f.debug_tuple("Start").field(identity).finish(),
            Self::StartLocal { device, .. } => f
                .debug_struct("StartLocal")
                .field("device", &device.name())
                .finish(),
            Self::ManualRetry => write!(f, "ManualRetry"),
            Self::Stop => write!(f, "Stop"),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl FeedHandle {
    /// Start (or restart) a remote session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunnerClosed`] if the runner has shut down.
    pub async fn start(&self, identity: Option<SessionIdentity>) -> Result<()> {
        self.send(FeedCommand::Start(identity)).await
    }

    /// Start a session on a local capture device.
    ///
    /// # Errors
    ///
    /// Returns the device error if the tracks cannot be acquired, or
    /// [`Error::RunnerClosed`] if the runner has shut down.
    pub async fn start_local(&self, device: Arc<dyn CaptureDevice>) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(FeedCommand::StartLocal { device, reply }).await?;
        response.await.map_err(|_| Error::RunnerClosed)?
    }

    /// Retry the feed now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunnerClosed`] if the runner has shut down.
    pub async fn manual_retry(&self) -> Result<()> {
        self.send(FeedCommand::ManualRetry).await
    }

    /// Stop the session; the runner stays available for a later start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunnerClosed`] if the runner has shut down.
    pub async fn stop(&self) -> Result<()> {
        self.send(FeedCommand::Stop).await
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshots.clone()
    }

    /// Tear the session down and wait for the runner to finish.
    pub async fn shutdown(mut self) {
        // Fails only if the runner already exited, which is the goal anyway
        let _ = self.commands.send(FeedCommand::Shutdown).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Feed runner task ended abnormally");
            }
        }
    }

    async fn send(&self, command: FeedCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::RunnerClosed)
    }
}

/// The task that owns a feed session.
pub struct FeedRunner {
    controller: FeedController,
    probe: Arc<dyn FeedProbe>,
    retry_interval: Duration,
    retry: Option<Interval>,
    probe_task: Option<JoinHandle<()>>,
    probe_results_tx: mpsc::UnboundedSender<(LoadTicket, Result<()>)>,
    probe_results: mpsc::UnboundedReceiver<(LoadTicket, Result<()>)>,
    commands: mpsc::Receiver<FeedCommand>,
    snapshots: watch::Sender<FeedSnapshot>,
}

impl std::fmt::Debug for FeedRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedRunner")
            .field("controller", &self.controller)
            .field("retry_interval", &self.retry_interval)
            .field("retry_armed", &self.retry.is_some())
            .field("probe_in_flight", &self.probe_task.is_some())
            .finish_non_exhaustive()
    }
}

impl FeedRunner {
    /// Spawn an idle runner.
    #[must_use]
    pub fn spawn(
        controller: FeedController,
        probe: Arc<dyn FeedProbe>,
        retry_interval: Duration,
    ) -> FeedHandle {
        Self::spawn_inner(controller, probe, retry_interval, None)
    }

    /// Spawn a runner and start a remote session immediately.
    #[must_use]
    pub fn mount(
        controller: FeedController,
        probe: Arc<dyn FeedProbe>,
        retry_interval: Duration,
        identity: Option<SessionIdentity>,
    ) -> FeedHandle {
        Self::spawn_inner(controller, probe, retry_interval, Some(identity))
    }

    fn spawn_inner(
        controller: FeedController,
        probe: Arc<dyn FeedProbe>,
        retry_interval: Duration,
        initial: Option<Option<SessionIdentity>>,
    ) -> FeedHandle {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (snapshots, snapshots_rx) = watch::channel(FeedSnapshot::of(&controller));
        let (probe_results_tx, probe_results) = mpsc::unbounded_channel();

        let mut runner = Self {
            controller,
            probe,
            retry_interval,
            retry: None,
            probe_task: None,
            probe_results_tx,
            probe_results,
            commands,
            snapshots,
        };

        if let Some(identity) = initial {
            runner.start(identity.as_ref());
        }

        let task = tokio::spawn(runner.run());
        FeedHandle {
            commands: commands_tx,
            snapshots: snapshots_rx,
            task: Some(task),
        }
    }

    async fn run(mut self) {
        debug!("Feed runner started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(FeedCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                Some((ticket, outcome)) = self.probe_results.recv() => {
                    self.on_probe_result(ticket, outcome);
                }
                () = next_tick(&mut self.retry) => self.on_retry_tick(),
            }
        }
        self.teardown();
        debug!("Feed runner stopped");
    }

    fn handle(&mut self, command: FeedCommand) {
        debug!(?command, "Feed command");
        match command {
            FeedCommand::Start(identity) => self.start(identity.as_ref()),
            FeedCommand::StartLocal { device, reply } => {
                let result = self.controller.start_local(device.as_ref()).map(|ticket| {
                    self.arm_retry();
                    self.launch_probe(ticket);
                });
                self.publish();
                // The caller may have given up waiting
                let _ = reply.send(result);
            }
            FeedCommand::ManualRetry => {
                if let Some(ticket) = self.controller.manual_retry() {
                    self.reset_retry();
                    self.launch_probe(ticket);
                }
                self.publish();
            }
            FeedCommand::Stop => {
                self.cancel_probe();
                self.retry = None;
                self.controller.stop();
                self.publish();
            }
            FeedCommand::Shutdown => {}
        }
    }

    fn start(&mut self, identity: Option<&SessionIdentity>) {
        let ticket = self.controller.start(identity);
        self.arm_retry();
        self.launch_probe(ticket);
        self.publish();
    }

    fn on_retry_tick(&mut self) {
        if let Some(ticket) = self.controller.retry_tick() {
            info!(generation = ticket.generation(), "Retrying feed");
            self.launch_probe(ticket);
            self.publish();
        }
    }

    fn on_probe_result(&mut self, ticket: LoadTicket, outcome: Result<()>) {
        if self.controller.is_current(ticket) {
            self.probe_task = None;
        }
        match outcome {
            Ok(()) => {
                if self.controller.is_current(ticket) {
                    debug!(generation = ticket.generation(), "Feed loaded");
                }
            }
            Err(e) => {
                if self.controller.report_load_failure_for(ticket, e.to_string()) {
                    self.publish();
                }
            }
        }
    }

    /// Start a probe for the current source, superseding any in flight.
    fn launch_probe(&mut self, ticket: LoadTicket) {
        self.cancel_probe();
        let Some(url) = self.controller.session().source_url.clone() else {
            return;
        };

        let probe = Arc::clone(&self.probe);
        let results = self.probe_results_tx.clone();
        self.probe_task = Some(tokio::spawn(async move {
            let outcome = probe.probe(&url).await;
            // The runner is gone if this fails; nothing left to report to
            let _ = results.send((ticket, outcome));
        }));
    }

    fn cancel_probe(&mut self) {
        if let Some(task) = self.probe_task.take() {
            task.abort();
        }
    }

    fn arm_retry(&mut self) {
        let mut retry = interval_at(Instant::now() + self.retry_interval, self.retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.retry = Some(retry);
    }

    fn reset_retry(&mut self) {
        if let Some(retry) = self.retry.as_mut() {
            retry.reset();
        }
    }

    fn publish(&self) {
        let next = FeedSnapshot::of(&self.controller);
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn teardown(&mut self) {
        self.cancel_probe();
        self.retry = None;
        self.controller.stop();
        self.publish();
    }
}

async fn next_tick(retry: &mut Option<Interval>) {
    match retry {
        Some(retry) => {
            retry.tick().await;
        }
        None => std::future::pending().await,
    }
}
