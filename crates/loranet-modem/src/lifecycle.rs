//! Modem lifecycle and the read loop
//!
//! [`Modem`] owns the command channel, the inbox and the readiness signal.
//! It drives the module through `Uninitialized -> Resetting ->
//! ConfiguringParams -> Ready`, exposes send/receive to upper layers and
//! turns link faults (malformed frames, command timeouts) into recovery
//! requests for the supervisor task.
//!
//! # Tasks
//!
//! ```text
//!            +--------------+  responses   +----------------+
//!  reader -->| run_reader() |------------->| CommandChannel |<-- execute()/send_message()
//!            +--------------+              +----------------+
//!               |  +RCV   | faults                 ^
//!               v         v                        | initialize()
//!            +-------+  +-------------+            |
//!            | Inbox |  | supervise() |------------+
//!            +-------+  +-------------+
//! ```

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::channel::{BoxedWriter, CommandChannel, Seat};
use crate::config::{ModemConfig, ModemSettings, RecoveryConfig, TimingConfig};
use crate::error::{ModemError, Result};
use crate::frame::{ErrorRecord, Frame, RadioMessage};
use crate::inbox::Inbox;
use crate::interface::{Link, ResetLine};
use crate::schema::{AtCommand, CommandName, ParamValue, BROADCAST_ADDRESS};
use crate::setting::Setting;

/// Status the module reports once it has booted
pub const READY_STATUS: &str = "READY";

/// Lifecycle state of the modem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModemState {
    /// Not provisioned (initial state, and after a failed initialization)
    Uninitialized,
    /// Reset in progress
    Resetting,
    /// Writing radio parameters
    ConfiguringParams,
    /// Provisioned and able to send
    Ready,
}

impl fmt::Display for ModemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModemState::Uninitialized => write!(f, "uninitialized"),
            ModemState::Resetting => write!(f, "resetting"),
            ModemState::ConfiguringParams => write!(f, "configuring"),
            ModemState::Ready => write!(f, "ready"),
        }
    }
}

/// A condition that calls for re-initializing the module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The line stream lost framing
    MalformedFrame(String),
    /// A command went unanswered while the modem was ready
    CommandTimeout(String),
    /// An upper layer asked for a reset
    Requested,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::MalformedFrame(line) => write!(f, "malformed frame {:?}", line),
            Fault::CommandTimeout(command) => write!(f, "timeout on {}", command),
            Fault::Requested => write!(f, "reset requested"),
        }
    }
}

/// Receiving side of the fault channel
pub type FaultReceiver = mpsc::UnboundedReceiver<Fault>;

/// Identity reported by the module after a reset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    /// Firmware version
    pub version: String,
    /// Module unique id
    pub uid: String,
}

/// Driver statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModemStats {
    /// Lines read from the link
    pub frames: u64,
    /// `+RCV` frames pushed to the inbox
    pub messages: u64,
    /// Frames that resolved a pending command
    pub responses: u64,
    /// Generic frames with no command pending
    pub unsolicited: u64,
    /// `+ERR` frames
    pub error_frames: u64,
    /// Lines that failed framing
    pub malformed_frames: u64,
    /// Commands written
    pub commands: u64,
    /// Commands that timed out
    pub command_timeouts: u64,
    /// Recovery attempts
    pub recoveries: u64,
    /// Summed round trip of answered commands, in microseconds
    pub total_latency_us: u64,
}

impl ModemStats {
    /// Average round trip of answered commands, in milliseconds
    pub fn avg_command_latency_ms(&self) -> f64 {
        let answered = self.commands.saturating_sub(self.command_timeouts);
        if answered == 0 {
            return 0.0;
        }
        self.total_latency_us as f64 / answered as f64 / 1000.0
    }
}

/// Background tasks of a running modem
#[derive(Debug)]
pub struct ModemTasks {
    /// Read loop; ends when the link closes
    pub reader: JoinHandle<Result<()>>,
    /// Supervisor; ends when initialization or recovery fails
    pub supervisor: JoinHandle<Result<()>>,
}

struct ModemInner {
    config: RwLock<ModemConfig>,
    timing: TimingConfig,
    recovery: RecoveryConfig,
    channel: CommandChannel,
    inbox: Inbox,
    state: watch::Sender<ModemState>,
    status: watch::Sender<Option<String>>,
    last_error: RwLock<Option<ErrorRecord>>,
    module: RwLock<Option<ModuleInfo>>,
    stats: Mutex<ModemStats>,
    reset_line: tokio::sync::Mutex<Option<Box<dyn ResetLine>>>,
    faults: mpsc::UnboundedSender<Fault>,
}

/// Handle to the modem driver
#[derive(Clone)]
pub struct Modem {
    inner: Arc<ModemInner>,
}

impl Modem {
    /// Create a driver over the write half of a link
    ///
    /// Without a reset line, resets are performed with `AT+RESET`.
    pub fn new(
        writer: BoxedWriter,
        settings: &ModemSettings,
        reset_line: Option<Box<dyn ResetLine>>,
    ) -> (Self, FaultReceiver) {
        let (faults, fault_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ModemState::Uninitialized);
        let (status, _) = watch::channel(None);

        let inner = ModemInner {
            config: RwLock::new(settings.radio.clone()),
            timing: settings.timing.clone(),
            recovery: settings.recovery.clone(),
            channel: CommandChannel::new(writer, settings.timing.command_timeout),
            inbox: Inbox::new(),
            state,
            status,
            last_error: RwLock::new(None),
            module: RwLock::new(None),
            stats: Mutex::new(ModemStats::default()),
            reset_line: tokio::sync::Mutex::new(reset_line),
            faults,
        };

        (
            Self {
                inner: Arc::new(inner),
            },
            fault_rx,
        )
    }

    /// Create a driver and spawn its read loop and supervisor
    pub fn spawn(
        link: Link,
        settings: &ModemSettings,
        reset_line: Option<Box<dyn ResetLine>>,
    ) -> (Self, ModemTasks) {
        info!(link = %link.name, "Starting modem driver");
        let (modem, faults) = Self::new(link.writer, settings, reset_line);

        let reader = {
            let modem = modem.clone();
            let stream = link.reader;
            tokio::spawn(async move { modem.run_reader(stream).await })
        };
        let supervisor = {
            let modem = modem.clone();
            tokio::spawn(async move { modem.supervise(faults).await })
        };

        (modem, ModemTasks { reader, supervisor })
    }

    // ===== State =====

    /// Current lifecycle state
    pub fn state(&self) -> ModemState {
        *self.inner.state.borrow()
    }

    /// Subscribe to lifecycle state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ModemState> {
        self.inner.state.subscribe()
    }

    /// Wait until the modem is ready
    pub async fn wait_ready(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|state| *state == ModemState::Ready).await;
    }

    fn set_state(&self, state: ModemState) {
        let previous = self.inner.state.send_replace(state);
        if previous != state {
            info!(from = %previous, to = %state, "Modem state changed");
        }
    }

    /// Inbox of received messages
    pub fn inbox(&self) -> &Inbox {
        &self.inner.inbox
    }

    /// Remove the most recently received message
    pub fn pop_message(&self) -> Option<RadioMessage> {
        self.inner.inbox.pop()
    }

    /// Stored radio configuration
    pub fn config(&self) -> ModemConfig {
        self.inner.config.read().clone()
    }

    /// Latest unsolicited status line
    pub fn last_status(&self) -> Option<String> {
        self.inner.status.borrow().clone()
    }

    /// Most recent `+ERR` frame
    pub fn last_error(&self) -> Option<ErrorRecord> {
        self.inner.last_error.read().clone()
    }

    /// Module identity captured by the last successful reset
    pub fn module_info(&self) -> Option<ModuleInfo> {
        self.inner.module.read().clone()
    }

    /// Driver statistics
    pub fn stats(&self) -> ModemStats {
        self.inner.stats.lock().clone()
    }

    // ===== Read loop =====

    /// Read and dispatch frames until the link closes
    ///
    /// Per-read timeouts are not errors; partial lines survive them.
    pub async fn run_reader<R>(&self, reader: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::with_capacity(256);

        loop {
            match tokio::time::timeout(
                self.inner.timing.read_timeout,
                reader.read_until(b'\n', &mut line),
            )
            .await
            {
                Err(_) => {
                    trace!(buffered = line.len(), "Read timeout");
                }
                Ok(Ok(0)) => {
                    warn!("Serial link closed");
                    self.inner.channel.abort();
                    return Err(ModemError::Disconnected);
                }
                Ok(Ok(_)) => {
                    let raw = std::mem::take(&mut line);
                    self.dispatch(&raw);
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Serial read failed");
                    self.inner.channel.abort();
                    return Err(e.into());
                }
            }
        }
    }

    /// Route one raw line to the inbox, the diagnostics record or the
    /// pending command
    pub fn dispatch(&self, raw: &[u8]) {
        self.inner.stats.lock().frames += 1;

        match Frame::classify(raw) {
            Ok(Frame::Message(message)) => {
                debug!(sender = message.sender, rssi = message.rssi, snr = message.snr, data = %message.data, "Received message");
                self.inner.stats.lock().messages += 1;
                self.inner.inbox.push(message);
            }
            Ok(Frame::Error(code)) => {
                warn!(code = %code, "Module reported error");
                self.inner.stats.lock().error_frames += 1;
                *self.inner.last_error.write() = Some(ErrorRecord {
                    code,
                    at: chrono::Utc::now(),
                });
            }
            Ok(Frame::Response(body)) => match self.inner.channel.resolve(body) {
                None => self.inner.stats.lock().responses += 1,
                Some(body) => {
                    debug!(status = %body, "Unsolicited frame");
                    self.inner.stats.lock().unsolicited += 1;
                    self.inner.status.send_replace(Some(body));
                }
            },
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                self.inner.stats.lock().malformed_frames += 1;
                self.report(Fault::MalformedFrame(
                    String::from_utf8_lossy(raw).into_owned(),
                ));
            }
        }
    }

    // ===== Commands =====

    async fn transact(&self, seat: &mut Seat<'_>, command: &AtCommand) -> Result<String> {
        let started = Instant::now();
        let result = seat.transact(command).await;

        let mut stats = self.inner.stats.lock();
        stats.commands += 1;
        match &result {
            Err(ModemError::CommandTimeout { command, .. }) => {
                stats.command_timeouts += 1;
                drop(stats);
                self.report(Fault::CommandTimeout(command.clone()));
            }
            Err(ModemError::Disconnected) | Err(ModemError::WriteError(_)) => {}
            _ => stats.total_latency_us += started.elapsed().as_micros() as u64,
        }
        result
    }

    async fn run(&self, command: &AtCommand) -> Result<String> {
        let mut seat = self.inner.channel.seat().await;
        self.transact(&mut seat, command).await
    }

    /// Build, validate and run a command by (human or wire) name
    pub async fn execute(
        &self,
        name: &str,
        is_query: bool,
        params: Vec<ParamValue>,
    ) -> Result<String> {
        let command = AtCommand::build(name, is_query, params)?;
        self.run(&command).await
    }

    /// Query a command's current value
    pub async fn query(&self, name: &str) -> Result<String> {
        self.execute(name, true, Vec::new()).await
    }

    /// Send a payload to a node (0 broadcasts)
    pub async fn send_message(&self, payload: &str, target: u16) -> Result<String> {
        let state = self.state();
        if state != ModemState::Ready {
            return Err(ModemError::NotReady(state));
        }
        let command = AtCommand::assign(
            CommandName::Send,
            vec![target.into(), payload.len().into(), payload.into()],
        )?;
        debug!(target, len = payload.len(), "Sending message");
        self.run(&command).await
    }

    /// Broadcast a payload
    pub async fn broadcast(&self, payload: &str) -> Result<String> {
        self.send_message(payload, BROADCAST_ADDRESS).await
    }

    /// Write one typed setting and record it in the stored configuration
    pub async fn apply(&self, setting: Setting) -> Result<()> {
        let command = setting.to_command()?;
        info!(command = %command, "Applying setting");
        self.run(&command).await?;
        setting.store(&mut self.inner.config.write());
        Ok(())
    }

    /// Replace the radio configuration, re-running validation first
    pub async fn reconfigure(&self, config: ModemConfig) -> Result<()> {
        let settings = Setting::provisioning(&config);
        let commands = settings
            .iter()
            .map(Setting::to_command)
            .collect::<Result<Vec<_>>>()?;

        let mut seat = self.inner.channel.seat().await;
        for command in &commands {
            info!(command = %command, "Reconfiguring");
            self.transact(&mut seat, command).await?;
        }
        *self.inner.config.write() = config;
        Ok(())
    }

    /// Query every readable command, keyed by its human-facing name
    pub async fn status_report(&self) -> Result<Vec<(String, String)>> {
        let mut report = Vec::new();
        for name in CommandName::ALL.into_iter().filter(CommandName::is_reportable) {
            let command = AtCommand::query(name)?;
            let value = self.run(&command).await?;
            report.push((name.display_name().to_string(), value));
        }
        Ok(report)
    }

    // ===== Lifecycle =====

    /// Reset the module and confirm it is alive
    ///
    /// Leaves the modem `Uninitialized`, ready to be provisioned.
    pub async fn reset(&self) -> Result<ModuleInfo> {
        let mut seat = self.inner.channel.seat().await;
        self.set_state(ModemState::Resetting);
        let result = self.reset_sequence(&mut seat).await;
        self.set_state(ModemState::Uninitialized);
        if let Err(e) = &result {
            error!(error = %e, code = e.error_code(), "Modem reset failed");
        }
        result
    }

    async fn reset_sequence(&self, seat: &mut Seat<'_>) -> Result<ModuleInfo> {
        let timing = &self.inner.timing;
        let mut status = self.inner.status.subscribe();
        self.inner.status.send_replace(None);

        {
            let mut line = self.inner.reset_line.lock().await;
            match line.as_mut() {
                Some(line) => {
                    debug!(line = line.name(), "Pulsing reset line");
                    line.set_low().await?;
                    tokio::time::sleep(timing.reset_hold).await;
                    line.set_high().await?;
                    tokio::time::sleep(timing.reset_settle).await;
                }
                None => {
                    debug!("Issuing software reset");
                    let command = AtCommand::bare(CommandName::Reset)?;
                    self.transact(seat, &command)
                        .await
                        .map_err(|_| ModemError::ModuleNotResponding)?;
                }
            }
        }

        let ready = tokio::time::timeout(
            timing.ready_timeout,
            status.wait_for(|status| status.is_some()),
        )
        .await
        .ok()
        .and_then(|seen| seen.ok().and_then(|value| value.clone()))
        .ok_or(ModemError::ModuleNotResponding)?;
        if ready != READY_STATUS {
            return Err(ModemError::ModuleNotReady(ready));
        }

        let probe = self
            .transact(seat, &AtCommand::probe())
            .await
            .map_err(|e| ModemError::ModuleUnresponsive(e.to_string()))?;
        if probe != "OK" {
            return Err(ModemError::ModuleUnresponsive(probe));
        }

        let version = self
            .transact(seat, &AtCommand::query(CommandName::Ver)?)
            .await?;
        let uid = self
            .transact(seat, &AtCommand::query(CommandName::Uid)?)
            .await?;
        if version.trim().is_empty() || uid.trim().is_empty() {
            return Err(ModemError::UnknownModule);
        }

        info!(version = %version, uid = %uid, "Module reset");
        let module = ModuleInfo { version, uid };
        *self.inner.module.write() = Some(module.clone());
        Ok(module)
    }

    /// Reset and provision the module, then mark it ready
    ///
    /// The whole provisioning plan is validated before the module is
    /// touched.
    pub async fn initialize(&self) -> Result<()> {
        let config = self.config();
        let commands = Setting::provisioning(&config)
            .iter()
            .map(Setting::to_command)
            .collect::<Result<Vec<_>>>()?;

        let mut seat = self.inner.channel.seat().await;
        self.set_state(ModemState::Resetting);

        let result = async {
            self.reset_sequence(&mut seat).await?;
            self.set_state(ModemState::ConfiguringParams);
            for command in &commands {
                info!(command = %command, "Provisioning");
                self.transact(&mut seat, command).await?;
            }
            Ok::<(), ModemError>(())
        }
        .await;

        match result {
            Ok(()) => {
                self.set_state(ModemState::Ready);
                Ok(())
            }
            Err(e) => {
                self.set_state(ModemState::Uninitialized);
                error!(error = %e, code = e.error_code(), "Modem initialization failed");
                Err(e)
            }
        }
    }

    // ===== Supervision =====

    /// Ask the supervisor to re-initialize the module
    pub fn request_reset(&self) {
        info!("Modem reset requested");
        if self.inner.faults.send(Fault::Requested).is_err() {
            warn!("No supervisor to handle reset request");
        }
    }

    /// Forward a fault to the supervisor; false if it was not delivered
    fn report(&self, fault: Fault) -> bool {
        let state = self.state();
        if state != ModemState::Ready {
            debug!(fault = %fault, state = %state, "Ignoring fault outside ready state");
            return false;
        }
        warn!(fault = %fault, "Modem fault");
        if self.inner.faults.send(fault).is_err() {
            warn!("No supervisor to handle modem fault");
            return false;
        }
        true
    }

    /// Initialize, then re-initialize on every fault
    ///
    /// Returns only when initialization or a recovery fails.
    pub async fn supervise(&self, mut faults: FaultReceiver) -> Result<()> {
        self.initialize().await?;
        drain(&mut faults);

        while let Some(fault) = faults.recv().await {
            warn!(fault = %fault, "Recovering modem");
            self.recover().await?;
            drain(&mut faults);
        }
        Ok(())
    }

    async fn recover(&self) -> Result<()> {
        let attempts = self.inner.recovery.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.inner.stats.lock().recoveries += 1;
            match self.initialize().await {
                Ok(()) => {
                    info!(attempt, "Modem recovered");
                    return Ok(());
                }
                Err(e) if attempt >= attempts => {
                    error!(attempts, "Modem recovery failed");
                    return Err(ModemError::RecoveryFailed {
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Recovery attempt failed");
                    tokio::time::sleep(self.inner.recovery.backoff).await;
                }
            }
        }
    }
}

fn drain(faults: &mut FaultReceiver) {
    let mut coalesced = 0;
    while faults.try_recv().is_ok() {
        coalesced += 1;
    }
    if coalesced > 0 {
        debug!(coalesced, "Coalesced queued faults");
    }
}

impl fmt::Debug for Modem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modem")
            .field("state", &self.state())
            .field("channel", &self.inner.channel)
            .field("inbox", &self.inner.inbox.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModemSettingsBuilder;
    use std::time::Duration;

    fn modem() -> (Modem, FaultReceiver, tokio::io::DuplexStream) {
        let (near, far) = tokio::io::duplex(1024);
        let settings = ModemSettingsBuilder::new()
            .command_timeout(Duration::from_millis(100))
            .build();
        let (modem, faults) = Modem::new(Box::new(near), &settings, None);
        (modem, faults, far)
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ModemState::Ready.to_string(), "ready");
        assert_eq!(ModemState::ConfiguringParams.to_string(), "configuring");
    }

    #[test]
    fn test_dispatch_routes_frames() {
        let (modem, _faults, _far) = modem();

        modem.dispatch(b"+RCV=7,4,ping,-40,9\r\n");
        assert!(modem.inbox().has_data());
        assert_eq!(modem.pop_message().unwrap().sender, 7);

        modem.dispatch(b"+ERR=4\r\n");
        assert_eq!(modem.last_error().unwrap().code, "4");

        modem.dispatch(b"+READY\r\n");
        assert_eq!(modem.last_status().as_deref(), Some("READY"));

        let stats = modem.stats();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.messages, 1);
        assert_eq!(stats.error_frames, 1);
        assert_eq!(stats.unsolicited, 1);
    }

    #[test]
    fn test_malformed_frame_outside_ready_is_ignored() {
        let (modem, mut faults, _far) = modem();
        modem.dispatch(b"garbage\r\n");
        assert_eq!(modem.stats().malformed_frames, 1);
        assert!(faults.try_recv().is_err());
    }

    #[test]
    fn test_malformed_frame_when_ready_reports_fault() {
        let (modem, mut faults, _far) = modem();
        modem.set_state(ModemState::Ready);
        modem.dispatch(b"+OK");
        assert!(matches!(faults.try_recv(), Ok(Fault::MalformedFrame(_))));
    }

    #[test]
    fn test_fault_without_supervisor_is_not_delivered() {
        let (modem, faults, _far) = modem();
        modem.set_state(ModemState::Ready);
        drop(faults);
        assert!(!modem.report(Fault::Requested));
    }

    #[test]
    fn test_fault_delivered_when_ready() {
        let (modem, mut faults, _far) = modem();
        modem.set_state(ModemState::Ready);
        assert!(modem.report(Fault::Requested));
        assert_eq!(faults.try_recv().unwrap(), Fault::Requested);
    }

    #[tokio::test]
    async fn test_partial_line_survives_read_timeout() {
        use tokio::io::AsyncWriteExt;

        let (near, _far) = tokio::io::duplex(1024);
        let settings = ModemSettingsBuilder::new()
            .read_timeout(Duration::from_millis(30))
            .build();
        let (modem, _faults) = Modem::new(Box::new(near), &settings, None);

        let (mut radio, stream) = tokio::io::duplex(256);
        let reader = {
            let modem = modem.clone();
            tokio::spawn(async move { modem.run_reader(stream).await })
        };

        radio.write_all(b"+RCV=7,4,pi").await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!modem.inbox().has_data());
        radio.write_all(b"ng,-40,9\r\n").await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), modem.inbox().wait())
            .await
            .unwrap();
        let message = modem.pop_message().unwrap();
        assert_eq!(message.sender, 7);
        assert_eq!(message.data, "ping");
        assert_eq!((message.rssi, message.snr), (-40, 9));
        assert_eq!(modem.stats().malformed_frames, 0);
        assert!(!reader.is_finished());
        reader.abort();
    }

    #[tokio::test]
    async fn test_send_requires_ready() {
        let (modem, _faults, _far) = modem();
        let err = modem.send_message("hi", 0).await.unwrap_err();
        assert!(matches!(err, ModemError::NotReady(ModemState::Uninitialized)));
    }

    #[test]
    fn test_request_reset_queues_fault() {
        let (modem, mut faults, _far) = modem();
        modem.request_reset();
        assert_eq!(faults.try_recv().unwrap(), Fault::Requested);
    }

    #[test]
    fn test_avg_latency() {
        let stats = ModemStats {
            commands: 3,
            command_timeouts: 1,
            total_latency_us: 4000,
            ..Default::default()
        };
        assert_eq!(stats.avg_command_latency_ms(), 2.0);
        assert_eq!(ModemStats::default().avg_command_latency_ms(), 0.0);
    }
}
