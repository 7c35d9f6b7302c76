//! Scripted stand-in for a LoRa modem
//!
//! [`MockModem`] sits on the far end of an in-memory duplex pipe and
//! answers AT lines the way the real module does: `AT` with `+OK`, queries
//! with `+NAME=<value>`, assignments with `+OK`, and `AT+RESET` with
//! `+RESET` followed by `+READY`. Tests can override or silence individual
//! lines, inject unsolicited frames, and pair the mock with a
//! [`MockResetLine`] whose rising edge makes it announce `+READY`.
//!
//! # Example
//!
//! ```rust,ignore
//! let (mock, link) = MockModem::new();
//! let (modem, tasks) = Modem::spawn(link, &ModemSettings::default(), None);
//! modem.wait_ready().await;
//! mock.inject_message(7, "ping", -40, 9);
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;
use crate::interface::{Link, ResetLine};
use crate::lifecycle::READY_STATUS;
use crate::schema::LINE_TERMINATOR;

/// Firmware version the mock reports
pub const MOCK_VERSION: &str = "RYLR998_REYAX_V1.2.3";

/// Unique id the mock reports
pub const MOCK_UID: &str = "000000000000000012345678";

const PIPE_CAPACITY: usize = 4096;

fn frame(body: &str) -> String {
    format!("+{}{}", body, LINE_TERMINATOR)
}

struct MockState {
    received: Mutex<Vec<String>>,
    values: Mutex<HashMap<String, String>>,
    overrides: Mutex<HashMap<String, Vec<String>>>,
    ready_status: Mutex<Option<String>>,
    edges: Mutex<Vec<bool>>,
    inject: mpsc::UnboundedSender<String>,
}

impl MockState {
    fn answer(&self, line: &str) -> Vec<String> {
        self.received.lock().push(line.to_string());

        if let Some(bodies) = self.overrides.lock().get(line) {
            return bodies.iter().map(|b| frame(b)).collect();
        }

        match line {
            "AT" => vec![frame("OK")],
            "AT+RESET" => {
                let mut out = vec![frame("RESET")];
                if let Some(status) = self.ready_status.lock().as_deref() {
                    out.push(frame(status));
                }
                out
            }
            _ => {
                let Some(rest) = line.strip_prefix("AT+") else {
                    return vec![frame("ERR=4")];
                };
                if let Some(name) = rest.strip_suffix('?') {
                    return match self.values.lock().get(name) {
                        Some(value) => vec![frame(&format!("{}={}", name, value))],
                        None => vec![frame("ERR=4")],
                    };
                }
                match rest.split_once('=') {
                    Some(("SEND", _)) => vec![frame("OK")],
                    Some((name, value)) => {
                        self.values
                            .lock()
                            .insert(name.to_string(), value.to_string());
                        vec![frame("OK")]
                    }
                    None => vec![frame("ERR=4")],
                }
            }
        }
    }
}

/// A scripted modem on the far end of a duplex pipe
pub struct MockModem {
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockModem {
    /// Create a mock and the driver-side link to it
    pub fn new() -> (Self, Link) {
        let (near, far) = tokio::io::duplex(PIPE_CAPACITY);
        let (inject, inject_rx) = mpsc::unbounded_channel();

        let values = [
            ("VER", MOCK_VERSION),
            ("UID", MOCK_UID),
            ("MODE", "0"),
            ("IPR", "115200"),
            ("BAND", "915000000"),
            ("PARAMETER", "9,7,1,12"),
            ("ADDRESS", "0"),
            ("NETWORKID", "18"),
            ("CPIN", "No Password!"),
            ("CRFOP", "22"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let state = Arc::new(MockState {
            received: Mutex::new(Vec::new()),
            values: Mutex::new(values),
            overrides: Mutex::new(HashMap::new()),
            ready_status: Mutex::new(Some(READY_STATUS.to_string())),
            edges: Mutex::new(Vec::new()),
            inject,
        });

        let task = tokio::spawn(serve(far, state.clone(), inject_rx));
        (Self { state, task }, Link::new(near, "mock"))
    }

    /// Every line the mock received, without terminators
    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().clone()
    }

    /// Forget the lines received so far
    pub fn clear_received(&self) {
        self.state.received.lock().clear();
    }

    /// Current value of a setting (uppercase wire name)
    pub fn value(&self, name: &str) -> Option<String> {
        self.state.values.lock().get(name).cloned()
    }

    /// Set the value returned for a query (uppercase wire name)
    pub fn set_value(&self, name: &str, value: &str) {
        self.state
            .values
            .lock()
            .insert(name.to_string(), value.to_string());
    }

    /// Answer `line` with the given frame bodies instead of the default
    pub fn respond(&self, line: &str, bodies: &[&str]) {
        self.state.overrides.lock().insert(
            line.to_string(),
            bodies.iter().map(|b| b.to_string()).collect(),
        );
    }

    /// Never answer `line`
    pub fn silence(&self, line: &str) {
        self.respond(line, &[]);
    }

    /// Remove an override
    pub fn restore(&self, line: &str) {
        self.state.overrides.lock().remove(line);
    }

    /// Status announced after a reset (`None` stays quiet)
    pub fn set_ready_status(&self, status: Option<&str>) {
        *self.state.ready_status.lock() = status.map(str::to_string);
    }

    /// Write a raw line to the driver
    pub fn inject_raw(&self, raw: &str) {
        let _ = self.state.inject.send(raw.to_string());
    }

    /// Write a `+<body>\r\n` frame to the driver
    pub fn inject(&self, body: &str) {
        self.inject_raw(&frame(body));
    }

    /// Deliver a radio message as a `+RCV` frame
    pub fn inject_message(&self, sender: u16, data: &str, rssi: i32, snr: i32) {
        self.inject(&format!(
            "RCV={},{},{},{},{}",
            sender,
            data.len(),
            data,
            rssi,
            snr
        ));
    }

    /// Reset line wired to this mock
    pub fn reset_line(&self) -> MockResetLine {
        MockResetLine {
            state: self.state.clone(),
        }
    }

    /// Levels driven on the reset line so far (`false` = low)
    pub fn reset_edges(&self) -> Vec<bool> {
        self.state.edges.lock().clone()
    }

    /// Close the pipe as if the cable was pulled
    pub fn disconnect(self) {
        self.task.abort();
    }
}

impl Drop for MockModem {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    stream: DuplexStream,
    state: Arc<MockState>,
    mut inject: mpsc::UnboundedReceiver<String>,
) {
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();

    loop {
        let out = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    debug!(line = %line, "Mock received");
                    state.answer(&line)
                }
                _ => break,
            },
            raw = inject.recv() => match raw {
                Some(raw) => vec![raw],
                None => break,
            },
        };

        for raw in out {
            if write.write_all(raw.as_bytes()).await.is_err() {
                return;
            }
        }
    }
}

/// Reset line that makes a [`MockModem`] announce its ready status
pub struct MockResetLine {
    state: Arc<MockState>,
}

#[async_trait]
impl ResetLine for MockResetLine {
    async fn set_low(&mut self) -> Result<()> {
        self.state.edges.lock().push(false);
        Ok(())
    }

    async fn set_high(&mut self) -> Result<()> {
        self.state.edges.lock().push(true);
        let status = self.state.ready_status.lock().clone();
        if let Some(status) = status {
            let _ = self.state.inject.send(frame(&status));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock-reset"
    }
}
