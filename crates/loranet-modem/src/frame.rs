//! Frame classification for the modem's line stream
//!
//! Every line the module emits is `+<BODY>\r\n`. Three classes are told
//! apart by their first four bytes: inbound radio data (`+RCV`), unsolicited
//! error codes (`+ERR`) and everything else, which is a command response or
//! a status report.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModemError, Result};
use crate::schema::LINE_TERMINATOR;

/// Marker byte every frame starts with
pub const FRAME_MARKER: u8 = b'+';

const RCV_PREFIX: &str = "+RCV";
const ERR_PREFIX: &str = "+ERR";

/// An inbound application message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioMessage {
    /// Sending node address
    pub sender: u16,
    /// Payload length reported by the module
    pub length: usize,
    /// Payload
    pub data: String,
    /// Received signal strength in dBm
    pub rssi: i32,
    /// Signal-to-noise ratio in dB
    pub snr: i32,
}

impl RadioMessage {
    /// Parse the body of a `+RCV=` frame
    ///
    /// Sender and length are taken from the left, rssi and snr from the
    /// right, so the payload itself may contain commas.
    pub fn parse(body: &str) -> Result<Self> {
        let malformed = || ModemError::MalformedFrame(format!("{}={}", RCV_PREFIX, body));

        let mut head = body.splitn(3, ',');
        let sender = head.next().ok_or_else(malformed)?;
        let length = head.next().ok_or_else(malformed)?;
        let rest = head.next().ok_or_else(malformed)?;

        let mut tail = rest.rsplitn(3, ',');
        let snr = tail.next().ok_or_else(malformed)?;
        let rssi = tail.next().ok_or_else(malformed)?;
        let data = tail.next().ok_or_else(malformed)?;

        Ok(Self {
            sender: sender.trim().parse().map_err(|_| malformed())?,
            length: length.trim().parse().map_err(|_| malformed())?,
            data: data.to_string(),
            rssi: rssi.trim().parse().map_err(|_| malformed())?,
            snr: snr.trim().parse().map_err(|_| malformed())?,
        })
    }
}

impl fmt::Display for RadioMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "from {} ({} bytes, rssi {}, snr {}): {}",
            self.sender, self.length, self.rssi, self.snr, self.data
        )
    }
}

/// A classified line from the modem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `+RCV=...` inbound radio data
    Message(RadioMessage),
    /// `+ERR=<code>` unsolicited error
    Error(String),
    /// Any other `+<BODY>` line
    Response(String),
}

impl Frame {
    /// Classify a raw line including its terminator
    pub fn classify(raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| ModemError::MalformedFrame(String::from_utf8_lossy(raw).into_owned()))?;

        let line = text
            .strip_suffix(LINE_TERMINATOR)
            .ok_or_else(|| ModemError::MalformedFrame(text.to_string()))?;
        if line.as_bytes().first() != Some(&FRAME_MARKER) {
            return Err(ModemError::MalformedFrame(text.to_string()));
        }

        if let Some(rest) = line.strip_prefix(RCV_PREFIX) {
            let body = rest
                .strip_prefix('=')
                .ok_or_else(|| ModemError::MalformedFrame(text.to_string()))?;
            return RadioMessage::parse(body).map(Frame::Message);
        }
        if let Some(rest) = line.strip_prefix(ERR_PREFIX) {
            let code = rest
                .strip_prefix('=')
                .ok_or_else(|| ModemError::MalformedFrame(text.to_string()))?;
            return Ok(Frame::Error(code.to_string()));
        }
        Ok(Frame::Response(line[1..].to_string()))
    }
}

/// The most recent `+ERR` frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Error code as reported by the module
    pub code: String,
    /// When the frame arrived
    pub at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_message() {
        let frame = Frame::classify(b"+RCV=7,4,ping,-40,9\r\n").unwrap();
        assert_eq!(
            frame,
            Frame::Message(RadioMessage {
                sender: 7,
                length: 4,
                data: "ping".to_string(),
                rssi: -40,
                snr: 9,
            })
        );
    }

    #[test]
    fn test_payload_with_commas() {
        let frame = Frame::classify(b"+RCV=3,5,a,b,c,-99,-2\r\n").unwrap();
        match frame {
            Frame::Message(msg) => {
                assert_eq!(msg.data, "a,b,c");
                assert_eq!(msg.rssi, -99);
                assert_eq!(msg.snr, -2);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_classify_error_and_response() {
        assert_eq!(
            Frame::classify(b"+ERR=12\r\n").unwrap(),
            Frame::Error("12".to_string())
        );
        assert_eq!(
            Frame::classify(b"+OK\r\n").unwrap(),
            Frame::Response("OK".to_string())
        );
        assert_eq!(
            Frame::classify(b"+ADDRESS=2\r\n").unwrap(),
            Frame::Response("ADDRESS=2".to_string())
        );
    }

    #[test]
    fn test_malformed_frames() {
        for raw in [
            &b"OK\r\n"[..],
            b"+OK\n",
            b"+OK",
            b"\r\n",
            b"+RCV=x,4,ping,-40,9\r\n",
            b"+RCV=7,4\r\n",
            b"+RCV\r\n",
            b"+ERR\r\n",
            b"+ERROR\r\n",
            b"+\xff\r\n",
        ] {
            assert!(
                matches!(Frame::classify(raw), Err(ModemError::MalformedFrame(_))),
                "expected malformed: {:?}",
                raw
            );
        }
    }
}
