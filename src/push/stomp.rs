//! # STOMP Framing
//!
//! The subset of STOMP 1.2 the push channel speaks over its WebSocket: the
//! client sends `CONNECT`, `SUBSCRIBE` and `DISCONNECT`, and the broker answers
//! with `CONNECTED`, `MESSAGE`, `RECEIPT` or `ERROR`. A frame consisting only
//! of end-of-line characters is a heart-beat.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::push::{AUTHORIZATION_HEADER, STOMP_ACCEPT_VERSION};
use crate::error::{RealtimeError, RealtimeResult};

/// Body of a heart-beat frame
pub const HEARTBEAT_EOL: &str = "\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StompCommand {
    Connect,
    Connected,
    Subscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl StompCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            StompCommand::Connect => "CONNECT",
            StompCommand::Connected => "CONNECTED",
            StompCommand::Subscribe => "SUBSCRIBE",
            StompCommand::Disconnect => "DISCONNECT",
            StompCommand::Message => "MESSAGE",
            StompCommand::Receipt => "RECEIPT",
            StompCommand::Error => "ERROR",
        }
    }

    // CONNECT and CONNECTED predate header escaping and carry values verbatim
    fn escapes_headers(&self) -> bool {
        !matches!(self, StompCommand::Connect | StompCommand::Connected)
    }
}

impl fmt::Display for StompCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StompCommand {
    type Err = RealtimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(StompCommand::Connect),
            "CONNECTED" => Ok(StompCommand::Connected),
            "SUBSCRIBE" => Ok(StompCommand::Subscribe),
            "DISCONNECT" => Ok(StompCommand::Disconnect),
            "MESSAGE" => Ok(StompCommand::Message),
            "RECEIPT" => Ok(StompCommand::Receipt),
            "ERROR" => Ok(StompCommand::Error),
            other => Err(RealtimeError::Protocol(format!(
                "Unsupported STOMP command: {other}"
            ))),
        }
    }
}

/// Heart-beat header value `"<outgoing>,<incoming>"` in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    pub outgoing_ms: u64,
    pub incoming_ms: u64,
}

/// Heart-beat periods in effect after the handshake; `None` means disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NegotiatedHeartBeat {
    pub outgoing: Option<Duration>,
    pub incoming: Option<Duration>,
}

impl HeartBeat {
    pub fn new(outgoing_ms: u64, incoming_ms: u64) -> Self {
        Self {
            outgoing_ms,
            incoming_ms,
        }
    }

    pub fn parse(value: &str) -> RealtimeResult<Self> {
        let (outgoing, incoming) = value.split_once(',').ok_or_else(|| {
            RealtimeError::Protocol(format!("Malformed heart-beat header: {value}"))
        })?;
        let parse_ms = |part: &str| {
            part.trim().parse::<u64>().map_err(|_| {
                RealtimeError::Protocol(format!("Malformed heart-beat header: {value}"))
            })
        };
        Ok(Self::new(parse_ms(outgoing)?, parse_ms(incoming)?))
    }

    pub fn header_value(&self) -> String {
        format!("{},{}", self.outgoing_ms, self.incoming_ms)
    }

    /// Combine the client's request with the broker's `CONNECTED` answer
    ///
    /// Each direction uses the larger of the two periods, and is disabled when
    /// either side sent zero for it.
    pub fn negotiate(&self, server: &HeartBeat) -> NegotiatedHeartBeat {
        let period = |ours: u64, theirs: u64| {
            (ours != 0 && theirs != 0).then(|| Duration::from_millis(ours.max(theirs)))
        };
        NegotiatedHeartBeat {
            outgoing: period(self.outgoing_ms, server.incoming_ms),
            incoming: period(self.incoming_ms, server.outgoing_ms),
        }
    }
}

/// One STOMP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    pub command: StompCommand,
    /// Header order is preserved; the first occurrence of a name wins
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StompFrame {
    pub fn new(command: StompCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn connect(host: &str, heart_beat: HeartBeat, bearer_token: Option<&str>) -> Self {
        let frame = Self::new(StompCommand::Connect)
            .with_header("accept-version", STOMP_ACCEPT_VERSION)
            .with_header("host", host)
            .with_header("heart-beat", heart_beat.header_value());
        match bearer_token {
            Some(token) => frame.with_header(AUTHORIZATION_HEADER, format!("Bearer {token}")),
            None => frame,
        }
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(StompCommand::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    pub fn disconnect() -> Self {
        Self::new(StompCommand::Disconnect)
    }

    pub fn encode(&self) -> String {
        let escapes = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escapes {
                out.push_str(&escape(name));
                out.push(':');
                out.push_str(&escape(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one inbound text message
    ///
    /// Returns `Ok(None)` for a heart-beat.
    pub fn parse(text: &str) -> RealtimeResult<Option<Self>> {
        let mut remaining = text.trim_start_matches(['\r', '\n']);
        if remaining.is_empty() || remaining == "\0" {
            return Ok(None);
        }

        let command_line = next_line(&mut remaining)
            .ok_or_else(|| RealtimeError::Protocol("Frame has no command line".to_string()))?;
        let command: StompCommand = command_line.parse()?;
        let escapes = command.escapes_headers();

        let mut frame = Self::new(command);
        loop {
            let line = next_line(&mut remaining).ok_or_else(|| {
                RealtimeError::Protocol(format!("{command} frame ended inside its headers"))
            })?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                RealtimeError::Protocol(format!("Malformed header line: {line}"))
            })?;
            let (name, value) = if escapes {
                (unescape(name)?, unescape(value)?)
            } else {
                (name.to_string(), value.to_string())
            };
            if frame.header(&name).is_none() {
                frame.headers.push((name, value));
            }
        }

        frame.body = match frame.header("content-length") {
            Some(length) => {
                let length: usize = length.parse().map_err(|_| {
                    RealtimeError::Protocol(format!("Invalid content-length: {length}"))
                })?;
                remaining
                    .get(..length)
                    .ok_or_else(|| {
                        RealtimeError::Protocol("Body shorter than content-length".to_string())
                    })?
                    .to_string()
            }
            None => remaining.split('\0').next().unwrap_or_default().to_string(),
        };

        Ok(Some(frame))
    }
}

fn next_line<'a>(remaining: &mut &'a str) -> Option<&'a str> {
    let idx = remaining.find('\n')?;
    let line = &remaining[..idx];
    *remaining = &remaining[idx + 1..];
    Some(line.strip_suffix('\r').unwrap_or(line))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(value: &str) -> RealtimeResult<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            other => {
                return Err(RealtimeError::Protocol(format!(
                    "Undefined header escape: \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_frame_carries_bearer_and_heart_beat() {
        let encoded = StompFrame::connect("localhost", HeartBeat::new(4000, 4000), Some("abc.def"))
            .encode();

        assert!(encoded.starts_with("CONNECT\n"));
        assert!(encoded.contains("accept-version:1.2,1.1,1.0\n"));
        assert!(encoded.contains("host:localhost\n"));
        assert!(encoded.contains("heart-beat:4000,4000\n"));
        assert!(encoded.contains("Authorization:Bearer abc.def\n"));
        assert!(encoded.ends_with("\n\n\0"));
    }

    #[test]
    fn test_parse_message_frame() {
        let text = "MESSAGE\r\nsubscription:sub-1\r\ndestination:/user/queue/notifications\r\nmessage-id:7\r\n\r\n{\"id\":7}\0\n";
        let frame = StompFrame::parse(text).unwrap().unwrap();

        assert_eq!(frame.command, StompCommand::Message);
        assert_eq!(frame.header("subscription"), Some("sub-1"));
        assert_eq!(frame.header("destination"), Some("/user/queue/notifications"));
        assert_eq!(frame.body, "{\"id\":7}");
    }

    #[test]
    fn test_heart_beat_frames_parse_to_none() {
        assert_eq!(StompFrame::parse("\n").unwrap(), None);
        assert_eq!(StompFrame::parse("\r\n").unwrap(), None);
    }

    #[test]
    fn test_header_escaping_applies_except_on_connect() {
        let frame = StompFrame::new(StompCommand::Subscribe).with_header("destination", "a:b\nc");
        let encoded = frame.encode();
        assert!(encoded.contains("destination:a\\cb\\nc\n"));
        assert_eq!(StompFrame::parse(&encoded).unwrap().unwrap(), frame);

        let connected = StompFrame::parse("CONNECTED\nserver:broker\\c1\n\n\0")
            .unwrap()
            .unwrap();
        assert_eq!(connected.header("server"), Some("broker\\c1"));
    }

    #[test]
    fn test_repeated_header_first_wins() {
        let frame = StompFrame::parse("MESSAGE\nfoo:first\nfoo:second\n\n\0")
            .unwrap()
            .unwrap();
        assert_eq!(frame.header("foo"), Some("first"));
    }

    #[test]
    fn test_content_length_bounds_body() {
        let frame = StompFrame::parse("MESSAGE\ncontent-length:3\n\na\0b\0")
            .unwrap()
            .unwrap();
        assert_eq!(frame.body, "a\0b");
    }

    #[test]
    fn test_malformed_frames_are_protocol_errors() {
        assert!(matches!(
            StompFrame::parse("BOGUS\n\n\0"),
            Err(RealtimeError::Protocol(_))
        ));
        assert!(matches!(
            StompFrame::parse("MESSAGE\nno-colon\n\n\0"),
            Err(RealtimeError::Protocol(_))
        ));
        assert!(matches!(
            StompFrame::parse("MESSAGE\nbad:\\x\n\n\0"),
            Err(RealtimeError::Protocol(_))
        ));
    }

    #[test]
    fn test_heart_beat_negotiation() {
        let client = HeartBeat::new(4000, 4000);

        let negotiated = client.negotiate(&HeartBeat::new(10_000, 1_000));
        assert_eq!(negotiated.outgoing, Some(Duration::from_millis(4000)));
        assert_eq!(negotiated.incoming, Some(Duration::from_millis(10_000)));

        let disabled = client.negotiate(&HeartBeat::new(0, 0));
        assert_eq!(disabled, NegotiatedHeartBeat::default());

        let silent_client = HeartBeat::new(0, 4000).negotiate(&HeartBeat::new(4000, 4000));
        assert_eq!(silent_client.outgoing, None);
        assert_eq!(silent_client.incoming, Some(Duration::from_millis(4000)));
    }

    #[test]
    fn test_heart_beat_header_parse() {
        assert_eq!(HeartBeat::parse("0, 5000").unwrap(), HeartBeat::new(0, 5000));
        assert!(HeartBeat::parse("5000").is_err());
    }
}
