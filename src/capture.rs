//! Boundary with command input and reply output.
//!
//! Speech, hotkeys and TTS live outside this crate. They plug in through
//! [`CommandSource`] and [`ReplySink`]; failures arrive as [`CaptureError`] and the
//! command loop treats every one of them except `Closed` as "no command this time".

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use anyhow::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureError {
    /// Nothing was said before the capture deadline.
    Timeout,
    /// Input was received but could not be turned into text.
    Unrecognized,
    /// The recognition backend could not be reached.
    ServiceUnavailable,
    DeviceError(String),
    /// The source is exhausted and will produce nothing further.
    Closed,
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "capture timed out"),
            Self::Unrecognized => write!(f, "input not recognized"),
            Self::ServiceUnavailable => write!(f, "recognition service unavailable"),
            Self::DeviceError(detail) => write!(f, "capture device error: {}", detail),
            Self::Closed => write!(f, "command source closed"),
        }
    }
}
impl std::error::Error for CaptureError {}

pub trait CommandSource {
    fn next_command(&mut self) -> Result<String, CaptureError>;
}

pub trait ReplySink {
    fn say(&mut self, text: &str) -> Result<()>;
}

/// Outcome of one capture attempt as seen by the command loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Capture {
    Command(String),
    Skip,
    Closed,
}

/// Pulls one command, logging capture failures instead of surfacing them.
pub fn capture(source: &mut dyn CommandSource) -> Capture {
    match source.next_command() {
        Ok(text) => Capture::Command(text),
        Err(CaptureError::Closed) => Capture::Closed,
        Err(CaptureError::Timeout) => {
            log::debug!("no command before timeout");
            Capture::Skip
        }
        Err(err) => {
            log::warn!("command capture failed: {}", err);
            Capture::Skip
        }
    }
}

/// Typed commands, one per line. Blank lines are `Unrecognized`, EOF is `Closed`.
pub struct LineSource<R> {
    reader: R,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> CommandSource for LineSource<R> {
    fn next_command(&mut self) -> Result<String, CaptureError> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Err(CaptureError::Closed),
            Ok(_) => {
                let text = line.trim();
                if text.is_empty() {
                    Err(CaptureError::Unrecognized)
                } else {
                    Ok(text.to_string())
                }
            }
            Err(e) => Err(CaptureError::DeviceError(e.to_string())),
        }
    }
}

/// Replays a fixed sequence of capture outcomes, then reports `Closed`.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSource {
    script: VecDeque<Result<String, CaptureError>>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Result<String, CaptureError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    pub fn from_commands<S: Into<String>>(commands: impl IntoIterator<Item = S>) -> Self {
        Self::new(commands.into_iter().map(|c| Ok(c.into())))
    }
}

impl CommandSource for ScriptedSource {
    fn next_command(&mut self) -> Result<String, CaptureError> {
        self.script.pop_front().unwrap_or(Err(CaptureError::Closed))
    }
}

/// Writes each reply as its own line.
pub struct ConsoleSink<W> {
    out: W,
    prefix: String,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReplySink for ConsoleSink<W> {
    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{}{}", self.prefix, text)?;
        self.out.flush()?;
        Ok(())
    }
}

impl ReplySink for Vec<String> {
    fn say(&mut self, text: &str) -> Result<()> {
        self.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_source_trims_and_closes() {
        let input = "  how many people?\n\nwhere is the dog\n";
        let mut source = LineSource::new(input.as_bytes());
        assert_eq!(source.next_command(), Ok("how many people?".to_string()));
        assert_eq!(source.next_command(), Err(CaptureError::Unrecognized));
        assert_eq!(source.next_command(), Ok("where is the dog".to_string()));
        assert_eq!(source.next_command(), Err(CaptureError::Closed));
    }

    #[test]
    fn capture_errors_become_skips() {
        let mut source = ScriptedSource::new([
            Err(CaptureError::Timeout),
            Err(CaptureError::ServiceUnavailable),
            Err(CaptureError::DeviceError("mic unplugged".into())),
            Ok("describe".to_string()),
        ]);
        assert_eq!(capture(&mut source), Capture::Skip);
        assert_eq!(capture(&mut source), Capture::Skip);
        assert_eq!(capture(&mut source), Capture::Skip);
        assert_eq!(capture(&mut source), Capture::Command("describe".into()));
        assert_eq!(capture(&mut source), Capture::Closed);
    }

    #[test]
    fn console_sink_prefixes_lines() {
        let mut sink = ConsoleSink::new(Vec::new()).with_prefix("[answer] ");
        sink.say("1 person.").unwrap();
        sink.say("No, dog.").unwrap();
        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(written, "[answer] 1 person.\n[answer] No, dog.\n");
    }
}
