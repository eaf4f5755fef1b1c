//! The adapter loop: one inbound line in, at most one reply out.
//!
//! Every line runs decode → classify → parse → resolve → dispatch → encode and
//! ends in an [`Outcome`]. Nothing a single line does can stop the loop; only
//! end-of-stream (or a failing read on the inbound stream) ends a session.

use std::any::Any;
use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::field::Empty;

use crate::command::parse_command;
use crate::conversation;
use crate::error::MessageError;
use crate::processor::{self, NO_ATTACHMENT, Processor, ProcessorError, Request};
use crate::telemetry;
use crate::wire::{self, DecodeError, IgnoreReason, LINE_TERMINATOR, Reply};

/// What became of one inbound line.
#[derive(Debug)]
pub enum Outcome {
    /// A reply was produced (and, inside [`Session::run`], written).
    Replied(Reply),
    /// The processor had nothing to say.
    NoReply,
    /// Not actionable: receipts, other event types, plain chat.
    Ignored(IgnoreReason),
    /// Something went wrong with this line only.
    Dropped(MessageError),
}

impl Outcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Replied(_) => "replied",
            Self::NoReply => "no-reply",
            Self::Ignored(_) => "ignored",
            Self::Dropped(_) => "dropped",
        }
    }
}

/// Counters for a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub lines: u64,
    pub replies: u64,
    pub no_reply: u64,
    pub ignored: u64,
    pub dropped: u64,
}

impl SessionSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Replied(_) => self.replies += 1,
            Outcome::NoReply => self.no_reply += 1,
            Outcome::Ignored(_) => self.ignored += 1,
            Outcome::Dropped(_) => self.dropped += 1,
        }
    }
}

/// Drives lines from a reader through a processor and writes replies.
pub struct Session<'a> {
    processor: &'a dyn Processor,
    attachment: &'a str,
}

impl<'a> Session<'a> {
    pub fn new(processor: &'a dyn Processor) -> Self {
        Self {
            processor,
            attachment: NO_ATTACHMENT,
        }
    }

    /// Override the attachment placeholder handed to the processor.
    #[must_use]
    pub const fn with_attachment(mut self, attachment: &'a str) -> Self {
        self.attachment = attachment;
        self
    }

    /// Run one line through the pipeline, without writing anything.
    ///
    /// Fields of the current span named `sender`, `verb` and `conversation`
    /// are filled in as they become known.
    pub fn handle_line(&self, line: &[u8]) -> Outcome {
        let event = match wire::decode_line(line) {
            Ok(event) => event,
            Err(e) => return Outcome::Dropped(e.into()),
        };
        let candidate = match wire::classify(event) {
            Ok(candidate) => candidate,
            Err(reason) => return Outcome::Ignored(reason),
        };
        let span = tracing::Span::current();
        span.record("sender", candidate.source.as_str());

        let Some(command) = parse_command(&candidate.text) else {
            return Outcome::Ignored(IgnoreReason::NotACommand);
        };
        span.record("verb", command.verb.as_str());

        let conversation = match conversation::resolve(candidate.group_info.as_ref()) {
            Ok(conversation) => conversation,
            Err(e) => return Outcome::Dropped(e.into()),
        };
        span.record("conversation", conversation.id.as_str());

        if candidate.attachment_count > 0 {
            tracing::debug!(
                attachments = candidate.attachment_count,
                "attachments not forwarded"
            );
        }

        let request = Request {
            sender: &candidate.source,
            conversation_id: &conversation.id,
            verb: &command.verb,
            argument: &command.argument,
            attachment: self.attachment,
        };
        let dispatched = panic::catch_unwind(AssertUnwindSafe(|| {
            processor::dispatch(self.processor, &request)
        }))
        .unwrap_or_else(|payload| {
            Err(ProcessorError::Other(format!(
                "processor panicked: {}",
                panic_message(payload.as_ref())
            )))
        });
        match dispatched {
            Ok(Some(body)) => Outcome::Replied(Reply::new(
                body,
                &conversation.id,
                conversation.mode,
                &candidate.source,
            )),
            Ok(None) => Outcome::NoReply,
            Err(source) => Outcome::Dropped(MessageError::Dispatch {
                verb: command.verb,
                source,
            }),
        }
    }

    /// Process lines until `reader` hits end-of-stream.
    ///
    /// Only a failed read is returned as an error; per-line failures,
    /// including failed writes, are logged and counted.
    pub fn run<R: BufRead, W: Write>(&self, mut reader: R, mut writer: W) -> io::Result<SessionSummary> {
        let mut summary = SessionSummary::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            summary.lines += 1;

            let span = tracing::info_span!(
                "line",
                n = summary.lines,
                sender = Empty,
                verb = Empty,
                conversation = Empty
            );
            let _entered = span.enter();

            let outcome = match self.handle_line(strip_line_ending(&buf)) {
                Outcome::Replied(reply) => match write_reply(&mut writer, &reply) {
                    Ok(()) => Outcome::Replied(reply),
                    Err(e) => Outcome::Dropped(MessageError::Write(e)),
                },
                other => other,
            };

            log_outcome(&outcome);
            telemetry::record_outcome(&outcome);
            summary.record(&outcome);
        }

        Ok(summary)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload")
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Write one reply as a single JSON line terminated by CRLF, then flush.
pub fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> io::Result<()> {
    let line = wire::encode_reply(reply).map_err(io::Error::from)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(LINE_TERMINATOR)?;
    writer.flush()
}

fn log_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Replied(reply) => tracing::info!(
            group = reply.recipient_group_id.as_deref(),
            number = reply.recipient_number.as_deref(),
            bytes = reply.message_body.len(),
            "replied"
        ),
        Outcome::NoReply => tracing::debug!("processor had no reply"),
        Outcome::Ignored(reason) => tracing::debug!(reason = reason.as_str(), "ignored"),
        Outcome::Dropped(MessageError::Decode(DecodeError::Empty)) => {
            tracing::trace!("blank line");
        }
        Outcome::Dropped(e @ (MessageError::Decode(_) | MessageError::Resolve(_))) => {
            tracing::warn!(kind = e.kind(), error = %e, "message dropped");
        }
        Outcome::Dropped(e) => {
            tracing::error!(kind = e.kind(), error = %e, "message dropped");
        }
    }
}
