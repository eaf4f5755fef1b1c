//! signal-cli JSON event loop wire format.
//!
//! Inbound lines are JSON objects carrying at least a `type` field. Only
//! `"message"` events with a non-receipt envelope and a text body are of
//! interest; everything else is classified as ignorable. Outbound lines are
//! `send` requests addressed either to a group or to a single number.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::conversation::AddressingMode;

/// Fixed correlation id carried by every outbound `send` request.
pub const REPLY_ID: &str = "1";

/// Terminator written after each serialized reply.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty line")]
    Empty,

    #[error("line is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("line is not a JSON event: {0}")]
    Json(#[from] serde_json::Error),
}

/// One decoded event, before classification.
#[derive(Debug, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub envelope: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub source: String,
    /// A missing flag counts as a receipt; `null` does not.
    #[serde(default = "absent_receipt_flag", deserialize_with = "null_as_false")]
    pub is_receipt: bool,
    #[serde(default)]
    pub data_message: Option<DataMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMessage {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub group_info: Option<GroupInfo>,
    #[serde(default)]
    pub attachments: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    #[serde(default)]
    pub group_id: Option<String>,
}

const fn absent_receipt_flag() -> bool {
    true
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Decode one newline-stripped line from the child's stdout.
pub fn decode_line(line: &[u8]) -> Result<RawEvent, DecodeError> {
    let text = std::str::from_utf8(line)?.trim();
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

/// Why a decoded event produced no candidate message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotAMessage,
    MalformedEnvelope,
    Receipt,
    NoDataMessage,
    NoText,
    NotACommand,
}

impl IgnoreReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotAMessage => "not-a-message",
            Self::MalformedEnvelope => "malformed-envelope",
            Self::Receipt => "receipt",
            Self::NoDataMessage => "no-data-message",
            Self::NoText => "no-text",
            Self::NotACommand => "not-a-command",
        }
    }
}

/// A chat message worth parsing for a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub source: String,
    pub text: String,
    pub group_info: Option<GroupInfo>,
    /// Attachments are not persisted; only their presence is reported.
    pub attachment_count: usize,
}

/// Filter a decoded event down to a candidate chat message.
pub fn classify(event: RawEvent) -> Result<Candidate, IgnoreReason> {
    if event.kind != "message" {
        return Err(IgnoreReason::NotAMessage);
    }
    let envelope: Envelope =
        serde_json::from_value(event.envelope).map_err(|_| IgnoreReason::MalformedEnvelope)?;
    if envelope.is_receipt {
        return Err(IgnoreReason::Receipt);
    }
    let data = envelope.data_message.ok_or(IgnoreReason::NoDataMessage)?;
    let text = data.message.ok_or(IgnoreReason::NoText)?;
    Ok(Candidate {
        source: envelope.source,
        text,
        group_info: data.group_info,
        attachment_count: data.attachments.len(),
    })
}

/// Outbound `send` request understood by the signal-cli event loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message_body: String,
    pub id: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_number: Option<String>,
}

impl Reply {
    /// Address a reply body. Group replies go to the resolved conversation id;
    /// direct replies go back to the original sender, never to the sentinel.
    ///
    /// The group target is the canonical id (`XYZ` for `room1chatXYZ`), not
    /// the raw `groupInfo.groupId` as received.
    pub fn new(body: String, conversation_id: &str, mode: AddressingMode, sender: &str) -> Self {
        let (recipient_group_id, recipient_number) = match mode {
            AddressingMode::Group => (Some(conversation_id.to_string()), None),
            AddressingMode::Direct => (None, Some(sender.to_string())),
        };
        Self {
            kind: "send",
            message_body: body,
            id: REPLY_ID,
            recipient_group_id,
            recipient_number,
        }
    }
}

/// Serialize a reply to a single line, without the terminator.
pub fn encode_reply(reply: &Reply) -> serde_json::Result<String> {
    serde_json::to_string(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(line: &str) -> Result<Candidate, IgnoreReason> {
        classify(decode_line(line.as_bytes()).unwrap())
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode_line(b"not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode_line(b"   "), Err(DecodeError::Empty)));
        assert!(matches!(decode_line(&[0xff, 0xfe]), Err(DecodeError::Utf8(_))));
        assert!(decode_line(br#"{"envelope":{}}"#).is_err());
    }

    #[test]
    fn decode_tolerates_trailing_carriage_return() {
        let event = decode_line(b"{\"type\":\"typing\"}\r").unwrap();
        assert_eq!(event.kind, "typing");
        assert!(event.envelope.is_null());
    }

    #[test]
    fn classify_direct_message() {
        let c = candidate(
            r#"{"type":"message","envelope":{"source":"+1555","isReceipt":false,"dataMessage":{"message":"!ping","groupInfo":null}}}"#,
        )
        .unwrap();
        assert_eq!(c.source, "+1555");
        assert_eq!(c.text, "!ping");
        assert!(c.group_info.is_none());
    }

    #[test]
    fn classify_group_message() {
        let c = candidate(
            r#"{"type":"message","envelope":{"source":"+1555","isReceipt":false,"dataMessage":{"message":"hi","groupInfo":{"groupId":"signalABC"}}}}"#,
        )
        .unwrap();
        assert_eq!(
            c.group_info.and_then(|g| g.group_id).as_deref(),
            Some("signalABC")
        );
    }

    #[test]
    fn classify_ignores_receipts() {
        let r = candidate(
            r#"{"type":"message","envelope":{"source":"+1555","isReceipt":true,"dataMessage":{"message":"!ping"}}}"#,
        );
        assert_eq!(r, Err(IgnoreReason::Receipt));
    }

    #[test]
    fn classify_missing_receipt_flag_is_receipt() {
        let r = candidate(
            r#"{"type":"message","envelope":{"source":"+1555","dataMessage":{"message":"!ping"}}}"#,
        );
        assert_eq!(r, Err(IgnoreReason::Receipt));
    }

    #[test]
    fn classify_null_receipt_flag_is_not_receipt() {
        let r = candidate(
            r#"{"type":"message","envelope":{"source":"+1555","isReceipt":null,"dataMessage":{"message":"!ping"}}}"#,
        );
        assert!(r.is_ok());
    }

    #[test]
    fn classify_ignores_other_event_types() {
        assert_eq!(
            candidate(r#"{"type":"typing","envelope":{"source":"+1555"}}"#),
            Err(IgnoreReason::NotAMessage)
        );
    }

    #[test]
    fn classify_requires_text() {
        assert_eq!(
            candidate(r#"{"type":"message","envelope":{"source":"+1","isReceipt":false}}"#),
            Err(IgnoreReason::NoDataMessage)
        );
        assert_eq!(
            candidate(
                r#"{"type":"message","envelope":{"source":"+1","isReceipt":false,"dataMessage":{"message":null}}}"#
            ),
            Err(IgnoreReason::NoText)
        );
    }

    #[test]
    fn classify_malformed_envelope() {
        assert_eq!(
            candidate(r#"{"type":"message","envelope":{"isReceipt":false}}"#),
            Err(IgnoreReason::MalformedEnvelope)
        );
        assert_eq!(
            candidate(r#"{"type":"message"}"#),
            Err(IgnoreReason::MalformedEnvelope)
        );
    }

    #[test]
    fn encode_direct_reply() {
        let reply = Reply::new("pong".into(), "singleUser", AddressingMode::Direct, "+1555");
        assert_eq!(
            encode_reply(&reply).unwrap(),
            r#"{"type":"send","messageBody":"pong","id":"1","recipientNumber":"+1555"}"#
        );
    }

    #[test]
    fn encode_group_reply() {
        let reply = Reply::new("hi".into(), "XYZ", AddressingMode::Group, "+1555");
        assert_eq!(
            encode_reply(&reply).unwrap(),
            r#"{"type":"send","messageBody":"hi","id":"1","recipientGroupId":"XYZ"}"#
        );
    }

    #[test]
    fn encoded_reply_is_single_line() {
        let reply = Reply::new("a\nb".into(), "singleUser", AddressingMode::Direct, "+1");
        assert!(!encode_reply(&reply).unwrap().contains('\n'));
    }
}
