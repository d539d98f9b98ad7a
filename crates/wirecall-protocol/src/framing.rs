//! Frame encoding and decoding.
//!
//! Frames travel as text: an optional decimal correlation id glued to a
//! two-element JSON array `[label, payload]`. Decoding is fail-fast and
//! yields no partial results.

use serde_json::Value;

use crate::MAX_LABEL_LEN;
use crate::error::{ProtocolError, ProtocolResult};

/// One protocol-level message.
///
/// `correlation_id == 0` means no reply is expected: the frame is an event
/// and `label` is the event name. A nonzero id marks a call (label = event
/// name) or a reply (label = `None` on success, the error message on
/// failure).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Correlation id; zero when no reply is expected.
    pub correlation_id: u64,
    /// Event name, error message, or `None` for a success reply.
    pub label: Option<String>,
    /// Structured payload; JSON null normalizes to `None`.
    pub payload: Option<Value>,
}

impl Frame {
    /// Creates an uncorrelated event frame.
    pub fn event(label: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            correlation_id: 0,
            label: Some(label.into()),
            payload,
        }
    }

    /// Creates a correlated call frame.
    pub fn call(correlation_id: u64, label: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            correlation_id,
            label: Some(label.into()),
            payload,
        }
    }

    /// Creates a success reply to the given call.
    pub fn reply(correlation_id: u64, payload: Option<Value>) -> Self {
        Self {
            correlation_id,
            label: None,
            payload,
        }
    }

    /// Creates a failure reply carrying an error message and no payload.
    pub fn failure(correlation_id: u64, message: impl Into<String>) -> Self {
        Self {
            correlation_id,
            label: Some(message.into()),
            payload: None,
        }
    }

    /// Returns true if this frame expects or answers a reply.
    pub fn is_correlated(&self) -> bool {
        self.correlation_id > 0
    }
}

/// Returns true if `label` is a usable event name (1-64 characters).
pub fn is_valid_label(label: &str) -> bool {
    let len = label.chars().count();
    len >= 1 && len <= MAX_LABEL_LEN
}

/// Encodes a frame to its wire representation.
///
/// The correlation id prefix is emitted only when nonzero. Labels are not
/// validated here; validation is a decode-side concern.
pub fn encode_frame(frame: &Frame) -> ProtocolResult<Vec<u8>> {
    let body = serde_json::to_vec(&(&frame.label, &frame.payload))?;

    let mut buffer = Vec::with_capacity(20 + body.len());
    if frame.correlation_id > 0 {
        buffer.extend_from_slice(frame.correlation_id.to_string().as_bytes());
    }
    buffer.extend_from_slice(&body);
    Ok(buffer)
}

/// Decodes a frame from its wire representation.
///
/// `watermark` carries the highest correlation id already seen on this
/// connection and enables the anti-replay check; the accepting side passes
/// `Some`, the initiating side passes `None` (it trusts its own server).
///
/// Returns `Ok(None)` for an empty input: the keep-alive heartbeat is an
/// empty frame and must be ignored.
pub fn decode_frame(bytes: &[u8], watermark: Option<u64>) -> ProtocolResult<Option<Frame>> {
    if bytes.is_empty() {
        return Ok(None);
    }

    let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::MalformedFrame)?;
    let Some(body_start) = text.find('[') else {
        return Err(ProtocolError::MalformedFrame);
    };

    let (raw_label, payload): (Value, Option<Value>) =
        serde_json::from_str(&text[body_start..]).map_err(|_| ProtocolError::MalformedFrame)?;

    let correlation_id = if body_start > 0 {
        let id = text[..body_start]
            .parse::<u64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(ProtocolError::InvalidCorrelationId)?;

        if let Some(watermark) = watermark
            && id <= watermark
        {
            return Err(ProtocolError::ReplayedCorrelationId { id, watermark });
        }

        id
    } else {
        0
    };

    let label = match raw_label {
        Value::String(label) => {
            if correlation_id == 0 && !is_valid_label(&label) {
                return Err(ProtocolError::InvalidLabel);
            }
            Some(label)
        }
        // Success replies carry a null label; events never may.
        Value::Null if correlation_id > 0 => None,
        _ if correlation_id == 0 => return Err(ProtocolError::InvalidLabel),
        _ => return Err(ProtocolError::MalformedFrame),
    };

    Ok(Some(Frame {
        correlation_id,
        label,
        payload,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_wire_shape() {
        let frame = Frame::event("ping", Some(json!({"n": 1})));
        let bytes = encode_frame(&frame).unwrap();
        assert_eq!(bytes, br#"["ping",{"n":1}]"#);
    }

    #[test]
    fn call_wire_shape() {
        let frame = Frame::call(7, "ping", Some(json!({"n": 1})));
        let bytes = encode_frame(&frame).unwrap();
        assert_eq!(bytes, br#"7["ping",{"n":1}]"#);
    }

    #[test]
    fn reply_wire_shape() {
        let frame = Frame::reply(7, None);
        let bytes = encode_frame(&frame).unwrap();
        assert_eq!(bytes, br#"7[null,null]"#);
    }

    #[test]
    fn failure_wire_shape() {
        let frame = Frame::failure(7, "not found");
        let bytes = encode_frame(&frame).unwrap();
        assert_eq!(bytes, br#"7["not found",null]"#);
    }

    #[test]
    fn round_trip_event() {
        let frame = Frame::event("status", Some(json!(["a", "b"])));
        let decoded = decode_frame(&encode_frame(&frame).unwrap(), None)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn round_trip_call_and_replies() {
        for frame in [
            Frame::call(1, "ping", None),
            Frame::call(42, "update", Some(json!({"k": "v"}))),
            Frame::reply(42, Some(json!(3.5))),
            Frame::failure(42, "denied"),
        ] {
            let decoded = decode_frame(&encode_frame(&frame).unwrap(), None)
                .unwrap()
                .unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn empty_frame_is_a_noop() {
        assert!(decode_frame(b"", None).unwrap().is_none());
        assert!(decode_frame(b"", Some(9)).unwrap().is_none());
    }

    #[test]
    fn missing_array_is_malformed() {
        assert!(matches!(
            decode_frame(b"hello", None),
            Err(ProtocolError::MalformedFrame)
        ));
        assert!(matches!(
            decode_frame(b"123", None),
            Err(ProtocolError::MalformedFrame)
        ));
    }

    #[test]
    fn non_utf8_is_malformed() {
        assert!(matches!(
            decode_frame(&[0xff, 0xfe, b'['], None),
            Err(ProtocolError::MalformedFrame)
        ));
    }

    #[test]
    fn wrong_arity_is_malformed() {
        assert!(matches!(
            decode_frame(br#"["ping"]"#, None),
            Err(ProtocolError::MalformedFrame)
        ));
        assert!(matches!(
            decode_frame(br#"["ping",1,2]"#, None),
            Err(ProtocolError::MalformedFrame)
        ));
        assert!(matches!(
            decode_frame(br#"1[broken"#, None),
            Err(ProtocolError::MalformedFrame)
        ));
    }

    #[test]
    fn correlation_prefix_must_be_a_positive_integer() {
        assert!(matches!(
            decode_frame(br#"0["ping",null]"#, None),
            Err(ProtocolError::InvalidCorrelationId)
        ));
        assert!(matches!(
            decode_frame(br#"-3["ping",null]"#, None),
            Err(ProtocolError::InvalidCorrelationId)
        ));
        assert!(matches!(
            decode_frame(br#"1.5["ping",null]"#, None),
            Err(ProtocolError::InvalidCorrelationId)
        ));
        assert!(matches!(
            decode_frame(br#"abc["ping",null]"#, None),
            Err(ProtocolError::InvalidCorrelationId)
        ));
    }

    #[test]
    fn replay_is_rejected_with_watermark() {
        let bytes = encode_frame(&Frame::call(5, "ping", None)).unwrap();

        assert!(decode_frame(&bytes, Some(4)).unwrap().is_some());
        assert!(matches!(
            decode_frame(&bytes, Some(5)),
            Err(ProtocolError::ReplayedCorrelationId { id: 5, watermark: 5 })
        ));
        assert!(matches!(
            decode_frame(&bytes, Some(9)),
            Err(ProtocolError::ReplayedCorrelationId { id: 5, watermark: 9 })
        ));
    }

    #[test]
    fn replay_is_ignored_without_watermark() {
        let bytes = encode_frame(&Frame::call(5, "ping", None)).unwrap();
        let frame = decode_frame(&bytes, None).unwrap().unwrap();
        assert_eq!(frame.correlation_id, 5);
    }

    #[test]
    fn event_label_length_bounds() {
        let just_right = "e".repeat(64);
        let bytes = encode_frame(&Frame::event(&just_right, None)).unwrap();
        assert!(decode_frame(&bytes, None).unwrap().is_some());

        let too_long = "e".repeat(65);
        let bytes = encode_frame(&Frame::event(&too_long, None)).unwrap();
        assert!(matches!(
            decode_frame(&bytes, None),
            Err(ProtocolError::InvalidLabel)
        ));

        assert!(matches!(
            decode_frame(br#"["",null]"#, None),
            Err(ProtocolError::InvalidLabel)
        ));
    }

    #[test]
    fn event_label_must_be_a_string() {
        assert!(matches!(
            decode_frame(br#"[null,{"x":1}]"#, None),
            Err(ProtocolError::InvalidLabel)
        ));
        assert!(matches!(
            decode_frame(br#"[42,null]"#, None),
            Err(ProtocolError::InvalidLabel)
        ));
    }

    #[test]
    fn correlated_label_may_be_null_but_nothing_else() {
        let frame = decode_frame(br#"3[null,"ok"]"#, None).unwrap().unwrap();
        assert_eq!(frame.correlation_id, 3);
        assert_eq!(frame.label, None);
        assert_eq!(frame.payload, Some(json!("ok")));

        assert!(matches!(
            decode_frame(br#"3[42,null]"#, None),
            Err(ProtocolError::MalformedFrame)
        ));
    }

    #[test]
    fn null_payload_normalizes_to_none() {
        let frame = decode_frame(br#"["ping",null]"#, None).unwrap().unwrap();
        assert_eq!(frame.payload, None);
    }

    #[test]
    fn label_validation_helper() {
        assert!(is_valid_label("a"));
        assert!(is_valid_label(&"x".repeat(64)));
        assert!(!is_valid_label(""));
        assert!(!is_valid_label(&"x".repeat(65)));
    }
}
