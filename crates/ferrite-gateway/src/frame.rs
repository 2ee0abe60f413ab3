//! Wire frame codec for the gateway connection.
//!
//! Frames are JSON envelopes tagged by `op`. Dispatch frames additionally
//! carry a type tag `t` and a sequence number `s`. The decode step at this
//! boundary produces a fixed enumerated set of typed events; unknown ops and
//! unknown dispatch tags map to explicit `Unknown` variants rather than
//! silent pass-through.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ferrite_core::{GatewayError, GatewayResult};

// =============================================================================
// Inbound control frames
// =============================================================================

/// Payload of the hello frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval: u64,
}

/// Payload of the resume-rejected frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeRejected {
    /// Whether the server believes a later resume could still succeed.
    #[serde(default)]
    pub resumable: bool,
}

/// A frame received from the gateway, tagged by `op`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InboundFrame {
    /// First frame after the socket opens; carries the heartbeat interval.
    Hello {
        /// Frame payload.
        d: Hello,
    },
    /// Acknowledges a heartbeat we sent.
    HeartbeatAck,
    /// A dispatch event.
    Dispatch {
        /// Event type tag.
        t: String,
        /// Sequence number, absent on some frames.
        #[serde(default)]
        s: Option<u64>,
        /// Event payload.
        #[serde(default)]
        d: Value,
    },
    /// The server rejected our resume attempt.
    ResumeRejected {
        /// Frame payload.
        #[serde(default)]
        d: ResumeRejected,
    },
    /// Any op this client does not know.
    #[serde(other)]
    Unknown,
}

impl InboundFrame {
    /// Decodes a frame from raw JSON text.
    pub fn decode(raw: &str) -> GatewayResult<Self> {
        serde_json::from_str(raw).map_err(|e| GatewayError::Decode {
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Outbound control frames
// =============================================================================

/// Identify payload: credentials, capability bitmask, shard descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identify {
    /// Authentication token.
    pub token: String,
    /// Capability bitmask.
    pub capabilities: u64,
    /// Shard descriptor (index, total).
    pub shard: [u32; 2],
}

/// Heartbeat payload carrying the last-seen sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Last dispatch sequence observed, if any.
    pub last_seq: Option<u64>,
}

/// Resume payload carrying the stored session and last sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resume {
    /// Session id captured from the ready frame.
    pub session_id: String,
    /// Resume token captured from the ready frame.
    pub resume_token: String,
    /// Last dispatch sequence observed.
    pub last_seq: Option<u64>,
}

/// A frame sent to the gateway, tagged by `op`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Opens a fresh session.
    Identify {
        /// Frame payload.
        d: Identify,
    },
    /// Periodic keep-alive.
    Heartbeat {
        /// Frame payload.
        d: Heartbeat,
    },
    /// Resumes a previous session.
    Resume {
        /// Frame payload.
        d: Resume,
    },
}

impl OutboundFrame {
    /// Encodes the frame as JSON text for a websocket text message.
    pub fn encode(&self) -> GatewayResult<String> {
        serde_json::to_string(self).map_err(|e| GatewayError::SendFailed(e.to_string()))
    }
}

// =============================================================================
// Typed dispatch events
// =============================================================================

/// The session-ready snapshot carried by the `READY` dispatch frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadySnapshot {
    /// Server-assigned session id.
    pub session_id: String,
    /// Token required to resume this session.
    pub resume_token: String,
    /// Initial resource snapshot, opaque to this core.
    #[serde(default)]
    pub state: Value,
}

/// A dispatch frame decoded by its type tag.
///
/// Payload semantics beyond `Ready` belong to the business-logic layer, so
/// they stay as raw JSON here; the tag set is what this core routes on.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// Session established; carries session id and resume token.
    Ready(ReadySnapshot),
    /// A previous session was resumed successfully.
    Resumed,
    /// A chat message was created.
    MessageCreate(Value),
    /// A chat message was edited.
    MessageUpdate(Value),
    /// A chat message was deleted.
    MessageDelete(Value),
    /// A channel became visible to the session.
    ChannelCreate(Value),
    /// A member's presence changed.
    PresenceUpdate(Value),
    /// A dispatch tag this client does not know.
    Unknown {
        /// The unrecognized type tag.
        kind: String,
        /// Raw payload.
        payload: Value,
    },
}

impl DispatchEvent {
    /// Decodes a dispatch payload by its type tag.
    ///
    /// Only `READY` has a payload shape this core depends on; a malformed
    /// ready payload is a decode error because the session cannot proceed
    /// without its resume data.
    pub fn decode(kind: &str, payload: Value) -> GatewayResult<Self> {
        Ok(match kind {
            "READY" => {
                let snapshot =
                    serde_json::from_value(payload).map_err(|e| GatewayError::Decode {
                        reason: format!("malformed READY payload: {e}"),
                    })?;
                Self::Ready(snapshot)
            }
            "RESUMED" => Self::Resumed,
            "MESSAGE_CREATE" => Self::MessageCreate(payload),
            "MESSAGE_UPDATE" => Self::MessageUpdate(payload),
            "MESSAGE_DELETE" => Self::MessageDelete(payload),
            "CHANNEL_CREATE" => Self::ChannelCreate(payload),
            "PRESENCE_UPDATE" => Self::PresenceUpdate(payload),
            _ => Self::Unknown {
                kind: kind.to_string(),
                payload,
            },
        })
    }

    /// The event name this dispatch is forwarded under: the lowercased tag.
    pub fn event_name(&self) -> String {
        match self {
            Self::Ready(_) => "ready".to_string(),
            Self::Resumed => "resumed".to_string(),
            Self::MessageCreate(_) => "message_create".to_string(),
            Self::MessageUpdate(_) => "message_update".to_string(),
            Self::MessageDelete(_) => "message_delete".to_string(),
            Self::ChannelCreate(_) => "channel_create".to_string(),
            Self::PresenceUpdate(_) => "presence_update".to_string(),
            Self::Unknown { kind, .. } => kind.to_lowercase(),
        }
    }

    /// The payload forwarded to listeners.
    pub fn payload(&self) -> Value {
        match self {
            Self::Ready(snapshot) => snapshot.state.clone(),
            Self::Resumed => Value::Null,
            Self::MessageCreate(v)
            | Self::MessageUpdate(v)
            | Self::MessageDelete(v)
            | Self::ChannelCreate(v)
            | Self::PresenceUpdate(v) => v.clone(),
            Self::Unknown { payload, .. } => payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_hello() {
        let frame =
            InboundFrame::decode(r#"{"op":"hello","d":{"heartbeat_interval":41250}}"#).unwrap();
        match frame {
            InboundFrame::Hello { d } => assert_eq!(d.heartbeat_interval, 41250),
            other => panic!("expected hello, got {other:?}"),
        }
    }

    #[test]
    fn decodes_dispatch_with_sequence() {
        let frame = InboundFrame::decode(
            r#"{"op":"dispatch","t":"MESSAGE_CREATE","s":7,"d":{"content":"hi"}}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::Dispatch { t, s, d } => {
                assert_eq!(t, "MESSAGE_CREATE");
                assert_eq!(s, Some(7));
                assert_eq!(d["content"], "hi");
            }
            other => panic!("expected dispatch, got {other:?}"),
        }
    }

    #[test]
    fn unknown_op_is_explicit() {
        let frame = InboundFrame::decode(r#"{"op":"mystery","d":{}}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Unknown));
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        assert!(matches!(
            InboundFrame::decode("not json"),
            Err(GatewayError::Decode { .. })
        ));
    }

    #[test]
    fn unknown_dispatch_tag_keeps_payload() {
        let event = DispatchEvent::decode("GUILD_EMOJI_SYNC", json!({"id": 9})).unwrap();
        match &event {
            DispatchEvent::Unknown { kind, payload } => {
                assert_eq!(kind, "GUILD_EMOJI_SYNC");
                assert_eq!(payload["id"], 9);
            }
            other => panic!("expected unknown, got {other:?}"),
        }
        assert_eq!(event.event_name(), "guild_emoji_sync");
    }

    #[test]
    fn ready_captures_resume_data() {
        let event = DispatchEvent::decode(
            "READY",
            json!({"session_id": "s1", "resume_token": "r1", "state": {"channels": []}}),
        )
        .unwrap();
        match event {
            DispatchEvent::Ready(snapshot) => {
                assert_eq!(snapshot.session_id, "s1");
                assert_eq!(snapshot.resume_token, "r1");
            }
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[test]
    fn malformed_ready_is_a_decode_error() {
        assert!(matches!(
            DispatchEvent::decode("READY", json!({"session_id": 3})),
            Err(GatewayError::Decode { .. })
        ));
    }

    #[test]
    fn outbound_frames_round_trip_tags() {
        let text = OutboundFrame::Heartbeat {
            d: Heartbeat { last_seq: Some(12) },
        }
        .encode()
        .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["op"], "heartbeat");
        assert_eq!(value["d"]["last_seq"], 12);
    }
}
