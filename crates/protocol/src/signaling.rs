//! JSON control messages carried over the signaling WebSocket.
//!
//! One WebSocket carries the negotiation traffic for every data channel a
//! client opens; messages are addressed with a node-type byte (`to` on the
//! way out, `from` on the way back) and the server mirrors the client's
//! data-channel correlation ID so replies can be demultiplexed.

use serde::{Deserialize, Serialize};

/// An SDP offer or answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// "offer" or "answer"
    #[serde(rename = "type")]
    pub sdp_type: String,
    pub sdp: String,
}

/// One signaling message. Exactly one of `description`, `candidate` or
/// `echo` is expected to be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalingMessage {
    /// Target node type byte; set by the client on outbound messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<u8>,

    /// Source node type byte; set by the server on inbound messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u8>,

    /// Data-channel correlation ID, assigned by the client and mirrored by
    /// the server.
    #[serde(rename = "channelId", skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<SessionDescription>,

    /// ICE candidate payload, passed through verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<serde_json::Value>,

    /// Echo request/response for connectivity smoke tests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub echo: Option<serde_json::Value>,
}

impl SignalingMessage {
    /// An SDP offer addressed to `to`.
    pub fn offer(to: u8, channel_id: u32, sdp: String) -> Self {
        Self {
            to: Some(to),
            channel_id: Some(channel_id),
            description: Some(SessionDescription {
                sdp_type: "offer".into(),
                sdp,
            }),
            ..Default::default()
        }
    }

    /// An ICE candidate addressed to `to`.
    pub fn ice_candidate(to: u8, channel_id: u32, candidate: serde_json::Value) -> Self {
        Self {
            to: Some(to),
            channel_id: Some(channel_id),
            candidate: Some(candidate),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_serializes_without_empty_fields() {
        let message = SignalingMessage::offer(b'D', 7, "v=0".into());
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["to"], b'D');
        assert_eq!(json["channelId"], 7);
        assert_eq!(json["description"]["type"], "offer");
        assert!(json.get("from").is_none());
        assert!(json.get("candidate").is_none());
    }

    #[test]
    fn answer_round_trips() {
        let json = r#"{"from":68,"channelId":7,"description":{"type":"answer","sdp":"v=0"}}"#;
        let message: SignalingMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.from, Some(68));
        assert_eq!(message.description.as_ref().unwrap().sdp_type, "answer");
        let back = serde_json::to_string(&message).unwrap();
        let reparsed: SignalingMessage = serde_json::from_str(&back).unwrap();
        assert_eq!(reparsed, message);
    }
}
