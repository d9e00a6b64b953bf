//! Messages exchanged through the relay while the direct channel is being
//! established.
//!
//! Payloads are opaque to this crate: only the connectivity transport on each
//! end understands them (session descriptions, connectivity candidates).

use serde::{Deserialize, Serialize};

/// Opaque payload owned by the connectivity transport.
pub type Payload = serde_json::Value;

/// One relayed negotiation message.
///
/// On the relay wire this is `{"type": "offer" | "answer" | "ice", "data": ..}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NegotiationMessage {
    Offer(Payload),
    Answer(Payload),
    #[serde(rename = "ice")]
    Candidate(Payload),
}

impl NegotiationMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            NegotiationMessage::Offer(_) => "offer",
            NegotiationMessage::Answer(_) => "answer",
            NegotiationMessage::Candidate(_) => "candidate",
        }
    }

    pub fn payload(&self) -> &Payload {
        match self {
            NegotiationMessage::Offer(payload)
            | NegotiationMessage::Answer(payload)
            | NegotiationMessage::Candidate(payload) => payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidate_travels_as_ice() {
        let message = NegotiationMessage::Candidate(json!({
            "candidate": "candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host",
            "sdpMid": "0",
        }));

        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], "ice");
        assert_eq!(value["data"]["sdpMid"], "0");
        assert_eq!(
            serde_json::from_value::<NegotiationMessage>(value).unwrap(),
            message
        );
    }

    #[test]
    fn offer_payload_is_untouched() {
        let raw = r#"{"type":"offer","data":{"type":"offer","sdp":"v=0"}}"#;

        let message: NegotiationMessage = serde_json::from_str(raw).unwrap();

        assert_eq!(message.kind(), "offer");
        assert_eq!(message.payload()["sdp"], "v=0");
    }
}
