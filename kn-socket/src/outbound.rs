//! Client-to-server realtime emissions.
//!
//! Everything here is fire-and-forget: the transport makes a best-effort
//! attempt to deliver each event and no acknowledgment is tracked. A
//! dropped emission is logged, never surfaced to the caller.

use serde::Serialize;

/// A client-initiated event to emit over the realtime transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClientEvent {
    /// Join the realtime room for a chat so its push events are received.
    JoinChat { chat_id: String },
    /// Typing indicator for a chat.
    Typing { chat_id: String, is_typing: bool },
    /// Fast-path read receipt. The REST call remains authoritative; this
    /// emission only speeds up convergence of other sessions.
    MarkRead {
        chat_id: String,
        message_ids: Vec<String>,
    },
    /// Voice-call offer signaling. Payload is opaque to this layer.
    VoiceCallOffer { payload: serde_json::Value },
    /// Voice-call answer signaling.
    VoiceCallAnswer { payload: serde_json::Value },
    /// Voice-call end signaling.
    VoiceCallEnd { payload: serde_json::Value },
    /// WebRTC ICE candidate exchange.
    IceCandidate { payload: serde_json::Value },
}

impl ClientEvent {
    /// The wire event name for this emission.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinChat { .. } => "join_chat",
            Self::Typing { .. } => "typing",
            Self::MarkRead { .. } => "mark_read",
            Self::VoiceCallOffer { .. } => "voice_call_offer",
            Self::VoiceCallAnswer { .. } => "voice_call_answer",
            Self::VoiceCallEnd { .. } => "voice_call_end",
            Self::IceCandidate { .. } => "ice_candidate",
        }
    }

    /// The JSON payload sent alongside the event name.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::JoinChat { chat_id } => serde_json::json!({ "chatId": chat_id }),
            Self::Typing { chat_id, is_typing } => {
                serde_json::json!({ "chatId": chat_id, "isTyping": is_typing })
            }
            Self::MarkRead {
                chat_id,
                message_ids,
            } => {
                if message_ids.is_empty() {
                    serde_json::json!({ "chatId": chat_id })
                } else {
                    serde_json::json!({ "chatId": chat_id, "messageIds": message_ids })
                }
            }
            Self::VoiceCallOffer { payload }
            | Self::VoiceCallAnswer { payload }
            | Self::VoiceCallEnd { payload }
            | Self::IceCandidate { payload } => payload.clone(),
        }
    }
}
