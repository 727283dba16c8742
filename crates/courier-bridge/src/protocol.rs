// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON frames exchanged with the session-protocol sidecar.
//!
//! Outbound frames are tagged by `op`, inbound frames by `event`. Requests
//! that expect an answer carry a `req` id which the sidecar echoes back in a
//! `reply` frame.

use std::path::PathBuf;

use courier_core::traits::transport::{
    ConnectTuning, DisconnectCause, InboundMessage, OutboundContent, TransportEvent,
    TransportIdentity,
};
use serde::{Deserialize, Serialize};

/// Frames Courier sends to the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame on every socket: which session to bring up and where its
    /// pairing material lives.
    Open {
        tenant: String,
        session: String,
        credentials_dir: PathBuf,
        tuning: ConnectTuning,
    },
    Send {
        req: u64,
        to: String,
        content: OutboundContent,
    },
    Ping {
        req: u64,
    },
    Close,
}

/// Frames the sidecar sends to Courier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerFrame {
    Qr {
        code: String,
    },
    Open {
        channel_identifier: String,
        #[serde(default)]
        device_label: Option<String>,
        #[serde(default)]
        transport_version: Option<String>,
    },
    Close {
        #[serde(default)]
        code: Option<u16>,
        #[serde(default)]
        reason: String,
    },
    Message {
        message: InboundMessage,
    },
    Reply {
        req: u64,
        ok: bool,
        #[serde(default)]
        message_id: Option<String>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        raw: serde_json::Value,
    },
}

/// Answer to a correlated request.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub ok: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub raw: serde_json::Value,
}

/// What an inbound frame means to the connection.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    Reply(u64, Reply),
    Event(TransportEvent),
}

impl ServerFrame {
    pub fn into_inbound(self) -> Inbound {
        match self {
            ServerFrame::Qr { code } => Inbound::Event(TransportEvent::PairingCode(code)),
            ServerFrame::Open {
                channel_identifier,
                device_label,
                transport_version,
            } => Inbound::Event(TransportEvent::Opened(TransportIdentity {
                channel_identifier,
                device_label,
                transport_version,
            })),
            ServerFrame::Close { code, reason } => {
                let reason = if reason.is_empty() {
                    "closed by bridge".to_string()
                } else {
                    reason
                };
                Inbound::Event(TransportEvent::Closed(DisconnectCause::new(code, reason)))
            }
            ServerFrame::Message { message } => {
                Inbound::Event(TransportEvent::MessageReceived(message))
            }
            ServerFrame::Reply {
                req,
                ok,
                message_id,
                error,
                raw,
            } => Inbound::Reply(
                req,
                Reply {
                    ok,
                    message_id,
                    error,
                    raw,
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use courier_core::MessageKind;
    use serde_json::json;

    use super::*;

    #[test]
    fn open_frame_carries_tuning_in_millis() {
        let frame = ClientFrame::Open {
            tenant: "acme".into(),
            session: "sales".into(),
            credentials_dir: PathBuf::from("/var/lib/courier/acme/sales"),
            tuning: ConnectTuning::default(),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["op"], "open");
        assert_eq!(value["session"], "sales");
        assert_eq!(value["tuning"]["query_timeout"], 60_000);
    }

    #[test]
    fn send_frame_nests_tagged_content() {
        let frame = ClientFrame::Send {
            req: 7,
            to: "628123@s.whatsapp.net".into(),
            content: OutboundContent::Text { body: "hi".into() },
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({"op": "send", "req": 7, "to": "628123@s.whatsapp.net",
                   "content": {"type": "text", "body": "hi"}})
        );
        assert_eq!(serde_json::to_value(ClientFrame::Close).unwrap(), json!({"op": "close"}));
    }

    #[test]
    fn close_without_code_is_transient() {
        let frame: ServerFrame = serde_json::from_str(r#"{"event":"close"}"#).unwrap();
        assert_eq!(
            frame.into_inbound(),
            Inbound::Event(TransportEvent::Closed(DisconnectCause::new(
                None,
                "closed by bridge"
            )))
        );

        let frame: ServerFrame =
            serde_json::from_str(r#"{"event":"close","code":401,"reason":"logged out"}"#).unwrap();
        assert_eq!(
            frame.into_inbound(),
            Inbound::Event(TransportEvent::Closed(DisconnectCause::new(
                Some(401),
                "logged out"
            )))
        );
    }

    #[test]
    fn open_and_message_events() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"event":"open","channel_identifier":"628123"}"#).unwrap();
        match frame.into_inbound() {
            Inbound::Event(TransportEvent::Opened(id)) => {
                assert_eq!(id.channel_identifier, "628123");
                assert!(id.device_label.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }

        let frame: ServerFrame = serde_json::from_value(json!({
            "event": "message",
            "message": {"message_id": "ABC", "from": "628999@s.whatsapp.net",
                        "kind": "text", "text": "yo"}
        }))
        .unwrap();
        match frame.into_inbound() {
            Inbound::Event(TransportEvent::MessageReceived(m)) => {
                assert_eq!(m.kind, MessageKind::Text);
                assert_eq!(m.text.as_deref(), Some("yo"));
                assert!(m.group.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reply_is_correlated_by_req() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"event":"reply","req":3,"ok":false,"error":"rate limited"}"#)
                .unwrap();
        match frame.into_inbound() {
            Inbound::Reply(req, reply) => {
                assert_eq!(req, 3);
                assert!(!reply.ok);
                assert_eq!(reply.error.as_deref(), Some("rate limited"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_events_fail_to_parse() {
        assert!(serde_json::from_str::<ServerFrame>(r#"{"event":"presence"}"#).is_err());
    }
}
