//! Typed gateway events.
//!
//! The gateway driver deserialises every inbound payload into
//! [`GatewayEvent`] so the read loop can pattern-match instead of poking at
//! raw `(op, t, serde_json::Value)` tuples.

use tracing::warn;

use crate::types::*;

/// A fully-parsed event coming off the Discord gateway.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Connection parameters (op 10). Only expected as the first frame.
    Hello { heartbeat_interval: u64 },

    /// We've successfully identified; the bot is ready.
    Ready(ReadyEvent),

    /// A message was created in a channel we can see.
    MessageCreate(Message),

    /// Heartbeat ACK from the gateway (op 11).
    HeartbeatAck,

    /// The gateway is asking us to heartbeat immediately (op 1).
    HeartbeatRequest,

    /// Gateway told us to reconnect (op 7).
    Reconnect,

    /// Session has been invalidated (op 9). The inner bool indicates whether
    /// the session is resumable.
    InvalidSession(bool),

    /// Anything without a typed variant.
    Unknown {
        event_name: Option<String>,
        op: u8,
    },
}

impl GatewayEvent {
    /// Convert a raw [`GatewayPayload`] into a typed event.
    ///
    /// Never fails: unrecognised or malformed events become
    /// [`GatewayEvent::Unknown`].
    pub fn from_payload(payload: GatewayPayload) -> Self {
        match payload.op {
            0 => Self::parse_dispatch(payload.t, payload.d),
            1 => GatewayEvent::HeartbeatRequest,
            7 => GatewayEvent::Reconnect,
            9 => {
                let resumable = payload
                    .d
                    .as_ref()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                GatewayEvent::InvalidSession(resumable)
            }
            10 => match payload
                .d
                .as_ref()
                .and_then(|d| d.get("heartbeat_interval"))
                .and_then(|v| v.as_u64())
            {
                Some(heartbeat_interval) => GatewayEvent::Hello { heartbeat_interval },
                None => GatewayEvent::Unknown {
                    event_name: payload.t,
                    op: 10,
                },
            },
            11 => GatewayEvent::HeartbeatAck,
            op => GatewayEvent::Unknown {
                event_name: payload.t,
                op,
            },
        }
    }

    /// Parse an op-0 DISPATCH event by its `t` name.
    fn parse_dispatch(event_name: Option<String>, data: Option<serde_json::Value>) -> Self {
        let (name, d) = match (event_name, data) {
            (Some(name), Some(d)) => (name, d),
            (event_name, _) => return GatewayEvent::Unknown { event_name, op: 0 },
        };

        let parsed = match name.as_str() {
            "READY" => serde_json::from_value(d).map(GatewayEvent::Ready),
            "MESSAGE_CREATE" => serde_json::from_value(d).map(GatewayEvent::MessageCreate),
            _ => {
                return GatewayEvent::Unknown {
                    event_name: Some(name),
                    op: 0,
                }
            }
        };

        parsed.unwrap_or_else(|e| {
            warn!(event = %name, error = %e, "failed to parse dispatch payload");
            GatewayEvent::Unknown {
                event_name: Some(name),
                op: 0,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: serde_json::Value) -> GatewayPayload {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn hello_carries_interval() {
        let ev = GatewayEvent::from_payload(payload(
            json!({"op": 10, "d": {"heartbeat_interval": 41250}, "s": null, "t": null}),
        ));
        assert!(matches!(ev, GatewayEvent::Hello { heartbeat_interval: 41250 }));
    }

    #[test]
    fn ready_is_typed() {
        let ev = GatewayEvent::from_payload(payload(json!({
            "op": 0, "s": 1, "t": "READY",
            "d": {
                "v": 10,
                "user": {"id": "1", "username": "ffrbot", "bot": true},
                "session_id": "abc",
                "guilds": [{"id": "5", "unavailable": true}]
            }
        })));
        match ev {
            GatewayEvent::Ready(ready) => {
                assert_eq!(ready.session_id, "abc");
                assert_eq!(ready.guilds.len(), 1);
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn malformed_dispatch_becomes_unknown() {
        let ev = GatewayEvent::from_payload(payload(
            json!({"op": 0, "s": 2, "t": "MESSAGE_CREATE", "d": {"id": 1}}),
        ));
        assert!(matches!(
            ev,
            GatewayEvent::Unknown { event_name: Some(ref n), op: 0 } if n == "MESSAGE_CREATE"
        ));
    }

    #[test]
    fn control_opcodes() {
        let ev = |op: u8, d: serde_json::Value| {
            GatewayEvent::from_payload(payload(json!({"op": op, "d": d, "s": null, "t": null})))
        };
        assert!(matches!(ev(1, json!(null)), GatewayEvent::HeartbeatRequest));
        assert!(matches!(ev(7, json!(null)), GatewayEvent::Reconnect));
        assert!(matches!(ev(9, json!(true)), GatewayEvent::InvalidSession(true)));
        assert!(matches!(ev(9, json!(null)), GatewayEvent::InvalidSession(false)));
        assert!(matches!(ev(11, json!(null)), GatewayEvent::HeartbeatAck));
        assert!(matches!(ev(42, json!(null)), GatewayEvent::Unknown { op: 42, .. }));
    }
}
