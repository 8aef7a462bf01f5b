//! Live feed wire protocol.
//!
//! Inbound frames are JSON envelopes `{ type, payload, timestamp }`. The `type`
//! discriminator selects how `payload` is decoded. Outbound frames use the same
//! shape and are stamped with the send time.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::models::{Game, NewsItem, ScoreUpdate, StatUpdate, StatusUpdate};

/// Envelope discriminators understood by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    GameUpdate,
    ScoreUpdate,
    StatusUpdate,
    StatUpdate,
    NewsUpdate,
    Error,
    Ping,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::GameUpdate => "gameUpdate",
            EnvelopeKind::ScoreUpdate => "scoreUpdate",
            EnvelopeKind::StatusUpdate => "statusUpdate",
            EnvelopeKind::StatUpdate => "statUpdate",
            EnvelopeKind::NewsUpdate => "newsUpdate",
            EnvelopeKind::Error => "error",
            EnvelopeKind::Ping => "ping",
        }
    }

    /// Look up a wire discriminator. Returns `None` for kinds this client does
    /// not know about.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "gameUpdate" => Some(EnvelopeKind::GameUpdate),
            "scoreUpdate" => Some(EnvelopeKind::ScoreUpdate),
            "statusUpdate" => Some(EnvelopeKind::StatusUpdate),
            "statUpdate" => Some(EnvelopeKind::StatUpdate),
            "newsUpdate" => Some(EnvelopeKind::NewsUpdate),
            "error" => Some(EnvelopeKind::Error),
            "ping" | "pong" => Some(EnvelopeKind::Ping),
            _ => None,
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Full game-list snapshot
    Games(Vec<Game>),
    Score(ScoreUpdate),
    Status(StatusUpdate),
    Stats(StatUpdate),
    News(NewsItem),
    /// Server-reported error text
    Error(String),
    /// Keepalive; only counts toward liveness
    Ping,
}

impl FeedEvent {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            FeedEvent::Games(_) => EnvelopeKind::GameUpdate,
            FeedEvent::Score(_) => EnvelopeKind::ScoreUpdate,
            FeedEvent::Status(_) => EnvelopeKind::StatusUpdate,
            FeedEvent::Stats(_) => EnvelopeKind::StatUpdate,
            FeedEvent::News(_) => EnvelopeKind::NewsUpdate,
            FeedEvent::Error(_) => EnvelopeKind::Error,
            FeedEvent::Ping => EnvelopeKind::Ping,
        }
    }

    fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            FeedEvent::Games(games) => serde_json::to_value(games),
            FeedEvent::Score(update) => serde_json::to_value(update),
            FeedEvent::Status(update) => serde_json::to_value(update),
            FeedEvent::Stats(update) => serde_json::to_value(update),
            FeedEvent::News(item) => serde_json::to_value(item),
            FeedEvent::Error(message) => Ok(Value::String(message.clone())),
            FeedEvent::Ping => Ok(Value::Object(Default::default())),
        }
    }
}

/// A typed inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEnvelope {
    pub event: FeedEvent,
    pub timestamp: Option<DateTime<Utc>>,
}

impl InboundEnvelope {
    /// Wrap an event stamped with the current time.
    pub fn now(event: FeedEvent) -> Self {
        Self {
            event,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.event.kind()
    }
}

/// Envelope as it appears on the wire, before the payload is typed.
#[derive(Debug, Serialize, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
    /// Metadata only. Read leniently so an odd stamp never costs the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<Value>,
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Envelope(InboundEnvelope),
    /// Well-formed envelope with a discriminator this client does not know
    Unknown { kind: String },
}

/// Decode one inbound text frame.
pub fn decode(text: &str) -> Result<Decoded, ProtocolError> {
    let raw: RawEnvelope = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;

    let Some(kind) = EnvelopeKind::parse(&raw.kind) else {
        return Ok(Decoded::Unknown { kind: raw.kind });
    };

    let event = match kind {
        EnvelopeKind::GameUpdate => FeedEvent::Games(typed_payload(kind, raw.payload)?),
        EnvelopeKind::ScoreUpdate => FeedEvent::Score(typed_payload(kind, raw.payload)?),
        EnvelopeKind::StatusUpdate => FeedEvent::Status(typed_payload(kind, raw.payload)?),
        EnvelopeKind::StatUpdate => FeedEvent::Stats(typed_payload(kind, raw.payload)?),
        EnvelopeKind::NewsUpdate => FeedEvent::News(typed_payload(kind, raw.payload)?),
        EnvelopeKind::Error => FeedEvent::Error(error_text(raw.payload)),
        EnvelopeKind::Ping => FeedEvent::Ping,
    };

    Ok(Decoded::Envelope(InboundEnvelope {
        event,
        timestamp: raw.timestamp.as_ref().and_then(parse_timestamp),
    }))
}

/// Encode an inbound envelope as a wire frame (used by feed producers).
pub fn encode(envelope: &InboundEnvelope) -> Result<String, ProtocolError> {
    let raw = RawEnvelope {
        kind: envelope.kind().as_str().to_string(),
        payload: envelope.event.payload().map_err(ProtocolError::Encode)?,
        timestamp: envelope
            .timestamp
            .map(|at| Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
    };
    serde_json::to_string(&raw).map_err(ProtocolError::Encode)
}

fn typed_payload<T: DeserializeOwned>(
    kind: EnvelopeKind,
    payload: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|source| ProtocolError::Payload { kind, source })
}

/// Accepts RFC 3339, an ISO-8601 local time (read as UTC) or epoch milliseconds.
/// Anything else is dropped.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map(|at| at.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").map(|at| at.and_utc())
            })
            .ok(),
        Value::Number(number) => number.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Error payloads are usually a bare string; tolerate `{ "message": ... }` too.
fn error_text(payload: Value) -> String {
    if let Some(text) = payload.as_str() {
        return text.to_string();
    }
    if let Some(message) = payload.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    payload.to_string()
}

// --- Outbound ---

/// Messages the client sends to the feed server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Auth { client_id: String, version: String },
    /// Keepalive carrying the send time in epoch milliseconds
    Ping { timestamp: i64 },
}

impl ClientMessage {
    pub fn auth(client_id: impl Into<String>, version: impl Into<String>) -> Self {
        ClientMessage::Auth {
            client_id: client_id.into(),
            version: version.into(),
        }
    }

    pub fn ping(at: DateTime<Utc>) -> Self {
        ClientMessage::Ping {
            timestamp: at.timestamp_millis(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Auth { .. } => "auth",
            ClientMessage::Ping { .. } => "ping",
        }
    }
}

/// A client message stamped with its send time.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEnvelope<'a> {
    #[serde(flatten)]
    pub message: &'a ClientMessage,
    pub timestamp: DateTime<Utc>,
}

impl<'a> OutboundEnvelope<'a> {
    pub fn new(message: &'a ClientMessage) -> Self {
        Self {
            message,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GameStatus, NewsKind};

    fn expect_envelope(text: &str) -> InboundEnvelope {
        match decode(text).unwrap() {
            Decoded::Envelope(envelope) => envelope,
            other => panic!("expected envelope, got {:?}", other),
        }
    }

    #[test]
    fn decodes_score_update() {
        let envelope = expect_envelope(
            r#"{"type":"scoreUpdate","payload":{"gameId":"g1","homeScore":14,"awayScore":7},"timestamp":"2024-09-08T17:00:00Z"}"#,
        );
        assert_eq!(
            envelope.event,
            FeedEvent::Score(ScoreUpdate {
                game_id: "g1".into(),
                home_score: 14,
                away_score: 7,
            })
        );
        assert!(envelope.timestamp.is_some());
    }

    #[test]
    fn timestamp_without_offset_is_read_as_utc() {
        let envelope = expect_envelope(
            r#"{"type":"scoreUpdate","payload":{"gameId":"g1","homeScore":3,"awayScore":0},"timestamp":"2024-09-08T17:00:00"}"#,
        );
        let expected = DateTime::parse_from_rfc3339("2024-09-08T17:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(envelope.timestamp, Some(expected));
        assert!(matches!(envelope.event, FeedEvent::Score(_)));
    }

    #[test]
    fn timestamp_in_epoch_millis_is_accepted() {
        let envelope = expect_envelope(
            r#"{"type":"scoreUpdate","payload":{"gameId":"g1","homeScore":3,"awayScore":0},"timestamp":1725814800000}"#,
        );
        assert_eq!(
            envelope.timestamp.map(|at| at.timestamp_millis()),
            Some(1_725_814_800_000)
        );
    }

    #[test]
    fn unreadable_timestamp_keeps_the_payload() {
        for stamp in [r#""last tuesday""#, "true", r#"{"at":1}"#, "null"] {
            let text = format!(
                r#"{{"type":"scoreUpdate","payload":{{"gameId":"g1","homeScore":7,"awayScore":0}},"timestamp":{stamp}}}"#
            );
            let envelope = expect_envelope(&text);
            assert_eq!(envelope.timestamp, None, "stamp {stamp}");
            assert!(matches!(envelope.event, FeedEvent::Score(_)), "stamp {stamp}");
        }
    }

    #[test]
    fn decodes_status_update_without_time() {
        let envelope =
            expect_envelope(r#"{"type":"statusUpdate","payload":{"gameId":"g2","status":"FINAL"}}"#);
        match envelope.event {
            FeedEvent::Status(update) => {
                assert_eq!(update.status, "FINAL");
                assert_eq!(update.time, None);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn decodes_game_snapshot() {
        let text = r#"{"type":"gameUpdate","payload":[{
            "id":"g1",
            "homeTeam":{"id":"kc","name":"Chiefs","abbreviation":"KC"},
            "awayTeam":{"id":"buf","name":"Bills","abbreviation":"BUF"},
            "homeScore":3,"awayScore":0,"status":"LIVE","quarter":"Q1"
        }]}"#;
        match expect_envelope(text).event {
            FeedEvent::Games(games) => {
                assert_eq!(games.len(), 1);
                assert_eq!(games[0].status, GameStatus::Live);
                assert_eq!(games[0].quarter.as_deref(), Some("Q1"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn game_update_requires_an_array() {
        let err = decode(r#"{"type":"gameUpdate","payload":{"id":"g1"}}"#).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Payload {
                kind: EnvelopeKind::GameUpdate,
                ..
            }
        ));
    }

    #[test]
    fn unknown_kind_is_reported_not_failed() {
        let decoded = decode(r#"{"type":"draftPick","payload":{}}"#).unwrap();
        assert_eq!(
            decoded,
            Decoded::Unknown {
                kind: "draftPick".into()
            }
        );
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(decode("{not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            decode(r#"{"payload":{}}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn error_payload_accepts_string_or_object() {
        let a = expect_envelope(r#"{"type":"error","payload":"feed degraded"}"#);
        assert_eq!(a.event, FeedEvent::Error("feed degraded".into()));

        let b =
            expect_envelope(r#"{"type":"error","payload":{"message":"rate limited","code":429}}"#);
        assert_eq!(b.event, FeedEvent::Error("rate limited".into()));

        let c = expect_envelope(r#"{"type":"error","payload":42}"#);
        assert_eq!(c.event, FeedEvent::Error("42".into()));
    }

    #[test]
    fn pong_is_treated_as_ping() {
        assert_eq!(expect_envelope(r#"{"type":"pong"}"#).event, FeedEvent::Ping);
    }

    #[test]
    fn encoded_news_decodes_to_same_event() {
        let item = NewsItem::new(NewsKind::Highlight, "Big play", "A long catch").for_game("g9");
        let envelope = InboundEnvelope::now(FeedEvent::News(item));
        let text = encode(&envelope).unwrap();
        assert_eq!(expect_envelope(&text), envelope);
    }

    #[test]
    fn outbound_auth_is_stamped() {
        let message = ClientMessage::auth("gridiron-dash-web", "1.0.0");
        let json = OutboundEnvelope::new(&message).to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "auth");
        assert_eq!(value["payload"]["clientId"], "gridiron-dash-web");
        assert_eq!(value["payload"]["version"], "1.0.0");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn outbound_ping_carries_millis() {
        let at = DateTime::parse_from_rfc3339("2024-01-01T00:00:01Z")
            .unwrap()
            .with_timezone(&Utc);
        let message = ClientMessage::ping(at);
        let value: Value =
            serde_json::from_str(&OutboundEnvelope::new(&message).to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "ping");
        assert_eq!(value["payload"]["timestamp"], 1_704_067_201_000i64);
    }
}
