//! NOTIFY payload shape (spec §6): `{action, key, value}` for data changes
//! emitted by a DB trigger, `{action:"heartbeat", crc}` for the service's
//! own periodic heartbeat. Parsing is a pure function, tested without a
//! listener connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum NotifyPayload {
    Insert { key: String, value: Value },
    Update { key: String, value: Value },
    Delete { key: String, value: Value },
    Heartbeat { crc: u32 },
}

impl NotifyPayload {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("NotifyPayload always serialises")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_data_change_payload() {
        let raw = r#"{"action":"update","key":"feature.flag","value":true}"#;
        let parsed = NotifyPayload::parse(raw).unwrap();
        assert_eq!(
            parsed,
            NotifyPayload::Update {
                key: "feature.flag".into(),
                value: json!(true),
            }
        );
    }

    #[test]
    fn parses_a_heartbeat_payload() {
        let raw = r#"{"action":"heartbeat","crc":123456}"#;
        assert_eq!(NotifyPayload::parse(raw).unwrap(), NotifyPayload::Heartbeat { crc: 123456 });
    }

    #[test]
    fn malformed_payload_is_an_error_not_a_panic() {
        assert!(NotifyPayload::parse("not json").is_err());
    }

    #[test]
    fn heartbeat_round_trips_through_json() {
        let payload = NotifyPayload::Heartbeat { crc: 42 };
        let round = NotifyPayload::parse(&payload.to_json()).unwrap();
        assert_eq!(payload, round);
    }
}
