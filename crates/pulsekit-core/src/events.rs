use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every lifecycle transition and custom signal produces a TelemetryEvent.
/// Producers append them to the durable queue; the sync engine drains them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AppOpen,
    AppClose,
    SessionDuration,
    DailyCheckin,
    Heartbeat,
    Custom,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AppOpen => "app_open",
            EventType::AppClose => "app_close",
            EventType::SessionDuration => "session_duration",
            EventType::DailyCheckin => "daily_checkin",
            EventType::Heartbeat => "heartbeat",
            EventType::Custom => "custom",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app_open" => Ok(EventType::AppOpen),
            "app_close" => Ok(EventType::AppClose),
            "session_duration" => Ok(EventType::SessionDuration),
            "daily_checkin" => Ok(EventType::DailyCheckin),
            "heartbeat" => Ok(EventType::Heartbeat),
            "custom" => Ok(EventType::Custom),
            other => Err(format!("Unknown event type: {other}")),
        }
    }
}

/// Immutable telemetry record as stored in the queue snapshot.
///
/// `fraud_flags` is captured when the event is created and never touched
/// again, so a later change in device signals does not rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub id: String,
    pub event_type: EventType,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub tester_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_hash: Option<String>,
    pub campaign_id: String,
    pub package_name: String,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub fraud_flags: BTreeMap<String, bool>,
}

impl TelemetryEvent {
    /// Project this event onto the document shape the remote store expects.
    pub fn to_remote_document(&self) -> RemoteDocument {
        RemoteDocument {
            event_type: self.event_type,
            timestamp: self.timestamp,
            tester_id: self.tester_id.clone(),
            device_hash: self.device_hash.clone(),
            campaign_id: self.campaign_id.clone(),
            package_name: self.package_name.clone(),
            fraud_flags: self.fraud_flags.clone(),
            event_data: self.data.clone(),
        }
    }
}

/// Remote document created once per delivered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub event_type: EventType,
    pub timestamp: i64,
    pub tester_id: String,
    pub device_hash: Option<String>,
    pub campaign_id: String,
    pub package_name: String,
    pub fraud_flags: BTreeMap<String, bool>,
    pub event_data: serde_json::Map<String, serde_json::Value>,
}
