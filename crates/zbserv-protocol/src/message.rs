//! Wire message types.

use serde::{Deserialize, Serialize};
use zbserv_core::{Domain, ResourceSnapshot};

/// Outbound update: one per publish event.
///
/// Field names on the wire (`curr`, `max`, `game`) are the ones the
/// overlay store reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUpdate {
    #[serde(rename = "curr")]
    pub current: u32,
    pub max: u32,
    #[serde(rename = "game")]
    pub domain: Domain,
}

impl ResourceUpdate {
    pub fn new(domain: Domain, current: u32, max: u32) -> Self {
        Self {
            current,
            max,
            domain,
        }
    }

    /// Encodes to the JSON text frame payload.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&ResourceSnapshot> for ResourceUpdate {
    fn from(snapshot: &ResourceSnapshot) -> Self {
        Self::new(snapshot.domain, snapshot.current, snapshot.max)
    }
}

/// Inbound control token, forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlCommand(String);

impl ControlCommand {
    /// Wraps a text frame unchanged. Blank frames carry no token.
    pub fn parse(text: &str) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }
        Some(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_update_wire_shape() {
        let update = ResourceUpdate::new(Domain::StarRail, 120, 240);
        let value: serde_json::Value = serde_json::from_str(&update.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"curr": 120, "max": 240, "game": "hkrpg"})
        );
    }

    #[test]
    fn test_update_parses_overlay_shape() {
        let update: ResourceUpdate =
            serde_json::from_str(r#"{"curr":7,"max":160,"game":"genshin"}"#).unwrap();
        assert_eq!(update, ResourceUpdate::new(Domain::Genshin, 7, 160));
    }

    #[test]
    fn test_update_from_snapshot() {
        let snapshot = ResourceSnapshot::new(Domain::Zzz, 55, 240, Duration::from_secs(360), 0);
        let update = ResourceUpdate::from(&snapshot);
        assert_eq!(update.domain, Domain::Zzz);
        assert_eq!(update.current, 55);
        assert_eq!(update.max, 240);
    }

    #[test]
    fn test_control_command_is_verbatim() {
        let cmd = ControlCommand::parse("  toggle\n").unwrap();
        assert_eq!(cmd.as_str(), "  toggle\n");
        assert_eq!(cmd.to_string(), "  toggle\n");

        let long = "x".repeat(4096);
        assert_eq!(ControlCommand::parse(&long).unwrap().as_str(), long);
    }

    #[test]
    fn test_control_command_rejects_blank() {
        assert!(ControlCommand::parse("").is_none());
        assert!(ControlCommand::parse("   \t").is_none());
    }
}
