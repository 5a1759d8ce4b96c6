//! Daily-note response schemas and snapshot extraction.
//!
//! Only the fields needed for a [`ResourceSnapshot`] are modelled; the
//! endpoints return much more (expeditions, weekly tasks, ...).

use serde::Deserialize;
use zbserv_core::{Domain, DomainConfig, FetchError, ResourceSnapshot};

#[derive(Debug, Deserialize)]
struct Envelope {
    retcode: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Seconds fields arrive as strings on some endpoints and numbers on others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn get(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenshinNote {
    current_resin: u32,
    max_resin: u32,
    resin_recovery_time: Seconds,
}

#[derive(Debug, Deserialize)]
struct StarRailNote {
    current_stamina: u32,
    max_stamina: u32,
    #[serde(default)]
    stamina_recover_time: i64,
    #[serde(default)]
    stamina_full_ts: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ZzzNote {
    energy: ZzzEnergy,
}

#[derive(Debug, Deserialize)]
struct ZzzEnergy {
    progress: ZzzProgress,
    #[serde(default)]
    restore: i64,
}

#[derive(Debug, Deserialize)]
struct ZzzProgress {
    max: u32,
    current: u32,
}

/// Extracts a snapshot from a daily-note response body.
///
/// `now` is the local unix time used to turn "seconds until full" into an
/// absolute fully-recovered epoch.
pub fn parse_note(
    config: &DomainConfig,
    body: &str,
    now: i64,
) -> Result<ResourceSnapshot, FetchError> {
    let domain = config.domain;
    let decode = |reason: String| FetchError::Decode { domain, reason };

    let envelope: Envelope = serde_json::from_str(body).map_err(|e| decode(e.to_string()))?;
    if envelope.retcode != 0 {
        return Err(FetchError::Api {
            domain,
            retcode: envelope.retcode,
            message: envelope.message,
        });
    }
    let data = envelope
        .data
        .ok_or_else(|| decode("missing data".to_string()))?;

    let (current, max, fully_recovered_epoch) = match domain {
        Domain::Genshin => {
            let note: GenshinNote =
                serde_json::from_value(data).map_err(|e| decode(e.to_string()))?;
            let remaining = note
                .resin_recovery_time
                .get()
                .ok_or_else(|| decode("invalid resin_recovery_time".to_string()))?;
            (note.current_resin, note.max_resin, now.saturating_add(remaining))
        }
        Domain::StarRail => {
            let note: StarRailNote =
                serde_json::from_value(data).map_err(|e| decode(e.to_string()))?;
            let epoch = match note.stamina_full_ts {
                Some(ts) if ts > 0 => ts,
                _ => now.saturating_add(note.stamina_recover_time),
            };
            (note.current_stamina, note.max_stamina, epoch)
        }
        Domain::Zzz => {
            let note: ZzzNote = serde_json::from_value(data).map_err(|e| decode(e.to_string()))?;
            (
                note.energy.progress.current,
                note.energy.progress.max,
                now.saturating_add(note.energy.restore),
            )
        }
    };

    Ok(ResourceSnapshot::new(
        domain,
        current,
        max,
        config.recover_interval(),
        fully_recovered_epoch,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_parse_genshin() {
        let body = serde_json::json!({
            "retcode": 0,
            "message": "OK",
            "data": {
                "current_resin": 97,
                "max_resin": 200,
                "resin_recovery_time": "49920",
                "finished_task_num": 4,
                "expeditions": []
            }
        })
        .to_string();

        let snapshot = parse_note(&DomainConfig::new(Domain::Genshin), &body, NOW).unwrap();
        assert_eq!(snapshot.domain, Domain::Genshin);
        assert_eq!(snapshot.current, 97);
        assert_eq!(snapshot.max, 200);
        assert_eq!(snapshot.recover_interval, Duration::from_secs(480));
        assert_eq!(snapshot.fully_recovered_epoch, NOW + 49_920);
    }

    #[test]
    fn test_parse_star_rail_prefers_full_ts() {
        let body = serde_json::json!({
            "retcode": 0,
            "message": "OK",
            "data": {
                "current_stamina": 180,
                "max_stamina": 240,
                "stamina_recover_time": 21600,
                "stamina_full_ts": 1_700_021_555,
                "current_ts": NOW
            }
        })
        .to_string();

        let snapshot = parse_note(&DomainConfig::new(Domain::StarRail), &body, NOW).unwrap();
        assert_eq!(snapshot.current, 180);
        assert_eq!(snapshot.max, 240);
        assert_eq!(snapshot.fully_recovered_epoch, 1_700_021_555);
    }

    #[test]
    fn test_parse_star_rail_without_full_ts() {
        let body = serde_json::json!({
            "retcode": 0,
            "data": {
                "current_stamina": 240,
                "max_stamina": 240,
                "stamina_recover_time": 0,
                "stamina_full_ts": 0
            }
        })
        .to_string();

        let snapshot = parse_note(&DomainConfig::new(Domain::StarRail), &body, NOW).unwrap();
        assert_eq!(snapshot.fully_recovered_epoch, NOW);
        assert!(snapshot.is_full());
    }

    #[test]
    fn test_parse_zzz() {
        let body = serde_json::json!({
            "retcode": 0,
            "message": "OK",
            "data": {
                "energy": {
                    "progress": { "max": 240, "current": 31 },
                    "restore": 75240,
                    "day_type": 1,
                    "hour": 20,
                    "minute": 54
                },
                "vitality": { "max": 400, "current": 400 }
            }
        })
        .to_string();

        let snapshot = parse_note(&DomainConfig::new(Domain::Zzz), &body, NOW).unwrap();
        assert_eq!(snapshot.current, 31);
        assert_eq!(snapshot.max, 240);
        assert_eq!(snapshot.fully_recovered_epoch, NOW + 75_240);
        assert_eq!(snapshot.recover_interval, Duration::from_secs(360));
    }

    #[test]
    fn test_parse_api_error() {
        let body = r#"{"retcode":10001,"message":"Please login","data":null}"#;
        let err = parse_note(&DomainConfig::new(Domain::Genshin), body, NOW).unwrap_err();
        assert_eq!(
            err,
            FetchError::Api {
                domain: Domain::Genshin,
                retcode: 10001,
                message: "Please login".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_missing_data() {
        let body = r#"{"retcode":0,"message":"OK"}"#;
        let err = parse_note(&DomainConfig::new(Domain::Zzz), body, NOW).unwrap_err();
        assert!(matches!(err, FetchError::Decode { domain: Domain::Zzz, .. }));
    }

    #[test]
    fn test_parse_wrong_shape() {
        let body = r#"{"retcode":0,"data":{"current_resin":"lots"}}"#;
        let err = parse_note(&DomainConfig::new(Domain::Genshin), body, NOW).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn test_parse_not_json() {
        let err = parse_note(&DomainConfig::new(Domain::Genshin), "<html>", NOW).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn test_parse_uses_configured_interval() {
        let mut config = DomainConfig::new(Domain::Genshin);
        config.recover_interval_secs = 60;
        let body = r#"{"retcode":0,"data":{"current_resin":1,"max_resin":2,"resin_recovery_time":60}}"#;
        let snapshot = parse_note(&config, body, NOW).unwrap();
        assert_eq!(snapshot.recover_interval, Duration::from_secs(60));
        assert_eq!(snapshot.fully_recovered_epoch, NOW + 60);
    }
}
