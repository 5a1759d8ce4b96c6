//! Tracked resource domains and their static configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One tracked resource category, one per supported title.
///
/// Serialized with the game identifiers the overlay keys its state by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    /// Genshin Impact original resin.
    #[serde(rename = "genshin")]
    Genshin,
    /// Honkai: Star Rail trailblaze power.
    #[serde(rename = "hkrpg")]
    StarRail,
    /// Zenless Zone Zero battery charge.
    #[serde(rename = "zzz")]
    Zzz,
}

impl Domain {
    /// Every tracked domain, in seeding order.
    pub const ALL: [Domain; 3] = [Domain::Genshin, Domain::StarRail, Domain::Zzz];

    /// Wire identifier (`genshin`, `hkrpg`, `zzz`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Genshin => "genshin",
            Self::StarRail => "hkrpg",
            Self::Zzz => "zzz",
        }
    }

    /// Human-readable title name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Genshin => "Genshin Impact",
            Self::StarRail => "Honkai: Star Rail",
            Self::Zzz => "Zenless Zone Zero",
        }
    }

    /// Executable name of the game client.
    pub fn default_process_name(&self) -> &'static str {
        match self {
            Self::Genshin => "GenshinImpact.exe",
            Self::StarRail => "StarRail.exe",
            Self::Zzz => "ZenlessZoneZero.exe",
        }
    }

    /// Time for one unit of the resource to regenerate in game.
    pub fn default_recover_interval(&self) -> Duration {
        match self {
            Self::Genshin => Duration::from_secs(480),
            Self::StarRail | Self::Zzz => Duration::from_secs(360),
        }
    }

    /// Parses a wire identifier. Case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static per-domain parameters. Read-only after startup.
///
/// The fetch selectors (`role_id`, `server`, `app_version`, `extra_headers`)
/// are opaque to the scheduler and only interpreted by the resource provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub domain: Domain,

    /// Executable whose exit triggers a refresh of this domain.
    pub process_name: String,

    /// In-game account identifier.
    #[serde(default)]
    pub role_id: String,

    /// Account region (e.g. `os_usa`, `prod_official_usa`, `prod_gf_us`).
    #[serde(default)]
    pub server: String,

    /// Value of the `x-rpc-app_version` header, when the endpoint needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    /// Nominal regeneration period of one resource unit, in seconds.
    pub recover_interval_secs: u64,

    /// Additional request headers sent verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_headers: BTreeMap<String, String>,
}

impl DomainConfig {
    /// Creates a config with the title's stock process name and interval.
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            process_name: domain.default_process_name().to_string(),
            role_id: String::new(),
            server: String::new(),
            app_version: None,
            recover_interval_secs: domain.default_recover_interval().as_secs(),
            extra_headers: BTreeMap::new(),
        }
    }

    pub fn recover_interval(&self) -> Duration {
        Duration::from_secs(self.recover_interval_secs)
    }

    /// Returns true if `name` is this domain's game executable.
    ///
    /// Windows executable names are case-insensitive, so is this.
    pub fn matches_process(&self, name: &str) -> bool {
        self.process_name.eq_ignore_ascii_case(name)
    }
}
