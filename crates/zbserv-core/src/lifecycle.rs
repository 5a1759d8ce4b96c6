//! Process lifecycle events for tracked game executables.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a process appeared or disappeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    Started,
    Stopped,
}

impl LifecycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw notification as produced by a process event source.
///
/// The kind is implied by the subscription it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProcessEvent {
    pub name: String,
    pub pid: u32,
}

impl RawProcessEvent {
    pub fn new(name: impl Into<String>, pid: u32) -> Self {
        Self {
            name: name.into(),
            pid,
        }
    }
}

/// A normalized process start/stop occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub process_name: String,
    pub pid: u32,
    pub kind: LifecycleKind,
}

impl LifecycleEvent {
    pub fn new(process_name: impl Into<String>, pid: u32, kind: LifecycleKind) -> Self {
        Self {
            process_name: process_name.into(),
            pid,
            kind,
        }
    }

    /// Tags a raw notification with the kind of the subscription that produced it.
    pub fn from_raw(raw: RawProcessEvent, kind: LifecycleKind) -> Self {
        Self::new(raw.name, raw.pid, kind)
    }

    pub fn is_stopped(&self) -> bool {
        self.kind == LifecycleKind::Stopped
    }
}

/// Name predicate applied by process event sources.
///
/// Matching is ASCII case-insensitive. An empty filter matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessFilter {
    names: Vec<String>,
}

impl ProcessFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort_by_key(|n| n.to_ascii_lowercase());
        names.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        Self { names }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(LifecycleKind::Started.to_string(), "started");
        assert_eq!(LifecycleKind::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_event_from_raw() {
        let raw = RawProcessEvent::new("StarRail.exe", 4242);
        let event = LifecycleEvent::from_raw(raw, LifecycleKind::Stopped);
        assert_eq!(event.process_name, "StarRail.exe");
        assert_eq!(event.pid, 4242);
        assert!(event.is_stopped());
    }

    #[test]
    fn test_filter_matches_case_insensitively() {
        let filter = ProcessFilter::new(["GenshinImpact.exe", "StarRail.exe"]);
        assert!(filter.matches("genshinimpact.exe"));
        assert!(filter.matches("STARRAIL.EXE"));
        assert!(!filter.matches("notepad.exe"));
    }

    #[test]
    fn test_filter_dedups_names() {
        let filter = ProcessFilter::new(["StarRail.exe", "starrail.exe", "ZenlessZoneZero.exe"]);
        assert_eq!(filter.names().len(), 2);
    }

    #[test]
    fn test_empty_filter_matches_nothing() {
        let filter = ProcessFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.matches(""));
        assert!(!filter.matches("GenshinImpact.exe"));
    }
}
