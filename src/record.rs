//! Convention record model
//!
//! The upstream API is loosely typed: engagement counts arrive as numbers
//! or numeric text, and the participation flag arrives as a bool or a free
//! string. Raw shapes are normalized once at the ingestion boundary so the
//! rest of the crate works with a single concrete record type.

use serde::Deserialize;

/// Status literal the upstream uses for a finished event.
pub const STATUS_ENDED: &str = "已结束";

/// Status literal the upstream uses for an event that has not started.
pub const STATUS_UPCOMING: &str = "未开始";

/// Count field that may arrive as a number or numeric text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawCount {
    Number(u64),
    Text(String),
}

impl RawCount {
    fn normalize(self) -> u64 {
        match self {
            RawCount::Number(n) => n,
            RawCount::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

/// Participation flag that may arrive as a bool or a display string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawParticipation {
    Flag(bool),
    Label(String),
}

impl RawParticipation {
    fn normalize(self) -> String {
        match self {
            RawParticipation::Flag(true) => "online".to_string(),
            RawParticipation::Flag(false) => "offline".to_string(),
            RawParticipation::Label(s) => s,
        }
    }
}

/// Record shape as returned by the search API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub tag: String,
    /// Status literal, e.g. "已结束" / "未开始" / "进行中". May be absent.
    #[serde(default)]
    pub ended: String,
    #[serde(default)]
    wanna_go_count: Option<RawCount>,
    #[serde(default)]
    circle_count: Option<RawCount>,
    #[serde(default)]
    doujinshi_count: Option<RawCount>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    is_online: Option<RawParticipation>,
    #[serde(default)]
    pub app_logo_pic_url: String,
}

/// One normalized search result. Never persisted.
#[derive(Debug, Clone)]
pub struct ConventionRecord {
    pub name: String,
    pub location: String,
    pub address: String,
    pub time: String,
    pub tag: String,
    /// Raw status literal from the upstream; empty when unknown.
    pub status: String,
    pub wanna_go_count: u64,
    pub circle_count: u64,
    pub doujinshi_count: u64,
    pub url: String,
    /// Display string: "online"/"offline" from a bool flag, or the
    /// upstream label verbatim.
    pub participation: String,
    pub logo_url: String,
    /// Subscription keyword this record was found under, set only when
    /// aggregated by a batch query.
    pub keyword: Option<String>,
}

impl From<RawRecord> for ConventionRecord {
    fn from(raw: RawRecord) -> Self {
        Self {
            name: raw.name,
            location: raw.location,
            address: raw.address,
            time: raw.time,
            tag: raw.tag,
            status: raw.ended,
            wanna_go_count: raw.wanna_go_count.map(RawCount::normalize).unwrap_or(0),
            circle_count: raw.circle_count.map(RawCount::normalize).unwrap_or(0),
            doujinshi_count: raw.doujinshi_count.map(RawCount::normalize).unwrap_or(0),
            url: raw.url,
            participation: raw
                .is_online
                .map(RawParticipation::normalize)
                .unwrap_or_default(),
            logo_url: raw.app_logo_pic_url,
            keyword: None,
        }
    }
}

/// Coarse event status derived from the upstream literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ongoing,
    Ended,
    Upcoming,
}

impl Status {
    pub fn css_class(self) -> &'static str {
        match self {
            Status::Ongoing => "ongoing",
            Status::Ended => "ended",
            Status::Upcoming => "upcoming",
        }
    }

    pub fn badge(self) -> &'static str {
        match self {
            Status::Ongoing => "Ongoing",
            Status::Ended => "Ended",
            Status::Upcoming => "Upcoming",
        }
    }
}

/// Classify a status literal into exactly one bucket. Anything that is not
/// the exact ended/upcoming literal counts as ongoing, including empty or
/// unrecognized values.
pub fn classify(status: &str) -> Status {
    match status {
        STATUS_ENDED => Status::Ended,
        STATUS_UPCOMING => Status::Upcoming,
        _ => Status::Ongoing,
    }
}
