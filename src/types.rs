use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// MarketRecord — the only persisted entity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    pub event_name: String,
    pub event_id: String,
    /// Natural dedupe key. Not unique at the store level.
    pub market_id: String,
    /// Never set by the ingestion job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl MarketRecord {
    pub fn new(
        event_name: impl Into<String>,
        event_id: impl Into<String>,
        market_id: impl Into<String>,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            event_id: event_id.into(),
            market_id: market_id.into(),
            title: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Upstream match-list envelope: { result: { result: [ entry, ... ] } }
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MatchListResponse {
    pub result: MatchListResult,
}

/// Entries stay raw here and are decoded one at a time, so a single odd
/// entry cannot sink the whole list.
#[derive(Debug, Deserialize)]
pub struct MatchListResult {
    pub result: Vec<serde_json::Value>,
}

/// Decoded match list plus the number of entries that failed to decode.
#[derive(Debug, Clone, Default)]
pub struct MatchList {
    pub entries: Vec<MatchEntry>,
    pub malformed: usize,
}

impl From<Vec<MatchEntry>> for MatchList {
    fn from(entries: Vec<MatchEntry>) -> Self {
        Self { entries, malformed: 0 }
    }
}

/// One raw upstream match. Only the fields the ingestion job projects are
/// modelled; everything else in the entry is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEntry {
    #[serde(default, deserialize_with = "opt_id")]
    pub sport_id: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub event_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub market_id: Option<String>,
}

impl MatchEntry {
    /// Project to `{eventName, eventId, marketId}`. None if any of the three is missing.
    pub fn to_record(&self) -> Option<MarketRecord> {
        Some(MarketRecord::new(
            self.event_name.clone()?,
            self.event_id.clone()?,
            self.market_id.clone()?,
        ))
    }
}

// ---------------------------------------------------------------------------
// Upstream match-data envelope: { result: { <id>: { diamond: "<json>" } } }
// ---------------------------------------------------------------------------

/// Only the entry for the requested market is decoded; siblings are ignored.
#[derive(Debug, Deserialize)]
pub struct MatchDetailResponse {
    pub result: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct MatchDetail {
    /// JSON document encoded as a string; decodes to [`Diamond`].
    pub diamond: String,
}

#[derive(Debug, Deserialize)]
pub struct Diamond {
    pub data: DiamondData,
}

#[derive(Debug, Deserialize)]
pub struct DiamondData {
    pub t3: Vec<Selection>,
}

/// `{mid, sid, nat}` projection of one `t3` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(deserialize_with = "id")]
    pub mid: String,
    #[serde(deserialize_with = "id")]
    pub sid: String,
    pub nat: String,
}

// ---------------------------------------------------------------------------
// Upstream ids arrive as either strings or numbers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Num(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(v: StringOrNumber) -> Self {
        match v {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Num(n) => n.to_string(),
        }
    }
}

fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(d).map(String::from)
}

fn opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(d)?.map(String::from))
}
