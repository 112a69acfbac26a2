use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{
    Diamond, MatchDetail, MatchDetailResponse, MatchEntry, MatchList, MatchListResponse, Selection,
};

/// The third-party match feed.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Current match list, unfiltered. Entries that fail to decode are
    /// counted in [`MatchList::malformed`], not returned.
    async fn fetch_match_list(&self) -> Result<MatchList>;

    /// `{mid, sid, nat}` for every `t3` selection of one market.
    async fn fetch_match_detail(&self, market_id: &str) -> Result<Vec<Selection>>;
}

/// reqwest-backed client. The token rides along as a `token` query parameter
/// on every request.
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpUpstream {
    pub fn new(cfg: &Config) -> Result<Self> {
        Self::with_parts(&cfg.upstream_base_url, &cfg.upstream_token, cfg.upstream_timeout)
    }

    pub fn with_parts(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {url}");
        let body = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch_match_list(&self) -> Result<MatchList> {
        let body = self.get("match-list").await?;
        parse_match_list(&body)
    }

    async fn fetch_match_detail(&self, market_id: &str) -> Result<Vec<Selection>> {
        let body = self.get(&format!("match-data/{market_id}")).await?;
        parse_match_detail(&body, market_id)
    }
}

/// Decode `{ result: { result: [...] } }`. A missing envelope is an error;
/// an individual entry that does not decode is skipped and counted.
pub fn parse_match_list(body: &[u8]) -> Result<MatchList> {
    let resp: MatchListResponse = decode(body, "match-list")?;
    let mut list = MatchList::default();

    for (i, raw) in resp.result.result.into_iter().enumerate() {
        let decoded: std::result::Result<MatchEntry, _> = serde_path_to_error::deserialize(raw);
        match decoded {
            Ok(entry) => list.entries.push(entry),
            Err(e) => {
                list.malformed += 1;
                debug!("match-list: skipping entry {i}: at {}: {}", e.path(), e.inner());
            }
        }
    }

    Ok(list)
}

/// Decode `{ result: { <id>: { diamond: "<json>" } } }`, then decode the
/// diamond string itself and project `data.t3`. Entries for other markets
/// are never inspected.
pub fn parse_match_detail(body: &[u8], market_id: &str) -> Result<Vec<Selection>> {
    let mut resp: MatchDetailResponse = decode(body, "match-data")?;
    let raw = resp.result.remove(market_id).ok_or_else(|| {
        AppError::UpstreamShape(format!("match-data: no entry for market {market_id} under result"))
    })?;
    let detail: MatchDetail = serde_path_to_error::deserialize(raw).map_err(|e| {
        AppError::UpstreamShape(format!(
            "match-data: at result.{market_id}.{}: {}",
            e.path(),
            e.inner()
        ))
    })?;
    let diamond: Diamond = decode(detail.diamond.as_bytes(), "match-data diamond")?;
    Ok(diamond.data.t3)
}

fn decode<T: DeserializeOwned>(body: &[u8], what: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_slice(body);
    serde_path_to_error::deserialize(de)
        .map_err(|e| AppError::UpstreamShape(format!("{what}: at {}: {}", e.path(), e.inner())))
}
