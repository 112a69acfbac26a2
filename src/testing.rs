//! In-crate fakes for the store and upstream seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::RecordStore;
use crate::error::{AppError, Result};
use crate::types::{MarketRecord, MatchEntry, MatchList, Selection};
use crate::upstream::Upstream;

pub fn entry(sport_id: &str, event_name: &str, event_id: &str, market_id: &str) -> MatchEntry {
    MatchEntry {
        sport_id: Some(sport_id.to_string()),
        event_name: Some(event_name.to_string()),
        event_id: Some(event_id.to_string()),
        market_id: Some(market_id.to_string()),
    }
}

/// Serves a fixed match list; `None` simulates an outage.
#[derive(Default)]
pub struct FakeUpstream {
    pub matches: Mutex<Option<MatchList>>,
    pub details: HashMap<String, Vec<Selection>>,
}

impl FakeUpstream {
    pub fn with_matches(matches: Vec<MatchEntry>) -> Self {
        Self::with_list(MatchList::from(matches))
    }

    pub fn with_list(list: MatchList) -> Self {
        Self {
            matches: Mutex::new(Some(list)),
            details: HashMap::new(),
        }
    }

    pub fn down() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn fetch_match_list(&self) -> Result<MatchList> {
        self.matches
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::UpstreamShape("match-list: fake outage".to_string()))
    }

    async fn fetch_match_detail(&self, market_id: &str) -> Result<Vec<Selection>> {
        self.details
            .get(market_id)
            .cloned()
            .ok_or_else(|| AppError::UpstreamShape(format!("match-data: no entry for market {market_id}")))
    }
}

/// Vec-backed store that counts every call.
#[derive(Default)]
pub struct FakeStore {
    pub records: Mutex<Vec<MarketRecord>>,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub broken: bool,
}

impl FakeStore {
    pub fn with_records(records: Vec<MarketRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn market_ids(&self) -> Vec<String> {
        self.records.lock().unwrap().iter().map(|r| r.market_id.clone()).collect()
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn list(&self, title: Option<&str>) -> Result<Vec<MarketRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(AppError::Database(sqlx::Error::PoolClosed));
        }
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| match title {
                Some(t) => r
                    .title
                    .as_deref()
                    .is_some_and(|rt| rt.to_lowercase().contains(&t.to_lowercase())),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn insert_many(&self, records: &[MarketRecord]) -> Result<u64> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(AppError::Database(sqlx::Error::PoolClosed));
        }
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(records.len() as u64)
    }
}
