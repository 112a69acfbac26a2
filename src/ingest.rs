use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::api::health::HealthState;
use crate::config::{sample_record, IngestConfig};
use crate::db::RecordStore;
use crate::error::Result;
use crate::now_ns;
use crate::types::{MarketRecord, MatchEntry};
use crate::upstream::Upstream;

/// Counters for one fetch–filter–dedupe–insert cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries returned by the match list, decodable or not.
    pub fetched: usize,
    /// Entries that failed to decode, plus allow-listed entries lacking
    /// eventName, eventId or marketId.
    pub skipped: usize,
    /// Candidate records after filtering (sentinel included).
    pub candidates: usize,
    /// Records already in the store when the cycle read it.
    pub existing: usize,
    pub inserted: u64,
}

/// One ingestion cycle. Reads the match list, keeps allow-listed sports,
/// drops anything whose marketId is already stored, and batch-inserts the rest.
///
/// Nothing is written unless every step up to the insert succeeds. The
/// read-existing and insert steps are not atomic with respect to other writers.
pub async fn run_ingestion_cycle(
    store: &dyn RecordStore,
    upstream: &dyn Upstream,
    cfg: &IngestConfig,
) -> Result<CycleReport> {
    let list = upstream.fetch_match_list().await?;
    let mut report = CycleReport {
        fetched: list.entries.len() + list.malformed,
        skipped: list.malformed,
        ..CycleReport::default()
    };

    let candidates = select_candidates(&list.entries, cfg, &mut report);
    report.candidates = candidates.len();
    if candidates.is_empty() {
        return Ok(report);
    }

    let existing = store.list(None).await?;
    report.existing = existing.len();

    let fresh = dedupe(candidates, &existing);
    if !fresh.is_empty() {
        report.inserted = store.insert_many(&fresh).await?;
    }

    Ok(report)
}

/// Filter to allow-listed sports and project to records. Appends the sample
/// sentinel when enabled.
pub fn select_candidates(
    entries: &[MatchEntry],
    cfg: &IngestConfig,
    report: &mut CycleReport,
) -> Vec<MarketRecord> {
    let mut candidates = Vec::new();

    for entry in entries {
        let allowed = entry
            .sport_id
            .as_ref()
            .is_some_and(|sport| cfg.sport_ids.contains(sport));
        if !allowed {
            continue;
        }
        match entry.to_record() {
            Some(record) => candidates.push(record),
            None => {
                report.skipped += 1;
                debug!("Skipping incomplete match entry: {entry:?}");
            }
        }
    }

    if cfg.include_sample_record {
        candidates.push(MarketRecord::new(
            sample_record::EVENT_NAME,
            sample_record::EVENT_ID,
            sample_record::MARKET_ID,
        ));
    }

    candidates
}

/// Keep candidates whose marketId matches no existing record (exact string
/// equality). Repeats within `candidates` keep their first occurrence only.
pub fn dedupe(candidates: Vec<MarketRecord>, existing: &[MarketRecord]) -> Vec<MarketRecord> {
    let mut seen: HashSet<String> = existing.iter().map(|r| r.market_id.clone()).collect();
    candidates
        .into_iter()
        .filter(|r| seen.insert(r.market_id.clone()))
        .collect()
}

/// Owns the collaborators of the ingestion cycle and swallows its errors:
/// a failed cycle is logged and counted, never propagated to the scheduler.
pub struct IngestionJob {
    store: Arc<dyn RecordStore>,
    upstream: Arc<dyn Upstream>,
    cfg: IngestConfig,
    health: Arc<HealthState>,
}

impl IngestionJob {
    pub fn new(
        store: Arc<dyn RecordStore>,
        upstream: Arc<dyn Upstream>,
        cfg: IngestConfig,
        health: Arc<HealthState>,
    ) -> Self {
        Self { store, upstream, cfg, health }
    }

    pub async fn run_cycle(&self) {
        match run_ingestion_cycle(self.store.as_ref(), self.upstream.as_ref(), &self.cfg).await {
            Ok(r) => {
                self.health.record_success(now_ns(), r.inserted);
                info!(
                    fetched = r.fetched,
                    candidates = r.candidates,
                    skipped = r.skipped,
                    existing = r.existing,
                    inserted = r.inserted,
                    "Ingestion cycle complete: {} fetched, {} candidates, +{} inserted",
                    r.fetched, r.candidates, r.inserted,
                );
            }
            Err(e) => {
                self.health.record_failure(now_ns());
                error!("Ingestion cycle failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::db::store::memory_store;
    use crate::testing::{entry, FakeStore, FakeUpstream};
    use crate::types::MatchList;

    fn sport_four() -> IngestConfig {
        IngestConfig::default()
    }

    #[test]
    fn only_allow_listed_sports_become_candidates() {
        let entries = vec![
            entry("4", "India v Australia", "101", "1.201"),
            entry("7", "Race 3", "102", "1.202"),
            entry("4", "Eng v SA", "103", "1.203"),
        ];
        let mut report = CycleReport::default();
        let candidates = select_candidates(&entries, &sport_four(), &mut report);
        assert_eq!(
            candidates,
            vec![
                MarketRecord::new("India v Australia", "101", "1.201"),
                MarketRecord::new("Eng v SA", "103", "1.203"),
            ]
        );
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn entries_without_sport_or_fields_are_dropped() {
        let mut no_sport = entry("4", "x", "1", "m1");
        no_sport.sport_id = None;
        let mut no_market = entry("4", "y", "2", "m2");
        no_market.market_id = None;

        let mut report = CycleReport::default();
        let candidates = select_candidates(&[no_sport, no_market], &sport_four(), &mut report);
        assert!(candidates.is_empty());
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn sentinel_appended_only_when_enabled() {
        let cfg = IngestConfig {
            include_sample_record: true,
            ..IngestConfig::default()
        };
        let candidates = select_candidates(&[], &cfg, &mut CycleReport::default());
        assert_eq!(
            candidates,
            vec![MarketRecord::new("sample data", "20396579", "20396617")]
        );
        assert!(select_candidates(&[], &sport_four(), &mut CycleReport::default()).is_empty());
    }

    #[test]
    fn dedupe_drops_stored_and_repeated_market_ids() {
        let existing = vec![MarketRecord::new("old", "1", "m1")];
        let candidates = vec![
            MarketRecord::new("a", "1", "m1"),
            MarketRecord::new("b", "2", "m2"),
            MarketRecord::new("c", "3", "m2"),
            MarketRecord::new("d", "4", "M1"),
        ];
        let fresh = dedupe(candidates, &existing);
        let ids: Vec<_> = fresh.iter().map(|r| r.market_id.as_str()).collect();
        assert_eq!(ids, ["m2", "M1"]);
        assert_eq!(fresh[0].event_name, "b");
    }

    #[tokio::test]
    async fn inserts_only_new_market_ids() {
        let store = FakeStore::with_records(vec![MarketRecord::new("old", "101", "1.201")]);
        let upstream = FakeUpstream::with_matches(vec![
            entry("4", "India v Australia", "101", "1.201"),
            entry("4", "Eng v SA", "103", "1.203"),
            entry("7", "Race 3", "102", "1.202"),
        ]);

        let report = run_ingestion_cycle(&store, &upstream, &sport_four()).await.unwrap();

        assert_eq!(report.fetched, 3);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.existing, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(store.market_ids(), ["1.201", "1.203"]);
    }

    #[tokio::test]
    async fn malformed_entries_are_skipped_and_counted() {
        let store = FakeStore::default();
        let upstream = FakeUpstream::with_list(MatchList {
            entries: vec![entry("4", "Eng v SA", "103", "1.203")],
            malformed: 2,
        });

        let report = run_ingestion_cycle(&store, &upstream, &sport_four()).await.unwrap();

        assert_eq!(report.fetched, 3);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.inserted, 1);
        assert_eq!(store.market_ids(), ["1.203"]);
    }

    #[tokio::test]
    async fn empty_match_list_touches_no_store() {
        let store = FakeStore::default();
        let upstream = FakeUpstream::with_matches(Vec::new());

        let report = run_ingestion_cycle(&store, &upstream, &sport_four()).await.unwrap();

        assert_eq!(report, CycleReport::default());
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn nothing_new_skips_insert() {
        let store = FakeStore::with_records(vec![MarketRecord::new("old", "101", "1.201")]);
        let upstream = FakeUpstream::with_matches(vec![entry("4", "India v Australia", "101", "1.201")]);

        let report = run_ingestion_cycle(&store, &upstream, &sport_four()).await.unwrap();

        assert_eq!(report.inserted, 0);
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upstream_failure_writes_nothing() {
        let store = FakeStore::default();
        let upstream = FakeUpstream::down();

        assert!(run_ingestion_cycle(&store, &upstream, &sport_four()).await.is_err());
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_error() {
        let store = FakeStore::broken();
        let upstream = FakeUpstream::with_matches(vec![entry("4", "A v B", "1", "m1")]);

        assert!(run_ingestion_cycle(&store, &upstream, &sport_four()).await.is_err());
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_cycles_against_sqlite_insert_once() {
        let store = memory_store().await;
        let upstream = FakeUpstream::with_matches(vec![
            entry("4", "India v Australia", "101", "1.201"),
            entry("4", "Eng v SA", "103", "1.203"),
            entry("1", "Arsenal v Spurs", "104", "1.204"),
        ]);
        let cfg = IngestConfig {
            include_sample_record: true,
            ..IngestConfig::default()
        };

        let first = run_ingestion_cycle(&store, &upstream, &cfg).await.unwrap();
        let second = run_ingestion_cycle(&store, &upstream, &cfg).await.unwrap();

        assert_eq!(first.inserted, 3);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.existing, 3);

        let ids: Vec<_> = store
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.market_id)
            .collect();
        assert_eq!(ids, ["1.201", "1.203", "20396617"]);
    }

    #[tokio::test]
    async fn job_counts_failures_without_panicking() {
        let health = Arc::new(HealthState::new());
        let job = IngestionJob::new(
            Arc::new(FakeStore::default()),
            Arc::new(FakeUpstream::down()),
            IngestConfig::default(),
            Arc::clone(&health),
        );

        job.run_cycle().await;
        job.run_cycle().await;

        let snap = health.snapshot();
        assert_eq!(snap.cycles_failed, 2);
        assert_eq!(snap.cycles_ok, 0);
        assert!(snap.last_cycle_at_ns.is_some());
    }

    #[tokio::test]
    async fn job_records_inserted_count() {
        let health = Arc::new(HealthState::new());
        let job = IngestionJob::new(
            Arc::new(FakeStore::default()),
            Arc::new(FakeUpstream::with_matches(vec![entry("4", "A v B", "1", "m1")])),
            IngestConfig::default(),
            Arc::clone(&health),
        );

        job.run_cycle().await;

        let snap = health.snapshot();
        assert_eq!(snap.cycles_ok, 1);
        assert_eq!(snap.records_inserted, 1);
    }
}
