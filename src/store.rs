//! Storage contract for daily overtime records and monthly aggregates.
//!
//! [`OvertimeStore`] bundles the two capabilities the merge depends on:
//! reading the raw daily entries for a time window, and reading/replacing the
//! merged report for a period. [`KubernetesStore`](crate::helpers::kubernetes::KubernetesStore)
//! is the cluster-backed adapter; [`MemoryStore`] keeps the same wire objects
//! in memory.
//!
//! Saving is a full overwrite. Callers must load, merge, then save, or the
//! previously stored lines for the period are lost. Nothing here locks: two
//! concurrent read-merge-write cycles on one period lose one of the writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::kubernetes::ConfigMap;
use crate::models::overtime::{Entry, Report};

/// Storage key of the merged report for `period`.
///
/// Periods are addressed case-insensitively: `"Jan-2024"` and `"jan-2024"`
/// share a key.
pub fn report_key(period: &str) -> String {
    format!("{period}-overtime-merged").to_lowercase()
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OvertimeStore: Send + Sync {
    /// Entries whose record was created within `[start, end]`, both inclusive.
    ///
    /// No ordering is guaranteed.
    async fn fetch_entries(&self, start: DateTime<Utc>, end: DateTime<Utc>)
    -> Result<Vec<Entry>>;

    /// The stored aggregate for `period`, or an empty report if none exists.
    async fn load_report(&self, period: &str) -> Result<Report>;

    /// Replaces the stored aggregate for the report's period.
    async fn save_report(&self, report: &Report) -> Result<()>;
}

/// In-memory store holding the same objects the cluster would.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ConfigMap>>,
    reports: Mutex<BTreeMap<String, ConfigMap>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a daily record with newline-delimited tickets and minutes.
    pub fn insert_record(
        &self,
        created_at: DateTime<Utc>,
        tickets: impl Into<String>,
        minutes: impl Into<String>,
    ) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let name = format!("overtime-{}", records.len() + 1);
        records.push(ConfigMap::overtime_record(name, created_at, tickets, minutes));
    }

    /// The raw stored aggregate under `key`, if any.
    pub fn stored_report(&self, key: &str) -> Option<ConfigMap> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn report_count(&self) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl OvertimeStore for MemoryStore {
    async fn fetch_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Entry>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);

        let mut entries = Vec::new();
        for record in records.iter() {
            match record.metadata.creation_timestamp {
                Some(created) if created >= start && created <= end => {}
                Some(_) => continue,
                None => {
                    warn!(%record, "Skipping overtime record without creation timestamp");
                    continue;
                }
            }
            match record.entries() {
                Some(found) => entries.extend(found),
                None => warn!(%record, "Skipping overtime record without ticket or minute data"),
            }
        }

        debug!(count = entries.len(), %start, %end, "Fetched entries from memory");
        Ok(entries)
    }

    async fn load_report(&self, period: &str) -> Result<Report> {
        let key = report_key(period);
        let reports = self.reports.lock().unwrap_or_else(PoisonError::into_inner);

        Ok(match reports.get(&key) {
            Some(stored) => stored.to_report(period),
            None => {
                info!(key, "No stored report, starting empty");
                Report::new(period)
            }
        })
    }

    async fn save_report(&self, report: &Report) -> Result<()> {
        let key = report_key(report.period());
        let stored = ConfigMap::from_report(key.clone(), report);

        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, stored);
        Ok(())
    }
}
