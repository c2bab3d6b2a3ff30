use tracing::info;

use crate::error::Result;
use crate::models::overtime::{Entry, Report};
use crate::store::OvertimeStore;

/// Folds `entries` into the stored report for `period`.
///
/// The stored report is loaded (empty if absent) and every entry is appended
/// in the order given. This is not a set union: merging the same batch twice
/// appends it twice and doubles its minutes. The caller persists the result
/// with [`OvertimeStore::save_report`].
pub async fn merge<S>(store: &S, entries: &[Entry], period: &str) -> Result<Report>
where
    S: OvertimeStore + ?Sized,
{
    let mut report = store.load_report(period).await?;
    let existing = report.lines().len();

    for entry in entries {
        report.append(entry.ticket.clone(), entry.minutes);
    }

    info!(
        period,
        existing,
        merged = entries.len(),
        total_minutes = report.total_minutes(),
        "Merged overtime entries"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::{MemoryStore, MockOvertimeStore};
    use chrono::{TimeZone, Utc};

    fn batch() -> Vec<Entry> {
        let at = Utc.with_ymd_and_hms(2024, 3, 14, 17, 0, 0).unwrap();
        vec![Entry::new("T1", 90, at), Entry::new("T2", 60, at)]
    }

    #[tokio::test]
    async fn merges_into_new_report() {
        let store = MemoryStore::new();

        let report = merge(&store, &batch(), "Mar-2024").await.unwrap();

        assert_eq!(report.period(), "Mar-2024");
        assert_eq!(report.lines().len(), 2);
        assert_eq!(report.total_minutes(), 150);
        assert_eq!(report.total_minutes(), report.recompute_total());
    }

    #[tokio::test]
    async fn appends_after_existing_lines() {
        let store = MemoryStore::new();
        let mut existing = Report::new("Mar-2024");
        existing.append("T0", 30);
        store.save_report(&existing).await.unwrap();

        let report = merge(&store, &batch(), "Mar-2024").await.unwrap();

        let tickets: Vec<&str> = report.lines().iter().map(|l| l.ticket.as_str()).collect();
        assert_eq!(tickets, ["T0", "T1", "T2"]);
        assert_eq!(report.total_minutes(), 180);
    }

    #[tokio::test]
    async fn merging_the_same_batch_twice_doubles_it() {
        let store = MemoryStore::new();
        let entries = batch();

        let once = merge(&store, &entries, "Mar-2024").await.unwrap();
        store.save_report(&once).await.unwrap();
        let twice = merge(&store, &entries, "Mar-2024").await.unwrap();

        assert_eq!(twice.lines().len(), 2 * entries.len());
        assert_eq!(twice.total_minutes(), 2 * 150);
        assert_eq!(twice.total_minutes(), twice.recompute_total());
    }

    #[tokio::test]
    async fn empty_batch_returns_stored_report() {
        let store = MemoryStore::new();

        let report = merge(&store, &[], "Mar-2024").await.unwrap();

        assert!(report.is_empty());
        assert_eq!(report.total_minutes(), 0);
    }

    #[tokio::test]
    async fn load_failure_is_propagated() {
        let mut store = MockOvertimeStore::new();
        store.expect_load_report().times(1).returning(|_| {
            Err(Error::Api {
                status: 500,
                body: "etcd unavailable".to_string(),
            })
        });
        store.expect_save_report().never();

        let result = merge(&store, &batch(), "Mar-2024").await;

        assert!(matches!(result, Err(Error::Api { status: 500, .. })));
    }
}
