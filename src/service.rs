use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use tracing::{error, info};

use crate::helpers::email::Notifier;
use crate::helpers::export::ReportRenderer;
use crate::helpers::period::{period_label, previous_month, yesterday_window};
use crate::merge::merge;
use crate::store::OvertimeStore;

/// What a single daily invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Fold yesterday's records into the current month.
    CollectYesterday,
    /// Render and email last month's aggregate.
    SendPreviousMonth,
    /// Render and email the current month's aggregate without merging.
    SendCurrentMonth,
}

impl Job {
    /// The first day of the month (in UTC) closes the previous month; any
    /// other day collects.
    pub fn for_invocation(now: DateTime<Utc>, testing_mode: bool) -> Self {
        if testing_mode {
            Job::SendCurrentMonth
        } else if now.day() == 1 {
            Job::SendPreviousMonth
        } else {
            Job::CollectYesterday
        }
    }
}

/// Outcome of a successful run, for the final log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSummary {
    Collected {
        period: String,
        merged: usize,
        total_minutes: u64,
    },
    Sent {
        period: String,
        artifact: PathBuf,
        total_minutes: u64,
    },
}

/// Ties the store, renderer and notifier together for the daily job.
///
/// Steps run one after another; the first failure ends the run. The daily
/// branch is a read-merge-write on the month's aggregate and must not run
/// concurrently with itself.
pub struct OvertimeService<S, R, N> {
    store: S,
    renderer: R,
    notifier: N,
    testing_mode: bool,
}

impl<S, R, N> OvertimeService<S, R, N>
where
    S: OvertimeStore,
    R: ReportRenderer,
    N: Notifier,
{
    pub fn new(store: S, renderer: R, notifier: N, testing_mode: bool) -> Self {
        info!("Creating new OvertimeService instance");
        Self {
            store,
            renderer,
            notifier,
            testing_mode,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Runs the job due at `now`, using the process's local timezone for
    /// the daily window and the current month.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        self.run_at(&now.with_timezone(&Local)).await
    }

    /// Runs the job due at `now`.
    ///
    /// The month boundary and the month it closes are taken from the UTC
    /// date; yesterday and the current month follow `now`'s timezone.
    pub async fn run_at<Tz>(&self, now: &DateTime<Tz>) -> Result<RunSummary>
    where
        Tz: chrono::TimeZone,
    {
        let now_utc = now.with_timezone(&Utc);
        let job = Job::for_invocation(now_utc, self.testing_mode);
        info!(?job, now = %now_utc, "Starting overtime job");

        let result = match job {
            Job::CollectYesterday => self.collect_yesterday(now).await,
            Job::SendPreviousMonth => match previous_month(now_utc.date_naive()) {
                Ok(month) => self.send_report(month).await,
                Err(e) => Err(e),
            },
            Job::SendCurrentMonth => self.send_report(now.date_naive()).await,
        };

        if let Err(e) = &result {
            error!(?job, "Overtime job failed: {:#}", e);
        }
        result
    }

    /// Merges the records created yesterday (in `now`'s timezone) into the
    /// aggregate of `now`'s month and saves it.
    pub async fn collect_yesterday<Tz>(&self, now: &DateTime<Tz>) -> Result<RunSummary>
    where
        Tz: chrono::TimeZone,
    {
        let (start, end) = yesterday_window(now)?;
        let period = period_label(now.date_naive());
        info!("Collecting overtime from {} to {} into {}", start, end, period);

        let entries = self
            .store
            .fetch_entries(start, end)
            .await
            .context("Failed to fetch yesterday's overtime entries")?;

        let report = merge(&self.store, &entries, &period)
            .await
            .with_context(|| format!("Failed to merge overtime entries into {}", period))?;

        self.store
            .save_report(&report)
            .await
            .with_context(|| format!("Failed to save overtime report for {}", period))?;

        info!(
            "Saved {} with {} entries, {} minutes",
            period,
            report.lines().len(),
            report.total_minutes()
        );
        Ok(RunSummary::Collected {
            period,
            merged: entries.len(),
            total_minutes: report.total_minutes(),
        })
    }

    /// Renders and emails the aggregate of the month containing `month`.
    pub async fn send_report(&self, month: NaiveDate) -> Result<RunSummary> {
        let period = period_label(month);
        info!("Sending overtime report for {}", period);

        let report = self
            .store
            .load_report(&period)
            .await
            .with_context(|| format!("Failed to load merged report for {}", period))?;

        let artifact = self
            .renderer
            .render(&report)
            .with_context(|| format!("Failed to render overtime report for {}", period))?;

        self.notifier
            .send_report(&report, &artifact)
            .await
            .context("Failed to send report email")?;

        info!("Report for {} sent with {}", period, artifact.display());
        Ok(RunSummary::Sent {
            period,
            artifact,
            total_minutes: report.total_minutes(),
        })
    }
}
