use chrono::{DateTime, Utc};

/// One overtime submission as read from a daily record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub ticket: String,
    pub minutes: u32,
    /// Only used to bucket the entry into a period. Not kept in the aggregate.
    pub occurred_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(ticket: impl Into<String>, minutes: u32, occurred_at: DateTime<Utc>) -> Self {
        Self {
            ticket: ticket.into(),
            minutes,
            occurred_at,
        }
    }
}

/// A flattened ledger row of a [`Report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub ticket: String,
    pub minutes: u32,
}

/// Monthly overtime aggregate.
///
/// Lines are only ever appended, so duplicate tickets are kept in the order
/// they were merged. `total_minutes` is derived and is recomputed on every
/// append; there is no way to set it from outside.
#[derive(Debug, Clone)]
pub struct Report {
    period: String,
    lines: Vec<ReportLine>,
    total_minutes: u64,
    generated_at: DateTime<Utc>,
}

impl Report {
    /// Empty report for `period`, e.g. `"Mar-2024"`.
    pub fn new(period: impl Into<String>) -> Self {
        Self {
            period: period.into(),
            lines: Vec::new(),
            total_minutes: 0,
            generated_at: Utc::now(),
        }
    }

    pub fn append(&mut self, ticket: impl Into<String>, minutes: u32) {
        self.lines.push(ReportLine {
            ticket: ticket.into(),
            minutes,
        });
        self.total_minutes = self.recompute_total();
        self.generated_at = Utc::now();
    }

    /// Sum of all line durations, independent of the cached total.
    pub fn recompute_total(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.minutes)).sum()
    }

    pub fn period(&self) -> &str {
        &self.period
    }

    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    pub fn total_minutes(&self) -> u64 {
        self.total_minutes
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
