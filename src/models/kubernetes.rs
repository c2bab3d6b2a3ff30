use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::models::overtime::{Entry, Report};

pub const TICKETS_KEY: &str = "ticket_url";
pub const MINUTES_KEY: &str = "minutes";

// Response structs for the core/v1 ConfigMap API
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ConfigMapList {
    #[serde(default)]
    pub items: Vec<ConfigMap>,
}

impl fmt::Display for ConfigMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigMap {}",
            self.metadata.name.as_deref().unwrap_or("<unnamed>")
        )?;
        if let Some(created) = self.metadata.creation_timestamp {
            write!(f, " (created {})", created.to_rfc3339())?;
        }
        Ok(())
    }
}

impl ConfigMap {
    /// A daily overtime record as submitted by users.
    pub fn overtime_record(
        name: impl Into<String>,
        created_at: DateTime<Utc>,
        tickets: impl Into<String>,
        minutes: impl Into<String>,
    ) -> Self {
        let mut data = BTreeMap::new();
        data.insert(TICKETS_KEY.to_string(), tickets.into());
        data.insert(MINUTES_KEY.to_string(), minutes.into());

        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "overtime".to_string());

        Self {
            metadata: ObjectMeta {
                name: Some(name.into()),
                creation_timestamp: Some(created_at),
                labels,
                ..ObjectMeta::default()
            },
            data,
            ..Self::default()
        }
    }

    fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Decodes the daily entries of this record.
    ///
    /// Returns `None` when the record has no creation timestamp or lacks one
    /// of the two data keys.
    pub fn entries(&self) -> Option<Vec<Entry>> {
        let created_at = self.metadata.creation_timestamp?;
        let lines = self.ledger_lines()?;

        Some(
            lines
                .into_iter()
                .map(|(ticket, minutes)| Entry::new(ticket, minutes, created_at))
                .collect(),
        )
    }

    /// Rebuilds the merged report stored in this object.
    pub fn to_report(&self, period: &str) -> Report {
        let mut report = Report::new(period);
        for (ticket, minutes) in self.ledger_lines().unwrap_or_default() {
            report.append(ticket, minutes);
        }
        report
    }

    /// The object that persists `report` under `name`.
    pub fn from_report(name: impl Into<String>, report: &Report) -> Self {
        let mut data = BTreeMap::new();
        data.insert(
            TICKETS_KEY.to_string(),
            report
                .lines()
                .iter()
                .map(|line| line.ticket.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        );
        data.insert(
            MINUTES_KEY.to_string(),
            report
                .lines()
                .iter()
                .map(|line| line.minutes.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        );

        Self {
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..ObjectMeta::default()
            },
            data,
            ..Self::default()
        }
    }

    fn ledger_lines(&self) -> Option<Vec<(String, u32)>> {
        let tickets = self.data.get(TICKETS_KEY)?;
        let minutes = self.data.get(MINUTES_KEY)?;

        Some(decode_ledger(self.name(), tickets, minutes))
    }
}

/// Pairs up the newline-delimited ticket and minute fields.
///
/// Lists of different length are truncated to the shorter one. An empty field
/// holds no elements.
pub fn decode_ledger(record: &str, tickets: &str, minutes: &str) -> Vec<(String, u32)> {
    let tickets = split_field(tickets);
    let minutes = split_field(minutes);

    if tickets.len() != minutes.len() {
        warn!(
            record,
            tickets = tickets.len(),
            minutes = minutes.len(),
            "Ticket and minute counts differ, truncating to the shorter list"
        );
    }

    tickets
        .into_iter()
        .zip(minutes)
        .map(|(ticket, raw)| (ticket.to_string(), coerce_minutes(record, ticket, raw)))
        .collect()
}

fn split_field(field: &str) -> Vec<&str> {
    if field.is_empty() {
        return Vec::new();
    }
    field.split('\n').map(str::trim).collect()
}

/// Parses a minute count, falling back to zero for negative or unparsable
/// input.
pub fn coerce_minutes(record: &str, ticket: &str, raw: &str) -> u32 {
    match raw.trim().parse::<i64>() {
        Ok(value) => u32::try_from(value).unwrap_or_else(|_| {
            warn!(record, ticket, raw, "Minutes out of range, counting as 0");
            0
        }),
        Err(e) => {
            warn!(record, ticket, raw, error = %e, "Unparsable minutes, counting as 0");
            0
        }
    }
}
