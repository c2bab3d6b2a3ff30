use std::path::Path;

use async_trait::async_trait;
use resend_rs::{
    Resend,
    types::{Attachment, CreateEmailBaseOptions},
};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::models::overtime::Report;

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Delivers a rendered report file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_report(&self, report: &Report, artifact: &Path) -> Result<()>;
}

pub struct ResendNotifier {
    resend: Resend,
    sender: String,
    recipient: String,
}

impl ResendNotifier {
    pub fn new(resend: Resend, sender: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            resend,
            sender: sender.into(),
            recipient: recipient.into(),
        }
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send_report(&self, report: &Report, artifact: &Path) -> Result<()> {
        let content = tokio::fs::read(artifact).await.map_err(|e| {
            error!("Failed to read report file {}: {}", artifact.display(), e);
            e
        })?;

        let filename = artifact
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "overtime-report".to_string());
        let subject = report_subject(report);

        info!("Preparing email with subject: {}", subject);
        info!("Report attachment {} size: {} bytes", filename, content.len());

        let email = CreateEmailBaseOptions::new(&self.sender, [&self.recipient], &subject)
            .with_text(&report_body(report))
            .with_attachment(
                Attachment::from_content(content)
                    .with_filename(&filename)
                    .with_content_type(content_type_for(artifact)),
            );

        match self.resend.emails.send(email).await {
            Ok(response) => {
                info!("Report email sent successfully with ID: {}", response.id);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send report email: {}", e);
                Err(Error::Email(e.to_string()))
            }
        }
    }
}

/// MIME type of an attachment, chosen by file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("csv") => CSV_CONTENT_TYPE,
        Some("xlsx") => XLSX_CONTENT_TYPE,
        _ => DEFAULT_CONTENT_TYPE,
    }
}

pub fn report_subject(report: &Report) -> String {
    format!("Relatório Mensal de Horas Extras - {}", report.period())
}

pub fn report_body(report: &Report) -> String {
    format!(
        "Caros,\n\nEspero que estejam bem!\n\nSegue em anexo as horas extra do mês de {}.\n\nAtenciosamente,",
        report.period()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("overtime_2024-03-01.csv", CSV_CONTENT_TYPE)]
    #[case("overtime_2024-03-01.xlsx", XLSX_CONTENT_TYPE)]
    #[case("OVERTIME.XLSX", XLSX_CONTENT_TYPE)]
    #[case("overtime.pdf", DEFAULT_CONTENT_TYPE)]
    #[case("overtime", DEFAULT_CONTENT_TYPE)]
    fn negotiates_content_type(#[case] file: &str, #[case] expected: &str) {
        assert_eq!(content_type_for(Path::new(file)), expected);
    }

    #[test]
    fn message_names_the_period() {
        let report = Report::new("Feb-2024");

        assert!(report_subject(&report).ends_with("Feb-2024"));
        assert!(report_body(&report).contains("mês de Feb-2024."));
    }

    #[tokio::test]
    async fn unreadable_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = ResendNotifier::new(
            Resend::new("re_test"),
            "bot@example.com",
            "finance@example.com",
        );

        let result = notifier
            .send_report(&Report::new("Feb-2024"), &dir.path().join("missing.csv"))
            .await;

        assert!(matches!(result, Err(Error::Io(_))));
    }
}
