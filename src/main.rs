use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use resend_rs::Resend;
use tracing::{error, info};

use overtime_report::{
    Config, OvertimeService, ReportFormat, RunSummary,
    helpers::{
        email::ResendNotifier,
        export::{CsvRenderer, ReportRenderer, XlsxRenderer},
        kubernetes::{KubernetesStore, kubernetes_client_init},
    },
};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    info!("Starting overtime report job");

    report_outcome(run().await, &mut io::stdout(), &mut io::stderr())
}

/// Prints the outcome of a run and maps it to the process exit code.
fn report_outcome(
    result: Result<RunSummary>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> ExitCode {
    match result {
        Ok(summary) => {
            let _ = match summary {
                RunSummary::Collected {
                    period,
                    merged,
                    total_minutes,
                } => writeln!(
                    out,
                    "Yesterday's overtime processed successfully: {merged} entries merged into {period} ({total_minutes} minutes)"
                ),
                RunSummary::Sent {
                    period,
                    artifact,
                    total_minutes,
                } => writeln!(
                    out,
                    "Report for {period} sent successfully: {} ({total_minutes} minutes)",
                    artifact.display()
                ),
            };
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Overtime report job failed: {:#}", e);
            let _ = writeln!(err, "Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<RunSummary> {
    let config = Config::from_env().context("Failed to load configuration")?;

    let client =
        kubernetes_client_init(&config.kubernetes).context("Failed to create Kubernetes client")?;
    let store = KubernetesStore::new(client, &config.kubernetes.api_url, &config.namespace);

    let renderer: Box<dyn ReportRenderer> = match config.report_format {
        ReportFormat::Xlsx => Box::new(XlsxRenderer::new(&config.output_dir)),
        ReportFormat::Csv => Box::new(CsvRenderer::new(&config.output_dir)),
    };

    let notifier = ResendNotifier::new(
        Resend::new(&config.resend_api_key),
        &config.sender_email,
        &config.recipient_email,
    );

    if config.testing_mode {
        info!("Running in test mode, sending the current month's report");
    }

    let service = OvertimeService::new(store, renderer, notifier, config.testing_mode);
    service.run(Utc::now()).await
}
