use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::{Error, Result};

pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
pub const DEFAULT_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Output format of the rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Xlsx,
    Csv,
}

impl FromStr for ReportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Ok(Self::Xlsx),
            "csv" => Ok(Self::Csv),
            other => Err(Error::config(format!(
                "REPORT_FORMAT must be xlsx or csv, got {other:?}"
            ))),
        }
    }
}

/// Where and how to reach the cluster API from inside a pod.
#[derive(Debug, Clone)]
pub struct KubernetesConfig {
    pub api_url: String,
    pub token_path: PathBuf,
    pub ca_path: PathBuf,
}

/// Settings for one invocation, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub namespace: String,
    pub sender_email: String,
    pub recipient_email: String,
    pub resend_api_key: String,
    pub testing_mode: bool,
    pub report_format: ReportFormat,
    pub output_dir: PathBuf,
    pub kubernetes: KubernetesConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| Error::config(format!("{key} environment variable is required")))
        };

        let api_url = match get("KUBERNETES_API_URL") {
            Some(url) => url,
            None => match (get("KUBERNETES_SERVICE_HOST"), get("KUBERNETES_SERVICE_PORT")) {
                (Some(host), port) => {
                    format!("https://{}:{}", host, port.as_deref().unwrap_or("443"))
                }
                (None, _) => {
                    return Err(Error::config(
                        "KUBERNETES_API_URL or KUBERNETES_SERVICE_HOST must be set",
                    ));
                }
            },
        };

        let config = Self {
            namespace: get("NAMESPACE").unwrap_or_else(|| "default".to_string()),
            sender_email: required("SENDER_EMAIL")?,
            recipient_email: required("RECIPIENT_EMAIL")?,
            resend_api_key: required("RESEND_API_KEY")?,
            testing_mode: get("TESTING").is_some_and(|value| value == "true"),
            report_format: get("REPORT_FORMAT")
                .map(|value| value.parse())
                .transpose()?
                .unwrap_or(ReportFormat::Xlsx),
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            kubernetes: KubernetesConfig {
                api_url,
                token_path: get("KUBERNETES_TOKEN_PATH")
                    .unwrap_or_else(|| DEFAULT_TOKEN_PATH.to_string())
                    .into(),
                ca_path: get("KUBERNETES_CA_PATH")
                    .unwrap_or_else(|| DEFAULT_CA_PATH.to_string())
                    .into(),
            },
        };

        config.trace_loaded();
        Ok(config)
    }

    fn trace_loaded(&self) {
        info!(
            namespace = %self.namespace,
            recipient = %self.recipient_email,
            testing_mode = self.testing_mode,
            report_format = ?self.report_format,
            "Loaded Config"
        );
        debug!(
            api_url = %self.kubernetes.api_url,
            output_dir = %self.output_dir.display(),
            "Config loaded (details)"
        );
    }
}
