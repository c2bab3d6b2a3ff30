use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Certificate, Client, RequestBuilder, Response, header};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::config::KubernetesConfig;
use crate::error::{Error, Result};
use crate::models::kubernetes::{ConfigMap, ConfigMapList};
use crate::models::overtime::{Entry, Report};
use crate::store::{OvertimeStore, report_key};

pub const OVERTIME_SELECTOR: &str = "app=overtime";

/// Builds an API client authenticated with the pod's service account.
pub fn kubernetes_client_init(config: &KubernetesConfig) -> Result<Client> {
    info!("Initializing Kubernetes client");

    let token = std::fs::read_to_string(&config.token_path).map_err(|e| {
        error!(path = %config.token_path.display(), "Failed to read service account token: {}", e);
        Error::config(format!(
            "cannot read service account token {}: {}",
            config.token_path.display(),
            e
        ))
    })?;

    let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", token.trim()))
        .map_err(|e| {
            error!("Failed to create Authorization header value: {}", e);
            Error::config(format!("invalid service account token: {}", e))
        })?;
    auth.set_sensitive(true);

    let mut headers = header::HeaderMap::new();
    headers.insert(header::AUTHORIZATION, auth);
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );

    let mut builder = Client::builder().default_headers(headers);

    match std::fs::read(&config.ca_path) {
        Ok(pem) => {
            let cert = Certificate::from_pem(&pem).map_err(|e| {
                error!("Failed to parse cluster CA certificate: {}", e);
                Error::config(format!("invalid cluster CA {}: {}", config.ca_path.display(), e))
            })?;
            builder = builder.add_root_certificate(cert);
        }
        Err(e) => {
            warn!(path = %config.ca_path.display(), "Cluster CA not readable, using system roots: {}", e);
        }
    }

    info!("Building Kubernetes client with headers");
    builder.build().map_err(|e| {
        error!("Failed to build Kubernetes client: {}", e);
        Error::config(format!("failed to build HTTP client: {}", e))
    })
}

/// Overtime records and merged reports kept as ConfigMaps in one namespace.
pub struct KubernetesStore {
    client: Client,
    api_url: String,
    namespace: String,
}

impl KubernetesStore {
    pub fn new(client: Client, api_url: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            namespace: namespace.into(),
        }
    }

    fn configmaps_url(&self) -> String {
        format!(
            "{}/api/v1/namespaces/{}/configmaps",
            self.api_url, self.namespace
        )
    }

    fn configmap_url(&self, name: &str) -> String {
        format!("{}/{}", self.configmaps_url(), name)
    }

    pub async fn list_overtime_records(&self) -> Result<Vec<ConfigMap>> {
        let url = self.configmaps_url();
        info!(namespace = %self.namespace, "Listing ConfigMaps with selector {}", OVERTIME_SELECTOR);

        let request = self
            .client
            .get(&url)
            .query(&[("labelSelector", OVERTIME_SELECTOR)]);
        let list: ConfigMapList = read_json(send(request, &url).await?).await?;

        info!("Found {} overtime ConfigMaps", list.items.len());
        Ok(list.items)
    }

    pub async fn get_configmap(&self, name: &str) -> Result<ConfigMap> {
        let url = self.configmap_url(name);
        debug!("Getting ConfigMap {}", name);

        read_json(send(self.client.get(&url), &url).await?).await
    }

    async fn create_configmap(&self, configmap: &ConfigMap) -> Result<ConfigMap> {
        let url = self.configmaps_url();
        info!("Creating ConfigMap {}", configmap);

        read_json(send(self.client.post(&url).json(configmap), &url).await?).await
    }

    async fn replace_configmap(&self, name: &str, configmap: &ConfigMap) -> Result<ConfigMap> {
        let url = self.configmap_url(name);
        info!("Replacing ConfigMap {}", configmap);

        read_json(send(self.client.put(&url).json(configmap), &url).await?).await
    }
}

#[async_trait]
impl OvertimeStore for KubernetesStore {
    async fn fetch_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();

        for record in self.list_overtime_records().await? {
            match record.metadata.creation_timestamp {
                Some(created) if created >= start && created <= end => {}
                Some(_) => continue,
                None => {
                    warn!(%record, "Skipping overtime record without creation timestamp");
                    continue;
                }
            }

            match record.entries() {
                Some(found) => {
                    debug!(%record, count = found.len(), "Decoded overtime record");
                    entries.extend(found);
                }
                None => warn!(%record, "Skipping overtime record without ticket or minute data"),
            }
        }

        info!(%start, %end, "Fetched {} overtime entries", entries.len());
        Ok(entries)
    }

    async fn load_report(&self, period: &str) -> Result<Report> {
        let name = report_key(period);

        match self.get_configmap(&name).await {
            Ok(stored) => {
                let report = stored.to_report(period);
                info!(
                    "Loaded merged report {} with {} entries",
                    name,
                    report.lines().len()
                );
                Ok(report)
            }
            Err(e) if e.is_not_found() => {
                info!("No merged report {} yet, starting empty", name);
                Ok(Report::new(period))
            }
            Err(e) => {
                error!("Failed to load merged report {}: {}", name, e);
                Err(e)
            }
        }
    }

    async fn save_report(&self, report: &Report) -> Result<()> {
        let name = report_key(report.period());
        let desired = ConfigMap::from_report(name.clone(), report);

        match self.get_configmap(&name).await {
            Ok(existing) => {
                let updated = ConfigMap {
                    data: desired.data,
                    ..existing
                };
                self.replace_configmap(&name, &updated).await?;
            }
            Err(e) if e.is_not_found() => {
                self.create_configmap(&desired).await?;
            }
            Err(e) => {
                error!("Failed to look up merged report {}: {}", name, e);
                return Err(e);
            }
        }

        info!(
            "Saved merged report {} with {} entries ({} minutes)",
            name,
            report.lines().len(),
            report.total_minutes()
        );
        Ok(())
    }
}

async fn send(request: RequestBuilder, url: &str) -> Result<Response> {
    let response = request.send().await.map_err(|e| {
        error!("Failed to send request to Kubernetes API: {}", e);
        Error::Http {
            url: url.to_string(),
            source: e,
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    if status != reqwest::StatusCode::NOT_FOUND {
        error!("Kubernetes API returned error status {}: {}", status, body);
    }
    Err(Error::Api {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().await.map_err(|e| {
        error!("Failed to read response body: {}", e);
        Error::Decode(e.to_string())
    })?;

    serde_json::from_str(&text).map_err(|e| {
        error!("Failed to parse Kubernetes response: {}", e);
        debug!("Raw response: {}", text);
        Error::Decode(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use mockito::{Matcher, Server};
    use serde_json::json;

    const LIST_PATH: &str = "/api/v1/namespaces/overtime/configmaps";
    const MERGED_PATH: &str = "/api/v1/namespaces/overtime/configmaps/mar-2024-overtime-merged";

    fn store(server: &Server) -> KubernetesStore {
        KubernetesStore::new(Client::new(), server.url(), "overtime")
    }

    fn record(name: &str, created: &str, tickets: &str, minutes: &str) -> serde_json::Value {
        json!({
            "metadata": {"name": name, "creationTimestamp": created, "labels": {"app": "overtime"}},
            "data": {"ticket_url": tickets, "minutes": minutes}
        })
    }

    #[tokio::test]
    async fn fetches_entries_within_window() {
        let mut server = Server::new_async().await;
        let body = json!({
            "items": [
                record("ot-1", "2024-03-14T09:00:00Z", "T1\nT2", "90\n60"),
                record("ot-2", "2024-03-13T23:59:59Z", "OLD", "10"),
                record("ot-3", "2024-03-14T23:00:00Z", "T3\nT4\nT5", "abc\n5"),
                {"metadata": {"name": "ot-4", "creationTimestamp": "2024-03-14T10:00:00Z"}, "data": {"ticket_url": "T6"}}
            ]
        });
        let mock = server
            .mock("GET", LIST_PATH)
            .match_query(Matcher::UrlEncoded(
                "labelSelector".into(),
                "app=overtime".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let start = Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap();
        let end = start + Duration::days(1) - Duration::nanoseconds(1);
        let entries = store(&server).fetch_entries(start, end).await.unwrap();

        mock.assert_async().await;
        let got: Vec<(&str, u32)> = entries
            .iter()
            .map(|e| (e.ticket.as_str(), e.minutes))
            .collect();
        assert_eq!(got, [("T1", 90), ("T2", 60), ("T3", 0), ("T4", 5)]);
    }

    #[tokio::test]
    async fn list_failure_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", LIST_PATH)
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let start = Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap();
        let result = store(&server).fetch_entries(start, start).await;

        assert!(matches!(result, Err(Error::Api { status: 403, .. })));
    }

    #[tokio::test]
    async fn missing_report_loads_empty() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", MERGED_PATH)
            .with_status(404)
            .with_body(r#"{"kind":"Status","reason":"NotFound"}"#)
            .create_async()
            .await;

        let report = store(&server).load_report("Mar-2024").await.unwrap();

        assert_eq!(report.period(), "Mar-2024");
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn loads_report_by_lowercased_name() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", MERGED_PATH)
            .with_status(200)
            .with_body(
                json!({
                    "metadata": {"name": "mar-2024-overtime-merged", "resourceVersion": "7"},
                    "data": {"ticket_url": "T1\nT2", "minutes": "90\n60"}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let report = store(&server).load_report("Mar-2024").await.unwrap();

        assert_eq!(report.period(), "Mar-2024");
        assert_eq!(report.lines().len(), 2);
        assert_eq!(report.total_minutes(), 150);
    }

    #[tokio::test]
    async fn save_creates_missing_report() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", MERGED_PATH)
            .with_status(404)
            .create_async()
            .await;
        let create = server
            .mock("POST", LIST_PATH)
            .match_body(Matcher::PartialJson(json!({
                "metadata": {"name": "mar-2024-overtime-merged"},
                "data": {"ticket_url": "T1\nT2", "minutes": "90\n60"}
            })))
            .with_status(201)
            .with_body(json!({"metadata": {"name": "mar-2024-overtime-merged"}}).to_string())
            .create_async()
            .await;

        let mut report = Report::new("Mar-2024");
        report.append("T1", 90);
        report.append("T2", 60);
        store(&server).save_report(&report).await.unwrap();

        create.assert_async().await;
    }

    #[tokio::test]
    async fn save_replaces_existing_report() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", MERGED_PATH)
            .with_status(200)
            .with_body(
                json!({
                    "metadata": {"name": "mar-2024-overtime-merged", "resourceVersion": "7"},
                    "data": {"ticket_url": "OLD", "minutes": "1"}
                })
                .to_string(),
            )
            .create_async()
            .await;
        let replace = server
            .mock("PUT", MERGED_PATH)
            .match_body(Matcher::PartialJson(json!({
                "metadata": {"resourceVersion": "7"},
                "data": {"ticket_url": "T1", "minutes": "90"}
            })))
            .with_status(200)
            .with_body(json!({"metadata": {"name": "mar-2024-overtime-merged"}}).to_string())
            .create_async()
            .await;

        let mut report = Report::new("Mar-2024");
        report.append("T1", 90);
        store(&server).save_report(&report).await.unwrap();

        replace.assert_async().await;
    }

    #[tokio::test]
    async fn save_failure_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", MERGED_PATH)
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("POST", LIST_PATH)
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let result = store(&server).save_report(&Report::new("Mar-2024")).await;

        assert!(matches!(result, Err(Error::Api { status: 500, .. })));
    }
}
