//! Client minimal de l'API Docker Engine (HTTP).
//!
//! Seules trois routes sont utilisées : liste, inspection et logs. Les logs
//! d'un conteneur sans TTY arrivent multiplexés (en-tête de 8 octets par
//! trame), `demux_log_stream` les remet à plat.

use super::REQUEST_TIMEOUT;
use crate::config::RuntimeConf;
use crate::error::{MonitorError, MonitorResult};
use crate::probes::{ContainerInspect, ContainerRuntime, ContainerSummary};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListEntry {
    id: String,
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectBody {
    name: String,
    state: StateBody,
    #[serde(default)]
    restart_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateBody {
    status: String,
    running: bool,
    #[serde(default)]
    started_at: Option<String>,
    #[serde(default)]
    health: Option<HealthBody>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthBody {
    status: String,
}

pub struct DockerClient {
    http: reqwest::Client,
    base: Url,
}

impl DockerClient {
    pub fn new(conf: &RuntimeConf) -> MonitorResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base = Url::parse(&conf.endpoint).map_err(|e| {
            MonitorError::Connectivity(format!("invalid docker endpoint {}: {e}", conf.endpoint))
        })?;
        Ok(Self { http, base })
    }

    async fn get(&self, url: Url) -> MonitorResult<reqwest::Response> {
        let response = self.http.get(url.clone()).send().await?;
        match response.status() {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(not_found()),
            s => Err(MonitorError::Query(format!("docker api returned {s} for {}", url.path()))),
        }
    }
}

fn not_found() -> MonitorError {
    MonitorError::NotFound("Container not found".into())
}

/// Nom ou id de conteneur tel que Docker les accepte : `[a-zA-Z0-9][a-zA-Z0-9_.-]*`
fn is_container_ref(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Chaque segment est encodé séparément : un `/` ou un `?` dans un nom ne
/// peut pas changer la route appelée.
fn endpoint_url(base: &Url, segments: &[&str], query: &[(&str, &str)]) -> MonitorResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| MonitorError::Connectivity(format!("docker endpoint {base} has no path")))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// Docker renvoie "0001-01-01T00:00:00Z" pour un conteneur jamais démarré
fn parse_started_at(raw: Option<&str>) -> Option<OffsetDateTime> {
    raw.and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
        .filter(|t| t.year() > 1)
}

fn container_name(names: &[String]) -> Option<String> {
    names
        .first()
        .map(|n| n.trim_start_matches('/').to_string())
        .filter(|n| !n.is_empty())
}

/// Aplatit un flux de logs Docker en lignes.
///
/// Flux multiplexé : trames `[stream, 0, 0, 0, taille u32 big-endian]` suivies
/// de la charge utile. Tout autre contenu (conteneur avec TTY) est lu tel quel.
pub fn demux_log_stream(raw: &[u8]) -> Vec<String> {
    let multiplexed = raw.len() >= 8 && raw[0] <= 2 && raw[1..4] == [0, 0, 0];
    let mut text = Vec::with_capacity(raw.len());

    if multiplexed {
        let mut rest = raw;
        while rest.len() >= 8 {
            let size = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
            let end = (8 + size).min(rest.len());
            text.extend_from_slice(&rest[8..end]);
            rest = &rest[end..];
        }
    } else {
        text.extend_from_slice(raw);
    }

    String::from_utf8_lossy(&text)
        .lines()
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn list_containers(&self) -> MonitorResult<Vec<ContainerSummary>> {
        let url = endpoint_url(&self.base, &["containers", "json"], &[("all", "true")])?;
        let entries: Vec<ListEntry> = self.get(url).await?.json().await?;
        Ok(entries
            .into_iter()
            .filter_map(|e| container_name(&e.names).map(|name| ContainerSummary { id: e.id, name }))
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> MonitorResult<ContainerInspect> {
        if !is_container_ref(id) {
            return Err(not_found());
        }
        let url = endpoint_url(&self.base, &["containers", id, "json"], &[])?;
        let body: InspectBody = self.get(url).await?.json().await?;
        Ok(ContainerInspect {
            name: body.name.trim_start_matches('/').to_string(),
            started_at: parse_started_at(body.state.started_at.as_deref()),
            health_status: body.state.health.map(|h| h.status),
            state: body.state.status,
            running: body.state.running,
            restart_count: body.restart_count,
        })
    }

    async fn tail_logs(&self, name: &str, lines: usize) -> MonitorResult<Vec<String>> {
        if !is_container_ref(name) {
            return Err(not_found());
        }
        let tail = lines.to_string();
        let url = endpoint_url(
            &self.base,
            &["containers", name, "logs"],
            &[("stdout", "true"), ("stderr", "true"), ("tail", tail.as_str()), ("timestamps", "true")],
        )?;
        let raw = self.get(url).await?.bytes().await?;
        Ok(demux_log_stream(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(stream: u8, payload: &str) -> Vec<u8> {
        let mut out = vec![stream, 0, 0, 0];
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload.as_bytes());
        out
    }

    #[test]
    fn test_demux_multiplexed_stream() {
        let mut raw = frame(1, "2026-03-02T09:00:00Z started\n");
        raw.extend(frame(2, "2026-03-02T09:00:01Z warning: slow\n"));
        raw.extend(frame(1, "2026-03-02T09:00:02Z ready\n"));

        let lines = demux_log_stream(&raw);
        assert_eq!(
            lines,
            vec![
                "2026-03-02T09:00:00Z started",
                "2026-03-02T09:00:01Z warning: slow",
                "2026-03-02T09:00:02Z ready",
            ]
        );
    }

    #[test]
    fn test_demux_tty_stream_is_read_raw() {
        let raw = b"2026-03-02T09:00:00Z hello\n2026-03-02T09:00:01Z world\n";
        assert_eq!(demux_log_stream(raw).len(), 2);
        assert!(demux_log_stream(b"").is_empty());
    }

    #[test]
    fn test_demux_truncated_frame() {
        let mut raw = frame(1, "complete\n");
        raw.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 50]);
        raw.extend_from_slice(b"partial");
        assert_eq!(demux_log_stream(&raw), vec!["complete", "partial"]);
    }

    #[test]
    fn test_inspect_body_parsing() {
        let body = r#"{
            "Id": "abc", "Name": "/onlyoffice-mysql-server", "RestartCount": 2,
            "State": {"Status": "running", "Running": true,
                      "StartedAt": "2026-03-02T08:59:12.123456789Z",
                      "Health": {"Status": "healthy", "FailingStreak": 0}}
        }"#;
        let parsed: InspectBody = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.name, "/onlyoffice-mysql-server");
        assert_eq!(parsed.restart_count, 2);
        assert_eq!(parsed.state.health.map(|h| h.status).as_deref(), Some("healthy"));
        assert!(parse_started_at(parsed.state.started_at.as_deref()).is_some());
    }

    #[test]
    fn test_never_started_container() {
        assert_eq!(parse_started_at(Some("0001-01-01T00:00:00Z")), None);
        assert_eq!(parse_started_at(None), None);
        assert_eq!(container_name(&["/onlyoffice-mail-server".into()]).as_deref(), Some("onlyoffice-mail-server"));
        assert_eq!(container_name(&[]), None);
    }

    #[test]
    fn test_container_refs() {
        assert!(is_container_ref("onlyoffice-mysql-server"));
        assert!(is_container_ref("3f4e1c2a9b"));
        assert!(is_container_ref("svc_1.web-2"));
        assert!(!is_container_ref(""));
        assert!(!is_container_ref("-leading-dash"));
        assert!(!is_container_ref("onlyoffice-mysql-server/json?"));
        assert!(!is_container_ref("../../info"));
    }

    #[test]
    fn test_endpoint_url_encodes_each_segment() {
        let base = Url::parse("http://docker-proxy:2375").unwrap();
        let url = endpoint_url(
            &base,
            &["containers", "onlyoffice-mysql-server/json?", "logs"],
            &[("tail", "100")],
        )
        .unwrap();
        assert_eq!(url.path(), "/containers/onlyoffice-mysql-server%2Fjson%3F/logs");
        assert_eq!(url.query(), Some("tail=100"));

        let list = endpoint_url(&base, &["containers", "json"], &[("all", "true")]).unwrap();
        assert_eq!(list.as_str(), "http://docker-proxy:2375/containers/json?all=true");
        let inspect = endpoint_url(&base, &["containers", "abc", "json"], &[]).unwrap();
        assert_eq!(inspect.as_str(), "http://docker-proxy:2375/containers/abc/json");
    }

    #[tokio::test]
    async fn test_crafted_name_never_reaches_the_daemon() {
        // port fermé : toute requête réellement envoyée échouerait en Connectivity
        let client = DockerClient::new(&RuntimeConf { endpoint: "http://127.0.0.1:9".into() }).unwrap();
        for name in ["onlyoffice-mysql-server/json?", "x/../../info", "a?b"] {
            assert!(matches!(client.tail_logs(name, 100).await, Err(MonitorError::NotFound(_))));
            assert!(matches!(client.inspect_container(name).await, Err(MonitorError::NotFound(_))));
        }
    }
}
