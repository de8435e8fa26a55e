use super::REQUEST_TIMEOUT;
use crate::config::SearchConf;
use crate::error::{MonitorError, MonitorResult};
use crate::probes::{ClusterHealth, SearchCluster};
use async_trait::async_trait;

pub struct ElasticClient {
    http: reqwest::Client,
    url: String,
}

impl ElasticClient {
    pub fn new(conf: &SearchConf) -> MonitorResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, url: health_url(&conf.host) })
    }
}

fn health_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}/_cluster/health")
    } else {
        format!("http://{host}/_cluster/health")
    }
}

#[async_trait]
impl SearchCluster for ElasticClient {
    async fn cluster_health(&self) -> MonitorResult<ClusterHealth> {
        let response = self.http.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(MonitorError::Query(format!(
                "cluster health returned {}",
                response.status()
            )));
        }
        Ok(response.json::<ClusterHealth>().await?)
    }
}
