//! [`DataGateway`] over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use index_claims_models::{GrowingSeason, IndexThresholds, PolicyRecord};

use crate::retry::{self, Fetched};
use crate::roster_cache::RosterCache;
use crate::{DataGateway, DataService, GatewayConfig, GatewayError, parsing};

/// Production gateway backed by a shared [`reqwest::Client`].
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
    roster_cache: Option<RosterCache>,
}

impl HttpGateway {
    /// Builds a gateway with the connect timeout from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| GatewayError::Unavailable {
                service: DataService::PolicyRoster,
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let roster_cache = config.roster_cache_ttl().map(RosterCache::new);

        log::info!(
            "HTTP gateway: policy={} config={} index={} retries={}",
            config.policy_service_url,
            config.config_service_url,
            config.index_service_url,
            config.max_retries
        );

        Ok(Self {
            client,
            config,
            roster_cache,
        })
    }

    /// The configuration this gateway was built with.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn get_json(
        &self,
        service: DataService,
        url: &str,
        timeout_secs: u64,
    ) -> Result<Fetched, GatewayError> {
        log::debug!("{service}: GET {url}");
        let timeout = Duration::from_secs(timeout_secs);
        retry::send_json(service, self.config.max_retries, || {
            self.client.get(url).timeout(timeout)
        })
        .await
    }

    async fn fetch_roster_uncached(&self) -> Result<Vec<PolicyRecord>, GatewayError> {
        let url = format!(
            "{}/api/policies/details",
            self.config.policy_service_url.trim_end_matches('/')
        );
        match self
            .get_json(DataService::PolicyRoster, &url, self.config.roster_timeout_secs)
            .await?
        {
            Fetched::Body(body) => parsing::parse_roster(&body),
            Fetched::NotFound => Err(not_found(DataService::PolicyRoster, &url)),
        }
    }
}

#[async_trait]
impl DataGateway for HttpGateway {
    async fn fetch_policy_roster(&self) -> Result<Vec<PolicyRecord>, GatewayError> {
        let records = match &self.roster_cache {
            Some(cache) => cache.get_or_fetch(|| self.fetch_roster_uncached()).await?,
            None => self.fetch_roster_uncached().await?,
        };
        log::info!("Fetched {} policies from roster", records.len());
        Ok(records)
    }

    async fn fetch_zone_period_config(
        &self,
        zone_id: i64,
        period: i32,
    ) -> Result<IndexThresholds, GatewayError> {
        let url = format!(
            "{}/api/v1/cps-zone/{zone_id}/{period}",
            self.config.config_service_url.trim_end_matches('/')
        );
        match self
            .get_json(DataService::ZoneConfig, &url, self.config.zone_config_timeout_secs)
            .await?
        {
            Fetched::Body(body) => parsing::parse_thresholds(&body),
            Fetched::NotFound => {
                log::debug!("No zone config for zone {zone_id} period {period}");
                Ok(IndexThresholds::INACTIVE)
            }
        }
    }

    async fn fetch_index(&self, grid_id: i64, period: i32) -> Result<f64, GatewayError> {
        let url = format!(
            "{}/api/v1/ndvi/{grid_id}/{period}",
            self.config.index_service_url.trim_end_matches('/')
        );
        match self
            .get_json(DataService::IndexReading, &url, self.config.index_timeout_secs)
            .await?
        {
            Fetched::Body(body) => parsing::parse_index(&body),
            Fetched::NotFound => Err(not_found(DataService::IndexReading, &url)),
        }
    }

    async fn fetch_growing_season(
        &self,
        grid_id: i64,
    ) -> Result<Option<GrowingSeason>, GatewayError> {
        let url = format!(
            "{}/api/v1/cps-zone/growing_season/{grid_id}",
            self.config.config_service_url.trim_end_matches('/')
        );
        match self
            .get_json(DataService::GrowingSeason, &url, self.config.season_timeout_secs)
            .await?
        {
            Fetched::Body(body) => parsing::parse_growing_season(&body),
            Fetched::NotFound => Ok(None),
        }
    }
}

fn not_found(service: DataService, url: &str) -> GatewayError {
    GatewayError::Unavailable {
        service,
        message: format!("HTTP 404 Not Found for {url}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    use super::*;

    /// Canned responses keyed by request path.
    fn canned(path: &str) -> (u16, &'static str) {
        match path {
            "/api/v1/cps-zone/2/5" => (200, r#"{"trigger_point": 0.5, "exit_point": 0.1}"#),
            "/api/v1/cps-zone/growing_season/2" => (200, "[3, 20]"),
            "/api/v1/ndvi/2/5" => (503, r#"{"detail": "warming up"}"#),
            "/api/v1/ndvi/3/5" => (200, "<html>gateway error</html>"),
            "/api/v1/ndvi/4/5" => (200, r#"{"ndvi_value": 0.3}"#),
            "/api/v1/ndvi/5/5" => (400, r#"{"detail": "bad grid"}"#),
            _ => (404, r#"{"detail": "Not Found"}"#),
        }
    }

    /// Serves [`canned`] responses on a local port and records every
    /// requested path.
    async fn spawn_service() -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let mut len = 0;
                while !buf[..len].windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf[len..]).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    len += n;
                }
                let request = String::from_utf8_lossy(&buf[..len]).to_string();
                let path = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default()
                    .to_string();
                seen.lock().unwrap().push(path.clone());

                let (status, body) = canned(&path);
                let response = format!(
                    "HTTP/1.1 {status} Canned\r\n\
                     content-type: application/json\r\n\
                     content-length: {}\r\n\
                     connection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (base_url, requests)
    }

    fn local_config(base_url: &str, max_retries: u32) -> GatewayConfig {
        GatewayConfig {
            policy_service_url: base_url.to_string(),
            config_service_url: base_url.to_string(),
            index_service_url: base_url.to_string(),
            connect_timeout_secs: 1,
            roster_timeout_secs: 5,
            zone_config_timeout_secs: 5,
            index_timeout_secs: 5,
            season_timeout_secs: 5,
            max_retries,
            roster_cache_ttl_secs: 0,
        }
    }

    fn hits(requests: &Mutex<Vec<String>>, path: &str) -> usize {
        requests.lock().unwrap().iter().filter(|p| *p == path).count()
    }

    #[tokio::test]
    async fn missing_zone_config_is_inactive_coverage() {
        let (base_url, _) = spawn_service().await;
        let gateway = HttpGateway::new(local_config(&base_url, 0)).unwrap();

        let thresholds = gateway.fetch_zone_period_config(1, 5).await.unwrap();
        assert_eq!(thresholds, IndexThresholds::INACTIVE);

        let thresholds = gateway.fetch_zone_period_config(2, 5).await.unwrap();
        assert_eq!(
            thresholds,
            IndexThresholds {
                trigger: 0.5,
                exit: 0.1,
            }
        );
    }

    #[tokio::test]
    async fn missing_growing_season_is_none() {
        let (base_url, _) = spawn_service().await;
        let gateway = HttpGateway::new(local_config(&base_url, 0)).unwrap();

        assert_eq!(gateway.fetch_growing_season(1).await.unwrap(), None);
        assert_eq!(
            gateway.fetch_growing_season(2).await.unwrap(),
            Some(GrowingSeason::new(3, 20))
        );
    }

    #[tokio::test]
    async fn index_statuses_map_to_gateway_errors() {
        let (base_url, _) = spawn_service().await;
        let gateway = HttpGateway::new(local_config(&base_url, 0)).unwrap();

        let missing = gateway.fetch_index(1, 5).await.unwrap_err();
        assert!(matches!(missing, GatewayError::Unavailable { .. }));
        assert_eq!(missing.service(), DataService::IndexReading);

        let outage = gateway.fetch_index(2, 5).await.unwrap_err();
        assert!(matches!(outage, GatewayError::Unavailable { .. }));
        assert!(outage.to_string().contains("503"));

        let not_json = gateway.fetch_index(3, 5).await.unwrap_err();
        assert!(not_json.is_malformed());

        let rejected = gateway.fetch_index(5, 5).await.unwrap_err();
        assert!(matches!(rejected, GatewayError::Unavailable { .. }));

        let value = gateway.fetch_index(4, 5).await.unwrap();
        assert!((value - 0.3).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn retries_server_errors_but_not_client_errors() {
        let (base_url, requests) = spawn_service().await;
        let gateway = HttpGateway::new(local_config(&base_url, 1)).unwrap();

        let outage = gateway.fetch_index(2, 5).await.unwrap_err();
        assert!(matches!(outage, GatewayError::Unavailable { .. }));
        assert_eq!(hits(&requests, "/api/v1/ndvi/2/5"), 2);

        gateway.fetch_index(1, 5).await.unwrap_err();
        assert_eq!(hits(&requests, "/api/v1/ndvi/1/5"), 1);

        gateway.fetch_index(5, 5).await.unwrap_err();
        assert_eq!(hits(&requests, "/api/v1/ndvi/5/5"), 1);

        gateway.fetch_index(3, 5).await.unwrap_err();
        assert_eq!(hits(&requests, "/api/v1/ndvi/3/5"), 1);
    }

    fn unreachable_config() -> GatewayConfig {
        GatewayConfig {
            policy_service_url: "http://127.0.0.1:9".to_string(),
            config_service_url: "http://127.0.0.1:9/".to_string(),
            index_service_url: "http://127.0.0.1:9".to_string(),
            connect_timeout_secs: 1,
            roster_timeout_secs: 1,
            zone_config_timeout_secs: 1,
            index_timeout_secs: 1,
            season_timeout_secs: 1,
            max_retries: 0,
            roster_cache_ttl_secs: 60,
        }
    }

    #[tokio::test]
    async fn unreachable_services_are_unavailable() {
        let gateway = HttpGateway::new(unreachable_config()).unwrap();

        let err = gateway.fetch_policy_roster().await.unwrap_err();
        assert_eq!(err.service(), DataService::PolicyRoster);
        assert!(!err.is_malformed());

        let err = gateway.fetch_zone_period_config(1, 1).await.unwrap_err();
        assert_eq!(err.service(), DataService::ZoneConfig);

        let err = gateway.fetch_index(1, 1).await.unwrap_err();
        assert_eq!(err.service(), DataService::IndexReading);

        let err = gateway.fetch_growing_season(1).await.unwrap_err();
        assert_eq!(err.service(), DataService::GrowingSeason);
    }
}
