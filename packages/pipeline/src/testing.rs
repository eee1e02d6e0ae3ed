//! Test doubles shared by the pipeline tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use index_claims_gateway::{DataGateway, DataService, GatewayError};
use index_claims_models::{GrowingSeason, IndexThresholds, PolicyRecord};
use switchy_database::Database;

/// A claims database in a fresh temp file, removed on drop.
pub struct TestStore {
    pub db: Arc<dyn Database>,
    path: PathBuf,
}

impl TestStore {
    pub async fn new() -> Self {
        let path = std::env::temp_dir().join(format!(
            "index_claims_pipeline_test_{}.db",
            uuid::Uuid::new_v4()
        ));
        let db = index_claims_database::db::open_db(&path).await.unwrap();
        Self {
            db: Arc::from(db),
            path,
        }
    }
}

impl Drop for TestStore {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Gateway with scripted outcomes and per-operation call counters.
///
/// Defaults: empty roster, thresholds `(0.15, 0.05)`, season `1..=36`,
/// index `0.10`.
pub struct MockGateway {
    roster: Result<Vec<PolicyRecord>, GatewayError>,
    thresholds: Result<IndexThresholds, GatewayError>,
    inactive_zones: Vec<i64>,
    season: Result<Option<GrowingSeason>, GatewayError>,
    index: Result<f64, GatewayError>,
    panic_on_index: bool,
    roster_calls: AtomicUsize,
    zone_calls: AtomicUsize,
    season_calls: AtomicUsize,
    index_calls: AtomicUsize,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            roster: Ok(Vec::new()),
            thresholds: Ok(IndexThresholds {
                trigger: 0.15,
                exit: 0.05,
            }),
            inactive_zones: Vec::new(),
            season: Ok(Some(GrowingSeason::new(1, 36))),
            index: Ok(0.10),
            panic_on_index: false,
            roster_calls: AtomicUsize::new(0),
            zone_calls: AtomicUsize::new(0),
            season_calls: AtomicUsize::new(0),
            index_calls: AtomicUsize::new(0),
        }
    }
}

impl MockGateway {
    pub fn with_roster(mut self, roster: Result<Vec<PolicyRecord>, GatewayError>) -> Self {
        self.roster = roster;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Result<IndexThresholds, GatewayError>) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_inactive_zone(mut self, zone_id: i64) -> Self {
        self.inactive_zones.push(zone_id);
        self
    }

    pub fn with_season(mut self, season: Result<Option<GrowingSeason>, GatewayError>) -> Self {
        self.season = season;
        self
    }

    pub fn with_index(mut self, index: Result<f64, GatewayError>) -> Self {
        self.index = index;
        self
    }

    pub const fn panicking_on_index(mut self) -> Self {
        self.panic_on_index = true;
        self
    }

    pub fn roster_calls(&self) -> usize {
        self.roster_calls.load(Ordering::SeqCst)
    }

    pub fn zone_calls(&self) -> usize {
        self.zone_calls.load(Ordering::SeqCst)
    }

    pub fn season_calls(&self) -> usize {
        self.season_calls.load(Ordering::SeqCst)
    }

    pub fn index_calls(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.roster_calls() + self.zone_calls() + self.season_calls() + self.index_calls()
    }
}

#[async_trait]
impl DataGateway for MockGateway {
    async fn fetch_policy_roster(&self) -> Result<Vec<PolicyRecord>, GatewayError> {
        self.roster_calls.fetch_add(1, Ordering::SeqCst);
        self.roster.clone()
    }

    async fn fetch_zone_period_config(
        &self,
        zone_id: i64,
        _period: i32,
    ) -> Result<IndexThresholds, GatewayError> {
        self.zone_calls.fetch_add(1, Ordering::SeqCst);
        if self.inactive_zones.contains(&zone_id) {
            return Ok(IndexThresholds::INACTIVE);
        }
        self.thresholds.clone()
    }

    async fn fetch_index(&self, _grid_id: i64, _period: i32) -> Result<f64, GatewayError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        assert!(!self.panic_on_index, "index service double asked to panic");
        self.index.clone()
    }

    async fn fetch_growing_season(
        &self,
        _grid_id: i64,
    ) -> Result<Option<GrowingSeason>, GatewayError> {
        self.season_calls.fetch_add(1, Ordering::SeqCst);
        self.season.clone()
    }
}

pub fn unavailable(service: DataService) -> GatewayError {
    GatewayError::Unavailable {
        service,
        message: "HTTP 503 Service Unavailable".to_string(),
    }
}

/// Crop policy in zone 12, grid 4410, insured for 10 000 per period.
pub const fn crop_record(policy_id: i64, period: i32) -> PolicyRecord {
    PolicyRecord {
        policy_id,
        customer_id: 7,
        company_id: 3,
        zone_id: 12,
        grid_id: 4410,
        period,
        product_type: 1,
        sum_insured: 10_000.0,
    }
}

/// Livestock policy in zone 12, grid 4410, insured for 2 000 per period.
pub const fn livestock_record(policy_id: i64, period: i32) -> PolicyRecord {
    PolicyRecord {
        policy_id,
        customer_id: 8,
        company_id: 3,
        zone_id: 12,
        grid_id: 4410,
        period,
        product_type: 2,
        sum_insured: 2_000.0,
    }
}
