use std::env;
use std::path::PathBuf;
use std::time::Duration;

use foundation::math::GeoCoord;
use tracing::warn;
use workflow::{AnalyzeTiming, OrchestratorConfig, RingOrder};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_TOKEN_FILE: &str = ".farmmap/tokens.json";

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub token_file: PathBuf,
    pub http_timeout: Duration,
    pub spin_secs: f64,
    pub spin_max_secs: f64,
    pub farm_altitude_m: f64,
    pub ring_order: RingOrder,
    pub analyze: AnalyzeTiming,
    /// Where `locate` reports the device to be. Unset means geolocation is unavailable.
    pub home: Option<GeoCoord>,
}

impl Config {
    pub fn from_env() -> Self {
        let home = match (env::var("FARMMAP_HOME_LAT"), env::var("FARMMAP_HOME_LON")) {
            (Ok(lat), Ok(lon)) => parse_lat_lon(&format!("{lat},{lon}")).ok(),
            _ => None,
        };
        Self {
            api_base_url: env::var("FARMMAP_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            token_file: env::var("FARMMAP_TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOKEN_FILE)),
            http_timeout: Duration::from_secs(env_var_u64("FARMMAP_HTTP_TIMEOUT_SECS", 60)),
            spin_secs: env_var_f64("FARMMAP_SPIN_SECS", 8.0),
            spin_max_secs: env_var_f64("FARMMAP_SPIN_MAX_SECS", 30.0),
            farm_altitude_m: env_var_f64("FARMMAP_FARM_ALTITUDE_M", 1_500.0),
            ring_order: env_var_parsed("FARMMAP_RING_ORDER", RingOrder::Angular),
            analyze: env_var_parsed("FARMMAP_ANALYZE", AnalyzeTiming::Deferred),
            home,
        }
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        let defaults = OrchestratorConfig::default();
        let spin_duration = secs_or(self.spin_secs, defaults.spin_duration);
        OrchestratorConfig {
            spin_duration,
            spin_max: secs_or(self.spin_max_secs, defaults.spin_max).max(spin_duration),
            farm_altitude_m: self.farm_altitude_m,
            timing: self.analyze,
            ..defaults
        }
    }
}

/// Parses `"lat,lon"` in degrees.
pub fn parse_lat_lon(s: &str) -> Result<GeoCoord, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{s}'"))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("invalid latitude '{lat}'"))?;
    let lon: f64 = lon.trim().parse().map_err(|_| format!("invalid longitude '{lon}'"))?;
    let coord = GeoCoord::new(lat, lon);
    if !coord.is_valid() {
        return Err(format!("coordinate out of range: {lat},{lon}"));
    }
    Ok(coord)
}

fn secs_or(secs: f64, default: Duration) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(default)
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_parsed<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr<Err = String>,
{
    match env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|err| {
            warn!(key, error = %err, "ignoring invalid setting");
            default
        }),
        Err(_) => default,
    }
}
