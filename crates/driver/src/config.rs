//! Per-account driver settings.

use std::time::Duration;

use open115_protocol::StatusTable;
use open115_protocol::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, ROOT_FOLDER_ID};
use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// Settings stored alongside an account.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub access_token: String,
    pub refresh_token: String,
    pub root_folder_id: String,
    pub order_by: String,
    /// `"asc"` or `"desc"`.
    pub order_direction: String,
    /// Remote calls per second. Zero or negative disables limiting.
    pub limit_rate: f64,
    pub page_size: i64,
    /// Parts uploaded in parallel.
    pub part_concurrency: usize,
    pub part_retry: RetryConfig,
    pub upload_status: StatusTable,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            refresh_token: String::new(),
            root_folder_id: ROOT_FOLDER_ID.to_string(),
            order_by: "file_name".to_string(),
            order_direction: "asc".to_string(),
            limit_rate: 0.0,
            page_size: DEFAULT_PAGE_SIZE,
            part_concurrency: 1,
            part_retry: RetryConfig::default(),
            upload_status: StatusTable::default(),
        }
    }
}

impl DriverConfig {
    /// Returns a copy with defaults filled in and values clamped.
    pub fn normalized(mut self) -> Result<Self, DriverError> {
        if self.access_token.is_empty() && self.refresh_token.is_empty() {
            return Err(DriverError::Config("no access or refresh token".into()));
        }
        if self.root_folder_id.is_empty() {
            self.root_folder_id = ROOT_FOLDER_ID.to_string();
        }
        if self.order_by.is_empty() {
            self.order_by = "file_name".to_string();
        }
        self.order_direction = match self.order_direction.to_ascii_lowercase().as_str() {
            "" | "asc" => "asc".to_string(),
            "desc" => "desc".to_string(),
            other => {
                return Err(DriverError::Config(format!(
                    "order_direction must be asc or desc, got {other:?}"
                )));
            }
        };
        if !self.limit_rate.is_finite() || self.limit_rate < 0.0 {
            self.limit_rate = 0.0;
        }
        self.page_size = match self.page_size {
            n if n <= 0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        self.part_concurrency = self.part_concurrency.max(1);
        self.part_retry.max_attempts = self.part_retry.max_attempts.max(1);
        Ok(self)
    }

    pub fn ascending(&self) -> bool {
        self.order_direction == "asc"
    }
}

impl std::fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverConfig")
            .field("root_folder_id", &self.root_folder_id)
            .field("order_by", &self.order_by)
            .field("order_direction", &self.order_direction)
            .field("limit_rate", &self.limit_rate)
            .field("page_size", &self.page_size)
            .field("part_concurrency", &self.part_concurrency)
            .field("part_retry", &self.part_retry)
            .field("upload_status", &self.upload_status)
            .finish_non_exhaustive()
    }
}

/// Backoff policy for failed part uploads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per part, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    /// Backoff cap.
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculates the delay after a given failed attempt (1-based),
    /// with ±25% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let unit = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / 1_000_000_000.0;
        jittered(capped, unit)
    }
}

/// Spreads `secs` by ±25%. `unit` in `[0.0, 1.0)` maps linearly onto the window.
fn jittered(secs: f64, unit: f64) -> Duration {
    let offset = unit.clamp(0.0, 1.0) * 2.0 - 1.0;
    Duration::from_secs_f64((secs + secs * 0.25 * offset).max(0.0))
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
