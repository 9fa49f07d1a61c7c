//! Renewable daily allowance for metered operations

use crate::env::storage::QUOTA_NAMESPACE;
use crate::storage::backend::KeyValueStore;
use crate::storage::types::{QuotaConfig, QuotaRecord};
use chrono::{Days, Local, NaiveDate};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Bonus units granted by each redemption code, matched case-insensitively
const REDEMPTION_CODES: &[(&str, u32)] = &[
    ("STUDIO5", 5),
    ("CREATOR10", 10),
    ("VIDEO25", 25),
];

/// Source of the local calendar date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    date: std::sync::Mutex<NaiveDate>,
}

impl ManualClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: std::sync::Mutex::new(date),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        if let Ok(mut current) = self.date.lock() {
            *current = date;
        }
    }

    pub fn advance_days(&self, days: u64) {
        if let Ok(mut current) = self.date.lock()
            && let Some(next) = current.checked_add_days(Days::new(days))
        {
            *current = next;
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        match self.date.lock() {
            Ok(date) => *date,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

pub struct QuotaManager {
    backend: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    daily_allotment: u32,
    record: Mutex<Option<QuotaRecord>>,
}

impl QuotaManager {
    pub fn new(backend: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: &QuotaConfig) -> Self {
        Self {
            backend,
            clock,
            daily_allotment: config.daily_allotment,
            record: Mutex::new(None),
        }
    }

    pub fn daily_allotment(&self) -> u32 {
        self.daily_allotment
    }

    /// Bonus granted by a redemption code, if the code is known
    pub fn bonus_for(code: &str) -> Option<u32> {
        let code = code.trim();
        REDEMPTION_CODES
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(code))
            .map(|(_, bonus)| *bonus)
    }

    /// Current record, after applying the daily reset
    pub async fn load(&self) -> QuotaRecord {
        let mut slot = self.record.lock().await;
        self.refresh(&mut slot).await
    }

    pub async fn peek(&self) -> u32 {
        self.load().await.remaining
    }

    /// Charge one unit; false without any change when nothing remains
    pub async fn consume(&self) -> bool {
        let mut slot = self.record.lock().await;
        let mut record = self.refresh(&mut slot).await;

        if record.remaining == 0 {
            debug!("Quota exhausted for {}", record.reset_date);
            return false;
        }

        record.remaining -= 1;
        self.persist(&record).await;
        debug!("Quota consumed, {} remaining", record.remaining);
        *slot = Some(record);
        true
    }

    pub async fn redeem(&self, code: &str) -> bool {
        let Some(bonus) = Self::bonus_for(code) else {
            debug!("Unknown redemption code");
            return false;
        };

        let mut slot = self.record.lock().await;
        let mut record = self.refresh(&mut slot).await;
        record.remaining = record.remaining.saturating_add(bonus);
        self.persist(&record).await;
        info!("Redeemed {} bonus units, {} remaining", bonus, record.remaining);
        *slot = Some(record);
        true
    }

    async fn refresh(&self, slot: &mut Option<QuotaRecord>) -> QuotaRecord {
        let today = self.clock.today().format("%Y-%m-%d").to_string();

        let stored = match slot.take() {
            Some(record) => Some(record),
            None => self.read_record().await,
        };

        let record = match stored {
            Some(record) if record.reset_date == today => record,
            stale => {
                if let Some(previous) = stale {
                    info!(
                        "New day {}, quota reset (was {} on {})",
                        today, previous.remaining, previous.reset_date
                    );
                }
                let fresh = QuotaRecord {
                    remaining: self.daily_allotment,
                    reset_date: today,
                };
                self.persist(&fresh).await;
                fresh
            }
        };

        *slot = Some(record.clone());
        record
    }

    async fn read_record(&self) -> Option<QuotaRecord> {
        match self.backend.read(QUOTA_NAMESPACE).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Ignoring corrupt quota record: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read quota record: {}", e);
                None
            }
        }
    }

    async fn persist(&self, record: &QuotaRecord) {
        let value = match serde_json::to_string(record) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize quota record: {}", e);
                return;
            }
        };
        if let Err(e) = self.backend.write(QUOTA_NAMESPACE, value).await {
            warn!("Quota change kept in memory only: {}", e);
        }
    }
}
