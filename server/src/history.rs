//! In-memory detection history
//!
//! Per-user detection records and running statistics. Only successful
//! detections are recorded; the failure result never reaches this store.
//!
//! Storage is bounded: each user keeps their newest records up to
//! `max_records_per_user`, and past `max_users` the least recently active
//! user is evicted. Statistics keep counting records that were dropped.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crop_disease::PredictionResult;

/// Number of entries in the activity timeline
pub const TIMELINE_LEN: usize = 10;

/// Storage bounds of the history
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryLimits {
    pub max_records_per_user: usize,
    pub max_users: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_records_per_user: 100,
            max_users: 10_000,
        }
    }
}

/// A stored detection
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DetectionRecord {
    pub id: String,
    pub crop: String,
    pub disease: String,
    pub confidence: f32,
    pub is_healthy: bool,
    pub treatment: String,
    pub class_index: i32,
    pub timestamp: DateTime<Utc>,
}

/// Running counts for one user
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UserStatistics {
    pub total_scans: u64,
    pub diseased_plants: u64,
    pub healthy_plants: u64,
    /// Time of the last recorded detection; `None` before the first one
    pub last_updated: Option<DateTime<Utc>>,
}

impl UserStatistics {
    fn update(&mut self, record: &DetectionRecord) {
        self.total_scans += 1;
        if record.is_healthy {
            self.healthy_plants += 1;
        } else {
            self.diseased_plants += 1;
        }
        self.last_updated = Some(record.timestamp);
    }
}

/// One entry of the activity timeline
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub description: String,
    pub crop: String,
    pub disease: String,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl From<&DetectionRecord> for ActivityEntry {
    fn from(record: &DetectionRecord) -> Self {
        Self {
            id: record.id.clone(),
            activity_type: "detection".to_string(),
            description: format!("Detected {} in {}", record.disease, record.crop),
            crop: record.crop.clone(),
            disease: record.disease.clone(),
            confidence: record.confidence,
            timestamp: record.timestamp,
        }
    }
}

#[derive(Default)]
struct UserHistory {
    /// Oldest first
    records: VecDeque<DetectionRecord>,
    statistics: UserStatistics,
    /// Value of `Users::clock` at the last record
    last_active: u64,
}

#[derive(Default)]
struct Users {
    by_id: HashMap<String, UserHistory>,
    clock: u64,
}

impl Users {
    /// Drop the least recently active user
    fn evict_idle(&mut self) {
        let idle = self
            .by_id
            .iter()
            .min_by_key(|(_, history)| history.last_active)
            .map(|(id, _)| id.clone());

        if let Some(id) = idle {
            debug!(user = %id, "Evicting idle user from detection history");
            self.by_id.remove(&id);
        }
    }
}

/// Detection history keyed by user id
#[derive(Default)]
pub struct DetectionHistory {
    users: RwLock<Users>,
    limits: HistoryLimits,
}

impl DetectionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History with explicit storage bounds; zero limits are raised to one
    pub fn with_limits(limits: HistoryLimits) -> Self {
        Self {
            users: RwLock::default(),
            limits: HistoryLimits {
                max_records_per_user: limits.max_records_per_user.max(1),
                max_users: limits.max_users.max(1),
            },
        }
    }

    /// Store a successful detection for `user_id` and update their statistics
    pub async fn record(&self, user_id: &str, result: &PredictionResult) -> DetectionRecord {
        let record = DetectionRecord {
            id: Uuid::new_v4().to_string(),
            crop: result.crop.clone(),
            disease: result.disease.clone(),
            confidence: result.confidence,
            is_healthy: result.is_healthy,
            treatment: result.treatment.clone(),
            class_index: result.class_index,
            timestamp: Utc::now(),
        };

        let mut users = self.users.write().await;
        users.clock += 1;
        let clock = users.clock;

        if !users.by_id.contains_key(user_id) && users.by_id.len() >= self.limits.max_users {
            users.evict_idle();
        }

        let entry = users.by_id.entry(user_id.to_string()).or_default();
        entry.statistics.update(&record);
        entry.last_active = clock;
        entry.records.push_back(record.clone());
        while entry.records.len() > self.limits.max_records_per_user {
            entry.records.pop_front();
        }

        record
    }

    /// Retained records for `user_id`, newest first
    pub async fn history(&self, user_id: &str) -> Vec<DetectionRecord> {
        let users = self.users.read().await;
        users
            .by_id
            .get(user_id)
            .map(|h| h.records.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn statistics(&self, user_id: &str) -> UserStatistics {
        let users = self.users.read().await;
        users
            .by_id
            .get(user_id)
            .map(|h| h.statistics.clone())
            .unwrap_or_default()
    }

    /// The most recent detections as timeline entries, newest first
    pub async fn timeline(&self, user_id: &str) -> Vec<ActivityEntry> {
        let users = self.users.read().await;
        users
            .by_id
            .get(user_id)
            .map(|h| {
                h.records
                    .iter()
                    .rev()
                    .take(TIMELINE_LEN)
                    .map(ActivityEntry::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}
