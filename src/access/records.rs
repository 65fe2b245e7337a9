use crate::error::AccessError;

use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Presence entry for a user this node owns. Never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccessRecord {
    pub first_seen_ms: u64,
    pub hits: u64,
}

/// How the owning node decides a user it is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Any numeric uid is granted and its visit recorded.
    Open,
    /// Only uids registered through `/register` are granted.
    RequireRecord,
}

impl FromStr for AccessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(AccessPolicy::Open),
            "record" | "require-record" => Ok(AccessPolicy::RequireRecord),
            other => Err(format!("unknown access policy `{}` (expected open|record)", other)),
        }
    }
}

/// Node-local record cache behind a readers-writer lock.
pub struct AccessRecords {
    records: RwLock<HashMap<i64, AccessRecord>>,
    policy: AccessPolicy,
}

impl AccessRecords {
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    /// Creates or refreshes the record for `uid`.
    pub async fn set_record(&self, uid: i64) {
        let mut records = self.records.write().await;
        records
            .entry(uid)
            .and_modify(|r| r.hits += 1)
            .or_insert_with(|| AccessRecord {
                first_seen_ms: now_ms(),
                hits: 1,
            });
    }

    pub async fn get_record(&self, uid: i64) -> Option<AccessRecord> {
        self.records.read().await.get(&uid).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Records a visit for a uid this node owns, under any policy.
    pub async fn register(&self, uid: &str) -> Result<(), AccessError> {
        self.set_record(parse_uid(uid)?).await;
        Ok(())
    }

    /// Applies the local policy to a uid this node owns.
    pub async fn check(&self, uid: &str) -> Result<(), AccessError> {
        let uid = parse_uid(uid)?;

        match self.policy {
            AccessPolicy::Open => {
                self.set_record(uid).await;
                Ok(())
            }
            AccessPolicy::RequireRecord => match self.get_record(uid).await {
                Some(_) => Ok(()),
                None => Err(AccessError::LocalDenied(uid)),
            },
        }
    }
}

fn parse_uid(uid: &str) -> Result<i64, AccessError> {
    uid.parse()
        .map_err(|_| AccessError::InvalidUid(uid.to_string()))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
