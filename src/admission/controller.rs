use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct AdmissionState {
    requests_seen: u64,
    granted: u64,
}

/// Point-in-time view of the gate counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdmissionSnapshot {
    pub requests_seen: u64,
    pub granted: u64,
    pub capacity: u64,
    pub stride: u64,
}

/// Hard inventory cap guarded by one mutex.
#[derive(Debug)]
pub struct AdmissionController {
    state: Mutex<AdmissionState>,
    capacity: u64,
    stride: u64,
}

impl AdmissionController {
    /// A stride of 0 is treated as 1 (no sampling).
    pub fn new(capacity: u64, stride: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(AdmissionState::default()),
            capacity,
            stride: stride.max(1),
        })
    }

    /// Never blocks beyond the O(1) critical section and always decides.
    pub fn try_admit(&self) -> bool {
        // The counters stay consistent even if a holder panicked.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.requests_seen += 1;

        if state.requests_seen % self.stride != 0 {
            return false;
        }
        if state.granted < self.capacity {
            state.granted += 1;
            tracing::debug!(
                "Granted unit {}/{} (request #{})",
                state.granted,
                self.capacity,
                state.requests_seen
            );
            return true;
        }
        false
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        AdmissionSnapshot {
            requests_seen: state.requests_seen,
            granted: state.granted,
            capacity: self.capacity,
            stride: self.stride,
        }
    }

    pub fn remaining(&self) -> u64 {
        let snapshot = self.snapshot();
        snapshot.capacity.saturating_sub(snapshot.granted)
    }
}
