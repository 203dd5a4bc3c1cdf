//! SOS alert log.
//!
//! An append-only list of alerts for the lifetime of the process. Alerts are
//! not persisted and not scoped to any account: every caller sees every alert
//! raised in the current run.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// One raised alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SosEvent {
    /// Position in the log, starting at 1. Defines alert order.
    pub sequence: u64,
    /// Name of the child the alert was raised for.
    pub child_name: String,
    /// Wall-clock time the alert was raised.
    pub raised_at: DateTime<Utc>,
}

/// In-memory, append-only alert log.
#[derive(Debug, Default)]
pub struct AlertLog {
    events: Mutex<Vec<SosEvent>>,
}

impl AlertLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an alert and return it.
    pub fn raise_alert(&self, child_name: &str) -> SosEvent {
        let mut events = self.lock();
        let sequence = u64::try_from(events.len()).unwrap_or(u64::MAX).saturating_add(1);
        let event = SosEvent {
            sequence,
            child_name: child_name.to_string(),
            raised_at: Utc::now(),
        };
        events.push(event.clone());
        info!(sequence, child_name, "SOS alert raised");
        event
    }

    /// All alerts in the order they were raised.
    #[must_use]
    pub fn list_alerts(&self) -> Vec<SosEvent> {
        self.lock().clone()
    }

    /// Number of alerts raised.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if no alert has been raised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SosEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alerts_keep_raise_order() {
        let log = AlertLog::new();

        log.raise_alert("Timmy");
        log.raise_alert("Sue");

        let alerts = log.list_alerts();
        let names: Vec<&str> = alerts.iter().map(|e| e.child_name.as_str()).collect();
        assert_eq!(names, vec!["Timmy", "Sue"]);
        assert_eq!(alerts[0].sequence, 1);
        assert_eq!(alerts[1].sequence, 2);
    }

    #[test]
    fn test_alerts_are_not_deduplicated() {
        let log = AlertLog::new();

        log.raise_alert("Timmy");
        log.raise_alert("Timmy");

        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_empty_log() {
        let log = AlertLog::new();
        assert!(log.is_empty());
        assert!(log.list_alerts().is_empty());
    }

    #[test]
    fn test_raise_returns_event() {
        let log = AlertLog::new();
        let event = log.raise_alert("Sue");

        assert_eq!(event.child_name, "Sue");
        assert_eq!(event.sequence, 1);
        assert_eq!(log.list_alerts(), vec![event]);
    }

    #[test]
    fn test_event_serializes() {
        let log = AlertLog::new();
        let event = log.raise_alert("Timmy");
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("\"child_name\":\"Timmy\""));
        assert!(json.contains("\"sequence\":1"));
    }
}
