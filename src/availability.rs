//! Bounded conflict search against the busy/free service.
//!
//! One explicit loop carries the attempt count and the candidate window, so
//! termination and accounting stay auditable. Step policy: on conflict the
//! window advances by its own duration to the next adjacent slot — a
//! 30-minute request slides in 30-minute steps.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

use crate::services::AvailabilityService;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub requested_start: DateTime<Utc>,
    pub requested_stop: DateTime<Utc>,
    /// Free slot when `success`; otherwise the next untried candidate,
    /// offered to the caller as a suggestion.
    pub final_start: DateTime<Utc>,
    pub final_stop: DateTime<Utc>,
    pub attempts: u32,
    pub success: bool,
    pub message: String,
}

pub struct AvailabilityResolver<'a> {
    service: &'a dyn AvailabilityService,
    call_timeout: Duration,
}

impl<'a> AvailabilityResolver<'a> {
    pub fn new(service: &'a dyn AvailabilityService, call_timeout: Duration) -> Self {
        Self { service, call_timeout }
    }

    pub async fn resolve(
        &self,
        participant_ids: &[String],
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        max_attempts: u32,
    ) -> AvailabilityResult {
        if participant_ids.is_empty() {
            return AvailabilityResult {
                requested_start: start,
                requested_stop: stop,
                final_start: start,
                final_stop: stop,
                attempts: 0,
                success: true,
                message: "aucun participant à vérifier".to_string(),
            };
        }

        let slot = stop - start;
        let mut window_start = start;
        let mut window_stop = stop;
        let mut attempts = 0;

        while attempts < max_attempts {
            attempts += 1;

            let busy = match timeout(
                self.call_timeout,
                self.service.is_busy(participant_ids, window_start, window_stop),
            )
            .await
            {
                Ok(Ok(busy)) => busy,
                Ok(Err(e)) => {
                    // A failed check cannot prove the slot free; it spends an
                    // attempt like a conflict would.
                    warn!("availability check {} failed: {}", attempts, e);
                    true
                }
                Err(_) => {
                    warn!("availability check {} timed out after {:?}", attempts, self.call_timeout);
                    true
                }
            };

            if !busy {
                debug!("slot {} - {} free on attempt {}", window_start, window_stop, attempts);
                return AvailabilityResult {
                    requested_start: start,
                    requested_stop: stop,
                    final_start: window_start,
                    final_stop: window_stop,
                    attempts,
                    success: true,
                    message: if window_start == start {
                        "créneau demandé disponible".to_string()
                    } else {
                        format!("créneau demandé occupé, créneau libre trouvé ({} essais)", attempts)
                    },
                };
            }

            debug!("slot {} - {} busy, shifting by {} min", window_start, window_stop, slot.num_minutes());
            window_start += slot;
            window_stop += slot;
        }

        AvailabilityResult {
            requested_start: start,
            requested_stop: stop,
            final_start: window_start,
            final_stop: window_stop,
            attempts,
            success: false,
            message: format!(
                "aucun créneau libre en {} essais; prochain créneau non vérifié proposé",
                attempts
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    enum Step {
        Busy,
        Free,
        Hang,
        Fail,
    }

    struct ScriptedAvailability {
        script: Mutex<Vec<Step>>,
    }

    impl ScriptedAvailability {
        fn new(steps: Vec<Step>) -> Self {
            Self { script: Mutex::new(steps) }
        }
    }

    #[async_trait]
    impl AvailabilityService for ScriptedAvailability {
        async fn is_busy(
            &self,
            _participant_ids: &[String],
            _start: DateTime<Utc>,
            _stop: DateTime<Utc>,
        ) -> Result<bool, ServiceError> {
            let step = self.script.lock().unwrap().remove(0);
            match step {
                Step::Busy => Ok(true),
                Step::Free => Ok(false),
                Step::Fail => Err(ServiceError::Transport("down".to_string())),
                Step::Hang => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(false)
                }
            }
        }
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2025, 1, 11, 14, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 11, 14, 30, 0).unwrap(),
        )
    }

    fn ids() -> Vec<String> {
        vec!["1".to_string(), "2".to_string()]
    }

    #[tokio::test]
    async fn test_free_on_third_attempt() {
        let service = ScriptedAvailability::new(vec![Step::Busy, Step::Busy, Step::Free]);
        let resolver = AvailabilityResolver::new(&service, Duration::from_secs(1));
        let (start, stop) = window();

        let result = resolver.resolve(&ids(), start, stop, 3).await;
        assert!(result.success);
        assert_eq!(result.attempts, 3);
        // Two shifts of the 30-minute slot.
        assert_eq!(result.final_start, start + chrono::Duration::minutes(60));
        assert_eq!(result.final_stop, stop + chrono::Duration::minutes(60));
        assert_eq!(result.requested_start, start);
    }

    #[tokio::test]
    async fn test_exhausted_after_max_attempts() {
        let service = ScriptedAvailability::new(vec![Step::Busy, Step::Busy, Step::Busy]);
        let resolver = AvailabilityResolver::new(&service, Duration::from_secs(1));
        let (start, stop) = window();

        let result = resolver.resolve(&ids(), start, stop, 3).await;
        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        // Suggestion points at the first untried slot.
        assert_eq!(result.final_start, start + chrono::Duration::minutes(90));
    }

    #[tokio::test]
    async fn test_empty_participants_short_circuits() {
        let service = ScriptedAvailability::new(Vec::new());
        let resolver = AvailabilityResolver::new(&service, Duration::from_secs(1));
        let (start, stop) = window();

        let result = resolver.resolve(&[], start, stop, 3).await;
        assert!(result.success);
        assert_eq!(result.attempts, 0);
        assert_eq!(result.final_start, start);
        assert_eq!(result.final_stop, stop);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_conflict() {
        let service = ScriptedAvailability::new(vec![Step::Hang, Step::Free]);
        let resolver = AvailabilityResolver::new(&service, Duration::from_millis(20));
        let (start, stop) = window();

        let result = resolver.resolve(&ids(), start, stop, 3).await;
        assert!(result.success);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.final_start, start + chrono::Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_service_failure_counts_as_conflict() {
        let service = ScriptedAvailability::new(vec![Step::Fail, Step::Free]);
        let resolver = AvailabilityResolver::new(&service, Duration::from_secs(1));
        let (start, stop) = window();

        let result = resolver.resolve(&ids(), start, stop, 3).await;
        assert!(result.success);
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn test_attempts_never_exceed_bound() {
        for max in 1..=4 {
            let service = ScriptedAvailability::new(vec![
                Step::Busy,
                Step::Busy,
                Step::Busy,
                Step::Busy,
            ]);
            let resolver = AvailabilityResolver::new(&service, Duration::from_secs(1));
            let (start, stop) = window();
            let result = resolver.resolve(&ids(), start, stop, max).await;
            assert!(result.attempts <= max);
            assert_eq!(result.attempts, max);
        }
    }
}
