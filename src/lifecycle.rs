// Restart policy handling
//
// Tracks consecutive restarts and decides whether a finished run should be
// relaunched. The delay before each attempt is fixed; there is no backoff.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ProcessSpec;

/// Restart policy derived from the process declaration
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    pub autorestart: bool,
    pub max_restarts: u32,
    pub restart_delay: Duration,
    pub min_uptime: Duration,
}

impl RestartPolicy {
    pub fn from_spec(spec: &ProcessSpec) -> Self {
        Self {
            autorestart: spec.autorestart,
            max_restarts: spec.max_restarts,
            restart_delay: spec.restart_delay,
            min_uptime: spec.min_uptime,
        }
    }
}

/// Outcome of applying the restart policy to a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Relaunch after the fixed restart delay
    Restart,
    /// Autorestart is disabled, leave the process stopped
    Stay,
    /// The consecutive-restart cap is exhausted
    GiveUp,
}

/// Manages restart accounting for one supervised process
#[derive(Debug, Clone)]
pub struct ProcessLifecycle {
    name: String,
    policy: RestartPolicy,
    consecutive_restarts: u32,
    total_restarts: u32,
    last_restart_time: Option<DateTime<Utc>>,
}

impl ProcessLifecycle {
    pub fn new(name: impl Into<String>, policy: RestartPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            consecutive_restarts: 0,
            total_restarts: 0,
            last_restart_time: None,
        }
    }

    /// Account for a finished run.
    ///
    /// A run that lasted at least min_uptime counts as stable and resets the
    /// consecutive-restart counter, so the cap only applies to rapid failure
    /// loops.
    pub fn record_exit(&mut self, uptime: Duration) {
        if uptime >= self.policy.min_uptime && self.consecutive_restarts > 0 {
            debug!(
                "Process {} ran for {:?}, resetting consecutive restart counter",
                self.name, uptime
            );
            self.consecutive_restarts = 0;
        }
    }

    /// Decide what happens after an unexpected exit
    pub fn evaluate(&mut self) -> RestartDecision {
        if !self.policy.autorestart {
            debug!("Autorestart disabled for process: {}", self.name);
            return RestartDecision::Stay;
        }

        if self.consecutive_restarts >= self.policy.max_restarts {
            warn!(
                "Process {} has exceeded maximum restart attempts ({}/{})",
                self.name, self.consecutive_restarts, self.policy.max_restarts
            );
            return RestartDecision::GiveUp;
        }

        info!(
            "Restarting process {} in {:?} (attempt {}/{})",
            self.name,
            self.policy.restart_delay,
            self.consecutive_restarts + 1,
            self.policy.max_restarts
        );

        self.consecutive_restarts += 1;
        self.total_restarts += 1;
        self.last_restart_time = Some(Utc::now());
        RestartDecision::Restart
    }

    /// Fixed delay preceding the next restart attempt
    pub fn restart_delay(&self) -> Duration {
        self.policy.restart_delay
    }

    pub fn max_restarts(&self) -> u32 {
        self.policy.max_restarts
    }

    /// Get restart statistics
    pub fn stats(&self) -> RestartStats {
        RestartStats {
            consecutive_restarts: self.consecutive_restarts,
            total_restarts: self.total_restarts,
            last_restart_time: self.last_restart_time,
        }
    }
}

/// Restart statistics for status reporting
#[derive(Debug, Clone)]
pub struct RestartStats {
    pub consecutive_restarts: u32,
    pub total_restarts: u32,
    pub last_restart_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_policy() -> RestartPolicy {
        RestartPolicy {
            autorestart: true,
            max_restarts: 3,
            restart_delay: Duration::from_secs(1),
            min_uptime: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_restart_until_cap() {
        let mut lifecycle = ProcessLifecycle::new("test", create_test_policy());

        // First 3 attempts should be approved
        for i in 1..=3 {
            assert_eq!(lifecycle.evaluate(), RestartDecision::Restart);
            assert_eq!(lifecycle.stats().consecutive_restarts, i);
        }

        // 4th attempt should be refused
        assert_eq!(lifecycle.evaluate(), RestartDecision::GiveUp);
        assert_eq!(lifecycle.stats().total_restarts, 3);
    }

    #[test]
    fn test_autorestart_disabled() {
        let mut policy = create_test_policy();
        policy.autorestart = false;
        let mut lifecycle = ProcessLifecycle::new("test", policy);

        assert_eq!(lifecycle.evaluate(), RestartDecision::Stay);
        assert_eq!(lifecycle.stats().total_restarts, 0);
    }

    #[test]
    fn test_stable_run_resets_consecutive_counter() {
        let mut lifecycle = ProcessLifecycle::new("test", create_test_policy());

        assert_eq!(lifecycle.evaluate(), RestartDecision::Restart);
        assert_eq!(lifecycle.evaluate(), RestartDecision::Restart);
        assert_eq!(lifecycle.stats().consecutive_restarts, 2);

        // A run past min_uptime resets the consecutive counter only
        lifecycle.record_exit(Duration::from_secs(2));
        assert_eq!(lifecycle.stats().consecutive_restarts, 0);
        assert_eq!(lifecycle.stats().total_restarts, 2);

        // A short run does not
        assert_eq!(lifecycle.evaluate(), RestartDecision::Restart);
        lifecycle.record_exit(Duration::from_millis(10));
        assert_eq!(lifecycle.stats().consecutive_restarts, 1);
    }

    #[test]
    fn test_zero_cap_never_restarts() {
        let mut policy = create_test_policy();
        policy.max_restarts = 0;
        let mut lifecycle = ProcessLifecycle::new("test", policy);

        assert_eq!(lifecycle.evaluate(), RestartDecision::GiveUp);
    }
}
