//! Health reporting for the running engine.
//!
//! `AppContext::health_check` builds one [`HealthStatus`] from the database,
//! the background schedulers and the dispatch queue.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Share of healthy components needed for the engine to count as healthy.
pub const HEALTHY_THRESHOLD: f64 = 0.8;

/// Overall health of the engine.
///
/// # Example
/// ```
/// use crmsync_app::utils::health::{ComponentHealth, HealthStatus};
///
/// let mut status = HealthStatus::new()
///     .add_component(ComponentHealth::healthy("database"))
///     .add_component(ComponentHealth::unhealthy("job_scheduler", "not running"));
/// status.calculate_score();
///
/// assert_eq!(status.score, 0.5);
/// assert!(!status.is_healthy);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// Score at or above the healthy threshold.
    pub is_healthy: bool,

    /// `healthy_components / total_components`, 1.0 with no components.
    pub score: f64,

    /// Names the failing components when degraded.
    pub message: Option<String>,

    /// Per-component results.
    pub components: Vec<ComponentHealth>,

    /// Jobs waiting in the dispatch queue.
    pub queued_jobs: usize,

    /// Jobs currently executing.
    pub running_jobs: usize,

    /// Unix seconds when the check ran.
    pub timestamp: i64,
}

impl HealthStatus {
    /// Healthy status with no components, stamped now.
    pub fn new() -> Self {
        Self {
            is_healthy: true,
            score: 1.0,
            message: None,
            components: Vec::new(),
            queued_jobs: 0,
            running_jobs: 0,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Append a component result.
    #[must_use]
    pub fn add_component(mut self, component: ComponentHealth) -> Self {
        self.components.push(component);
        self
    }

    /// Attach queue depth and running count.
    #[must_use]
    pub fn with_load(mut self, queued_jobs: usize, running_jobs: usize) -> Self {
        self.queued_jobs = queued_jobs;
        self.running_jobs = running_jobs;
        self
    }

    /// Recompute `score` and `is_healthy` from the components. Call after the
    /// last component is added.
    pub fn calculate_score(&mut self) {
        if self.components.is_empty() {
            return;
        }

        let healthy = self.components.iter().filter(|c| c.is_healthy).count();
        self.score = healthy as f64 / self.components.len() as f64;
        self.is_healthy = self.score >= HEALTHY_THRESHOLD;
        self.message = (!self.is_healthy).then(|| {
            let failing: Vec<&str> = self
                .components
                .iter()
                .filter(|c| !c.is_healthy)
                .map(|c| c.name.as_str())
                .collect();
            format!("degraded: {}", failing.join(", "))
        });
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Health of one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    /// Component name, e.g. `database`.
    pub name: String,
    pub is_healthy: bool,
    pub message: Option<String>,
}

impl ComponentHealth {
    /// Passing component.
    pub fn healthy(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: true, message: None }
    }

    /// Failing component with a reason.
    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: false, message: Some(message.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_status_is_healthy_and_empty() {
        let status = HealthStatus::new();
        assert!(status.is_healthy);
        assert_eq!(status.score, 1.0);
        assert!(status.message.is_none());
        assert!(status.components.is_empty());
    }

    #[test]
    fn score_without_components_stays_full() {
        let mut status = HealthStatus::new();
        status.calculate_score();
        assert_eq!(status.score, 1.0);
        assert!(status.is_healthy);
    }

    #[test]
    fn half_healthy_is_degraded_and_names_failures() {
        let mut status = HealthStatus::new()
            .add_component(ComponentHealth::healthy("database"))
            .add_component(ComponentHealth::unhealthy("job_scheduler", "not running"));

        status.calculate_score();

        assert_eq!(status.score, 0.5);
        assert!(!status.is_healthy);
        assert_eq!(status.message.as_deref(), Some("degraded: job_scheduler"));
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut status = HealthStatus::new()
            .add_component(ComponentHealth::healthy("database"))
            .add_component(ComponentHealth::healthy("job_scheduler"))
            .add_component(ComponentHealth::healthy("maintenance_scheduler"))
            .add_component(ComponentHealth::healthy("queue"))
            .add_component(ComponentHealth::unhealthy("notifications", "error"));

        status.calculate_score();

        assert_eq!(status.score, 0.8);
        assert!(status.is_healthy);
        assert!(status.message.is_none());
    }

    #[test]
    fn serializes_camel_case() {
        let status = HealthStatus::new().with_load(3, 1);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["queuedJobs"], 3);
        assert_eq!(json["runningJobs"], 1);
        assert!(json.get("isHealthy").is_some());
    }
}
