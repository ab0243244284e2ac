//! Health check command

use crate::context::AppContext;
use crate::utils::health::HealthStatus;

/// Engine health.
///
/// # Example Response
/// ```json
/// {
///   "isHealthy": true,
///   "score": 1.0,
///   "message": null,
///   "components": [
///     { "name": "database", "isHealthy": true, "message": null },
///     { "name": "job_scheduler", "isHealthy": true, "message": null },
///     { "name": "maintenance_scheduler", "isHealthy": true, "message": null }
///   ],
///   "queuedJobs": 2,
///   "runningJobs": 1,
///   "timestamp": 1717408830
/// }
/// ```
pub async fn get_app_health(ctx: &AppContext) -> HealthStatus {
    ctx.health_check().await
}
