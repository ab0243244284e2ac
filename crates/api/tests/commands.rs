//! The command facade over a SQLite-backed context.

mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use crmsync_app::{
    add_credits, cancel_job, check_rate_limit, create_schedule, get_error_logs, get_error_stats,
    get_job, get_metrics, get_usage_history, get_user_quota, handle_error, list_jobs,
    list_schedules, record_usage, resolve_error, retry_job, set_schedule_enabled, submit_job,
    HandleErrorRequest, ListJobsQuery, RecordUsageRequest,
};
use crmsync_common::Clock;
use crmsync_domain::{
    CrmSyncError, DenialReason, ErrorContext, ErrorHandlingOptions, ErrorLogFilter, ErrorType,
    FailureDetails, JobStatus, JobType, Provider, ScheduleSpec, Severity, SyncDirection,
    SyncJobConfig,
};

use support::{batch, hubspot_contacts, ScriptedConnector, TestApp};

fn usage(provider: Provider, success: bool) -> RecordUsageRequest {
    RecordUsageRequest {
        user_id: "user-1".into(),
        provider,
        endpoint: "contacts".into(),
        success,
        response_time_ms: 120,
        error_message: (!success).then(|| "boom".to_string()),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn submitted_job_completes_and_shows_in_metrics() {
    let connector = ScriptedConnector::succeeding(batch(40, 10));
    let app = TestApp::new(vec![connector.shared()]).await;

    let job_id = submit_job(&app.ctx, hubspot_contacts("user-1")).await.unwrap();
    assert_eq!(app.run_tick().await, 1);

    let job = get_job(&app.ctx, job_id).await.unwrap().expect("job stored");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.processed_records, 40);

    let completed = list_jobs(
        &app.ctx,
        "user-1",
        ListJobsQuery { status: Some(JobStatus::Completed), ..Default::default() },
    )
    .await
    .unwrap();
    assert_eq!(completed.len(), 1);

    let metrics = get_metrics(&app.ctx, "user-1", 7).await.unwrap();
    assert_eq!(metrics.total_jobs, 1);
    assert_eq!(metrics.completed_jobs, 1);
    assert_eq!(metrics.total_records_created, 10);
    assert!((metrics.success_rate - 100.0).abs() < f64::EPSILON);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_submission_is_rejected() {
    let app = TestApp::new(Vec::new()).await;

    let blank_user = hubspot_contacts("   ");
    assert!(matches!(submit_job(&app.ctx, blank_user).await, Err(CrmSyncError::InvalidInput(_))));

    let mut urgent = hubspot_contacts("user-1");
    urgent.priority = 1_000;
    assert!(matches!(submit_job(&app.ctx, urgent).await, Err(CrmSyncError::InvalidInput(_))));

    let jobs = list_jobs(&app.ctx, "user-1", ListJobsQuery::default()).await.unwrap();
    assert!(jobs.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_is_one_shot() {
    let app = TestApp::new(Vec::new()).await;
    let job_id = submit_job(&app.ctx, hubspot_contacts("user-1")).await.unwrap();

    assert!(cancel_job(&app.ctx, job_id).await.unwrap());
    assert!(!cancel_job(&app.ctx, job_id).await.unwrap());
    assert_eq!(app.run_tick().await, 0);

    let job = get_job(&app.ctx, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn network_failures_use_exactly_the_retry_budget() {
    let connector = ScriptedConnector::failing();
    let calls = connector.calls();
    let app = TestApp::new(vec![connector.shared()]).await;
    let job_id = submit_job(&app.ctx, hubspot_contacts("user-1")).await.unwrap();

    app.run_tick().await;
    let job = get_job(&app.ctx, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retry_count, 1);

    // Not yet due: base delay is one second.
    assert_eq!(app.run_tick().await, 0);

    app.clock.advance(Duration::from_secs(1));
    app.run_tick().await;
    app.clock.advance(Duration::from_secs(2));
    app.run_tick().await;

    let job = get_job(&app.ctx, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    app.clock.advance(Duration::from_secs(60));
    assert_eq!(app.run_tick().await, 0);
    assert!(matches!(retry_job(&app.ctx, job_id).await, Err(CrmSyncError::InvalidState(_))));

    let errors = get_error_logs(&app.ctx, "user-1", ErrorLogFilter::default()).await.unwrap();
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().all(|record| record.error_type == ErrorType::NetworkError));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_job_with_budget_can_be_retried_by_hand() {
    let app = TestApp::new(Vec::new()).await;
    let mut spec = hubspot_contacts("user-1");
    spec.provider = Provider::Salesforce;
    let job_id = submit_job(&app.ctx, spec).await.unwrap();

    app.run_tick().await;
    let job = get_job(&app.ctx, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 0);

    assert!(retry_job(&app.ctx, job_id).await.unwrap());
    let job = get_job(&app.ctx, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
}

#[tokio::test(flavor = "multi_thread")]
async fn minute_window_denies_after_ceiling() {
    let app = TestApp::new(Vec::new()).await;

    let check = || check_rate_limit(&app.ctx, "user-1", Provider::PeopleDataLabs, "contacts");

    for _ in 0..10 {
        assert!(check().await.unwrap().allowed);
        record_usage(&app.ctx, usage(Provider::PeopleDataLabs, true)).await.unwrap();
    }

    let denied = check().await.unwrap();
    assert!(!denied.allowed);
    assert_eq!(denied.remaining_requests, 0);
    assert_eq!(denied.denial, Some(DenialReason::MinuteLimit));
    assert_eq!(denied.retry_after_ms, Some(30_000));

    let quota = get_user_quota(&app.ctx, "user-1").await.unwrap();
    assert_eq!(quota.daily_usage, 10);
    assert_eq!(quota.api_credits, 1_000 - 10 * 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_calls_are_logged_but_not_charged() {
    let app = TestApp::new(Vec::new()).await;

    let event = record_usage(&app.ctx, usage(Provider::Hubspot, false)).await.unwrap();
    assert_eq!(event.credits_charged, 0);

    let quota = get_user_quota(&app.ctx, "user-1").await.unwrap();
    assert_eq!(quota.daily_usage, 0);
    assert_eq!(quota.api_credits, 1_000);

    let history = get_usage_history(&app.ctx, "user-1", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].error_message.as_deref(), Some("boom"));
}

#[tokio::test(flavor = "multi_thread")]
async fn credits_gate_requests_and_can_be_topped_up() {
    let app = TestApp::new(Vec::new()).await;

    assert_eq!(add_credits(&app.ctx, "user-1", 250).await.unwrap(), 1_250);
    assert!(matches!(
        add_credits(&app.ctx, "user-1", 0).await,
        Err(CrmSyncError::InvalidInput(_))
    ));
    assert!(matches!(
        check_rate_limit(&app.ctx, "user-1", Provider::Hubspot, "deals").await,
        Err(CrmSyncError::Config(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn reported_errors_are_classified_resolved_and_counted() {
    let app = TestApp::new(Vec::new()).await;

    let request = HandleErrorRequest {
        failure: FailureDetails::from_status(401, "token expired"),
        context: ErrorContext::new("user-1", "import_contacts"),
        options: ErrorHandlingOptions::default(),
    };
    let record = handle_error(&app.ctx, request).await.unwrap();
    assert_eq!(record.error_type, ErrorType::AuthenticationError);
    assert_eq!(record.severity, Severity::High);
    assert!(!record.retryable);
    assert_eq!(record.max_retries, 1);

    let resolved = resolve_error(&app.ctx, record.id, "reconnected account").await.unwrap();
    assert!(resolved.resolved_at.is_some());
    assert!(matches!(
        resolve_error(&app.ctx, record.id, "again").await,
        Err(CrmSyncError::InvalidState(_))
    ));

    let stats = get_error_stats(&app.ctx, "user-1", 7).await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.most_common_type, Some(ErrorType::AuthenticationError));

    let blank = HandleErrorRequest {
        failure: FailureDetails::new("x"),
        context: ErrorContext::new(" ", "op"),
        options: ErrorHandlingOptions::default(),
    };
    assert!(matches!(handle_error(&app.ctx, blank).await, Err(CrmSyncError::InvalidInput(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn schedules_are_validated_listed_and_toggled() {
    let app = TestApp::new(Vec::new()).await;
    let spec = |interval: &str| ScheduleSpec {
        user_id: "user-1".into(),
        provider: Provider::Hubspot,
        job_type: JobType::Companies,
        direction: SyncDirection::Pull,
        interval: interval.into(),
        timezone: "Europe/Berlin".into(),
        priority: 0,
        config: SyncJobConfig::default(),
        start_at: None,
    };

    let schedule = create_schedule(&app.ctx, spec("0 6 * * 1-5")).await.unwrap();
    assert!(schedule.enabled);
    assert!(schedule.next_run_at > app.clock.now());

    assert!(create_schedule(&app.ctx, spec("every fortnight")).await.is_err());

    let disabled = set_schedule_enabled(&app.ctx, schedule.id, false).await.unwrap();
    assert!(!disabled.enabled);

    let listed = list_schedules(&app.ctx, "user-1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].enabled);
}
