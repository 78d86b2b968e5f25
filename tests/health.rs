//! Health service over the connection check.

mod common;

use assert_matches::assert_matches;
use common::{io_error, protocol_error, RecordingSession};
use weblite_framework::error::ServiceHealthError;
use weblite_framework::service::HealthService;

#[tokio::test]
async fn reachable_database_is_healthy() {
    let mut service = HealthService::new(RecordingSession::new());
    assert!(service.check_db_connection().await.is_ok());
}

#[tokio::test]
async fn unreachable_database_is_a_connection_error() {
    let mut service = HealthService::new(RecordingSession::failing("execute", io_error));
    let err = service.check_db_connection().await.unwrap_err();
    assert_matches!(err, ServiceHealthError::DatabaseConnection(_));
    assert_eq!(err.service_name(), "database");
}

#[tokio::test]
async fn query_failure_is_reported_with_detail() {
    let mut session = RecordingSession::failing("execute", protocol_error);
    let mut service = HealthService::new(&mut session);
    let err = service.check_db_connection().await.unwrap_err();
    assert_matches!(
        err,
        ServiceHealthError::DatabaseConnection(ref detail) if detail.contains("unexpected message")
    );
    drop(service);
    assert_eq!(session.count("rollback"), 1);
}
