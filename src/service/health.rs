use crate::error::ServiceHealthError;
use crate::repository::CommonRepo;
use crate::session::Session;

/// Checks the dependencies a process needs before it serves traffic.
pub struct HealthService<S> {
    repo: CommonRepo<S>,
}

impl<S: Session> HealthService<S> {
    pub fn new(session: S) -> Self {
        HealthService {
            repo: CommonRepo::new(session),
        }
    }

    pub async fn check_db_connection(&mut self) -> Result<(), ServiceHealthError> {
        match self.repo.is_connection_exist().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ServiceHealthError::database()),
            Err(e) => {
                tracing::error!(error = %e, "database health check failed");
                Err(ServiceHealthError::DatabaseConnection(e.to_string()))
            }
        }
    }
}
