use super::BaseRepository;
use crate::error::AppError;
use crate::session::Session;

/// Repository with no model of its own. Used for connection checks.
pub struct CommonRepo<S> {
    base: BaseRepository<S>,
}

impl<S: Session> CommonRepo<S> {
    pub fn new(session: S) -> Self {
        CommonRepo {
            base: BaseRepository::new(session),
        }
    }

    pub async fn is_connection_exist(&mut self) -> Result<bool, AppError> {
        self.base.is_connection_exist().await
    }

    pub fn into_session(self) -> S {
        self.base.into_session()
    }
}
