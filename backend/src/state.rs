use std::sync::Arc;

use crate::{
    config::Config,
    db::connection::DbPool,
    services::{admission::AdmissionServiceTrait, authenticator::SubjectAuthenticator},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
    pub authenticator: Arc<dyn SubjectAuthenticator>,
    pub admission: Arc<dyn AdmissionServiceTrait>,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        config: Config,
        authenticator: Arc<dyn SubjectAuthenticator>,
        admission: Arc<dyn AdmissionServiceTrait>,
    ) -> Self {
        Self {
            pool,
            config,
            authenticator,
            admission,
        }
    }
}
