//! State

use std::sync::Arc;

use switchboard_app::{context::AppContext, sessions::SessionService};

#[derive(Clone)]
pub(crate) struct State {
    pub(crate) sessions: Arc<dyn SessionService>,
    pub(crate) admin_token: String,
}

impl State {
    #[must_use]
    pub(crate) fn new(sessions: Arc<dyn SessionService>, admin_token: String) -> Self {
        Self {
            sessions,
            admin_token,
        }
    }

    #[must_use]
    pub(crate) fn from_app_context(app: &AppContext, admin_token: String) -> Arc<Self> {
        Arc::new(Self::new(Arc::clone(&app.sessions), admin_token))
    }
}
