//! Application state shared across handlers.

use axum::extract::FromRef;
use std::sync::Arc;

use crate::config::AuthSettings;
use crate::hub::HubHandle;
use crate::orchestrator::Orchestrator;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub hub: HubHandle,
    pub orchestrator: Arc<Orchestrator>,
    pub auth: AuthSettings,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        hub: HubHandle,
        orchestrator: Arc<Orchestrator>,
        auth: AuthSettings,
    ) -> Self {
        Self {
            store,
            hub,
            orchestrator,
            auth,
        }
    }
}

impl FromRef<AppState> for AuthSettings {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
