//! Shared server state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use smarthome_commands::CommandManager;
use smarthome_devices::{DeviceRegistry, StateTracker};
use smarthome_storage::Store;

use crate::auth::ApiKeyAuth;

/// Handles shared by every request. Cloning is cheap.
#[derive(Clone)]
pub struct ServerState {
    pub registry: DeviceRegistry,
    pub states: StateTracker,
    pub commands: CommandManager,
    pub store: Store,
    pub auth: Arc<ApiKeyAuth>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    /// Build services over `store` with the system clock and UUID ids.
    pub fn new(store: Store, api_key: &str) -> Self {
        Self::with_services(
            DeviceRegistry::new(store.clone()),
            StateTracker::new(store.clone()),
            CommandManager::new(store.clone()),
            store,
            api_key,
        )
    }

    pub fn with_services(
        registry: DeviceRegistry,
        states: StateTracker,
        commands: CommandManager,
        store: Store,
        api_key: &str,
    ) -> Self {
        Self {
            registry,
            states,
            commands,
            store,
            auth: Arc::new(ApiKeyAuth::new(api_key)),
            started_at: Utc::now(),
        }
    }
}
