//! Latest reported device state.

use chrono::{DateTime, Utc};
use smarthome_core::{DeviceState, JsonBlob, Result};
use smarthome_storage::Store;

/// Upserts and reads the state blob each device last reported.
#[derive(Debug, Clone)]
pub struct StateTracker {
    store: Store,
}

impl StateTracker {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Replace the device's state. The payload is stored without validation.
    pub async fn report(
        &self,
        device_id: &str,
        state_json: JsonBlob,
        observed_at: DateTime<Utc>,
    ) -> Result<DeviceState> {
        let state = self
            .store
            .upsert_state(DeviceState {
                device_id: device_id.to_string(),
                state_json,
                updated_at: observed_at,
            })
            .await?;
        tracing::debug!(category = "devices", device_id, "state_reported");
        Ok(state)
    }

    /// Report state for the device registered under a transport identifier.
    pub async fn report_by_external_id(
        &self,
        external_device_id: &str,
        state_json: JsonBlob,
        observed_at: DateTime<Utc>,
    ) -> Result<DeviceState> {
        let device = self
            .store
            .get_device_by_external_id(external_device_id)
            .await?;
        self.report(&device.id, state_json, observed_at).await
    }

    pub async fn get(&self, device_id: &str) -> Result<DeviceState> {
        Ok(self.store.get_state(device_id).await?)
    }
}
