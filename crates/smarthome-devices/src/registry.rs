//! Device registry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smarthome_core::{
    Clock, Device, Error, IdGenerator, JsonBlob, Result, SystemClock, UuidGenerator,
};
use smarthome_storage::Store;

/// Fields supplied by the caller when registering a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevice {
    pub name: String,
    pub device_type: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub external_device_id: String,
}

impl NewDevice {
    pub fn new(
        name: impl Into<String>,
        device_type: impl Into<String>,
        external_device_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            device_type: device_type.into(),
            capabilities: Vec::new(),
            external_device_id: external_device_id.into(),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("name", &self.name),
            ("type", &self.device_type),
            ("externalDeviceId", &self.external_device_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::invalid_input(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

/// Registers devices and enforces external-id uniqueness through the store.
#[derive(Clone)]
pub struct DeviceRegistry {
    store: Store,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl DeviceRegistry {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Register a device under a freshly generated id.
    pub async fn create(&self, new: NewDevice) -> Result<Device> {
        new.validate()?;

        let capabilities = serde_json::to_value(&new.capabilities)?;
        let device = Device {
            id: self.ids.next_id(),
            name: new.name,
            device_type: new.device_type,
            capabilities: JsonBlob::from_value(&capabilities),
            external_device_id: new.external_device_id,
            created_at: self.clock.now(),
        };

        let device = self.store.insert_device(device).await.map_err(|e| {
            tracing::debug!(category = "devices", error = %e, "device_create_failed");
            Error::from(e)
        })?;
        tracing::info!(
            category = "devices",
            device_id = %device.id,
            external_device_id = %device.external_device_id,
            "device_created"
        );
        Ok(device)
    }

    pub async fn get(&self, id: &str) -> Result<Device> {
        Ok(self.store.get_device(id).await?)
    }

    pub async fn get_by_external_id(&self, external_device_id: &str) -> Result<Device> {
        Ok(self.store.get_device_by_external_id(external_device_id).await?)
    }

    /// All devices, most recently created first.
    pub async fn list(&self) -> Result<Vec<Device>> {
        Ok(self.store.list_devices().await?)
    }

    /// Remove a device along with its state and commands.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete_device(id).await?;
        tracing::info!(category = "devices", device_id = %id, "device_deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_fields_are_rejected() {
        let new = NewDevice::new("  ", "light", "ext-1");
        assert!(matches!(new.validate(), Err(Error::InvalidInput(_))));

        let new = NewDevice::new("Lamp", "light", "\t");
        let err = new.validate().unwrap_err();
        assert_eq!(err, Error::invalid_input("externalDeviceId is required"));

        assert!(NewDevice::new("Lamp", "light", "ext-1").validate().is_ok());
    }
}
