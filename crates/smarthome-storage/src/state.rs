//! Latest reported state per device.

use redb::{Database, ReadableTable};
use smarthome_core::DeviceState;

use crate::store::{DEVICES_TABLE, STATE_TABLE};
use crate::{Error, Result, Store};

impl Store {
    /// Insert or replace the state row of an existing device.
    pub async fn upsert_state(&self, state: DeviceState) -> Result<DeviceState> {
        self.run(move |db| upsert_state(db, &state).map(|_| state))
            .await
    }

    pub async fn get_state(&self, device_id: &str) -> Result<DeviceState> {
        let device_id = device_id.to_string();
        self.run(move |db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(STATE_TABLE)?;
            match table.get(device_id.as_str())? {
                Some(value) => Ok(serde_json::from_str(value.value())?),
                None => Err(Error::NotFound(format!("state for device {device_id}"))),
            }
        })
        .await
    }
}

fn upsert_state(db: &Database, state: &DeviceState) -> Result<()> {
    let json = serde_json::to_string(state)?;
    let write_txn = db.begin_write()?;
    {
        let devices = write_txn.open_table(DEVICES_TABLE)?;
        if devices.get(state.device_id.as_str())?.is_none() {
            return Err(Error::NotFound(format!("device {}", state.device_id)));
        }

        let mut table = write_txn.open_table(STATE_TABLE)?;
        table.insert(state.device_id.as_str(), json.as_str())?;
    }
    write_txn.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use smarthome_core::{Device, JsonBlob};

    async fn store_with_device() -> Store {
        let store = Store::memory().unwrap();
        store
            .insert_device(Device {
                id: "d1".into(),
                name: "Hallway".into(),
                device_type: "light".into(),
                capabilities: JsonBlob::new("[]"),
                external_device_id: "zigbee-7".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_second_report_replaces_first() {
        let store = store_with_device().await;
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(3);

        store
            .upsert_state(DeviceState {
                device_id: "d1".into(),
                state_json: JsonBlob::new(r#"{"on":false}"#),
                updated_at: t1,
            })
            .await
            .unwrap();
        store
            .upsert_state(DeviceState {
                device_id: "d1".into(),
                state_json: JsonBlob::new(r#"{"on":true}"#),
                updated_at: t2,
            })
            .await
            .unwrap();

        let state = store.get_state("d1").await.unwrap();
        assert_eq!(state.state_json.as_str(), r#"{"on":true}"#);
        assert_eq!(state.updated_at, t2);
    }

    #[tokio::test]
    async fn test_payload_is_not_validated() {
        let store = store_with_device().await;
        store
            .upsert_state(DeviceState {
                device_id: "d1".into(),
                state_json: JsonBlob::new("raw firmware blob"),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(
            store.get_state("d1").await.unwrap().state_json.as_str(),
            "raw firmware blob"
        );
    }

    #[tokio::test]
    async fn test_unknown_device_is_rejected() {
        let store = store_with_device().await;
        let err = store
            .upsert_state(DeviceState {
                device_id: "ghost".into(),
                state_json: JsonBlob::empty_object(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(matches!(store.get_state("ghost").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_state_is_not_found() {
        let store = store_with_device().await;
        assert!(matches!(store.get_state("d1").await, Err(Error::NotFound(_))));
    }
}
