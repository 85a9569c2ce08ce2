//! Device records and the external-id unique index.

use redb::{Database, ReadableTable};
use smarthome_core::Device;

use crate::store::{
    COMMANDS_TABLE, DEVICES_TABLE, DEVICE_COMMANDS_TABLE, EXTERNAL_IDS_TABLE, STATE_TABLE,
};
use crate::{Error, Result, Store};

impl Store {
    /// Persist a new device. Fails with `Conflict` if its id or external id is taken.
    pub async fn insert_device(&self, device: Device) -> Result<Device> {
        self.run(move |db| insert_device(db, &device).map(|_| device))
            .await
    }

    pub async fn get_device(&self, id: &str) -> Result<Device> {
        let id = id.to_string();
        self.run(move |db| {
            load_device(db, &id)?.ok_or_else(|| Error::NotFound(format!("device {id}")))
        })
        .await
    }

    pub async fn get_device_by_external_id(&self, external_id: &str) -> Result<Device> {
        let external_id = external_id.to_string();
        self.run(move |db| {
            let read_txn = db.begin_read()?;
            let index = read_txn.open_table(EXTERNAL_IDS_TABLE)?;
            let device_id = match index.get(external_id.as_str())? {
                Some(value) => value.value().to_string(),
                None => {
                    return Err(Error::NotFound(format!(
                        "device with external id {external_id}"
                    )))
                }
            };
            let devices = read_txn.open_table(DEVICES_TABLE)?;
            match devices.get(device_id.as_str())? {
                Some(value) => Ok(serde_json::from_str(value.value())?),
                None => Err(Error::NotFound(format!("device {device_id}"))),
            }
        })
        .await
    }

    /// All devices, most recently created first.
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.run(list_devices).await
    }

    /// Remove a device together with its state row and commands.
    pub async fn delete_device(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.run(move |db| delete_device(db, &id)).await
    }
}

fn insert_device(db: &Database, device: &Device) -> Result<()> {
    let json = serde_json::to_string(device)?;
    let write_txn = db.begin_write()?;
    {
        let mut index = write_txn.open_table(EXTERNAL_IDS_TABLE)?;
        if index.get(device.external_device_id.as_str())?.is_some() {
            return Err(Error::Conflict(format!(
                "external device id {} already registered",
                device.external_device_id
            )));
        }

        let mut devices = write_txn.open_table(DEVICES_TABLE)?;
        if devices.get(device.id.as_str())?.is_some() {
            return Err(Error::Conflict(format!("device id {} already exists", device.id)));
        }

        devices.insert(device.id.as_str(), json.as_str())?;
        index.insert(device.external_device_id.as_str(), device.id.as_str())?;
    }
    write_txn.commit()?;
    Ok(())
}

fn load_device(db: &Database, id: &str) -> Result<Option<Device>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(DEVICES_TABLE)?;

    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_str(value.value())?)),
        None => Ok(None),
    }
}

fn list_devices(db: &Database) -> Result<Vec<Device>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(DEVICES_TABLE)?;

    let mut devices = Vec::new();
    for result in table.iter()? {
        let (_key, value) = result?;
        devices.push(serde_json::from_str::<Device>(value.value())?);
    }

    // Newest first; id breaks ties so the order is total
    devices.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });

    Ok(devices)
}

fn delete_device(db: &Database, id: &str) -> Result<()> {
    let write_txn = db.begin_write()?;
    {
        let mut devices = write_txn.open_table(DEVICES_TABLE)?;
        let removed = devices.remove(id)?.map(|v| v.value().to_string());
        let device: Device = match removed {
            Some(json) => serde_json::from_str(&json)?,
            None => return Err(Error::NotFound(format!("device {id}"))),
        };

        let mut index = write_txn.open_table(EXTERNAL_IDS_TABLE)?;
        index.remove(device.external_device_id.as_str())?;

        let mut state = write_txn.open_table(STATE_TABLE)?;
        state.remove(id)?;

        let mut device_commands = write_txn.open_table(DEVICE_COMMANDS_TABLE)?;
        let mut command_ids = Vec::new();
        {
            let range = device_commands.range((id, "")..=(id, "\u{10FFFF}"))?;
            for result in range {
                let (key, _) = result?;
                command_ids.push(key.value().1.to_string());
            }
        }

        let mut commands = write_txn.open_table(COMMANDS_TABLE)?;
        for command_id in &command_ids {
            commands.remove(command_id.as_str())?;
            device_commands.remove((id, command_id.as_str()))?;
        }

        tracing::debug!(
            category = "storage",
            device_id = id,
            commands = command_ids.len(),
            "device_deleted"
        );
    }
    write_txn.commit()?;
    Ok(())
}
