//! Command records and their conditional status transitions.

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable};
use smarthome_core::{Command, CommandStatus, Transition};

use crate::store::{COMMANDS_TABLE, DEVICES_TABLE, DEVICE_COMMANDS_TABLE};
use crate::{Error, Result, Store};

impl Store {
    /// Persist a new command for an existing device.
    pub async fn insert_command(&self, command: Command) -> Result<Command> {
        self.run(move |db| insert_command(db, &command).map(|_| command))
            .await
    }

    pub async fn get_command(&self, id: &str) -> Result<Command> {
        let id = id.to_string();
        self.run(move |db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(COMMANDS_TABLE)?;
            match table.get(id.as_str())? {
                Some(value) => Ok(serde_json::from_str(value.value())?),
                None => Err(Error::NotFound(format!("command {id}"))),
            }
        })
        .await
    }

    /// Apply `apply` to the command inside a single write transaction.
    ///
    /// `apply` returns whether it changed the command; when it returns false
    /// nothing is written and the stored record is returned as-is.
    pub async fn transition_command<F>(&self, id: &str, apply: F) -> Result<Transition>
    where
        F: FnOnce(&mut Command) -> bool + Send + 'static,
    {
        let id = id.to_string();
        self.run(move |db| transition_command(db, &id, apply)).await
    }

    /// Commands of one device, newest first. `NotFound` if the device does not exist.
    pub async fn list_commands_for_device(&self, device_id: &str) -> Result<Vec<Command>> {
        let device_id = device_id.to_string();
        self.run(move |db| list_commands_for_device(db, &device_id))
            .await
    }

    /// Pending commands created at or before `cutoff`, oldest first.
    pub async fn list_pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Command>> {
        self.run(move |db| list_pending_created_before(db, cutoff))
            .await
    }
}

fn insert_command(db: &Database, command: &Command) -> Result<()> {
    let json = serde_json::to_string(command)?;
    let write_txn = db.begin_write()?;
    {
        let devices = write_txn.open_table(DEVICES_TABLE)?;
        if devices.get(command.device_id.as_str())?.is_none() {
            return Err(Error::NotFound(format!("device {}", command.device_id)));
        }

        let mut commands = write_txn.open_table(COMMANDS_TABLE)?;
        if commands.get(command.id.as_str())?.is_some() {
            return Err(Error::Conflict(format!("command id {} already exists", command.id)));
        }
        commands.insert(command.id.as_str(), json.as_str())?;

        let mut index = write_txn.open_table(DEVICE_COMMANDS_TABLE)?;
        index.insert(
            (command.device_id.as_str(), command.id.as_str()),
            command.created_at.timestamp_millis(),
        )?;
    }
    write_txn.commit()?;
    Ok(())
}

fn transition_command<F>(db: &Database, id: &str, apply: F) -> Result<Transition>
where
    F: FnOnce(&mut Command) -> bool,
{
    let write_txn = db.begin_write()?;
    let transition = {
        let mut table = write_txn.open_table(COMMANDS_TABLE)?;
        let stored = table.get(id)?.map(|v| v.value().to_string());
        let mut command: Command = match stored {
            Some(json) => serde_json::from_str(&json)?,
            None => return Err(Error::NotFound(format!("command {id}"))),
        };

        let applied = apply(&mut command);
        if applied {
            let json = serde_json::to_string(&command)?;
            table.insert(id, json.as_str())?;
        }
        Transition { command, applied }
    };

    if transition.applied {
        write_txn.commit()?;
    } else {
        write_txn.abort()?;
    }
    Ok(transition)
}

fn list_commands_for_device(db: &Database, device_id: &str) -> Result<Vec<Command>> {
    let read_txn = db.begin_read()?;
    let devices = read_txn.open_table(DEVICES_TABLE)?;
    if devices.get(device_id)?.is_none() {
        return Err(Error::NotFound(format!("device {device_id}")));
    }

    let index = read_txn.open_table(DEVICE_COMMANDS_TABLE)?;
    let table = read_txn.open_table(COMMANDS_TABLE)?;

    let mut commands = Vec::new();
    for result in index.range((device_id, "")..=(device_id, "\u{10FFFF}"))? {
        let (key, _) = result?;
        let (_, command_id) = key.value();
        if let Some(value) = table.get(command_id)? {
            commands.push(serde_json::from_str::<Command>(value.value())?);
        }
    }

    sort_newest_first(&mut commands);
    Ok(commands)
}

fn list_pending_created_before(db: &Database, cutoff: DateTime<Utc>) -> Result<Vec<Command>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(COMMANDS_TABLE)?;

    let mut commands = Vec::new();
    for result in table.iter()? {
        let (_key, value) = result?;
        let command: Command = serde_json::from_str(value.value())?;
        if command.status == CommandStatus::Pending && command.created_at <= cutoff {
            commands.push(command);
        }
    }

    commands.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(commands)
}

fn sort_newest_first(commands: &mut [Command]) {
    commands.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
