//! Command lifecycle manager.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use smarthome_core::{
    Clock, Command, CommandStatus, Error, IdGenerator, JsonBlob, Result, SystemClock, Transition,
    UuidGenerator,
};
use smarthome_storage::Store;

/// Creates commands and drives their status transitions.
///
/// Holds no command state of its own; every transition is a compare-and-set
/// in the store.
#[derive(Clone)]
pub struct CommandManager {
    store: Store,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl CommandManager {
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

    /// Current time on the manager's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Record a new pending command for an existing device.
    ///
    /// Missing params default to `{}`. Delivery to the device is the caller's job.
    pub async fn dispatch(
        &self,
        device_id: &str,
        action: &str,
        params: Option<JsonBlob>,
    ) -> Result<Command> {
        if action.trim().is_empty() {
            return Err(Error::invalid_input("action is required"));
        }

        let command = Command {
            id: self.ids.next_id(),
            device_id: device_id.to_string(),
            action: action.to_string(),
            params_json: params.unwrap_or_else(JsonBlob::empty_object),
            status: CommandStatus::Pending,
            error: String::new(),
            created_at: self.clock.now(),
            acked_at: None,
        };

        let command = self.store.insert_command(command).await?;
        tracing::info!(
            category = "commands",
            command_id = %command.id,
            device_id = %command.device_id,
            action = %command.action,
            "command_dispatched"
        );
        Ok(command)
    }

    /// Apply an acknowledgement to a pending command.
    ///
    /// Already-terminal commands are returned unchanged with `applied = false`.
    pub async fn acknowledge(
        &self,
        command_id: &str,
        success: bool,
        error_detail: &str,
        at: DateTime<Utc>,
    ) -> Result<Transition> {
        let detail = error_detail.to_string();
        let transition = self
            .store
            .transition_command(command_id, move |command| {
                command.acknowledge(success, &detail, at)
            })
            .await?;

        if transition.applied {
            tracing::info!(
                category = "commands",
                command_id,
                status = %transition.command.status,
                "command_acknowledged"
            );
        } else {
            tracing::debug!(
                category = "commands",
                command_id,
                status = %transition.command.status,
                "late_ack_ignored"
            );
        }
        Ok(transition)
    }

    /// Move a pending command to `timeout`. `acked_at` stays unset.
    pub async fn expire_if_pending(&self, command_id: &str, at: DateTime<Utc>) -> Result<Transition> {
        let transition = self
            .store
            .transition_command(command_id, |command| command.expire())
            .await?;

        if transition.applied {
            tracing::info!(
                category = "commands",
                command_id,
                expired_at = %at,
                "command_timed_out"
            );
        }
        Ok(transition)
    }

    pub async fn get(&self, command_id: &str) -> Result<Command> {
        Ok(self.store.get_command(command_id).await?)
    }

    /// Commands of one device, newest first.
    pub async fn list_for_device(&self, device_id: &str) -> Result<Vec<Command>> {
        Ok(self.store.list_commands_for_device(device_id).await?)
    }

    /// Pending commands created at or before `cutoff`.
    pub async fn list_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Command>> {
        Ok(self.store.list_pending_created_before(cutoff).await?)
    }
}
