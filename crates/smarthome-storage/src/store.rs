//! Store handle: database lifecycle and bounded blocking execution.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadableTable, TableDefinition};
use smarthome_core::config::StorageConfig;
use tokio::sync::Semaphore;

use crate::{Error, Result};

// Devices table: key = device_id, value = Device (JSON)
pub(crate) const DEVICES_TABLE: TableDefinition<&str, &str> = TableDefinition::new("devices");

// Unique index: key = external_device_id, value = device_id
pub(crate) const EXTERNAL_IDS_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("device_external_ids");

// Device state table: key = device_id, value = DeviceState (JSON)
pub(crate) const STATE_TABLE: TableDefinition<&str, &str> = TableDefinition::new("device_state");

// Commands table: key = command_id, value = Command (JSON)
pub(crate) const COMMANDS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("commands");

// Per-device command index: key = (device_id, command_id), value = created_at millis
pub(crate) const DEVICE_COMMANDS_TABLE: TableDefinition<(&str, &str), i64> =
    TableDefinition::new("device_commands");

// Layout metadata: key = "version"
const SCHEMA_META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("schema_meta");

/// Current persisted layout version.
pub const SCHEMA_VERSION: u64 = 1;

/// Path that selects a non-persistent in-memory store.
pub const MEMORY_PATH: &str = ":memory:";

/// Concurrency limits for store work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Maximum store operations running at once.
    pub max_connections: usize,
    /// How long an operation waits for a free slot before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&StorageConfig> for StoreOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            max_connections: config.max_connections.max(1),
            busy_timeout: config.busy_timeout,
        }
    }
}

/// Shared handle to the entity store. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    path: String,
    permits: Arc<Semaphore>,
    busy_timeout: Duration,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}

impl Store {
    /// Open or create a store at `path`. `:memory:` opens an in-memory store.
    pub fn open(path: &str, options: StoreOptions) -> Result<Self> {
        if path == MEMORY_PATH {
            return Self::memory_with(options);
        }

        let path_ref = Path::new(path);
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path_ref)?;
        let store = Self::init(db, path.to_string(), options)?;
        tracing::info!(category = "storage", path, "db_open");
        Ok(store)
    }

    /// Open a fresh in-memory store with default options.
    pub fn memory() -> Result<Self> {
        Self::memory_with(StoreOptions::default())
    }

    pub fn memory_with(options: StoreOptions) -> Result<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db, MEMORY_PATH.to_string(), options)
    }

    fn init(db: Database, path: String, options: StoreOptions) -> Result<Self> {
        ensure_schema(&db)?;
        Ok(Self {
            db: Arc::new(db),
            path,
            permits: Arc::new(Semaphore::new(options.max_connections.max(1))),
            busy_timeout: options.busy_timeout,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run `work` on the blocking pool once a connection slot is free.
    ///
    /// Fails with [`Error::Busy`] if no slot frees up within the busy timeout.
    /// The slot is held until `work` returns, even if the caller goes away.
    pub async fn run<F, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = match tokio::time::timeout(
            self.busy_timeout,
            self.permits.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Err(Error::Storage("store closed".into())),
            Err(_elapsed) => {
                tracing::warn!(category = "storage", path = %self.path, "store_busy");
                return Err(Error::Busy);
            }
        };

        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work(db.as_ref())
        })
        .await?
    }

    /// Verify the store answers a read transaction.
    pub async fn ping(&self) -> Result<()> {
        self.run(|db| {
            let read_txn = db.begin_read()?;
            read_txn.open_table(SCHEMA_META_TABLE)?;
            Ok(())
        })
        .await
    }

    /// The persisted layout version.
    pub async fn schema_version(&self) -> Result<u64> {
        self.run(|db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(SCHEMA_META_TABLE)?;
            let version = table.get("version")?.map(|v| v.value()).unwrap_or(0);
            Ok(version)
        })
        .await
    }
}

/// Create missing tables and stamp or check the layout version.
fn ensure_schema(db: &Database) -> Result<()> {
    let write_txn = db.begin_write()?;
    {
        let _devices = write_txn.open_table(DEVICES_TABLE)?;
        let _external_ids = write_txn.open_table(EXTERNAL_IDS_TABLE)?;
        let _state = write_txn.open_table(STATE_TABLE)?;
        let _commands = write_txn.open_table(COMMANDS_TABLE)?;
        let _device_commands = write_txn.open_table(DEVICE_COMMANDS_TABLE)?;

        let mut meta = write_txn.open_table(SCHEMA_META_TABLE)?;
        let found = meta.get("version")?.map(|v| v.value());
        match found {
            Some(found) if found > SCHEMA_VERSION => {
                return Err(Error::UnsupportedSchema {
                    found,
                    supported: SCHEMA_VERSION,
                });
            }
            Some(found) if found == SCHEMA_VERSION => {}
            _ => {
                meta.insert("version", SCHEMA_VERSION)?;
            }
        }
    }
    write_txn.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_is_stamped_and_pingable() {
        let store = Store::memory().unwrap();
        assert_eq!(store.path(), MEMORY_PATH);
        store.ping().await.unwrap();
        assert_eq!(store.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/smarthome.redb");
        let store = Store::open(path.to_str().unwrap(), StoreOptions::default()).unwrap();
        store.ping().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn newer_schema_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.redb");
        {
            let db = Database::create(&path).unwrap();
            let write_txn = db.begin_write().unwrap();
            {
                let mut meta = write_txn.open_table(SCHEMA_META_TABLE).unwrap();
                meta.insert("version", SCHEMA_VERSION + 1).unwrap();
            }
            write_txn.commit().unwrap();
        }

        let err = Store::open(path.to_str().unwrap(), StoreOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSchema { found: 2, .. }));
    }

    #[tokio::test]
    async fn saturated_store_reports_busy() {
        let store = Store::memory_with(StoreOptions {
            max_connections: 1,
            busy_timeout: Duration::from_millis(50),
        })
        .unwrap();

        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let holder = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .run(move |_db| {
                        let _ = release_rx.recv();
                        Ok(())
                    })
                    .await
            })
        };

        // Let the holder take the only slot.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let err = store.ping().await.unwrap_err();
        assert!(matches!(err, Error::Busy));

        release_tx.send(()).unwrap();
        holder.await.unwrap().unwrap();
        store.ping().await.unwrap();
    }
}
