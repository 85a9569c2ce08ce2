//! Tests for DeviceRegistry and StateTracker

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use smarthome_core::{Clock, Error, JsonBlob, ManualClock, SequentialIds};
use smarthome_devices::{DeviceRegistry, NewDevice, StateTracker};
use smarthome_storage::Store;
use tokio::test;

fn setup() -> (DeviceRegistry, StateTracker, Arc<ManualClock>) {
    let store = Store::memory().unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 2, 10, 9, 0, 0).unwrap(),
    ));
    let registry = DeviceRegistry::new(store.clone())
        .with_clock(clock.clone())
        .with_ids(Arc::new(SequentialIds::new("dev")));
    (registry, StateTracker::new(store), clock)
}

#[test]
async fn test_create_and_get() {
    let (registry, _, clock) = setup();

    let device = registry
        .create(
            NewDevice::new("Living room thermostat", "thermostat", "mqtt-42")
                .with_capability("setTemp")
                .with_capability("readTemp"),
        )
        .await
        .unwrap();

    assert_eq!(device.id, "dev-000001");
    assert_eq!(device.created_at, clock.now());
    assert_eq!(device.capability_names(), vec!["setTemp", "readTemp"]);

    let loaded = registry.get(&device.id).await.unwrap();
    assert_eq!(loaded, device);

    let by_external = registry.get_by_external_id("mqtt-42").await.unwrap();
    assert_eq!(by_external.id, device.id);
}

#[test]
async fn test_duplicate_external_id_conflicts() {
    let (registry, _, _) = setup();

    registry
        .create(NewDevice::new("First", "light", "mqtt-42"))
        .await
        .unwrap();
    let err = registry
        .create(NewDevice::new("Second", "light", "mqtt-42"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(registry.list().await.unwrap().len(), 1);
}

#[test]
async fn test_concurrent_duplicate_creates() {
    let (registry, _, _) = setup();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .create(NewDevice::new(format!("Plug {i}"), "plug", "zigbee-1"))
                    .await
            })
        })
        .collect();

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(Error::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
}

#[test]
async fn test_empty_fields_rejected() {
    let (registry, _, _) = setup();

    let err = registry
        .create(NewDevice::new("Lamp", " ", "ext-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(registry.list().await.unwrap().is_empty());
}

#[test]
async fn test_list_newest_first() {
    let (registry, _, clock) = setup();

    for ext in ["a", "b", "c"] {
        registry
            .create(NewDevice::new(format!("Device {ext}"), "sensor", ext))
            .await
            .unwrap();
        clock.advance(Duration::seconds(1));
    }

    let externals: Vec<String> = registry
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.external_device_id)
        .collect();
    assert_eq!(externals, vec!["c", "b", "a"]);
}

#[test]
async fn test_delete_removes_state() {
    let (registry, tracker, clock) = setup();
    let device = registry
        .create(NewDevice::new("Lamp", "light", "ext-1"))
        .await
        .unwrap();

    tracker
        .report(&device.id, JsonBlob::new(r#"{"on":true}"#), clock.now())
        .await
        .unwrap();

    registry.delete(&device.id).await.unwrap();
    assert!(matches!(registry.get(&device.id).await, Err(Error::NotFound(_))));
    assert!(matches!(tracker.get(&device.id).await, Err(Error::NotFound(_))));
    assert!(matches!(
        registry.delete(&device.id).await,
        Err(Error::NotFound(_))
    ));
}

#[test]
async fn test_report_upserts() {
    let (registry, tracker, clock) = setup();
    let device = registry
        .create(NewDevice::new("Lamp", "light", "ext-1"))
        .await
        .unwrap();

    let t1 = clock.now();
    let t2 = t1 + Duration::seconds(30);
    tracker
        .report(&device.id, JsonBlob::new(r#"{"on":false}"#), t1)
        .await
        .unwrap();
    tracker
        .report(&device.id, JsonBlob::new(r#"{"on":true}"#), t2)
        .await
        .unwrap();

    let state = tracker.get(&device.id).await.unwrap();
    assert_eq!(state.state_json.as_str(), r#"{"on":true}"#);
    assert_eq!(state.updated_at, t2);
}

#[test]
async fn test_report_by_external_id() {
    let (registry, tracker, clock) = setup();
    let device = registry
        .create(NewDevice::new("Sensor", "sensor", "mqtt-7"))
        .await
        .unwrap();

    let state = tracker
        .report_by_external_id("mqtt-7", JsonBlob::new(r#"{"t":19.5}"#), clock.now())
        .await
        .unwrap();
    assert_eq!(state.device_id, device.id);

    let err = tracker
        .report_by_external_id("mqtt-unknown", JsonBlob::empty_object(), clock.now())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
async fn test_report_unknown_device() {
    let (_, tracker, clock) = setup();
    let err = tracker
        .report("ghost", JsonBlob::empty_object(), clock.now())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
