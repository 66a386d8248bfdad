//! System id bootstrap, system clock and resets

mod common;

use std::sync::{Arc, Mutex};

use common::Harness;
use fermlink_connector::codec::SystemTime;
use fermlink_connector::*;
use fermlink_device_mock::{DeviceConfig, IdPool, MockDevice, Request};

fn device_with_id(system_id: u8) -> DeviceConfig {
    DeviceConfig {
        system_id,
        ..DeviceConfig::default()
    }
}

#[test]
fn test_initialize_assigns_fresh_id() {
    let h = Harness::new();

    let id = h.controller.initialize_from_pool().unwrap();

    assert_eq!(id, 0);
    assert_eq!(h.device.system_id(), 0);
    assert!(!h.pool.contains(0));
    assert_eq!(
        h.device.requests(),
        vec![
            Request::ReadSystemValue {
                id_chain: IdChain::from([0]),
                len: 1,
            },
            Request::WriteSystemValue {
                id_chain: IdChain::from([0]),
                data: vec![0],
            },
        ]
    );
}

#[test]
fn test_initialize_keeps_assigned_id() {
    let h = Harness::with_device(device_with_id(7));
    let mut fetched = false;

    let id = h
        .controller
        .initialize(|| {
            fetched = true;
            Ok(1)
        })
        .unwrap();

    assert_eq!(id, 7);
    assert!(!fetched);
    assert_eq!(h.device.system_id(), 7);
    assert!(!h
        .device
        .requests()
        .iter()
        .any(|r| matches!(r, Request::WriteSystemValue { .. })));
}

#[test]
fn test_initialize_propagates_fetch_failure() {
    let h = Harness::new();

    let err = h
        .controller
        .initialize(|| Err(IdServiceError::Exhausted.into()))
        .unwrap_err();

    assert!(matches!(
        err,
        ConnectorError::IdService(IdServiceError::Exhausted)
    ));
    assert_eq!(h.device.system_id(), UNINITIALIZED_ID);
}

#[test]
fn test_initialize_from_exhausted_pool() {
    let device = Arc::new(MockDevice::default());
    let controller = Controller::new(device.clone(), Arc::new(IdPool::new([])));

    let err = controller.initialize_from_pool().unwrap_err();

    assert!(matches!(
        err,
        ConnectorError::IdService(IdServiceError::Exhausted)
    ));
    assert_eq!(device.system_id(), UNINITIALIZED_ID);
}

#[test]
fn test_system_id_proxy() {
    let h = Harness::with_device(device_with_id(12));
    let system_id = h.controller.system_id();
    assert_eq!(system_id.id_chain(), IdChain::from([SYSTEM_ID_SLOT]));
    assert_eq!(system_id.read().unwrap(), vec![12]);

    // Fixed one-byte buffer: longer values are rejected locally
    h.device.clear_requests();
    let err = system_id.write(&vec![1, 2]).unwrap_err();
    assert!(err.is_validation());
    assert!(h.device.requests().is_empty());
}

#[test]
fn test_system_time_round_trip() {
    let h = Harness::new();
    let clock = h.controller.system_time();
    let now = SystemTime {
        time: 1_700_000,
        scale: -3,
    };

    clock.write(&now).unwrap();

    assert_eq!(clock.read().unwrap(), now);
    assert_eq!(
        h.device.requests().last(),
        Some(&Request::ReadSystemValue {
            id_chain: IdChain::from([SYSTEM_TIME_SLOT]),
            len: 6,
        })
    );
}

/// Id service that snapshots the device request log when an id comes back
struct ObservingPool {
    device: Arc<MockDevice>,
    releases: Mutex<Vec<(u8, Vec<Request>)>>,
}

impl IdService for ObservingPool {
    fn acquire(&self) -> core::result::Result<u8, IdServiceError> {
        Err(IdServiceError::Exhausted)
    }

    fn release(&self, id: u8) -> core::result::Result<(), IdServiceError> {
        self.releases.lock().unwrap().push((id, self.device.requests()));
        Ok(())
    }
}

#[test]
fn test_erase_returns_id_before_reset() {
    let device = Arc::new(MockDevice::new(device_with_id(7)));
    let pool = Arc::new(ObservingPool {
        device: device.clone(),
        releases: Mutex::new(Vec::new()),
    });
    let controller = Controller::new(device.clone(), pool.clone());

    controller.reset(true, false).unwrap();

    let releases = pool.releases.lock().unwrap();
    assert_eq!(releases.len(), 1);
    let (id, seen) = &releases[0];
    assert_eq!(*id, 7);
    assert!(!seen.iter().any(|r| matches!(r, Request::Reset(_))));

    assert_eq!(device.requests().last(), Some(&Request::Reset(ResetFlags::ERASE_EEPROM)));
    assert_eq!(device.system_id(), UNINITIALIZED_ID);
}

#[test]
fn test_erase_without_id_releases_nothing() {
    let h = Harness::new();
    h.controller.reset(true, true).unwrap();
    assert!(h.pool.released().is_empty());
    assert_eq!(
        h.device.requests().last(),
        Some(&Request::Reset(ResetFlags::ERASE_EEPROM | ResetFlags::HARD_RESET))
    );
}

#[test]
fn test_plain_reset_skips_id_service() {
    let h = Harness::with_device(device_with_id(3));
    h.controller.reset(false, true).unwrap();

    assert_eq!(h.device.requests(), vec![Request::Reset(ResetFlags::HARD_RESET)]);
    assert_eq!(h.device.system_id(), 3);
    assert!(h.pool.released().is_empty());
}

#[test]
fn test_failed_release_aborts_reset() {
    let device = Arc::new(MockDevice::new(device_with_id(4)));
    // The id is already free, so returning it again fails
    let pool = Arc::new(IdPool::new([4]));
    let controller = Controller::new(device.clone(), pool);

    let err = controller.reset(true, false).unwrap_err();

    assert!(matches!(
        err,
        ConnectorError::IdService(IdServiceError::AlreadyReleased(4))
    ));
    assert!(!device
        .requests()
        .iter()
        .any(|r| matches!(r, Request::Reset(_))));
    assert_eq!(device.system_id(), 4);
}

#[test]
fn test_bootstrap_after_erase() {
    let h = Harness::with_device(device_with_id(5));
    h.controller.reset(true, false).unwrap();
    assert_eq!(h.pool.released(), vec![5]);

    // The wiped device picks up a fresh id again
    let id = h.controller.initialize_from_pool().unwrap();
    assert_eq!(id, 0);
    assert_eq!(h.device.system_id(), 0);
}
