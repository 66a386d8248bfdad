//! Shared fixtures: a controller wired to a simulated device

#![allow(dead_code)]

use core::time::Duration;
use std::sync::Arc;

use fermlink_connector::{Controller, ControllerConfig, ProfileId};
use fermlink_device_mock::{DeviceConfig, IdPool, MockDevice};

/// Timeout used by every fixture; stalled requests give up after this
pub const TIMEOUT: Duration = Duration::from_millis(50);

pub struct Harness {
    pub device: Arc<MockDevice>,
    pub pool: Arc<IdPool>,
    pub controller: Controller,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_device(DeviceConfig::default())
    }

    pub fn with_device(config: DeviceConfig) -> Self {
        let device = Arc::new(MockDevice::new(config));
        let pool = Arc::new(IdPool::new((0..32).filter(|id| *id != config.system_id)));
        let controller = Controller::new(device.clone(), pool.clone())
            .with_config(ControllerConfig::with_timeout(TIMEOUT));
        Self {
            device,
            pool,
            controller,
        }
    }

    /// Harness whose device already has one active profile; the request log
    /// starts empty
    pub fn with_active_profile() -> (Self, ProfileId) {
        let harness = Self::new();
        let profile = harness.controller.create_profile().unwrap();
        profile.activate().unwrap();
        let id = profile.id();
        harness.device.clear_requests();
        (harness, id)
    }
}
