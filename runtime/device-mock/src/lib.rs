//! Simulated fermentation controller
//!
//! In-memory stand-in for a real controller and transport, used by the
//! connector's integration tests and by the `fermlink` CLI.
//!
//! # Integration Points
//! - Implements: [`fermlink_connector::Protocol`] ([`MockDevice`]) and
//!   [`fermlink_connector::IdService`] ([`IdPool`])
//! - Used by: connector integration tests, `fermlink` CLI
//!
//! # Usage
//! ```ignore
//! let device = Arc::new(MockDevice::default());
//! let controller = Controller::new(device.clone(), Arc::new(IdPool::default()));
//! device.fail_next(Command::CreateProfile, ERR_NO_FREE_PROFILE);
//! assert!(controller.create_profile().is_err());
//! ```

mod device;
mod id_pool;

pub use device::{
    DeviceConfig, MockDevice, Request, ERR_INVALID_ADDRESS, ERR_INVALID_CONTAINER,
    ERR_INVALID_DEFINITION, ERR_NO_ACTIVE_PROFILE, ERR_NO_FREE_PROFILE, ERR_NO_FREE_SLOT,
    ERR_NO_SUCH_OBJECT, ERR_NO_SUCH_PROFILE, ERR_SLOT_OCCUPIED, MAX_SLOT,
};
pub use id_pool::IdPool;
