//! Transport collaborator surface
//!
//! The controller never frames bytes itself. It drives a [`Protocol`]
//! implementation (a real conduit, or the in-memory simulator in
//! `fermlink-device-mock`) whose every call returns a [`ResponseFuture`].
//!
//! # Integration Points
//! - Implemented by: transports, device simulators
//! - Consumed by: [`Controller`](crate::Controller)

use core::fmt;

use bitflags::bitflags;

use crate::address::IdChain;
use crate::error::IdServiceError;
use crate::profile::ProfileId;
use crate::registry::ObjectTypeId;
use crate::response::ResponseFuture;

/// Device commands, used to label requests in logs and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    ReadValue,
    WriteValue,
    ReadSystemValue,
    WriteSystemValue,
    CreateObject,
    DeleteObject,
    NextSlot,
    CreateProfile,
    DeleteProfile,
    ActivateProfile,
    ListProfiles,
    ListProfile,
    Reset,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::ReadValue => "read_value",
            Command::WriteValue => "write_value",
            Command::ReadSystemValue => "read_system_value",
            Command::WriteSystemValue => "write_system_value",
            Command::CreateObject => "create_object",
            Command::DeleteObject => "delete_object",
            Command::NextSlot => "next_slot",
            Command::CreateProfile => "create_profile",
            Command::DeleteProfile => "delete_profile",
            Command::ActivateProfile => "activate_profile",
            Command::ListProfiles => "list_profiles",
            Command::ListProfile => "list_profile",
            Command::Reset => "reset",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Flag byte carried by the reset command
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResetFlags: u8 {
        /// Wipe persistent storage (profiles, objects, system id)
        const ERASE_EEPROM = 0x01;
        /// Reboot the controller rather than reinitialising in place
        const HARD_RESET = 0x02;
    }
}

/// Raw answer to `list_profiles`
///
/// Ids are as sent by the device: a negative `active` means no profile is
/// active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileListing {
    pub active: i32,
    pub available: Vec<i32>,
}

/// One entry of a profile listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub id_chain: IdChain,
    pub type_id: ObjectTypeId,
    pub definition: Vec<u8>,
}

/// Command surface of the controller protocol
///
/// Every call is asynchronous: it returns immediately with a future the
/// caller resolves with a timeout. Integer results follow the device
/// convention that negative values are error codes.
pub trait Protocol: Send + Sync {
    /// Read `len` bytes of the user object at `id_chain` (0 = stored length)
    fn read_value(&self, id_chain: &IdChain, len: usize) -> ResponseFuture<Vec<u8>>;

    /// Write `data` to the user object at `id_chain`; resolves to the echo
    fn write_value(&self, id_chain: &IdChain, data: &[u8]) -> ResponseFuture<Vec<u8>>;

    /// Read `len` bytes of the system object at `id_chain`
    fn read_system_value(&self, id_chain: &IdChain, len: usize) -> ResponseFuture<Vec<u8>>;

    /// Write `data` to the system object at `id_chain`; resolves to the echo
    fn write_system_value(&self, id_chain: &IdChain, data: &[u8]) -> ResponseFuture<Vec<u8>>;

    /// Instantiate an object of `type_id` at `id_chain`
    fn create_object(
        &self,
        id_chain: &IdChain,
        type_id: ObjectTypeId,
        definition: &[u8],
    ) -> ResponseFuture<i32>;

    /// Remove the object at `id_chain`
    fn delete_object(&self, id_chain: &IdChain) -> ResponseFuture<i32>;

    /// First unused slot in the container at `container`
    fn next_slot(&self, container: &IdChain) -> ResponseFuture<i32>;

    /// Allocate a profile; resolves to its id
    fn create_profile(&self) -> ResponseFuture<i32>;

    fn delete_profile(&self, profile: ProfileId) -> ResponseFuture<i32>;

    /// Activate `profile`, or deactivate the current one when `None`
    fn activate_profile(&self, profile: Option<ProfileId>) -> ResponseFuture<i32>;

    fn list_profiles(&self) -> ResponseFuture<ProfileListing>;

    /// Object definitions stored in `profile`
    fn list_profile(&self, profile: ProfileId) -> ResponseFuture<Vec<ObjectDescriptor>>;

    fn reset(&self, flags: ResetFlags) -> ResponseFuture<i32>;
}

/// Global controller-id allocation service
pub trait IdService: Send + Sync {
    /// Acquire a globally unique controller id
    fn acquire(&self) -> Result<u8, IdServiceError>;

    /// Return `id` to the pool
    fn release(&self, id: u8) -> Result<(), IdServiceError>;
}
