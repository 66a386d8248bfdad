//! Controller - Request orchestration against a remote fermentation controller
//!
//! # Purpose
//! Turns every device operation into one blocking round trip: object and
//! profile CRUD, value reads and echo-verified writes, id/clock bootstrap
//! and resets.
//!
//! # Architecture
//! ```text
//! proxy.read() ──▶ Controller::read_value ──▶ fetch_data_block ─┐
//! proxy.write() ─▶ Controller::write_value ─▶ round_trip ◀──────┤
//! create/delete/next_slot/profiles ───────▶ handle_error ───────┘
//!                                               │
//!                           request_lock ─▶ Protocol call ─▶ ResponseFuture::value(timeout)
//! ```
//!
//! `round_trip` is the single place where a response becomes a value, a
//! `Timeout` or `TransportClosed`. `handle_error` turns negative codes into
//! `DeviceOperationFailed` unless the caller tolerates failure, and
//! `fetch_data_block` turns an empty payload into `NoData`.
//!
//! # Testing Strategy
//! - Integration tests: `tests/` drive a controller against the simulated
//!   device in `fermlink-device-mock`

use core::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use fermlink_codec::{ValueDecoder, ValueEncoder};

use crate::address::{Container, ContainerRef, IdChain, RootContainer, RootKind, Slot};
use crate::config::ControllerConfig;
use crate::error::{ConnectorError, Result, ValidationError};
use crate::object::{
    InstantiableObject, ObjectDefinition, ObjectHandle, Readable, TypedObject, Writable,
};
use crate::profile::{Profile, ProfileId};
use crate::protocol::{Command, IdService, ObjectDescriptor, Protocol, ResetFlags};
use crate::reference::{DefinitionArgs, ObjectKind, ObjectReference};
use crate::registry::TypeRegistry;
use crate::response::{Resolution, ResponseFuture};
use crate::types::{
    CurrentTicks, DynamicContainer, SystemClock, SystemId, SYSTEM_ID_SLOT, SYSTEM_TIME_SLOT,
};

/// Stored system id of a controller that has never been assigned one
pub const UNINITIALIZED_ID: u8 = 0xFF;

/// Client-side model of one remote controller
///
/// Owns the user and system root containers. Every proxy it hands out
/// borrows it, so it must outlive them.
pub struct Controller {
    protocol: Arc<dyn Protocol>,
    ids: Arc<dyn IdService>,
    registry: &'static TypeRegistry,
    config: ControllerConfig,
    user_root: RootContainer,
    system_root: RootContainer,
    request_lock: Mutex<()>,
}

impl Controller {
    /// Create a controller with the built-in registry and default config
    ///
    /// # Arguments
    /// * `protocol` - Transport issuing device commands
    /// * `ids` - Global controller-id pool
    pub fn new(protocol: Arc<dyn Protocol>, ids: Arc<dyn IdService>) -> Self {
        Self {
            protocol,
            ids,
            registry: TypeRegistry::builtin(),
            config: ControllerConfig::default(),
            user_root: RootContainer::new(RootKind::User),
            system_root: RootContainer::new(RootKind::System),
            request_lock: Mutex::new(()),
        }
    }

    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `registry` to resolve type ids found in profile listings
    pub fn with_registry(mut self, registry: &'static TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn registry(&self) -> &'static TypeRegistry {
        self.registry
    }

    /// Root of the user object tree (the active profile's objects)
    pub fn root_container(&self) -> &RootContainer {
        &self.user_root
    }

    pub fn system_root(&self) -> &RootContainer {
        &self.system_root
    }

    pub fn system_id(&self) -> SystemId<'_> {
        SystemId::new(ObjectHandle::new(self, self.system_root.container_ref(), SYSTEM_ID_SLOT))
    }

    pub fn system_time(&self) -> SystemClock<'_> {
        SystemClock::new(ObjectHandle::new(
            self,
            self.system_root.container_ref(),
            SYSTEM_TIME_SLOT,
        ))
    }

    /// Make sure the device carries a system id
    ///
    /// Reads the stored id; if it is [`UNINITIALIZED_ID`], a fresh id is
    /// obtained from `fetch_id` and written back.
    ///
    /// # Returns
    /// The id the device carries afterwards
    pub fn initialize(&self, fetch_id: impl FnOnce() -> Result<u8>) -> Result<u8> {
        let id = self.system_id();
        let stored = id.read()?.first().copied().ok_or(ConnectorError::NoData {
            command: Command::ReadSystemValue,
        })?;
        if stored != UNINITIALIZED_ID {
            log::debug!("controller already carries system id {stored}");
            return Ok(stored);
        }

        let fresh = fetch_id()?;
        id.write(&vec![fresh])?;
        log::info!("assigned system id {fresh}");
        Ok(fresh)
    }

    /// [`initialize`](Self::initialize) with ids drawn from the id service
    pub fn initialize_from_pool(&self) -> Result<u8> {
        self.initialize(|| Ok(self.ids.acquire()?))
    }

    /// Fetch and decode the value of `obj`
    ///
    /// Exactly `encoded_len()` bytes are requested; caller-defined buffers
    /// request 0, meaning whatever the device stores.
    ///
    /// # Errors
    /// `NoData` if the device returns an empty payload, `MalformedResponse`
    /// if the payload does not decode
    pub fn read_value<'a, O>(&self, obj: &O) -> Result<<O::Codec as ValueDecoder>::Value>
    where
        O: Readable<'a> + ?Sized,
    {
        let codec = obj.codec();
        let id_chain = obj.id_chain();
        let len = codec.encoded_len().unwrap_or(0);
        let (command, data) = match obj.container().root_kind() {
            RootKind::User => (
                Command::ReadValue,
                self.fetch_data_block(Command::ReadValue, |p| p.read_value(&id_chain, len))?,
            ),
            RootKind::System => (
                Command::ReadSystemValue,
                self.fetch_data_block(Command::ReadSystemValue, |p| {
                    p.read_system_value(&id_chain, len)
                })?,
            ),
        };
        codec
            .decode(&data)
            .map_err(|source| ConnectorError::MalformedResponse { command, source })
    }

    /// Encode and write `value` to `obj`
    ///
    /// # Errors
    /// `EchoMismatch` unless the device echoes exactly the bytes sent
    pub fn write_value<'a, O>(
        &self,
        obj: &O,
        value: &<O::Codec as ValueDecoder>::Value,
    ) -> Result<()>
    where
        O: Writable<'a> + ?Sized,
    {
        let sent = obj
            .codec()
            .encode(value)
            .map_err(ValidationError::InvalidValue)?;
        let id_chain = obj.id_chain();
        let echoed = match obj.container().root_kind() {
            RootKind::User => {
                self.round_trip(Command::WriteValue, |p| p.write_value(&id_chain, &sent))?
            }
            RootKind::System => self.round_trip(Command::WriteSystemValue, |p| {
                p.write_system_value(&id_chain, &sent)
            })?,
        };
        if echoed != sent {
            return Err(ConnectorError::EchoMismatch {
                id_chain,
                sent,
                echoed,
            });
        }
        Ok(())
    }

    /// Delete `obj` on the device; failure is an error
    ///
    /// # Errors
    /// `Validation` before any device call if `obj` lives in the system tree
    pub fn delete_object<'a, O>(&self, obj: &O) -> Result<()>
    where
        O: InstantiableObject<'a>,
    {
        let container = Self::user_tree(obj.container())?;
        self.delete_object_at(&container.id_chain_for(obj.slot()), false).map(|_| ())
    }

    /// Delete whatever lives at `id_chain` in the user tree
    ///
    /// # Arguments
    /// * `tolerate_failure` - Accept a negative device code (e.g. an empty slot)
    ///
    /// # Returns
    /// The device code
    pub fn delete_object_at(&self, id_chain: &IdChain, tolerate_failure: bool) -> Result<i32> {
        self.handle_error(Command::DeleteObject, tolerate_failure, |p| p.delete_object(id_chain))
    }

    /// First unused slot in `container`
    ///
    /// # Errors
    /// `Validation` before any device call for a system-tree container
    pub fn next_slot(&self, container: &dyn Container) -> Result<Slot> {
        let id_chain = Self::user_tree(&container.container_ref())?.id_chain();
        let raw = self.handle_error(Command::NextSlot, false, |p| p.next_slot(&id_chain))?;
        Slot::try_from(raw).map_err(|_| ConnectorError::UnexpectedResponse {
            command: Command::NextSlot,
            detail: format!("slot {raw} is out of range"),
        })
    }

    /// Create an object of type `T` on the device
    ///
    /// # Arguments
    /// * `args` - Construction parameters, validated locally first
    /// * `container` - Hosting container; `None` for the user root
    /// * `slot` - Explicit slot (any existing object there is deleted first),
    ///   or `None` to ask the device for the next free slot
    ///
    /// # Returns
    /// A proxy bound to the new object
    ///
    /// # Errors
    /// `Validation` before any device call if `args` are rejected, do not
    /// survive an encode/decode round trip, or `container` is in the system
    /// tree
    pub fn create_object<'c, T>(
        &'c self,
        args: &T::Args,
        container: Option<&dyn Container>,
        slot: Option<Slot>,
    ) -> Result<T>
    where
        T: InstantiableObject<'c>,
    {
        let block = T::encode_definition(args)?;
        match T::decode_definition(&block) {
            Ok(decoded) if decoded == *args => {}
            _ => {
                return Err(ValidationError::DefinitionMismatch {
                    type_name: T::NAME,
                    encoded: block,
                }
                .into())
            }
        }

        let container = container.map_or_else(ContainerRef::user_root, |c| c.container_ref());
        Self::user_tree(&container)?;
        let slot = match slot {
            Some(slot) => {
                self.delete_object_at(&container.id_chain_for(slot), true)?;
                slot
            }
            None => self.next_slot(&container)?,
        };

        let id_chain = container.id_chain_for(slot);
        self.handle_error(Command::CreateObject, false, |p| {
            p.create_object(&id_chain, T::TYPE_ID, &block)
        })?;
        log::debug!("created {} at {id_chain}", T::NAME);
        Ok(T::bind(ObjectHandle::new(self, container, slot)))
    }

    pub fn create_current_ticks(
        &self,
        container: Option<&dyn Container>,
        slot: Option<Slot>,
    ) -> Result<CurrentTicks<'_>> {
        self.create_object::<CurrentTicks<'_>>(&(), container, slot)
    }

    pub fn create_dynamic_container(
        &self,
        container: Option<&dyn Container>,
        slot: Option<Slot>,
    ) -> Result<DynamicContainer<'_>> {
        self.create_object::<DynamicContainer<'_>>(&(), container, slot)
    }

    /// Allocate a new profile on the device
    pub fn create_profile(&self) -> Result<Profile<'_>> {
        let raw = self.handle_error(Command::CreateProfile, false, |p| p.create_profile())?;
        let id = ProfileId::from_wire(raw).ok_or_else(|| ConnectorError::UnexpectedResponse {
            command: Command::CreateProfile,
            detail: format!("profile id {raw} is out of range"),
        })?;
        log::info!("created profile {id}");
        Ok(Profile::new(self, id))
    }

    /// Delete `profile`
    ///
    /// The active profile is deactivated first, so no profile is active
    /// once it is gone.
    pub fn delete_profile(&self, profile: ProfileId) -> Result<()> {
        if self.is_active_profile(profile)? {
            log::debug!("deactivating profile {profile} before deleting it");
            self.activate_profile(None)?;
        }
        self.handle_error(Command::DeleteProfile, false, |p| p.delete_profile(profile))?;
        log::info!("deleted profile {profile}");
        Ok(())
    }

    /// Activate `profile`, or deactivate the current one when `None`
    pub fn activate_profile(&self, profile: Option<ProfileId>) -> Result<()> {
        self.handle_error(Command::ActivateProfile, false, |p| p.activate_profile(profile))?;
        Ok(())
    }

    /// Active profile (if any) and every available profile, in one round trip
    pub fn active_and_available_profiles(&self) -> Result<(Option<Profile<'_>>, Vec<Profile<'_>>)> {
        let listing = self.round_trip(Command::ListProfiles, |p| p.list_profiles())?;
        let active = self.profile_for(listing.active);
        let available = listing
            .available
            .into_iter()
            .map(|raw| {
                ProfileId::from_wire(raw)
                    .map(|id| Profile::new(self, id))
                    .ok_or_else(|| ConnectorError::UnexpectedResponse {
                        command: Command::ListProfiles,
                        detail: format!("available profile id {raw} is out of range"),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((active, available))
    }

    pub fn is_active_profile(&self, profile: ProfileId) -> Result<bool> {
        let (active, _) = self.active_and_available_profiles()?;
        Ok(active.is_some_and(|active| active.id() == profile))
    }

    /// Proxy for a raw profile id; negative ids mean "no profile"
    pub fn profile_for(&self, raw: i32) -> Option<Profile<'_>> {
        ProfileId::from_wire(raw).map(|id| Profile::new(self, id))
    }

    /// References to every object stored in `profile`
    ///
    /// Type ids the registry does not know are reported as
    /// [`ObjectKind::Unknown`] with their raw definition block.
    pub fn list_objects(&self, profile: ProfileId) -> Result<Vec<ObjectReference>> {
        let descriptors = self.round_trip(Command::ListProfile, |p| p.list_profile(profile))?;
        descriptors
            .into_iter()
            .map(|descriptor| self.materialize(descriptor))
            .collect()
    }

    /// Reset the device
    ///
    /// When erasing, the stored system id is returned to the id service
    /// before the reset is issued; afterwards it is unrecoverable.
    pub fn reset(&self, erase_eeprom: bool, hard_reset: bool) -> Result<()> {
        let mut flags = ResetFlags::empty();
        flags.set(ResetFlags::ERASE_EEPROM, erase_eeprom);
        flags.set(ResetFlags::HARD_RESET, hard_reset);

        if erase_eeprom {
            let stored = self.system_id().read()?;
            match stored.first().copied() {
                Some(id) if id != UNINITIALIZED_ID => {
                    self.ids.release(id)?;
                    log::info!("returned system id {id} to the pool");
                }
                _ => log::debug!("no system id to return before erase"),
            }
        }

        self.handle_error(Command::Reset, false, |p| p.reset(flags))?;
        log::info!("reset issued (flags {:#04x})", flags.bits());
        Ok(())
    }

    /// Delete every profile the device reports as available
    pub fn full_erase(&self) -> Result<()> {
        let (_, available) = self.active_and_available_profiles()?;
        for profile in available {
            self.delete_profile(profile.id())?;
        }
        Ok(())
    }

    /// Rebuild the container chain for `id_chain` under the user root
    ///
    /// Purely client-side; no device call.
    pub fn container_for(&self, id_chain: &IdChain) -> ContainerRef {
        ContainerRef::from_id_chain(self.user_root.kind(), id_chain)
    }

    /// Build a reference to an object of type `T` at `id_chain`
    ///
    /// Types without construction parameters get `args: None`, as they do
    /// in a profile listing.
    ///
    /// # Errors
    /// `Validation` if `id_chain` is empty
    pub fn reference_for<T>(&self, args: T::Args, id_chain: &IdChain) -> Result<ObjectReference>
    where
        T: TypedObject + ObjectDefinition,
        T::Args: Into<DefinitionArgs>,
    {
        let (prefix, slot) = id_chain
            .split_last()
            .ok_or_else(|| ValidationError::RootAddress(id_chain.clone()))?;
        Ok(ObjectReference {
            container: self.container_for(&prefix),
            slot,
            kind: ObjectKind::Known {
                type_id: T::TYPE_ID,
                name: T::NAME,
            },
            args: match args.into() {
                DefinitionArgs::Empty => None,
                args => Some(args),
            },
        })
    }

    /// Object creation and deletion only ever address the user tree
    fn user_tree(container: &ContainerRef) -> Result<&ContainerRef> {
        match container.root_kind() {
            RootKind::User => Ok(container),
            RootKind::System => Err(ValidationError::SystemTree.into()),
        }
    }

    fn materialize(&self, descriptor: ObjectDescriptor) -> Result<ObjectReference> {
        let ObjectDescriptor {
            id_chain,
            type_id,
            definition,
        } = descriptor;
        let (prefix, slot) = id_chain
            .split_last()
            .ok_or_else(|| ConnectorError::UnexpectedResponse {
                command: Command::ListProfile,
                detail: "object descriptor with an empty id-chain".into(),
            })?;

        let (kind, args) = match self.registry.from_id(type_id) {
            Some(ty) => {
                let args = if definition.is_empty() {
                    None
                } else {
                    let args = ty.decode_definition(&definition).map_err(|err| {
                        ConnectorError::UnexpectedResponse {
                            command: Command::ListProfile,
                            detail: format!("definition of {} at {id_chain}: {err}", ty.name()),
                        }
                    })?;
                    Some(args)
                };
                let kind = ObjectKind::Known {
                    type_id,
                    name: ty.name(),
                };
                (kind, args)
            }
            None => {
                log::warn!("object at {id_chain} has unknown type id {type_id}");
                let args = (!definition.is_empty()).then_some(DefinitionArgs::Unparsed(definition));
                (ObjectKind::Unknown(type_id), args)
            }
        };

        Ok(ObjectReference {
            container: self.container_for(&prefix),
            slot,
            kind,
            args,
        })
    }

    /// Issue one request and wait for its response
    ///
    /// Round trips are serialized; the lock is held until the response
    /// resolves or times out.
    fn round_trip<T>(
        &self,
        command: Command,
        issue: impl FnOnce(&dyn Protocol) -> ResponseFuture<T>,
    ) -> Result<T> {
        let _guard = self.request_lock.lock().unwrap_or_else(PoisonError::into_inner);
        log::trace!("{command}: request issued");
        let timeout = self.config.timeout;
        match issue(self.protocol.as_ref()).value(timeout) {
            Resolution::Ready(value) => Ok(value),
            Resolution::TimedOut => {
                log::warn!("{command}: no response within {timeout:?}");
                Err(ConnectorError::Timeout { command, timeout })
            }
            Resolution::Closed => {
                log::warn!("{command}: transport dropped the request");
                Err(ConnectorError::TransportClosed { command })
            }
        }
    }

    /// Round trip whose result is a device code; negative codes are
    /// failures unless `tolerate_failure`
    fn handle_error(
        &self,
        command: Command,
        tolerate_failure: bool,
        issue: impl FnOnce(&dyn Protocol) -> ResponseFuture<i32>,
    ) -> Result<i32> {
        let code = self.round_trip(command, issue)?;
        if code < 0 {
            if !tolerate_failure {
                return Err(ConnectorError::DeviceOperationFailed { command, code });
            }
            log::debug!("{command}: tolerated device error code {code}");
        }
        Ok(code)
    }

    /// Round trip that must yield a non-empty payload
    fn fetch_data_block(
        &self,
        command: Command,
        issue: impl FnOnce(&dyn Protocol) -> ResponseFuture<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let data = self.round_trip(command, issue)?;
        if data.is_empty() {
            return Err(ConnectorError::NoData { command });
        }
        Ok(data)
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("registered_types", &self.registry.len())
            .finish_non_exhaustive()
    }
}
