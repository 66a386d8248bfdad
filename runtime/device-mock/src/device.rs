//! Simulated controller firmware
//!
//! Object values live in memory: `CurrentTicks` reads the device tick
//! counter, `PersistentValue` and `PersistChangeValue` start from their
//! definition blocks and are replaced by writes. System slot 0 holds the
//! system id and slot 1 the 6-byte clock.
//!
//! Like the firmware, deleting a profile does not change which profile is
//! marked active.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use fermlink_connector::{
    Command, CurrentTicks, DynamicContainer, IdChain, ObjectDescriptor, ObjectTypeId,
    PendingRequests, PersistChangeValue, ProfileId, ProfileListing, Protocol, ResetFlags,
    ResponseFuture, TypedObject, SYSTEM_ID_SLOT, SYSTEM_TIME_SLOT, UNINITIALIZED_ID,
};

/// Device error codes (all negative, 0 = success)
pub const ERR_INVALID_ADDRESS: i32 = -1;
pub const ERR_NO_SUCH_OBJECT: i32 = -2;
pub const ERR_SLOT_OCCUPIED: i32 = -3;
pub const ERR_INVALID_CONTAINER: i32 = -4;
pub const ERR_INVALID_DEFINITION: i32 = -5;
pub const ERR_NO_ACTIVE_PROFILE: i32 = -6;
pub const ERR_NO_SUCH_PROFILE: i32 = -7;
pub const ERR_NO_FREE_PROFILE: i32 = -8;
pub const ERR_NO_FREE_SLOT: i32 = -9;

/// Highest slot index a container hands out
pub const MAX_SLOT: u8 = 127;

const CURRENT_TICKS: ObjectTypeId = <CurrentTicks<'static> as TypedObject>::TYPE_ID;
const DYNAMIC_CONTAINER: ObjectTypeId = <DynamicContainer<'static> as TypedObject>::TYPE_ID;
const PERSIST_CHANGE_VALUE: ObjectTypeId = <PersistChangeValue<'static> as TypedObject>::TYPE_ID;

const CLOCK_LEN: usize = 6;

/// Power-on state of a simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct DeviceConfig {
    /// Stored system id (`0xFF` = never assigned)
    pub system_id: u8,
    /// Initial tick counter
    pub ticks: i32,
    /// Number of profile slots in persistent storage
    pub max_profiles: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            system_id: UNINITIALIZED_ID,
            ticks: 0,
            max_profiles: 4,
        }
    }
}

/// One request as received by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadValue { id_chain: IdChain, len: usize },
    WriteValue { id_chain: IdChain, data: Vec<u8> },
    ReadSystemValue { id_chain: IdChain, len: usize },
    WriteSystemValue { id_chain: IdChain, data: Vec<u8> },
    CreateObject {
        id_chain: IdChain,
        type_id: ObjectTypeId,
        definition: Vec<u8>,
    },
    DeleteObject { id_chain: IdChain },
    NextSlot { container: IdChain },
    CreateProfile,
    DeleteProfile(ProfileId),
    ActivateProfile(Option<ProfileId>),
    ListProfiles,
    ListProfile(ProfileId),
    Reset(ResetFlags),
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::ReadValue { .. } => Command::ReadValue,
            Request::WriteValue { .. } => Command::WriteValue,
            Request::ReadSystemValue { .. } => Command::ReadSystemValue,
            Request::WriteSystemValue { .. } => Command::WriteSystemValue,
            Request::CreateObject { .. } => Command::CreateObject,
            Request::DeleteObject { .. } => Command::DeleteObject,
            Request::NextSlot { .. } => Command::NextSlot,
            Request::CreateProfile => Command::CreateProfile,
            Request::DeleteProfile(_) => Command::DeleteProfile,
            Request::ActivateProfile(_) => Command::ActivateProfile,
            Request::ListProfiles => Command::ListProfiles,
            Request::ListProfile(_) => Command::ListProfile,
            Request::Reset(_) => Command::Reset,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    type_id: ObjectTypeId,
    definition: Vec<u8>,
    value: Vec<u8>,
}

impl StoredObject {
    fn new(type_id: ObjectTypeId, definition: &[u8]) -> Self {
        let value = match type_id {
            CURRENT_TICKS | DYNAMIC_CONTAINER => Vec::new(),
            PERSIST_CHANGE_VALUE => definition.iter().copied().take(2).collect(),
            _ => definition.to_vec(),
        };
        Self {
            type_id,
            definition: definition.to_vec(),
            value,
        }
    }

    fn is_writable(&self, data: &[u8]) -> bool {
        match self.type_id {
            CURRENT_TICKS | DYNAMIC_CONTAINER => false,
            PERSIST_CHANGE_VALUE => data.len() == 2,
            _ => !data.is_empty(),
        }
    }
}

fn definition_is_valid(type_id: ObjectTypeId, definition: &[u8]) -> bool {
    match type_id {
        CURRENT_TICKS | DYNAMIC_CONTAINER => definition.is_empty(),
        PERSIST_CHANGE_VALUE => definition.len() == 4,
        _ => true,
    }
}

type ObjectTable = BTreeMap<IdChain, StoredObject>;

fn is_container(objects: &ObjectTable, id_chain: &IdChain) -> bool {
    id_chain.is_root()
        || objects
            .get(id_chain)
            .is_some_and(|obj| obj.type_id == DYNAMIC_CONTAINER)
}

#[derive(Debug)]
struct DeviceState {
    system_id: u8,
    clock: [u8; CLOCK_LEN],
    ticks: i32,
    max_profiles: u8,
    profiles: BTreeMap<ProfileId, ObjectTable>,
    active: Option<ProfileId>,
    requests: Vec<Request>,
    failures: HashMap<Command, i32>,
    corrupt_echo: bool,
    stalled: HashSet<Command>,
}

impl DeviceState {
    fn new(config: DeviceConfig) -> Self {
        Self {
            system_id: config.system_id,
            clock: [0; CLOCK_LEN],
            ticks: config.ticks,
            max_profiles: config.max_profiles,
            profiles: BTreeMap::new(),
            active: None,
            requests: Vec::new(),
            failures: HashMap::new(),
            corrupt_echo: false,
            stalled: HashSet::new(),
        }
    }

    fn active_objects(&mut self) -> Option<&mut ObjectTable> {
        let active = self.active?;
        self.profiles.get_mut(&active)
    }

    fn read_user(&mut self, id_chain: &IdChain) -> Vec<u8> {
        let ticks = self.ticks;
        let Some(objects) = self.active_objects() else {
            return Vec::new();
        };
        match objects.get(id_chain) {
            Some(obj) if obj.type_id == CURRENT_TICKS => ticks.to_le_bytes().to_vec(),
            Some(obj) => obj.value.clone(),
            None => Vec::new(),
        }
    }

    fn write_user(&mut self, id_chain: &IdChain, data: &[u8]) -> Vec<u8> {
        let Some(objects) = self.active_objects() else {
            return Vec::new();
        };
        let written = match objects.get_mut(id_chain) {
            Some(obj) if obj.is_writable(data) => {
                obj.value = data.to_vec();
                true
            }
            _ => false,
        };
        if written {
            self.echo(data)
        } else {
            Vec::new()
        }
    }

    fn read_system(&self, id_chain: &IdChain) -> Vec<u8> {
        match id_chain.as_slice() {
            [SYSTEM_ID_SLOT] => vec![self.system_id],
            [SYSTEM_TIME_SLOT] => self.clock.to_vec(),
            _ => Vec::new(),
        }
    }

    fn write_system(&mut self, id_chain: &IdChain, data: &[u8]) -> Vec<u8> {
        match (id_chain.as_slice(), data) {
            ([SYSTEM_ID_SLOT], [id]) => self.system_id = *id,
            ([SYSTEM_TIME_SLOT], _) if data.len() == CLOCK_LEN => self.clock.copy_from_slice(data),
            _ => return Vec::new(),
        }
        self.echo(data)
    }

    fn echo(&mut self, data: &[u8]) -> Vec<u8> {
        let mut echo = data.to_vec();
        if std::mem::take(&mut self.corrupt_echo) {
            if let Some(last) = echo.last_mut() {
                *last ^= 0xFF;
            }
        }
        echo
    }

    fn create_object(
        &mut self,
        id_chain: &IdChain,
        type_id: ObjectTypeId,
        definition: &[u8],
    ) -> i32 {
        let Some((parent, _)) = id_chain.split_last() else {
            return ERR_INVALID_ADDRESS;
        };
        if !definition_is_valid(type_id, definition) {
            return ERR_INVALID_DEFINITION;
        }
        let Some(objects) = self.active_objects() else {
            return ERR_NO_ACTIVE_PROFILE;
        };
        if !is_container(objects, &parent) {
            return ERR_INVALID_CONTAINER;
        }
        if objects.contains_key(id_chain) {
            return ERR_SLOT_OCCUPIED;
        }
        objects.insert(id_chain.clone(), StoredObject::new(type_id, definition));
        0
    }

    fn delete_object(&mut self, id_chain: &IdChain) -> i32 {
        let Some(objects) = self.active_objects() else {
            return ERR_NO_ACTIVE_PROFILE;
        };
        if objects.remove(id_chain).is_none() {
            return ERR_NO_SUCH_OBJECT;
        }
        // Deleting a container deletes everything inside it
        objects.retain(|chain, _| !chain.as_slice().starts_with(id_chain.as_slice()));
        0
    }

    fn next_slot(&mut self, container: &IdChain) -> i32 {
        let Some(objects) = self.active_objects() else {
            return ERR_NO_ACTIVE_PROFILE;
        };
        if !is_container(objects, container) {
            return ERR_INVALID_CONTAINER;
        }
        (0..=MAX_SLOT)
            .find(|slot| !objects.contains_key(&container.child(*slot)))
            .map_or(ERR_NO_FREE_SLOT, i32::from)
    }

    fn create_profile(&mut self) -> i32 {
        let free = (0..self.max_profiles)
            .map(ProfileId::new)
            .find(|id| !self.profiles.contains_key(id));
        match free {
            Some(id) => {
                self.profiles.insert(id, ObjectTable::new());
                i32::from(id.get())
            }
            None => ERR_NO_FREE_PROFILE,
        }
    }

    fn delete_profile(&mut self, profile: ProfileId) -> i32 {
        self.profiles
            .remove(&profile)
            .map_or(ERR_NO_SUCH_PROFILE, |_| 0)
    }

    fn activate_profile(&mut self, profile: Option<ProfileId>) -> i32 {
        match profile {
            Some(id) if !self.profiles.contains_key(&id) => ERR_NO_SUCH_PROFILE,
            _ => {
                self.active = profile;
                0
            }
        }
    }

    fn list_profiles(&self) -> ProfileListing {
        ProfileListing {
            active: ProfileId::to_wire(self.active),
            available: self.profiles.keys().map(|id| i32::from(id.get())).collect(),
        }
    }

    fn list_profile(&self, profile: ProfileId) -> Vec<ObjectDescriptor> {
        self.profiles
            .get(&profile)
            .map(|objects| {
                objects
                    .iter()
                    .map(|(id_chain, obj)| ObjectDescriptor {
                        id_chain: id_chain.clone(),
                        type_id: obj.type_id,
                        definition: obj.definition.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn reset(&mut self, flags: ResetFlags) -> i32 {
        if flags.contains(ResetFlags::ERASE_EEPROM) {
            self.profiles.clear();
            self.active = None;
            self.system_id = UNINITIALIZED_ID;
        }
        if flags.contains(ResetFlags::HARD_RESET) {
            self.ticks = 0;
            self.clock = [0; CLOCK_LEN];
        }
        0
    }
}

/// In-memory controller implementing [`Protocol`]
///
/// Every request is logged and answered immediately unless a fault has been
/// injected for its command:
/// - [`fail_next`](Self::fail_next): the next request answers with an error
///   code (or an empty payload for data commands)
/// - [`corrupt_next_echo`](Self::corrupt_next_echo): the next write echo has
///   its last byte flipped
/// - [`stall`](Self::stall): requests stay pending until completed by hand
///   or cancelled by the caller's timeout
pub struct MockDevice {
    state: Mutex<DeviceState>,
    stalled_codes: PendingRequests<Command, i32>,
    stalled_data: PendingRequests<Command, Vec<u8>>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new(DeviceConfig::default())
    }
}

impl MockDevice {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            state: Mutex::new(DeviceState::new(config)),
            stalled_codes: PendingRequests::new(),
            stalled_data: PendingRequests::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn system_id(&self) -> u8 {
        self.lock().system_id
    }

    pub fn ticks(&self) -> i32 {
        self.lock().ticks
    }

    pub fn set_ticks(&self, ticks: i32) {
        self.lock().ticks = ticks;
    }

    pub fn advance_ticks(&self, delta: i32) {
        let mut state = self.lock();
        state.ticks = state.ticks.wrapping_add(delta);
    }

    pub fn active_profile(&self) -> Option<ProfileId> {
        self.lock().active
    }

    pub fn profile_ids(&self) -> Vec<ProfileId> {
        self.lock().profiles.keys().copied().collect()
    }

    /// Descriptors of the objects stored in `profile`
    pub fn objects(&self, profile: ProfileId) -> Vec<ObjectDescriptor> {
        self.lock().list_profile(profile)
    }

    /// Store an object directly, bypassing the command surface
    ///
    /// Allows seeding types the client does not model. Returns the device
    /// code the equivalent create would have produced.
    pub fn insert_object(
        &self,
        profile: ProfileId,
        id_chain: IdChain,
        type_id: ObjectTypeId,
        definition: &[u8],
    ) -> i32 {
        let mut state = self.lock();
        match state.profiles.get_mut(&profile) {
            Some(objects) => {
                objects.insert(id_chain, StoredObject::new(type_id, definition));
                0
            }
            None => ERR_NO_SUCH_PROFILE,
        }
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    /// Answer the next `command` with `code` instead of executing it
    pub fn fail_next(&self, command: Command, code: i32) {
        self.lock().failures.insert(command, code);
    }

    pub fn corrupt_next_echo(&self) {
        self.lock().corrupt_echo = true;
    }

    /// Leave requests for `command` unanswered
    ///
    /// Only commands answered with a code or a byte payload can be stalled.
    pub fn stall(&self, command: Command) {
        self.lock().stalled.insert(command);
    }

    pub fn resume(&self, command: Command) {
        self.lock().stalled.remove(&command);
    }

    /// Stalled requests still waiting for an answer
    pub fn pending_len(&self) -> usize {
        self.stalled_codes.len() + self.stalled_data.len()
    }

    /// Deliver a late code to a stalled request; `false` if none is waiting
    pub fn complete_stalled_code(&self, command: Command, code: i32) -> bool {
        self.stalled_codes.complete(&command, code)
    }

    /// Deliver a late payload to a stalled request; `false` if none is waiting
    pub fn complete_stalled_data(&self, command: Command, data: Vec<u8>) -> bool {
        self.stalled_data.complete(&command, data)
    }

    fn respond<T>(
        &self,
        request: Request,
        stall_table: Option<&PendingRequests<Command, T>>,
        failed: impl FnOnce(i32) -> T,
        execute: impl FnOnce(&mut DeviceState) -> T,
    ) -> ResponseFuture<T>
    where
        T: Send + 'static,
    {
        let command = request.command();
        let mut state = self.lock();
        log::trace!("simulated device received {request:?}");
        state.requests.push(request);

        if let Some(table) = stall_table.filter(|_| state.stalled.contains(&command)) {
            log::debug!("stalling {command}");
            return table.register(command);
        }
        if let Some(code) = state.failures.remove(&command) {
            log::debug!("injected failure {code} for {command}");
            return ResponseFuture::ready(failed(code));
        }
        ResponseFuture::ready(execute(&mut *state))
    }

    fn respond_code(
        &self,
        request: Request,
        execute: impl FnOnce(&mut DeviceState) -> i32,
    ) -> ResponseFuture<i32> {
        self.respond(request, Some(&self.stalled_codes), |code| code, execute)
    }

    fn respond_data(
        &self,
        request: Request,
        execute: impl FnOnce(&mut DeviceState) -> Vec<u8>,
    ) -> ResponseFuture<Vec<u8>> {
        self.respond(request, Some(&self.stalled_data), |_| Vec::new(), execute)
    }
}

impl Protocol for MockDevice {
    fn read_value(&self, id_chain: &IdChain, len: usize) -> ResponseFuture<Vec<u8>> {
        let request = Request::ReadValue {
            id_chain: id_chain.clone(),
            len,
        };
        self.respond_data(request, |state| state.read_user(id_chain))
    }

    fn write_value(&self, id_chain: &IdChain, data: &[u8]) -> ResponseFuture<Vec<u8>> {
        let request = Request::WriteValue {
            id_chain: id_chain.clone(),
            data: data.to_vec(),
        };
        self.respond_data(request, |state| state.write_user(id_chain, data))
    }

    fn read_system_value(&self, id_chain: &IdChain, len: usize) -> ResponseFuture<Vec<u8>> {
        let request = Request::ReadSystemValue {
            id_chain: id_chain.clone(),
            len,
        };
        self.respond_data(request, |state| state.read_system(id_chain))
    }

    fn write_system_value(&self, id_chain: &IdChain, data: &[u8]) -> ResponseFuture<Vec<u8>> {
        let request = Request::WriteSystemValue {
            id_chain: id_chain.clone(),
            data: data.to_vec(),
        };
        self.respond_data(request, |state| state.write_system(id_chain, data))
    }

    fn create_object(
        &self,
        id_chain: &IdChain,
        type_id: ObjectTypeId,
        definition: &[u8],
    ) -> ResponseFuture<i32> {
        let request = Request::CreateObject {
            id_chain: id_chain.clone(),
            type_id,
            definition: definition.to_vec(),
        };
        self.respond_code(request, |state| state.create_object(id_chain, type_id, definition))
    }

    fn delete_object(&self, id_chain: &IdChain) -> ResponseFuture<i32> {
        let request = Request::DeleteObject {
            id_chain: id_chain.clone(),
        };
        self.respond_code(request, |state| state.delete_object(id_chain))
    }

    fn next_slot(&self, container: &IdChain) -> ResponseFuture<i32> {
        let request = Request::NextSlot {
            container: container.clone(),
        };
        self.respond_code(request, |state| state.next_slot(container))
    }

    fn create_profile(&self) -> ResponseFuture<i32> {
        self.respond_code(Request::CreateProfile, DeviceState::create_profile)
    }

    fn delete_profile(&self, profile: ProfileId) -> ResponseFuture<i32> {
        self.respond_code(Request::DeleteProfile(profile), |state| state.delete_profile(profile))
    }

    fn activate_profile(&self, profile: Option<ProfileId>) -> ResponseFuture<i32> {
        self.respond_code(Request::ActivateProfile(profile), |state| {
            state.activate_profile(profile)
        })
    }

    fn list_profiles(&self) -> ResponseFuture<ProfileListing> {
        self.respond(Request::ListProfiles, None, |_| ProfileListing::default(), |state| {
            state.list_profiles()
        })
    }

    fn list_profile(&self, profile: ProfileId) -> ResponseFuture<Vec<ObjectDescriptor>> {
        self.respond(Request::ListProfile(profile), None, |_| Vec::new(), |state| {
            state.list_profile(profile)
        })
    }

    fn reset(&self, flags: ResetFlags) -> ResponseFuture<i32> {
        self.respond_code(Request::Reset(flags), |state| state.reset(flags))
    }
}
