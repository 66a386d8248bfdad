//! Fermlink Connector - Object model for a remote fermentation controller
//!
//! # Purpose
//! Exposes the controller's memory as a tree of addressable slots and turns
//! each device operation into a synchronous, timeout-bounded round trip over
//! an asynchronous transport.
//!
//! # Integration Points
//! - Depends on: `fermlink-codec` for value and definition encodings
//! - Consumes: a [`Protocol`] transport and an [`IdService`] id pool
//! - Provides to: applications and tools driving a controller
//!
//! # Architecture
//! ```text
//! ┌──────────────────────────── Controller ────────────────────────────┐
//! │ user root ── containers ── proxies (CurrentTicks, PersistentValue…) │
//! │ system root ── SystemId, SystemClock                                │
//! │ TypeRegistry ── ObjectReference ── Profile                          │
//! └──────────────── round_trip (request lock + timeout) ───────────────┘
//!                                  │
//!                     Protocol ── ResponseFuture ── PendingRequests
//! ```
//! Proxies are cheap client-side values holding a borrowed controller, a
//! container and a slot. Object capabilities are traits, so asking a type
//! for an operation it does not support fails to compile.
//!
//! # Testing Strategy
//! - Unit tests: addressing, definitions, registry, response futures
//! - Integration tests: controller operations against the simulated device
//!
//! # Example
//! ```ignore
//! let controller = Controller::new(transport, id_pool);
//! controller.initialize_from_pool()?;
//! let profile = controller.create_profile()?;
//! profile.activate()?;
//! let ticks = controller.create_current_ticks(None, Some(2))?;
//! let now = ticks.read()?;
//! ```

mod address;
mod config;
mod controller;
mod error;
mod object;
mod profile;
mod protocol;
mod reference;
mod registry;
mod response;
mod types;

pub use address::{Container, ContainerRef, IdChain, RootContainer, RootKind, Slot};
pub use config::{ControllerConfig, DEFAULT_TIMEOUT};
pub use controller::{Controller, UNINITIALIZED_ID};
pub use error::{ConnectorError, IdServiceError, Result, ValidationError};
pub use object::{
    ContainedObject, InstantiableObject, ObjectDefinition, ObjectHandle, Readable, TypedObject,
    Writable,
};
pub use profile::{Profile, ProfileId, NO_PROFILE};
pub use protocol::{Command, IdService, ObjectDescriptor, ProfileListing, Protocol, ResetFlags};
pub use reference::{DefinitionArgs, ObjectKind, ObjectReference};
pub use registry::{ObjectType, ObjectTypeId, RegistryError, TypeRegistry};
pub use response::{PendingRequests, Resolution, ResponseFuture, Ticket};
pub use types::{
    CurrentTicks, DynamicContainer, PersistChangeValue, PersistentValue, SystemClock, SystemId,
    ValueThreshold, SYSTEM_ID_SLOT, SYSTEM_TIME_SLOT,
};

pub use fermlink_codec as codec;
