//! Capability model for remote objects
//!
//! A concrete object type is assembled from independent capabilities, each
//! a trait:
//!
//! | Capability | Trait | Provides |
//! |------------|-------|----------|
//! | addressable | [`ContainedObject`] | id-chain from (container, slot) |
//! | typed | [`TypedObject`] | constant wire type id |
//! | definable | [`ObjectDefinition`] | definition block codec |
//! | instantiable | [`InstantiableObject`] | binding a proxy after creation, deletion |
//! | readable | [`Readable`] | `read()` through the controller |
//! | writable | [`Writable`] | `write()` through the controller, echo-verified |
//! | container | [`Container`](crate::Container) | hosts objects at slots |
//!
//! Capabilities hold no state of their own; everything delegates to the
//! controller through the proxy's [`ObjectHandle`]. Asking a type for a
//! capability it lacks is a compile error.

use core::fmt;

use fermlink_codec::{ValueDecoder, ValueEncoder};

use crate::address::{Container, ContainerRef, IdChain, Slot};
use crate::controller::Controller;
use crate::error::{Result, ValidationError};
use crate::registry::ObjectTypeId;

/// Identity of a proxy: where it lives and which controller it talks to
///
/// The controller reference is borrowed; proxies never own the controller.
#[derive(Clone)]
pub struct ObjectHandle<'c> {
    controller: &'c Controller,
    container: ContainerRef,
    slot: Slot,
}

impl<'c> ObjectHandle<'c> {
    pub(crate) fn new(controller: &'c Controller, container: ContainerRef, slot: Slot) -> Self {
        Self {
            controller,
            container,
            slot,
        }
    }

    pub fn controller(&self) -> &'c Controller {
        self.controller
    }

    pub fn container(&self) -> &ContainerRef {
        &self.container
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn id_chain(&self) -> IdChain {
        self.container.id_chain_for(self.slot)
    }
}

impl fmt::Debug for ObjectHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("container", &self.container)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Proxy living at a slot of some container
pub trait ContainedObject<'c> {
    fn handle(&self) -> &ObjectHandle<'c>;

    /// Address of this object, derived from its container and slot
    fn id_chain(&self) -> IdChain {
        self.handle().id_chain()
    }

    fn container<'a>(&'a self) -> &'a ContainerRef
    where
        'c: 'a,
    {
        self.handle().container()
    }

    fn slot(&self) -> Slot {
        self.handle().slot()
    }
}

/// Object type with a constant wire type id
pub trait TypedObject {
    const TYPE_ID: ObjectTypeId;
    const NAME: &'static str;
}

/// Codec for the construction parameters sent when creating an object
///
/// Contract: `decode_definition(&encode_definition(args)?)? == *args` for
/// every valid `args`.
pub trait ObjectDefinition {
    type Args: Clone + PartialEq + fmt::Debug;

    /// Encode construction parameters into a definition block
    ///
    /// # Errors
    /// Returns a `ValidationError` for parameters the device would reject
    fn encode_definition(args: &Self::Args) -> core::result::Result<Vec<u8>, ValidationError>;

    /// Decode a definition block back into construction parameters
    fn decode_definition(block: &[u8]) -> core::result::Result<Self::Args, ValidationError>;
}

/// Object type that can be created and deleted on the device
pub trait InstantiableObject<'c>: ContainedObject<'c> + TypedObject + ObjectDefinition + Sized {
    /// Wrap a handle into a proxy of this type (no device call)
    fn bind(handle: ObjectHandle<'c>) -> Self;

    /// Delete the object on the device
    ///
    /// Consumes the proxy: once deleted it cannot be used again.
    fn delete(self) -> Result<()> {
        let controller = self.handle().controller();
        controller.delete_object(&self)
    }
}

/// Object whose value can be read from the device
pub trait Readable<'c>: ContainedObject<'c> {
    type Codec: ValueEncoder;

    fn codec(&self) -> Self::Codec;

    /// Fetch and decode the current value; every call goes to the device
    fn read(&self) -> Result<<Self::Codec as ValueDecoder>::Value> {
        self.handle().controller().read_value(self)
    }
}

/// Object whose value can be written to the device
pub trait Writable<'c>: Readable<'c> {
    /// Encode and write `value`, failing unless the device echoes it back
    fn write(&self, value: &<Self::Codec as ValueDecoder>::Value) -> Result<()> {
        self.handle().controller().write_value(self, value)
    }
}

/// Definition of a type that takes no construction parameters
pub(crate) fn decode_empty_definition(block: &[u8]) -> core::result::Result<(), ValidationError> {
    if block.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::UnexpectedDefinition { len: block.len() })
    }
}

/// Definition that is an opaque, non-empty block
pub(crate) fn non_empty_block(block: &[u8]) -> core::result::Result<Vec<u8>, ValidationError> {
    if block.is_empty() {
        return Err(ValidationError::EmptyBlock);
    }
    Ok(block.to_vec())
}
