//! Object References - Inert descriptions of objects stored on the device
//!
//! Listing a profile yields [`ObjectReference`]s rather than live proxies:
//! a reference records where an object lives, what type it is and the
//! arguments it was created with, and can be resolved into a proxy later.

use crate::address::{Container, ContainerRef, IdChain, Slot};
use crate::controller::Controller;
use crate::error::{ConnectorError, Result};
use crate::object::{InstantiableObject, ObjectHandle, TypedObject};
use crate::registry::ObjectTypeId;
use crate::types::ValueThreshold;

/// Decoded construction parameters, independent of the concrete type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DefinitionArgs {
    /// Type that takes no parameters
    Empty,
    /// Opaque block (e.g. `PersistentValue`)
    Block(Vec<u8>),
    /// Value and change threshold (`PersistChangeValue`)
    ValueThreshold(ValueThreshold),
    /// Raw block of a type the registry does not know
    Unparsed(Vec<u8>),
}

impl From<()> for DefinitionArgs {
    fn from(_: ()) -> Self {
        DefinitionArgs::Empty
    }
}

impl From<Vec<u8>> for DefinitionArgs {
    fn from(block: Vec<u8>) -> Self {
        DefinitionArgs::Block(block)
    }
}

impl From<ValueThreshold> for DefinitionArgs {
    fn from(args: ValueThreshold) -> Self {
        DefinitionArgs::ValueThreshold(args)
    }
}

/// Concrete type of a referenced object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Type found in the controller's registry
    Known {
        type_id: ObjectTypeId,
        name: &'static str,
    },
    /// Type id the registry has no entry for
    Unknown(ObjectTypeId),
}

impl ObjectKind {
    pub fn type_id(&self) -> ObjectTypeId {
        match self {
            ObjectKind::Known { type_id, .. } => *type_id,
            ObjectKind::Unknown(type_id) => *type_id,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, ObjectKind::Known { .. })
    }
}

/// Reference to an object in the controller: location, type and arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectReference {
    pub container: ContainerRef,
    pub slot: Slot,
    pub kind: ObjectKind,
    /// `None` when the device holds no definition block for the object
    pub args: Option<DefinitionArgs>,
}

impl ObjectReference {
    pub fn id_chain(&self) -> IdChain {
        self.container.id_chain_for(self.slot)
    }

    /// Bind this reference to a live proxy of type `T`
    ///
    /// No device call is made.
    ///
    /// # Errors
    /// Returns `ConnectorError::TypeMismatch` if the reference is not of
    /// type `T`
    pub fn resolve<'c, T: InstantiableObject<'c>>(&self, controller: &'c Controller) -> Result<T> {
        let found = self.kind.type_id();
        if found != T::TYPE_ID {
            return Err(ConnectorError::TypeMismatch {
                expected: T::TYPE_ID,
                found,
            });
        }
        Ok(T::bind(ObjectHandle::new(controller, self.container.clone(), self.slot)))
    }

    /// True if this reference describes an object of type `T`
    pub fn is<T: TypedObject>(&self) -> bool {
        self.kind.type_id() == T::TYPE_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CurrentTicks, PersistChangeValue};

    #[test]
    fn test_reference_equality() {
        let container = ContainerRef::user_root().nested(1);
        let a = ObjectReference {
            container: container.clone(),
            slot: 2,
            kind: ObjectKind::Known {
                type_id: 9,
                name: "PersistChangeValue",
            },
            args: Some(ValueThreshold::new(100, 5).into()),
        };
        let b = a.clone();
        assert_eq!(a, b);

        let moved = ObjectReference { slot: 3, ..b };
        assert_ne!(a, moved);
        assert_eq!(a.id_chain(), IdChain::from([1, 2]));
    }

    #[test]
    fn test_kind_queries() {
        let reference = ObjectReference {
            container: ContainerRef::user_root(),
            slot: 0,
            kind: ObjectKind::Known {
                type_id: 3,
                name: "CurrentTicks",
            },
            args: None,
        };
        assert!(reference.is::<CurrentTicks<'static>>());
        assert!(!reference.is::<PersistChangeValue<'static>>());
        assert!(!ObjectKind::Unknown(6).is_known());
        assert_eq!(ObjectKind::Unknown(6).type_id(), 6);
    }
}
