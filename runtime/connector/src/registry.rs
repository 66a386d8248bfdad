//! Type Registry - Wire type id to concrete object type
//!
//! The built-in registry is built once per process and never torn down.
//! Custom registries can be assembled with [`TypeRegistry::with_types`] and
//! handed to a controller through `Controller::with_registry`.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use static_assertions::const_assert;
use thiserror::Error;

use crate::error::ValidationError;
use crate::object::{ObjectDefinition, TypedObject};
use crate::reference::DefinitionArgs;
use crate::types::{CurrentTicks, DynamicContainer, PersistChangeValue, PersistentValue};

/// Wire tag identifying a concrete object type
pub type ObjectTypeId = u8;

type DecodeFn = fn(&[u8]) -> Result<DefinitionArgs, ValidationError>;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("type id {type_id} registered for both {first} and {second}")]
    DuplicateTypeId {
        type_id: ObjectTypeId,
        first: &'static str,
        second: &'static str,
    },
}

/// Registry entry: a concrete type with its definition decoder
#[derive(Clone, Copy)]
pub struct ObjectType {
    type_id: ObjectTypeId,
    name: &'static str,
    decode: DecodeFn,
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectType")
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .finish()
    }
}

impl ObjectType {
    /// Entry for the concrete type `T`
    pub fn of<T>() -> Self
    where
        T: TypedObject + ObjectDefinition,
        T::Args: Into<DefinitionArgs>,
    {
        Self {
            type_id: T::TYPE_ID,
            name: T::NAME,
            decode: decode_definition::<T>,
        }
    }

    pub fn type_id(&self) -> ObjectTypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Decode a definition block with this type's definition codec
    pub fn decode_definition(&self, block: &[u8]) -> Result<DefinitionArgs, ValidationError> {
        (self.decode)(block)
    }
}

fn decode_definition<T>(block: &[u8]) -> Result<DefinitionArgs, ValidationError>
where
    T: ObjectDefinition,
    T::Args: Into<DefinitionArgs>,
{
    T::decode_definition(block).map(Into::into)
}

const BUILTIN_TYPE_IDS: [ObjectTypeId; 4] = [
    <CurrentTicks<'static> as TypedObject>::TYPE_ID,
    <DynamicContainer<'static> as TypedObject>::TYPE_ID,
    <PersistentValue<'static> as TypedObject>::TYPE_ID,
    <PersistChangeValue<'static> as TypedObject>::TYPE_ID,
];

const fn all_distinct(ids: &[ObjectTypeId]) -> bool {
    let mut i = 0;
    while i < ids.len() {
        let mut j = i + 1;
        while j < ids.len() {
            if ids[i] == ids[j] {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const_assert!(all_distinct(&BUILTIN_TYPE_IDS));

fn builtin_types() -> [ObjectType; 4] {
    [
        ObjectType::of::<CurrentTicks<'static>>(),
        ObjectType::of::<DynamicContainer<'static>>(),
        ObjectType::of::<PersistentValue<'static>>(),
        ObjectType::of::<PersistChangeValue<'static>>(),
    ]
}

/// Immutable map from type id to concrete type
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<ObjectTypeId, ObjectType>,
}

impl TypeRegistry {
    /// Process-wide registry of the built-in object types
    pub fn builtin() -> &'static TypeRegistry {
        static BUILTIN: OnceLock<TypeRegistry> = OnceLock::new();
        BUILTIN.get_or_init(|| TypeRegistry {
            types: builtin_types()
                .into_iter()
                .map(|ty| (ty.type_id, ty))
                .collect(),
        })
    }

    /// Build a registry from `types`
    ///
    /// # Errors
    /// Returns `RegistryError::DuplicateTypeId` if two entries share an id
    pub fn with_types(types: impl IntoIterator<Item = ObjectType>) -> Result<Self, RegistryError> {
        let mut map = BTreeMap::new();
        for ty in types {
            if let Some(existing) = map.insert(ty.type_id, ty) {
                return Err(RegistryError::DuplicateTypeId {
                    type_id: ty.type_id,
                    first: existing.name,
                    second: ty.name,
                });
            }
        }
        Ok(Self { types: map })
    }

    /// Look up the concrete type for `type_id`
    pub fn from_id(&self, type_id: ObjectTypeId) -> Option<&ObjectType> {
        self.types.get(&type_id)
    }

    pub fn contains(&self, type_id: ObjectTypeId) -> bool {
        self.types.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectType> {
        self.types.values()
    }
}
