//! Concrete remote object types
//!
//! Each type is defined by the capabilities it implements, never by
//! re-deriving codec logic:
//!
//! | Type | Id | Capabilities | Value | Definition |
//! |------|----|--------------|-------|------------|
//! | [`CurrentTicks`] | 3 | Readable | Long | none |
//! | [`DynamicContainer`] | 4 | Container | none | none |
//! | [`PersistentValue`] | 5 | Readable + Writable | Buffer | non-empty block |
//! | [`PersistChangeValue`] | 9 | Readable + Writable | Short | value + threshold |
//! | [`SystemId`] | system slot 0 | Readable + Writable | 1-byte Buffer | not instantiable |
//! | [`SystemClock`] | system slot 1 | Readable + Writable | SystemTime | not instantiable |

use fermlink_codec::{
    BufferCodec, LongCodec, ShortCodec, SystemTimeCodec, ValueDecoder, ValueEncoder,
    ValueThresholdCodec,
};

use crate::address::{Container, ContainerRef, Slot};
use crate::error::ValidationError;
use crate::object::{
    decode_empty_definition, non_empty_block, ContainedObject, InstantiableObject, ObjectDefinition,
    ObjectHandle, Readable, TypedObject, Writable,
};

/// Slot of the system id in the system root
pub const SYSTEM_ID_SLOT: Slot = 0;

/// Slot of the system clock in the system root
pub const SYSTEM_TIME_SLOT: Slot = 1;

/// Device-computed, read-only tick counter
#[derive(Debug, Clone)]
pub struct CurrentTicks<'c> {
    handle: ObjectHandle<'c>,
}

impl<'c> ContainedObject<'c> for CurrentTicks<'c> {
    fn handle(&self) -> &ObjectHandle<'c> {
        &self.handle
    }
}

impl TypedObject for CurrentTicks<'_> {
    const TYPE_ID: u8 = 3;
    const NAME: &'static str = "CurrentTicks";
}

impl ObjectDefinition for CurrentTicks<'_> {
    type Args = ();

    fn encode_definition(_args: &()) -> Result<Vec<u8>, ValidationError> {
        Ok(Vec::new())
    }

    fn decode_definition(block: &[u8]) -> Result<(), ValidationError> {
        decode_empty_definition(block)
    }
}

impl<'c> InstantiableObject<'c> for CurrentTicks<'c> {
    fn bind(handle: ObjectHandle<'c>) -> Self {
        Self { handle }
    }
}

impl<'c> Readable<'c> for CurrentTicks<'c> {
    type Codec = LongCodec;

    fn codec(&self) -> LongCodec {
        LongCodec
    }
}

/// Container the application can create to group objects
#[derive(Debug, Clone)]
pub struct DynamicContainer<'c> {
    handle: ObjectHandle<'c>,
}

impl<'c> ContainedObject<'c> for DynamicContainer<'c> {
    fn handle(&self) -> &ObjectHandle<'c> {
        &self.handle
    }
}

impl TypedObject for DynamicContainer<'_> {
    const TYPE_ID: u8 = 4;
    const NAME: &'static str = "DynamicContainer";
}

impl ObjectDefinition for DynamicContainer<'_> {
    type Args = ();

    fn encode_definition(_args: &()) -> Result<Vec<u8>, ValidationError> {
        Ok(Vec::new())
    }

    fn decode_definition(block: &[u8]) -> Result<(), ValidationError> {
        decode_empty_definition(block)
    }
}

impl<'c> InstantiableObject<'c> for DynamicContainer<'c> {
    fn bind(handle: ObjectHandle<'c>) -> Self {
        Self { handle }
    }
}

impl Container for DynamicContainer<'_> {
    fn container_ref(&self) -> ContainerRef {
        self.handle.container().nested(self.handle.slot())
    }
}

/// Raw blob persisted by the device
///
/// Created from a non-empty initial block; reads return whatever the device
/// currently stores.
#[derive(Debug, Clone)]
pub struct PersistentValue<'c> {
    handle: ObjectHandle<'c>,
}

impl<'c> ContainedObject<'c> for PersistentValue<'c> {
    fn handle(&self) -> &ObjectHandle<'c> {
        &self.handle
    }
}

impl TypedObject for PersistentValue<'_> {
    const TYPE_ID: u8 = 5;
    const NAME: &'static str = "PersistentValue";
}

impl ObjectDefinition for PersistentValue<'_> {
    type Args = Vec<u8>;

    fn encode_definition(args: &Vec<u8>) -> Result<Vec<u8>, ValidationError> {
        non_empty_block(args)
    }

    fn decode_definition(block: &[u8]) -> Result<Vec<u8>, ValidationError> {
        non_empty_block(block)
    }
}

impl<'c> InstantiableObject<'c> for PersistentValue<'c> {
    fn bind(handle: ObjectHandle<'c>) -> Self {
        Self { handle }
    }
}

impl<'c> Readable<'c> for PersistentValue<'c> {
    type Codec = BufferCodec;

    fn codec(&self) -> BufferCodec {
        BufferCodec::any()
    }
}

impl<'c> Writable<'c> for PersistentValue<'c> {}

/// Construction parameters of a [`PersistChangeValue`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ValueThreshold {
    /// Initial value
    pub value: i16,
    /// Minimum change before the device persists a new value (>= 0)
    pub threshold: i16,
}

impl ValueThreshold {
    pub const fn new(value: i16, threshold: i16) -> Self {
        Self { value, threshold }
    }
}

/// Short value that the device persists once it has moved by more than a
/// threshold
#[derive(Debug, Clone)]
pub struct PersistChangeValue<'c> {
    handle: ObjectHandle<'c>,
}

impl PersistChangeValue<'_> {
    const DEFINITION: ValueThresholdCodec = ValueThresholdCodec::new(ShortCodec, ShortCodec);
}

impl<'c> ContainedObject<'c> for PersistChangeValue<'c> {
    fn handle(&self) -> &ObjectHandle<'c> {
        &self.handle
    }
}

impl TypedObject for PersistChangeValue<'_> {
    const TYPE_ID: u8 = 9;
    const NAME: &'static str = "PersistChangeValue";
}

impl ObjectDefinition for PersistChangeValue<'_> {
    type Args = ValueThreshold;

    fn encode_definition(args: &ValueThreshold) -> Result<Vec<u8>, ValidationError> {
        if args.threshold < 0 {
            return Err(ValidationError::NegativeThreshold {
                threshold: args.threshold,
            });
        }
        Ok(Self::DEFINITION.encode(&(args.value, args.threshold))?)
    }

    fn decode_definition(block: &[u8]) -> Result<ValueThreshold, ValidationError> {
        let (value, threshold) = Self::DEFINITION.decode(block)?;
        Ok(ValueThreshold { value, threshold })
    }
}

impl<'c> InstantiableObject<'c> for PersistChangeValue<'c> {
    fn bind(handle: ObjectHandle<'c>) -> Self {
        Self { handle }
    }
}

impl<'c> Readable<'c> for PersistChangeValue<'c> {
    type Codec = ShortCodec;

    fn codec(&self) -> ShortCodec {
        ShortCodec
    }
}

impl<'c> Writable<'c> for PersistChangeValue<'c> {}

/// Unique controller id stored on the device (system root, slot 0)
///
/// A single byte; `0xFF` means no id has been assigned yet.
#[derive(Debug, Clone)]
pub struct SystemId<'c> {
    handle: ObjectHandle<'c>,
}

impl<'c> SystemId<'c> {
    pub(crate) fn new(handle: ObjectHandle<'c>) -> Self {
        Self { handle }
    }
}

impl<'c> ContainedObject<'c> for SystemId<'c> {
    fn handle(&self) -> &ObjectHandle<'c> {
        &self.handle
    }
}

impl<'c> Readable<'c> for SystemId<'c> {
    type Codec = BufferCodec;

    fn codec(&self) -> BufferCodec {
        BufferCodec::fixed(1)
    }
}

impl<'c> Writable<'c> for SystemId<'c> {}

/// Controller clock (system root, slot 1)
#[derive(Debug, Clone)]
pub struct SystemClock<'c> {
    handle: ObjectHandle<'c>,
}

impl<'c> SystemClock<'c> {
    pub(crate) fn new(handle: ObjectHandle<'c>) -> Self {
        Self { handle }
    }
}

impl<'c> ContainedObject<'c> for SystemClock<'c> {
    fn handle(&self) -> &ObjectHandle<'c> {
        &self.handle
    }
}

impl<'c> Readable<'c> for SystemClock<'c> {
    type Codec = SystemTimeCodec;

    fn codec(&self) -> SystemTimeCodec {
        SystemTimeCodec::default()
    }
}

impl<'c> Writable<'c> for SystemClock<'c> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_threshold_definition() {
        let args = ValueThreshold::new(100, 5);
        let block = PersistChangeValue::encode_definition(&args).unwrap();
        assert_eq!(block, vec![100, 0, 5, 0]);
        assert_eq!(PersistChangeValue::decode_definition(&block).unwrap(), args);

        let negative = ValueThreshold::new(-300, 0);
        let block = PersistChangeValue::encode_definition(&negative).unwrap();
        assert_eq!(PersistChangeValue::decode_definition(&block).unwrap(), negative);
    }

    #[test]
    fn test_negative_threshold_rejected() {
        assert_eq!(
            PersistChangeValue::encode_definition(&ValueThreshold::new(100, -1)),
            Err(ValidationError::NegativeThreshold { threshold: -1 })
        );
    }

    #[test]
    fn test_value_threshold_block_length() {
        assert!(matches!(
            PersistChangeValue::decode_definition(&[1, 2, 3]),
            Err(ValidationError::MalformedDefinition(_))
        ));
    }

    #[test]
    fn test_persistent_value_requires_block() {
        assert_eq!(
            PersistentValue::encode_definition(&Vec::new()),
            Err(ValidationError::EmptyBlock)
        );
        let block = vec![0xDE, 0xAD];
        assert_eq!(
            PersistentValue::decode_definition(
                &PersistentValue::encode_definition(&block).unwrap()
            ),
            Ok(block)
        );
    }

    #[test]
    fn test_empty_definitions() {
        assert!(CurrentTicks::encode_definition(&()).unwrap().is_empty());
        assert_eq!(CurrentTicks::decode_definition(&[]), Ok(()));
        assert_eq!(
            DynamicContainer::decode_definition(&[1]),
            Err(ValidationError::UnexpectedDefinition { len: 1 })
        );
    }

    #[test]
    fn test_type_ids() {
        assert_eq!(CurrentTicks::TYPE_ID, 3);
        assert_eq!(DynamicContainer::TYPE_ID, 4);
        assert_eq!(PersistentValue::TYPE_ID, 5);
        assert_eq!(PersistChangeValue::TYPE_ID, 9);
    }
}
