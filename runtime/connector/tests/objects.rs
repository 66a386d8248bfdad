//! Object creation, addressing, reads and writes against the simulated device

mod common;

use common::Harness;
use fermlink_connector::*;
use fermlink_device_mock::{Request, ERR_NO_SUCH_OBJECT};

#[test]
fn test_create_counter_at_explicit_slot() {
    let (h, _) = Harness::with_active_profile();
    h.device.set_ticks(123_456);

    let ticks = h.controller.create_current_ticks(None, Some(2)).unwrap();

    // The slot is cleared first, then the object created with an empty definition
    assert_eq!(
        h.device.requests(),
        vec![
            Request::DeleteObject {
                id_chain: IdChain::from([2]),
            },
            Request::CreateObject {
                id_chain: IdChain::from([2]),
                type_id: 3,
                definition: vec![],
            },
        ]
    );
    assert_eq!(ticks.slot(), 2);
    assert_eq!(ticks.id_chain(), IdChain::from([2]));

    assert_eq!(ticks.read().unwrap(), 123_456);
    assert_eq!(
        h.device.requests().last(),
        Some(&Request::ReadValue {
            id_chain: IdChain::from([2]),
            len: 4,
        })
    );
}

#[test]
fn test_every_read_goes_to_the_device() {
    let (h, _) = Harness::with_active_profile();
    let ticks = h.controller.create_current_ticks(None, None).unwrap();
    h.device.set_ticks(-1);
    assert_eq!(ticks.read().unwrap(), -1);
    h.device.advance_ticks(10);
    assert_eq!(ticks.read().unwrap(), 9);
}

#[test]
fn test_create_value_threshold_at_next_slot() {
    let (h, _) = Harness::with_active_profile();
    h.controller.create_current_ticks(None, None).unwrap();
    h.device.clear_requests();

    let args = ValueThreshold::new(100, 5);
    let value = h
        .controller
        .create_object::<PersistChangeValue>(&args, None, None)
        .unwrap();

    assert_eq!(
        h.device.requests(),
        vec![
            Request::NextSlot {
                container: IdChain::root(),
            },
            Request::CreateObject {
                id_chain: IdChain::from([1]),
                type_id: 9,
                definition: vec![100, 0, 5, 0],
            },
        ]
    );
    assert_eq!(PersistChangeValue::decode_definition(&[100, 0, 5, 0]).unwrap(), args);
    assert_eq!(value.slot(), 1);

    assert_eq!(value.read().unwrap(), 100);
    value.write(&-42).unwrap();
    assert_eq!(value.read().unwrap(), -42);
}

#[test]
fn test_negative_threshold_never_reaches_device() {
    let (h, _) = Harness::with_active_profile();

    let err = h
        .controller
        .create_object::<PersistChangeValue>(&ValueThreshold::new(100, -1), None, Some(0))
        .unwrap_err();

    assert!(err.is_validation());
    assert!(matches!(
        err,
        ConnectorError::Validation(ValidationError::NegativeThreshold { threshold: -1 })
    ));
    assert!(h.device.requests().is_empty());
}

#[test]
fn test_empty_persistent_block_rejected() {
    let (h, _) = Harness::with_active_profile();
    let err = h
        .controller
        .create_object::<PersistentValue>(&Vec::new(), None, None)
        .unwrap_err();
    assert!(matches!(err, ConnectorError::Validation(ValidationError::EmptyBlock)));
    assert!(h.device.requests().is_empty());
}

#[test]
fn test_persistent_value_round_trip() {
    let (h, _) = Harness::with_active_profile();
    let blob = h
        .controller
        .create_object::<PersistentValue>(&vec![0xCA, 0xFE], None, None)
        .unwrap();

    assert_eq!(blob.read().unwrap(), vec![0xCA, 0xFE]);
    blob.write(&vec![1, 2, 3, 4, 5]).unwrap();
    assert_eq!(blob.read().unwrap(), vec![1, 2, 3, 4, 5]);

    // Caller-defined buffers request the stored length
    assert_eq!(
        h.device.requests().last(),
        Some(&Request::ReadValue {
            id_chain: blob.id_chain(),
            len: 0,
        })
    );
}

#[test]
fn test_write_echo_mismatch() {
    let (h, _) = Harness::with_active_profile();
    let blob = h
        .controller
        .create_object::<PersistentValue>(&vec![1, 2, 3], None, None)
        .unwrap();

    h.device.corrupt_next_echo();
    let err = blob.write(&vec![9, 9]).unwrap_err();

    assert!(err.is_data_integrity());
    match err {
        ConnectorError::EchoMismatch {
            id_chain,
            sent,
            echoed,
        } => {
            assert_eq!(id_chain, blob.id_chain());
            assert_eq!(sent, vec![9, 9]);
            assert_eq!(echoed, vec![9, 0xF6]);
        }
        other => panic!("expected an echo mismatch, got {other:?}"),
    }
}

#[test]
fn test_write_to_deleted_object_fails_verification() {
    let (h, _) = Harness::with_active_profile();
    let value = h
        .controller
        .create_object::<PersistChangeValue>(&ValueThreshold::new(1, 0), None, None)
        .unwrap();
    h.controller.delete_object_at(&value.id_chain(), false).unwrap();

    // Nothing lives at the address any more, so the device echoes nothing
    let err = value.write(&5).unwrap_err();
    assert!(matches!(err, ConnectorError::EchoMismatch { .. }));
}

#[test]
fn test_read_of_missing_object_is_no_data() {
    let (h, _) = Harness::with_active_profile();
    let ticks = h.controller.create_current_ticks(None, Some(5)).unwrap();
    h.controller.delete_object_at(&IdChain::from([5]), false).unwrap();

    let err = ticks.read().unwrap_err();
    assert!(matches!(
        err,
        ConnectorError::NoData {
            command: Command::ReadValue
        }
    ));
}

#[test]
fn test_nested_container() {
    let (h, _) = Harness::with_active_profile();
    let container = h.controller.create_dynamic_container(None, Some(1)).unwrap();
    let value = h
        .controller
        .create_object::<PersistChangeValue>(&ValueThreshold::new(7, 1), Some(&container), None)
        .unwrap();

    assert_eq!(value.id_chain(), IdChain::from([1, 0]));
    assert_eq!(value.container(), &container.container_ref());
    assert_eq!(Container::id_chain(&container), IdChain::from([1]));
    assert_eq!(
        h.device.requests().last(),
        Some(&Request::CreateObject {
            id_chain: IdChain::from([1, 0]),
            type_id: 9,
            definition: vec![7, 0, 1, 0],
        })
    );
    assert_eq!(value.read().unwrap(), 7);
}

#[test]
fn test_explicit_slot_replaces_existing_object() {
    let (h, profile) = Harness::with_active_profile();
    h.controller.create_current_ticks(None, Some(0)).unwrap();
    let blob = h
        .controller
        .create_object::<PersistentValue>(&vec![4], None, Some(0))
        .unwrap();

    assert_eq!(blob.read().unwrap(), vec![4]);
    let stored = h.device.objects(profile);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].type_id, 5);
}

#[test]
fn test_failed_create_leaves_no_proxy() {
    let (h, _) = Harness::with_active_profile();
    let container = ContainerRef::user_root().nested(9);

    // No container lives at slot 9
    let err = h
        .controller
        .create_current_ticks(Some(&container), Some(0))
        .unwrap_err();
    assert!(err.device_code().is_some());
}

#[test]
fn test_delete_consumes_proxy() {
    let (h, profile) = Harness::with_active_profile();
    let ticks = h.controller.create_current_ticks(None, None).unwrap();
    let stale = ticks.clone();

    ticks.delete().unwrap();
    assert!(h.device.objects(profile).is_empty());

    // A second delete at the same address is a device failure
    let err = stale.delete().unwrap_err();
    assert_eq!(err.device_code(), Some(ERR_NO_SUCH_OBJECT));
    assert!(matches!(
        err,
        ConnectorError::DeviceOperationFailed {
            command: Command::DeleteObject,
            ..
        }
    ));
}

#[test]
fn test_system_tree_object_cannot_be_deleted() {
    let (h, profile) = Harness::with_active_profile();
    h.controller.create_current_ticks(None, Some(0)).unwrap();
    let misplaced = ObjectReference {
        container: ContainerRef::system_root(),
        slot: 0,
        kind: ObjectKind::Known {
            type_id: 3,
            name: "CurrentTicks",
        },
        args: None,
    };
    let ticks: CurrentTicks = misplaced.resolve(&h.controller).unwrap();
    h.device.clear_requests();

    let err = ticks.delete().unwrap_err();

    assert!(matches!(
        err,
        ConnectorError::Validation(ValidationError::SystemTree)
    ));
    assert!(h.device.requests().is_empty());
    assert_eq!(h.device.objects(profile).len(), 1);
}

#[test]
fn test_system_tree_rejects_new_objects() {
    let (h, profile) = Harness::with_active_profile();
    let system_root = h.controller.system_root();

    let err = h
        .controller
        .create_current_ticks(Some(system_root), Some(1))
        .unwrap_err();
    assert!(matches!(
        err,
        ConnectorError::Validation(ValidationError::SystemTree)
    ));

    let err = h
        .controller
        .create_object::<PersistentValue>(&vec![1], Some(system_root), None)
        .unwrap_err();
    assert!(err.is_validation());

    assert!(h.controller.next_slot(system_root).unwrap_err().is_validation());
    assert!(h.device.requests().is_empty());
    assert!(h.device.objects(profile).is_empty());
}

#[test]
fn test_tolerant_delete_returns_code() {
    let (h, _) = Harness::with_active_profile();
    let code = h
        .controller
        .delete_object_at(&IdChain::from([42]), true)
        .unwrap();
    assert_eq!(code, ERR_NO_SUCH_OBJECT);
}

#[test]
fn test_next_slot_skips_used_slots() {
    let (h, _) = Harness::with_active_profile();
    h.controller.create_current_ticks(None, Some(0)).unwrap();
    h.controller.create_current_ticks(None, Some(1)).unwrap();
    h.controller.create_current_ticks(None, Some(3)).unwrap();
    assert_eq!(h.controller.next_slot(h.controller.root_container()).unwrap(), 2);
}

#[test]
fn test_container_for_is_client_side() {
    let h = Harness::new();
    let chain = IdChain::from([1, 0, 3]);

    let container = h.controller.container_for(&chain);

    assert_eq!(container.id_chain(), chain);
    assert_eq!(container.root_kind(), RootKind::User);
    assert_eq!(container, ContainerRef::user_root().nested(1).nested(0).nested(3));
    assert!(h.device.requests().is_empty());
}

#[test]
fn test_root_addressing() {
    let h = Harness::new();
    let root = h.controller.root_container();
    assert!(root.id_chain().is_root());
    assert_eq!(root.id_chain_for(4), IdChain::from([4]));
    assert_eq!(h.controller.system_root().kind(), RootKind::System);
}
