//! Proptest generators for property-based testing.

use proptest::prelude::*;

use pregraph_core::{
    AccountId, DeviceId, DocumentId, GroupId, NodeRef, ObjectRef, Role, SubjectRef,
};

/// Generate a random AccountId.
pub fn account_id() -> impl Strategy<Value = AccountId> {
    any::<[u8; 32]>().prop_map(AccountId::from_bytes)
}

/// Generate a random DeviceId.
pub fn device_id() -> impl Strategy<Value = DeviceId> {
    any::<[u8; 32]>().prop_map(DeviceId::from_bytes)
}

/// Generate a random GroupId.
pub fn group_id() -> impl Strategy<Value = GroupId> {
    any::<[u8; 32]>().prop_map(GroupId::from_bytes)
}

/// Generate a random DocumentId.
pub fn document_id() -> impl Strategy<Value = DocumentId> {
    any::<[u8; 32]>().prop_map(DocumentId::from_bytes)
}

/// Generate a Role.
pub fn role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Reader), Just(Role::Admin)]
}

/// Generate an edge subject.
pub fn subject_ref() -> impl Strategy<Value = SubjectRef> {
    prop_oneof![
        account_id().prop_map(SubjectRef::Account),
        group_id().prop_map(SubjectRef::Group),
    ]
}

/// Generate an edge object.
pub fn object_ref() -> impl Strategy<Value = ObjectRef> {
    prop_oneof![
        document_id().prop_map(ObjectRef::Document),
        group_id().prop_map(ObjectRef::Group),
    ]
}

/// Generate any graph node reference.
pub fn node_ref() -> impl Strategy<Value = NodeRef> {
    prop_oneof![
        account_id().prop_map(NodeRef::Account),
        group_id().prop_map(NodeRef::Group),
        document_id().prop_map(NodeRef::Document),
    ]
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}
