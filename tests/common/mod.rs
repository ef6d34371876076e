//! Shared fixture for the black-box integration tests: a small hand-built
//! `TestMetadata` class table plus convenience constructors for `HostValue`
//! graphs, mirroring a tiny ahead-of-time analysis result.

use std::rc::Rc;

use native_image_heap::config::HeapConfig;
use native_image_heap::heap::NativeImageHeap;
use native_image_heap::host::{obj, HostObject, HostValue, Instance};
use native_image_heap::metadata::{
    FieldId, FieldInfo, FieldLocation, HybridLayout, ImageType, LayoutConstants, StaticFieldsInfo,
    StorageKind, TestMetadata, TypeId, TypeKind,
};
use native_image_heap::object_info::ObjectInfo;
use native_image_heap::partition::PartitionKind;

pub const HUB_CLASS: TypeId = TypeId(100);
pub const STRING_CLASS: TypeId = TypeId(1);
pub const LONG_ARRAY_CLASS: TypeId = TypeId(4);
pub const OBJECT_ARRAY_CLASS: TypeId = TypeId(5);
pub const INT_ARRAY_CLASS: TypeId = TypeId(6);
pub const NODE_CLASS: TypeId = TypeId(2);
pub const HYBRID_CLASS: TypeId = TypeId(7);
pub const MONITOR_CLASS: TypeId = TypeId(8);
pub const INTERN_STRING_ARRAY_CLASS: TypeId = TypeId(9);
pub const COUNTER_CLASS: TypeId = TypeId(10);

fn hub_for(represents: TypeId) -> HostObject {
    obj(HostValue::DynamicHub {
        represents,
        hub_class: HUB_CLASS,
        identity_hash: 0,
        from_class: false,
    })
}

/// Builds a class table with: a shared hub layout, `java.lang.String`
/// (char-array-shaped), the two static-fields placeholder array classes, a
/// plain `int[]` class, a one-reference-field `Node` class, a hybrid class
/// with an embedded `int[]` plus a bit-set, and a monitor-bearing class.
pub fn metadata() -> TestMetadata {
    let mut metadata = TestMetadata::default();
    metadata.layout = LayoutConstants::default();

    metadata.register(ImageType {
        id: HUB_CLASS,
        name: "com.example.DynamicHub".into(),
        instantiated: true,
        kind: TypeKind::Instance {
            fields: vec![],
            monitor_field_offset: 0,
            hybrid: None,
            instance_size: 16,
        },
        hub: hub_for(HUB_CLASS),
        hash_code_offset: 8,
    });

    metadata.register(ImageType {
        id: STRING_CLASS,
        name: "java.lang.String".into(),
        instantiated: true,
        kind: TypeKind::Array { component_kind: StorageKind::Char },
        hub: hub_for(STRING_CLASS),
        hash_code_offset: 0,
    });

    metadata.register(ImageType {
        id: LONG_ARRAY_CLASS,
        name: "long[]".into(),
        instantiated: true,
        kind: TypeKind::Array { component_kind: StorageKind::Long },
        hub: hub_for(LONG_ARRAY_CLASS),
        hash_code_offset: 0,
    });

    metadata.register(ImageType {
        id: OBJECT_ARRAY_CLASS,
        name: "java.lang.Object[]".into(),
        instantiated: true,
        kind: TypeKind::Array { component_kind: StorageKind::Reference },
        hub: hub_for(OBJECT_ARRAY_CLASS),
        hash_code_offset: 0,
    });

    metadata.register(ImageType {
        id: INT_ARRAY_CLASS,
        name: "int[]".into(),
        instantiated: true,
        kind: TypeKind::Array { component_kind: StorageKind::Int },
        hub: hub_for(INT_ARRAY_CLASS),
        hash_code_offset: 0,
    });

    metadata.register(ImageType {
        id: INTERN_STRING_ARRAY_CLASS,
        name: "java.lang.String[]".into(),
        instantiated: true,
        kind: TypeKind::Array { component_kind: StorageKind::Reference },
        hub: hub_for(INTERN_STRING_ARRAY_CLASS),
        hash_code_offset: 0,
    });

    metadata.register(ImageType {
        id: NODE_CLASS,
        name: "demo.Node".into(),
        instantiated: true,
        kind: TypeKind::Instance {
            fields: vec![FieldInfo {
                name: "next".into(),
                storage_kind: StorageKind::Reference,
                is_accessed: true,
                is_written: true,
                is_final: false,
                location: FieldLocation::InstanceOffset(16),
            }],
            monitor_field_offset: 0,
            hybrid: None,
            instance_size: 24,
        },
        hub: hub_for(NODE_CLASS),
        hash_code_offset: 8,
    });

    metadata.register(ImageType {
        id: HYBRID_CLASS,
        name: "demo.HybridArray".into(),
        instantiated: true,
        kind: TypeKind::Instance {
            fields: vec![
                FieldInfo {
                    name: "data".into(),
                    storage_kind: StorageKind::Reference,
                    is_accessed: true,
                    is_written: false,
                    is_final: true,
                    location: FieldLocation::InstanceOffset(0),
                },
                FieldInfo {
                    name: "flags".into(),
                    storage_kind: StorageKind::Reference,
                    is_accessed: true,
                    is_written: false,
                    is_final: true,
                    location: FieldLocation::InstanceOffset(0),
                },
            ],
            monitor_field_offset: 0,
            hybrid: Some(HybridLayout {
                array_field: FieldId(0),
                bitset_field: Some(FieldId(1)),
                bit_field_offset: 16,
                array_element_kind: StorageKind::Int,
                base_size: 24,
            }),
            instance_size: 24,
        },
        hub: hub_for(HYBRID_CLASS),
        // Distinct from `layout.array_length_offset` (8): a hybrid instance
        // writes both its own identity hash and its embedded array's length,
        // so the two fields must not be placed at the same offset.
        hash_code_offset: 20,
    });

    metadata.register(ImageType {
        id: MONITOR_CLASS,
        name: "demo.Monitored".into(),
        instantiated: true,
        kind: TypeKind::Instance {
            fields: vec![],
            monitor_field_offset: 16,
            hybrid: None,
            instance_size: 24,
        },
        hub: hub_for(MONITOR_CLASS),
        hash_code_offset: 8,
    });

    metadata.register(ImageType {
        id: COUNTER_CLASS,
        name: "demo.Counter".into(),
        instantiated: true,
        kind: TypeKind::Instance {
            fields: vec![FieldInfo {
                name: "value".into(),
                storage_kind: StorageKind::Int,
                is_accessed: true,
                is_written: true,
                is_final: false,
                location: FieldLocation::InstanceOffset(16),
            }],
            monitor_field_offset: 0,
            hybrid: None,
            instance_size: 24,
        },
        hub: hub_for(COUNTER_CLASS),
        hash_code_offset: 8,
    });

    metadata.statics = Some(StaticFieldsInfo {
        primitive_array: obj(HostValue::LongArray(LONG_ARRAY_CLASS, Rc::from(&[0i64; 4][..]), 0)),
        reference_array: obj(HostValue::ObjectArray(OBJECT_ARRAY_CLASS, vec![None; 4], 0)),
    });

    metadata
}

pub fn heap(config: HeapConfig) -> NativeImageHeap {
    NativeImageHeap::new(config, Box::new(metadata()), STRING_CLASS).unwrap()
}

pub fn string(content: &str, identity_hash: i32, host_interned: bool) -> HostObject {
    obj(HostValue::String {
        class: STRING_CLASS,
        content: Rc::from(content),
        identity_hash,
        host_interned,
    })
}

pub fn node(next: Option<HostObject>, identity_hash: i32) -> HostObject {
    obj(HostValue::Instance(Instance {
        class: NODE_CLASS,
        fields: vec![next],
        identity_hash,
        monitor_word_set: false,
    }))
}

pub fn int_array(values: &[i32], identity_hash: i32) -> HostObject {
    obj(HostValue::IntArray(INT_ARRAY_CLASS, Rc::from(values), identity_hash))
}

pub fn hybrid(data: HostObject, flags: HostObject, identity_hash: i32) -> HostObject {
    obj(HostValue::Instance(Instance {
        class: HYBRID_CLASS,
        fields: vec![Some(data), Some(flags)],
        identity_hash,
        monitor_word_set: false,
    }))
}

pub fn monitored(monitor_word_set: bool, identity_hash: i32) -> HostObject {
    obj(HostValue::Instance(Instance {
        class: MONITOR_CLASS,
        fields: vec![],
        identity_hash,
        monitor_word_set,
    }))
}

/// A plain instance with one written, non-reference field — lands in the
/// writable-primitive partition, unlike every other fixture constructor
/// here, which produces writable-reference or read-only objects.
pub fn counter(value: i64, identity_hash: i32) -> HostObject {
    obj(HostValue::Instance(Instance {
        class: COUNTER_CLASS,
        fields: vec![Some(obj(HostValue::Word(value as u64)))],
        identity_hash,
        monitor_word_set: false,
    }))
}

/// `info`'s position within the buffer (read-only or writable) holding both
/// halves of its partition pair: the sibling primitive partition's size,
/// plus `info.offset_in_partition`, for a reference partition; just
/// `info.offset_in_partition` for a primitive one. Mirrors
/// `NativeImageHeap`'s private `offset_in_section`, computed here from the
/// sizes the public `partition` accessor already exposes.
pub fn offset_in_section(heap: &NativeImageHeap, info: &ObjectInfo) -> u32 {
    let base = match info.partition {
        PartitionKind::ReadOnlyPrimitive | PartitionKind::WritablePrimitive => 0,
        PartitionKind::ReadOnlyReference => heap.partition(PartitionKind::ReadOnlyPrimitive).size,
        PartitionKind::WritableReference => heap.partition(PartitionKind::WritablePrimitive).size,
    };
    base + info.offset_in_partition
}

/// A `DynamicHub` reached the ordinary way (not via `java.lang.Class`).
pub fn hub_path_hub(represents: TypeId, identity_hash: i32) -> HostObject {
    obj(HostValue::DynamicHub {
        represents,
        hub_class: HUB_CLASS,
        identity_hash,
        from_class: false,
    })
}

/// A `DynamicHub` reached via a `java.lang.Class` host object — the path
/// whose identity hash wins the upgrade rule (scenario S6).
pub fn class_path_hub(represents: TypeId, identity_hash: i32) -> HostObject {
    obj(HostValue::DynamicHub {
        represents,
        hub_class: HUB_CLASS,
        identity_hash,
        from_class: true,
    })
}
