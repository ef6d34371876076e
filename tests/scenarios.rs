//! Black-box integration tests built directly on the public API, one per
//! concrete scenario: empty graph, string canonicalization, a hybrid object
//! with an embedded `int[]` and bit-set, a method pointer in a vtable slot,
//! monitor-bearing partition selection, and the class/hub identity-hash
//! upgrade.

mod common;

use native_image_heap::config::HeapConfig;
use native_image_heap::partition::PartitionKind;
use native_image_heap::relocatable_buffer::{MethodPointer, RelocatableBuffer, Relocation, RelocationSymbol};

#[test]
fn empty_graph_still_carries_the_static_fields_arrays() {
    let mut heap = common::heap(HeapConfig::default());
    heap.add_initial_objects(vec![]).unwrap();
    heap.add_trailing_objects().unwrap();

    let mut ro = RelocatableBuffer::with_capacity(64);
    let mut rw = RelocatableBuffer::with_capacity(64);
    heap.write_heap(&mut ro, &mut rw).unwrap();

    // Only the two placeholder arrays plus their hubs (and the shared hub
    // class's self-hub) were ever reachable; the total object count is small
    // but never zero.
    let total_count: u32 = PartitionKind::all().iter().map(|k| heap.partition(*k).count).sum();
    assert!(total_count > 0);
    assert!(heap.get_readonly_size() + heap.get_writable_size() > 0);
}

#[test]
fn equal_interned_strings_canonicalize_to_one_image_object() {
    let mut heap = common::heap(HeapConfig::default());
    heap.enable_intern_support(common::INTERN_STRING_ARRAY_CLASS);

    let a = common::string("shared", 11, true);
    let b = common::string("shared", 11, true);
    assert!(!std::rc::Rc::ptr_eq(&a, &b));

    heap.add_initial_objects(vec![(a.clone(), "a".into()), (b.clone(), "b".into())]).unwrap();
    heap.add_trailing_objects().unwrap();

    let info_a = heap.get_object_info(&a).expect("a reachable");
    let info_b = heap.get_object_info(&b).expect("b reachable");
    assert!(std::rc::Rc::ptr_eq(&info_a, &info_b));
    assert_eq!(info_a.identity_hash_code(), 11);
}

#[test]
fn hybrid_object_embeds_its_array_and_bitset_inline() {
    let mut heap = common::heap(HeapConfig::default());

    let data = common::int_array(&[1, 2, 3], 0);
    let flags = native_image_heap::host::obj(native_image_heap::host::HostValue::ByteArray(
        common::INT_ARRAY_CLASS,
        std::rc::Rc::from(&[0b0000_0101u8][..]),
        0,
    ));
    let instance = common::hybrid(data.clone(), flags, 42);

    heap.add_initial_objects(vec![(instance.clone(), "root".into())]).unwrap();
    heap.add_trailing_objects().unwrap();

    // The embedded array is never an independently addable image object.
    assert!(heap.get_object_info(&data).is_none());

    let info = heap.get_object_info(&instance).unwrap();
    // base_size(24) + 3 ints * 4 bytes = 36, reference-aligned to 40.
    assert_eq!(info.size, 40);

    let mut ro = RelocatableBuffer::with_capacity(128);
    let mut rw = RelocatableBuffer::with_capacity(128);
    heap.write_heap(&mut ro, &mut rw).unwrap();
    let buf = if info.partition.writable() { &rw } else { &ro };
    let base = common::offset_in_section(&heap, &info) as usize;

    // bit_field_offset 16, OR-ed with 0b0000_0101.
    assert_eq!(buf.data()[base + 16] & 0b0000_0101, 0b0000_0101);
    // array length at the fixed array_length_offset (8), relative to the
    // instance base, then three little-endian ints starting at base_size=24.
    let len = u32::from_le_bytes(buf.data()[base + 8..base + 12].try_into().unwrap());
    assert_eq!(len, 3);
    for (i, expected) in [1i32, 2, 3].into_iter().enumerate() {
        let at = base + 24 + i * 4;
        let got = i32::from_le_bytes(buf.data()[at..at + 4].try_into().unwrap());
        assert_eq!(got, expected);
    }
}

#[test]
fn method_pointer_in_a_vtable_slot_is_a_relocation_not_bytes() {
    // Code generation and vtable layout are an out-of-scope collaborator
    // (spec §1): the builder only ever exposes `emit_method_pointer` for
    // whatever slot the driver decides is a vtable entry.
    let mut buf = RelocatableBuffer::with_capacity(16);
    let method = MethodPointer { name: "demo.Node.hashCode".into(), code_offset: Some(0x2000) };
    buf.emit_method_pointer(0, 8, &method).unwrap();

    assert_eq!(buf.relocations().len(), 1);
    match &buf.relocations()[0] {
        Relocation::DirectNoAddend { at, size, symbol: RelocationSymbol::Method(m) } => {
            assert_eq!(*at, 0);
            assert_eq!(*size, 8);
            assert_eq!(m.name, "demo.Node.hashCode");
        }
        _ => panic!("expected a method-pointer relocation"),
    }
    // No data is ever written for a relocated slot.
    assert!(buf.data().iter().all(|b| *b == 0));
}

#[test]
fn monitor_word_set_forces_writable_reference_partition() {
    let mut heap = common::heap(HeapConfig::default());

    let quiescent = common::monitored(false, 1);
    let locked = common::monitored(true, 2);

    heap.add_initial_objects(vec![
        (quiescent.clone(), "quiescent".into()),
        (locked.clone(), "locked".into()),
    ])
    .unwrap();
    heap.add_trailing_objects().unwrap();

    let quiescent_info = heap.get_object_info(&quiescent).unwrap();
    let locked_info = heap.get_object_info(&locked).unwrap();

    assert_eq!(quiescent_info.partition, PartitionKind::ReadOnlyPrimitive);
    assert_eq!(locked_info.partition, PartitionKind::WritableReference);
}

#[test]
fn class_path_hash_upgrades_the_hub_paths_identity_hash() {
    let mut heap = common::heap(HeapConfig::default());

    let via_hub = common::hub_path_hub(common::NODE_CLASS, 0);
    let via_class = common::class_path_hub(common::NODE_CLASS, 55);

    heap.add_initial_objects(vec![
        (via_hub.clone(), "hub-path".into()),
        (via_class.clone(), "class-path".into()),
    ])
    .unwrap();
    heap.add_trailing_objects().unwrap();

    let hub_info = heap.get_object_info(&via_hub).unwrap();
    let class_info = heap.get_object_info(&via_class).unwrap();
    assert!(std::rc::Rc::ptr_eq(&hub_info, &class_info));
    assert_eq!(hub_info.identity_hash_code(), 55);
}
