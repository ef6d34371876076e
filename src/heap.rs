use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::canon::CanonicalizationMap;
use crate::config::HeapConfig;
use crate::error::Error;
use crate::host::{HostObject, HostValue};
use crate::intern::InternTable;
use crate::metadata::{FieldInfo, Metadata, StorageKind, TypeId, TypeKind};
use crate::object_info::{ObjectInfo, Reason};
use crate::partition::{HeapPartition, PartitionKind};
use crate::phase::Phase;
use crate::relocatable_buffer::RelocatableBuffer;
use crate::worklist::{AddTask, Worklist};

/// Wraps a `HostObject` so it can key a `HashMap`/`HashSet` by `Rc` pointer
/// identity rather than by `HostValue`'s own (content) equality.
#[derive(Clone)]
struct HostId(HostObject);

impl PartialEq for HostId {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for HostId {}

impl std::hash::Hash for HostId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

/// Which end of a partition a boundary marker records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Start,
    End,
}

/// Where to patch one partition boundary: an index into the primitive
/// static-fields array, written as a raw `long` once every object has been
/// placed (spec §4.5).
#[derive(Debug, Clone, Copy)]
pub struct BoundaryMarkerSlot {
    pub partition: PartitionKind,
    pub kind: BoundaryKind,
    pub static_primitive_index: u32,
}

/// Builds the initial in-memory image heap from a root set of host objects:
/// owns the four partitions, the identity map, canonicalization, the intern
/// table, and the worklist that drives traversal (spec §1-§5).
pub struct NativeImageHeap {
    config: HeapConfig,
    metadata: Box<dyn Metadata>,

    partitions: HashMap<PartitionKind, HeapPartition>,
    identity_map: HashMap<HostId, Rc<ObjectInfo>>,
    /// Every `ObjectInfo` created, in first-creation order. Separate from
    /// `identity_map` because several host identities can map to the same
    /// info (the canonicalized duplicates); this list is what `write_heap`
    /// walks, so each object is written exactly once.
    infos: Vec<Rc<ObjectInfo>>,
    canon: CanonicalizationMap,
    intern: InternTable,
    /// Objects embedded in a hybrid instance's trailing array/bit-set: never
    /// independently addable (spec §4.1 step 1).
    blacklist: HashSet<HostId>,
    known_immutable: HashSet<HostId>,
    known_canonicalizable: Vec<fn(&HostValue) -> bool>,
    known_non_canonicalizable: Vec<fn(&HostValue) -> bool>,

    worklist: Worklist,
    add_phase: Phase,
    intern_phase: Phase,

    string_class: TypeId,
    string_array_type: Option<TypeId>,
    boundary_markers: Vec<BoundaryMarkerSlot>,
}

impl NativeImageHeap {
    pub fn new(config: HeapConfig, metadata: Box<dyn Metadata>, string_class: TypeId) -> Result<Self, Error> {
        config.validate()?;
        let mut partitions = HashMap::new();
        for kind in PartitionKind::all() {
            partitions.insert(kind, HeapPartition::new(kind));
        }
        if config.use_heap_base {
            // Leading pad so the first real object of the read-only buffer
            // never lands at offset 0, where its encoded reference would be
            // indistinguishable from a null word (spec §8 scenario S1).
            let pad = metadata.layout().alignment();
            partitions.get_mut(&PartitionKind::ReadOnlyPrimitive).unwrap().reserve_pad(pad);
        }
        Ok(NativeImageHeap {
            config,
            metadata,
            partitions,
            identity_map: HashMap::new(),
            infos: Vec::new(),
            canon: CanonicalizationMap::default(),
            intern: InternTable::default(),
            blacklist: HashSet::new(),
            known_immutable: HashSet::new(),
            known_canonicalizable: Vec::new(),
            known_non_canonicalizable: Vec::new(),
            worklist: Worklist::default(),
            add_phase: Phase::default(),
            intern_phase: Phase::default(),
            string_class,
            string_array_type: None,
            boundary_markers: Vec::new(),
        })
    }

    /// Enables building the sorted intern array for the string class given
    /// at construction, adding it (and transitively its hub) as a
    /// `java.lang.String[]`-shaped array of `array_type` in
    /// `add_trailing_objects`.
    pub fn enable_intern_support(&mut self, array_type: TypeId) {
        self.string_array_type = Some(array_type);
    }

    pub fn register_boundary_marker(&mut self, slot: BoundaryMarkerSlot) {
        self.boundary_markers.push(slot);
    }

    /// Registers `object` as immutable regardless of the normal
    /// immutability rule. Must run before traversal starts (spec §3).
    pub fn register_immutable(&mut self, object: HostObject) -> Result<(), Error> {
        self.add_phase.check_before("register_immutable")?;
        self.known_immutable.insert(HostId(object));
        Ok(())
    }

    pub fn register_canonicalizable(&mut self, predicate: fn(&HostValue) -> bool) {
        self.known_canonicalizable.push(predicate);
    }

    pub fn register_non_canonicalizable(&mut self, predicate: fn(&HostValue) -> bool) {
        self.known_non_canonicalizable.push(predicate);
    }

    /// Seeds the worklist with the two static-fields placeholder arrays plus
    /// every caller-supplied root, then drains it (spec §4/§6).
    pub fn add_initial_objects(&mut self, roots: Vec<(HostObject, String)>) -> Result<(), Error> {
        self.add_phase.allow("add_initial_objects")?;
        self.intern_phase.allow("add_initial_objects")?;
        let statics = self.metadata.static_fields().clone();
        self.worklist.push(AddTask {
            original: statics.primitive_array,
            parent_canonicalizable: false,
            immutable_from_parent: false,
            reason: Reason::Root("static-primitive-fields".into()),
        });
        self.worklist.push(AddTask {
            original: statics.reference_array,
            parent_canonicalizable: false,
            immutable_from_parent: false,
            reason: Reason::Root("static-reference-fields".into()),
        });
        for (object, tag) in roots {
            self.worklist.push(AddTask {
                original: object,
                parent_canonicalizable: false,
                immutable_from_parent: false,
                reason: Reason::Root(tag),
            });
        }
        self.drain_worklist()
    }

    fn drain_worklist(&mut self) -> Result<(), Error> {
        while let Some(task) = self.worklist.pop() {
            self.add(task.original, task.parent_canonicalizable, task.immutable_from_parent, task.reason)?;
        }
        Ok(())
    }

    /// Drains any remaining traversal, then (if intern support is enabled)
    /// freezes the intern table, builds the sorted intern array, and drains
    /// again before transitioning both phases to `After` (spec §4.4).
    pub fn add_trailing_objects(&mut self) -> Result<(), Error> {
        self.drain_worklist()?;
        if let Some(array_type) = self.string_array_type {
            if !self.intern.is_empty() {
                let frozen: Vec<Rc<str>> = self.intern.freeze().to_vec();
                let elements: Vec<Option<HostObject>> = frozen
                    .into_iter()
                    .map(|content| {
                        Some(crate::host::obj(HostValue::String {
                            class: self.string_class,
                            content,
                            identity_hash: 0,
                            host_interned: false,
                        }))
                    })
                    .collect();
                let array = crate::host::obj(HostValue::ObjectArray(array_type, elements, 0));
                self.worklist.push(AddTask {
                    original: array,
                    parent_canonicalizable: false,
                    immutable_from_parent: false,
                    reason: Reason::Root("intern-table".into()),
                });
                self.drain_worklist()?;
            }
        }
        self.add_phase.disallow("add_trailing_objects")?;
        self.intern_phase.disallow("add_trailing_objects")?;
        if !self.worklist.is_empty() {
            return Err(Error::InvalidState(
                "worklist not empty after add_trailing_objects".into(),
            ));
        }
        Ok(())
    }

    pub fn get_object_info(&self, object: &HostObject) -> Option<Rc<ObjectInfo>> {
        self.identity_map.get(&HostId(object.clone())).cloned()
    }

    pub fn get_readonly_size(&self) -> u32 {
        self.partitions[&PartitionKind::ReadOnlyPrimitive].size
            + self.partitions[&PartitionKind::ReadOnlyReference].size
    }

    pub fn get_writable_size(&self) -> u32 {
        self.partitions[&PartitionKind::WritablePrimitive].size
            + self.partitions[&PartitionKind::WritableReference].size
    }

    pub fn partition(&self, kind: PartitionKind) -> &HeapPartition {
        &self.partitions[&kind]
    }

    pub fn set_readonly_section(&mut self, name: String, offset: u32) {
        let primitive_size = self.partitions[&PartitionKind::ReadOnlyPrimitive].size;
        self.partitions.get_mut(&PartitionKind::ReadOnlyPrimitive).unwrap().set_section(name.clone(), offset);
        self.partitions
            .get_mut(&PartitionKind::ReadOnlyReference)
            .unwrap()
            .set_section(name, offset + primitive_size);
    }

    pub fn set_writable_section(&mut self, name: String, offset: u32) {
        let primitive_size = self.partitions[&PartitionKind::WritablePrimitive].size;
        self.partitions.get_mut(&PartitionKind::WritablePrimitive).unwrap().set_section(name.clone(), offset);
        self.partitions
            .get_mut(&PartitionKind::WritableReference)
            .unwrap()
            .set_section(name, offset + primitive_size);
    }

    /// The byte offset `kind`'s own buffer-relative region starts at: 0 for
    /// the primitive partition of a buffer, and the sibling primitive
    /// partition's total size for the reference partition that is packed
    /// right after it in the same buffer (spec §4.1: "propagates ... to
    /// start immediately after the primitive partition's size").
    fn partition_base_in_buffer(&self, kind: PartitionKind) -> u32 {
        match kind {
            PartitionKind::ReadOnlyPrimitive | PartitionKind::WritablePrimitive => 0,
            PartitionKind::ReadOnlyReference => self.partitions[&PartitionKind::ReadOnlyPrimitive].size,
            PartitionKind::WritableReference => self.partitions[&PartitionKind::WritablePrimitive].size,
        }
    }

    /// `info`'s position within the buffer (read-only or writable) that
    /// holds both of its partition pair: what the spec calls an object's
    /// `offset_in_section` (spec §4.3/§4.5/§8 property 8), as distinct from
    /// `info.offset_in_partition`, which is relative to `info.partition`
    /// alone.
    fn offset_in_section(&self, info: &ObjectInfo) -> u32 {
        self.partition_base_in_buffer(info.partition) + info.offset_in_partition
    }

    /// Classifies canonicalizability starting from `parent_canonicalizable`:
    /// a `DynamicHub` is always canonicalizable (singleton-per-class, so the
    /// host's class path and its hub path must collapse together — spec
    /// scenario S6); otherwise `known_non_canonicalizable` wins over
    /// `known_canonicalizable` if both match (spec §3).
    fn classify(&self, value: &HostValue, parent_canonicalizable: bool) -> bool {
        if matches!(value, HostValue::DynamicHub { .. }) {
            return true;
        }
        if self.known_non_canonicalizable.iter().any(|p| p(value)) {
            false
        } else if self.known_canonicalizable.iter().any(|p| p(value)) {
            true
        } else {
            parent_canonicalizable
        }
    }

    /// Applies an identity-hash upgrade to an already-present `ObjectInfo`
    /// when the *incoming* representation (not the frozen canonical
    /// winner, which never changes once chosen) is a class-derived
    /// `DynamicHub` (spec §3, scenario S6). A no-op otherwise, and a no-op
    /// if the upgrade already happened once.
    fn maybe_upgrade_hash(&self, existing: &Rc<ObjectInfo>, incoming_original: &HostObject) {
        if let HostValue::DynamicHub { identity_hash, from_class, .. } = incoming_original.as_ref() {
            if *from_class {
                existing.upgrade_identity_hash(*identity_hash);
            }
        }
    }

    /// The core traversal step (spec §4.1): classify, canonicalize, and
    /// either merge into an existing `ObjectInfo` or create a new one and
    /// enqueue its children.
    fn add(
        &mut self,
        original: HostObject,
        parent_canonicalizable: bool,
        immutable_from_parent: bool,
        reason: Reason,
    ) -> Result<(), Error> {
        self.add_phase.check_allowed("add")?;

        if original.is_word() {
            return Ok(());
        }
        if original.is_class() {
            return Err(Error::InvalidState(format!(
                "java.lang.Class reached add() directly at {}; it should already have been replaced by its DynamicHub",
                reason.chain()
            )));
        }

        let identity_hash = original.identity_hash();

        let (canonical, canonicalizable) = match original.as_ref() {
            // Every string is a canonicalizable value type regardless of
            // whether the host has it interned — only the interned ones
            // additionally join the intern table (spec §3/§4.2).
            HostValue::String { host_interned, content, .. } => {
                let host_interned = *host_interned;
                let content = content.clone();
                let canonical = self.canon.canonicalize(original.clone());
                if host_interned {
                    self.intern.insert(&self.intern_phase, content)?;
                }
                (canonical, true)
            }
            _ => {
                let canonicalizable = self.classify(&original, parent_canonicalizable);
                let canonical = if canonicalizable {
                    self.canon.canonicalize(original.clone())
                } else {
                    original.clone()
                };
                (canonical, canonicalizable)
            }
        };

        if let Some(existing) = self.identity_map.get(&HostId(canonical.clone())).cloned() {
            self.maybe_upgrade_hash(&existing, &original);
            if !Rc::ptr_eq(&canonical, &original) {
                self.identity_map.insert(HostId(original), existing);
            }
            return Ok(());
        }

        self.add_to_image(canonical, original, canonicalizable, immutable_from_parent, identity_hash, reason)
    }

    fn add_to_image(
        &mut self,
        canonical: HostObject,
        original: HostObject,
        canonicalizable: bool,
        immutable_from_parent: bool,
        identity_hash: i32,
        reason: Reason,
    ) -> Result<(), Error> {
        let type_id = canonical
            .type_id()
            .ok_or_else(|| Error::InvalidState("object has no associated type".into()))?;
        let image_type = self
            .metadata
            .lookup_type(type_id)
            .ok_or_else(|| Error::UnreachableType {
                type_name: format!("{type_id:?}"),
                chain: reason.chain(),
            })?
            .clone();
        if !image_type.instantiated {
            return Err(Error::UnreachableType {
                type_name: image_type.name.clone(),
                chain: reason.chain(),
            });
        }

        let layout = *self.metadata.layout();
        let word_bytes = layout.word_bytes;

        let (size, written, references, monitor_forces) = if image_type.is_instance_class() {
            // A `DynamicHub` carries no modeled per-field data of its own
            // (its internal layout, e.g. a super-hub pointer, is out of
            // scope here) — it still occupies a normal instance slot sized
            // and classified the same way as any other instance class.
            let size = match canonical.as_ref() {
                HostValue::Instance(inst) => {
                    if let Some(hybrid) = image_type.hybrid_layout() {
                        let array_field = inst.fields.get(hybrid.array_field.0 as usize).cloned().flatten();
                        if let Some(a) = &array_field {
                            self.blacklist.insert(HostId(a.clone()));
                        }
                        if let Some(bf) = hybrid.bitset_field {
                            if let Some(b) = inst.fields.get(bf.0 as usize).cloned().flatten() {
                                self.blacklist.insert(HostId(b));
                            }
                        }
                        let len = array_field.as_deref().map(array_length).transpose()?.unwrap_or(0);
                        layout.reference_aligned(hybrid.total_size(len, word_bytes))
                    } else {
                        image_type.instance_size()
                    }
                }
                HostValue::DynamicHub { .. } => image_type.instance_size(),
                _ => return Err(Error::UnrecognizedMoveType(image_type.name.clone())),
            };
            let written = image_type.fields().iter().any(|f| !f.is_final && f.is_written);
            let references = image_type.fields().iter().any(|f| f.storage_kind.is_reference());
            // A class merely *supporting* a monitor field isn't enough to force
            // the partition: only an instance whose monitor word has actually
            // been set needs a writable, reference-bearing home (spec scenario S5).
            let monitor_forces = image_type.monitor_field_offset() != 0
                && matches!(canonical.as_ref(), HostValue::Instance(inst) if inst.monitor_word_set);
            (size, written, references, monitor_forces)
        } else {
            let component_kind = image_type
                .component_kind()
                .ok_or_else(|| Error::InvalidState("array type has no component kind".into()))?;
            let len = array_length(canonical.as_ref())?;
            let size = layout.array_size(component_kind, len);
            (size, true, component_kind.is_reference(), false)
        };

        let immutable = if monitor_forces {
            false
        } else if immutable_from_parent {
            true
        } else if let HostValue::String { identity_hash, .. } = canonical.as_ref() {
            *identity_hash != 0
        } else if self.known_immutable.contains(&HostId(canonical.clone())) {
            true
        } else {
            canonicalizable
        };
        let written = written || monitor_forces;
        let references = references || monitor_forces;

        let partition_kind = if self.config.use_only_writable_boot_image_heap {
            debug_assert!(!self.config.spawn_isolates);
            PartitionKind::WritableReference
        } else if !written || immutable {
            if references {
                PartitionKind::ReadOnlyReference
            } else {
                PartitionKind::ReadOnlyPrimitive
            }
        } else if references {
            PartitionKind::WritableReference
        } else {
            PartitionKind::WritablePrimitive
        };

        let offset = self.partitions.get_mut(&partition_kind).unwrap().allocate(size);
        let info = Rc::new(ObjectInfo::new(
            canonical.clone(),
            type_id,
            partition_kind,
            offset,
            size,
            identity_hash,
            reason,
        ));
        self.infos.push(info.clone());
        self.identity_map.insert(HostId(canonical.clone()), info.clone());
        if !Rc::ptr_eq(&canonical, &original) {
            self.identity_map.insert(HostId(original), info.clone());
        }

        self.worklist.push(AddTask {
            original: image_type.hub.clone(),
            parent_canonicalizable: true,
            immutable_from_parent: false,
            reason: Reason::Hub { parent: info.clone() },
        });

        match (canonical.as_ref(), &image_type.kind) {
            (HostValue::Instance(inst), TypeKind::Instance { fields, hybrid, .. }) => {
                for (idx, field) in fields.iter().enumerate() {
                    if !field.storage_kind.is_reference() {
                        continue;
                    }
                    if let Some(h) = hybrid {
                        if h.array_field.0 as usize == idx || h.bitset_field.map(|f| f.0 as usize) == Some(idx) {
                            continue;
                        }
                    }
                    if let Some(Some(value)) = inst.fields.get(idx) {
                        self.worklist.push(AddTask {
                            original: value.clone(),
                            parent_canonicalizable: canonicalizable,
                            immutable_from_parent: false,
                            reason: Reason::Field { parent: info.clone(), field: field.name.clone() },
                        });
                    }
                }
                if let Some(h) = hybrid {
                    if h.array_element_kind.is_reference() {
                        if let Some(Some(array_obj)) = inst.fields.get(h.array_field.0 as usize) {
                            if let HostValue::ObjectArray(_, elements, _) = array_obj.as_ref() {
                                for (i, e) in elements.iter().enumerate() {
                                    if let Some(e) = e {
                                        self.worklist.push(AddTask {
                                            original: e.clone(),
                                            parent_canonicalizable: canonicalizable,
                                            immutable_from_parent: false,
                                            reason: Reason::ArrayElement { parent: info.clone(), index: i },
                                        });
                                    }
                                }
                            }
                        }
                    }
                }
            }
            (HostValue::ObjectArray(_, elements, _), TypeKind::Array { component_kind }) if component_kind.is_reference() => {
                for (i, e) in elements.iter().enumerate() {
                    if let Some(e) = e {
                        self.worklist.push(AddTask {
                            original: e.clone(),
                            parent_canonicalizable: canonicalizable,
                            immutable_from_parent: false,
                            reason: Reason::ArrayElement { parent: info.clone(), index: i },
                        });
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn write_field(
        &self,
        buf: &mut RelocatableBuffer,
        base: u32,
        field: &FieldInfo,
        value: Option<&HostObject>,
        word_bytes: u32,
    ) -> Result<(), Error> {
        let at = match field.location {
            crate::metadata::FieldLocation::InstanceOffset(o) => base + o,
            _ => return Ok(()),
        };
        if field.storage_kind.is_reference() {
            match value {
                Some(v) => {
                    let info = self
                        .get_object_info(v)
                        .ok_or_else(|| Error::LateMutation { chain: field.name.clone() })?;
                    let target_offset = self.offset_in_section(&info);
                    buf.emit_reference(at, &info, target_offset, word_bytes, self.config.use_heap_base, self.config.compression_shift as u32, 0)
                }
                None => buf.emit_null_reference(at, word_bytes),
            }
        } else {
            let raw = match value {
                Some(v) => match v.as_ref() {
                    HostValue::Word(w) => *w as i64,
                    _ => return Err(Error::UnrecognizedMoveType(field.name.clone())),
                },
                None => 0,
            };
            buf.emit_primitive(at, field.storage_kind, raw)
        }
    }

    fn write_array_element(
        &self,
        buf: &mut RelocatableBuffer,
        at: u32,
        kind: StorageKind,
        array: &HostValue,
        index: u32,
        word_bytes: u32,
    ) -> Result<(), Error> {
        match (kind, array) {
            (StorageKind::Byte, HostValue::ByteArray(_, data, _)) => {
                buf.emit_primitive(at, StorageKind::Byte, data[index as usize] as i64)
            }
            (StorageKind::Char, HostValue::CharArray(_, data, _)) => {
                buf.emit_primitive(at, StorageKind::Char, data[index as usize] as i64)
            }
            (StorageKind::Char, HostValue::String { content, .. }) => {
                let unit = content
                    .encode_utf16()
                    .nth(index as usize)
                    .ok_or_else(|| Error::InvalidState(format!("string index {index} out of range")))?;
                buf.emit_primitive(at, StorageKind::Char, unit as i64)
            }
            (StorageKind::Int, HostValue::IntArray(_, data, _)) => {
                buf.emit_primitive(at, StorageKind::Int, data[index as usize] as i64)
            }
            (StorageKind::Long, HostValue::LongArray(_, data, _)) => {
                buf.emit_primitive(at, StorageKind::Long, data[index as usize])
            }
            (StorageKind::Reference, HostValue::ObjectArray(_, elements, _)) => {
                match &elements[index as usize] {
                    Some(v) => {
                        let info = self
                            .get_object_info(v)
                            .ok_or_else(|| Error::LateMutation { chain: format!("[{index}]") })?;
                        let target_offset = self.offset_in_section(&info);
                        buf.emit_reference(at, &info, target_offset, word_bytes, self.config.use_heap_base, self.config.compression_shift as u32, 0)
                    }
                    None => buf.emit_null_reference(at, word_bytes),
                }
            }
            _ => Err(Error::UnrecognizedMoveType(format!("array element kind mismatch at index {index}"))),
        }
    }

    /// Writes every image object into its partition's buffer (spec §4.3),
    /// then patches any registered boundary markers (spec §4.5).
    pub fn write_heap(&self, ro_buf: &mut RelocatableBuffer, rw_buf: &mut RelocatableBuffer) -> Result<(), Error> {
        let layout = *self.metadata.layout();
        let word_bytes = layout.word_bytes;
        let header_bits = self.config.object_header_bits;

        for info in &self.infos {
            let image_type = self
                .metadata
                .lookup_type(info.class)
                .ok_or_else(|| Error::InvalidState("type vanished between traversal and write".into()))?;
            let hub_info = self
                .get_object_info(&image_type.hub)
                .ok_or_else(|| Error::LateMutation { chain: info.reason.chain() })?;
            let base = self.offset_in_section(info);
            let writable = info.partition.writable();
            let buf: &mut RelocatableBuffer = if writable { rw_buf } else { ro_buf };
            let hub_offset = self.offset_in_section(&hub_info);
            buf.emit_reference(base + layout.hub_offset, &hub_info, hub_offset, word_bytes, self.config.use_heap_base, self.config.compression_shift as u32, header_bits)?;

            match (info.object.as_ref(), &image_type.kind) {
                (HostValue::Instance(inst), TypeKind::Instance { fields, .. }) => {
                    if let Some(hybrid) = image_type.hybrid_layout() {
                        if let Some(bf) = hybrid.bitset_field {
                            if let Some(Some(bits)) = inst.fields.get(bf.0 as usize) {
                                if let HostValue::ByteArray(_, bytes, _) = bits.as_ref() {
                                    for (i, b) in bytes.iter().enumerate() {
                                        buf.or_byte_at(base + hybrid.bit_field_offset + i as u32, *b);
                                    }
                                }
                            }
                        }
                        for (idx, field) in fields.iter().enumerate() {
                            if hybrid.array_field.0 as usize == idx || hybrid.bitset_field.map(|f| f.0 as usize) == Some(idx) {
                                continue;
                            }
                            self.write_field(buf, base, field, inst.fields.get(idx).and_then(|f| f.as_ref()), word_bytes)?;
                        }
                        buf.write_u32_at(base + image_type.hash_code_offset, info.identity_hash_code() as u32)?;
                        if let Some(Some(array_obj)) = inst.fields.get(hybrid.array_field.0 as usize) {
                            let len = array_length(array_obj)?;
                            buf.write_u32_at(base + layout.array_length_offset, len)?;
                            for i in 0..len {
                                let at = base + hybrid.array_element_offset(i, word_bytes);
                                self.write_array_element(buf, at, hybrid.array_element_kind, array_obj, i, word_bytes)?;
                            }
                        }
                    } else {
                        for (idx, field) in fields.iter().enumerate() {
                            self.write_field(buf, base, field, inst.fields.get(idx).and_then(|f| f.as_ref()), word_bytes)?;
                        }
                        buf.write_u32_at(base + image_type.hash_code_offset, info.identity_hash_code() as u32)?;
                    }
                }
                (HostValue::DynamicHub { .. }, TypeKind::Instance { .. }) => {
                    // No modeled per-field data of its own; only the hub
                    // reference (written above) and identity hash apply.
                    buf.write_u32_at(base + image_type.hash_code_offset, info.identity_hash_code() as u32)?;
                }
                (array, TypeKind::Array { component_kind }) => {
                    let len = array_length(array)?;
                    buf.write_u32_at(base + layout.array_length_offset, len)?;
                    buf.write_u32_at(base + layout.array_hash_code_offset, info.identity_hash_code() as u32)?;
                    for i in 0..len {
                        let at = base + layout.array_element_offset(*component_kind, i);
                        self.write_array_element(buf, at, *component_kind, array, i, word_bytes)?;
                    }
                }
                _ => return Err(Error::UnrecognizedMoveType(image_type.name.clone())),
            }
        }

        self.patch_boundary_markers(ro_buf, rw_buf)?;
        Ok(())
    }

    /// Patches the primitive static-fields array with each registered
    /// partition's start/end offset (spec §4.5).
    fn patch_boundary_markers(&self, ro_buf: &mut RelocatableBuffer, rw_buf: &mut RelocatableBuffer) -> Result<(), Error> {
        if self.boundary_markers.is_empty() {
            return Ok(());
        }
        let layout = *self.metadata.layout();
        let statics = self.metadata.static_fields();
        let array_info = self
            .get_object_info(&statics.primitive_array)
            .ok_or_else(|| Error::InvalidState("primitive static-fields array was never added".into()))?;
        let array_buf: &mut RelocatableBuffer = if array_info.partition.writable() { rw_buf } else { ro_buf };

        for marker in &self.boundary_markers {
            let value = match self.partition_bounds(marker.partition) {
                Some((start, end)) => match marker.kind {
                    BoundaryKind::Start => start,
                    BoundaryKind::End => end,
                },
                None => 0,
            };
            let at = self.offset_in_section(&array_info)
                + layout.array_element_offset(StorageKind::Long, marker.static_primitive_index);
            array_buf.emit_primitive(at, StorageKind::Long, value as i64)?;
        }
        Ok(())
    }

    /// Min/max `offset_in_section` among the objects placed in `kind` (spec
    /// §4.5): buffer-relative, not partition-relative, so a boundary marker
    /// for the reference half of a buffer is comparable with one for the
    /// primitive half sharing that same buffer.
    fn partition_bounds(&self, kind: PartitionKind) -> Option<(u32, u32)> {
        let base = self.partition_base_in_buffer(kind);
        self.infos
            .iter()
            .filter(|i| i.partition == kind)
            .fold(None, |acc, i| {
                let start = base + i.offset_in_partition;
                let end = start + i.size;
                let (acc_start, acc_end) = acc.unwrap_or((start, end));
                Some((start.min(acc_start), end.max(acc_end)))
            })
    }
}

fn array_length(value: &HostValue) -> Result<u32, Error> {
    match value {
        HostValue::String { content, .. } => Ok(content.encode_utf16().count() as u32),
        HostValue::ByteArray(_, a, _) => Ok(a.len() as u32),
        HostValue::CharArray(_, a, _) => Ok(a.len() as u32),
        HostValue::IntArray(_, a, _) => Ok(a.len() as u32),
        HostValue::LongArray(_, a, _) => Ok(a.len() as u32),
        HostValue::ObjectArray(_, a, _) => Ok(a.len() as u32),
        other => Err(Error::UnrecognizedMoveType(format!("{other:?} has no array length"))),
    }
}
