use std::collections::HashMap;
use std::rc::Rc;

use crate::host::HostObject;

/// An interned class identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// An interned field identifier, scoped to its owning class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub u32);

/// The storage kind of a field or array element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Reference,
    Byte,
    Char,
    Int,
    Long,
    /// A machine-sized integer that is never an image object (a "word").
    Word,
}

impl StorageKind {
    pub fn is_reference(&self) -> bool {
        matches!(self, StorageKind::Reference)
    }

    /// Byte width of one element/field of this kind, used for array sizing
    /// and primitive writes.
    pub fn width(&self, word_bytes: usize) -> usize {
        match self {
            StorageKind::Byte => 1,
            StorageKind::Char => 2,
            StorageKind::Int => 4,
            StorageKind::Long => 8,
            StorageKind::Reference | StorageKind::Word => word_bytes,
        }
    }
}

/// Where a field's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    /// A byte offset within the instance's own layout.
    InstanceOffset(u32),
    /// An index into the primitive static-fields placeholder array.
    StaticPrimitiveSlot(u32),
    /// An index into the reference static-fields placeholder array.
    StaticReferenceSlot(u32),
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub storage_kind: StorageKind,
    pub is_accessed: bool,
    pub is_written: bool,
    pub is_final: bool,
    pub location: FieldLocation,
}

/// A class whose instances embed a trailing array (and optionally a
/// bitset) inside the same allocation as the instance fields.
#[derive(Debug, Clone)]
pub struct HybridLayout {
    pub array_field: FieldId,
    pub bitset_field: Option<FieldId>,
    pub bit_field_offset: u32,
    pub array_element_kind: StorageKind,
    /// `total_size(0)`: the fixed portion of the layout before the array.
    pub base_size: u32,
}

impl HybridLayout {
    pub fn array_element_offset(&self, i: u32, word_bytes: u32) -> u32 {
        self.base_size + i * self.array_element_kind.width(word_bytes as usize) as u32
    }

    pub fn total_size(&self, array_length: u32, word_bytes: u32) -> u32 {
        self.array_element_offset(array_length, word_bytes)
    }
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Instance {
        fields: Vec<FieldInfo>,
        monitor_field_offset: u32,
        hybrid: Option<HybridLayout>,
        /// Size of one instance with no hybrid trailing array, already
        /// reference-aligned (`instance_size_from_layout_encoding`).
        instance_size: u32,
    },
    Array {
        component_kind: StorageKind,
    },
}

/// The image-side descriptor for one class, as supplied by the (out of
/// scope) analysis/metadata layer.
#[derive(Debug, Clone)]
pub struct ImageType {
    pub id: TypeId,
    pub name: String,
    pub instantiated: bool,
    pub kind: TypeKind,
    /// The `DynamicHub` host object that represents this class in the
    /// image; enqueued for every instance/array of the class.
    pub hub: HostObject,
    /// Offset of the identity-hash field within the instance/array layout.
    pub hash_code_offset: u32,
}

impl ImageType {
    pub fn is_instance_class(&self) -> bool {
        matches!(self.kind, TypeKind::Instance { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    pub fn fields(&self) -> &[FieldInfo] {
        match &self.kind {
            TypeKind::Instance { fields, .. } => fields,
            TypeKind::Array { .. } => &[],
        }
    }

    pub fn monitor_field_offset(&self) -> u32 {
        match &self.kind {
            TypeKind::Instance {
                monitor_field_offset,
                ..
            } => *monitor_field_offset,
            TypeKind::Array { .. } => 0,
        }
    }

    pub fn hybrid_layout(&self) -> Option<&HybridLayout> {
        match &self.kind {
            TypeKind::Instance { hybrid, .. } => hybrid.as_ref(),
            TypeKind::Array { .. } => None,
        }
    }

    pub fn instance_size(&self) -> u32 {
        match &self.kind {
            TypeKind::Instance { instance_size, .. } => *instance_size,
            TypeKind::Array { .. } => 0,
        }
    }

    pub fn component_kind(&self) -> Option<StorageKind> {
        match &self.kind {
            TypeKind::Array { component_kind } => Some(*component_kind),
            TypeKind::Instance { .. } => None,
        }
    }
}

/// Fixed object-layout constants, not part of the metadata provider trait
/// since they do not vary per class.
#[derive(Debug, Clone, Copy)]
pub struct LayoutConstants {
    pub word_bytes: u32,
    pub hub_offset: u32,
    pub array_length_offset: u32,
    pub array_hash_code_offset: u32,
    pub array_base_offset: u32,
}

impl LayoutConstants {
    pub fn alignment(&self) -> u32 {
        self.word_bytes
    }

    pub fn reference_aligned(&self, n: u32) -> u32 {
        let a = self.alignment();
        (n + a - 1) / a * a
    }

    pub fn array_element_offset(&self, kind: StorageKind, i: u32) -> u32 {
        self.array_base_offset + i * kind.width(self.word_bytes as usize) as u32
    }

    pub fn array_size(&self, kind: StorageKind, length: u32) -> u32 {
        self.reference_aligned(self.array_element_offset(kind, length))
    }
}

impl Default for LayoutConstants {
    fn default() -> Self {
        LayoutConstants {
            word_bytes: 8,
            hub_offset: 0,
            array_length_offset: 8,
            array_hash_code_offset: 12,
            array_base_offset: 16,
        }
    }
}

/// Describes the two placeholder arrays (primitive, reference) whose
/// per-field `location` tells the writer where each static slot lives.
#[derive(Debug, Clone)]
pub struct StaticFieldsInfo {
    pub primitive_array: HostObject,
    pub reference_array: HostObject,
}

/// The external metadata-provider trait boundary (spec §6). Consumed, never
/// implemented by the core algorithm; the analysis/metadata layer that
/// backs it is out of scope for this crate.
pub trait Metadata {
    fn lookup_type(&self, class: TypeId) -> Option<&ImageType>;
    fn layout(&self) -> &LayoutConstants;
    fn static_fields(&self) -> &StaticFieldsInfo;
    fn hybrid_layout(&self, class: TypeId) -> Option<Rc<HybridLayout>> {
        self.lookup_type(class)
            .and_then(|t| t.hybrid_layout())
            .map(|l| Rc::new(l.clone()))
    }
}

/// A simple in-memory `Metadata` implementation used by this crate's own
/// tests, and usable as a template by a real ahead-of-time driver.
#[derive(Debug, Default)]
pub struct TestMetadata {
    pub types: HashMap<TypeId, ImageType>,
    pub layout: LayoutConstants,
    pub statics: Option<StaticFieldsInfo>,
}

impl TestMetadata {
    pub fn register(&mut self, ty: ImageType) {
        self.types.insert(ty.id, ty);
    }
}

impl Metadata for TestMetadata {
    fn lookup_type(&self, class: TypeId) -> Option<&ImageType> {
        self.types.get(&class)
    }

    fn layout(&self) -> &LayoutConstants {
        &self.layout
    }

    fn static_fields(&self) -> &StaticFieldsInfo {
        self.statics
            .as_ref()
            .expect("TestMetadata::static_fields: statics not registered")
    }
}
