use std::rc::Rc;

use crate::metadata::TypeId;

/// A reference to a host object. Identity is `Rc` pointer identity — two
/// `HostObject`s are the "same object" iff `Rc::ptr_eq` holds, matching the
/// host-identity semantics the identity map relies on.
pub type HostObject = Rc<HostValue>;

/// The host object graph, realized directly instead of through reflection
/// (spec §9: "the metadata layer must offer typed accessors ... the builder
/// never needs untyped reflection"). This is the full closed set of shapes
/// the builder ever has to classify.
#[derive(Debug)]
pub enum HostValue {
    /// A machine-sized integer wrapper ("word"); never an image object.
    Word(u64),

    /// A host string, with its own `TypeId` (so it still has a metadata
    /// entry to look up size/hub/instantiated from), its host identity
    /// hash, and a flag standing in for "the host has interned this
    /// string" — normally discovered by re-interning a copy and comparing
    /// for pointer equality with `original`; supplied directly here since
    /// Rust has no host string-intern pool to query.
    String {
        class: TypeId,
        content: Rc<str>,
        identity_hash: i32,
        host_interned: bool,
    },

    ByteArray(TypeId, Rc<[u8]>, i32),
    CharArray(TypeId, Rc<[u16]>, i32),
    IntArray(TypeId, Rc<[i32]>, i32),
    LongArray(TypeId, Rc<[i64]>, i32),
    ObjectArray(TypeId, Vec<Option<HostObject>>, i32),

    Instance(Instance),

    /// A `java.lang.Class` host object. By the time an object reaches
    /// `NativeImageHeap::add`, an out-of-scope upstream replacer is
    /// expected to already have substituted every `Class` reference with
    /// its `DynamicHub` — seeing one here is a hard failure (spec §4.1
    /// step 2: "classes are never image objects").
    Class(TypeId, i32),

    /// The image-side per-class descriptor. `represents` is the class this
    /// hub describes (what makes two `DynamicHub`s for the same class the
    /// same image object); `hub_class` is the hub's own runtime class, used
    /// to look up its own layout/size (every hub shares one common layout,
    /// regardless of which class it represents). Also carries its own
    /// identity hash and whether this particular host representation
    /// arrived via the `java.lang.Class` path (used by the identity-hash
    /// upgrade rule; see scenario S6).
    DynamicHub {
        represents: TypeId,
        hub_class: TypeId,
        identity_hash: i32,
        from_class: bool,
    },
}

/// An instance of a non-array, non-hybrid-embedded class.
///
/// `fields` holds one entry per field in
/// `metadata.lookup_type(class).fields()` order — this *is* the typed
/// accessor the spec's design notes call for: `read_storage_value` becomes
/// plain indexing rather than reflection.
#[derive(Debug)]
pub struct Instance {
    pub class: TypeId,
    pub fields: Vec<Option<HostObject>>,
    /// Stand-in for `System.identityHashCode`/a provider: supplied by
    /// whoever builds the graph, since Rust has no identity-hash primitive.
    pub identity_hash: i32,
    /// Whether this instance's monitor word has been set (forces
    /// writable+references+non-immutable per the add-to-image algorithm).
    pub monitor_word_set: bool,
}

impl HostValue {
    pub fn is_word(&self) -> bool {
        matches!(self, HostValue::Word(_))
    }

    pub fn is_class(&self) -> bool {
        matches!(self, HostValue::Class(..))
    }

    /// The type used to look up this object's own layout/size — *not* the
    /// class a `DynamicHub` represents, but the hub's own runtime class.
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            HostValue::Word(_) => None,
            HostValue::String { class, .. } => Some(*class),
            HostValue::ByteArray(t, _, _)
            | HostValue::CharArray(t, _, _)
            | HostValue::IntArray(t, _, _)
            | HostValue::LongArray(t, _, _)
            | HostValue::ObjectArray(t, _, _)
            | HostValue::Class(t, _) => Some(*t),
            HostValue::DynamicHub { hub_class, .. } => Some(*hub_class),
            HostValue::Instance(inst) => Some(inst.class),
        }
    }

    pub fn identity_hash(&self) -> i32 {
        match self {
            HostValue::Word(_) => 0,
            HostValue::String { identity_hash, .. } => *identity_hash,
            HostValue::ByteArray(_, _, h)
            | HostValue::CharArray(_, _, h)
            | HostValue::IntArray(_, _, h)
            | HostValue::LongArray(_, _, h)
            | HostValue::ObjectArray(_, _, h) => *h,
            HostValue::Instance(inst) => inst.identity_hash,
            HostValue::Class(_, h) => *h,
            HostValue::DynamicHub { identity_hash, .. } => *identity_hash,
        }
    }
}

/// Convenience for building `HostObject`s in tests and fixtures.
pub fn obj(value: HostValue) -> HostObject {
    Rc::new(value)
}
