use std::rc::Rc;

use crate::host::HostObject;
use crate::metadata::TypeId;
use crate::partition::PartitionKind;

/// Free-form provenance for an `ObjectInfo`, used only to reconstruct a
/// reason chain for error messages — never read by the core algorithm.
#[derive(Debug, Clone)]
pub enum Reason {
    Root(String),
    Field { parent: Rc<ObjectInfo>, field: String },
    ArrayElement { parent: Rc<ObjectInfo>, index: usize },
    Hub { parent: Rc<ObjectInfo> },
}

impl Reason {
    /// Walks `Reason` links back to a root tag, producing the human-facing
    /// provenance chain used by fatal errors (spec §7).
    pub fn chain(&self) -> String {
        let mut parts = Vec::new();
        let mut current = self;
        loop {
            match current {
                Reason::Root(tag) => {
                    parts.push(format!("root({tag})"));
                    break;
                }
                Reason::Field { parent, field } => {
                    parts.push(format!(".{field}"));
                    current = &parent.reason;
                }
                Reason::ArrayElement { parent, index } => {
                    parts.push(format!("[{index}]"));
                    current = &parent.reason;
                }
                Reason::Hub { parent } => {
                    parts.push(".<hub>".to_string());
                    current = &parent.reason;
                }
            }
        }
        parts.reverse();
        parts.join("")
    }
}

/// The sole in-image identity of a canonical object (spec §3).
///
/// `offset_in_partition` and `size` are immutable once inserted;
/// `identity_hash_code` may be upgraded exactly once, from a
/// `DynamicHub`-derived value to a `java.lang.Class`-derived value, when the
/// same canonical image object is reached from both hosts.
#[derive(Debug)]
pub struct ObjectInfo {
    pub object: HostObject,
    pub class: TypeId,
    pub partition: PartitionKind,
    pub offset_in_partition: u32,
    pub size: u32,
    identity_hash_code: std::cell::Cell<i32>,
    hash_upgraded: std::cell::Cell<bool>,
    pub reason: Reason,
}

impl ObjectInfo {
    pub fn new(
        object: HostObject,
        class: TypeId,
        partition: PartitionKind,
        offset_in_partition: u32,
        size: u32,
        identity_hash_code: i32,
        reason: Reason,
    ) -> Self {
        ObjectInfo {
            object,
            class,
            partition,
            offset_in_partition,
            size,
            identity_hash_code: std::cell::Cell::new(identity_hash_code),
            hash_upgraded: std::cell::Cell::new(false),
            reason,
        }
    }

    pub fn identity_hash_code(&self) -> i32 {
        self.identity_hash_code.get()
    }

    /// Upgrades the identity hash from a `DynamicHub`-derived value to a
    /// `java.lang.Class`-derived value. Allowed exactly once; later calls
    /// (including from the same path again) are no-ops.
    pub fn upgrade_identity_hash(&self, class_derived_hash: i32) {
        if !self.hash_upgraded.get() {
            self.identity_hash_code.set(class_derived_hash);
            self.hash_upgraded.set(true);
        }
    }

    pub fn end_offset(&self) -> u32 {
        self.offset_in_partition + self.size
    }
}
