use std::collections::HashMap;
use std::rc::Rc;

use crate::host::{HostObject, HostValue};

/// A content-equality/hash wrapper for the shapes that may be canonicalized
/// (spec §4.2): byte/char/int/long/reference arrays by deep content, all
/// other canonicalizable shapes (strings, and any instance class an
/// embedder marks canonicalizable) by their own equality.
///
/// Two objects of different runtime class are never equivalent, even if
/// their content happens to coincide — each array element kind is its own
/// `HostValue` variant, and instances/strings additionally carry their
/// `TypeId`, so variant-plus-class equality gives "same runtime class" for
/// free.
#[derive(Clone)]
pub struct CanonicalizationKey(pub HostObject);

impl PartialEq for CanonicalizationKey {
    fn eq(&self, other: &Self) -> bool {
        content_eq(&self.0, &other.0)
    }
}

impl Eq for CanonicalizationKey {}

impl std::hash::Hash for CanonicalizationKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        content_hash(&self.0, state);
    }
}

fn content_eq(a: &HostObject, b: &HostObject) -> bool {
    match (a.as_ref(), b.as_ref()) {
        (
            HostValue::String { class: c1, content: s1, .. },
            HostValue::String { class: c2, content: s2, .. },
        ) => c1 == c2 && s1 == s2,
        (HostValue::ByteArray(c1, x1, _), HostValue::ByteArray(c2, x2, _)) => {
            c1 == c2 && x1 == x2
        }
        (HostValue::CharArray(c1, x1, _), HostValue::CharArray(c2, x2, _)) => {
            c1 == c2 && x1 == x2
        }
        (HostValue::IntArray(c1, x1, _), HostValue::IntArray(c2, x2, _)) => {
            c1 == c2 && x1 == x2
        }
        (HostValue::LongArray(c1, x1, _), HostValue::LongArray(c2, x2, _)) => {
            c1 == c2 && x1 == x2
        }
        (HostValue::ObjectArray(c1, xs1, _), HostValue::ObjectArray(c2, xs2, _)) => {
            c1 == c2 && xs1.len() == xs2.len() && xs1.iter().zip(xs2).all(|(e1, e2)| element_eq(e1, e2))
        }
        (HostValue::Instance(i1), HostValue::Instance(i2)) => {
            i1.class == i2.class
                && i1.fields.len() == i2.fields.len()
                && i1.fields.iter().zip(&i2.fields).all(|(f1, f2)| element_eq(f1, f2))
        }
        (
            HostValue::DynamicHub { represents: r1, .. },
            HostValue::DynamicHub { represents: r2, .. },
        ) => r1 == r2,
        _ => Rc::ptr_eq(a, b),
    }
}

/// Element/field comparison within a reference array or instance: recurse
/// into nested arrays/instances by content, otherwise compare leaves by
/// identity (spec §4.2: "identity for embedded non-array objects").
fn element_eq(a: &Option<HostObject>, b: &Option<HostObject>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            if is_recursable(a) && is_recursable(b) {
                content_eq(a, b)
            } else {
                Rc::ptr_eq(a, b)
            }
        }
        _ => false,
    }
}

fn is_recursable(v: &HostObject) -> bool {
    matches!(
        v.as_ref(),
        HostValue::ByteArray(..)
            | HostValue::CharArray(..)
            | HostValue::IntArray(..)
            | HostValue::LongArray(..)
            | HostValue::ObjectArray(..)
    )
}

fn content_hash<H: std::hash::Hasher>(v: &HostObject, state: &mut H) {
    use std::hash::Hash;
    match v.as_ref() {
        HostValue::String { class, content, .. } => {
            0u8.hash(state);
            class.hash(state);
            content.hash(state);
        }
        HostValue::ByteArray(c, x, _) => {
            1u8.hash(state);
            c.hash(state);
            x.hash(state);
        }
        HostValue::CharArray(c, x, _) => {
            2u8.hash(state);
            c.hash(state);
            x.hash(state);
        }
        HostValue::IntArray(c, x, _) => {
            3u8.hash(state);
            c.hash(state);
            x.hash(state);
        }
        HostValue::LongArray(c, x, _) => {
            4u8.hash(state);
            c.hash(state);
            x.hash(state);
        }
        HostValue::ObjectArray(c, xs, _) => {
            5u8.hash(state);
            c.hash(state);
            for e in xs {
                element_hash(e, state);
            }
        }
        HostValue::Instance(inst) => {
            6u8.hash(state);
            inst.class.hash(state);
            for f in &inst.fields {
                element_hash(f, state);
            }
        }
        HostValue::DynamicHub { represents, .. } => {
            7u8.hash(state);
            represents.hash(state);
        }
        HostValue::Class(..) | HostValue::Word(_) => {
            8u8.hash(state);
            (Rc::as_ptr(v) as usize).hash(state);
        }
    }
}

fn element_hash<H: std::hash::Hasher>(e: &Option<HostObject>, state: &mut H) {
    match e {
        None => 0u8.hash(state),
        Some(v) if is_recursable(v) => {
            1u8.hash(state);
            content_hash(v, state);
        }
        Some(v) => {
            2u8.hash(state);
            (Rc::as_ptr(v) as usize).hash(state);
        }
    }
}

/// First host object seen for a given content key wins; later duplicates
/// are replaced by the winner on lookup.
#[derive(Default)]
pub struct CanonicalizationMap {
    map: HashMap<CanonicalizationKey, HostObject>,
}

impl CanonicalizationMap {
    pub fn canonicalize(&mut self, original: HostObject) -> HostObject {
        let key = CanonicalizationKey(original.clone());
        match self.map.get(&key) {
            Some(winner) => winner.clone(),
            None => {
                self.map.insert(key, original.clone());
                original
            }
        }
    }
}
