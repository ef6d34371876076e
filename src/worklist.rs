use crate::host::HostObject;
use crate::object_info::Reason;

/// One pending traversal step. Pushed once an object's own `ObjectInfo` has
/// already been created — so by construction, re-encountering the same
/// object via a cycle finds it already in the identity map and never
/// re-pushes its children (spec §9: "Cyclic graphs").
pub struct AddTask {
    pub original: HostObject,
    pub parent_canonicalizable: bool,
    pub immutable_from_parent: bool,
    pub reason: Reason,
}

/// A LIFO buffer of pending traversal tasks, so recursion depth is bounded
/// by available memory rather than call-stack depth (spec §2/§9).
#[derive(Default)]
pub struct Worklist {
    tasks: Vec<AddTask>,
}

impl Worklist {
    pub fn push(&mut self, task: AddTask) {
        self.tasks.push(task);
    }

    pub fn pop(&mut self) -> Option<AddTask> {
        self.tasks.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{obj, HostValue};

    #[test]
    fn drains_in_lifo_order() {
        let mut wl = Worklist::default();
        wl.push(AddTask {
            original: obj(HostValue::Word(1)),
            parent_canonicalizable: false,
            immutable_from_parent: false,
            reason: Reason::Root("a".into()),
        });
        wl.push(AddTask {
            original: obj(HostValue::Word(2)),
            parent_canonicalizable: false,
            immutable_from_parent: false,
            reason: Reason::Root("b".into()),
        });
        let first = wl.pop().unwrap();
        match first.original.as_ref() {
            HostValue::Word(2) => {}
            _ => panic!("expected LIFO order"),
        }
        assert!(!wl.is_empty());
        wl.pop();
        assert!(wl.is_empty());
    }
}
