use std::collections::BTreeSet;
use std::rc::Rc;

use crate::error::Error;
use crate::phase::Phase;

/// Strings interned on the host must appear in the image's intern table.
/// Insertions are disallowed once `freeze` has produced the sorted array,
/// keeping it stable for writing (spec §4.4).
#[derive(Default)]
pub struct InternTable {
    strings: BTreeSet<Rc<str>>,
    frozen: Option<Vec<Rc<str>>>,
}

impl InternTable {
    pub fn insert(&mut self, phase: &Phase, s: Rc<str>) -> Result<(), Error> {
        phase.check_allowed("intern")?;
        self.strings.insert(s);
        Ok(())
    }

    /// Builds the final, strictly ascending, distinct-string array and
    /// freezes the table against further insertion.
    pub fn freeze(&mut self) -> &[Rc<str>] {
        let sorted: Vec<Rc<str>> = self.strings.iter().cloned().collect();
        self.frozen = Some(sorted);
        self.frozen.as_deref().unwrap()
    }

    pub fn frozen(&self) -> Option<&[Rc<str>]> {
        self.frozen.as_deref()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freeze_produces_strictly_ascending_distinct_array() {
        let mut table = InternTable::default();
        let mut phase = Phase::default();
        phase.allow("intern").unwrap();
        table.insert(&phase, Rc::from("banana")).unwrap();
        table.insert(&phase, Rc::from("apple")).unwrap();
        table.insert(&phase, Rc::from("apple")).unwrap();
        let frozen = table.freeze();
        assert_eq!(frozen.len(), 2);
        assert!(frozen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn insert_rejected_outside_allowed_phase() {
        let mut table = InternTable::default();
        let phase = Phase::default();
        assert!(table.insert(&phase, Rc::from("x")).is_err());
    }
}
