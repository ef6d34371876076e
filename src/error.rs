use std::io;

/// All failure modes of the image-heap builder.
///
/// Every variant is fatal: nothing in this crate retries. Most variants carry
/// a pre-rendered provenance-chain string so the caller does not need to walk
/// `ObjectInfo::reason` links itself.
#[derive(Debug)]
pub enum Error {
    /// The canonical object's class was never marked instantiated by the
    /// analyzer. Carries the provenance chain from the root.
    UnreachableType { type_name: String, chain: String },

    /// A referenced target has no `ObjectInfo` at write time: something
    /// reachable changed after the analysis phase completed.
    LateMutation { chain: String },

    /// `add`/`intern`/`register_immutable` called outside their allowed
    /// phase window.
    PhaseViolation(String),

    /// An offset or in-section index was not reference-aligned.
    AlignmentViolation { what: String, offset: usize, alignment: usize },

    /// A non-data relocation targeted something that is neither a method
    /// pointer nor a known function pointer.
    UnknownPointerRelocation(String),

    /// A miscellaneous categorization error.
    UnrecognizedMoveType(String),

    /// Any other invariant violation, with a free-form description.
    InvalidState(String),

    /// Propagated I/O failure while writing to a relocatable buffer.
    IOError(io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IOError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
