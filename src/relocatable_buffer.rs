use std::rc::Rc;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::Error;
use crate::metadata::StorageKind;
use crate::object_info::ObjectInfo;

/// What a relocation record points at: either a heap object (by its
/// canonical `ObjectInfo`) or a method (by its compiled-code identity).
#[derive(Debug, Clone)]
pub enum RelocationSymbol {
    Object(Rc<ObjectInfo>),
    Method(MethodPointer),
}

/// A pending patch the link/load step must apply. `EncodedCompressedRef` is
/// not a record: it's written as a plain little-endian value at emission
/// time and never recorded here (spec §6).
#[derive(Debug, Clone)]
pub enum Relocation {
    DirectNoAddend { at: u32, size: u8, symbol: RelocationSymbol },
    DirectWithAddend { at: u32, size: u8, addend: u64, symbol: RelocationSymbol },
}

/// A reference to a method, as emitted by `emit_method_pointer`. Only a
/// method that was compiled and is vtable-reachable (a valid `code_offset`)
/// may be relocated; anything else is an unknown-pointer-relocation error.
#[derive(Debug, Clone)]
pub struct MethodPointer {
    pub name: String,
    pub code_offset: Option<u32>,
}

/// A growable byte buffer plus the relocation records accumulated against
/// it. Used once per writable partition and once per read-only partition
/// (spec §2).
#[derive(Default)]
pub struct RelocatableBuffer {
    data: Vec<u8>,
    relocations: Vec<Relocation>,
}

impl RelocatableBuffer {
    pub fn with_capacity(cap: usize) -> Self {
        RelocatableBuffer {
            data: Vec::with_capacity(cap),
            relocations: Vec::new(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn relocations(&self) -> &[Relocation] {
        &self.relocations
    }

    pub fn position(&self) -> u32 {
        self.data.len() as u32
    }

    /// Grows the buffer with zero bytes up to at least `len`. Objects are
    /// written at their pre-assigned partition offset rather than strictly
    /// append-only, so the buffer must be able to grow ahead of a write.
    pub fn ensure_len(&mut self, len: usize) {
        if self.data.len() < len {
            self.data.resize(len, 0);
        }
    }

    fn check_aligned(&self, what: &str, at: u32, alignment: u32) -> Result<(), Error> {
        if at % alignment != 0 {
            Err(Error::AlignmentViolation {
                what: what.to_string(),
                offset: at as usize,
                alignment: alignment as usize,
            })
        } else {
            Ok(())
        }
    }

    /// Emits a reference at byte offset `at` pointing at `target`, whose
    /// position within its buffer (read-only or writable) is
    /// `target_offset_in_section` — the partition's own `offset_in_partition`
    /// plus the byte offset its partition starts at within the buffer that
    /// holds it and its sibling primitive/reference partition (spec §4.3).
    ///
    /// With a heap base, `target_offset_in_section` (shifted right by
    /// `compression_shift`) is written as a plain little-endian value; the
    /// header bits of `hub_header_bits` (non-zero only for hub references)
    /// are OR'ed in first. Without a heap base, a direct relocation is
    /// recorded instead — `DirectWithAddend` carrying the header bits when
    /// this is a hub reference, `DirectNoAddend` otherwise.
    pub fn emit_reference(
        &mut self,
        at: u32,
        target: &Rc<ObjectInfo>,
        target_offset_in_section: u32,
        word_bytes: u32,
        use_heap_base: bool,
        compression_shift: u32,
        hub_header_bits: u64,
    ) -> Result<(), Error> {
        self.check_aligned("reference", at, word_bytes)?;
        self.ensure_len(at as usize + word_bytes as usize);
        if use_heap_base {
            let offset = target_offset_in_section as u64;
            let encoded = (offset >> compression_shift) | hub_header_bits;
            self.write_u64_at(at, encoded)
        } else if hub_header_bits != 0 {
            self.relocations.push(Relocation::DirectWithAddend {
                at,
                size: word_bytes as u8,
                addend: hub_header_bits,
                symbol: RelocationSymbol::Object(target.clone()),
            });
            Ok(())
        } else {
            self.relocations.push(Relocation::DirectNoAddend {
                at,
                size: word_bytes as u8,
                symbol: RelocationSymbol::Object(target.clone()),
            });
            Ok(())
        }
    }

    /// Emits a null reference: a plain zero word, never a relocation.
    pub fn emit_null_reference(&mut self, at: u32, word_bytes: u32) -> Result<(), Error> {
        self.check_aligned("reference", at, word_bytes)?;
        self.write_u64_at(at, 0)
    }

    /// Emits a method pointer: a relocation is recorded only when the
    /// method's code offset is valid (compiled and vtable-reachable). This
    /// is the only relocation kind that does not target a heap object.
    pub fn emit_method_pointer(
        &mut self,
        at: u32,
        word_bytes: u32,
        method: &MethodPointer,
    ) -> Result<(), Error> {
        self.check_aligned("method pointer", at, word_bytes)?;
        match method.code_offset {
            Some(_) => {
                self.ensure_len(at as usize + word_bytes as usize);
                self.relocations.push(Relocation::DirectNoAddend {
                    at,
                    size: word_bytes as u8,
                    symbol: RelocationSymbol::Method(method.clone()),
                });
                Ok(())
            }
            None => Err(Error::UnknownPointerRelocation(method.name.clone())),
        }
    }

    /// Dispatches a primitive write by storage kind to fixed-width
    /// little-endian writes at byte offset `at`.
    pub fn emit_primitive(&mut self, at: u32, kind: StorageKind, value: i64) -> Result<(), Error> {
        self.ensure_len(at as usize + kind.width(8));
        let mut cursor = std::io::Cursor::new(&mut self.data[at as usize..]);
        match kind {
            StorageKind::Byte => cursor.write_u8(value as u8)?,
            StorageKind::Char => cursor.write_u16::<LittleEndian>(value as u16)?,
            StorageKind::Int => cursor.write_i32::<LittleEndian>(value as i32)?,
            StorageKind::Long | StorageKind::Word => cursor.write_i64::<LittleEndian>(value)?,
            StorageKind::Reference => {
                return Err(Error::InvalidState(
                    "emit_primitive called with a reference-kind field".into(),
                ))
            }
        }
        Ok(())
    }

    pub fn write_u32_at(&mut self, at: u32, value: u32) -> Result<(), Error> {
        self.ensure_len(at as usize + 4);
        let mut cursor = std::io::Cursor::new(&mut self.data[at as usize..]);
        cursor.write_u32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_u64_at(&mut self, at: u32, value: u64) -> Result<(), Error> {
        self.ensure_len(at as usize + 8);
        let mut cursor = std::io::Cursor::new(&mut self.data[at as usize..]);
        cursor.write_u64::<LittleEndian>(value)?;
        Ok(())
    }

    /// OR's `bits` into the byte at `at`, used for hybrid bit-set fields
    /// (spec §4.3: "setting each set bit via byte-wise OR").
    pub fn or_byte_at(&mut self, at: u32, bits: u8) {
        self.ensure_len(at as usize + 1);
        self.data[at as usize] |= bits;
    }

    pub fn write_bytes_at(&mut self, at: u32, bytes: &[u8]) -> Result<(), Error> {
        self.ensure_len(at as usize + bytes.len());
        self.data[at as usize..at as usize + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
