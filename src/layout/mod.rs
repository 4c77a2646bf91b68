//! Typed storage-layout model.
//!
//! A [`StorageLayout`] is the ordered view of a contract's persistent
//! variables as reported by the build tool: identifier, canonical type
//! signature, byte size, slot index and byte offset within the slot.
//! Layouts are constructed once from parser output ([`parse_layout`]) and
//! are immutable afterwards; the diff engine only ever borrows them.

pub mod parser;

pub use parser::{parse_layout, MalformedLayoutError};

use serde::Serialize;

/// EVM storage word size in bytes.
pub const WORD_SIZE: u64 = 32;

// ── Variable descriptor ────────────────────────────────────────────

/// One declared persistent variable as seen by the layout snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageVariable {
    /// Declared identifier, unique within a single snapshot.
    pub name: String,
    /// Canonical compiler type identifier, e.g. `t_mapping(t_address,t_uint256)`.
    /// Opaque but comparable: two variables have the same type iff the
    /// signatures are equal.
    pub type_signature: String,
    /// Bytes occupied by the type.
    pub byte_size: u64,
    /// Slot index.
    pub slot: u64,
    /// Byte offset within the slot. Always 0 for multi-slot types.
    pub offset: u8,
}

impl StorageVariable {
    /// `(slot, offset)` storage location.
    pub fn location(&self) -> (u64, u8) {
        (self.slot, self.offset)
    }

    /// Whether the type occupies more than one slot.
    pub fn spans_multiple_slots(&self) -> bool {
        self.byte_size > WORD_SIZE
    }

    /// First byte occupied, in a flat `slot * 32 + offset` address space.
    fn start_byte(&self) -> u128 {
        u128::from(self.slot) * u128::from(WORD_SIZE) + u128::from(self.offset)
    }

    /// One past the last byte occupied.
    fn end_byte(&self) -> u128 {
        self.start_byte() + u128::from(self.byte_size)
    }
}

// ── Layout ─────────────────────────────────────────────────────────

/// Ordered sequence of storage variables, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageLayout {
    variables: Vec<StorageVariable>,
}

impl StorageLayout {
    /// Build a layout from variable descriptors, enforcing the slot-range
    /// invariants:
    ///
    /// - `offset < 32`
    /// - `offset + byte_size <= 32` for single-slot types
    /// - `offset == 0` for multi-slot types
    /// - no two variables occupy overlapping byte ranges
    ///
    /// An empty descriptor list is a valid (empty) layout.
    pub fn new(variables: Vec<StorageVariable>) -> Result<Self, MalformedLayoutError> {
        for var in &variables {
            if u64::from(var.offset) >= WORD_SIZE {
                return Err(MalformedLayoutError::OffsetOutOfRange {
                    name: var.name.clone(),
                    offset: u64::from(var.offset),
                });
            }
            if var.spans_multiple_slots() {
                if var.offset != 0 {
                    return Err(MalformedLayoutError::MisalignedMultiSlot {
                        name: var.name.clone(),
                        offset: var.offset,
                    });
                }
            } else if u64::from(var.offset) + var.byte_size > WORD_SIZE {
                return Err(MalformedLayoutError::RangeExceedsWord {
                    name: var.name.clone(),
                    offset: var.offset,
                    byte_size: var.byte_size,
                });
            }
        }

        // Overlap check over the flat byte address space. Zero-sized entries
        // cannot overlap anything.
        let mut ranges: Vec<(u128, u128, &str)> = variables
            .iter()
            .filter(|v| v.byte_size > 0)
            .map(|v| (v.start_byte(), v.end_byte(), v.name.as_str()))
            .collect();
        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            if pair[1].0 < pair[0].1 {
                return Err(MalformedLayoutError::OverlappingRanges {
                    first: pair[0].2.to_string(),
                    second: pair[1].2.to_string(),
                });
            }
        }

        Ok(Self { variables })
    }

    /// Variables in declaration order.
    pub fn variables(&self) -> &[StorageVariable] {
        &self.variables
    }

    /// Number of declared variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether the contract declares no persistent variables.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, ty: &str, size: u64, slot: u64, offset: u8) -> StorageVariable {
        StorageVariable {
            name: name.to_string(),
            type_signature: ty.to_string(),
            byte_size: size,
            slot,
            offset,
        }
    }

    #[test]
    fn test_empty_layout_is_valid() {
        let layout = StorageLayout::new(Vec::new()).unwrap();
        assert!(layout.is_empty());
        assert_eq!(layout.len(), 0);
    }

    #[test]
    fn test_packed_variables_share_a_slot() {
        let layout = StorageLayout::new(vec![
            var("owner", "t_address", 20, 0, 0),
            var("paused", "t_bool", 1, 0, 20),
        ])
        .unwrap();
        assert_eq!(layout.len(), 2);
    }

    #[test]
    fn test_multi_slot_type_at_offset_zero() {
        let layout = StorageLayout::new(vec![
            var("config", "t_struct(Config)storage", 96, 0, 0),
            var("next", "t_uint256", 32, 3, 0),
        ])
        .unwrap();
        assert!(layout.variables()[0].spans_multiple_slots());
    }

    #[test]
    fn test_rejects_offset_past_word() {
        let err = StorageLayout::new(vec![var("x", "t_uint8", 1, 0, 32)]).unwrap_err();
        assert!(matches!(
            err,
            MalformedLayoutError::OffsetOutOfRange { offset: 32, .. }
        ));
    }

    #[test]
    fn test_rejects_single_slot_range_past_word() {
        let err = StorageLayout::new(vec![var("x", "t_uint256", 32, 0, 1)]).unwrap_err();
        assert!(matches!(
            err,
            MalformedLayoutError::RangeExceedsWord { .. }
        ));
    }

    #[test]
    fn test_rejects_misaligned_multi_slot_type() {
        let err = StorageLayout::new(vec![var("arr", "t_array(t_uint256)2", 64, 0, 4)]).unwrap_err();
        assert!(matches!(
            err,
            MalformedLayoutError::MisalignedMultiSlot { offset: 4, .. }
        ));
    }

    #[test]
    fn test_rejects_overlapping_ranges() {
        let err = StorageLayout::new(vec![
            var("a", "t_uint256", 32, 0, 0),
            var("b", "t_address", 20, 0, 16),
        ])
        .unwrap_err();
        match err {
            MalformedLayoutError::OverlappingRanges { first, second } => {
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("expected overlap error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_overlap_across_slot_boundary() {
        // 96-byte struct at slot 0 reaches into slots 1 and 2.
        let err = StorageLayout::new(vec![
            var("big", "t_struct(S)storage", 96, 0, 0),
            var("clash", "t_uint256", 32, 2, 0),
        ])
        .unwrap_err();
        assert!(matches!(err, MalformedLayoutError::OverlappingRanges { .. }));
    }
}
