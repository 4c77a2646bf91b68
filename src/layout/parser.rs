//! Raw layout decoding.
//!
//! Translates the JSON emitted by `forge inspect <contract> storage-layout`
//! (solc's `storageLayout` output) into the typed [`StorageLayout`] model.
//! Pure format translation; the alignment logic never sees the wire schema.

use super::{StorageLayout, StorageVariable, WORD_SIZE};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// Raw layout input violates the structural contract. Fatal: unparseable
/// data cannot be safely diffed.
#[derive(Debug, Error)]
pub enum MalformedLayoutError {
    /// Input is not JSON, or does not match the expected schema
    /// (covers missing required fields).
    #[error("storage layout does not match the expected schema: {0}")]
    Decode(#[from] serde_json::Error),

    /// Slot field is present but not a non-negative integer.
    #[error("variable `{name}`: slot `{value}` is not a valid slot index")]
    InvalidSlot {
        /// Affected variable
        name: String,
        /// Raw field value
        value: String,
    },

    /// Offset field is present but not a non-negative integer.
    #[error("variable `{name}`: offset `{value}` is not a valid byte offset")]
    InvalidOffset {
        /// Affected variable
        name: String,
        /// Raw field value
        value: String,
    },

    /// Size field of the referenced type is not a non-negative integer.
    #[error("variable `{name}`: type size `{value}` is not a valid byte count")]
    InvalidSize {
        /// Affected variable
        name: String,
        /// Raw field value
        value: String,
    },

    /// Storage entry references a type identifier missing from the types table.
    #[error("variable `{name}` references unknown type `{type_id}`")]
    UnknownType {
        /// Affected variable
        name: String,
        /// Unresolved type identifier
        type_id: String,
    },

    /// Offset is outside the 32-byte word.
    #[error("variable `{name}`: offset {offset} is outside the storage word")]
    OffsetOutOfRange {
        /// Affected variable
        name: String,
        /// Out-of-range offset
        offset: u64,
    },

    /// Single-slot type crosses the word boundary.
    #[error("variable `{name}`: {byte_size} bytes at offset {offset} exceed the storage word")]
    RangeExceedsWord {
        /// Affected variable
        name: String,
        /// Intra-slot offset
        offset: u8,
        /// Declared byte size
        byte_size: u64,
    },

    /// Multi-slot type declared at a non-zero offset.
    #[error("variable `{name}`: multi-slot type must start at offset 0, found {offset}")]
    MisalignedMultiSlot {
        /// Affected variable
        name: String,
        /// Offending offset
        offset: u8,
    },

    /// Two variables occupy overlapping `(slot, offset..offset+size)` ranges.
    #[error("variables `{first}` and `{second}` occupy overlapping storage ranges")]
    OverlappingRanges {
        /// Earlier variable (by storage position)
        first: String,
        /// Later, overlapping variable
        second: String,
    },
}

// ── Wire schema ────────────────────────────────────────────────────

/// solc emits layout numerics inconsistently (strings in current output,
/// plain numbers from older toolchains); accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse().ok(),
        }
    }

    fn raw(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::String(s) => s.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLayout {
    #[serde(default)]
    storage: Vec<RawEntry>,
    #[serde(default)]
    types: Option<HashMap<String, RawType>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    label: String,
    #[serde(rename = "type")]
    type_id: String,
    slot: NumberOrString,
    offset: NumberOrString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawType {
    number_of_bytes: NumberOrString,
}

// ── Entry point ────────────────────────────────────────────────────

/// Decode raw build-tool output into a [`StorageLayout`].
///
/// An empty `storage` array is a valid empty layout, not an error.
pub fn parse_layout(raw: &str) -> Result<StorageLayout, MalformedLayoutError> {
    let decoded: RawLayout = serde_json::from_str(raw)?;
    let types = decoded.types.unwrap_or_default();

    let mut variables = Vec::with_capacity(decoded.storage.len());
    for entry in decoded.storage {
        let slot = entry
            .slot
            .as_u64()
            .ok_or_else(|| MalformedLayoutError::InvalidSlot {
                name: entry.label.clone(),
                value: entry.slot.raw(),
            })?;
        let offset = entry
            .offset
            .as_u64()
            .ok_or_else(|| MalformedLayoutError::InvalidOffset {
                name: entry.label.clone(),
                value: entry.offset.raw(),
            })?;
        if offset >= WORD_SIZE {
            return Err(MalformedLayoutError::OffsetOutOfRange {
                name: entry.label,
                offset,
            });
        }
        let ty = types
            .get(&entry.type_id)
            .ok_or_else(|| MalformedLayoutError::UnknownType {
                name: entry.label.clone(),
                type_id: entry.type_id.clone(),
            })?;
        let byte_size = ty
            .number_of_bytes
            .as_u64()
            .ok_or_else(|| MalformedLayoutError::InvalidSize {
                name: entry.label.clone(),
                value: ty.number_of_bytes.raw(),
            })?;

        variables.push(StorageVariable {
            name: entry.label,
            type_signature: entry.type_id,
            byte_size,
            slot,
            offset: offset as u8,
        });
    }

    StorageLayout::new(variables)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORGE_OUTPUT: &str = r#"{
        "storage": [
            {
                "astId": 3,
                "contract": "src/Vault.sol:Vault",
                "label": "owner",
                "offset": 0,
                "slot": "0",
                "type": "t_address"
            },
            {
                "astId": 5,
                "contract": "src/Vault.sol:Vault",
                "label": "paused",
                "offset": 20,
                "slot": "0",
                "type": "t_bool"
            },
            {
                "astId": 8,
                "contract": "src/Vault.sol:Vault",
                "label": "balances",
                "offset": 0,
                "slot": "1",
                "type": "t_mapping(t_address,t_uint256)"
            }
        ],
        "types": {
            "t_address": { "encoding": "inplace", "label": "address", "numberOfBytes": "20" },
            "t_bool": { "encoding": "inplace", "label": "bool", "numberOfBytes": "1" },
            "t_mapping(t_address,t_uint256)": {
                "encoding": "mapping",
                "label": "mapping(address => uint256)",
                "numberOfBytes": "32",
                "key": "t_address",
                "value": "t_uint256"
            },
            "t_uint256": { "encoding": "inplace", "label": "uint256", "numberOfBytes": "32" }
        }
    }"#;

    #[test]
    fn test_parses_forge_output() {
        let layout = parse_layout(FORGE_OUTPUT).unwrap();
        assert_eq!(layout.len(), 3);

        let owner = &layout.variables()[0];
        assert_eq!(owner.name, "owner");
        assert_eq!(owner.type_signature, "t_address");
        assert_eq!(owner.byte_size, 20);
        assert_eq!(owner.location(), (0, 0));

        let paused = &layout.variables()[1];
        assert_eq!(paused.location(), (0, 20));

        let balances = &layout.variables()[2];
        assert_eq!(balances.type_signature, "t_mapping(t_address,t_uint256)");
        assert_eq!(balances.location(), (1, 0));
    }

    #[test]
    fn test_empty_storage_is_valid() {
        let layout = parse_layout(r#"{ "storage": [], "types": {} }"#).unwrap();
        assert!(layout.is_empty());
    }

    #[test]
    fn test_null_types_table_with_empty_storage() {
        // solc emits `"types": null` for contracts with no storage.
        let layout = parse_layout(r#"{ "storage": [], "types": null }"#).unwrap();
        assert!(layout.is_empty());
    }

    #[test]
    fn test_accepts_numeric_slot_and_size() {
        let raw = r#"{
            "storage": [
                { "label": "count", "offset": 0, "slot": 2, "type": "t_uint256" }
            ],
            "types": { "t_uint256": { "label": "uint256", "numberOfBytes": 32 } }
        }"#;
        let layout = parse_layout(raw).unwrap();
        assert_eq!(layout.variables()[0].slot, 2);
        assert_eq!(layout.variables()[0].byte_size, 32);
    }

    #[test]
    fn test_rejects_non_json_input() {
        let err = parse_layout("not json at all").unwrap_err();
        assert!(matches!(err, MalformedLayoutError::Decode(_)));
    }

    #[test]
    fn test_rejects_missing_required_field() {
        // `slot` missing entirely
        let raw = r#"{
            "storage": [ { "label": "x", "offset": 0, "type": "t_uint256" } ],
            "types": { "t_uint256": { "numberOfBytes": "32" } }
        }"#;
        let err = parse_layout(raw).unwrap_err();
        assert!(matches!(err, MalformedLayoutError::Decode(_)));
    }

    #[test]
    fn test_rejects_non_numeric_slot() {
        let raw = r#"{
            "storage": [ { "label": "x", "offset": 0, "slot": "zero", "type": "t_uint256" } ],
            "types": { "t_uint256": { "numberOfBytes": "32" } }
        }"#;
        let err = parse_layout(raw).unwrap_err();
        match err {
            MalformedLayoutError::InvalidSlot { name, value } => {
                assert_eq!(name, "x");
                assert_eq!(value, "zero");
            }
            other => panic!("expected InvalidSlot, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_type_reference() {
        let raw = r#"{
            "storage": [ { "label": "x", "offset": 0, "slot": "0", "type": "t_ghost" } ],
            "types": {}
        }"#;
        let err = parse_layout(raw).unwrap_err();
        assert!(matches!(err, MalformedLayoutError::UnknownType { .. }));
    }

    #[test]
    fn test_rejects_out_of_range_offset() {
        let raw = r#"{
            "storage": [ { "label": "x", "offset": 40, "slot": "0", "type": "t_uint8" } ],
            "types": { "t_uint8": { "numberOfBytes": "1" } }
        }"#;
        let err = parse_layout(raw).unwrap_err();
        assert!(matches!(err, MalformedLayoutError::OffsetOutOfRange { .. }));
    }
}
