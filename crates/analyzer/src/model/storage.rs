//! Storage layout
//!
//! Assigns `(slot, offset)` positions to state variables following the
//! EVM's packing rules: consecutive value-typed variables share a 32-byte
//! slot when they fit; mappings, dynamic arrays, strings, bytes and structs
//! always start a fresh slot and consume whole slots; constants and
//! immutables occupy no storage. Variables are walked in
//! inheritance-then-declaration order. Downstream tools read on-chain
//! storage through these positions, so any deviation here is a correctness
//! bug, not a cosmetic one.

use crate::error::{AnalyzerError, Result};
use crate::model::declarations::Type;
use crate::model::{CompilationModel, Contract};

const SLOT_BYTES: u64 = 32;

/// How a type occupies storage.
struct StorageWidth {
    /// Total bytes consumed (a multiple of 32 for slot-aligned types).
    bytes: u64,
    /// Whether the type must start at a fresh slot and own whole slots.
    slot_aligned: bool,
}

pub(crate) fn storage_layout_of(
    model: &CompilationModel,
    contract: &Contract,
    variable: &str,
) -> Result<(u64, usize)> {
    let mut slot: u64 = 0;
    let mut offset: u64 = 0;

    for state_variable in model.state_variables_of(contract) {
        if !state_variable.occupies_storage() {
            continue;
        }
        let width = width_of(model, contract, &state_variable.ty);

        let position = if width.slot_aligned {
            if offset > 0 {
                slot += 1;
                offset = 0;
            }
            let position = (slot, 0usize);
            slot += width.bytes.div_ceil(SLOT_BYTES);
            position
        } else {
            if offset + width.bytes > SLOT_BYTES {
                slot += 1;
                offset = 0;
            }
            let position = (slot, offset as usize);
            offset += width.bytes;
            if offset == SLOT_BYTES {
                slot += 1;
                offset = 0;
            }
            position
        };

        if state_variable.name == variable {
            return Ok(position);
        }
    }

    Err(AnalyzerError::Parsing(format!(
        "'{variable}' is not a storage variable of contract '{}'",
        contract.name
    )))
}

fn width_of(model: &CompilationModel, contract: &Contract, ty: &Type) -> StorageWidth {
    match ty {
        Type::Elementary(name) => match elementary_bytes(name) {
            Some(bytes) => StorageWidth {
                bytes,
                slot_aligned: false,
            },
            // string / bytes: one slot header, data lives elsewhere.
            None => StorageWidth {
                bytes: SLOT_BYTES,
                slot_aligned: true,
            },
        },
        Type::Mapping { .. } => StorageWidth {
            bytes: SLOT_BYTES,
            slot_aligned: true,
        },
        Type::Array { base, length } => match length {
            None => StorageWidth {
                bytes: SLOT_BYTES,
                slot_aligned: true,
            },
            Some(length) => {
                let element = width_of(model, contract, base);
                let bytes = if element.slot_aligned {
                    element.bytes * length
                } else {
                    let per_slot = SLOT_BYTES / element.bytes.max(1);
                    length.div_ceil(per_slot.max(1)) * SLOT_BYTES
                };
                StorageWidth {
                    bytes,
                    slot_aligned: true,
                }
            }
        },
        Type::UserDefined(name) => {
            if model.enumeration(name).is_some() {
                return StorageWidth {
                    bytes: 1,
                    slot_aligned: false,
                };
            }
            if let Some(structure) = model.structure(contract, name) {
                return StorageWidth {
                    bytes: struct_bytes(model, contract, structure),
                    slot_aligned: true,
                };
            }
            if model.contract(name).is_some() {
                // Contract references are address-sized.
                return StorageWidth {
                    bytes: 20,
                    slot_aligned: false,
                };
            }
            StorageWidth {
                bytes: SLOT_BYTES,
                slot_aligned: true,
            }
        }
        Type::Function(_) | Type::Unknown(_) => StorageWidth {
            bytes: SLOT_BYTES,
            slot_aligned: true,
        },
    }
}

/// Struct members pack internally but the struct starts and ends on slot
/// boundaries.
fn struct_bytes(
    model: &CompilationModel,
    contract: &Contract,
    structure: &crate::model::declarations::Structure,
) -> u64 {
    let mut slots: u64 = 0;
    let mut offset: u64 = 0;
    for (_, member_type) in &structure.members {
        let width = width_of(model, contract, member_type);
        if width.slot_aligned {
            if offset > 0 {
                slots += 1;
                offset = 0;
            }
            slots += width.bytes.div_ceil(SLOT_BYTES);
        } else {
            if offset + width.bytes > SLOT_BYTES {
                slots += 1;
                offset = 0;
            }
            offset += width.bytes;
        }
    }
    if offset > 0 {
        slots += 1;
    }
    slots.max(1) * SLOT_BYTES
}

fn elementary_bytes(name: &str) -> Option<u64> {
    match name {
        "bool" => Some(1),
        "address" | "address payable" => Some(20),
        "uint" | "int" => Some(32),
        "string" | "bytes" => None,
        _ => {
            if let Some(bits) = name.strip_prefix("uint").or_else(|| name.strip_prefix("int")) {
                return bits.parse::<u64>().ok().map(|b| b / 8);
            }
            if let Some(width) = name.strip_prefix("bytes") {
                return width.parse::<u64>().ok();
            }
            Some(32)
        }
    }
}
