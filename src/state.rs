use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VerifierError;

/// Interned voxel state: a base block type plus one of its variants.
///
/// Ids are only meaningful relative to the [`StatePalette`] that produced them.
/// Block 0 / variant 0 is reserved for [`VoxelState::EMPTY`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct VoxelState {
    pub block: u16,
    pub variant: u16,
}

impl VoxelState {
    pub const EMPTY: Self = Self {
        block: 0,
        variant: 0,
    };

    pub const fn new(block: u16, variant: u16) -> Self {
        Self { block, variant }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    /// Same base type, variant ignored.
    #[inline]
    pub fn same_block(self, other: Self) -> bool {
        self.block == other.block
    }
}

impl fmt::Display for VoxelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.block, self.variant)
    }
}

/// Read-only lookups the verifier needs about interned states.
pub trait StateCatalog {
    /// Whether the state is a fluid, for the existing-fluid suppression policy.
    fn is_fluid(&self, state: VoxelState) -> bool;

    /// Registry name of the state's base block, `None` if the id is unknown.
    fn block_name(&self, state: VoxelState) -> Option<String>;

    /// Human readable `name[variant]` form, `None` if the id is unknown.
    fn describe(&self, state: VoxelState) -> Option<String> {
        self.block_name(state)
    }
}

#[derive(Clone, Debug)]
struct BlockEntry {
    name: String,
    fluid: bool,
    variants: Vec<String>,
    variant_ids: HashMap<String, u16>,
}

/// Interning palette shared by the target and live sources.
#[derive(Clone, Debug)]
pub struct StatePalette {
    blocks: Vec<BlockEntry>,
    lookup: HashMap<String, u16>,
}

impl Default for StatePalette {
    fn default() -> Self {
        Self::new()
    }
}

impl StatePalette {
    pub const EMPTY_NAME: &'static str = "air";

    pub fn new() -> Self {
        let mut lookup = HashMap::new();
        lookup.insert(Self::EMPTY_NAME.to_string(), 0);
        Self {
            blocks: vec![BlockEntry {
                name: Self::EMPTY_NAME.to_string(),
                fluid: false,
                variants: vec![String::new()],
                variant_ids: HashMap::from([(String::new(), 0)]),
            }],
            lookup,
        }
    }

    /// Register `name` if unknown and return its block id. An existing block keeps its fluid flag.
    pub fn register_block(&mut self, name: &str, fluid: bool) -> Result<u16, VerifierError> {
        if let Some(&id) = self.lookup.get(name) {
            return Ok(id);
        }
        let id = u16::try_from(self.blocks.len()).map_err(|_| VerifierError::PaletteFull {
            name: name.to_string(),
        })?;
        self.blocks.push(BlockEntry {
            name: name.to_string(),
            fluid,
            variants: vec![String::new()],
            variant_ids: HashMap::from([(String::new(), 0)]),
        });
        self.lookup.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn intern(&mut self, name: &str, variant: &str) -> Result<VoxelState, VerifierError> {
        let block = self.register_block(name, false)?;
        self.intern_variant(block, variant)
    }

    pub fn intern_fluid(&mut self, name: &str, variant: &str) -> Result<VoxelState, VerifierError> {
        let block = self.register_block(name, true)?;
        self.intern_variant(block, variant)
    }

    fn intern_variant(&mut self, block: u16, variant: &str) -> Result<VoxelState, VerifierError> {
        let Some(entry) = self.blocks.get_mut(usize::from(block)) else {
            return Err(VerifierError::UnresolvedStateName(VoxelState::new(block, 0)));
        };
        if let Some(&id) = entry.variant_ids.get(variant) {
            return Ok(VoxelState::new(block, id));
        }
        let id = u16::try_from(entry.variants.len()).map_err(|_| VerifierError::PaletteFull {
            name: format!("{}[{}]", entry.name, variant),
        })?;
        entry.variants.push(variant.to_string());
        entry.variant_ids.insert(variant.to_string(), id);
        Ok(VoxelState::new(block, id))
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn entry(&self, state: VoxelState) -> Option<&BlockEntry> {
        self.blocks.get(usize::from(state.block))
    }
}

impl StateCatalog for StatePalette {
    fn is_fluid(&self, state: VoxelState) -> bool {
        self.entry(state).is_some_and(|entry| entry.fluid)
    }

    fn block_name(&self, state: VoxelState) -> Option<String> {
        self.entry(state).map(|entry| entry.name.clone())
    }

    fn describe(&self, state: VoxelState) -> Option<String> {
        let entry = self.entry(state)?;
        let variant = entry.variants.get(usize::from(state.variant))?;
        if variant.is_empty() {
            Some(entry.name.clone())
        } else {
            Some(format!("{}[{}]", entry.name, variant))
        }
    }
}
