//! In-memory chunked voxel storage implementing both source contracts.
//!
//! Hosts that keep their worlds elsewhere implement [`TargetSource`] and
//! [`LiveSource`] directly; this store backs the demo binary and the tests.

use std::collections::{HashMap, HashSet};

use crate::source::{LiveSource, Placement, TargetSource};
use crate::spatial::{IntBox, Position, RegionPos, REGION_SIZE};
use crate::state::VoxelState;

pub const SECTION_SIZE: usize = REGION_SIZE as usize;
pub const SECTION_VOLUME: usize = SECTION_SIZE * SECTION_SIZE * SECTION_SIZE;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SectionPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Convert world coords to (section_pos, local_index).
pub fn world_to_section(pos: Position) -> (SectionPos, usize) {
    let cs = SECTION_SIZE as i32;
    let section = SectionPos {
        x: pos.x.div_euclid(cs),
        y: pos.y.div_euclid(cs),
        z: pos.z.div_euclid(cs),
    };
    let lx = pos.x.rem_euclid(cs) as usize;
    let ly = pos.y.rem_euclid(cs) as usize;
    let lz = pos.z.rem_euclid(cs) as usize;
    (section, ly * SECTION_SIZE * SECTION_SIZE + lz * SECTION_SIZE + lx)
}

#[derive(Clone, Debug)]
struct Section {
    voxels: Box<[VoxelState; SECTION_VOLUME]>,
    solid_count: u32,
}

impl Section {
    fn new() -> Self {
        Self {
            voxels: Box::new([VoxelState::EMPTY; SECTION_VOLUME]),
            solid_count: 0,
        }
    }

    fn set(&mut self, idx: usize, v: VoxelState) -> bool {
        let old = self.voxels[idx];
        if old == v {
            return false;
        }
        if !old.is_empty() && v.is_empty() {
            self.solid_count -= 1;
        } else if old.is_empty() && !v.is_empty() {
            self.solid_count += 1;
        }
        self.voxels[idx] = v;
        true
    }

    fn is_empty(&self) -> bool {
        self.solid_count == 0
    }
}

#[derive(Debug, Default)]
pub struct MemoryWorld {
    sections: HashMap<SectionPos, Section>,
    generated: HashSet<RegionPos>,
    pending_changes: Vec<Position>,
    pending_change_set: HashSet<Position>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_generated(&mut self, region: RegionPos) {
        self.generated.insert(region);
    }

    /// Mark every region touched by `bounds`, grown by `margin` regions, as generated.
    pub fn mark_box_generated(&mut self, bounds: IntBox, margin: i32) {
        for region in bounds.touched_regions() {
            for dx in -margin..=margin {
                for dz in -margin..=margin {
                    self.generated.insert(RegionPos::new(region.x + dx, region.z + dz));
                }
            }
        }
    }

    pub fn unload_region(&mut self, region: RegionPos) {
        self.generated.remove(&region);
    }

    pub fn get_voxel(&self, pos: Position) -> VoxelState {
        let (sp, idx) = world_to_section(pos);
        self.sections
            .get(&sp)
            .map(|section| section.voxels[idx])
            .unwrap_or(VoxelState::EMPTY)
    }

    /// Write one voxel. Actual changes are queued for [`Self::drain_changed_positions`].
    pub fn set_voxel(&mut self, pos: Position, v: VoxelState) {
        let (sp, idx) = world_to_section(pos);
        let changed = match self.sections.get_mut(&sp) {
            Some(section) => {
                let changed = section.set(idx, v);
                if section.is_empty() {
                    self.sections.remove(&sp);
                }
                changed
            }
            None if v.is_empty() => false,
            None => {
                let mut section = Section::new();
                section.set(idx, v);
                self.sections.insert(sp, section);
                true
            }
        };

        if changed && self.pending_change_set.insert(pos) {
            self.pending_changes.push(pos);
        }
    }

    pub fn fill_box(&mut self, bounds: IntBox, v: VoxelState) {
        for pos in bounds.positions() {
            self.set_voxel(pos, v);
        }
    }

    pub fn non_empty_section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn drain_changed_positions(&mut self) -> Vec<Position> {
        self.pending_change_set.clear();
        std::mem::take(&mut self.pending_changes)
    }
}

impl LiveSource for MemoryWorld {
    fn state_at(&self, pos: Position) -> VoxelState {
        self.get_voxel(pos)
    }

    fn is_region_generated(&self, region: RegionPos) -> bool {
        self.generated.contains(&region)
    }

    fn is_area_loaded(&self, pos: Position, margin: i32) -> bool {
        let area = IntBox::new(pos.offset(-margin, 0, -margin), pos.offset(margin, 0, margin));
        area.touched_regions()
            .into_iter()
            .all(|region| self.generated.contains(&region))
    }
}

/// A structure stored in a [`MemoryWorld`] together with where it is placed.
///
/// Positions outside the placement read as empty.
#[derive(Debug, Default)]
pub struct PlacedStructure {
    pub world: MemoryWorld,
    pub placement: Placement,
}

impl PlacedStructure {
    pub fn new(placement: Placement) -> Self {
        Self {
            world: MemoryWorld::new(),
            placement,
        }
    }
}

impl TargetSource for PlacedStructure {
    fn state_at(&self, pos: Position) -> VoxelState {
        if self.placement.contains(pos) {
            self.world.get_voxel(pos)
        } else {
            VoxelState::EMPTY
        }
    }

    fn is_region_generated(&self, region: RegionPos) -> bool {
        self.world.is_region_generated(region)
    }

    fn touched_regions(&self) -> Vec<RegionPos> {
        self.placement.touched_regions()
    }

    fn boxes_within_region(&self, region: RegionPos) -> Vec<IntBox> {
        self.placement.boxes_within_region(region)
    }
}

/// Seeded splitmix64 stream used to build reproducible demo worlds.
#[derive(Clone, Debug)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// True with probability `numerator / denominator`; never for a zero denominator.
    pub fn chance(&mut self, numerator: u64, denominator: u64) -> bool {
        denominator != 0 && self.next() % denominator < numerator
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        let len = u64::try_from(items.len()).ok().filter(|len| *len > 0)?;
        let index = usize::try_from(self.next() % len).ok()?;
        items.get(index)
    }
}
