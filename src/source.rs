use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::spatial::{IntBox, Position, RegionPos};
use crate::state::VoxelState;

/// The reference structure defining intended voxel states, placed in the world.
pub trait TargetSource {
    fn state_at(&self, pos: Position) -> VoxelState;

    fn is_region_generated(&self, region: RegionPos) -> bool;

    /// Whether the single position can be queried right now.
    fn is_position_loaded(&self, pos: Position) -> bool {
        self.is_region_generated(pos.region())
    }

    /// Every coarse region the placed structure touches.
    fn touched_regions(&self) -> Vec<RegionPos>;

    /// The placement's sub-boxes clipped to `region`.
    fn boxes_within_region(&self, region: RegionPos) -> Vec<IntBox>;
}

/// The observed structure being checked against the target.
pub trait LiveSource {
    /// Resolved state at `pos`; derived/actual state resolution is the source's job.
    fn state_at(&self, pos: Position) -> VoxelState;

    fn is_region_generated(&self, region: RegionPos) -> bool;

    /// Whether every region within `margin` blocks of `pos` is loaded.
    fn is_area_loaded(&self, pos: Position, margin: i32) -> bool;
}

impl<T: TargetSource + ?Sized> TargetSource for RefCell<T> {
    fn state_at(&self, pos: Position) -> VoxelState {
        self.borrow().state_at(pos)
    }

    fn is_region_generated(&self, region: RegionPos) -> bool {
        self.borrow().is_region_generated(region)
    }

    fn is_position_loaded(&self, pos: Position) -> bool {
        self.borrow().is_position_loaded(pos)
    }

    fn touched_regions(&self) -> Vec<RegionPos> {
        self.borrow().touched_regions()
    }

    fn boxes_within_region(&self, region: RegionPos) -> Vec<IntBox> {
        self.borrow().boxes_within_region(region)
    }
}

impl<T: LiveSource + ?Sized> LiveSource for RefCell<T> {
    fn state_at(&self, pos: Position) -> VoxelState {
        self.borrow().state_at(pos)
    }

    fn is_region_generated(&self, region: RegionPos) -> bool {
        self.borrow().is_region_generated(region)
    }

    fn is_area_loaded(&self, pos: Position, margin: i32) -> bool {
        self.borrow().is_area_loaded(pos, margin)
    }
}

/// A named sub-box of a placed structure, in world coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementBox {
    pub name: String,
    pub bounds: IntBox,
}

/// Where a structure sits in the world: one or more named world-space boxes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub boxes: Vec<PlacementBox>,
}

impl Placement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(bounds: IntBox) -> Self {
        Self::new().with_box("main", bounds)
    }

    pub fn with_box(mut self, name: &str, bounds: IntBox) -> Self {
        self.boxes.push(PlacementBox {
            name: name.to_string(),
            bounds,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.boxes.iter().any(|b| b.bounds.contains(pos))
    }

    /// Sorted, de-duplicated regions touched by any box.
    pub fn touched_regions(&self) -> Vec<RegionPos> {
        let mut regions: Vec<_> = self
            .boxes
            .iter()
            .flat_map(|b| b.bounds.touched_regions())
            .collect();
        regions.sort();
        regions.dedup();
        regions
    }

    pub fn boxes_within_region(&self, region: RegionPos) -> Vec<IntBox> {
        self.boxes
            .iter()
            .filter_map(|b| b.bounds.clip_to_region(region))
            .collect()
    }
}
