use serde::{Deserialize, Serialize};

/// Edge length of a coarse availability region, in blocks.
pub const REGION_SIZE: i32 = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn region(self) -> RegionPos {
        RegionPos::containing(self)
    }

    /// Squared euclidean distance. Exact for any pair of positions, including
    /// opposite corners of the `i32` range.
    pub fn distance_sq(self, other: Position) -> u128 {
        let axis = |a: i32, b: i32| {
            let d = u128::from((i64::from(a) - i64::from(b)).unsigned_abs());
            d * d
        };
        axis(self.x, other.x) + axis(self.y, other.y) + axis(self.z, other.z)
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// Coarse column region used for readiness tracking. Unbounded along Y.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Floor division keeps negative coordinates in the correct region.
    pub fn containing(pos: Position) -> Self {
        Self::new(pos.x.div_euclid(REGION_SIZE), pos.z.div_euclid(REGION_SIZE))
    }

    pub fn min_block_x(self) -> i32 {
        self.x * REGION_SIZE
    }

    pub fn min_block_z(self) -> i32 {
        self.z * REGION_SIZE
    }

    /// The region itself plus its eight horizontal neighbours.
    pub fn neighborhood(self) -> impl Iterator<Item = RegionPos> {
        (-1..=1).flat_map(move |dx| (-1..=1).map(move |dz| RegionPos::new(self.x + dx, self.z + dz)))
    }

    /// Block-space box covering this region between `min_y` and `max_y` inclusive.
    pub fn block_bounds(self, min_y: i32, max_y: i32) -> IntBox {
        IntBox::new(
            Position::new(self.min_block_x(), min_y, self.min_block_z()),
            Position::new(
                self.min_block_x() + REGION_SIZE - 1,
                max_y,
                self.min_block_z() + REGION_SIZE - 1,
            ),
        )
    }
}

/// Inclusive integer box: both `min` and `max` are part of the volume.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntBox {
    pub min: Position,
    pub max: Position,
}

impl IntBox {
    /// Build a box from two arbitrary corners.
    pub fn new(a: Position, b: Position) -> Self {
        Self {
            min: Position::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Position::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn single(pos: Position) -> Self {
        Self { min: pos, max: pos }
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    pub fn intersect(&self, other: &IntBox) -> Option<IntBox> {
        let min = Position::new(
            self.min.x.max(other.min.x),
            self.min.y.max(other.min.y),
            self.min.z.max(other.min.z),
        );
        let max = Position::new(
            self.max.x.min(other.max.x),
            self.max.y.min(other.max.y),
            self.max.z.min(other.max.z),
        );
        (min.x <= max.x && min.y <= max.y && min.z <= max.z).then_some(IntBox { min, max })
    }

    pub fn volume(&self) -> u64 {
        let span = |lo: i32, hi: i32| (i64::from(hi) - i64::from(lo) + 1) as u64;
        span(self.min.x, self.max.x) * span(self.min.y, self.max.y) * span(self.min.z, self.max.z)
    }

    /// Every position in the box, Y outermost then Z then X.
    pub fn positions(&self) -> impl Iterator<Item = Position> {
        let IntBox { min, max } = *self;
        (min.y..=max.y).flat_map(move |y| {
            (min.z..=max.z).flat_map(move |z| (min.x..=max.x).map(move |x| Position::new(x, y, z)))
        })
    }

    pub fn touched_regions(&self) -> Vec<RegionPos> {
        let lo = RegionPos::containing(self.min);
        let hi = RegionPos::containing(self.max);
        let mut out = Vec::new();
        for x in lo.x..=hi.x {
            for z in lo.z..=hi.z {
                out.push(RegionPos::new(x, z));
            }
        }
        out
    }

    /// The part of this box that lies inside `region`'s column.
    pub fn clip_to_region(&self, region: RegionPos) -> Option<IntBox> {
        self.intersect(&region.block_bounds(self.min.y, self.max.y))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Slab filter: only positions whose `axis` coordinate lies in `[min, max]` are visited.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRange {
    pub axis: Axis,
    pub min: i32,
    pub max: i32,
}

impl LayerRange {
    pub fn new(axis: Axis, a: i32, b: i32) -> Self {
        Self {
            axis,
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Narrow `bounds` to its overlap with the slab.
    pub fn clip(&self, bounds: &IntBox) -> Option<IntBox> {
        let mut clipped = *bounds;
        let (lo, hi) = match self.axis {
            Axis::X => (&mut clipped.min.x, &mut clipped.max.x),
            Axis::Y => (&mut clipped.min.y, &mut clipped.max.y),
            Axis::Z => (&mut clipped.min.z, &mut clipped.max.z),
        };
        *lo = (*lo).max(self.min);
        *hi = (*hi).min(self.max);
        (*lo <= *hi).then_some(clipped)
    }
}
