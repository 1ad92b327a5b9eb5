use serde::{Deserialize, Serialize};

use crate::state::{StateCatalog, VoxelState};

/// The four real mismatch categories. `CORRECT` is not a variant here: it is
/// only ever counted, never stored or selected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MismatchCategory {
    Missing,
    Extra,
    WrongType,
    WrongVariant,
}

impl MismatchCategory {
    pub const ALL: [Self; 4] = [Self::Missing, Self::Extra, Self::WrongType, Self::WrongVariant];

    /// Order used when merging categories for the highlight list.
    pub const PROJECTION_ORDER: [Self; 4] =
        [Self::WrongType, Self::WrongVariant, Self::Extra, Self::Missing];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::Missing => 0,
            Self::Extra => 1,
            Self::WrongType => 2,
            Self::WrongVariant => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Missing => "Missing",
            Self::Extra => "Extra",
            Self::WrongType => "Wrong block",
            Self::WrongVariant => "Wrong state",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Missing => "Missing blocks",
            Self::Extra => "Extra blocks",
            Self::WrongType => "Wrong blocks",
            Self::WrongVariant => "Wrong states",
        }
    }
}

/// Category filter for summaries: one category or all four combined.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CategoryFilter {
    All,
    Only(MismatchCategory),
}

impl CategoryFilter {
    pub fn includes(self, category: MismatchCategory) -> bool {
        match self {
            Self::All => true,
            Self::Only(only) => only == category,
        }
    }
}

impl From<MismatchCategory> for CategoryFilter {
    fn from(category: MismatchCategory) -> Self {
        Self::Only(category)
    }
}

/// Expected/found pair as stored in the per-category maps and the ignore set.
pub type StatePair = (VoxelState, VoxelState);

/// The unit a user selects or ignores: many positions can share one kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MismatchKind {
    pub category: MismatchCategory,
    pub expected: VoxelState,
    pub found: VoxelState,
}

impl MismatchKind {
    pub fn new(category: MismatchCategory, expected: VoxelState, found: VoxelState) -> Self {
        Self {
            category,
            expected,
            found,
        }
    }

    pub fn pair(&self) -> StatePair {
        (self.expected, self.found)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassifyPolicy {
    /// Do not report live fluids where the target is empty.
    pub ignore_existing_fluids: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Correct,
    Mismatch(MismatchKind),
    /// Extra fluid under the suppression policy: nothing is recorded.
    Suppressed,
}

/// Classify one position from its expected and found states.
pub fn classify(
    expected: VoxelState,
    found: VoxelState,
    policy: ClassifyPolicy,
    catalog: &dyn StateCatalog,
) -> Classification {
    if expected == found {
        return Classification::Correct;
    }

    let category = if !expected.is_empty() {
        if found.is_empty() {
            MismatchCategory::Missing
        } else if !expected.same_block(found) {
            MismatchCategory::WrongType
        } else {
            MismatchCategory::WrongVariant
        }
    } else if policy.ignore_existing_fluids && catalog.is_fluid(found) {
        return Classification::Suppressed;
    } else {
        MismatchCategory::Extra
    };

    Classification::Mismatch(MismatchKind::new(category, expected, found))
}
