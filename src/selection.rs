use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::diff_index::{DiffIndex, KindCount};
use crate::error::VerifierError;
use crate::mismatch::{CategoryFilter, MismatchCategory, MismatchKind, StatePair};
use crate::spatial::Position;
use crate::state::{StateCatalog, VoxelState};

/// What the user has chosen to highlight.
///
/// A kind is never both covered by a selected category and individually
/// selected: selecting a category drops its individual kinds, and selecting a
/// kind deselects its whole category.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    categories: BTreeSet<MismatchCategory>,
    kinds: BTreeSet<MismatchKind>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the category is selected afterwards.
    pub fn toggle_category(&mut self, category: MismatchCategory) -> bool {
        if self.categories.remove(&category) {
            return false;
        }
        self.categories.insert(category);
        self.kinds.retain(|kind| kind.category != category);
        true
    }

    /// Returns whether the kind is selected afterwards.
    pub fn toggle_kind(&mut self, kind: MismatchKind) -> bool {
        if self.kinds.remove(&kind) {
            return false;
        }
        self.categories.remove(&kind.category);
        self.kinds.insert(kind);
        true
    }

    pub fn is_category_selected(&self, category: MismatchCategory) -> bool {
        self.categories.contains(&category)
    }

    pub fn is_kind_selected(&self, kind: MismatchKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Drop an individually selected kind, e.g. once it has been ignored.
    pub fn forget_kind(&mut self, kind: MismatchKind) {
        self.kinds.remove(&kind);
    }

    pub fn clear(&mut self) {
        self.categories.clear();
        self.kinds.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.kinds.is_empty()
    }

    /// The category, when exactly one whole category and nothing else is selected.
    pub fn single_category(&self) -> Option<MismatchCategory> {
        if self.categories.len() == 1 && self.kinds.is_empty() {
            self.categories.iter().next().copied()
        } else {
            None
        }
    }

    /// Closest selected positions to `origin`, at most `max_results`.
    ///
    /// Equal distances keep category order, then position order within a kind.
    pub fn project(&self, index: &DiffIndex, origin: Position, max_results: usize) -> Vec<Highlight> {
        let mut candidates = Vec::new();
        for category in MismatchCategory::PROJECTION_ORDER {
            if self.categories.contains(&category) {
                candidates.extend(
                    index
                        .positions_in(category)
                        .map(|pos| Highlight { category, pos }),
                );
                continue;
            }
            for kind in self.kinds.iter().filter(|kind| kind.category == category) {
                candidates.extend(
                    index
                        .positions_of_kind(*kind)
                        .map(|pos| Highlight { category, pos }),
                );
            }
        }

        candidates.sort_by_key(|highlight| highlight.pos.distance_sq(origin));
        candidates.truncate(max_results);
        candidates
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Highlight {
    pub category: MismatchCategory,
    pub pos: Position,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SortCriteria {
    ExpectedName,
    FoundName,
    Count,
}

/// Ordering for overview listings. Count sorts descending, names ascending; `reverse` flips either.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SortOrder {
    pub criteria: SortCriteria,
    pub reverse: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            criteria: SortCriteria::Count,
            reverse: false,
        }
    }
}

impl SortOrder {
    /// Picking the active criteria again flips direction; a new criteria starts unreversed.
    pub fn toggle(&mut self, criteria: SortCriteria) {
        if self.criteria == criteria {
            self.reverse = !self.reverse;
        } else {
            self.criteria = criteria;
            self.reverse = false;
        }
    }
}

/// A sorted overview plus any non-fatal problems met while sorting it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overview {
    pub entries: Vec<KindCount>,
    pub diagnostics: Vec<VerifierError>,
}

/// Resolves display names once per state and remembers which ones failed.
struct NameCache<'a> {
    catalog: &'a dyn StateCatalog,
    failed: Vec<VoxelState>,
}

impl<'a> NameCache<'a> {
    fn new(catalog: &'a dyn StateCatalog) -> Self {
        Self {
            catalog,
            failed: Vec::new(),
        }
    }

    fn key(&mut self, state: VoxelState) -> NameKey {
        let name = self.catalog.describe(state);
        if name.is_none() && !self.failed.contains(&state) {
            self.failed.push(state);
        }
        NameKey { name, state }
    }

    fn into_diagnostics(self) -> Vec<VerifierError> {
        let diagnostics: Vec<_> = self
            .failed
            .into_iter()
            .map(VerifierError::UnresolvedStateName)
            .collect();
        for diagnostic in &diagnostics {
            log::warn!("{diagnostic}");
        }
        diagnostics
    }
}

/// Resolved names sort first, alphabetically; unresolved ones follow in id order.
#[derive(Clone, Debug, PartialEq, Eq)]
struct NameKey {
    name: Option<String>,
    state: VoxelState,
}

impl Ord for NameKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.name, &other.name) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| self.state.cmp(&other.state))
    }
}

impl PartialOrd for NameKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Kind counts for `filter`, sorted by `order`.
pub fn overview(
    index: &DiffIndex,
    filter: CategoryFilter,
    order: SortOrder,
    catalog: &dyn StateCatalog,
) -> Overview {
    let mut entries = index.summary(filter);
    let mut diagnostics = Vec::new();

    match order.criteria {
        SortCriteria::Count => {}
        SortCriteria::ExpectedName | SortCriteria::FoundName => {
            let mut names = NameCache::new(catalog);
            let mut keyed: Vec<_> = entries
                .into_iter()
                .map(|entry| {
                    let expected = names.key(entry.kind.expected);
                    let found = names.key(entry.kind.found);
                    let key = if order.criteria == SortCriteria::ExpectedName {
                        (expected, found)
                    } else {
                        (found, expected)
                    };
                    (key, entry)
                })
                .collect();
            keyed.sort_by(|(a, ea), (b, eb)| a.cmp(b).then_with(|| ea.kind.cmp(&eb.kind)));
            entries = keyed.into_iter().map(|(_, entry)| entry).collect();
            diagnostics = names.into_diagnostics();
        }
    }

    if order.reverse {
        entries.reverse();
    }
    Overview {
        entries,
        diagnostics,
    }
}

/// Sort expected/found pairs by expected name, then found name.
pub fn sort_pairs_by_name(
    pairs: impl IntoIterator<Item = StatePair>,
    catalog: &dyn StateCatalog,
) -> (Vec<StatePair>, Vec<VerifierError>) {
    let mut names = NameCache::new(catalog);
    let mut keyed: Vec<_> = pairs
        .into_iter()
        .map(|pair| ((names.key(pair.0), names.key(pair.1)), pair))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
    let sorted = keyed.into_iter().map(|(_, pair)| pair).collect();
    (sorted, names.into_diagnostics())
}
