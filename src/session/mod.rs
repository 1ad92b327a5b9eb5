//! One verification session: a target/live pair compared over a placement.
//!
//! Phases run `Idle -> Scanning <-> Paused -> Finished`, and any phase goes to
//! `TornDown` on [`VerifierSession::reset`]. While scanning, each
//! [`VerifierSession::step`] scans newly ready regions within the tick budget.
//! Once finished, steps recheck positions reported through
//! [`VerifierSession::notify_changed`].

use std::collections::HashMap;
use std::rc::Rc;

use web_time::Instant;

use crate::config::VerifierConfig;
use crate::diff_index::DiffIndex;
use crate::error::VerifierError;
use crate::mismatch::{CategoryFilter, MismatchCategory, MismatchKind, StatePair};
use crate::reconciler::Reconciler;
use crate::scanner::{IgnoredPairs, RegionScanner, ScanTotals, StateChecker};
use crate::selection::{self, Highlight, Overview, Selection, SortCriteria, SortOrder};
use crate::source::{LiveSource, TargetSource};
use crate::spatial::Position;
use crate::state::{StateCatalog, VoxelState};
use crate::tracker::{region_ready, AvailabilityTracker, Clock, SystemClock, TickBudget};

#[cfg(test)]
mod tests;

const ERRORS_TITLE: &str = "Verifier errors";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Idle,
    Scanning,
    Paused,
    Finished,
    TornDown,
}

/// The data sources a session verifies.
#[derive(Clone)]
pub struct SessionBinding {
    pub target: Rc<dyn TargetSource>,
    pub live: Rc<dyn LiveSource>,
    pub catalog: Rc<dyn StateCatalog>,
}

impl SessionBinding {
    pub fn new(
        target: Rc<dyn TargetSource>,
        live: Rc<dyn LiveSource>,
        catalog: Rc<dyn StateCatalog>,
    ) -> Self {
        Self {
            target,
            live,
            catalog,
        }
    }
}

pub type CompletionCallback = Box<dyn FnOnce()>;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub regions_scanned: usize,
    pub positions_rechecked: usize,
    pub budget_exhausted: bool,
    /// The session reached `Finished` during this step.
    pub finished: bool,
}

pub struct VerifierSession {
    config: VerifierConfig,
    clock: Box<dyn Clock>,
    binding: Option<SessionBinding>,
    phase: SessionPhase,
    tracker: AvailabilityTracker,
    reconciler: Reconciler,
    index: DiffIndex,
    ignored: IgnoredPairs,
    selection: Selection,
    sort_order: SortOrder,
    totals: ScanTotals,
    on_complete: Option<CompletionCallback>,
    highlights: Vec<Highlight>,
    highlight_origin: Option<Position>,
    info_lines: Vec<String>,
    show_info_hud: bool,
}

impl VerifierSession {
    pub fn new(config: VerifierConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    pub fn with_clock(config: VerifierConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            binding: None,
            phase: SessionPhase::Idle,
            tracker: AvailabilityTracker::new(),
            reconciler: Reconciler::new(),
            index: DiffIndex::new(),
            ignored: IgnoredPairs::default(),
            selection: Selection::new(),
            sort_order: SortOrder::default(),
            totals: ScanTotals::default(),
            on_complete: None,
            highlights: Vec::new(),
            highlight_origin: None,
            info_lines: Vec::new(),
            show_info_hud: true,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Replace the configuration. Only positions classified afterwards see the new policy.
    pub fn set_config(&mut self, config: VerifierConfig) {
        self.config = config;
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Scanning
    }

    pub fn is_paused(&self) -> bool {
        self.phase == SessionPhase::Paused
    }

    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }

    /// Begin verifying `binding`. Any previous results are discarded; ignored kinds are kept.
    pub fn start(
        &mut self,
        binding: SessionBinding,
        on_complete: Option<CompletionCallback>,
    ) -> Result<(), VerifierError> {
        let regions = binding.target.touched_regions();
        if regions.is_empty() {
            return Err(VerifierError::NothingSelected);
        }

        self.clear_data();
        self.tracker.reset(regions);
        self.binding = Some(binding);
        self.on_complete = on_complete;
        self.phase = SessionPhase::Scanning;
        log::info!(
            "verifier started: {} regions to scan",
            self.tracker.total_count()
        );
        self.update_pending_lines();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), VerifierError> {
        if self.phase != SessionPhase::Scanning {
            return Err(self.invalid("pause"));
        }
        self.phase = SessionPhase::Paused;
        log::info!(
            "verifier paused with {} regions pending",
            self.tracker.pending_count()
        );
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), VerifierError> {
        if self.phase != SessionPhase::Paused {
            return Err(self.invalid("resume"));
        }
        self.phase = SessionPhase::Scanning;
        log::info!("verifier resumed");
        self.update_pending_lines();
        Ok(())
    }

    /// Discard all results and detach from the sources.
    pub fn reset(&mut self) {
        self.clear_data();
        self.binding = None;
        self.phase = SessionPhase::TornDown;
        log::debug!("verifier session torn down");
    }

    fn clear_data(&mut self) {
        self.tracker.clear();
        self.reconciler.clear();
        self.index.clear_all();
        self.selection.clear();
        self.totals = ScanTotals::default();
        self.on_complete = None;
        self.highlights.clear();
        self.highlight_origin = None;
        self.info_lines.clear();
    }

    fn invalid(&self, operation: &'static str) -> VerifierError {
        VerifierError::InvalidState {
            operation,
            phase: self.phase,
        }
    }

    /// Advance by one tick that started at `tick_start`.
    pub fn step(&mut self, tick_start: Instant) -> StepReport {
        match self.phase {
            SessionPhase::Scanning => self.scan_step(tick_start),
            SessionPhase::Finished => self.reconcile_step(),
            SessionPhase::Idle | SessionPhase::Paused | SessionPhase::TornDown => {
                StepReport::default()
            }
        }
    }

    fn scan_step(&mut self, tick_start: Instant) -> StepReport {
        let mut report = StepReport::default();
        {
            let Some(binding) = self.binding.as_ref() else {
                return report;
            };
            let target = binding.target.as_ref();
            let live = binding.live.as_ref();
            let budget = TickBudget::new(tick_start, self.config.tick_budget(), self.clock.as_ref());
            let scanner = RegionScanner::new(target, live, self.config.layer_range);
            let mut checker = StateChecker {
                index: &mut self.index,
                ignored: &self.ignored,
                policy: self.config.classify_policy(),
                catalog: binding.catalog.as_ref(),
            };
            let totals = &mut self.totals;

            let step = self.tracker.step(
                &budget,
                |region| region_ready(region, target, live),
                |region| {
                    let visited = scanner.scan_region(region, &mut checker, totals);
                    log::debug!("verified region {region:?}: {visited} positions");
                },
            );
            report.regions_scanned = step.scanned;
            report.budget_exhausted = step.exhausted;
        }

        if report.budget_exhausted {
            log::debug!(
                "verifier tick budget spent, {} regions still pending",
                self.tracker.pending_count()
            );
        }
        if report.regions_scanned > 0 {
            self.update_pending_lines();
        }
        if self.tracker.is_done() {
            self.finish();
            report.finished = true;
        }
        report
    }

    fn finish(&mut self) {
        self.phase = SessionPhase::Finished;
        log::info!(
            "verification finished: {} mismatches, {} correct, {} target / {} live voxels",
            self.index.total_mismatches(),
            self.index.correct_count(),
            self.totals.target_voxels,
            self.totals.live_voxels
        );
        self.info_lines.clear();
        self.refresh_current_highlights();
        if let Some(on_complete) = self.on_complete.take() {
            on_complete();
        }
    }

    fn reconcile_step(&mut self) -> StepReport {
        if self.reconciler.is_empty() {
            return StepReport::default();
        }
        let rechecked = {
            let Some(binding) = self.binding.as_ref() else {
                return StepReport::default();
            };
            let target = binding.target.as_ref();
            let live = binding.live.as_ref();
            let margin = self.config.recheck_margin;
            let mut checker = StateChecker {
                index: &mut self.index,
                ignored: &self.ignored,
                policy: self.config.classify_policy(),
                catalog: binding.catalog.as_ref(),
            };
            let totals = &mut self.totals;

            self.reconciler.drain(
                |pos| target.is_position_loaded(pos) && live.is_area_loaded(pos, margin),
                |pos| recheck_position(pos, target, live, &mut checker, totals),
            )
        };

        if rechecked > 0 {
            log::debug!(
                "rechecked {rechecked} changed positions, {} still waiting",
                self.reconciler.pending_count()
            );
            if self.reconciler.is_empty() {
                self.refresh_current_highlights();
            }
        }
        StepReport {
            positions_rechecked: rechecked,
            ..StepReport::default()
        }
    }

    /// Report a live change at `pos`. Only finished sessions track changes, and
    /// only for positions holding a recorded result. Returns whether it was queued.
    pub fn notify_changed(&mut self, pos: Position) -> bool {
        self.phase == SessionPhase::Finished
            && self.index.is_recorded(pos)
            && self.reconciler.enqueue(pos)
    }

    /// Ignore `kind` from now on and purge everything already recorded under it.
    pub fn ignore_kind(&mut self, kind: MismatchKind) {
        self.ignore_kind_quiet(kind);
        self.refresh_current_highlights();
    }

    pub fn ignore_kinds<I: IntoIterator<Item = MismatchKind>>(&mut self, kinds: I) {
        for kind in kinds {
            self.ignore_kind_quiet(kind);
        }
        self.refresh_current_highlights();
    }

    fn ignore_kind_quiet(&mut self, kind: MismatchKind) {
        if self.ignored.insert(kind.pair()) {
            let purged = self.index.purge_kind(kind);
            log::debug!("ignoring {kind:?}, purged {purged} positions");
        }
        self.selection.forget_kind(kind);
    }

    /// Forget all ignored kinds. Positions purged earlier come back only when rescanned.
    pub fn clear_ignored(&mut self) {
        self.ignored.clear();
    }

    pub fn is_ignored(&self, expected: VoxelState, found: VoxelState) -> bool {
        self.ignored.contains((expected, found))
    }

    /// Ignored pairs sorted by expected then found name.
    pub fn ignored_pairs(&self) -> (Vec<StatePair>, Vec<VerifierError>) {
        match self.binding.as_ref() {
            Some(binding) => selection::sort_pairs_by_name(self.ignored.iter(), binding.catalog.as_ref()),
            None => {
                let mut pairs: Vec<_> = self.ignored.iter().collect();
                pairs.sort();
                (pairs, Vec::new())
            }
        }
    }

    pub fn toggle_category(&mut self, category: MismatchCategory) -> bool {
        let selected = self.selection.toggle_category(category);
        self.refresh_current_highlights();
        selected
    }

    pub fn toggle_kind(&mut self, kind: MismatchKind) -> bool {
        let selected = self.selection.toggle_kind(kind);
        self.refresh_current_highlights();
        selected
    }

    pub fn is_category_selected(&self, category: MismatchCategory) -> bool {
        self.selection.is_category_selected(category)
    }

    pub fn is_kind_selected(&self, kind: MismatchKind) -> bool {
        self.selection.is_kind_selected(kind)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_sort_criteria(&mut self, criteria: SortCriteria) {
        self.sort_order.toggle(criteria);
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Kind counts for a browsing UI, in the current sort order.
    pub fn overview(&self, filter: CategoryFilter) -> Overview {
        match self.binding.as_ref() {
            Some(binding) => {
                selection::overview(&self.index, filter, self.sort_order, binding.catalog.as_ref())
            }
            None => Overview::default(),
        }
    }

    /// Recompute the highlighted positions nearest to `origin`.
    pub fn refresh_highlights(&mut self, origin: Position) -> &[Highlight] {
        self.highlight_origin = Some(origin);
        self.refresh_current_highlights();
        &self.highlights
    }

    fn refresh_current_highlights(&mut self) {
        let Some(origin) = self.highlight_origin else {
            return;
        };
        self.highlights =
            self.selection
                .project(&self.index, origin, self.config.max_highlighted_positions);
        if self.phase == SessionPhase::Finished {
            self.update_mismatch_lines();
        }
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    pub fn highlight_color(&self, category: MismatchCategory) -> [f32; 4] {
        self.config.colors.for_category(category)
    }

    /// Tint for positions that already match the target.
    pub fn correct_color(&self) -> [f32; 4] {
        self.config.colors.correct
    }

    pub fn info_lines(&self) -> &[String] {
        &self.info_lines
    }

    pub fn should_render_info_hud(&self) -> bool {
        self.show_info_hud && !self.info_lines.is_empty()
    }

    pub fn toggle_info_hud(&mut self) -> bool {
        self.show_info_hud = !self.show_info_hud;
        self.show_info_hud
    }

    fn update_pending_lines(&mut self) {
        let mut lines = Vec::new();
        if !self.tracker.is_done() {
            lines.push(format!(
                "Pending regions: {} / {}",
                self.tracker.pending_count(),
                self.tracker.total_count()
            ));
            lines.extend(
                self.tracker
                    .pending_regions()
                    .take(self.config.max_hud_lines)
                    .map(|region| format!("  region [{}, {}]", region.x, region.z)),
            );
        }
        self.info_lines = lines;
    }

    fn update_mismatch_lines(&mut self) {
        let mut lines = Vec::new();
        if !self.highlights.is_empty() {
            let title = self
                .selection
                .single_category()
                .map_or(ERRORS_TITLE, MismatchCategory::title);
            lines.push(title.to_string());
            lines.extend(
                self.highlights
                    .iter()
                    .take(self.config.max_hud_lines)
                    .map(|h| format!("{}: {}, {}, {}", h.category.label(), h.pos.x, h.pos.y, h.pos.z)),
            );
        }
        self.info_lines = lines;
    }

    pub fn mismatch_at(&self, pos: Position) -> Option<MismatchKind> {
        self.index.mismatch_at(pos)
    }

    pub fn index(&self) -> &DiffIndex {
        &self.index
    }

    pub fn target_voxel_count(&self) -> u64 {
        self.totals.target_voxels
    }

    pub fn live_voxel_count(&self) -> u64 {
        self.totals.live_voxels
    }

    pub fn empty_match_count(&self) -> u64 {
        self.totals.empty_matches
    }

    pub fn correct_count(&self) -> usize {
        self.index.correct_count()
    }

    pub fn correct_state_counts(&self) -> &HashMap<VoxelState, u32> {
        self.index.correct_state_counts()
    }

    pub fn mismatch_count(&self, category: MismatchCategory) -> usize {
        self.index.count(category)
    }

    pub fn missing_count(&self) -> usize {
        self.index.count(MismatchCategory::Missing)
    }

    pub fn extra_count(&self) -> usize {
        self.index.count(MismatchCategory::Extra)
    }

    pub fn wrong_type_count(&self) -> usize {
        self.index.count(MismatchCategory::WrongType)
    }

    pub fn wrong_variant_count(&self) -> usize {
        self.index.count(MismatchCategory::WrongVariant)
    }

    pub fn total_mismatches(&self) -> usize {
        self.index.total_mismatches()
    }

    pub fn pending_region_count(&self) -> usize {
        self.tracker.pending_count()
    }

    pub fn total_region_count(&self) -> usize {
        self.tracker.total_count()
    }

    pub fn pending_recheck_count(&self) -> usize {
        self.reconciler.pending_count()
    }
}

/// Re-classify one changed position with fresh states from both sources.
fn recheck_position(
    pos: Position,
    target: &dyn TargetSource,
    live: &dyn LiveSource,
    checker: &mut StateChecker<'_>,
    totals: &mut ScanTotals,
) {
    let expected = target.state_at(pos);
    let found = live.state_at(pos);

    if let Some(prior) = checker.index.clear(pos) {
        let before = prior.found();
        if before.is_empty() && !found.is_empty() {
            totals.live_voxels += 1;
        } else if !before.is_empty() && found.is_empty() {
            totals.live_voxels = totals.live_voxels.saturating_sub(1);
        }
    }
    checker.check(pos, expected, found, totals);
}
