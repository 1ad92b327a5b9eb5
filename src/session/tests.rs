use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use super::*;
use crate::config::CategoryColors;
use crate::memory_world::{MemoryWorld, PlacedStructure};
use crate::source::Placement;
use crate::spatial::{IntBox, RegionPos};
use crate::state::StatePalette;
use crate::tracker::SteppingClock;

struct SharedClock(Rc<SteppingClock>);

impl Clock for SharedClock {
    fn now(&self) -> Instant {
        self.0.now()
    }
}

struct Harness {
    palette: Rc<StatePalette>,
    target: Rc<RefCell<PlacedStructure>>,
    live: Rc<RefCell<MemoryWorld>>,
    stone: VoxelState,
    dirt: VoxelState,
    glass: VoxelState,
    water: VoxelState,
}

impl Harness {
    fn new(bounds: IntBox) -> Self {
        let mut palette = StatePalette::new();
        let stone = palette.intern("stone", "").unwrap();
        let dirt = palette.intern("dirt", "").unwrap();
        let glass = palette.intern("glass", "").unwrap();
        let water = palette.intern_fluid("water", "level=0").unwrap();

        let mut target = PlacedStructure::new(Placement::single(bounds));
        target.world.mark_box_generated(bounds, 0);
        let mut live = MemoryWorld::new();
        live.mark_box_generated(bounds, 1);

        Self {
            palette: Rc::new(palette),
            target: Rc::new(RefCell::new(target)),
            live: Rc::new(RefCell::new(live)),
            stone,
            dirt,
            glass,
            water,
        }
    }

    fn binding(&self) -> SessionBinding {
        SessionBinding::new(self.target.clone(), self.live.clone(), self.palette.clone())
    }

    fn expect(&self, pos: Position, state: VoxelState) {
        self.target.borrow_mut().world.set_voxel(pos, state);
    }

    fn place(&self, pos: Position, state: VoxelState) {
        self.live.borrow_mut().set_voxel(pos, state);
    }
}

fn row(len: i32) -> IntBox {
    IntBox::new(Position::new(0, 0, 0), Position::new(len - 1, 0, 0))
}

fn unbounded_session(config: VerifierConfig) -> VerifierSession {
    VerifierSession::with_clock(config, Box::new(SteppingClock::new(Duration::ZERO)))
}

fn run_to_finish(session: &mut VerifierSession) {
    for _ in 0..100 {
        if session.step(Instant::now()).finished {
            return;
        }
    }
    panic!("session never finished, phase {:?}", session.phase());
}

fn counting_callback() -> (Rc<Cell<u32>>, CompletionCallback) {
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    (calls, Box::new(move || seen.set(seen.get() + 1)))
}

/// Target stone at (0,0,0) and (2,0,0); live water at (1,0,0) and stone at (2,0,0).
fn basic_scene() -> Harness {
    let h = Harness::new(row(4));
    h.expect(Position::new(0, 0, 0), h.stone);
    h.place(Position::new(1, 0, 0), h.water);
    h.expect(Position::new(2, 0, 0), h.stone);
    h.place(Position::new(2, 0, 0), h.stone);
    h
}

fn fluid_tolerant_config() -> VerifierConfig {
    VerifierConfig {
        ignore_existing_fluids: true,
        ..VerifierConfig::with_defaults()
    }
}

#[test]
fn first_scan_classifies_missing_extra_and_correct() {
    let h = basic_scene();
    let mut session = unbounded_session(fluid_tolerant_config());
    let (calls, on_complete) = counting_callback();
    session.start(h.binding(), Some(on_complete)).unwrap();
    assert!(session.is_active());

    run_to_finish(&mut session);

    assert!(session.is_finished());
    assert_eq!(calls.get(), 1);
    assert_eq!(session.missing_count(), 1);
    assert_eq!(
        session.mismatch_at(Position::new(0, 0, 0)),
        Some(MismatchKind::new(MismatchCategory::Missing, h.stone, VoxelState::EMPTY))
    );
    assert_eq!(session.extra_count(), 0);
    assert_eq!(session.mismatch_at(Position::new(1, 0, 0)), None);
    assert_eq!(session.correct_count(), 1);
    assert_eq!(session.mismatch_at(Position::new(2, 0, 0)), None);
    assert_eq!(session.correct_state_counts().get(&h.stone), Some(&1));
    assert_eq!(session.total_mismatches(), 1);
    assert_eq!(session.target_voxel_count(), 2);
    assert_eq!(session.live_voxel_count(), 2);
    assert_eq!(session.empty_match_count(), 1);

    // Further steps neither re-run the callback nor change anything.
    session.step(Instant::now());
    assert_eq!(calls.get(), 1);
    assert_eq!(session.total_mismatches(), 1);
    session.index().assert_consistent();
}

#[test]
fn extra_fluid_is_reported_when_not_tolerated() {
    let h = basic_scene();
    let mut session = unbounded_session(VerifierConfig::with_defaults());
    session.start(h.binding(), None).unwrap();
    run_to_finish(&mut session);

    assert_eq!(session.extra_count(), 1);
    assert_eq!(
        session.mismatch_at(Position::new(1, 0, 0)),
        Some(MismatchKind::new(MismatchCategory::Extra, VoxelState::EMPTY, h.water))
    );
}

#[test]
fn live_change_after_finish_is_reconciled() {
    let h = basic_scene();
    let mut session = unbounded_session(fluid_tolerant_config());
    session.start(h.binding(), None).unwrap();
    run_to_finish(&mut session);
    assert_eq!(session.correct_count(), 1);

    let changed = Position::new(2, 0, 0);
    h.place(changed, h.dirt);
    assert!(session.notify_changed(changed));
    assert!(!session.notify_changed(changed));
    assert_eq!(session.pending_recheck_count(), 1);

    let report = session.step(Instant::now());
    assert_eq!(report.positions_rechecked, 1);
    assert_eq!(session.pending_recheck_count(), 0);
    assert_eq!(session.wrong_type_count(), 1);
    assert_eq!(
        session.mismatch_at(changed),
        Some(MismatchKind::new(MismatchCategory::WrongType, h.stone, h.dirt))
    );
    assert_eq!(session.correct_count(), 0);
    assert_eq!(session.correct_state_counts().get(&h.stone), None);
    assert_eq!(session.live_voxel_count(), 2);
    session.index().assert_consistent();
}

#[test]
fn recheck_waits_until_the_area_is_loaded() {
    let h = basic_scene();
    let mut session = unbounded_session(fluid_tolerant_config());
    session.start(h.binding(), None).unwrap();
    run_to_finish(&mut session);

    let missing = Position::new(0, 0, 0);
    h.place(missing, h.stone);
    assert!(session.notify_changed(missing));
    h.live.borrow_mut().unload_region(RegionPos::new(0, 0));

    assert_eq!(session.step(Instant::now()).positions_rechecked, 0);
    assert_eq!(session.pending_recheck_count(), 1);
    assert_eq!(session.missing_count(), 1);

    h.live.borrow_mut().mark_generated(RegionPos::new(0, 0));
    assert_eq!(session.step(Instant::now()).positions_rechecked, 1);
    assert_eq!(session.missing_count(), 0);
    assert_eq!(session.correct_count(), 2);
    assert_eq!(session.live_voxel_count(), 3);

    // And back again.
    h.place(missing, VoxelState::EMPTY);
    assert!(session.notify_changed(missing));
    session.step(Instant::now());
    assert_eq!(session.missing_count(), 1);
    assert_eq!(session.correct_count(), 1);
    assert_eq!(session.live_voxel_count(), 2);
    session.index().assert_consistent();
}

#[test]
fn changes_are_only_tracked_for_recorded_positions_of_finished_sessions() {
    let h = basic_scene();
    let mut session = unbounded_session(fluid_tolerant_config());
    assert!(!session.notify_changed(Position::new(0, 0, 0)));

    session.start(h.binding(), None).unwrap();
    assert!(!session.notify_changed(Position::new(0, 0, 0)));

    run_to_finish(&mut session);
    // Empty on both sides, suppressed fluid, and outside the placement.
    assert!(!session.notify_changed(Position::new(3, 0, 0)));
    assert!(!session.notify_changed(Position::new(1, 0, 0)));
    assert!(!session.notify_changed(Position::new(50, 0, 0)));
    assert!(session.notify_changed(Position::new(0, 0, 0)));
}

fn selection_scene() -> (Harness, MismatchKind, MismatchKind) {
    let h = Harness::new(row(8));
    for x in 0..=3 {
        h.expect(Position::new(x, 0, 0), h.stone);
    }
    for x in 4..=5 {
        h.expect(Position::new(x, 0, 0), h.stone);
        h.place(Position::new(x, 0, 0), h.dirt);
    }
    h.expect(Position::new(6, 0, 0), h.stone);
    h.place(Position::new(6, 0, 0), h.glass);
    let stone_dirt = MismatchKind::new(MismatchCategory::WrongType, h.stone, h.dirt);
    let stone_glass = MismatchKind::new(MismatchCategory::WrongType, h.stone, h.glass);
    (h, stone_dirt, stone_glass)
}

#[test]
fn highlights_combine_categories_and_single_kinds() {
    let (h, stone_dirt, stone_glass) = selection_scene();
    let config = VerifierConfig {
        max_highlighted_positions: 3,
        ..VerifierConfig::with_defaults()
    };
    let mut session = unbounded_session(config);
    session.start(h.binding(), None).unwrap();
    run_to_finish(&mut session);

    assert!(session.toggle_category(MismatchCategory::Missing));
    assert!(session.toggle_kind(stone_dirt));
    assert!(!session.is_kind_selected(stone_glass));

    let highlights = session.refresh_highlights(Position::new(5, 0, 0)).to_vec();
    let xs: Vec<i32> = highlights.iter().map(|h| h.pos.x).collect();
    assert_eq!(xs, vec![5, 4, 3]);
    assert_eq!(highlights[0].category, MismatchCategory::WrongType);
    assert_eq!(highlights[2].category, MismatchCategory::Missing);

    assert_eq!(session.info_lines()[0], ERRORS_TITLE);
    assert_eq!(session.info_lines()[1], "Wrong block: 5, 0, 0");
    assert_eq!(session.info_lines().len(), 4);

    // Deselecting the kind leaves only the category, which names the title.
    assert!(!session.toggle_kind(stone_dirt));
    assert_eq!(
        session.highlights().iter().map(|h| h.pos.x).collect::<Vec<_>>(),
        vec![3, 2, 1]
    );
    assert_eq!(session.info_lines()[0], MismatchCategory::Missing.title());
}

#[test]
fn highlight_colors_come_from_the_config() {
    let mut config = VerifierConfig::with_defaults();
    config.colors.wrong_type = [0.5, 0.5, 0.5, 1.0];
    config.colors.correct = [0.0, 0.0, 1.0, 0.5];
    let mut session = unbounded_session(config);
    assert_eq!(session.highlight_color(MismatchCategory::WrongType), [0.5, 0.5, 0.5, 1.0]);
    assert_eq!(
        session.highlight_color(MismatchCategory::Missing),
        CategoryColors::default().missing
    );
    assert_eq!(session.correct_color(), [0.0, 0.0, 1.0, 0.5]);

    session.set_config(VerifierConfig::with_defaults());
    assert_eq!(session.correct_color(), CategoryColors::default().correct);
}

#[test]
fn ignoring_a_kind_purges_it_for_good() {
    let (h, stone_dirt, stone_glass) = selection_scene();
    let mut session = unbounded_session(VerifierConfig::with_defaults());
    session.start(h.binding(), None).unwrap();
    run_to_finish(&mut session);
    session.toggle_kind(stone_dirt);
    session.refresh_highlights(Position::ORIGIN);
    assert_eq!(session.highlights().len(), 2);

    session.ignore_kind(stone_dirt);
    assert!(session.is_ignored(h.stone, h.dirt));
    assert_eq!(session.wrong_type_count(), 1);
    assert_eq!(session.index().kind_count(stone_dirt), 0);
    assert!(!session.is_kind_selected(stone_dirt));
    assert!(session.highlights().is_empty());
    assert!(!session.notify_changed(Position::new(4, 0, 0)));

    // Restarting keeps the ignore list.
    session.start(h.binding(), None).unwrap();
    run_to_finish(&mut session);
    assert_eq!(session.index().kind_count(stone_dirt), 0);
    assert_eq!(session.index().kind_count(stone_glass), 1);

    session.ignore_kinds([stone_glass]);
    let (pairs, diagnostics) = session.ignored_pairs();
    // "stone" -> "dirt" sorts before "stone" -> "glass".
    assert_eq!(pairs, vec![stone_dirt.pair(), stone_glass.pair()]);
    assert!(diagnostics.is_empty());
    assert_eq!(session.wrong_type_count(), 0);

    session.clear_ignored();
    assert!(!session.is_ignored(h.stone, h.dirt));
    session.start(h.binding(), None).unwrap();
    run_to_finish(&mut session);
    assert_eq!(session.wrong_type_count(), 3);
    session.index().assert_consistent();
}

#[test]
fn overview_follows_the_sort_order() {
    let (h, stone_dirt, stone_glass) = selection_scene();
    let mut session = unbounded_session(VerifierConfig::with_defaults());
    session.start(h.binding(), None).unwrap();
    run_to_finish(&mut session);

    let kinds = |session: &VerifierSession| -> Vec<MismatchKind> {
        session
            .overview(MismatchCategory::WrongType.into())
            .entries
            .iter()
            .map(|entry| entry.kind)
            .collect()
    };
    assert_eq!(kinds(&session), vec![stone_dirt, stone_glass]);

    session.set_sort_criteria(SortCriteria::Count);
    assert!(session.sort_order().reverse);
    assert_eq!(kinds(&session), vec![stone_glass, stone_dirt]);

    session.set_sort_criteria(SortCriteria::FoundName);
    assert_eq!(kinds(&session), vec![stone_dirt, stone_glass]);
    assert_eq!(session.overview(CategoryFilter::All).entries.len(), 3);
}

fn wide_scene(regions: i32) -> Harness {
    let bounds = IntBox::new(
        Position::new(0, 0, 0),
        Position::new(regions * crate::spatial::REGION_SIZE - 1, 0, 0),
    );
    let h = Harness::new(bounds);
    h.target.borrow_mut().world.fill_box(bounds, h.stone);
    h
}

#[test]
fn scanning_respects_the_tick_budget() {
    let h = wide_scene(10);
    let clock = Rc::new(SteppingClock::new(Duration::from_millis(10)));
    let mut session =
        VerifierSession::with_clock(VerifierConfig::with_defaults(), Box::new(SharedClock(clock.clone())));
    session.start(h.binding(), None).unwrap();
    assert_eq!(session.total_region_count(), 10);

    let first = session.step(clock.peek());
    assert_eq!(first.regions_scanned, 4);
    assert!(first.budget_exhausted);
    assert_eq!(session.pending_region_count(), 6);
    assert!(session.is_active());
    assert_eq!(session.info_lines()[0], "Pending regions: 6 / 10");

    let second = session.step(clock.peek());
    assert_eq!(second.regions_scanned, 4);

    let third = session.step(clock.peek());
    assert_eq!(third.regions_scanned, 2);
    assert!(third.finished);
    assert!(!third.budget_exhausted);
    assert_eq!(session.missing_count(), 160);
    assert!(session.info_lines().is_empty());
}

#[test]
fn pause_keeps_progress_and_resume_continues() {
    let h = wide_scene(10);
    let clock = Rc::new(SteppingClock::new(Duration::from_millis(10)));
    let mut session =
        VerifierSession::with_clock(VerifierConfig::with_defaults(), Box::new(SharedClock(clock.clone())));
    let (calls, on_complete) = counting_callback();
    session.start(h.binding(), Some(on_complete)).unwrap();
    session.step(clock.peek());
    let missing = session.missing_count();

    session.pause().unwrap();
    assert!(session.is_paused());
    assert_eq!(
        session.pause(),
        Err(VerifierError::InvalidState {
            operation: "pause",
            phase: SessionPhase::Paused,
        })
    );
    assert_eq!(session.step(clock.peek()), StepReport::default());
    assert_eq!(session.pending_region_count(), 6);
    assert_eq!(session.missing_count(), missing);

    session.resume().unwrap();
    assert!(session.resume().is_err());
    while !session.step(clock.peek()).finished {}
    assert_eq!(calls.get(), 1);
    assert_eq!(session.missing_count(), 160);
    assert_eq!(
        session.pause(),
        Err(VerifierError::InvalidState {
            operation: "pause",
            phase: SessionPhase::Finished,
        })
    );
}

#[test]
fn reset_discards_results_and_skips_the_callback() {
    let h = wide_scene(10);
    let clock = Rc::new(SteppingClock::new(Duration::from_millis(10)));
    let mut session =
        VerifierSession::with_clock(VerifierConfig::with_defaults(), Box::new(SharedClock(clock.clone())));
    let (calls, on_complete) = counting_callback();
    session.start(h.binding(), Some(on_complete)).unwrap();
    session.step(clock.peek());
    assert!(session.missing_count() > 0);

    session.reset();
    assert_eq!(session.phase(), SessionPhase::TornDown);
    assert_eq!(session.missing_count(), 0);
    assert_eq!(session.target_voxel_count(), 0);
    assert_eq!(session.pending_region_count(), 0);
    assert_eq!(session.step(clock.peek()), StepReport::default());
    assert!(!session.notify_changed(Position::ORIGIN));
    assert_eq!(session.overview(CategoryFilter::All), Overview::default());
    assert!(matches!(
        session.resume(),
        Err(VerifierError::InvalidState {
            phase: SessionPhase::TornDown,
            ..
        })
    ));
    assert_eq!(calls.get(), 0);
}

#[test]
fn start_needs_a_placement_that_covers_something() {
    let h = Harness::new(row(1));
    h.target.borrow_mut().placement = Placement::new();
    let mut session = unbounded_session(VerifierConfig::with_defaults());
    assert_eq!(session.start(h.binding(), None), Err(VerifierError::NothingSelected));
    assert_eq!(session.phase(), SessionPhase::Idle);
}

#[test]
fn unready_regions_hold_the_session_in_scanning() {
    let h = wide_scene(2);
    h.live.borrow_mut().unload_region(RegionPos::new(2, 0));
    let mut session = unbounded_session(VerifierConfig::with_defaults());
    session.start(h.binding(), None).unwrap();

    for _ in 0..3 {
        session.step(Instant::now());
    }
    // Region 1 needs its neighbour at x = 2.
    assert!(session.is_active());
    assert_eq!(session.pending_region_count(), 1);
    assert_eq!(
        session.info_lines(),
        &["Pending regions: 1 / 2".to_string(), "  region [1, 0]".to_string()]
    );

    h.live.borrow_mut().mark_generated(RegionPos::new(2, 0));
    assert!(session.step(Instant::now()).finished);
}

#[test]
fn info_hud_can_be_hidden() {
    let h = basic_scene();
    let mut session = unbounded_session(VerifierConfig::with_defaults());
    session.start(h.binding(), None).unwrap();
    assert!(session.should_render_info_hud());
    assert!(!session.toggle_info_hud());
    assert!(!session.should_render_info_hud());
    assert!(session.toggle_info_hud());
}
