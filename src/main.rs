use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use web_time::Instant;

use voxel_verifier::memory_world::{MemoryWorld, PlacedStructure, SeededRng};
use voxel_verifier::{
    CategoryFilter, IntBox, MismatchCategory, Placement, Position, SessionBinding,
    SessionRegistry, StateCatalog, StatePalette, TargetSource, VerifierConfig, VerifierError,
    VerifierSession, VoxelState,
};

const REPAIR_COUNT: usize = 8;

#[derive(Parser, Debug)]
#[command(
    name = "verify-demo",
    about = "Verify a randomly damaged copy of a generated structure against its source"
)]
struct Args {
    /// JSON verifier config; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Edge length of the cubic structure
    #[arg(long, default_value_t = 24)]
    size: i32,
    #[arg(long, default_value_t = 1337)]
    seed: u64,
    /// Share of positions altered in the live copy, in percent
    #[arg(long, default_value_t = 3)]
    damage_percent: u64,
    /// Do not report fluids where the structure expects nothing
    #[arg(long, default_value_t = false)]
    ignore_fluids: bool,
    #[arg(long, default_value_t = 1000)]
    max_ticks: u32,
}

struct Demo {
    palette: Rc<StatePalette>,
    target: Rc<RefCell<PlacedStructure>>,
    live: Rc<RefCell<MemoryWorld>>,
}

impl Demo {
    fn binding(&self) -> SessionBinding {
        SessionBinding::new(self.target.clone(), self.live.clone(), self.palette.clone())
    }

    fn name(&self, state: VoxelState) -> String {
        self.palette
            .describe(state)
            .unwrap_or_else(|| state.to_string())
    }
}

fn build_demo(args: &Args) -> Result<Demo, VerifierError> {
    let mut palette = StatePalette::new();
    let solids = [
        palette.intern("stone", "")?,
        palette.intern("dirt", "")?,
        palette.intern("glass", "")?,
        palette.intern("oak_stairs", "facing=north")?,
        palette.intern("oak_stairs", "facing=south")?,
    ];
    let water = palette.intern_fluid("water", "level=0")?;

    let edge = args.size.max(1) - 1;
    let bounds = IntBox::new(Position::ORIGIN, Position::new(edge, edge, edge));
    let mut rng = SeededRng::new(args.seed);

    let mut target = PlacedStructure::new(Placement::new().with_box("main", bounds));
    let mut live = MemoryWorld::new();
    for pos in bounds.positions() {
        if rng.chance(3, 5) {
            if let Some(&state) = rng.pick(&solids) {
                target.world.set_voxel(pos, state);
                live.set_voxel(pos, state);
            }
        }
    }

    let mut damaged = 0;
    for pos in bounds.positions() {
        if !rng.chance(args.damage_percent, 100) {
            continue;
        }
        let current = live.get_voxel(pos);
        let replacement = if rng.chance(1, 3) {
            VoxelState::EMPTY
        } else if current.is_empty() && rng.chance(1, 2) {
            water
        } else {
            rng.pick(&solids).copied().unwrap_or(VoxelState::EMPTY)
        };
        live.set_voxel(pos, replacement);
        damaged += 1;
    }

    target.world.mark_box_generated(bounds, 0);
    live.mark_box_generated(bounds, 1);
    live.drain_changed_positions();
    log::info!(
        "built {}^3 structure with {} damaged positions",
        args.size,
        damaged
    );

    Ok(Demo {
        palette: Rc::new(palette),
        target: Rc::new(RefCell::new(target)),
        live: Rc::new(RefCell::new(live)),
    })
}

/// Put the expected state back at `positions` and report the edits to every session.
fn repair(demo: &Demo, registry: &mut SessionRegistry, positions: &[Position]) {
    {
        let target = demo.target.borrow();
        let mut live = demo.live.borrow_mut();
        for &pos in positions {
            live.set_voxel(pos, target.state_at(pos));
        }
    }
    let changed = demo.live.borrow_mut().drain_changed_positions();
    let queued: usize = changed
        .into_iter()
        .map(|pos| registry.broadcast_changed(pos))
        .sum();
    log::debug!("repaired {} positions, {queued} rechecks queued", positions.len());
}

fn print_report(demo: &Demo, session: &VerifierSession) {
    println!(
        "phase {:?}: {} target voxels, {} live voxels, {} correct",
        session.phase(),
        session.target_voxel_count(),
        session.live_voxel_count(),
        session.correct_count()
    );
    for category in MismatchCategory::ALL {
        println!("  {:<12} {}", category.label(), session.mismatch_count(category));
    }

    let overview = session.overview(CategoryFilter::All);
    for entry in &overview.entries {
        println!(
            "  {:>5}  {:<12} expected {} found {}",
            entry.count,
            entry.kind.category.label(),
            demo.name(entry.kind.expected),
            demo.name(entry.kind.found)
        );
    }
    for diagnostic in &overview.diagnostics {
        println!("  note: {diagnostic}");
    }

    println!("  correct tint {:?}", session.correct_color());
    for highlight in session.highlights().iter().take(REPAIR_COUNT) {
        let pos = highlight.pos;
        println!(
            "  highlight {}, {}, {} {:<12} tint {:?}",
            pos.x,
            pos.y,
            pos.z,
            highlight.category.label(),
            session.highlight_color(highlight.category)
        );
    }

    if session.should_render_info_hud() {
        for line in session.info_lines() {
            println!("| {line}");
        }
    }
}

fn main() -> Result<(), VerifierError> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => VerifierConfig::load(path)?,
        None => VerifierConfig::with_defaults(),
    };
    if args.ignore_fluids {
        config.ignore_existing_fluids = true;
    }

    let demo = build_demo(&args)?;
    let mut registry = SessionRegistry::new();
    let id = registry.start(
        config,
        Some(demo.binding()),
        Some(Box::new(|| log::info!("demo verification complete"))),
    )?;

    let mut ticks = 0;
    while ticks < args.max_ticks && !registry.session(id)?.is_finished() {
        registry.step_all(Instant::now());
        ticks += 1;
    }
    log::info!("scan took {ticks} ticks");

    let (missing_before, to_repair) = {
        let session = registry.session(id)?;
        let to_repair: Vec<Position> = session
            .index()
            .positions_in(MismatchCategory::Missing)
            .take(REPAIR_COUNT)
            .collect();
        (session.missing_count(), to_repair)
    };
    repair(&demo, &mut registry, &to_repair);
    registry.step_all(Instant::now());

    let session = registry.session_mut(id)?;
    log::info!(
        "repairs fixed {} missing positions",
        missing_before.saturating_sub(session.missing_count())
    );
    session.toggle_category(MismatchCategory::WrongType);
    session.toggle_category(MismatchCategory::Missing);
    let center = args.size / 2;
    session.refresh_highlights(Position::new(center, center, center));

    print_report(&demo, session);

    registry.teardown(id)
}
