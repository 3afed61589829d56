#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plants the groves and shows the panda.
//!
//! The groves live on a dedicated simulation thread running a single-threaded
//! tokio runtime, while macroquad owns the main thread. Both sides share the
//! scene graph; the window announces every presented frame so animations only
//! start once their first values are on screen.

mod settings;

use std::{
    path::PathBuf,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use pet_panda_rendering::{
    Color, FrameClock, FrameControl, FrameSignal, Presentation, RenderingBackend, SceneGraph,
    SceneStage, SharedGraph,
};
use pet_panda_rendering_macroquad::MacroquadBackend;
use pet_panda_world::{Grove, RandomSource};
use tokio::{
    sync::{oneshot, watch},
    task::{self, JoinSet, LocalSet},
    time,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use self::settings::{Overrides, Settings};

const WINDOW_TITLE: &str = "Pet Panda";
const BACKGROUND: Color = Color::from_rgb_u8(236, 242, 226);

/// A pet panda wandering between bamboo shoots.
#[derive(Parser, Debug)]
#[command(name = "pet-panda", version, about)]
struct Args {
    /// TOML settings file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// number of bamboo shoots per world
    #[arg(long)]
    shoots: Option<u32>,

    /// number of independent worlds
    #[arg(long)]
    worlds: Option<u32>,

    /// size multiplier for shoots and pandas
    #[arg(long)]
    scale: Option<f32>,

    /// seed for a reproducible grove
    #[arg(long)]
    seed: Option<u64>,

    /// log activity and vitals on every tick
    #[arg(long)]
    debug: bool,

    /// run without a window
    #[arg(long)]
    headless: bool,

    /// stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,

    /// render as fast as possible instead of following the display
    #[arg(long)]
    no_vsync: bool,

    /// log frame timings once per second
    #[arg(long)]
    show_fps: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            shoots: self.shoots,
            worlds: self.worlds,
            scale: self.scale,
            seed: self.seed,
            debug: self.debug,
            no_vsync: self.no_vsync,
            show_fps: self.show_fps,
        }
    }

    fn duration(&self) -> Result<Option<Duration>> {
        self.duration
            .map(|seconds| {
                Duration::try_from_secs_f64(seconds)
                    .with_context(|| format!("invalid duration {seconds}"))
            })
            .transpose()
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply(args.overrides());
    settings.validate()?;
    let duration = args.duration()?;

    init_tracing(settings.debug_messages)?;
    info!(version = env!("CARGO_PKG_VERSION"), "pet panda starting");

    if args.headless {
        run_headless(&settings, duration)
    } else {
        run_windowed(settings, duration)
    }
}

fn init_tracing(debug_messages: bool) -> Result<()> {
    let level = if debug_messages { "debug" } else { "info" };
    let filter =
        EnvFilter::from_default_env().add_directive(format!("pet_panda={level}").parse()?);

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .context("failed to install the log subscriber")
}

fn run_headless(settings: &Settings, duration: Option<Duration>) -> Result<()> {
    let graph = SceneGraph::shared(settings.layout()?);
    let signal = FrameSignal::new();
    let stage = SceneStage::new(Arc::clone(&graph), signal.subscribe());
    let groves = plant(settings, Rc::new(stage))?;

    let runtime = runtime()?;
    let local = LocalSet::new();
    local.block_on(&runtime, async move {
        let clock = FrameClock::new(signal, FrameClock::DEFAULT_PERIOD);
        let _clock = task::spawn_local(clock.run());
        match duration {
            Some(limit) => time::timeout(limit, tend(groves))
                .await
                .unwrap_or(Ok(())),
            None => tend(groves).await,
        }
    })?;

    info!(elements = graph.lock().len(), "pet panda stopped");
    Ok(())
}

fn run_windowed(settings: Settings, duration: Option<Duration>) -> Result<()> {
    let graph = SceneGraph::shared(settings.layout()?);
    let signal = FrameSignal::new();
    let frames = signal.subscribe();
    let (stop, stopped) = oneshot::channel::<()>();
    let (planted, planted_rx) = mpsc::channel::<()>();
    let finished = Arc::new(AtomicBool::new(false));

    let simulation = {
        let graph = Arc::clone(&graph);
        let finished = Arc::clone(&finished);
        let settings = settings.clone();
        thread::Builder::new()
            .name("pet-panda-simulation".into())
            .spawn(move || {
                let outcome = simulate(&settings, graph, frames, planted, stopped);
                finished.store(true, Ordering::Release);
                outcome
            })
            .context("failed to start the simulation thread")?
    };

    // the window is sized from the first scene; a closed channel means planting failed
    if planted_rx.recv().is_err() {
        return simulation
            .join()
            .map_err(|_| anyhow!("simulation thread panicked"))?;
    }

    let scene = graph.lock().scene(time::Instant::now().into_std());
    let presentation = Presentation::new(WINDOW_TITLE, BACKGROUND, scene);
    let backend = MacroquadBackend::new()
        .with_vsync(settings.window.vsync)
        .with_show_fps(settings.window.show_fps);

    let started = Instant::now();
    let window_finished = Arc::clone(&finished);
    backend.run(presentation, move |_dt, scene| {
        let _frame = signal.present();
        *scene = graph.lock().scene(time::Instant::now().into_std());

        let expired = duration.is_some_and(|limit| started.elapsed() >= limit);
        if expired || window_finished.load(Ordering::Acquire) {
            FrameControl::Exit
        } else {
            FrameControl::Continue
        }
    })?;

    if stop.send(()).is_err() {
        warn!("simulation had already stopped");
    }
    simulation
        .join()
        .map_err(|_| anyhow!("simulation thread panicked"))?
}

fn simulate(
    settings: &Settings,
    graph: SharedGraph,
    frames: watch::Receiver<u64>,
    planted: mpsc::Sender<()>,
    stopped: oneshot::Receiver<()>,
) -> Result<()> {
    let stage = Rc::new(SceneStage::new(graph, frames));
    let groves = plant(settings, stage)?;
    if planted.send(()).is_err() {
        return Ok(());
    }

    let runtime = runtime()?;
    let local = LocalSet::new();
    local.block_on(&runtime, async move {
        tokio::select! {
            outcome = tend(groves) => outcome,
            _ = stopped => {
                info!("window closed");
                Ok(())
            }
        }
    })
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to start the async runtime")
}

/// Mounts one grove per configured world.
fn plant(settings: &Settings, stage: Rc<SceneStage>) -> Result<Vec<Grove<SceneStage>>> {
    (0..settings.worlds)
        .map(|index| {
            let rng = match settings.seed {
                Some(seed) => RandomSource::seeded(seed.wrapping_add(u64::from(index))),
                None => RandomSource::from_entropy(),
            };
            Grove::new(Rc::clone(&stage), settings.grove, rng)
                .with_context(|| format!("failed to plant world {index}"))
        })
        .collect()
}

/// Runs every grove until one of them fails.
async fn tend(groves: Vec<Grove<SceneStage>>) -> Result<()> {
    let mut running = JoinSet::new();
    for (index, mut grove) in groves.into_iter().enumerate() {
        let _handle = running.spawn_local(async move {
            grove
                .run()
                .await
                .with_context(|| format!("world {index} stopped"))
        });
    }

    while let Some(joined) = running.join_next().await {
        joined.context("grove task was cancelled")??;
    }
    Ok(())
}
