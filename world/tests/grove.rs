use std::{pin::pin, rc::Rc, time::Duration};

use pet_panda_core::{
    Activity, ConfigError, GroveError, ShootConfig, Stage, StageError, Vitals,
};
use pet_panda_rendering::{FrameClock, FrameSignal, Layout, SceneGraph, SceneStage};
use pet_panda_world::{Grove, GroveConfig, RandomSource};
use tokio::{
    task::{self, LocalSet},
    time,
};

fn framed_stage() -> Rc<SceneStage> {
    let signal = FrameSignal::new();
    let stage = SceneStage::new(SceneGraph::shared(Layout::default()), signal.subscribe());
    let _clock = task::spawn_local(FrameClock::new(signal, FrameClock::DEFAULT_PERIOD).run());
    Rc::new(stage)
}

#[tokio::test(start_paused = true)]
async fn new_grove_mounts_world_shoots_and_panda() {
    LocalSet::new()
        .run_until(async {
            let stage = framed_stage();
            let config = GroveConfig {
                shoot_count: 4,
                shoot: ShootConfig::new(24, 2, 2),
                ..GroveConfig::default()
            };

            let grove = Grove::new(Rc::clone(&stage), config, RandomSource::seeded(1))
                .expect("valid grove");

            assert_eq!(grove.shoots().len(), 4);
            assert_eq!(grove.panda().activity(), Activity::Idle);
            // world, panda, four shoots and two segments each
            assert_eq!(stage.graph().lock().len(), 1 + 1 + 4 + 8);
            let scene = stage.graph().lock().scene(time::Instant::now().into_std());
            assert_eq!(scene.worlds.len(), 1);
            assert_eq!(scene.worlds[0].shoots.len(), 4);
            assert_eq!(scene.worlds[0].pandas.len(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn invalid_config_mounts_nothing() {
    LocalSet::new()
        .run_until(async {
            let stage = framed_stage();
            let config = GroveConfig {
                shoot_count: 0,
                ..GroveConfig::default()
            };

            let result = Grove::new(Rc::clone(&stage), config, RandomSource::seeded(2));

            assert!(matches!(
                result,
                Err(GroveError::Config(ConfigError::NoShoots))
            ));
            assert!(stage.graph().lock().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn first_tick_fires_one_period_after_start() {
    LocalSet::new()
        .run_until(async {
            let stage = framed_stage();
            let config = GroveConfig {
                growth_chance: 0.0,
                initial_vitals: Vitals::new(1_000, 0, 0),
                ..GroveConfig::default()
            };
            let mut grove = Grove::new(Rc::clone(&stage), config, RandomSource::seeded(3))
                .expect("valid grove");
            let panda = Rc::clone(grove.panda());
            let shoots = grove.shoots().to_vec();

            let mut running = pin!(grove.run());
            tokio::select! {
                result = &mut running => panic!("grove stopped early: {result:?}"),
                () = time::sleep(Duration::from_millis(999)) => {}
            }
            assert_eq!(panda.activity(), Activity::Idle);

            tokio::select! {
                result = &mut running => panic!("grove stopped early: {result:?}"),
                () = time::sleep(Duration::from_millis(2)) => {}
            }
            assert_ne!(panda.activity(), Activity::Idle);
            assert!(shoots.iter().any(|shoot| shoot.is_claimed()));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn run_stops_on_a_background_failure() {
    LocalSet::new()
        .run_until(async {
            let stage = framed_stage();
            let config = GroveConfig {
                shoot_count: 1,
                growth_chance: 1.0,
                ..GroveConfig::default()
            };
            let mut grove = Grove::new(Rc::clone(&stage), config, RandomSource::seeded(4))
                .expect("valid grove");
            let shoot = grove.shoots()[0].element();
            stage.detach(shoot).expect("shoot detaches");

            let result = time::timeout(Duration::from_secs(10), grove.run())
                .await
                .expect("grove stops before the timeout");

            assert_eq!(
                result,
                Err(GroveError::Stage(StageError::MissingParent(shoot)))
            );
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn groves_on_one_stage_stay_independent() {
    LocalSet::new()
        .run_until(async {
            let stage = framed_stage();
            let config = GroveConfig {
                shoot_count: 2,
                growth_chance: 0.0,
                ..GroveConfig::default()
            };
            let first = Grove::new(Rc::clone(&stage), config, RandomSource::seeded(5))
                .expect("valid grove");
            let second = Grove::new(Rc::clone(&stage), config, RandomSource::seeded(6))
                .expect("valid grove");
            let untouched: Vec<Vec<u32>> =
                second.shoots().iter().map(|shoot| shoot.heights()).collect();

            first.panda().eat().await.expect("meal succeeds");

            assert!(first.shoots().iter().any(|shoot| shoot.segment_count() == 1));
            let after: Vec<Vec<u32>> =
                second.shoots().iter().map(|shoot| shoot.heights()).collect();
            assert_eq!(after, untouched);
            assert_eq!(second.panda().activity(), Activity::Idle);
            assert_eq!(stage.bounds(second.world()).expect("world").top, 160.0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn same_seed_plants_the_same_grove() {
    LocalSet::new()
        .run_until(async {
            let stage = framed_stage();
            let plant = |seed| {
                let grove = Grove::new(
                    Rc::clone(&stage),
                    GroveConfig::default(),
                    RandomSource::seeded(seed),
                )
                .expect("valid grove");
                grove
                    .shoots()
                    .iter()
                    .map(|shoot| (shoot.heights(), shoot.tilt()))
                    .collect::<Vec<_>>()
            };

            assert_eq!(plant(7), plant(7));
            assert_ne!(plant(7), plant(8));
        })
        .await;
}
