#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative state of a pet panda's grove.
//!
//! A [`Grove`] owns a fixed set of bamboo [`Shoot`]s and one [`Panda`], all
//! mounted on a [`Stage`]. Every entity lives on a single thread and shares
//! state through `Rc`; timed transitions are tokio tasks spawned onto the
//! current [`tokio::task::LocalSet`], so a grove must be driven from inside one.

mod panda;
mod random;
mod shoot;

use std::{rc::Rc, time::Duration};

use pet_panda_core::{
    validate_probability, ConfigError, Element, ElementId, GroveError, ShootConfig, ShootId,
    Stage, Style, Vitals,
};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

pub use panda::{Panda, PandaTuning};
pub use random::RandomSource;
pub use shoot::{Claim, Shoot, CLEAR_FADE_DURATION, CLEAR_PAUSE, GROWTH_DURATION};

/// Construction parameters of a grove.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroveConfig {
    /// Number of shoots planted when the grove is created.
    pub shoot_count: u32,
    /// Parameters shared by every shoot.
    pub shoot: ShootConfig,
    /// Interval between two ticks in milliseconds.
    pub tick_period_ms: u64,
    /// Chance per tick that an idle shoot grows a segment.
    pub growth_chance: f64,
    /// Walking speed of the panda in pixels per second.
    pub walk_speed: f64,
    /// Needs the panda starts with.
    pub initial_vitals: Vitals,
}

impl Default for GroveConfig {
    fn default() -> Self {
        let tuning = PandaTuning::default();
        Self {
            shoot_count: 5,
            shoot: ShootConfig::default(),
            tick_period_ms: 1_000,
            growth_chance: tuning.growth_chance,
            walk_speed: tuning.walk_speed,
            initial_vitals: Vitals::default(),
        }
    }
}

impl GroveConfig {
    /// Rejects parameters that cannot describe a working grove.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shoot_count == 0 {
            return Err(ConfigError::NoShoots);
        }
        self.shoot.validate()?;
        if self.tick_period_ms == 0 {
            return Err(ConfigError::NonPositive {
                name: "tick_period_ms",
                value: 0.0,
            });
        }
        validate_probability("growth_chance", self.growth_chance)?;
        if !(self.walk_speed.is_finite() && self.walk_speed > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "walk_speed",
                value: self.walk_speed,
            });
        }
        Ok(())
    }

    /// Interval between two ticks.
    #[must_use]
    pub const fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Behaviour knobs handed to the panda.
    #[must_use]
    pub fn tuning(&self) -> PandaTuning {
        PandaTuning {
            growth_chance: self.growth_chance,
            walk_speed: self.walk_speed,
            ..PandaTuning::default()
        }
    }
}

/// Channel through which background transitions report failures.
#[derive(Clone, Debug)]
pub struct ErrorSink {
    sender: mpsc::UnboundedSender<GroveError>,
}

impl ErrorSink {
    /// Creates a sink together with the receiving end.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GroveError>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Forwards `error` to whoever drives the grove.
    pub fn report(&self, error: GroveError) {
        warn!(%error, "background transition failed");
        if self.sender.send(error).is_err() {
            debug!("nobody is listening for grove errors any more");
        }
    }
}

/// A world holding one panda and its bamboo.
#[derive(Debug)]
pub struct Grove<S> {
    config: GroveConfig,
    world: ElementId,
    shoots: Rc<[Rc<Shoot<S>>]>,
    panda: Rc<Panda<S>>,
    failures: mpsc::UnboundedReceiver<GroveError>,
}

impl<S> Grove<S>
where
    S: Stage + 'static,
{
    /// Validates `config` and mounts the world, its shoots and the panda on `stage`.
    pub fn new(stage: Rc<S>, config: GroveConfig, rng: RandomSource) -> Result<Self, GroveError> {
        config.validate()?;

        let (errors, failures) = ErrorSink::channel();
        let world = stage.mount(None, Element::World, Style::EMPTY)?;
        let shoots = (0..config.shoot_count)
            .map(|index| {
                Shoot::new(
                    ShootId::new(index),
                    world,
                    Rc::clone(&stage),
                    rng.clone(),
                    config.shoot,
                )
                .map(Rc::new)
            })
            .collect::<Result<Rc<[_]>, _>>()?;
        let panda = Panda::new(
            world,
            stage,
            rng,
            Rc::clone(&shoots),
            config.tuning(),
            config.initial_vitals,
            errors,
        )?;
        info!(world = %world, shoots = shoots.len(), "grove planted");

        Ok(Self {
            config,
            world,
            shoots,
            panda: Rc::new(panda),
            failures,
        })
    }

    /// Runs a single tick immediately.
    pub fn tick(&self) -> Result<(), GroveError> {
        self.panda.tick()
    }

    /// Pops an error reported by a background transition, if any.
    pub fn take_failure(&mut self) -> Option<GroveError> {
        self.failures.try_recv().ok()
    }

    /// Ticks forever on the configured period.
    ///
    /// The first tick fires one period after the call. Returns the first error
    /// raised by a tick or reported by a background transition.
    pub async fn run(&mut self) -> Result<(), GroveError> {
        let period = self.config.tick_period();
        let mut ticks = time::interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let Self {
            panda, failures, ..
        } = self;
        loop {
            tokio::select! {
                _ = ticks.tick() => panda.tick()?,
                Some(error) = failures.recv() => return Err(error),
            }
        }
    }
}

impl<S> Grove<S> {
    /// Parameters the grove was built with.
    #[must_use]
    pub const fn config(&self) -> &GroveConfig {
        &self.config
    }

    /// Root element every other element of this grove is mounted under.
    #[must_use]
    pub const fn world(&self) -> ElementId {
        self.world
    }

    /// Every shoot, in planting order.
    #[must_use]
    pub fn shoots(&self) -> &[Rc<Shoot<S>>] {
        &self.shoots
    }

    /// The resident panda.
    #[must_use]
    pub fn panda(&self) -> &Rc<Panda<S>> {
        &self.panda
    }
}
