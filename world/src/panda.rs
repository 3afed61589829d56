use std::{cell::Cell, rc::Rc, time::Duration};

use pet_panda_core::{
    Activity, Element, ElementId, Facing, GroveError, Pose, Stage, Style, Timing, Vitals,
};
use pet_panda_system_selection::{choose_activity, choose_shoot, ShootPreference};
use pet_panda_system_vitals::VitalsTable;
use rand::Rng;
use tokio::{task, time};
use tracing::{debug, trace};

use crate::{Claim, ErrorSink, RandomSource, Shoot, GROWTH_DURATION};

/// Shortest rest per point of tiredness.
const REST_MILLIS_MIN: u64 = 250;
/// Longest rest per point of tiredness.
const REST_MILLIS_MAX: u64 = 500;

/// Knobs steering the panda's behaviour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PandaTuning {
    /// Chance per tick that an idle shoot grows a segment.
    pub growth_chance: f64,
    /// Walking speed in pixels per second.
    pub walk_speed: f64,
    /// Drift of the vitals per activity.
    pub vitals: VitalsTable,
}

impl Default for PandaTuning {
    fn default() -> Self {
        Self {
            growth_chance: 0.1,
            walk_speed: 24.0,
            vitals: VitalsTable::default(),
        }
    }
}

/// The panda's behaviour state machine.
///
/// The panda owns its vitals and its [`Activity`]; it shares the grove's
/// shoots for choosing what to eat and what to grow. At most one action runs
/// at a time: actions only start from [`Activity::Idle`] and always end there.
#[derive(Debug)]
pub struct Panda<S> {
    element: ElementId,
    world: ElementId,
    stage: Rc<S>,
    rng: RandomSource,
    shoots: Rc<[Rc<Shoot<S>>]>,
    tuning: PandaTuning,
    errors: ErrorSink,
    vitals: Cell<Vitals>,
    activity: Cell<Activity>,
}

impl<S> Panda<S>
where
    S: Stage + 'static,
{
    /// Mounts the panda at the left edge of `world`, starting with `vitals`.
    pub fn new(
        world: ElementId,
        stage: Rc<S>,
        rng: RandomSource,
        shoots: Rc<[Rc<Shoot<S>>]>,
        tuning: PandaTuning,
        vitals: Vitals,
        errors: ErrorSink,
    ) -> Result<Self, GroveError> {
        let element = stage.mount(Some(world), Element::Panda, Style::EMPTY.with_left(0.0))?;
        stage.set_pose(element, Pose::Standing)?;

        Ok(Self {
            element,
            world,
            stage,
            rng,
            shoots,
            tuning,
            errors,
            vitals: Cell::new(vitals),
            activity: Cell::new(Activity::Idle),
        })
    }

    /// Advances the panda by one tick.
    ///
    /// Maybe grows an idle shoot, drifts the vitals according to the current
    /// activity and, if the panda is idle, decides what to do next. Chosen
    /// actions run in the background; the tick never waits for them.
    pub fn tick(self: &Rc<Self>) -> Result<(), GroveError> {
        self.grow_bamboo()?;

        let activity = self.activity.get();
        let vitals = self
            .rng
            .with(|rng| self.tuning.vitals.update(self.vitals.get(), activity, rng));
        self.vitals.set(vitals);
        debug!(
            %activity,
            hunger = vitals.hunger,
            tiredness = vitals.tiredness,
            boredom = vitals.boredom,
            "panda tick"
        );

        if !activity.is_idle() {
            return Ok(());
        }

        let next = self.rng.with(|rng| choose_activity(rng, vitals));
        if next.is_idle() {
            return Ok(());
        }
        self.launch(next)
    }

    /// Starts `activity` in the background.
    ///
    /// The transition is validated and the entry action applied before this
    /// returns, so the panda is already busy once the call succeeds. Errors of
    /// the background routine are forwarded to the grove.
    pub fn launch(self: &Rc<Self>, activity: Activity) -> Result<(), GroveError> {
        self.admit(activity)?;

        let meal = match activity {
            Activity::Eating => match self.choose_meal() {
                Some(claim) => Some(claim),
                None => {
                    debug!("no shoot is free to eat");
                    return Ok(());
                }
            },
            _ => None,
        };
        self.enter(activity)?;

        let panda = Rc::clone(self);
        let _routine = task::spawn_local(async move {
            let outcome = match (activity, meal) {
                (Activity::Eating, Some(meal)) => panda.eating(meal).await,
                (Activity::Resting, _) => panda.resting().await,
                (Activity::Walking, _) => panda.walking_to_random().await,
                _ => Ok(()),
            };
            if let Err(error) = panda.conclude(outcome) {
                panda.errors.report(error);
            }
        });

        Ok(())
    }

    /// Walks to a shoot that is free and chews it down to a single fresh segment.
    ///
    /// Taller shoots are more likely to be picked. Does nothing when every
    /// shoot is busy.
    pub async fn eat(&self) -> Result<(), GroveError> {
        self.admit(Activity::Eating)?;
        let Some(meal) = self.choose_meal() else {
            debug!("no shoot is free to eat");
            return Ok(());
        };
        self.enter(Activity::Eating)?;
        let outcome = self.eating(meal).await;
        self.conclude(outcome)
    }

    /// Sits down for a while; the more tired the panda, the longer the rest.
    pub async fn rest(&self) -> Result<(), GroveError> {
        self.enter(Activity::Resting)?;
        let outcome = self.resting().await;
        self.conclude(outcome)
    }

    /// Walks to a random spot inside the world.
    pub async fn walk_to_random(&self) -> Result<(), GroveError> {
        self.enter(Activity::Walking)?;
        let outcome = self.walking_to_random().await;
        self.conclude(outcome)
    }

    /// Walks until the panda is centred on the left edge of `shoot`.
    pub async fn walk_to_shoot(&self, shoot: &Shoot<S>) -> Result<(), GroveError> {
        self.enter(Activity::Walking)?;
        let outcome = match self.shoot_offset(shoot) {
            Ok(target) => self.walking_to(target).await,
            Err(error) => Err(error),
        };
        self.conclude(outcome)
    }

    fn grow_bamboo(&self) -> Result<(), GroveError> {
        if !self.rng.chance(self.tuning.growth_chance) {
            return Ok(());
        }

        let candidates: Vec<&Rc<Shoot<S>>> = self
            .shoots
            .iter()
            .filter(|shoot| shoot.is_available())
            .collect();
        let sizes: Vec<u32> = candidates.iter().map(|shoot| shoot.size()).collect();
        let Some(index) = self
            .rng
            .with(|rng| choose_shoot(rng, &sizes, ShootPreference::Shortest))
        else {
            trace!("every shoot is busy; skipping growth");
            return Ok(());
        };

        let shoot = candidates[index];
        debug!(shoot = %shoot.id(), size = shoot.size(), "growing bamboo");
        shoot.start_growth(GROWTH_DURATION, &self.errors)
    }

    fn choose_meal(&self) -> Option<Claim<S>> {
        let candidates: Vec<&Rc<Shoot<S>>> = self
            .shoots
            .iter()
            .filter(|shoot| shoot.is_available())
            .collect();
        let sizes: Vec<u32> = candidates.iter().map(|shoot| shoot.size()).collect();
        let index = self
            .rng
            .with(|rng| choose_shoot(rng, &sizes, ShootPreference::Tallest))?;
        candidates[index].claim()
    }

    async fn eating(&self, meal: Claim<S>) -> Result<(), GroveError> {
        let shoot = meal.shoot();
        let target = self.shoot_offset(shoot)?;
        self.step(Activity::Walking)?;
        self.walking_to(target).await?;

        self.step(Activity::Eating)?;
        self.stage.set_pose(self.element, Pose::Eating)?;
        let eaten = shoot.remove_all_segments().await?;
        debug!(shoot = %shoot.id(), eaten, "panda finished eating");
        Ok(())
    }

    async fn resting(&self) -> Result<(), GroveError> {
        let tiredness = u64::from(self.vitals.get().tiredness);
        let millis = self.rng.with(|rng| {
            rng.gen_range(REST_MILLIS_MIN * tiredness..=REST_MILLIS_MAX * tiredness)
        });
        debug!(millis, "panda rests");
        time::sleep(Duration::from_millis(millis)).await;
        Ok(())
    }

    async fn walking_to_random(&self) -> Result<(), GroveError> {
        let world = self.stage.bounds(self.world)?;
        let panda = self.stage.bounds(self.element)?;

        let low = panda.width;
        let high = (world.width - panda.width).max(low);
        let target = self.rng.with(|rng| rng.gen_range(low..=high)).round();
        self.walking_to(target).await
    }

    async fn walking_to(&self, target: f32) -> Result<(), GroveError> {
        let world = self.stage.bounds(self.world)?;
        let panda = self.stage.bounds(self.element)?;
        let current = panda.left - world.left;

        let distance = f64::from((target - current).abs());
        let duration = Duration::try_from_secs_f64(distance / self.tuning.walk_speed)
            .unwrap_or(Duration::ZERO);
        let facing = if target < current {
            Facing::Left
        } else {
            Facing::Right
        };
        debug!(from = current, to = target, ?duration, "panda walks");

        self.stage.set_pose(self.element, Pose::Walking(facing))?;
        self.stage
            .visible_transition(
                self.element,
                Style::EMPTY.with_left(current),
                Style::EMPTY.with_left(target),
                Timing::travel(duration),
            )
            .await?;
        time::sleep(duration).await;
        self.stage.set_timing(self.element, Timing::NONE)?;
        Ok(())
    }

    /// Offset that centres the panda on the left edge of `shoot`.
    fn shoot_offset(&self, shoot: &Shoot<S>) -> Result<f32, GroveError> {
        let world = self.stage.bounds(self.world)?;
        let panda = self.stage.bounds(self.element)?;
        let shoot = self.stage.bounds(shoot.element())?;
        Ok(shoot.left - world.left - panda.width / 2.0)
    }

    fn enter(&self, next: Activity) -> Result<(), GroveError> {
        self.admit(next)?;
        if let Some(pose) = next.entry_pose() {
            self.stage.set_pose(self.element, pose)?;
        }
        self.activity.set(next);
        debug!(activity = %next, "panda starts");
        Ok(())
    }

    /// Moves a running meal between its walking and chewing steps.
    fn step(&self, next: Activity) -> Result<(), GroveError> {
        let current = self.activity.get();
        if !current.is_meal_step(next) {
            return Err(GroveError::IllegalTransition {
                from: current,
                to: next,
            });
        }
        self.activity.set(next);
        trace!(from = %current, to = %next, "panda changes step");
        Ok(())
    }

    /// Exit action: back to idle and standing, whatever the routine returned.
    fn conclude(&self, outcome: Result<(), GroveError>) -> Result<(), GroveError> {
        self.activity.set(Activity::Idle);
        let reset = self
            .stage
            .set_timing(self.element, Timing::NONE)
            .and_then(|()| self.stage.set_pose(self.element, Pose::Standing));
        outcome.and(reset.map_err(GroveError::from))
    }
}

impl<S> Panda<S> {
    /// Stage element showing the panda.
    #[must_use]
    pub const fn element(&self) -> ElementId {
        self.element
    }

    /// Current need counters.
    #[must_use]
    pub fn vitals(&self) -> Vitals {
        self.vitals.get()
    }

    /// What the panda is doing right now.
    #[must_use]
    pub fn activity(&self) -> Activity {
        self.activity.get()
    }

    /// Behaviour knobs in effect.
    #[must_use]
    pub const fn tuning(&self) -> &PandaTuning {
        &self.tuning
    }

    fn admit(&self, next: Activity) -> Result<(), GroveError> {
        let current = self.activity.get();
        if !current.is_idle() {
            return Err(GroveError::PandaBusy { activity: current });
        }
        if !current.can_transition_to(next) {
            return Err(GroveError::IllegalTransition {
                from: current,
                to: next,
            });
        }
        Ok(())
    }
}
