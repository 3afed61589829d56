use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::Duration,
};

use pet_panda_core::{
    Element, ElementId, Foliage, GroveError, Leaf, LeafSide, Segment, ShootConfig, ShootId,
    ShootState, Stage, Style, Timing,
};
use rand::Rng;
use tokio::{task, time};
use tracing::{debug, trace};

use crate::{ErrorSink, RandomSource};

/// Duration of a regular segment reveal.
pub const GROWTH_DURATION: Duration = Duration::from_millis(1_000);

/// Fade duration of every segment removed while clearing a shoot.
pub const CLEAR_FADE_DURATION: Duration = Duration::from_millis(750);

/// Pause between two removals while clearing a shoot.
pub const CLEAR_PAUSE: Duration = Duration::from_millis(150);

const FIRST_LEAF_ANGLE: f32 = 30.0;
const SECOND_LEAF_ANGLE: f32 = 60.0;
const SECOND_LEAF_SAME_SIDE_CHANCE: f64 = 0.8;
const LIGHT_LEAF_CHANCE: f64 = 0.5;

#[derive(Clone, Copy, Debug)]
struct SegmentRecord {
    height: u32,
    element: ElementId,
}

/// A bamboo shoot: a stack of segments that grows and shrinks through timed
/// transitions.
///
/// Only one transition runs at a time. Starting another while the shoot is
/// not [`ShootState::Idle`] fails with [`GroveError::ShootBusy`].
#[derive(Debug)]
pub struct Shoot<S> {
    id: ShootId,
    element: ElementId,
    stage: Rc<S>,
    rng: RandomSource,
    config: ShootConfig,
    segments: RefCell<Vec<SegmentRecord>>,
    state: Cell<ShootState>,
    tilt: Cell<f32>,
    claimed: Cell<bool>,
}

impl<S> Shoot<S>
where
    S: Stage + 'static,
{
    /// Mounts a new shoot under `parent` with a random number of initial segments.
    pub fn new(
        id: ShootId,
        parent: ElementId,
        stage: Rc<S>,
        rng: RandomSource,
        config: ShootConfig,
    ) -> Result<Self, GroveError> {
        config.validate()?;

        let tilt = rng.with(|rng| roll_tilt(rng, &config.foliage));
        let element = stage.mount(Some(parent), Element::Shoot, Style::EMPTY.with_tilt(tilt))?;
        let count = rng.with(|rng| rng.gen_range(config.min_segments..=config.max_segments));

        let shoot = Self {
            id,
            element,
            stage,
            rng,
            config,
            segments: RefCell::new(Vec::new()),
            state: Cell::new(ShootState::Idle),
            tilt: Cell::new(tilt),
            claimed: Cell::new(false),
        };

        for _ in 0..count {
            let _record = shoot.mount_segment(Style::SETTLED)?;
        }
        debug!(shoot = %id, segments = count, size = shoot.size(), "shoot planted");

        Ok(shoot)
    }

    /// Grows one segment on top of the stack, revealed over `duration`.
    ///
    /// Returns the height of the new segment.
    pub async fn grow_segment(&self, duration: Duration) -> Result<u32, GroveError> {
        let _transition = self.begin(ShootState::Growing)?;
        self.reveal_segment(duration).await
    }

    /// Fades out and detaches the newest segment over `duration`.
    ///
    /// Returns the height of the removed segment.
    pub async fn remove_segment(&self, duration: Duration) -> Result<u32, GroveError> {
        let _transition = self.begin(ShootState::Destroying)?;
        self.fade_segment(duration).await
    }

    /// Removes every segment one by one, re-rolls the tilt and regrows a
    /// single fresh segment.
    ///
    /// Returns the total height that was removed.
    pub async fn remove_all_segments(&self) -> Result<u32, GroveError> {
        let transition = self.begin(ShootState::Destroying)?;

        let mut removed = 0;
        while !self.segments.borrow().is_empty() {
            removed += self.fade_segment(CLEAR_FADE_DURATION).await?;
            time::sleep(CLEAR_PAUSE).await;
        }

        let tilt = self.rng.with(|rng| roll_tilt(rng, &self.config.foliage));
        self.stage.apply_style(self.element, Style::EMPTY.with_tilt(tilt))?;
        self.tilt.set(tilt);

        transition.shift(ShootState::Growing);
        let regrown = self.reveal_segment(GROWTH_DURATION).await?;
        debug!(shoot = %self.id, removed, regrown, "shoot cleared");

        Ok(removed)
    }

    /// Starts a segment reveal without waiting for it.
    ///
    /// The shoot turns [`ShootState::Growing`] before this returns, so a
    /// second call in the same tick is rejected. Failures of the background
    /// transition are forwarded to `errors`.
    pub fn start_growth(
        self: &Rc<Self>,
        duration: Duration,
        errors: &ErrorSink,
    ) -> Result<(), GroveError> {
        self.admit(ShootState::Growing)?;

        let shoot = Rc::clone(self);
        let errors = errors.clone();
        let _growth = task::spawn_local(async move {
            let _transition = Transition {
                state: &shoot.state,
            };
            if let Err(error) = shoot.reveal_segment(duration).await {
                errors.report(error);
            }
        });

        Ok(())
    }

    /// Reserves the shoot for a panda's meal.
    ///
    /// Only idle, unreserved shoots can be claimed; the reservation lasts
    /// until the returned [`Claim`] is dropped.
    #[must_use]
    pub fn claim(self: &Rc<Self>) -> Option<Claim<S>> {
        if !self.is_available() {
            return None;
        }
        self.claimed.set(true);
        Some(Claim {
            shoot: Rc::clone(self),
        })
    }

    async fn reveal_segment(&self, duration: Duration) -> Result<u32, GroveError> {
        let SegmentRecord { height, element } = self.mount_segment(Style::FADED)?;

        self.stage
            .visible_transition(element, Style::FADED, Style::SETTLED, Timing::reveal(duration))
            .await?;
        time::sleep(duration).await;
        self.stage.set_timing(element, Timing::NONE)?;

        trace!(shoot = %self.id, height, size = self.size(), "segment grown");
        Ok(height)
    }

    async fn fade_segment(&self, duration: Duration) -> Result<u32, GroveError> {
        let record = self
            .segments
            .borrow()
            .last()
            .copied()
            .ok_or(GroveError::EmptyShoot { shoot: self.id })?;

        self.stage
            .visible_transition(
                record.element,
                Style::SETTLED,
                Style::FADED,
                Timing::fade(duration),
            )
            .await?;
        time::sleep(duration).await;
        self.stage.detach(record.element)?;
        let _removed = self.segments.borrow_mut().pop();

        trace!(shoot = %self.id, height = record.height, size = self.size(), "segment removed");
        Ok(record.height)
    }

    fn mount_segment(&self, style: Style) -> Result<SegmentRecord, GroveError> {
        let segment = self.rng.with(|rng| synthesize_segment(rng, &self.config));
        let height = segment.height;
        let element = self
            .stage
            .mount(Some(self.element), Element::Segment(segment), style)?;
        let record = SegmentRecord { height, element };
        self.segments.borrow_mut().push(record);
        Ok(record)
    }
}

impl<S> Shoot<S> {
    /// Identifier of the shoot within its grove.
    #[must_use]
    pub const fn id(&self) -> ShootId {
        self.id
    }

    /// Stage element holding the segments.
    #[must_use]
    pub const fn element(&self) -> ElementId {
        self.element
    }

    /// Parameters the shoot was built with.
    #[must_use]
    pub const fn config(&self) -> &ShootConfig {
        &self.config
    }

    /// Sum of the heights of every segment currently held.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.segments
            .borrow()
            .iter()
            .map(|record| record.height)
            .sum()
    }

    /// Number of segments currently held.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.borrow().len()
    }

    /// Heights of the held segments, oldest first.
    #[must_use]
    pub fn heights(&self) -> Vec<u32> {
        self.segments
            .borrow()
            .iter()
            .map(|record| record.height)
            .collect()
    }

    /// Transition currently in flight.
    #[must_use]
    pub fn state(&self) -> ShootState {
        self.state.get()
    }

    /// Current lean in degrees.
    #[must_use]
    pub fn tilt(&self) -> f32 {
        self.tilt.get()
    }

    /// Whether a panda has reserved this shoot.
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.claimed.get()
    }

    /// Idle and not reserved: free for growth or for a meal.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state.get() == ShootState::Idle && !self.claimed.get()
    }

    fn admit(&self, next: ShootState) -> Result<(), GroveError> {
        let state = self.state.get();
        if state != ShootState::Idle {
            return Err(GroveError::ShootBusy {
                shoot: self.id,
                state,
            });
        }
        self.state.set(next);
        Ok(())
    }

    fn begin(&self, next: ShootState) -> Result<Transition<'_>, GroveError> {
        self.admit(next)?;
        Ok(Transition { state: &self.state })
    }
}

/// Reservation of a shoot by an eating panda.
#[derive(Debug)]
pub struct Claim<S> {
    shoot: Rc<Shoot<S>>,
}

impl<S> Claim<S> {
    /// The reserved shoot.
    #[must_use]
    pub fn shoot(&self) -> &Rc<Shoot<S>> {
        &self.shoot
    }
}

impl<S> Drop for Claim<S> {
    fn drop(&mut self) {
        self.shoot.claimed.set(false);
    }
}

/// Returns the shoot to idle once a transition ends, however it ends.
struct Transition<'a> {
    state: &'a Cell<ShootState>,
}

impl Transition<'_> {
    fn shift(&self, next: ShootState) {
        self.state.set(next);
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        self.state.set(ShootState::Idle);
    }
}

fn synthesize_segment<R>(rng: &mut R, config: &ShootConfig) -> Segment
where
    R: Rng + ?Sized,
{
    let height = rng.gen_range(config.height_range());
    let leaves = sprout_leaves(rng, &config.foliage);
    Segment { height, leaves }
}

fn sprout_leaves<R>(rng: &mut R, foliage: &Foliage) -> Vec<Leaf>
where
    R: Rng + ?Sized,
{
    if rng.gen::<f64>() >= foliage.leaf_chance {
        return Vec::new();
    }

    let second = rng.gen::<f64>() < foliage.second_leaf_chance;
    let light = second || rng.gen::<f64>() < LIGHT_LEAF_CHANCE;
    let side = if rng.gen::<bool>() {
        LeafSide::Left
    } else {
        LeafSide::Right
    };

    let mut leaves = vec![Leaf {
        side,
        angle_degrees: FIRST_LEAF_ANGLE,
        light,
    }];
    if second {
        // only a left leaf can be followed on its own side; anything else hangs right
        let same_side = rng.gen::<f64>() < SECOND_LEAF_SAME_SIDE_CHANCE;
        let side = if same_side && side == LeafSide::Left {
            LeafSide::Left
        } else {
            LeafSide::Right
        };
        leaves.push(Leaf {
            side,
            angle_degrees: SECOND_LEAF_ANGLE,
            light: false,
        });
    }
    leaves
}

fn roll_tilt<R>(rng: &mut R, foliage: &Foliage) -> f32
where
    R: Rng + ?Sized,
{
    if rng.gen::<f64>() >= foliage.tilt_chance {
        return 0.0;
    }
    let magnitude = rng.gen_range(0..=foliage.max_tilt_degrees) as f32;
    if rng.gen::<bool>() {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn bare_foliage_never_sprouts_or_tilts() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let config = ShootConfig::new(24, 1, 3).with_foliage(Foliage::bare());

        for _ in 0..500 {
            let segment = synthesize_segment(&mut rng, &config);
            assert!(segment.leaves.is_empty());
            assert_eq!(roll_tilt(&mut rng, &config.foliage), 0.0);
        }
    }

    #[test]
    fn leaves_follow_their_shape_rules() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let foliage = Foliage {
            leaf_chance: 1.0,
            ..Foliage::default()
        };
        let mut pairs = 0;
        let mut left_firsts = 0_u32;
        let mut left_pairs = 0_u32;

        for _ in 0..2_000 {
            let leaves = sprout_leaves(&mut rng, &foliage);
            assert!(!leaves.is_empty() && leaves.len() <= 2);
            assert_eq!(leaves[0].angle_degrees, FIRST_LEAF_ANGLE);
            if let [first, second] = leaves.as_slice() {
                pairs += 1;
                assert!(first.light && !second.light);
                assert_eq!(second.angle_degrees, SECOND_LEAF_ANGLE);
                match first.side {
                    LeafSide::Right => assert_eq!(second.side, LeafSide::Right),
                    LeafSide::Left if second.side == LeafSide::Left => left_pairs += 1,
                    LeafSide::Left => {}
                }
                if first.side == LeafSide::Left {
                    left_firsts += 1;
                }
            }
        }

        assert!(pairs > 400 && pairs < 800, "second leaves: {pairs}");
        let kept_left = f64::from(left_pairs) / f64::from(left_firsts);
        assert!((kept_left - 0.8).abs() < 0.1, "left pairs kept {kept_left}");
    }

    #[test]
    fn tilt_stays_within_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let foliage = Foliage::default();

        for _ in 0..1_000 {
            let tilt = roll_tilt(&mut rng, &foliage);
            assert!(tilt.abs() <= foliage.max_tilt_degrees as f32);
            assert_eq!(tilt.fract(), 0.0);
        }
    }
}
