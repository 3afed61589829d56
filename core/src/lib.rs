#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the pet panda widget.
//!
//! This crate defines the vocabulary that connects the simulated world, the
//! pure decision systems, and the rendering adapters. The world owns a panda
//! and a fixed set of bamboo shoots; it mutates them through the state enums
//! declared here and talks to whatever draws them exclusively through the
//! [`Stage`] port. Adapters implement [`Stage`] and never reach into the
//! world's state.

use std::{fmt, future::Future, ops::RangeInclusive, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier assigned to a bamboo shoot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShootId(u32);

impl ShootId {
    /// Creates a new shoot identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ShootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a visual element allocated by a [`Stage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    /// Creates a new element handle with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// What the panda is currently doing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activity {
    /// Doing nothing; the only state from which a new action may start.
    #[default]
    Idle,
    /// Chewing a shoot down; a meal starts here before walking to its shoot.
    Eating,
    /// Sitting for a while to recover.
    Resting,
    /// Wandering to a random spot, or heading for a meal.
    Walking,
}

impl Activity {
    /// Every activity, in the order the decision weighs them.
    pub const ALL: [Self; 4] = [Self::Eating, Self::Resting, Self::Walking, Self::Idle];

    /// Reports whether the state machine may move from `self` to `next`.
    ///
    /// Actions only ever start from idle and only ever end in idle. A meal
    /// walks to its shoot first, so eating hands over to walking for the
    /// approach and takes back over for the chewing.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Eating | Self::Resting | Self::Walking)
                | (Self::Eating | Self::Resting | Self::Walking, Self::Idle)
                | (Self::Eating, Self::Walking)
                | (Self::Walking, Self::Eating)
        )
    }

    /// Returns `true` for the activity steps a running meal moves through.
    #[must_use]
    pub const fn is_meal_step(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Eating, Self::Walking) | (Self::Walking, Self::Eating)
        )
    }

    /// Pose applied when the activity is entered, if the activity dictates one.
    ///
    /// Eating and walking pick their pose once they know where they are heading.
    #[must_use]
    pub const fn entry_pose(self) -> Option<Pose> {
        match self {
            Self::Idle => Some(Pose::Standing),
            Self::Resting => Some(Pose::Sitting),
            Self::Eating | Self::Walking => None,
        }
    }

    /// Returns `true` for [`Activity::Idle`].
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Eating => "eating",
            Self::Resting => "resting",
            Self::Walking => "walking",
        };
        f.write_str(label)
    }
}

/// Lifecycle state of a single bamboo shoot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShootState {
    /// No transition in flight.
    #[default]
    Idle,
    /// A segment is being revealed.
    Growing,
    /// One or more segments are being faded out.
    Destroying,
}

impl fmt::Display for ShootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Growing => "growing",
            Self::Destroying => "destroying",
        };
        f.write_str(label)
    }
}

/// One of the three needs tracked for the panda.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Vital {
    /// Drives eating.
    Hunger,
    /// Drives resting.
    Tiredness,
    /// Drives walking.
    Boredom,
}

impl Vital {
    /// Every vital in table order.
    pub const ALL: [Self; 3] = [Self::Hunger, Self::Tiredness, Self::Boredom];
}

/// Non-negative need counters owned by the panda.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Vitals {
    /// How hungry the panda is.
    pub hunger: u32,
    /// How tired the panda is.
    pub tiredness: u32,
    /// How bored the panda is.
    pub boredom: u32,
}

impl Vitals {
    /// Creates a vitals record from explicit counters.
    #[must_use]
    pub const fn new(hunger: u32, tiredness: u32, boredom: u32) -> Self {
        Self {
            hunger,
            tiredness,
            boredom,
        }
    }

    /// Reads a single counter.
    #[must_use]
    pub const fn get(&self, vital: Vital) -> u32 {
        match vital {
            Vital::Hunger => self.hunger,
            Vital::Tiredness => self.tiredness,
            Vital::Boredom => self.boredom,
        }
    }

    /// Returns a copy with the counter shifted by `delta`, saturating at zero.
    #[must_use]
    pub fn offset(self, vital: Vital, delta: i32) -> Self {
        let mut next = self;
        match vital {
            Vital::Hunger => next.hunger = self.hunger.saturating_add_signed(delta),
            Vital::Tiredness => next.tiredness = self.tiredness.saturating_add_signed(delta),
            Vital::Boredom => next.boredom = self.boredom.saturating_add_signed(delta),
        }
        next
    }
}

/// Side of a segment a leaf sprouts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeafSide {
    /// Leaf points to the left.
    Left,
    /// Leaf points to the right.
    Right,
}

/// Decorative leaf attached to a segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Leaf {
    /// Side of the segment the leaf grows from.
    pub side: LeafSide,
    /// Angle between the leaf and the stem.
    pub angle_degrees: f32,
    /// Whether the leaf uses the lighter shade.
    pub light: bool,
}

/// Description of a single bamboo segment.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    /// Height of the segment in stage pixels.
    pub height: u32,
    /// Decorative leaves, at most two.
    pub leaves: Vec<Leaf>,
}

/// Probabilities steering the purely cosmetic look of a shoot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Foliage {
    /// Chance that a shoot leans at all.
    pub tilt_chance: f64,
    /// Largest lean in whole degrees.
    pub max_tilt_degrees: u32,
    /// Chance that a new segment carries a leaf.
    pub leaf_chance: f64,
    /// Chance that a leafy segment carries a second leaf.
    pub second_leaf_chance: f64,
}

impl Default for Foliage {
    fn default() -> Self {
        Self {
            tilt_chance: 0.5,
            max_tilt_degrees: 4,
            leaf_chance: 0.2,
            second_leaf_chance: 0.3,
        }
    }
}

impl Foliage {
    /// Foliage that never tilts and never sprouts leaves.
    #[must_use]
    pub const fn bare() -> Self {
        Self {
            tilt_chance: 0.0,
            max_tilt_degrees: 0,
            leaf_chance: 0.0,
            second_leaf_chance: 0.0,
        }
    }

    /// Rejects probabilities outside `0..=1`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_probability("tilt_chance", self.tilt_chance)?;
        validate_probability("leaf_chance", self.leaf_chance)?;
        validate_probability("second_leaf_chance", self.second_leaf_chance)
    }
}

/// Construction parameters of a bamboo shoot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShootConfig {
    /// Nominal segment height; each segment lands within 25% of it.
    pub base_height: u32,
    /// Fewest segments a fresh shoot starts with.
    pub min_segments: u32,
    /// Most segments a fresh shoot starts with.
    pub max_segments: u32,
    /// Cosmetic probabilities.
    pub foliage: Foliage,
}

impl Default for ShootConfig {
    fn default() -> Self {
        Self {
            base_height: 24,
            min_segments: 1,
            max_segments: 3,
            foliage: Foliage::default(),
        }
    }
}

impl ShootConfig {
    /// Creates a configuration with default foliage.
    #[must_use]
    pub fn new(base_height: u32, min_segments: u32, max_segments: u32) -> Self {
        Self {
            base_height,
            min_segments,
            max_segments,
            foliage: Foliage::default(),
        }
    }

    /// Replaces the foliage probabilities.
    #[must_use]
    pub fn with_foliage(mut self, foliage: Foliage) -> Self {
        self.foliage = foliage;
        self
    }

    /// Checks that the bounds describe at least one segment of positive height.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_height == 0 {
            return Err(ConfigError::ZeroBaseHeight);
        }
        if self.min_segments == 0 || self.max_segments == 0 {
            return Err(ConfigError::NonPositiveSegments {
                min: self.min_segments,
                max: self.max_segments,
            });
        }
        if self.min_segments > self.max_segments {
            return Err(ConfigError::InvertedSegments {
                min: self.min_segments,
                max: self.max_segments,
            });
        }
        self.foliage.validate()
    }

    /// Whole-pixel heights a new segment may take: 75% to 125% of the base.
    #[must_use]
    pub fn height_range(&self) -> RangeInclusive<u32> {
        let base = f64::from(self.base_height);
        let low = (base * 0.75).ceil() as u32;
        let high = (base * 1.25).floor() as u32;
        low.max(1)..=high.max(low.max(1))
    }
}

/// Validates that `value` is a probability.
pub fn validate_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { name, value })
    }
}

/// Partial set of animatable properties; `None` leaves a property untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Style {
    /// Alpha in `0.0..=1.0`.
    pub opacity: Option<f32>,
    /// Brightness multiplier where `1.0` is unfiltered.
    pub brightness: Option<f32>,
    /// Lean of the element in degrees; negative leans left.
    pub tilt_degrees: Option<f32>,
    /// Offset of the element's left edge from its parent's left edge.
    pub left: Option<f32>,
}

impl Style {
    /// Patch that changes nothing.
    pub const EMPTY: Self = Self {
        opacity: None,
        brightness: None,
        tilt_degrees: None,
        left: None,
    };

    /// Fully visible and unfiltered.
    pub const SETTLED: Self = Self::EMPTY.with_opacity(1.0).with_brightness(1.0);

    /// Invisible and washed out; the far end of a reveal or a fade.
    pub const FADED: Self = Self::EMPTY.with_opacity(0.0).with_brightness(5.0);

    /// Sets the opacity.
    #[must_use]
    pub const fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    /// Sets the brightness multiplier.
    #[must_use]
    pub const fn with_brightness(mut self, brightness: f32) -> Self {
        self.brightness = Some(brightness);
        self
    }

    /// Sets the tilt.
    #[must_use]
    pub const fn with_tilt(mut self, degrees: f32) -> Self {
        self.tilt_degrees = Some(degrees);
        self
    }

    /// Sets the left offset.
    #[must_use]
    pub const fn with_left(mut self, left: f32) -> Self {
        self.left = Some(left);
        self
    }

    /// Returns `true` when the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.opacity.is_none()
            && self.brightness.is_none()
            && self.tilt_degrees.is_none()
            && self.left.is_none()
    }
}

/// Per-property transition durations; zero means the change applies instantly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timing {
    /// Duration of opacity changes.
    pub opacity: Duration,
    /// Duration of brightness changes.
    pub brightness: Duration,
    /// Duration of left-offset changes.
    pub left: Duration,
}

impl Timing {
    /// Every change applies instantly.
    pub const NONE: Self = Self {
        opacity: Duration::ZERO,
        brightness: Duration::ZERO,
        left: Duration::ZERO,
    };

    /// Timing of a segment reveal: the glow settles over `duration`, the
    /// opacity over the first quarter of it.
    #[must_use]
    pub fn reveal(duration: Duration) -> Self {
        Self {
            opacity: duration / 4,
            brightness: duration,
            left: Duration::ZERO,
        }
    }

    /// Timing of a segment fade: the glow flares over the first quarter,
    /// the opacity drains over `duration`.
    #[must_use]
    pub fn fade(duration: Duration) -> Self {
        Self {
            opacity: duration,
            brightness: duration / 4,
            left: Duration::ZERO,
        }
    }

    /// Timing of a walk lasting `duration`.
    #[must_use]
    pub const fn travel(duration: Duration) -> Self {
        Self {
            opacity: Duration::ZERO,
            brightness: Duration::ZERO,
            left: duration,
        }
    }
}

/// Direction the panda faces while walking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Facing {
    /// Heading towards smaller offsets.
    Left,
    /// Heading towards larger offsets.
    Right,
}

/// Visual posture of the panda.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Pose {
    /// Standing still.
    #[default]
    Standing,
    /// Mid-stride.
    Walking(Facing),
    /// Sitting down to rest.
    Sitting,
    /// Chewing bamboo.
    Eating,
}

/// Axis-aligned box in stage pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    /// Distance of the left edge from the stage origin.
    pub left: f32,
    /// Distance of the top edge from the stage origin.
    pub top: f32,
    /// Horizontal extent.
    pub width: f32,
    /// Vertical extent.
    pub height: f32,
}

impl Rect {
    /// Creates a new box.
    #[must_use]
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Distance of the right edge from the stage origin.
    #[must_use]
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    /// Distance of the bottom edge from the stage origin.
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

/// Kinds of element the world asks a stage to create.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    /// Container every other element of one grove lives in.
    World,
    /// Column holding a shoot's segments.
    Shoot,
    /// Single bamboo segment stacked on top of its predecessors.
    Segment(Segment),
    /// The panda.
    Panda,
}

/// Rendering port the world drives.
///
/// Implementations own every visual element. The world only keeps the
/// [`ElementId`] handles returned by [`Stage::mount`].
pub trait Stage {
    /// Creates `element` as the last child of `parent` (or as a root) with an
    /// initial style.
    fn mount(
        &self,
        parent: Option<ElementId>,
        element: Element,
        style: Style,
    ) -> Result<ElementId, StageError>;

    /// Removes an element and all of its children.
    fn detach(&self, element: ElementId) -> Result<(), StageError>;

    /// Writes style properties, animating them according to the element's timing.
    fn apply_style(&self, element: ElementId, style: Style) -> Result<(), StageError>;

    /// Replaces the transition timing of an element.
    fn set_timing(&self, element: ElementId, timing: Timing) -> Result<(), StageError>;

    /// Changes the posture shown for an element.
    fn set_pose(&self, element: ElementId, pose: Pose) -> Result<(), StageError>;

    /// Current on-screen box of an element, mid-animation values included.
    fn bounds(&self, element: ElementId) -> Result<Rect, StageError>;

    /// Commits `before` together with `timing`, waits for two presented
    /// frames so the starting values are on screen, then commits `after`.
    ///
    /// Resolves as soon as `after` is committed; the animation itself keeps
    /// running for the durations in `timing`.
    fn visible_transition(
        &self,
        element: ElementId,
        before: Style,
        after: Style,
        timing: Timing,
    ) -> impl Future<Output = Result<(), StageError>>;
}

/// Failures reported by a [`Stage`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StageError {
    /// The element was never mounted or has been detached.
    #[error("element {0} is not mounted on the stage")]
    MissingElement(ElementId),
    /// The requested parent is not mounted.
    #[error("cannot mount under {0}: parent is not mounted")]
    MissingParent(ElementId),
    /// Nothing presents frames any more, so a frame boundary never arrives.
    #[error("the frame source stopped presenting frames")]
    FramesClosed,
}

/// Invalid construction parameters.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Segment bounds must describe at least one segment.
    #[error("segment bounds must be positive (min {min}, max {max})")]
    NonPositiveSegments {
        /// Provided minimum.
        min: u32,
        /// Provided maximum.
        max: u32,
    },
    /// Minimum above maximum.
    #[error("minimum segment count {min} exceeds maximum {max}")]
    InvertedSegments {
        /// Provided minimum.
        min: u32,
        /// Provided maximum.
        max: u32,
    },
    /// Segments need a height.
    #[error("base segment height must be positive")]
    ZeroBaseHeight,
    /// A grove without shoots leaves the panda nothing to eat.
    #[error("a grove needs at least one shoot")]
    NoShoots,
    /// A strictly positive quantity was zero, negative, or not a number.
    #[error("{name} must be positive (received {value})")]
    NonPositive {
        /// Name of the offending setting.
        name: &'static str,
        /// Provided value.
        value: f64,
    },
    /// A chance outside `0..=1`.
    #[error("{name} must be a probability within 0..=1 (received {value})")]
    InvalidProbability {
        /// Name of the offending setting.
        name: &'static str,
        /// Provided value.
        value: f64,
    },
}

/// Errors surfaced by the world.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GroveError {
    /// The rendering collaborator broke its contract.
    #[error(transparent)]
    Stage(#[from] StageError),
    /// Construction parameters were rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A segment removal was requested on a shoot without segments.
    #[error("shoot {shoot} has no segments left to remove")]
    EmptyShoot {
        /// Shoot that was targeted.
        shoot: ShootId,
    },
    /// A shoot transition was requested while another one was in flight.
    #[error("shoot {shoot} is {state} and cannot start another transition")]
    ShootBusy {
        /// Shoot that was targeted.
        shoot: ShootId,
        /// State the shoot was in.
        state: ShootState,
    },
    /// An action was launched while the panda was busy.
    #[error("panda is {activity} and cannot start another action")]
    PandaBusy {
        /// Activity the panda was performing.
        activity: Activity,
    },
    /// The activity transition table forbids the move.
    #[error("panda cannot go from {from} to {to}")]
    IllegalTransition {
        /// Current activity.
        from: Activity,
        /// Requested activity.
        to: Activity,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activities_start_and_end_in_idle() {
        for from in Activity::ALL {
            for to in Activity::ALL {
                let meal_step = matches!(
                    (from, to),
                    (Activity::Eating, Activity::Walking) | (Activity::Walking, Activity::Eating)
                );
                let expected = from.is_idle() != to.is_idle() || meal_step;
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{from} -> {to} should be {expected}"
                );
            }
        }
    }

    #[test]
    fn vitals_offset_saturates_at_zero() {
        let vitals = Vitals::new(3, 0, 7);

        let fed = vitals.offset(Vital::Hunger, -10);
        let rested = fed.offset(Vital::Tiredness, -2);
        let bored = rested.offset(Vital::Boredom, 2);

        assert_eq!(bored, Vitals::new(0, 0, 9));
    }

    #[test]
    fn height_range_spans_a_quarter_either_side() {
        assert_eq!(ShootConfig::new(80, 1, 1).height_range(), 60..=100);
        assert_eq!(ShootConfig::new(1, 1, 1).height_range(), 1..=1);
        assert_eq!(ShootConfig::new(2, 1, 1).height_range(), 2..=2);
    }

    #[test]
    fn shoot_config_rejects_invalid_bounds() {
        assert_eq!(
            ShootConfig::new(10, 0, 3).validate(),
            Err(ConfigError::NonPositiveSegments { min: 0, max: 3 })
        );
        assert_eq!(
            ShootConfig::new(10, 4, 2).validate(),
            Err(ConfigError::InvertedSegments { min: 4, max: 2 })
        );
        assert_eq!(
            ShootConfig::new(0, 1, 2).validate(),
            Err(ConfigError::ZeroBaseHeight)
        );
        assert!(ShootConfig::new(10, 2, 2).validate().is_ok());
    }

    #[test]
    fn foliage_rejects_out_of_range_chances() {
        let foliage = Foliage {
            leaf_chance: 1.5,
            ..Foliage::default()
        };

        assert!(matches!(
            foliage.validate(),
            Err(ConfigError::InvalidProbability {
                name: "leaf_chance",
                ..
            })
        ));
    }

    #[test]
    fn reveal_and_fade_split_durations() {
        let duration = Duration::from_millis(1_000);

        let reveal = Timing::reveal(duration);
        let fade = Timing::fade(duration);

        assert_eq!(reveal.opacity, Duration::from_millis(250));
        assert_eq!(reveal.brightness, duration);
        assert_eq!(fade.opacity, duration);
        assert_eq!(fade.brightness, Duration::from_millis(250));
    }
}
