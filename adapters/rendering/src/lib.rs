#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for pet panda adapters.
//!
//! The world draws through the [`Stage`](pet_panda_core::Stage) port. This
//! crate implements that port on top of a retained [`SceneGraph`], turns the
//! graph into plain [`Scene`] snapshots, and defines the [`RenderingBackend`]
//! trait windowed adapters implement to display them.

mod graph;
mod stage;

use anyhow::Result as AnyResult;
use glam::Vec2;
use pet_panda_core::{Leaf, Pose, Rect};
use std::{error::Error, fmt, time::Duration};

pub use graph::{Layout, SceneGraph, PANDA_HEIGHT, PANDA_WIDTH, SHOOT_WIDTH};
pub use stage::{FrameClock, FrameSignal, SceneStage, SharedGraph};

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Returns a new color lightened towards white by the provided amount.
    #[must_use]
    pub fn lighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);

        Self {
            red: lighten_channel(self.red, amount),
            green: lighten_channel(self.green, amount),
            blue: lighten_channel(self.blue, amount),
            alpha: self.alpha,
        }
    }

    /// Applies a brightness multiplier the way a CSS `brightness()` filter does.
    ///
    /// Values above one wash the color out towards white, values below one
    /// darken it.
    #[must_use]
    pub fn brighten(self, brightness: f32) -> Self {
        let brightness = brightness.max(0.0);
        if brightness <= 1.0 {
            return Self {
                red: self.red * brightness,
                green: self.green * brightness,
                blue: self.blue * brightness,
                alpha: self.alpha,
            };
        }

        Self {
            red: (self.red * brightness).min(1.0),
            green: (self.green * brightness).min(1.0),
            blue: (self.blue * brightness).min(1.0),
            alpha: self.alpha,
        }
    }

    /// Returns the color with its alpha scaled by `opacity`.
    #[must_use]
    pub fn fade(self, opacity: f32) -> Self {
        Self {
            alpha: self.alpha * opacity.clamp(0.0, 1.0),
            ..self
        }
    }
}

fn lighten_channel(channel: f32, amount: f32) -> f32 {
    channel + (1.0 - channel) * amount
}

/// Snapshot of a single bamboo segment.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentPresentation {
    /// On-screen box of the segment, before the shoot's tilt is applied.
    pub bounds: Rect,
    /// Current alpha.
    pub opacity: f32,
    /// Current brightness multiplier.
    pub brightness: f32,
    /// Decorative leaves.
    pub leaves: Vec<Leaf>,
}

/// Snapshot of a bamboo shoot.
#[derive(Clone, Debug, PartialEq)]
pub struct ShootPresentation {
    /// Box enclosing every segment.
    pub bounds: Rect,
    /// Lean in degrees around the bottom centre; negative leans left.
    pub tilt_degrees: f32,
    /// Segments from the ground up.
    pub segments: Vec<SegmentPresentation>,
}

/// Snapshot of a panda.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PandaPresentation {
    /// On-screen box of the panda.
    pub bounds: Rect,
    /// Posture to draw.
    pub pose: Pose,
}

/// Snapshot of one world and everything inside it.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldPresentation {
    /// On-screen box of the world.
    pub bounds: Rect,
    /// Shoots in planting order.
    pub shoots: Vec<ShootPresentation>,
    /// Pandas living in this world.
    pub pandas: Vec<PandaPresentation>,
}

/// Scene description handed to backends every frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    /// Multiplier applied to element sizes.
    pub scale: f32,
    /// Every mounted world, stacked top to bottom.
    pub worlds: Vec<WorldPresentation>,
}

impl Scene {
    /// Creates a new scene descriptor.
    #[must_use]
    pub fn new(scale: f32, worlds: Vec<WorldPresentation>) -> Self {
        Self { scale, worlds }
    }

    /// Size of the box enclosing every world.
    #[must_use]
    pub fn extent(&self) -> Vec2 {
        self.worlds.iter().fold(Vec2::ZERO, |extent, world| {
            extent.max(Vec2::new(world.bounds.right(), world.bounds.bottom()))
        })
    }
}

/// Presentation descriptor consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title used by the created window.
    pub window_title: String,
    /// Solid color used to clear each frame.
    pub clear_color: Color,
    /// Scene content that should be displayed.
    pub scene: Scene,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(window_title: T, clear_color: Color, scene: Scene) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
            clear_color,
            scene,
        }
    }
}

/// Decision returned by the per-frame update closure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameControl {
    /// Keep presenting frames.
    Continue,
    /// Close the window and return from [`RenderingBackend::run`].
    Exit,
}

/// Rendering backend capable of presenting pet panda scenes.
pub trait RenderingBackend {
    /// Runs the rendering backend until it is requested to exit.
    ///
    /// The provided `update_scene` closure receives the frame delta and
    /// refreshes the scene before it is drawn. Returning
    /// [`FrameControl::Exit`] stops the backend.
    fn run<F>(self, presentation: Presentation, update_scene: F) -> AnyResult<()>
    where
        F: FnMut(Duration, &mut Scene) -> FrameControl + 'static;
}

/// Errors that can occur when constructing rendering descriptors.
#[derive(Debug, PartialEq)]
pub enum RenderingError {
    /// World dimensions and scale must be positive and finite.
    InvalidLayout {
        /// Name of the offending dimension.
        name: &'static str,
        /// Provided value.
        value: f32,
    },
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLayout { name, value } => {
                write!(f, "{name} must be positive (received {value})")
            }
        }
    }
}

impl Error for RenderingError {}
