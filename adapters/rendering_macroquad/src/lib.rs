#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Macroquad-backed rendering adapter for the pet panda.
//!
//! Macroquad's optional audio stack depends on native ALSA development
//! libraries, which are unavailable in the containerised CI environment.
//! To keep `cargo test` usable everywhere we depend on macroquad without its
//! default `audio` feature.
//!
//! Everything is drawn from plain shapes: shoots are stacks of tilted quads,
//! the panda is a handful of circles and bars arranged per pose.

mod bamboo;
mod panda;

use anyhow::Result;
use glam::Vec2;
use macroquad::{
    input::{is_key_pressed, KeyCode},
    math::Vec2 as MacroquadVec2,
};
use pet_panda_core::Rect;
use pet_panda_rendering::{FrameControl, Presentation, RenderingBackend, Scene};
use std::time::{Duration, Instant};
use tracing::info;

/// Rendering backend implemented on top of macroquad.
#[derive(Debug, Default)]
pub struct MacroquadBackend {
    swap_interval: Option<i32>,
    show_fps: bool,
}

impl MacroquadBackend {
    /// Returns a backend that requests the platform's default swap interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to request a specific swap interval from the platform.
    #[must_use]
    pub fn with_swap_interval(mut self, swap_interval: Option<i32>) -> Self {
        self.swap_interval = swap_interval;
        self
    }

    /// Configures the backend to either synchronise presentation with the display refresh rate
    /// or render as fast as possible.
    #[must_use]
    pub fn with_vsync(self, enabled: bool) -> Self {
        let swap_interval = if enabled { Some(1) } else { Some(0) };
        self.with_swap_interval(swap_interval)
    }

    /// Configures whether the backend logs frame timing metrics once per second.
    #[must_use]
    pub fn with_show_fps(mut self, show: bool) -> Self {
        self.show_fps = show;
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct FrameBreakdown {
    frame: Duration,
    update: Duration,
    render: Duration,
}

/// Tracks the average frames-per-second produced by the render loop.
#[derive(Debug, Default)]
struct FpsCounter {
    elapsed: Duration,
    frames: u32,
    update_accum: Duration,
    render_accum: Duration,
}

#[derive(Clone, Copy, Debug)]
struct FpsMetrics {
    per_second: f32,
    avg_update: Duration,
    avg_render: Duration,
}

impl FpsCounter {
    /// Records a rendered frame and returns the averages once one second has elapsed.
    fn record_frame(&mut self, breakdown: FrameBreakdown) -> Option<FpsMetrics> {
        self.elapsed += breakdown.frame;
        self.frames = self.frames.saturating_add(1);
        self.update_accum += breakdown.update;
        self.render_accum += breakdown.render;

        if self.elapsed < Duration::from_secs(1) {
            return None;
        }

        let seconds = self.elapsed.as_secs_f32();
        let frames = self.frames.max(1);
        let metrics = FpsMetrics {
            per_second: self.frames as f32 / seconds,
            avg_update: self.update_accum / frames,
            avg_render: self.render_accum / frames,
        };
        *self = Self::default();
        Some(metrics)
    }
}

impl RenderingBackend for MacroquadBackend {
    fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
    where
        F: FnMut(Duration, &mut Scene) -> FrameControl + 'static,
    {
        let Self {
            swap_interval,
            show_fps,
        } = self;

        let Presentation {
            window_title,
            clear_color,
            scene,
        } = presentation;

        let extent = scene.extent();
        let mut config = macroquad::window::Conf {
            window_title,
            window_width: window_dimension(extent.x, 720),
            window_height: window_dimension(extent.y, 320),
            ..macroquad::window::Conf::default()
        };
        if let Some(swap_interval) = swap_interval {
            config.platform.swap_interval = Some(swap_interval);
        }

        macroquad::Window::from_config(config, async move {
            let mut scene = scene;
            let background = to_macroquad_color(clear_color);
            let mut fps_counter = FpsCounter::default();

            loop {
                if is_key_pressed(KeyCode::Escape) || is_key_pressed(KeyCode::Q) {
                    break;
                }

                let dt_seconds = macroquad::time::get_frame_time();
                let frame_dt = Duration::from_secs_f32(dt_seconds.max(0.0));

                let update_start = Instant::now();
                let control = update_scene(frame_dt, &mut scene);
                let update_duration = update_start.elapsed();
                if control == FrameControl::Exit {
                    break;
                }

                let render_start = Instant::now();
                macroquad::window::clear_background(background);
                let metrics = SceneMetrics::from_scene(
                    &scene,
                    macroquad::window::screen_width(),
                    macroquad::window::screen_height(),
                );
                draw_scene(&scene, &metrics);
                let render_duration = render_start.elapsed();

                let fps_metrics = fps_counter.record_frame(FrameBreakdown {
                    frame: frame_dt,
                    update: update_duration,
                    render: render_duration,
                });
                if show_fps {
                    if let Some(FpsMetrics {
                        per_second,
                        avg_update,
                        avg_render,
                    }) = fps_metrics
                    {
                        info!(
                            fps = per_second,
                            update_ms = avg_update.as_secs_f64() * 1_000.0,
                            render_ms = avg_render.as_secs_f64() * 1_000.0,
                            "frame timing"
                        );
                    }
                }

                macroquad::window::next_frame().await;
            }
        });

        Ok(())
    }
}

fn window_dimension(extent: f32, fallback: i32) -> i32 {
    if extent.is_finite() && extent >= 1.0 {
        extent.ceil() as i32
    } else {
        fallback
    }
}

fn draw_scene(scene: &Scene, metrics: &SceneMetrics) {
    for world in &scene.worlds {
        let ground = metrics.rect_to_screen(world.bounds);
        let floor = metrics.to_screen(Vec2::new(world.bounds.left, world.bounds.bottom()));
        macroquad::shapes::draw_line(
            ground.left,
            floor.y,
            ground.right(),
            floor.y,
            (2.0 * metrics.scale).max(1.0),
            to_macroquad_color(bamboo::GROUND_COLOR),
        );

        for shoot in &world.shoots {
            bamboo::draw_shoot(shoot, scene.scale, metrics);
        }
        for panda in &world.pandas {
            panda::draw_panda(panda, metrics);
        }
    }
}

/// Maps scene coordinates onto the window, letterboxing to keep the aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SceneMetrics {
    scale: f32,
    offset: Vec2,
}

impl SceneMetrics {
    fn from_scene(scene: &Scene, screen_width: f32, screen_height: f32) -> Self {
        let extent = scene.extent();
        if extent.x <= f32::EPSILON || extent.y <= f32::EPSILON {
            return Self {
                scale: 1.0,
                offset: Vec2::ZERO,
            };
        }

        let scale = (screen_width / extent.x).min(screen_height / extent.y).max(0.0);
        let offset = (Vec2::new(screen_width, screen_height) - extent * scale) * 0.5;
        Self {
            scale,
            offset: offset.max(Vec2::ZERO),
        }
    }

    fn to_screen(&self, point: Vec2) -> Vec2 {
        self.offset + point * self.scale
    }

    fn rect_to_screen(&self, rect: Rect) -> Rect {
        let origin = self.to_screen(Vec2::new(rect.left, rect.top));
        Rect::new(
            origin.x,
            origin.y,
            rect.width * self.scale,
            rect.height * self.scale,
        )
    }
}

fn to_macroquad_color(color: pet_panda_rendering::Color) -> macroquad::color::Color {
    macroquad::color::Color::new(color.red, color.green, color.blue, color.alpha)
}

fn to_macroquad_vec(point: Vec2) -> MacroquadVec2 {
    MacroquadVec2::new(point.x, point.y)
}
