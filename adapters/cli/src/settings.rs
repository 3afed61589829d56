//! Settings file support.
//!
//! Every field is optional in the file; missing values fall back to the
//! defaults below and command-line flags override whatever the file says.

use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use pet_panda_rendering::Layout;
use pet_panda_world::GroveConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything needed to plant and display the groves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    /// Parameters shared by every grove.
    pub(crate) grove: GroveConfig,
    /// Number of independent worlds, stacked top to bottom.
    pub(crate) worlds: u32,
    /// Width of one world in pixels.
    pub(crate) world_width: f32,
    /// Height of one world in pixels.
    pub(crate) world_height: f32,
    /// Size multiplier for shoots and pandas.
    pub(crate) world_scale: f32,
    /// Log activity and vitals on every tick.
    pub(crate) debug_messages: bool,
    /// Seed for reproducible runs; drawn from the OS when absent.
    pub(crate) seed: Option<u64>,
    /// Window options.
    pub(crate) window: WindowSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let layout = Layout::default();
        Self {
            grove: GroveConfig::default(),
            worlds: 1,
            world_width: layout.world_width(),
            world_height: layout.world_height(),
            world_scale: layout.scale(),
            debug_messages: false,
            seed: None,
            window: WindowSettings::default(),
        }
    }
}

/// Options of the macroquad window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct WindowSettings {
    /// Synchronise presentation with the display refresh rate.
    pub(crate) vsync: bool,
    /// Log frame timings once per second.
    pub(crate) show_fps: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            vsync: true,
            show_fps: false,
        }
    }
}

/// Values given on the command line, applied on top of the settings file.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Overrides {
    pub(crate) shoots: Option<u32>,
    pub(crate) worlds: Option<u32>,
    pub(crate) scale: Option<f32>,
    pub(crate) seed: Option<u64>,
    pub(crate) debug: bool,
    pub(crate) no_vsync: bool,
    pub(crate) show_fps: bool,
}

impl Settings {
    /// Reads settings from a TOML file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        let settings = Self::parse(&contents)
            .with_context(|| format!("failed to parse settings in {}", path.display()))?;
        info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies command-line values over the current ones.
    pub(crate) fn apply(&mut self, overrides: Overrides) {
        if let Some(shoots) = overrides.shoots {
            self.grove.shoot_count = shoots;
        }
        if let Some(worlds) = overrides.worlds {
            self.worlds = worlds;
        }
        if let Some(scale) = overrides.scale {
            self.world_scale = scale;
        }
        if overrides.seed.is_some() {
            self.seed = overrides.seed;
        }
        self.debug_messages |= overrides.debug;
        if overrides.no_vsync {
            self.window.vsync = false;
        }
        self.window.show_fps |= overrides.show_fps;
    }

    /// Rejects settings that cannot produce a running grove.
    pub(crate) fn validate(&self) -> Result<()> {
        ensure!(self.worlds > 0, "at least one world is required");
        self.grove.validate().context("invalid grove settings")?;
        let _layout = self.layout()?;
        Ok(())
    }

    /// Geometry of every world.
    pub(crate) fn layout(&self) -> Result<Layout> {
        Layout::new(self.world_width, self.world_height, self.world_scale)
            .context("invalid world geometry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pet_panda_core::Vitals;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = Settings::parse("").expect("empty settings parse");

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.grove.shoot_count, 5);
        assert_eq!(settings.world_width, 360.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let settings = Settings::parse(
            r#"
            worlds = 2
            seed = 42

            [grove]
            shoot_count = 3

            [grove.shoot]
            max_segments = 5

            [window]
            vsync = false
            "#,
        )
        .expect("partial settings parse");

        assert_eq!(settings.worlds, 2);
        assert_eq!(settings.seed, Some(42));
        assert_eq!(settings.grove.shoot_count, 3);
        assert_eq!(settings.grove.shoot.max_segments, 5);
        assert_eq!(settings.grove.shoot.min_segments, 1);
        assert_eq!(settings.grove.tick_period_ms, 1_000);
        assert!(!settings.window.vsync);
        assert!(!settings.window.show_fps);
    }

    #[test]
    fn starting_needs_come_from_the_file() {
        let settings = Settings::parse(
            r#"
            [grove.initial_vitals]
            hunger = 40
            "#,
        )
        .expect("vitals parse");

        assert_eq!(settings.grove.initial_vitals, Vitals::new(40, 0, 0));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(Settings::parse("worlds = \"many\"").is_err());
    }

    #[test]
    fn command_line_wins_over_the_file() {
        let mut settings = Settings {
            seed: Some(1),
            ..Settings::default()
        };

        settings.apply(Overrides {
            shoots: Some(8),
            scale: Some(2.0),
            seed: Some(7),
            debug: true,
            no_vsync: true,
            ..Overrides::default()
        });

        assert_eq!(settings.grove.shoot_count, 8);
        assert_eq!(settings.world_scale, 2.0);
        assert_eq!(settings.seed, Some(7));
        assert!(settings.debug_messages);
        assert!(!settings.window.vsync);
        assert_eq!(settings.worlds, 1);
    }

    #[test]
    fn absent_flags_leave_the_file_alone() {
        let mut settings = Settings {
            seed: Some(3),
            debug_messages: true,
            ..Settings::default()
        };

        settings.apply(Overrides::default());

        assert_eq!(settings.seed, Some(3));
        assert!(settings.debug_messages);
        assert!(settings.window.vsync);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let no_worlds = Settings {
            worlds: 0,
            ..Settings::default()
        };
        let flat = Settings {
            world_scale: 0.0,
            ..Settings::default()
        };
        let mut empty = Settings::default();
        empty.apply(Overrides {
            shoots: Some(0),
            ..Overrides::default()
        });

        assert!(no_worlds.validate().is_err());
        assert!(flat.validate().is_err());
        assert!(empty.validate().is_err());
    }
}
