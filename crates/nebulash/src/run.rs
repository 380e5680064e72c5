//! Turns CLI arguments and the config file into renderer work: the live
//! backdrop via `run`, or a single PNG via `export`. CLI flags take priority
//! over config values, which take priority over built-in defaults.

use std::path::Path;

use anyhow::{Context, Result};
use nebulaconfig::{BackdropConfig, ColorSpaceSetting};
use renderer::{
    export_still, ColorSpaceMode, Presentation, RenderPolicy, Renderer, RendererConfig,
    StillExport,
};
use tracing_subscriber::EnvFilter;

use crate::cli::{ExportArgs, RunArgs};
use crate::paths::AppPaths;

const DEFAULT_EXPORT_SIZE: (u32, u32) = (1920, 1080);

pub fn run(args: RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let renderer_config = build_renderer_config(&args, &config)?;
    tracing::info!(
        presentation = ?renderer_config.presentation,
        size = ?renderer_config.requested_size,
        policy = ?renderer_config.policy,
        color_space = %renderer_config.color_space,
        click_through = renderer_config.click_through,
        "launching nebula backdrop"
    );

    let mut renderer = Renderer::new(renderer_config);
    renderer.run()
}

pub fn export(args: ExportArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let request = StillExport {
        path: args.output,
        time: args
            .time
            .or_else(|| config.render.still_time.map(|time| time.as_secs_f32()))
            .unwrap_or(0.0),
        size: args.size.unwrap_or(DEFAULT_EXPORT_SIZE),
        palette: config.palette().context("invalid palette in config")?,
    };
    let path = export_still(&request)?;
    println!("{}", path.display());
    Ok(())
}

pub fn initialise_tracing() {
    let default_filter =
        "warn,nebulash=info,renderer=info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error,winit=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads `explicit`, else the default config file when present, else defaults.
fn load_config(explicit: Option<&Path>) -> Result<BackdropConfig> {
    if let Some(path) = explicit {
        return BackdropConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }

    let paths = match AppPaths::discover() {
        Ok(paths) => paths,
        Err(err) => {
            tracing::debug!(error = %err, "no config directory; using defaults");
            return Ok(BackdropConfig::default());
        }
    };
    let path = paths.config_file();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return Ok(BackdropConfig::default());
    }
    BackdropConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

fn build_renderer_config(args: &RunArgs, config: &BackdropConfig) -> Result<RendererConfig> {
    let defaults = RendererConfig::default();

    let still_time = args
        .still
        .or_else(|| config.render.still_time.map(|time| time.as_secs_f32()));
    let policy = match still_time {
        Some(time) => RenderPolicy::Still { time },
        None => RenderPolicy::Animate {
            target_fps: match args.fps {
                Some(fps) => (fps > 0.0).then_some(fps),
                None => config.target_fps(),
            },
        },
    };

    let presentation = if args.windowed || config.render.windowed {
        Presentation::Windowed
    } else {
        Presentation::Background
    };

    Ok(RendererConfig {
        surface_size: args.size.unwrap_or(defaults.surface_size),
        requested_size: args.size,
        presentation,
        palette: config.palette().context("invalid palette in config")?,
        fallback_color: config
            .fallback_color()
            .context("invalid fallback color in config")?,
        policy,
        color_space: args
            .color_space
            .unwrap_or_else(|| color_space_from_setting(config.render.color_space)),
        click_through: args.click_through || config.render.click_through,
        ..defaults
    })
}

fn color_space_from_setting(setting: ColorSpaceSetting) -> ColorSpaceMode {
    match setting {
        ColorSpaceSetting::Auto => ColorSpaceMode::Auto,
        ColorSpaceSetting::Gamma => ColorSpaceMode::Gamma,
        ColorSpaceSetting::Linear => ColorSpaceMode::Linear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula::Palette;
    use std::fs;
    use tempfile::tempdir;

    const CONFIG: &str = r##"
version = 1

[palette]
a = "#ff0000"
fallback = "#102030"

[render]
fps = 24
color_space = "linear"
click_through = true
"##;

    #[test]
    fn defaults_without_config() {
        let config = BackdropConfig::default();
        let renderer_config =
            build_renderer_config(&RunArgs::default(), &config).expect("defaults build");
        assert_eq!(renderer_config.surface_size, (1280, 720));
        assert_eq!(renderer_config.requested_size, None);
        assert_eq!(renderer_config.presentation, Presentation::Background);
        assert_eq!(renderer_config.policy, RenderPolicy::Animate { target_fps: None });
        assert_eq!(renderer_config.palette, Palette::default());
        assert_eq!(renderer_config.color_space, ColorSpaceMode::Auto);
        assert!(!renderer_config.click_through);
    }

    #[test]
    fn config_values_apply() {
        let config = BackdropConfig::from_toml_str(CONFIG).expect("config");
        let renderer_config =
            build_renderer_config(&RunArgs::default(), &config).expect("config build");
        assert_eq!(
            renderer_config.policy,
            RenderPolicy::Animate {
                target_fps: Some(24.0)
            }
        );
        assert!((renderer_config.palette.color_a - nebula::Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
        assert_eq!(renderer_config.color_space, ColorSpaceMode::Linear);
        assert!(renderer_config.click_through);
        assert!((renderer_config.fallback_color.x - 16.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn cli_flags_override_config() {
        let config = BackdropConfig::from_toml_str(CONFIG).expect("config");
        let args = RunArgs {
            size: Some((640, 480)),
            fps: Some(0.0),
            color_space: Some(ColorSpaceMode::Gamma),
            ..RunArgs::default()
        };
        let renderer_config = build_renderer_config(&args, &config).expect("override build");
        assert_eq!(renderer_config.surface_size, (640, 480));
        assert_eq!(renderer_config.requested_size, Some((640, 480)));
        assert_eq!(renderer_config.policy, RenderPolicy::Animate { target_fps: None });
        assert_eq!(renderer_config.color_space, ColorSpaceMode::Gamma);
    }

    #[test]
    fn windowed_comes_from_flag_or_config() {
        let args = RunArgs {
            windowed: true,
            ..RunArgs::default()
        };
        let from_flag =
            build_renderer_config(&args, &BackdropConfig::default()).expect("flag build");
        assert_eq!(from_flag.presentation, Presentation::Windowed);

        let config = BackdropConfig::from_toml_str("[render]\nwindowed = true").expect("config");
        let from_config =
            build_renderer_config(&RunArgs::default(), &config).expect("config build");
        assert_eq!(from_config.presentation, Presentation::Windowed);
    }

    #[test]
    fn still_flag_selects_still_policy() {
        let args = RunArgs {
            still: Some(12.0),
            fps: Some(30.0),
            ..RunArgs::default()
        };
        let renderer_config =
            build_renderer_config(&args, &BackdropConfig::default()).expect("still build");
        assert_eq!(renderer_config.policy, RenderPolicy::Still { time: 12.0 });
    }

    #[test]
    fn explicit_config_errors_carry_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        fs::write(&path, "version = 1\n[palette]\na = \"#zzzzzz\"\n").expect("write config");

        let err = load_config(Some(&path)).expect_err("invalid config");
        assert!(format!("{err:#}").contains("broken.toml"));
    }
}
