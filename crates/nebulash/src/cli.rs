use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use renderer::ColorSpaceMode;

#[derive(Parser, Debug)]
#[command(
    name = "nebulash",
    author,
    version,
    about = "Animated nebula backdrop",
    arg_required_else_help = false,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Config file to load instead of the default location.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Backdrop size (e.g. `1280x720`); the background fills the output when unset.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Frame-rate cap (0 = uncapped).
    #[arg(long, value_name = "FPS", value_parser = parse_fps)]
    pub fps: Option<f32>,

    /// Render a single still frame at this time in seconds instead of animating.
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub still: Option<f32>,

    /// Open a regular window instead of the desktop background layer.
    #[arg(long)]
    pub windowed: bool,

    /// With `--windowed`, keep the window at the bottom and let pointer input
    /// pass through it.
    #[arg(long)]
    pub click_through: bool,

    /// Output color space handling: `auto`, `gamma`, or `linear`.
    #[arg(long, value_name = "MODE", value_parser = parse_color_space)]
    pub color_space: Option<ColorSpaceMode>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render one frame on the CPU and write it as a PNG.
    Export(ExportArgs),
    /// Print where the config file is looked up.
    Where,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Destination PNG file.
    #[arg(long, short, value_name = "PATH")]
    pub output: PathBuf,

    /// Field time in seconds; defaults to the config's `still_time`, else 0.
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub time: Option<f32>,

    /// Image size (e.g. `1920x1080`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Config file to load instead of the default location.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1920x1080".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{}'", width.trim()))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{}'", height.trim()))?;

    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

pub fn parse_fps(value: &str) -> Result<f32, String> {
    let fps: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid FPS '{value}'"))?;
    if !fps.is_finite() || fps < 0.0 {
        return Err("FPS must be a non-negative number".to_string());
    }
    Ok(fps)
}

pub fn parse_seconds(value: &str) -> Result<f32, String> {
    let seconds: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid time '{value}'; expected seconds"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err("time must be a non-negative number of seconds".to_string());
    }
    Ok(seconds)
}

pub fn parse_color_space(value: &str) -> Result<ColorSpaceMode, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("color space must not be empty".to_string());
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "auto" => Ok(ColorSpaceMode::Auto),
        "gamma" | "srgb-off" => Ok(ColorSpaceMode::Gamma),
        "linear" | "srgb" => Ok(ColorSpaceMode::Linear),
        other => Err(format!(
            "unknown color space '{other}'; expected auto, gamma, or linear"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_accepts_common_separators() {
        assert_eq!(parse_size("1920x1080"), Ok((1920, 1080)));
        assert_eq!(parse_size(" 800 X 600 "), Ok((800, 600)));
        assert_eq!(parse_size("640×480"), Ok((640, 480)));
    }

    #[test]
    fn size_rejects_zero_and_garbage() {
        assert!(parse_size("0x1080").is_err());
        assert!(parse_size("1920").is_err());
        assert!(parse_size("widexhigh").is_err());
    }

    #[test]
    fn fps_and_seconds_must_be_non_negative() {
        assert_eq!(parse_fps("0"), Ok(0.0));
        assert!(parse_fps("-1").is_err());
        assert!(parse_fps("inf").is_err());
        assert_eq!(parse_seconds("12.5"), Ok(12.5));
        assert!(parse_seconds("-3").is_err());
    }

    #[test]
    fn color_space_aliases() {
        assert_eq!(parse_color_space("GAMMA"), Ok(ColorSpaceMode::Gamma));
        assert_eq!(parse_color_space("srgb"), Ok(ColorSpaceMode::Linear));
        assert!(parse_color_space("").is_err());
        assert!(parse_color_space("hdr").is_err());
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "nebulash",
            "--size",
            "800x600",
            "--fps",
            "30",
            "--click-through",
            "--color-space",
            "linear",
        ])
        .expect("valid flags");
        assert!(cli.command.is_none());
        assert_eq!(cli.run.size, Some((800, 600)));
        assert_eq!(cli.run.fps, Some(30.0));
        assert!(cli.run.click_through);
        assert_eq!(cli.run.color_space, Some(ColorSpaceMode::Linear));
    }

    #[test]
    fn export_subcommand_parses() {
        let cli = Cli::try_parse_from([
            "nebulash", "export", "--output", "out.png", "--time", "4", "--size", "64x32",
        ])
        .expect("valid export");
        match cli.command {
            Some(Command::Export(args)) => {
                assert_eq!(args.output, PathBuf::from("out.png"));
                assert_eq!(args.time, Some(4.0));
                assert_eq!(args.size, Some((64, 32)));
                assert!(args.config.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_flags_are_rejected_before_subcommands() {
        let err = Cli::try_parse_from(["nebulash", "--fps", "5", "export", "-o", "x.png"])
            .expect_err("run flags do not apply to export");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn windowed_flag_parses() {
        let cli = Cli::try_parse_from(["nebulash", "--windowed"]).expect("valid flags");
        assert!(cli.run.windowed);
        assert!(!Cli::try_parse_from(["nebulash"]).expect("no flags").run.windowed);
    }

    #[test]
    fn export_requires_output() {
        assert!(Cli::try_parse_from(["nebulash", "export"]).is_err());
    }
}
