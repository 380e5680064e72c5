//! TOML configuration for the nebula backdrop: palette tokens and render knobs.
//!
//! Every key is optional. An empty file yields the reference palette, an
//! uncapped animated backdrop, and a black fallback.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use nebula::{parse_hex, srgb_to_linear, Palette, PaletteError, Vec3};
use serde::de::{self, Deserializer};
use serde::Deserialize;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("palette.{slot}: {source}")]
    Palette {
        slot: &'static str,
        #[source]
        source: PaletteError,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackdropConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub palette: PaletteConfig,
    #[serde(default)]
    pub render: RenderSettings,
}

impl Default for BackdropConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            palette: PaletteConfig::default(),
            render: RenderSettings::default(),
        }
    }
}

/// A design token: either a bare `"#rrggbb"` or `{ hex = "...", scale = 0.7 }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColorToken {
    Hex(String),
    Scaled {
        hex: String,
        #[serde(default = "unit_scale")]
        scale: f32,
    },
}

impl ColorToken {
    pub fn scaled(hex: impl Into<String>, scale: f32) -> Self {
        ColorToken::Scaled {
            hex: hex.into(),
            scale,
        }
    }

    pub fn hex(&self) -> &str {
        match self {
            ColorToken::Hex(hex) | ColorToken::Scaled { hex, .. } => hex,
        }
    }

    pub fn scale(&self) -> f32 {
        match self {
            ColorToken::Hex(_) => 1.0,
            ColorToken::Scaled { scale, .. } => *scale,
        }
    }

    /// Encoded channels times the scale, for colors shown as-is.
    pub fn to_rgb(&self) -> Result<Vec3, PaletteError> {
        Ok(parse_hex(self.hex())? * self.scale())
    }

    /// Linear-light channels times the scale, for colors the shader blends.
    pub fn to_linear(&self) -> Result<Vec3, PaletteError> {
        Ok(srgb_to_linear(parse_hex(self.hex())?) * self.scale())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaletteConfig {
    #[serde(default = "default_color_a")]
    pub a: ColorToken,
    #[serde(default = "default_color_b")]
    pub b: ColorToken,
    #[serde(default = "default_color_c")]
    pub c: ColorToken,
    #[serde(default = "default_fallback")]
    pub fallback: ColorToken,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            a: default_color_a(),
            b: default_color_b(),
            c: default_color_c(),
            fallback: default_fallback(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpaceSetting {
    #[default]
    Auto,
    Gamma,
    Linear,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub fps: Option<f32>,
    #[serde(default)]
    pub color_space: ColorSpaceSetting,
    #[serde(default)]
    pub click_through: bool,
    /// Show a regular window instead of the background layer.
    #[serde(default)]
    pub windowed: bool,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub still_time: Option<Duration>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn unit_scale() -> f32 {
    1.0
}

fn default_color_a() -> ColorToken {
    ColorToken::scaled("#0ea5e9", 0.7)
}

fn default_color_b() -> ColorToken {
    ColorToken::scaled("#a855f7", 0.8)
}

fn default_color_c() -> ColorToken {
    ColorToken::scaled("#fb7185", 0.7)
}

fn default_fallback() -> ColorToken {
    ColorToken::Hex("#000000".into())
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl BackdropConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: BackdropConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading backdrop config");
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        for (slot, token) in self.palette.slots() {
            let scale = token.scale();
            if !scale.is_finite() || scale < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "palette.{slot} scale must be a non-negative number"
                )));
            }
            token
                .to_rgb()
                .map_err(|source| ConfigError::Palette { slot, source })?;
        }

        if let Some(fps) = self.render.fps {
            if fps.is_nan() || fps < 0.0 {
                return Err(ConfigError::Invalid("render.fps must be >= 0".into()));
            }
        }

        Ok(())
    }

    /// The three blend colors, decoded to linear light and scaled.
    pub fn palette(&self) -> Result<Palette, ConfigError> {
        let color = |slot: &'static str, token: &ColorToken| {
            token
                .to_linear()
                .map_err(|source| ConfigError::Palette { slot, source })
        };
        Ok(Palette::new(
            color("a", &self.palette.a)?,
            color("b", &self.palette.b)?,
            color("c", &self.palette.c)?,
        ))
    }

    /// The degraded-mode fill, taken as encoded so it shows as written.
    pub fn fallback_color(&self) -> Result<Vec3, ConfigError> {
        self.palette
            .fallback
            .to_rgb()
            .map_err(|source| ConfigError::Palette {
                slot: "fallback",
                source,
            })
    }

    /// FPS cap, treating `0` as uncapped.
    pub fn target_fps(&self) -> Option<f32> {
        self.render.fps.filter(|fps| *fps > 0.0)
    }
}

impl PaletteConfig {
    fn slots(&self) -> [(&'static str, &ColorToken); 4] {
        [
            ("a", &self.a),
            ("b", &self.b),
            ("c", &self.c),
            ("fallback", &self.fallback),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
version = 1

[palette]
a = { hex = "#0ea5e9", scale = 0.7 }
b = "#a855f7"
c = { hex = "#fb7185" }
fallback = "#020617"

[render]
fps = 30
color_space = "linear"
click_through = true
windowed = true
still_time = "1m 30s"
"##;

    #[test]
    fn parses_sample_config() {
        let config = BackdropConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.version, 1);
        assert_eq!(config.palette.a.scale(), 0.7);
        assert_eq!(config.palette.b, ColorToken::Hex("#a855f7".into()));
        assert_eq!(config.palette.c.scale(), 1.0);
        assert_eq!(config.render.color_space, ColorSpaceSetting::Linear);
        assert!(config.render.click_through);
        assert!(config.render.windowed);
        assert_eq!(config.render.still_time, Some(Duration::from_secs(90)));
        assert_eq!(config.target_fps(), Some(30.0));
    }

    #[test]
    fn empty_file_uses_reference_palette() {
        let config = BackdropConfig::from_toml_str("").unwrap();
        let palette = config.palette().unwrap();
        let reference = Palette::default();
        assert!((palette.color_a - reference.color_a).length() < 1e-6);
        assert!((palette.color_b - reference.color_b).length() < 1e-6);
        assert!((palette.color_c - reference.color_c).length() < 1e-6);
        assert_eq!(config.fallback_color().unwrap(), Vec3::ZERO);
        assert_eq!(config.target_fps(), None);
        assert_eq!(config.render.still_time, None);
        assert_eq!(config.render.color_space, ColorSpaceSetting::Auto);
        assert!(!config.render.windowed);
    }

    #[test]
    fn blend_tokens_decode_but_fallback_stays_encoded() {
        let config =
            BackdropConfig::from_toml_str("[palette]\na = \"#808080\"\nfallback = \"#808080\"")
                .unwrap();
        let palette = config.palette().unwrap();
        assert!((palette.color_a.x - 0.215_861).abs() < 1e-5);
        assert!((config.fallback_color().unwrap().x - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn zero_fps_means_uncapped() {
        let config = BackdropConfig::from_toml_str("[render]\nfps = 0").unwrap();
        assert_eq!(config.target_fps(), None);
    }

    #[test]
    fn still_time_accepts_plain_seconds() {
        let config = BackdropConfig::from_toml_str("[render]\nstill_time = 2.5").unwrap();
        assert_eq!(config.render.still_time, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn rejects_malformed_hex() {
        let err = BackdropConfig::from_toml_str("[palette]\na = \"#12\"").unwrap_err();
        assert!(matches!(err, ConfigError::Palette { slot: "a", .. }));
    }

    #[test]
    fn rejects_negative_scale_and_fps() {
        let err =
            BackdropConfig::from_toml_str("[palette]\nb = { hex = \"#fff\", scale = -1 }")
                .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = BackdropConfig::from_toml_str("[render]\nfps = -5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = BackdropConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_duration() {
        let err =
            BackdropConfig::from_toml_str("[render]\nstill_time = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
