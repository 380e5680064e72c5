use glam::Vec3;

/// Errors raised while decoding palette design tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaletteError {
    #[error("color token '{0}' must look like #rrggbb or #rgb")]
    Malformed(String),
    #[error("color token '{token}' contains a non-hex digit")]
    NotHex { token: String },
}

/// Three base hues the nebula blends between.
///
/// `color_a` and `color_b` form the body of the cloud, `color_c` lights the
/// brightest cores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub color_a: Vec3,
    pub color_b: Vec3,
    pub color_c: Vec3,
}

impl Palette {
    pub fn new(color_a: Vec3, color_b: Vec3, color_c: Vec3) -> Self {
        Self {
            color_a,
            color_b,
            color_c,
        }
    }
}

impl Default for Palette {
    /// Sky blue, violet, and rose, each slightly darkened after decoding to
    /// linear light.
    fn default() -> Self {
        Self {
            color_a: srgb_to_linear(rgb8(0x0e, 0xa5, 0xe9)) * 0.7,
            color_b: srgb_to_linear(rgb8(0xa8, 0x55, 0xf7)) * 0.8,
            color_c: srgb_to_linear(rgb8(0xfb, 0x71, 0x85)) * 0.7,
        }
    }
}

/// Decodes sRGB-encoded channels to linear light.
///
/// Hex design tokens are sRGB; the shader blends in linear space.
pub fn srgb_to_linear(color: Vec3) -> Vec3 {
    let decode = |channel: f32| {
        if channel < 0.04045 {
            channel * 0.077_399_38
        } else {
            (channel * 0.947_867_3 + 0.052_132_7).powf(2.4)
        }
    };
    Vec3::new(decode(color.x), decode(color.y), decode(color.z))
}

fn rgb8(r: u8, g: u8, b: u8) -> Vec3 {
    Vec3::new(r as f32, g as f32, b as f32) / 255.0
}

/// Parses `#rrggbb` or `#rgb` (leading `#` optional) into `[0, 1]` channels.
pub fn parse_hex(token: &str) -> Result<Vec3, PaletteError> {
    let trimmed = token.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(PaletteError::NotHex {
            token: token.to_string(),
        });
    }

    let channel = |range: std::ops::Range<usize>| -> Result<u8, PaletteError> {
        u8::from_str_radix(&digits[range], 16).map_err(|_| PaletteError::NotHex {
            token: token.to_string(),
        })
    };

    match digits.len() {
        6 => Ok(rgb8(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        3 => {
            // #abc expands to #aabbcc
            let expand = |value: u8| value * 17;
            Ok(rgb8(
                expand(channel(0..1)?),
                expand(channel(1..2)?),
                expand(channel(2..3)?),
            ))
        }
        _ => Err(PaletteError::Malformed(token.to_string())),
    }
}
