//! Domain-warped simplex noise and the nebula color function built on it.
//!
//! The functions mirror the fragment shader in `renderer::compile` line for
//! line, in `f32`, so CPU and GPU frames agree to within float noise.

use glam::{Mat2, Vec2, Vec3};

use crate::palette::Palette;

/// Simplex skew factor, `(sqrt(3) - 1) / 2`.
const SKEW: f32 = 0.366_025_404;
/// Simplex unskew factor, `(3 - sqrt(3)) / 6`.
const UNSKEW: f32 = 0.211_324_865;
const NOISE_SCALE: f32 = 70.0;

const FBM_OCTAVES: usize = 6;
const FBM_AMPLITUDE: f32 = 0.55;
/// Per-octave rotation/stretch, column-major like GLSL's `mat2(1.6, 1.2, -1.2, 1.6)`.
const OCTAVE_TRANSFORM: Mat2 = Mat2::from_cols_array(&[1.6, 1.2, -1.2, 1.6]);

/// Factor applied to elapsed seconds before any drift term sees them.
pub const TIME_SCALE: f32 = 0.05;
const WARP_STRENGTH: f32 = 0.25;

const VIGNETTE_OUTER: f32 = 1.2;
const VIGNETTE_INNER: f32 = 0.1;

const STAR_FREQUENCY: f32 = 40.0;
const STAR_DRIFT: f32 = 2.0;
const STAR_SHARPNESS: i32 = 20;
const STAR_GAIN: f32 = 0.6;

/// GLSL `smoothstep`, including the reversed-edge form used by the vignette.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn fract(v: Vec2) -> Vec2 {
    v - v.floor()
}

/// Pseudo-random gradient for a lattice corner, each component in `[-1, 1]`.
#[allow(clippy::excessive_precision)]
pub fn hash2(p: Vec2) -> Vec2 {
    let projected = Vec2::new(
        p.dot(Vec2::new(127.1, 311.7)),
        p.dot(Vec2::new(269.5, 183.3)),
    );
    let waves = Vec2::new(projected.x.sin(), projected.y.sin());
    Vec2::splat(-1.0) + 2.0 * fract(waves * 43758.5453123)
}

/// 2D simplex gradient noise, roughly in `[-1, 1]`.
pub fn simplex_noise(p: Vec2) -> f32 {
    let cell = (p + Vec2::splat((p.x + p.y) * SKEW)).floor();
    let a = p - cell + Vec2::splat((cell.x + cell.y) * UNSKEW);
    let step = if a.x > a.y {
        Vec2::new(1.0, 0.0)
    } else {
        Vec2::new(0.0, 1.0)
    };
    let b = a - step + Vec2::splat(UNSKEW);
    let c = a - Vec2::ONE + Vec2::splat(2.0 * UNSKEW);

    let corners = [(a, cell), (b, cell + step), (c, cell + Vec2::ONE)];
    let sum: f32 = corners
        .iter()
        .map(|&(offset, corner)| {
            let h = (0.5 - offset.dot(offset)).max(0.0);
            let h2 = h * h;
            h2 * h2 * offset.dot(hash2(corner))
        })
        .sum();
    sum * NOISE_SCALE
}

/// Six octaves of [`simplex_noise`], amplitude 0.55 halving per octave.
pub fn fbm(mut p: Vec2) -> f32 {
    let mut value = 0.0;
    let mut amplitude = FBM_AMPLITUDE;
    for _ in 0..FBM_OCTAVES {
        value += amplitude * simplex_noise(p);
        p = OCTAVE_TRANSFORM * p;
        amplitude *= 0.5;
    }
    value
}

/// Warped two-band fbm intensity in `[0, 1]` at sample `p` and time `seconds`.
pub fn field_intensity(p: Vec2, seconds: f32) -> f32 {
    let t = seconds * TIME_SCALE;
    let angle = p.y.atan2(p.x);
    let q = p + WARP_STRENGTH * Vec2::new((angle + t * 0.7).cos(), (angle * 0.7 - t).sin());

    let n1 = fbm(q * 1.5 + Vec2::new(t, -t));
    let n2 = fbm(q * 3.0 + Vec2::new(-t * 0.7, t * 0.5));
    smoothstep(0.0, 1.0, 0.55 * n1 + 0.45 * n2)
}

/// Blends A toward B by `n`, then toward C where `n` is high (bright cores).
pub fn compose(palette: &Palette, n: f32) -> Vec3 {
    let base = palette.color_a.lerp(palette.color_b, n);
    base.lerp(palette.color_c, smoothstep(0.4, 0.95, n))
}

/// Radial attenuation: 1 inside radius 0.1, 0 from radius 1.2 outward.
pub fn vignette(radius: f32) -> f32 {
    smoothstep(VIGNETTE_OUTER, VIGNETTE_INNER, radius)
}

/// Nebula color before star sparkle is added.
pub fn nebula_color(p: Vec2, seconds: f32, palette: &Palette) -> Vec3 {
    compose(palette, field_intensity(p, seconds)) * vignette(p.length())
}

/// Sparse twinkling highlight added on top of the vignetted nebula.
pub fn star_sparkle(p: Vec2, seconds: f32) -> f32 {
    let t = seconds * TIME_SCALE;
    let n = simplex_noise(p * STAR_FREQUENCY + Vec2::splat(t * STAR_DRIFT));
    n.max(0.0).powi(STAR_SHARPNESS) * STAR_GAIN
}

/// Final color of screen sample `p` at `seconds`, every channel in `[0, 1]`.
pub fn shade(p: Vec2, seconds: f32, palette: &Palette) -> Vec3 {
    let color = nebula_color(p, seconds, palette) + Vec3::splat(star_sparkle(p, seconds));
    color.clamp(Vec3::ZERO, Vec3::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn smoothstep_handles_reversed_edges() {
        assert_eq!(smoothstep(1.2, 0.1, 1.5), 0.0);
        assert_eq!(smoothstep(1.2, 0.1, 0.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn hash2_stays_in_unit_range() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..2_000 {
            let p = Vec2::new(rng.gen_range(-500.0..500.0), rng.gen_range(-500.0..500.0));
            let g = hash2(p.floor());
            assert!((-1.0..=1.0).contains(&g.x), "x out of range: {g:?}");
            assert!((-1.0..=1.0).contains(&g.y), "y out of range: {g:?}");
        }
    }

    #[test]
    fn noise_vanishes_on_lattice_origin() {
        assert_eq!(simplex_noise(Vec2::ZERO), 0.0);
    }

    #[test]
    fn fbm_is_pure() {
        let p = Vec2::new(0.37, -1.21);
        assert_eq!(fbm(p).to_bits(), fbm(p).to_bits());
        assert_eq!(
            field_intensity(p, 3.5).to_bits(),
            field_intensity(p, 3.5).to_bits()
        );
    }

    #[test]
    fn outside_vignette_only_stars_remain() {
        let palette = Palette::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1_000 {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let radius = rng.gen_range(1.2001..3.0);
            let p = Vec2::new(angle.cos(), angle.sin()) * radius;
            let t = rng.gen_range(0.0..600.0);

            assert_eq!(nebula_color(p, t, &palette), Vec3::ZERO);
            let expected = star_sparkle(p, t).min(1.0);
            assert_eq!(shade(p, t, &palette), Vec3::splat(expected));
        }
    }

    #[test]
    fn color_is_continuous_in_time() {
        let palette = Palette::default();
        let p = Vec2::new(0.3, 0.2);
        let dt = 1.0e-3;
        let mut previous = shade(p, 0.0, &palette);
        for step in 1..=10_000 {
            let current = shade(p, step as f32 * dt, &palette);
            let jump = (current - previous).abs().max_element();
            assert!(jump < 0.01, "jump of {jump} at step {step}");
            previous = current;
        }
    }

    #[test]
    fn every_channel_is_clamped() {
        let palette = Palette::default();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..10_000 {
            let p = Vec2::new(rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0));
            let t = rng.gen_range(0.0..10_000.0);
            let color = shade(p, t, &palette);
            for channel in color.to_array() {
                assert!((0.0..=1.0).contains(&channel), "{color:?} at {p:?}, t={t}");
            }
        }
    }

    #[test]
    fn saturated_palette_still_clamps() {
        let palette = Palette::new(Vec3::ONE, Vec3::splat(2.0), Vec3::splat(3.0));
        let color = shade(Vec2::new(0.01, 0.02), 1.0, &palette);
        assert_eq!(color, Vec3::ONE);
    }

    #[test]
    fn screen_center_at_start_is_palette_blend_without_stars() {
        let palette = Palette::default();
        let center = Vec2::ZERO;

        assert_eq!(star_sparkle(center, 0.0), 0.0);
        assert_eq!(vignette(0.0), 1.0);

        let n = field_intensity(center, 0.0);
        assert!((0.0..=1.0).contains(&n));
        let color = shade(center, 0.0, &palette);
        let expected = compose(&palette, n);
        assert!((color - expected).abs().max_element() < 1e-6);

        let lo = palette.color_a.min(palette.color_b).min(palette.color_c);
        let hi = palette.color_a.max(palette.color_b).max(palette.color_c);
        assert!(color.cmpge(lo - Vec3::splat(1e-6)).all());
        assert!(color.cmple(hi + Vec3::splat(1e-6)).all());
    }

    #[test]
    fn octave_transform_matches_glsl_column_order() {
        let p = OCTAVE_TRANSFORM * Vec2::new(1.0, 0.0);
        assert_eq!(p, Vec2::new(1.6, 1.2));
        let p = OCTAVE_TRANSFORM * Vec2::new(0.0, 1.0);
        assert_eq!(p, Vec2::new(-1.2, 1.6));
    }
}
