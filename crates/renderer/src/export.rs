//! Headless still-frame export through the CPU reference raster.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};
use nebula::{FrameUniforms, Palette, Resolution};

/// One frame to write to disk.
#[derive(Debug, Clone)]
pub struct StillExport {
    pub path: PathBuf,
    /// Elapsed time in seconds fed to the field.
    pub time: f32,
    pub size: (u32, u32),
    pub palette: Palette,
}

/// Renders `request` on the CPU and writes it as a PNG. Returns the path written.
pub fn export_still(request: &StillExport) -> Result<PathBuf> {
    let (width, height) = request.size;
    let uniforms = FrameUniforms::new(
        request.time,
        Resolution::new(width, height),
        request.palette,
    );
    let frame = nebula::raster::render(&uniforms)
        .ok_or_else(|| anyhow!("cannot export a {width}x{height} frame; both sides must be nonzero"))?;

    let image = RgbImage::from_raw(width, height, frame.to_rgb8())
        .ok_or_else(|| anyhow!("rendered buffer does not match {width}x{height}"))?;

    if let Some(parent) = request.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(&request.path, ImageFormat::Png)
        .with_context(|| format!("failed to write still frame to {}", request.path.display()))?;

    tracing::info!(
        path = %request.path.display(),
        width,
        height,
        time = request.time,
        "exported still frame"
    );
    Ok(request.path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(path: PathBuf, size: (u32, u32)) -> StillExport {
        StillExport {
            path,
            time: 12.0,
            size,
            palette: Palette::default(),
        }
    }

    #[test]
    fn writes_decodable_png_of_requested_size() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("frames").join("nebula.png");
        let written = export_still(&request(path.clone(), (64, 36))).expect("export");
        assert_eq!(written, path);

        let decoded = image::open(&path).expect("decode png").to_rgb8();
        assert_eq!(decoded.dimensions(), (64, 36));
    }

    #[test]
    fn exported_pixels_match_reference_raster() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("still.png");
        export_still(&request(path.clone(), (24, 16))).expect("export");

        let uniforms = FrameUniforms::new(12.0, Resolution::new(24, 16), Palette::default());
        let expected = nebula::raster::render(&uniforms).expect("frame").to_rgb8();
        let decoded = image::open(&path).expect("decode png").to_rgb8();
        assert_eq!(decoded.into_raw(), expected);
    }

    #[test]
    fn zero_sized_export_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("empty.png");
        assert!(export_still(&request(path.clone(), (0, 10))).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_path_reports_location() {
        let dir = tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").expect("write blocker");
        let path = blocker.join("still.png");

        let err = export_still(&request(path.clone(), (8, 8))).expect_err("should fail");
        assert!(format!("{err:#}").contains("blocker"));
    }
}
