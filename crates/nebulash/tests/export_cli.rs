use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn nebulash(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_nebulash"));
    command.env("NEBULASH_CONFIG_DIR", config_dir);
    command
}

#[test]
fn export_writes_png_of_requested_size() {
    let root = TempDir::new().unwrap();
    let output = root.path().join("out").join("nebula.png");

    let status = nebulash(root.path())
        .args(["export", "--time", "12", "--size", "96x54", "--output"])
        .arg(&output)
        .status()
        .expect("failed to run nebulash export");
    assert!(status.success());

    let image = image::open(&output).expect("exported file is a PNG");
    assert_eq!((image.width(), image.height()), (96, 54));
}

#[test]
fn export_uses_palette_from_config_dir() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("config.toml"),
        "version = 1\n[palette]\na = \"#000000\"\nb = \"#000000\"\nc = \"#000000\"\n",
    )
    .unwrap();
    let output = root.path().join("dark.png");

    let status = nebulash(root.path())
        .args(["export", "--size", "32x32", "--output"])
        .arg(&output)
        .status()
        .expect("failed to run nebulash export");
    assert!(status.success());

    // With a black palette only the white star term remains, so every pixel is gray.
    let image = image::open(&output).unwrap().to_rgb8();
    for pixel in image.pixels() {
        let [r, g, b] = pixel.0;
        assert!(r == g && g == b, "colored pixel {:?}", pixel.0);
    }
}

#[test]
fn invalid_config_fails_with_non_zero_status() {
    let root = TempDir::new().unwrap();
    let config = root.path().join("bad.toml");
    fs::write(&config, "version = 7\n").unwrap();

    let output = nebulash(root.path())
        .args(["export", "--output"])
        .arg(root.path().join("never.png"))
        .arg("--config")
        .arg(&config)
        .output()
        .expect("failed to run nebulash export");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bad.toml"), "stderr: {stderr}");
    assert!(!root.path().join("never.png").exists());
}

#[test]
fn where_reports_config_location() {
    let root = TempDir::new().unwrap();
    let output = nebulash(root.path())
        .arg("where")
        .output()
        .expect("failed to run nebulash where");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let expected = root.path().join("config.toml");
    assert!(stdout.contains(&expected.display().to_string()), "stdout: {stdout}");
    assert!(stdout.contains("missing"));
}
