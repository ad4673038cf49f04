use assert_cmd::Command;
use image::{DynamicImage, Rgba, RgbaImage};
use predicates::prelude::*;
use tempfile::TempDir;

fn backdrop(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("backdrop").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("REMOVE_BG_API_KEY")
        .env_remove("BACKDROP_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn write_png(dir: &TempDir, name: &str, width: u32, height: u32) {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([240, 240, 240, 255])));
    img.save(dir.path().join(name)).unwrap();
}

#[test]
fn plan_prints_bounded_dimensions() {
    let dir = TempDir::new().unwrap();
    backdrop(&dir)
        .args(["plan", "1600", "1200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("800x600"));
}

#[test]
fn plan_honours_max_flag() {
    let dir = TempDir::new().unwrap();
    backdrop(&dir)
        .args(["plan", "3000", "998", "--max", "800"])
        .assert()
        .success()
        .stdout(predicate::str::contains("800x266"));
}

#[test]
fn plan_rejects_zero_dimension_with_codec_exit_code() {
    let dir = TempDir::new().unwrap();
    backdrop(&dir).args(["plan", "0", "100"]).assert().code(4);
}

#[test]
fn inspect_reports_metadata_as_json() {
    let dir = TempDir::new().unwrap();
    write_png(&dir, "wide.png", 1000, 400);

    backdrop(&dir)
        .args(["inspect", "wide.png", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"width\": 1000"))
        .stdout(predicate::str::contains("image/png"));
}

#[test]
fn process_locally_writes_four_images() {
    let dir = TempDir::new().unwrap();
    write_png(&dir, "me.png", 120, 80);

    backdrop(&dir)
        .args(["process", "me.png", "--local", "--out-dir", "out", "--blur", "4"])
        .assert()
        .success();

    for name in ["original.png", "matte.png", "background.png", "composite.png"] {
        let path = dir.path().join("out").join(name);
        assert!(path.exists(), "{name} was not written");
        assert_eq!(image::image_dimensions(&path).unwrap(), (120, 80));
    }
}

#[test]
fn process_without_api_key_is_config_error() {
    let dir = TempDir::new().unwrap();
    write_png(&dir, "me.png", 16, 16);

    backdrop(&dir)
        .args(["process", "me.png"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("REMOVE_BG_API_KEY"));
}

#[test]
fn process_oversize_upload_is_validation_error() {
    let dir = TempDir::new().unwrap();
    let mut bytes = vec![0u8; 10 * 1024 * 1024 + 512 * 1024];
    bytes[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
    std::fs::write(dir.path().join("huge.jpg"), bytes).unwrap();

    backdrop(&dir)
        .args(["process", "huge.jpg", "--local"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("file too large"));
}

#[test]
fn json_failure_prints_error_report() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.png"), b"plain text, not a picture").unwrap();

    backdrop(&dir)
        .args(["process", "notes.png", "--local", "--json"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"kind\": \"validation\""))
        .stdout(predicate::str::contains("unsupported file type"));
}

#[test]
fn explicit_missing_config_is_config_error() {
    let dir = TempDir::new().unwrap();
    backdrop(&dir)
        .args(["--config", "nope.toml", "plan", "10", "10"])
        .assert()
        .code(3);
}

#[test]
fn config_file_sets_max_dimension() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("backdrop.toml"), "[pipeline]\nmax_dimension = 400\nfallback_dimension = 400\n")
        .unwrap();

    backdrop(&dir)
        .args(["plan", "1600", "1200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("400x300"));
}
