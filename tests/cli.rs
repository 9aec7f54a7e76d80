use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_scene() -> NamedTempFile {
    let scene = r#"<scene>
  <object>
    <name>Aloe</name>
    <kind>foliage</kind>
    <mesh>models/aloevera.obj</mesh>
    <grid>
      <rows>3</rows>
      <count>12</count>
    </grid>
  </object>
  <object>
    <name>Room</name>
    <mesh>models/room.obj</mesh>
    <position>0 2 0</position>
  </object>
  <light>
    <kind>point</kind>
    <position>1 1 1</position>
  </light>
  <light>
    <kind>spot</kind>
    <position>-6 1.3 2</position>
  </light>
</scene>
"#;
    let mut tmp = NamedTempFile::new().expect("temp scene file");
    tmp.write_all(scene.as_bytes()).expect("write scene");
    tmp
}

#[test]
fn summary_describes_a_scene_file() {
    let scene = write_scene();
    let mut cmd = Command::cargo_bin("atrium").expect("binary exists");
    cmd.arg(scene.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 2 objects (1 spotlights)"))
        .stdout(contains(" - Aloe (foliage)"))
        .stdout(contains(" - Room (surface)"))
        .stdout(contains("Point light at (1.00, 1.00, 1.00)"))
        .stdout(contains("Spotlight at (-6.00, 1.30, 2.00), cone 12.5..15.0 deg"));
}

#[test]
fn summary_falls_back_to_the_demo_scene() {
    let mut cmd = Command::cargo_bin("atrium").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 4 objects (3 spotlights)"))
        .stdout(contains(" - Aloe (foliage)"))
        .stdout(contains(" - GlassDoor (glass)"))
        .stdout(contains(" - LightBall (emitter)"));
}

#[test]
fn unknown_flags_are_rejected() {
    let mut cmd = Command::cargo_bin("atrium").expect("binary exists");
    cmd.arg("--bogus");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --bogus"));
}

#[test]
fn malformed_scene_files_are_reported() {
    let mut tmp = NamedTempFile::new().expect("temp scene file");
    tmp.write_all(b"<scene><object></object></scene>")
        .expect("write scene");
    let mut cmd = Command::cargo_bin("atrium").expect("binary exists");
    cmd.arg(tmp.path()).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("failed to parse scene file"));
}
