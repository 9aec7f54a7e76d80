use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use atrium::app::{self, WindowInitError};
use atrium::scene::Scene;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;

    let (scene, asset_root) = match &options.scene_path {
        Some(path) => {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("failed to read scene file {path}"))?;
            let scene = Scene::from_xml(&xml)
                .with_context(|| format!("failed to parse scene file {path}"))?;
            let root = Path::new(path)
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (scene, root)
        }
        None => (Scene::demo(), PathBuf::from(".")),
    };

    print_summary(&scene);
    if options.summary_only {
        return Ok(());
    }

    match app::run_interactive(scene, asset_root) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Running in summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn print_summary(scene: &Scene) {
    println!(
        "Loaded scene with {} objects ({} spotlights)",
        scene.objects.len(),
        scene.lights.spots.len()
    );
    for object in &scene.objects {
        println!(" - {} ({})", object.name, object.kind.label());
    }
    let point = &scene.lights.point;
    println!(
        "Point light at ({:.2}, {:.2}, {:.2}), orbit speed {:.2} rad/s",
        point.position.x, point.position.y, point.position.z, scene.lights.orbit_speed
    );
    for spot in &scene.lights.spots {
        println!(
            "Spotlight at ({:.2}, {:.2}, {:.2}), cone {:.1}..{:.1} deg",
            spot.position.x,
            spot.position.y,
            spot.position.z,
            spot.cutoff_deg,
            spot.outer_cutoff_deg
        );
    }
}

struct CliOptions {
    scene_path: Option<String>,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut options = Self {
            scene_path: None,
            summary_only: false,
        };
        for arg in env::args().skip(1) {
            match arg.as_str() {
                "--summary-only" => options.summary_only = true,
                other if other.starts_with("--") => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: atrium [scene.xml] [--summary-only]"
                    ));
                }
                path => {
                    if options.scene_path.is_some() {
                        return Err(anyhow!(
                            "Multiple scene files given. Usage: atrium [scene.xml] [--summary-only]"
                        ));
                    }
                    options.scene_path = Some(path.to_string());
                }
            }
        }
        Ok(options)
    }
}
