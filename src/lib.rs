//! Building blocks for a small fixed-scene 3-D viewer: an instanced
//! foliage grid, a six-plane room, a glass door and light-ball emitters,
//! lit by an orbiting point light and a set of camera-tracking spotlights.
//!
//! The scene is data (see [`scene::Scene`]); a single parameterized render
//! procedure in [`render::Renderer`] replaces the hardcoded per-variant
//! draw code the project grew out of.

pub mod app;
pub mod camera;
pub mod input;
pub mod lights;
pub mod obj;
pub mod render;
pub mod scene;

pub use camera::{FlyCamera, Movement};
pub use input::{InputState, KeyCode, NamedKey};
pub use lights::{Attenuation, LightRig, PointLight, Spotlight};
pub use obj::{load_obj_file, parse_obj, MeshData, Vertex};
pub use render::{CameraParams, Renderer};
pub use scene::{InstanceGrid, ObjectKind, Scene, SceneObject};
