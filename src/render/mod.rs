mod gpu;
mod shader;
mod uniforms;

pub use gpu::Renderer;
pub use uniforms::{CameraParams, GlobalUniform, InstanceRaw, ObjectUniform, SpotUniform, MAX_SPOTS};
