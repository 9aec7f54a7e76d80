use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

use crate::lights::LightRig;
use crate::scene::SceneObject;

/// Largest spotlight array the shader is compiled for.
pub const MAX_SPOTS: usize = 4;

/// Camera parameters consumed by the renderer's uniform buffer.
#[derive(Clone, Debug)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
}

/// Per-frame uniform block shared by every pipeline.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct GlobalUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub point_position: [f32; 4],
    pub point_ambient: [f32; 4],
    pub point_diffuse: [f32; 4],
    pub point_specular: [f32; 4],
    /// constant, linear, quadratic, unused.
    pub point_attenuation: [f32; 4],
    pub spots: [SpotUniform; MAX_SPOTS],
    /// x holds the active spotlight count.
    pub counts: [u32; 4],
}

/// One spotlight as laid out in the uniform array.
#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
pub struct SpotUniform {
    /// xyz position; w is the cosine of the inner cone angle.
    pub position: [f32; 4],
    /// xyz direction; w is the cosine of the outer cone angle.
    pub direction: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// constant, linear, quadratic, unused.
    pub attenuation: [f32; 4],
}

impl GlobalUniform {
    /// Flattens the camera and light rig for upload. Spotlights beyond
    /// [`MAX_SPOTS`] are dropped; each cone aims at the camera.
    pub fn new(camera: &CameraParams, rig: &LightRig) -> Self {
        let point = &rig.point;
        let mut spots = [SpotUniform::default(); MAX_SPOTS];
        let active = rig.spots.len().min(MAX_SPOTS);
        for (slot, spot) in spots.iter_mut().zip(rig.spots.iter()) {
            let direction = spot.direction_toward(camera.position);
            *slot = SpotUniform {
                position: spot
                    .position
                    .extend(spot.cutoff_deg.to_radians().cos())
                    .into(),
                direction: direction
                    .extend(spot.outer_cutoff_deg.to_radians().cos())
                    .into(),
                ambient: spot.ambient.extend(0.0).into(),
                diffuse: spot.diffuse.extend(0.0).into(),
                specular: spot.specular.extend(0.0).into(),
                attenuation: [
                    spot.attenuation.constant,
                    spot.attenuation.linear,
                    spot.attenuation.quadratic,
                    0.0,
                ],
            };
        }

        Self {
            view_proj: camera.view_proj.to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).into(),
            point_position: point.position.extend(1.0).into(),
            point_ambient: point.ambient.extend(0.0).into(),
            point_diffuse: point.diffuse.extend(0.0).into(),
            point_specular: point.specular.extend(0.0).into(),
            point_attenuation: [
                point.attenuation.constant,
                point.attenuation.linear,
                point.attenuation.quadratic,
                0.0,
            ],
            spots,
            counts: [active as u32, 0, 0, 0],
        }
    }
}

/// Per-draw uniform block.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    /// Inverse-transpose of the model's upper 3x3, column-padded to vec4s.
    pub normal: [[f32; 4]; 3],
    /// rgb base color; w is opacity.
    pub color: [f32; 4],
    /// shininess, emissive flag, unused, unused.
    pub material: [f32; 4],
}

impl ObjectUniform {
    pub fn new(object: &SceneObject, model: Mat4, emissive: bool) -> Self {
        let normal = Mat3::from_mat4(model).inverse().transpose();
        Self {
            model: model.to_cols_array_2d(),
            normal: pad_mat3(normal),
            color: object.color.extend(object.opacity).into(),
            material: [object.shininess, if emissive { 1.0 } else { 0.0 }, 0.0, 0.0],
        }
    }
}

/// Per-instance model matrix fed through the instanced vertex buffer.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
}

impl From<Mat4> for InstanceRaw {
    fn from(model: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
        }
    }
}

fn pad_mat3(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lights::Spotlight;

    fn camera() -> CameraParams {
        CameraParams {
            view_proj: Mat4::IDENTITY,
            position: Vec3::new(0.0, 0.0, 5.0),
        }
    }

    #[test]
    fn uniform_sizes_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<SpotUniform>(), 96);
        assert_eq!(
            std::mem::size_of::<GlobalUniform>(),
            64 + 6 * 16 + MAX_SPOTS * 96 + 16
        );
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 144);
        assert_eq!(std::mem::size_of::<InstanceRaw>(), 64);
    }

    #[test]
    fn spot_count_is_clamped_to_capacity() {
        let mut rig = LightRig::default();
        rig.spots = vec![Spotlight::default(); MAX_SPOTS + 2];
        let uniform = GlobalUniform::new(&camera(), &rig);
        assert_eq!(uniform.counts[0], MAX_SPOTS as u32);
    }

    #[test]
    fn cone_cosines_are_packed_into_w() {
        let mut rig = LightRig::default();
        rig.spots = vec![Spotlight::at(Vec3::ZERO)];
        let uniform = GlobalUniform::new(&camera(), &rig);
        let spot = uniform.spots[0];
        assert!((spot.position[3] - 12.5f32.to_radians().cos()).abs() < 1e-6);
        assert!((spot.direction[3] - 15.0f32.to_radians().cos()).abs() < 1e-6);
        // The cone aims from the origin toward the camera on +Z.
        assert!((spot.direction[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn emissive_flag_lands_in_material_slot() {
        let object = SceneObject::default();
        let uniform = ObjectUniform::new(&object, Mat4::IDENTITY, true);
        assert_eq!(uniform.material[1], 1.0);
        assert_eq!(uniform.color[3], 1.0);
    }
}
