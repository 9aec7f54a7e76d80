use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Distance attenuation factors applied as `1 / (c + l*d + q*d^2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

/// Omnidirectional light that orbits the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub attenuation: Attenuation,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ONE,
            ambient: Vec3::splat(0.2),
            diffuse: Vec3::splat(0.5),
            specular: Vec3::ONE,
            attenuation: Attenuation::default(),
        }
    }
}

/// Cone light anchored at a fixed position.
///
/// The cone direction is not part of the light: every frame it aims from
/// `position` toward the camera, so the spotlights track the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spotlight {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub attenuation: Attenuation,
    /// Inner cone angle in degrees; full intensity inside it.
    pub cutoff_deg: f32,
    /// Outer cone angle in degrees; intensity fades to zero at the edge.
    pub outer_cutoff_deg: f32,
}

impl Spotlight {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Direction the cone points at for a camera at `eye`.
    pub fn direction_toward(&self, eye: Vec3) -> Vec3 {
        let delta = eye - self.position;
        if delta.length_squared() > f32::EPSILON {
            delta.normalize()
        } else {
            Vec3::NEG_Y
        }
    }
}

impl Default for Spotlight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            ambient: Vec3::splat(0.5),
            diffuse: Vec3::ONE,
            specular: Vec3::ONE,
            attenuation: Attenuation::default(),
            cutoff_deg: 12.5,
            outer_cutoff_deg: 15.0,
        }
    }
}

/// All light sources of a scene plus the point light's orbit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightRig {
    pub point: PointLight,
    pub spots: Vec<Spotlight>,
    /// Angular speed of the point light around the world Y axis, rad/s.
    pub orbit_speed: f32,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            point: PointLight::default(),
            spots: Vec::new(),
            orbit_speed: 1.0,
        }
    }
}

impl LightRig {
    /// Rotates the point light about the world Y axis by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        let rotation = Mat4::from_rotation_y(self.orbit_speed * dt);
        self.point.position = rotation.transform_point3(self.point.position);
    }

    /// Positions to draw emitter meshes at: the point light first, then
    /// every spotlight.
    pub fn emitter_positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        std::iter::once(self.point.position).chain(self.spots.iter().map(|spot| spot.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_preserves_radius_and_height() {
        let mut rig = LightRig::default();
        rig.point.position = Vec3::new(3.0, 1.5, 0.0);
        rig.advance(0.25);
        let pos = rig.point.position;
        assert!((pos.y - 1.5).abs() < 1e-5);
        let radius = (pos.x * pos.x + pos.z * pos.z).sqrt();
        assert!((radius - 3.0).abs() < 1e-4);
    }

    #[test]
    fn full_revolution_returns_to_start() {
        let mut rig = LightRig::default();
        rig.point.position = Vec3::new(1.0, 1.0, 1.0);
        rig.advance(std::f32::consts::TAU);
        assert!(rig.point.position.distance(Vec3::ONE) < 1e-3);
    }

    #[test]
    fn spotlights_aim_at_the_camera() {
        let spot = Spotlight::at(Vec3::new(0.0, 2.0, 0.0));
        let dir = spot.direction_toward(Vec3::new(0.0, 2.0, 5.0));
        assert!(dir.distance(Vec3::Z) < 1e-6);
    }

    #[test]
    fn emitters_cover_every_light() {
        let mut rig = LightRig::default();
        rig.spots = vec![Spotlight::at(Vec3::X), Spotlight::at(Vec3::Z)];
        let positions: Vec<_> = rig.emitter_positions().collect();
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0], rig.point.position);
        assert_eq!(positions[2], Vec3::Z);
    }
}
