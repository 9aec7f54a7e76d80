use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::lights::{Attenuation, LightRig, PointLight, Spotlight};

/// Runtime description of the scene: drawable objects plus the light rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub lights: LightRig,
}

impl Scene {
    /// Parses a scene XML document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let mut objects = Vec::new();
        let mut lights = LightRig::default();
        let mut point_light_seen = false;

        for node in document.descendants().filter(|n| n.has_tag_name("object")) {
            objects.push(parse_object(&node)?);
        }

        for node in document.descendants().filter(|n| n.has_tag_name("light")) {
            match child_text(&node, "kind").as_deref() {
                Some("spot") => lights.spots.push(parse_spotlight(&node)?),
                Some("point") | None => {
                    // First point light wins; extras are ignored.
                    if !point_light_seen {
                        lights.point = parse_point_light(&node)?;
                        if let Some(speed) = child_text(&node, "orbit-speed") {
                            lights.orbit_speed = parse_f32(&speed)
                                .context("invalid <orbit-speed> on point light")?;
                        }
                        point_light_seen = true;
                    }
                }
                Some(other) => return Err(anyhow!("unknown light kind {other:?}")),
            }
        }

        Ok(Self { objects, lights })
    }

    /// The built-in plant-room scene: an instanced foliage grid, the room
    /// shell, a glass door, an emitter mesh, one orbiting point light and
    /// three fixed spotlights.
    pub fn demo() -> Self {
        let aloe = SceneObject {
            name: "Aloe".to_string(),
            kind: ObjectKind::Foliage,
            mesh: Some("models/aloevera.obj".to_string()),
            color: Vec3::new(0.43, 0.63, 0.31),
            grid: Some(InstanceGrid::default()),
            ..SceneObject::default()
        };
        let room = SceneObject {
            name: "Room".to_string(),
            kind: ObjectKind::Surface,
            mesh: Some("models/room.obj".to_string()),
            color: Vec3::splat(0.78),
            position: Vec3::new(0.0, 2.0, 0.0),
            ..SceneObject::default()
        };
        let door = SceneObject {
            name: "GlassDoor".to_string(),
            kind: ObjectKind::Glass,
            mesh: Some("models/glass.obj".to_string()),
            color: Vec3::new(0.75, 0.88, 0.95),
            position: Vec3::new(0.0, 2.0, 0.0),
            opacity: 0.4,
            ..SceneObject::default()
        };
        let ball = SceneObject {
            name: "LightBall".to_string(),
            kind: ObjectKind::Emitter,
            mesh: Some("models/ball.obj".to_string()),
            scale: Vec3::splat(1.0 / 20.0),
            ..SceneObject::default()
        };

        let lights = LightRig {
            spots: vec![
                Spotlight::at(Vec3::new(-6.0, 1.3, 2.0)),
                Spotlight::at(Vec3::new(-4.0, 0.5, -3.0)),
                Spotlight::at(Vec3::new(7.0, 1.2, 6.0)),
            ],
            ..LightRig::default()
        };

        Self {
            objects: vec![aloe, room, door, ball],
            lights,
        }
    }
}

/// How an object participates in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Instanced across the grid with the lit pipeline.
    Foliage,
    /// Ordinary opaque indexed draw.
    #[default]
    Surface,
    /// Unlit mesh drawn once per light position.
    Emitter,
    /// Translucent; drawn last with blending.
    Glass,
}

impl ObjectKind {
    fn parse(text: &str) -> Result<Self> {
        match text {
            "foliage" => Ok(Self::Foliage),
            "surface" => Ok(Self::Surface),
            "emitter" => Ok(Self::Emitter),
            "glass" => Ok(Self::Glass),
            other => Err(anyhow!("unknown object kind {other:?}")),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Foliage => "foliage",
            Self::Surface => "surface",
            Self::Emitter => "emitter",
            Self::Glass => "glass",
        }
    }
}

/// Drawable entry in the scene description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<String>,
    pub color: Vec3,
    pub position: Vec3,
    /// Euler rotation in degrees, applied Z then Y then X.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub shininess: f32,
    pub opacity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<InstanceGrid>,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: ObjectKind::Surface,
            mesh: None,
            color: Vec3::ONE,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            shininess: 32.0,
            opacity: 1.0,
            grid: None,
        }
    }
}

impl SceneObject {
    pub fn model_matrix(&self) -> Mat4 {
        let rotation = Mat4::from_rotation_z(self.rotation.z.to_radians())
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_x(self.rotation.x.to_radians());
        Mat4::from_translation(self.position) * rotation * Mat4::from_scale(self.scale)
    }
}

/// Row-major grid of per-instance translations for foliage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstanceGrid {
    pub rows: u32,
    pub count: u32,
    pub row_step: f32,
    pub col_step: f32,
}

impl Default for InstanceGrid {
    fn default() -> Self {
        Self {
            rows: 9,
            count: 90,
            row_step: 1.2,
            col_step: 0.5,
        }
    }
}

impl InstanceGrid {
    /// Model matrices for every instance, row by row.
    pub fn transforms(&self) -> Vec<Mat4> {
        let rows = self.rows.max(1);
        let per_row = (self.count / rows).max(1);
        let mut matrices = Vec::with_capacity((rows * per_row) as usize);
        for row in 0..rows {
            for col in 0..per_row {
                let offset = Vec3::new(row as f32 * self.row_step, 0.0, col as f32 * self.col_step);
                matrices.push(Mat4::from_translation(offset));
            }
        }
        matrices
    }
}

fn parse_object(node: &Node<'_, '_>) -> Result<SceneObject> {
    let mut object = SceneObject {
        name: child_text(node, "name").ok_or_else(|| anyhow!("<name> tag is missing"))?,
        ..SceneObject::default()
    };
    if let Some(kind) = child_text(node, "kind") {
        object.kind = ObjectKind::parse(&kind)
            .with_context(|| format!("object {:?}", object.name))?;
    }
    object.mesh = child_text(node, "mesh");
    if let Some(color) = child_text(node, "color") {
        object.color = parse_triple(&color).context("invalid <color>")? / 255.0;
    }
    object.position = triple_or(node, "position", object.position)?;
    object.rotation = triple_or(node, "rotation", object.rotation)?;
    object.scale = triple_or(node, "scale", object.scale)?;
    object.shininess = f32_or(node, "shininess", object.shininess)?;
    object.opacity = f32_or(node, "opacity", object.opacity)?;

    if let Some(grid_node) = node.children().find(|c| c.has_tag_name("grid")) {
        object.grid = Some(parse_grid(&grid_node)?);
    }
    if object.kind == ObjectKind::Foliage && object.grid.is_none() {
        return Err(anyhow!(
            "foliage object {:?} is missing its <grid>",
            object.name
        ));
    }
    Ok(object)
}

fn parse_grid(node: &Node<'_, '_>) -> Result<InstanceGrid> {
    let defaults = InstanceGrid::default();
    let rows = match child_text(node, "rows") {
        Some(text) => text.parse::<u32>().context("invalid <rows>")?,
        None => defaults.rows,
    };
    let count = match child_text(node, "count") {
        Some(text) => text.parse::<u32>().context("invalid <count>")?,
        None => defaults.count,
    };
    Ok(InstanceGrid {
        rows,
        count,
        row_step: f32_or(node, "row-step", defaults.row_step)?,
        col_step: f32_or(node, "col-step", defaults.col_step)?,
    })
}

fn parse_point_light(node: &Node<'_, '_>) -> Result<PointLight> {
    let defaults = PointLight::default();
    Ok(PointLight {
        position: triple_or(node, "position", defaults.position)?,
        ambient: triple_or(node, "ambient", defaults.ambient)?,
        diffuse: triple_or(node, "diffuse", defaults.diffuse)?,
        specular: triple_or(node, "specular", defaults.specular)?,
        attenuation: attenuation_or(node, defaults.attenuation)?,
    })
}

fn parse_spotlight(node: &Node<'_, '_>) -> Result<Spotlight> {
    let defaults = Spotlight::default();
    let spot = Spotlight {
        position: triple_or(node, "position", defaults.position)?,
        ambient: triple_or(node, "ambient", defaults.ambient)?,
        diffuse: triple_or(node, "diffuse", defaults.diffuse)?,
        specular: triple_or(node, "specular", defaults.specular)?,
        attenuation: attenuation_or(node, defaults.attenuation)?,
        cutoff_deg: f32_or(node, "cutoff", defaults.cutoff_deg)?,
        outer_cutoff_deg: f32_or(node, "outer-cutoff", defaults.outer_cutoff_deg)?,
    };
    if spot.outer_cutoff_deg < spot.cutoff_deg {
        return Err(anyhow!(
            "spotlight outer cutoff {} is narrower than the inner cutoff {}",
            spot.outer_cutoff_deg,
            spot.cutoff_deg
        ));
    }
    Ok(spot)
}

fn attenuation_or(node: &Node<'_, '_>, default: Attenuation) -> Result<Attenuation> {
    let Some(text) = child_text(node, "attenuation") else {
        return Ok(default);
    };
    let factors = parse_triple(&text).context("invalid <attenuation>")?;
    Ok(Attenuation {
        constant: factors.x,
        linear: factors.y,
        quadratic: factors.z,
    })
}

fn child_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn triple_or(node: &Node<'_, '_>, tag: &str, default: Vec3) -> Result<Vec3> {
    match child_text(node, tag) {
        Some(text) => parse_triple(&text).with_context(|| format!("invalid <{tag}>")),
        None => Ok(default),
    }
}

fn f32_or(node: &Node<'_, '_>, tag: &str, default: f32) -> Result<f32> {
    match child_text(node, tag) {
        Some(text) => parse_f32(&text).with_context(|| format!("invalid <{tag}>")),
        None => Ok(default),
    }
}

fn parse_f32(text: &str) -> Result<f32> {
    text.parse::<f32>()
        .map_err(|err| anyhow!("failed to parse float: {err}"))
}

fn parse_triple(text: &str) -> Result<Vec3> {
    let mut numbers = text.split_whitespace().map(parse_f32);
    let mut component =
        || -> Result<f32> { numbers.next().ok_or_else(|| anyhow!("missing component"))? };
    Ok(Vec3::new(component()?, component()?, component()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <scene>
        <object>
            <name>Aloe</name>
            <kind>foliage</kind>
            <mesh>models/aloevera.obj</mesh>
            <color>110 160 80</color>
            <grid>
                <rows>3</rows>
                <count>12</count>
                <row-step>1.2</row-step>
                <col-step>0.5</col-step>
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
            <orbit-speed>2</orbit-speed>
        </light>
        <light>
            <kind>spot</kind>
            <position>-6 1.3 2</position>
            <cutoff>12.5</cutoff>
            <outer-cutoff>15</outer-cutoff>
        </light>
    </scene>
    "#;

    #[test]
    fn parses_objects_and_lights() {
        let scene = Scene::from_xml(SAMPLE).unwrap();
        assert_eq!(scene.objects.len(), 2);

        let aloe = &scene.objects[0];
        assert_eq!(aloe.kind, ObjectKind::Foliage);
        assert!((aloe.color.x - 110.0 / 255.0).abs() < 1e-6);
        let grid = aloe.grid.unwrap();
        assert_eq!(grid.rows, 3);
        assert_eq!(grid.count, 12);

        let room = &scene.objects[1];
        assert_eq!(room.kind, ObjectKind::Surface);
        assert_eq!(room.position, Vec3::new(0.0, 2.0, 0.0));

        assert_eq!(scene.lights.point.position, Vec3::ONE);
        assert_eq!(scene.lights.orbit_speed, 2.0);
        assert_eq!(scene.lights.spots.len(), 1);
        assert_eq!(scene.lights.spots[0].cutoff_deg, 12.5);
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "<scene><object><kind>surface</kind></object></scene>";
        assert!(Scene::from_xml(bad).is_err());
    }

    #[test]
    fn foliage_requires_a_grid() {
        let bad = r#"<scene><object><name>A</name><kind>foliage</kind></object></scene>"#;
        assert!(Scene::from_xml(bad).is_err());
    }

    #[test]
    fn inverted_spot_cone_is_rejected() {
        let bad = r#"
        <scene>
            <light><kind>spot</kind><cutoff>20</cutoff><outer-cutoff>10</outer-cutoff></light>
        </scene>"#;
        assert!(Scene::from_xml(bad).is_err());
    }

    #[test]
    fn grid_layout_matches_row_major_translations() {
        let grid = InstanceGrid {
            rows: 2,
            count: 6,
            row_step: 1.2,
            col_step: 0.5,
        };
        let transforms = grid.transforms();
        assert_eq!(transforms.len(), 6);
        // Instance 4 sits in row 1, column 1.
        let offset = transforms[4].transform_point3(Vec3::ZERO);
        assert!(offset.distance(Vec3::new(1.2, 0.0, 0.5)) < 1e-6);
    }

    #[test]
    fn demo_scene_has_original_layout() {
        let scene = Scene::demo();
        assert_eq!(scene.objects.len(), 4);
        let aloe = &scene.objects[0];
        assert_eq!(aloe.grid.unwrap().count, 90);
        assert_eq!(scene.lights.spots.len(), 3);
        assert_eq!(scene.lights.point.position, Vec3::ONE);
        assert_eq!(scene.lights.spots[1].position, Vec3::new(-4.0, 0.5, -3.0));
    }

    #[test]
    fn model_matrix_applies_translation_and_scale() {
        let object = SceneObject {
            position: Vec3::new(1.0, 2.0, 3.0),
            scale: Vec3::splat(2.0),
            ..SceneObject::default()
        };
        let transformed = object.model_matrix().transform_point3(Vec3::X);
        assert!(transformed.distance(Vec3::new(3.0, 2.0, 3.0)) < 1e-6);
    }
}
