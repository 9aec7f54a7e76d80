//! WGSL module shared by every pipeline: two vertex entry points (plain
//! and instanced) and two fragment entry points (lit and emissive).

pub(crate) const SHADER: &str = r#"
struct Spot {
    // xyz position, w = cosine of the inner cone angle
    position: vec4<f32>,
    // xyz direction the cone points, w = cosine of the outer cone angle
    direction: vec4<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    // constant, linear, quadratic attenuation
    attenuation: vec4<f32>,
}

struct GlobalUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    point_position: vec4<f32>,
    point_ambient: vec4<f32>,
    point_diffuse: vec4<f32>,
    point_specular: vec4<f32>,
    point_attenuation: vec4<f32>,
    spots: array<Spot, 4>,
    counts: vec4<u32>,
}

struct ObjectUniform {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    // rgb base color, w = opacity
    color: vec4<f32>,
    // x = shininess, y = emissive flag
    material: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

@group(1) @binding(0)
var<uniform> object: ObjectUniform;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct InstanceInput {
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

fn normal_matrix() -> mat3x3<f32> {
    return mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz,
    );
}

@vertex
fn vs_mesh(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.clip_position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;
    out.normal = normalize(normal_matrix() * input.normal);
    return out;
}

@vertex
fn vs_foliage(input: VertexInput, instance: InstanceInput) -> VertexOutput {
    let instance_model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    var out: VertexOutput;
    let world_position = instance_model * object.model * vec4<f32>(input.position, 1.0);
    out.clip_position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;
    // Grid instances are translation-only, so the object normal matrix holds.
    out.normal = normalize(normal_matrix() * input.normal);
    return out;
}

fn attenuate(factors: vec4<f32>, distance: f32) -> f32 {
    return 1.0 / (factors.x + factors.y * distance + factors.z * distance * distance);
}

fn blinn_specular(normal: vec3<f32>, light_dir: vec3<f32>, view_dir: vec3<f32>) -> f32 {
    let halfway = normalize(light_dir + view_dir);
    return pow(max(dot(normal, halfway), 0.0), object.material.x);
}

@fragment
fn fs_lit(input: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.normal);
    let view_dir = normalize(globals.camera_position.xyz - input.world_pos);
    let base = object.color.rgb;
    var lit = vec3<f32>(0.0);

    // Point light
    let to_point = globals.point_position.xyz - input.world_pos;
    let point_dist = length(to_point);
    let point_dir = to_point / max(point_dist, 1e-4);
    let point_att = attenuate(globals.point_attenuation, point_dist);
    lit += point_att * (globals.point_ambient.rgb * base
        + globals.point_diffuse.rgb * max(dot(normal, point_dir), 0.0) * base
        + globals.point_specular.rgb * blinn_specular(normal, point_dir, view_dir));

    // Spotlights
    for (var i = 0u; i < globals.counts.x; i = i + 1u) {
        let spot = globals.spots[i];
        let to_light = spot.position.xyz - input.world_pos;
        let dist = length(to_light);
        let light_dir = to_light / max(dist, 1e-4);
        let att = attenuate(spot.attenuation, dist);

        let cos_inner = spot.position.w;
        let cos_outer = spot.direction.w;
        let theta = dot(-light_dir, normalize(spot.direction.xyz));
        let edge = clamp((theta - cos_outer) / max(cos_inner - cos_outer, 1e-4), 0.0, 1.0);

        lit += att * spot.ambient.rgb * base;
        lit += att * edge * (spot.diffuse.rgb * max(dot(normal, light_dir), 0.0) * base
            + spot.specular.rgb * blinn_specular(normal, light_dir, view_dir));
    }

    return vec4<f32>(lit, object.color.a);
}

@fragment
fn fs_emissive(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(object.color.rgb, 1.0);
}
"#;
