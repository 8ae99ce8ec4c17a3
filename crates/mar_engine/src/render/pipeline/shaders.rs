//! GLSL 4.30 sources for the batch pipelines
//!
//! Every per-instance lookup indexes the storage buffers with the vertex's
//! baked shape index.

/// Storage buffer binding of the per-slot transforms
pub const TRANSFORMS_BINDING: u32 = 2;
/// Storage buffer binding of the per-slot colors
pub const COLORS_BINDING: u32 = 3;
/// Storage buffer binding of the point lights
pub const LIGHTS_BINDING: u32 = 4;

/// Camera uniform
pub const VIEW_PROJECTION_UNIFORM: &str = "u_viewProjection";
/// Number of light slots to iterate
pub const LIGHT_COUNT_UNIFORM: &str = "u_lightCount";
/// Sampler of the 2D texture pipeline
pub const TEXTURE_UNIFORM: &str = "u_texture";

pub(crate) const MESH_VERTEX: &str = r#"#version 430 core
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in vec2 a_uv;
layout(location = 3) in float a_shapeIndex;

layout(std430, binding = 2) readonly buffer Transforms { mat4 u_transforms[]; };
layout(std430, binding = 3) readonly buffer Colors { vec4 u_colors[]; };

uniform mat4 u_viewProjection;

out vec3 v_position;
out vec3 v_normal;
out vec2 v_uv;
flat out vec4 v_color;

void main() {
    int shape = int(a_shapeIndex);
    mat4 model = u_transforms[shape];
    vec4 world = model * vec4(a_position, 1.0);

    v_position = world.xyz;
    v_normal = mat3(model) * a_normal;
    v_uv = a_uv;
    v_color = u_colors[shape];
    gl_Position = u_viewProjection * world;
}
"#;

const LIGHTING: &str = r#"
struct PointLight {
    vec4 position;
    vec4 ambient;
    vec4 diffuse;
    vec4 specular;
    float constant;
    float linear;
    float quadratic;
    float intensity;
};

layout(std430, binding = 4) readonly buffer Lights { PointLight u_lights[]; };
uniform int u_lightCount;

in vec3 v_position;
in vec3 v_normal;
in vec2 v_uv;
flat in vec4 v_color;

out vec4 o_color;

vec3 shade(vec3 base) {
    if (u_lightCount == 0) {
        return base;
    }
    vec3 normal = normalize(v_normal);
    vec3 result = vec3(0.0);
    for (int i = 0; i < u_lightCount; i++) {
        PointLight light = u_lights[i];
        vec3 toLight = light.position.xyz - v_position;
        float dist = length(toLight);
        float attenuation = light.intensity /
            max(light.constant + light.linear * dist + light.quadratic * dist * dist, 1e-4);
        float diffuse = max(dot(normal, normalize(toLight)), 0.0);
        result += (light.ambient.rgb + diffuse * light.diffuse.rgb) * attenuation * base;
    }
    return result;
}
"#;

const COLOR_MAIN: &str = r#"
void main() {
    o_color = vec4(shade(v_color.rgb), v_color.a);
}
"#;

const TEXTURE_MAIN: &str = r#"
uniform sampler2D u_texture;

void main() {
    vec4 texel = texture(u_texture, v_uv);
    o_color = vec4(shade(texel.rgb), texel.a);
}
"#;

/// Fragment shader of the flat color pipeline
pub(crate) fn color_fragment() -> String {
    format!("#version 430 core\n{}{}", LIGHTING, COLOR_MAIN)
}

/// Fragment shader of the 2D texture pipeline
pub(crate) fn texture_fragment() -> String {
    format!("#version 430 core\n{}{}", LIGHTING, TEXTURE_MAIN)
}
