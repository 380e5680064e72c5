use std::borrow::Cow;

use wgpu::naga::ShaderStage;

/// Compiles the static full-viewport quad vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Compiles the nebula fragment shader.
///
/// GLSL parse and validation failures surface through the device error scope
/// opened by the caller, not through this function.
pub(crate) fn compile_fragment_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("nebula fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(NEBULA_FRAGMENT_GLSL),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Nebula field as a fragment shader.
///
/// The uniform block layout must match `NebulaUniforms` in
/// `gpu/uniforms.rs`; the math must match `nebula::field`. wgpu places the
/// `gl_FragCoord` origin at the top-left, so `main` flips it to the
/// bottom-left origin the field is defined in.
pub(crate) const NEBULA_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform NebulaParams {
    vec2 u_resolution;
    float u_time;
    float u_padding;
    vec4 u_colorA;
    vec4 u_colorB;
    vec4 u_colorC;
} params;

vec2 hash2(vec2 p) {
    vec2 h = vec2(dot(p, vec2(127.1, 311.7)), dot(p, vec2(269.5, 183.3)));
    return -1.0 + 2.0 * fract(sin(h) * 43758.5453123);
}

float noise(vec2 p) {
    const float K1 = 0.366025404;
    const float K2 = 0.211324865;
    vec2 i = floor(p + (p.x + p.y) * K1);
    vec2 a = p - i + (i.x + i.y) * K2;
    vec2 o = (a.x > a.y) ? vec2(1.0, 0.0) : vec2(0.0, 1.0);
    vec2 b = a - o + K2;
    vec2 c = a - 1.0 + 2.0 * K2;
    vec3 h = max(0.5 - vec3(dot(a, a), dot(b, b), dot(c, c)), vec3(0.0));
    vec3 n = h * h * h * h * vec3(dot(a, hash2(i)), dot(b, hash2(i + o)), dot(c, hash2(i + 1.0)));
    return dot(n, vec3(70.0));
}

float fbm(vec2 p) {
    float f = 0.0;
    float amp = 0.55;
    vec2 x = p;
    mat2 m = mat2(1.6, 1.2, -1.2, 1.6);
    for (int octave = 0; octave < 6; octave++) {
        f += amp * noise(x);
        x = m * x;
        amp *= 0.5;
    }
    return f;
}

void main() {
    vec2 fragCoord = vec2(gl_FragCoord.x, params.u_resolution.y - gl_FragCoord.y);
    vec2 p = (fragCoord - 0.5 * params.u_resolution) / params.u_resolution.y;

    float t = params.u_time * 0.05;
    float r = length(p);
    float a = atan(p.y, p.x);
    vec2 q = p + 0.25 * vec2(cos(a + t * 0.7), sin(a * 0.7 - t));

    float n1 = fbm(q * 1.5 + vec2(t, -t));
    float n2 = fbm(q * 3.0 + vec2(-t * 0.7, t * 0.5));
    float n = smoothstep(0.0, 1.0, 0.55 * n1 + 0.45 * n2);

    vec3 col = mix(params.u_colorA.rgb, params.u_colorB.rgb, n);
    col = mix(col, params.u_colorC.rgb, smoothstep(0.4, 0.95, n));
    col *= smoothstep(1.2, 0.1, r);

    float stars = pow(max(0.0, noise(p * 40.0 + t * 2.0)), 20.0);
    col += vec3(stars * 0.6);

    outColor = vec4(clamp(col, vec3(0.0), vec3(1.0)), 1.0);
}
";

/// Four-vertex triangle strip covering clip space.
const VERTEX_SHADER_GLSL: &str = r"#version 450
const vec2 positions[4] = vec2[4](
    vec2(-1.0, -1.0),
    vec2(1.0, -1.0),
    vec2(-1.0, 1.0),
    vec2(1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    gl_Position = vec4(positions[vertex_index], 0.0, 1.0);
}
";

/// Vertices drawn per frame by the quad pipeline.
pub(crate) const QUAD_VERTEX_COUNT: u32 = 4;
