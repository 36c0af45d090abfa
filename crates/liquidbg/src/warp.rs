//! The liquid warp shader and the mapping from authoring presets to the
//! uniform map, speed and seed a mount takes.

use sceneconfig::WarpPreset;
use shadermount::UniformMap;
use tracing::warn;

use crate::color::parse_color;

pub const WARP_FRAGMENT_SHADER: &str = r"#version 300 es
precision highp float;

uniform float u_time;
uniform float u_pixelRatio;
uniform vec2 u_resolution;

uniform float u_scale;
uniform float u_rotation;
uniform vec4 u_color1;
uniform vec4 u_color2;
uniform vec4 u_color3;
uniform float u_proportion;
uniform float u_softness;
uniform float u_shape;
uniform float u_shapeScale;
uniform float u_distortion;
uniform float u_swirl;
uniform float u_swirlIterations;

out vec4 fragColor;

#define TWO_PI 6.28318530718

vec2 rotate(vec2 uv, float angle) {
    return mat2(cos(angle), sin(angle), -sin(angle), cos(angle)) * uv;
}

float random(vec2 st) {
    return fract(sin(dot(st, vec2(12.9898, 78.233))) * 43758.5453123);
}

float noise(vec2 st) {
    vec2 i = floor(st);
    vec2 f = fract(st);
    float a = random(i);
    float b = random(i + vec2(1.0, 0.0));
    float c = random(i + vec2(0.0, 1.0));
    float d = random(i + vec2(1.0, 1.0));
    vec2 u = f * f * (3.0 - 2.0 * f);
    return mix(a, b, u.x) + (c - a) * u.y * (1.0 - u.x) + (d - b) * u.x * u.y;
}

vec4 blend(vec4 c1, vec4 c2, vec4 c3, float mixer, float edges, float blur) {
    vec3 color1 = c1.rgb * c1.a;
    vec3 color2 = c2.rgb * c2.a;
    vec3 color3 = c3.rgb * c3.a;

    float r1 = smoothstep(0.35 * edges, 0.7 - 0.35 * edges + 0.5 * blur, mixer);
    float r2 = smoothstep(0.3 + 0.35 * edges, 1.0 - 0.35 * edges + blur, mixer);

    vec3 first = mix(color1, color2, r1);
    float first_alpha = mix(c1.a, c2.a, r1);

    return vec4(mix(first, color3, r2), mix(first_alpha, c3.a, r2));
}

void main() {
    vec2 uv = gl_FragCoord.xy / u_resolution;
    float t = 0.5 * u_time;

    float noise_scale = 0.0005 + 0.006 * u_scale;

    uv -= 0.5;
    uv *= noise_scale * u_resolution;
    uv = rotate(uv, u_rotation);
    uv /= max(u_pixelRatio, 1.0);
    uv += 0.5;

    float n1 = noise(uv + t);
    float n2 = noise(uv * 2.0 - t);
    float angle = n1 * TWO_PI;
    uv += 4.0 * u_distortion * n2 * vec2(cos(angle), sin(angle));

    float swirl = clamp(u_swirl, 0.0, 2.0);
    int iterations = int(ceil(clamp(u_swirlIterations, 0.0, 20.0)));
    for (int i = 1; i <= 20; i++) {
        if (i > iterations) {
            break;
        }
        float step_index = float(i);
        uv.x += swirl / step_index * cos(t + step_index * 1.5 * uv.y);
        uv.y += swirl / step_index * cos(t + step_index * uv.x);
    }

    float proportion = clamp(u_proportion, 0.0, 1.0);
    float bias = 0.48 * sign(proportion - 0.5) * pow(abs(proportion - 0.5), 0.5);

    float mixer;
    if (u_shape < 0.5) {
        vec2 checks = uv * (0.5 + 3.5 * u_shapeScale);
        mixer = 0.5 + 0.5 * sin(checks.x) * cos(checks.y) + bias;
    } else if (u_shape < 1.5) {
        float f = fract(uv.y * (0.25 + 3.0 * u_shapeScale));
        mixer = smoothstep(0.0, 0.55, f) * smoothstep(1.0, 0.45, f) + bias;
    } else {
        float edge = (0.5 - uv.y) / (noise_scale * u_resolution.y) + 0.5;
        float spread = 0.2 * (1.0 - u_shapeScale);
        mixer = smoothstep(0.45 - spread, 0.55 + spread, edge + 0.3 * (proportion - 0.5));
    }

    fragColor = blend(
        u_color1, u_color2, u_color3,
        mixer,
        1.0 - clamp(u_softness, 0.0, 1.0),
        0.01 + 0.01 * u_scale
    );
}
";

/// Easing applied to the 0-100 speed slider before it becomes a clock
/// multiplier.
const SPEED_EASE: (f64, f64, f64, f64) = (0.65, 0.0, 0.88, 0.77);
const MAX_SPEED: f64 = 5.0;

/// Mount inputs derived from one preset.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpSettings {
    pub uniforms: UniformMap,
    pub speed: f64,
    pub seed: f64,
}

pub fn warp_settings(preset: &WarpPreset) -> WarpSettings {
    let fallback = WarpPreset::default();
    let color = |value: &str, fallback: &str| -> [f32; 4] {
        parse_color(value).unwrap_or_else(|err| {
            warn!(error = %err, fallback, "using fallback colour");
            parse_color(fallback).unwrap_or([0.0, 0.0, 0.0, 1.0])
        })
    };

    let swirl_iterations = if preset.swirl == 0.0 {
        0.0
    } else {
        preset.swirl_iterations
    };

    let uniforms = UniformMap::new()
        .with("u_scale", preset.scale)
        .with("u_rotation", preset.rotation.to_radians())
        .with("u_color1", color(&preset.color1, &fallback.color1))
        .with("u_color2", color(&preset.color2, &fallback.color2))
        .with("u_color3", color(&preset.color3, &fallback.color3))
        .with("u_proportion", preset.proportion / 100.0)
        .with("u_softness", preset.softness / 100.0)
        .with("u_distortion", preset.distortion / 50.0)
        .with("u_swirl", preset.swirl / 100.0)
        .with("u_swirlIterations", swirl_iterations)
        .with("u_shapeScale", preset.shape_size / 100.0)
        .with("u_shape", preset.shape.index() as f32);

    WarpSettings {
        uniforms,
        speed: eased_speed(preset.speed),
        seed: preset.offset * 10.0,
    }
}

/// Maps the 0-100 slider value onto a clock multiplier in `0..=5`.
pub fn eased_speed(slider: f64) -> f64 {
    let (x1, y1, x2, y2) = SPEED_EASE;
    cubic_bezier(x1, y1, x2, y2, slider / 100.0) * MAX_SPEED
}

/// CSS-style cubic bezier timing function through (0,0) and (1,1). Inputs
/// outside `0..=1` are clamped.
pub fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> f64 {
    if x1 == y1 && x2 == y2 {
        return x.clamp(0.0, 1.0);
    }
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let bezier = |t: f64, p1: f64, p2: f64| {
        let inv = 1.0 - t;
        3.0 * inv * inv * t * p1 + 3.0 * inv * t * t * p2 + t * t * t
    };

    // x(t) is monotonic for control points in 0..=1.
    let (mut low, mut high) = (0.0, 1.0);
    let mut t = x;
    for _ in 0..64 {
        let estimate = bezier(t, x1, x2);
        if (estimate - x).abs() < 1e-9 {
            break;
        }
        if estimate < x {
            low = t;
        } else {
            high = t;
        }
        t = (low + high) / 2.0;
    }
    bezier(t, y1, y2)
}
