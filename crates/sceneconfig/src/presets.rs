use serde::{Deserialize, Serialize};

/// Pattern the warp shader folds its gradient around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternShape {
    #[default]
    Checks,
    Stripes,
    Edge,
}

impl PatternShape {
    /// Value written to the shader's `u_shape` uniform.
    pub fn index(self) -> u32 {
        match self {
            PatternShape::Checks => 0,
            PatternShape::Stripes => 1,
            PatternShape::Edge => 2,
        }
    }
}

/// Warp parameters in authoring units: angles in degrees, most amounts on a
/// 0-100 scale, speed on the 0-100 slider scale and `offset` in seed tenths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpPreset {
    pub color1: String,
    pub color2: String,
    pub color3: String,
    pub rotation: f64,
    pub proportion: f64,
    pub scale: f64,
    pub speed: f64,
    pub distortion: f64,
    pub swirl: f64,
    pub swirl_iterations: f64,
    pub softness: f64,
    pub offset: f64,
    pub shape: PatternShape,
    pub shape_size: f64,
}

impl Default for WarpPreset {
    fn default() -> Self {
        Self {
            color1: "hsla(0, 0%, 15%, 1)".into(),
            color2: "hsla(203, 80%, 70%, 1)".into(),
            color3: "hsla(0, 0%, 100%, 1)".into(),
            rotation: 0.0,
            proportion: 35.0,
            scale: 1.0,
            speed: 20.0,
            distortion: 12.5,
            swirl: 80.0,
            swirl_iterations: 10.0,
            softness: 100.0,
            offset: 0.0,
            shape: PatternShape::Checks,
            shape_size: 10.0,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn preset(
    colors: [&str; 3],
    rotation: f64,
    proportion: f64,
    scale: f64,
    speed: f64,
    distortion: f64,
    swirl: f64,
    swirl_iterations: f64,
    softness: f64,
    offset: f64,
    shape: PatternShape,
    shape_size: f64,
) -> WarpPreset {
    WarpPreset {
        color1: colors[0].into(),
        color2: colors[1].into(),
        color3: colors[2].into(),
        rotation,
        proportion,
        scale,
        speed,
        distortion,
        swirl,
        swirl_iterations,
        softness,
        offset,
        shape,
        shape_size,
    }
}

/// Bundled presets in display order. The first one is the fallback for
/// unknown names.
pub fn builtin_presets() -> Vec<(&'static str, WarpPreset)> {
    use PatternShape::{Checks, Edge, Stripes};
    vec![
        (
            "Prism",
            preset(
                ["#0b0b0bff", "#c0c0c07c", "#f0f0f0"],
                -50.0, 1.0, 0.01, 30.0, 0.0, 50.0, 16.0, 47.0, -299.0, Checks, 45.0,
            ),
        ),
        (
            "Lava",
            preset(
                ["#FF9F21", "#FF0303", "#000000"],
                114.0, 100.0, 0.52, 30.0, 7.0, 18.0, 20.0, 100.0, 717.0, Edge, 12.0,
            ),
        ),
        (
            "Plasma",
            preset(
                ["#B566FF", "#000000", "#000000"],
                0.0, 63.0, 0.75, 30.0, 5.0, 61.0, 5.0, 100.0, -168.0, Checks, 28.0,
            ),
        ),
        (
            "Pulse",
            preset(
                ["#66FF85", "#000000", "#000000"],
                -167.0, 92.0, 0.0, 20.0, 54.0, 75.0, 3.0, 28.0, -813.0, Checks, 79.0,
            ),
        ),
        (
            "Vortex",
            preset(
                ["#000000", "#FFFFFF", "#000000"],
                50.0, 41.0, 0.4, 20.0, 0.0, 100.0, 3.0, 5.0, -744.0, Stripes, 80.0,
            ),
        ),
        (
            "Mist",
            preset(
                ["#050505", "#FF66B8", "#050505"],
                0.0, 33.0, 0.48, 39.0, 4.0, 65.0, 5.0, 100.0, -235.0, Edge, 48.0,
            ),
        ),
    ]
}

/// Case-insensitive lookup among the bundled presets.
pub fn builtin_preset(name: &str) -> Option<WarpPreset> {
    builtin_presets()
        .into_iter()
        .find(|(builtin, _)| builtin.eq_ignore_ascii_case(name))
        .map(|(_, preset)| preset)
}
