//! Shader sources shared by every backend and the text normalisation applied
//! to caller fragment shaders before a backend compiles them.
//!
//! Fragment shaders are written in the GLSL ES 3.0 dialect: a `#version`
//! line, `precision` statements, one `uniform <type> <name>;` per line and a
//! single `out vec4` colour output. [`normalize_fragment`] removes the parts
//! a backend replaces with its own declarations and reports which declared
//! uniforms the body actually references.

use crate::uniforms::UniformDecl;

/// Two triangles covering clip space, as `vec2` positions.
pub const QUAD_VERTICES: [f32; 12] = [
    -1.0, -1.0, 1.0, -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0, 1.0,
];

/// Vertices drawn per frame.
pub const QUAD_VERTEX_COUNT: u32 = 6;

/// Pass-through vertex stage for the full-screen quad. The position
/// attribute lives in slot 0.
pub const FULLSCREEN_VERTEX_SHADER: &str = r"#version 450
layout(location = 0) in vec2 a_position;

void main() {
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

/// Fragment body with backend-provided declarations removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFragment {
    pub body: String,
    /// Declared uniforms the body mentions; the rest count as optimized out.
    pub referenced: Vec<String>,
}

impl NormalizedFragment {
    pub fn references(&self, name: &str) -> bool {
        self.referenced.iter().any(|referenced| referenced == name)
    }
}

pub fn normalize_fragment(source: &str, uniforms: &[UniformDecl]) -> NormalizedFragment {
    let mut body = String::with_capacity(source.len());
    let mut skipped_version = false;

    for line in source.lines() {
        let trimmed = line.trim_start();
        if !skipped_version && trimmed.starts_with("#version") {
            skipped_version = true;
            continue;
        }
        if trimmed.starts_with("precision ") {
            continue;
        }
        if let Some(name) = declared_uniform_name(trimmed) {
            if uniforms.iter().any(|decl| decl.name == name) {
                continue;
            }
        }
        if let Some(output) = bare_output_declaration(trimmed) {
            body.push_str("layout(location = 0) ");
            body.push_str(output);
            body.push('\n');
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }

    let referenced = uniforms
        .iter()
        .filter(|decl| references_identifier(&body, &decl.name))
        .map(|decl| decl.name.clone())
        .collect();

    NormalizedFragment { body, referenced }
}

/// Whole-word search for a GLSL identifier.
pub fn references_identifier(source: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let is_ident = |ch: char| ch.is_ascii_alphanumeric() || ch == '_';
    let mut search_from = 0;
    while let Some(found) = source[search_from..].find(name) {
        let start = search_from + found;
        let end = start + name.len();
        let before_ok = source[..start].chars().next_back().map_or(true, |ch| !is_ident(ch));
        let after_ok = source[end..].chars().next().map_or(true, |ch| !is_ident(ch));
        if before_ok && after_ok {
            return true;
        }
        search_from = end;
    }
    false
}

fn declared_uniform_name(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix("uniform ")?;
    let declaration = rest.split(';').next()?;
    let name = declaration.split_whitespace().last()?;
    if name.contains('[') {
        return None;
    }
    Some(name)
}

fn bare_output_declaration(trimmed: &str) -> Option<&str> {
    if trimmed.starts_with("out ") && trimmed.contains("vec4") {
        Some(trimmed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::UniformKind;

    const SOURCE: &str = r"#version 300 es
precision highp float;
uniform float u_time;
uniform highp vec2 u_resolution;
uniform float u_unused;
uniform sampler2D u_texture;
out vec4 fragColor;

void main() {
    vec2 uv = gl_FragCoord.xy / u_resolution;
    fragColor = vec4(uv, sin(u_time), 1.0);
}
";

    fn decls() -> Vec<UniformDecl> {
        vec![
            UniformDecl::new("u_time", UniformKind::Scalar),
            UniformDecl::new("u_resolution", UniformKind::Vec2),
            UniformDecl::new("u_unused", UniformKind::Scalar),
        ]
    }

    #[test]
    fn strips_declared_uniforms_and_header() {
        let normalized = normalize_fragment(SOURCE, &decls());
        assert!(!normalized.body.contains("#version"));
        assert!(!normalized.body.contains("precision"));
        assert!(!normalized.body.contains("uniform float u_time"));
        assert!(!normalized.body.contains("u_unused"));
        assert!(normalized.body.contains("uniform sampler2D u_texture"));
        assert!(normalized
            .body
            .contains("layout(location = 0) out vec4 fragColor;"));
    }

    #[test]
    fn unreferenced_uniforms_count_as_optimized_out() {
        let normalized = normalize_fragment(SOURCE, &decls());
        assert!(normalized.references("u_time"));
        assert!(normalized.references("u_resolution"));
        assert!(!normalized.references("u_unused"));
    }

    #[test]
    fn identifier_search_respects_word_boundaries() {
        assert!(references_identifier("x = u_time * 2.0;", "u_time"));
        assert!(!references_identifier("x = u_time2 * 2.0;", "u_time"));
        assert!(!references_identifier("x = my_u_time;", "u_time"));
        assert!(references_identifier("my_u_time + u_time", "u_time"));
    }
}
