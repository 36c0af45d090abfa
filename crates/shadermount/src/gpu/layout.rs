//! std140 packing for the uniform block every wgpu program receives.

use std::fmt::Write as _;

use crate::uniforms::{UniformDecl, UniformKind, UniformValue};

const BLOCK_NAME: &str = "MountUniforms";
const INSTANCE_NAME: &str = "ubo";

/// Placement of one uniform inside the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub kind: UniformKind,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockLayout {
    slots: Vec<UniformSlot>,
    size: usize,
}

/// (alignment, size) in bytes under std140.
fn std140(kind: UniformKind) -> (usize, usize) {
    match kind {
        UniformKind::Scalar | UniformKind::Bool => (4, 4),
        UniformKind::Vec2 => (8, 8),
        UniformKind::Vec3 => (16, 12),
        UniformKind::Vec4 => (16, 16),
        // Matrix columns are padded to vec4.
        UniformKind::Mat3 => (16, 48),
        UniformKind::Mat4 => (16, 64),
    }
}

fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

impl UniformBlockLayout {
    pub fn new(decls: &[UniformDecl]) -> Self {
        let mut offset = 0;
        let mut slots = Vec::with_capacity(decls.len());
        for decl in decls {
            let (alignment, size) = std140(decl.kind);
            offset = align_to(offset, alignment);
            slots.push(UniformSlot {
                name: decl.name.clone(),
                kind: decl.kind,
                offset,
            });
            offset += size;
        }
        let size = align_to(offset.max(16), 16);
        Self { slots, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn slots(&self) -> &[UniformSlot] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    /// GLSL declaration of the block plus one `#define` per uniform so shader
    /// bodies keep using the bare names.
    pub fn glsl_block(&self) -> String {
        let mut block = format!("layout(std140, set = 0, binding = 0) uniform {BLOCK_NAME} {{\n");
        if self.slots.is_empty() {
            block.push_str("    vec4 _padding;\n");
        }
        for slot in &self.slots {
            let _ = writeln!(block, "    {} _{};", slot.kind.glsl_type(), slot.name);
        }
        let _ = writeln!(block, "}} {INSTANCE_NAME};\n");
        for slot in &self.slots {
            let _ = match slot.kind {
                UniformKind::Bool => writeln!(
                    block,
                    "#define {name} ({INSTANCE_NAME}._{name} != 0)",
                    name = slot.name
                ),
                _ => writeln!(
                    block,
                    "#define {name} {INSTANCE_NAME}._{name}",
                    name = slot.name
                ),
            };
        }
        block
    }

    /// Full `#version 450` fragment source around a normalized body.
    pub fn wrap_fragment(&self, body: &str) -> String {
        format!("#version 450\n{}\n#line 1\n{body}", self.glsl_block())
    }
}

/// Writes `value` into `buffer` at `slot`. Returns `false` when the value's
/// shape differs from the slot's.
pub fn encode(buffer: &mut [u8], slot: &UniformSlot, value: &UniformValue) -> bool {
    if value.kind() != slot.kind {
        return false;
    }
    let offset = slot.offset;
    match value {
        UniformValue::Scalar(v) => put(buffer, offset, &[*v]),
        UniformValue::Bool(flag) => {
            let raw = i32::from(*flag);
            buffer[offset..offset + 4].copy_from_slice(bytemuck::bytes_of(&raw));
        }
        UniformValue::Vec2(v) => put(buffer, offset, v),
        UniformValue::Vec3(v) => put(buffer, offset, v),
        UniformValue::Vec4(v) => put(buffer, offset, v),
        UniformValue::Mat3(m) => {
            for (column, values) in m.chunks_exact(3).enumerate() {
                put(buffer, offset + column * 16, values);
            }
        }
        UniformValue::Mat4(m) => put(buffer, offset, m),
    }
    true
}

fn put(buffer: &mut [u8], offset: usize, values: &[f32]) {
    let bytes: &[u8] = bytemuck::cast_slice(values);
    buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> UniformBlockLayout {
        UniformBlockLayout::new(&[
            UniformDecl::new("u_time", UniformKind::Scalar),
            UniformDecl::new("u_resolution", UniformKind::Vec2),
            UniformDecl::new("u_pixelRatio", UniformKind::Scalar),
            UniformDecl::new("u_color", UniformKind::Vec3),
            UniformDecl::new("u_flag", UniformKind::Bool),
            UniformDecl::new("u_basis", UniformKind::Mat3),
        ])
    }

    #[test]
    fn offsets_follow_std140() {
        let layout = layout();
        let offsets: Vec<usize> = layout.slots().iter().map(|slot| slot.offset).collect();
        assert_eq!(offsets, [0, 8, 16, 32, 44, 48]);
        assert_eq!(layout.size(), 96);
        assert_eq!(UniformBlockLayout::new(&[]).size(), 16);
    }

    #[test]
    fn block_aliases_every_uniform() {
        let glsl = layout().glsl_block();
        assert!(glsl.contains("vec2 _u_resolution;"));
        assert!(glsl.contains("int _u_flag;"));
        assert!(glsl.contains("#define u_time ubo._u_time"));
        assert!(glsl.contains("#define u_flag (ubo._u_flag != 0)"));
    }

    #[test]
    fn mat3_columns_are_padded() {
        let layout = layout();
        let mut buffer = vec![0u8; layout.size()];
        let slot = layout.slot("u_basis").unwrap();
        let matrix = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        assert!(encode(&mut buffer, slot, &UniformValue::Mat3(matrix)));
        let floats: Vec<f32> = buffer[48..96]
            .chunks_exact(4)
            .map(|bytes| f32::from_ne_bytes(bytes.try_into().unwrap()))
            .collect();
        assert_eq!(
            floats,
            [1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0, 7.0, 8.0, 9.0, 0.0]
        );
    }

    #[test]
    fn mismatched_kinds_are_rejected() {
        let layout = layout();
        let mut buffer = vec![0u8; layout.size()];
        let slot = layout.slot("u_color").unwrap();
        assert!(!encode(&mut buffer, slot, &UniformValue::Scalar(1.0)));
        assert!(buffer.iter().all(|byte| *byte == 0));
    }
}
