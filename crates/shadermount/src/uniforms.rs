use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Accumulated animation time in seconds.
pub const U_TIME: &str = "u_time";
/// Backing-store size in device pixels.
pub const U_RESOLUTION: &str = "u_resolution";
/// Device pixel ratio used when the backing store was last sized.
pub const U_PIXEL_RATIO: &str = "u_pixelRatio";

/// Uniforms every mounted program receives regardless of the caller's map.
pub const BUILTIN_UNIFORMS: [(&str, UniformKind); 3] = [
    (U_TIME, UniformKind::Scalar),
    (U_RESOLUTION, UniformKind::Vec2),
    (U_PIXEL_RATIO, UniformKind::Scalar),
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniformError {
    #[error("unsupported uniform array length: {0}")]
    UnsupportedLength(usize),
    #[error("unsupported uniform type: {0}")]
    UnsupportedType(&'static str),
    #[error("uniform value is not a finite number")]
    NonFinite,
}

/// Shape of a uniform as seen by the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Scalar,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl UniformKind {
    /// GLSL type used to declare the uniform. Booleans travel as `int`.
    pub fn glsl_type(self) -> &'static str {
        match self {
            UniformKind::Scalar => "float",
            UniformKind::Bool => "int",
            UniformKind::Vec2 => "vec2",
            UniformKind::Vec3 => "vec3",
            UniformKind::Vec4 => "vec4",
            UniformKind::Mat3 => "mat3",
            UniformKind::Mat4 => "mat4",
        }
    }
}

/// A typed uniform value, resolved once when the caller hands it over.
///
/// Matrices are column-major and are never transposed on upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UniformValue {
    Scalar(f32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Scalar(_) => UniformKind::Scalar,
            UniformValue::Bool(_) => UniformKind::Bool,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// Dispatches a flat float array on its length: 2/3/4 are vectors, 9 and
    /// 16 are square matrices. Anything else is rejected.
    pub fn from_slice(values: &[f32]) -> Result<Self, UniformError> {
        if values.iter().any(|value| !value.is_finite()) {
            return Err(UniformError::NonFinite);
        }
        let value = match values.len() {
            2 => UniformValue::Vec2([values[0], values[1]]),
            3 => UniformValue::Vec3([values[0], values[1], values[2]]),
            4 => UniformValue::Vec4([values[0], values[1], values[2], values[3]]),
            9 => {
                let mut matrix = [0.0; 9];
                matrix.copy_from_slice(values);
                UniformValue::Mat3(matrix)
            }
            16 => {
                let mut matrix = [0.0; 16];
                matrix.copy_from_slice(values);
                UniformValue::Mat4(matrix)
            }
            other => return Err(UniformError::UnsupportedLength(other)),
        };
        Ok(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Scalar(value)
    }
}

impl From<f64> for UniformValue {
    fn from(value: f64) -> Self {
        UniformValue::Scalar(value as f32)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Bool(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<[f32; 9]> for UniformValue {
    fn from(value: [f32; 9]) -> Self {
        UniformValue::Mat3(value)
    }
}

impl From<[f32; 16]> for UniformValue {
    fn from(value: [f32; 16]) -> Self {
        UniformValue::Mat4(value)
    }
}

/// Loosely-typed uniform value as it arrives from configuration files, the
/// command line or any other untyped source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UniformInput {
    Bool(bool),
    Number(f64),
    List(Vec<f64>),
    Text(String),
}

impl TryFrom<UniformInput> for UniformValue {
    type Error = UniformError;

    fn try_from(input: UniformInput) -> Result<Self, Self::Error> {
        match input {
            UniformInput::Bool(flag) => Ok(UniformValue::Bool(flag)),
            UniformInput::Number(number) if number.is_finite() => {
                Ok(UniformValue::Scalar(number as f32))
            }
            UniformInput::Number(_) => Err(UniformError::NonFinite),
            UniformInput::List(values) => {
                let floats: Vec<f32> = values.iter().map(|value| *value as f32).collect();
                UniformValue::from_slice(&floats)
            }
            UniformInput::Text(_) => Err(UniformError::UnsupportedType("string")),
        }
    }
}

/// Caller-supplied uniform values keyed by shader name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UniformMap {
    values: BTreeMap<String, UniformValue>,
}

impl UniformMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts untyped inputs, logging and dropping the ones whose shape no
    /// uniform can take.
    pub fn from_inputs<I, K>(inputs: I) -> Self
    where
        I: IntoIterator<Item = (K, UniformInput)>,
        K: Into<String>,
    {
        let mut map = Self::new();
        for (name, input) in inputs {
            let name = name.into();
            if let Err(err) = map.insert_input(name.clone(), input) {
                tracing::warn!(uniform = %name, error = %err, "skipping unsupported uniform");
            }
        }
        map
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn insert_input(
        &mut self,
        name: impl Into<String>,
        input: UniformInput,
    ) -> Result<(), UniformError> {
        let value = UniformValue::try_from(input)?;
        self.values.insert(name.into(), value);
        Ok(())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Shallow merge: keys in `other` replace existing ones.
    pub fn merge(&mut self, other: UniformMap) {
        self.values.extend(other.values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<UniformValue>> FromIterator<(K, V)> for UniformMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

/// Name and shape of a uniform the program is built against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: String,
    pub kind: UniformKind,
}

impl UniformDecl {
    pub fn new(name: impl Into<String>, kind: UniformKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Built-ins first, followed by the caller's uniforms in key order. A caller
/// key that shadows a built-in is ignored.
pub fn declarations(map: &UniformMap) -> Vec<UniformDecl> {
    let mut decls: Vec<UniformDecl> = BUILTIN_UNIFORMS
        .iter()
        .map(|(name, kind)| UniformDecl::new(*name, *kind))
        .collect();
    for (name, value) in map.iter() {
        if BUILTIN_UNIFORMS.iter().any(|(builtin, _)| *builtin == name) {
            continue;
        }
        decls.push(UniformDecl::new(name, value.kind()));
    }
    decls
}

/// Resolved uniform handles, filled once when the program is built.
///
/// A name maps to `None` when the compiler dropped the uniform; writes to it
/// are skipped without complaint.
#[derive(Debug)]
pub struct UniformTable<H> {
    handles: BTreeMap<String, Option<H>>,
}

impl<H> Default for UniformTable<H> {
    fn default() -> Self {
        Self {
            handles: BTreeMap::new(),
        }
    }
}

impl<H> UniformTable<H> {
    pub fn resolve<'a, I, F>(names: I, mut lookup: F) -> Self
    where
        I: IntoIterator<Item = &'a str>,
        F: FnMut(&str) -> Option<H>,
    {
        let handles = names
            .into_iter()
            .map(|name| (name.to_string(), lookup(name)))
            .collect();
        Self { handles }
    }

    pub fn get(&self, name: &str) -> Option<&H> {
        self.handles.get(name).and_then(Option::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    /// True when the name was resolved but has no live handle.
    pub fn is_absent(&self, name: &str) -> bool {
        matches!(self.handles.get(name), Some(None))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn clear(&mut self) {
        self.handles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_dispatch_on_length() {
        assert_eq!(
            UniformValue::from_slice(&[1.0, 0.0, 0.0]).unwrap().kind(),
            UniformKind::Vec3
        );
        assert_eq!(
            UniformValue::from_slice(&[0.0; 9]).unwrap().kind(),
            UniformKind::Mat3
        );
        assert_eq!(
            UniformValue::from_slice(&[0.0; 16]).unwrap().kind(),
            UniformKind::Mat4
        );
        assert_eq!(
            UniformValue::from_slice(&[1.0, 0.0, 0.0, 1.0, 0.0]),
            Err(UniformError::UnsupportedLength(5))
        );
        assert_eq!(
            UniformValue::from_slice(&[1.0]),
            Err(UniformError::UnsupportedLength(1))
        );
    }

    #[test]
    fn inputs_reject_strings_and_nan() {
        assert_eq!(
            UniformValue::try_from(UniformInput::Text("red".into())),
            Err(UniformError::UnsupportedType("string"))
        );
        assert_eq!(
            UniformValue::try_from(UniformInput::Number(f64::NAN)),
            Err(UniformError::NonFinite)
        );
        assert_eq!(
            UniformValue::try_from(UniformInput::Bool(true)),
            Ok(UniformValue::Bool(true))
        );
    }

    #[test]
    fn inputs_deserialize_untagged() {
        let parsed: BTreeMap<String, UniformInput> =
            serde_json::from_str(r#"{"a": 1.5, "b": true, "c": [1, 0, 0], "d": "x"}"#).unwrap();
        assert_eq!(parsed["a"], UniformInput::Number(1.5));
        assert_eq!(parsed["b"], UniformInput::Bool(true));
        assert_eq!(parsed["c"], UniformInput::List(vec![1.0, 0.0, 0.0]));
        assert_eq!(parsed["d"], UniformInput::Text("x".into()));
    }

    #[test]
    fn from_inputs_skips_unsupported_shapes() {
        let map = UniformMap::from_inputs([
            ("tint", UniformInput::List(vec![1.0, 0.0, 0.0])),
            ("broken", UniformInput::List(vec![1.0, 0.0, 0.0, 1.0, 0.0])),
        ]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("tint"), Some(&UniformValue::Vec3([1.0, 0.0, 0.0])));
    }

    #[test]
    fn merge_replaces_existing_keys() {
        let mut map = UniformMap::new().with("a", 1.0f32).with("b", true);
        map.merge(UniformMap::new().with("a", 2.0f32).with("c", [0.0f32, 1.0]));
        assert_eq!(map.get("a"), Some(&UniformValue::Scalar(2.0)));
        assert_eq!(map.get("b"), Some(&UniformValue::Bool(true)));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn declarations_put_builtins_first_and_skip_shadowing() {
        let map = UniformMap::new()
            .with("u_time", 3.0f32)
            .with("u_color", [1.0f32, 1.0, 1.0, 1.0]);
        let decls = declarations(&map);
        let names: Vec<&str> = decls.iter().map(|decl| decl.name.as_str()).collect();
        assert_eq!(names, ["u_time", "u_resolution", "u_pixelRatio", "u_color"]);
        assert_eq!(decls[3].kind, UniformKind::Vec4);
    }

    #[test]
    fn table_distinguishes_absent_from_unknown() {
        let table = UniformTable::resolve(["u_time", "u_unused"], |name| {
            (name == "u_time").then_some(7u32)
        });
        assert_eq!(table.get("u_time"), Some(&7));
        assert!(table.is_absent("u_unused"));
        assert!(!table.contains("u_missing"));
        assert_eq!(table.get("u_missing"), None);
    }
}
