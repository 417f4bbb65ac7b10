//! Value type lattice, pipeline stages and generated variables.

use serde::Serialize;

use crate::graph::OutputPin;
use crate::nodes::{DataType, ParameterType};

use super::utils::fmt_f32;

/// Shader value kinds. Float and integer families are parallel chains ordered by
/// width; `Void` sits below everything; matrices and opaque kinds only relate to
/// themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ValueType {
    Void,
    Boolean,
    Float,
    Float2,
    Float3,
    Float4,
    Float4x4,
    Integer,
    Integer2,
    Integer3,
    Integer4,
    Texture2D,
    Texture3D,
    TextureCube,
    StructBuffer,
    Image2D,
    Image3D,
    ImageCube,
}

impl ValueType {
    pub const ALL: [ValueType; 18] = [
        ValueType::Void,
        ValueType::Boolean,
        ValueType::Float,
        ValueType::Float2,
        ValueType::Float3,
        ValueType::Float4,
        ValueType::Float4x4,
        ValueType::Integer,
        ValueType::Integer2,
        ValueType::Integer3,
        ValueType::Integer4,
        ValueType::Texture2D,
        ValueType::Texture3D,
        ValueType::TextureCube,
        ValueType::StructBuffer,
        ValueType::Image2D,
        ValueType::Image3D,
        ValueType::ImageCube,
    ];

    /// Returns the WGSL type name for declarable value types.
    pub fn wgsl(self) -> &'static str {
        match self {
            ValueType::Void => "void",
            ValueType::Boolean => "bool",
            ValueType::Float => "f32",
            ValueType::Float2 => "vec2f",
            ValueType::Float3 => "vec3f",
            ValueType::Float4 => "vec4f",
            ValueType::Float4x4 => "mat4x4f",
            ValueType::Integer => "i32",
            ValueType::Integer2 => "vec2i",
            ValueType::Integer3 => "vec3i",
            ValueType::Integer4 => "vec4i",
            ValueType::Texture2D => "texture_2d<f32>",
            ValueType::Texture3D => "texture_3d<f32>",
            ValueType::TextureCube => "texture_cube<f32>",
            ValueType::StructBuffer => "array",
            ValueType::Image2D => "texture_storage_2d<rgba32float, write>",
            ValueType::Image3D => "texture_storage_3d<rgba32float, write>",
            ValueType::ImageCube => "texture_storage_2d_array<rgba32float, write>",
        }
    }

    /// Number of scalar components; zero for non-numeric kinds.
    pub fn width(self) -> u32 {
        match self {
            ValueType::Boolean | ValueType::Float | ValueType::Integer => 1,
            ValueType::Float2 | ValueType::Integer2 => 2,
            ValueType::Float3 | ValueType::Integer3 => 3,
            ValueType::Float4 | ValueType::Integer4 => 4,
            ValueType::Float4x4 => 16,
            _ => 0,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            ValueType::Float | ValueType::Float2 | ValueType::Float3 | ValueType::Float4
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ValueType::Integer | ValueType::Integer2 | ValueType::Integer3 | ValueType::Integer4
        )
    }

    /// Scalar or vector of either numeric family.
    pub fn is_numeric(self) -> bool {
        self.is_float() || self.is_integer()
    }

    pub fn is_scalar(self) -> bool {
        matches!(self, ValueType::Float | ValueType::Integer | ValueType::Boolean)
    }

    pub fn is_texture(self) -> bool {
        matches!(
            self,
            ValueType::Texture2D | ValueType::Texture3D | ValueType::TextureCube
        )
    }

    pub fn is_image(self) -> bool {
        matches!(
            self,
            ValueType::Image2D | ValueType::Image3D | ValueType::ImageCube
        )
    }

    /// Types that may appear in a `let`/`var` declaration.
    pub fn is_declarable(self) -> bool {
        self.is_numeric() || self == ValueType::Float4x4 || self == ValueType::Boolean
    }

    pub fn float(width: u32) -> ValueType {
        match width {
            1 => ValueType::Float,
            2 => ValueType::Float2,
            3 => ValueType::Float3,
            _ => ValueType::Float4,
        }
    }

    pub fn integer(width: u32) -> ValueType {
        match width {
            1 => ValueType::Integer,
            2 => ValueType::Integer2,
            3 => ValueType::Integer3,
            _ => ValueType::Integer4,
        }
    }

    /// Same width in the float family; other kinds are returned unchanged.
    pub fn to_float(self) -> ValueType {
        if self.is_integer() || self == ValueType::Boolean {
            ValueType::float(self.width())
        } else {
            self
        }
    }

    /// Narrowest common type of `a` and `b`, or `None` when they are not ordered.
    ///
    /// Integer and float families never promote into each other; callers that mix
    /// them decide the numeric kind first (see [`ValueType::to_float`]).
    pub fn promote(a: ValueType, b: ValueType) -> Option<ValueType> {
        if a == b {
            return Some(a);
        }
        match (a, b) {
            (ValueType::Void, other) | (other, ValueType::Void) => Some(other),
            (x, y) if x.is_float() && y.is_float() => Some(ValueType::float(x.width().max(y.width()))),
            (x, y) if x.is_integer() && y.is_integer() => {
                Some(ValueType::integer(x.width().max(y.width())))
            }
            _ => None,
        }
    }

    /// Lattice order: `a <= b` when `b` can hold `a` without a kind decision.
    pub fn le(a: ValueType, b: ValueType) -> bool {
        ValueType::promote(a, b) == Some(b)
    }

    /// Join for arithmetic: converts to float when families differ, then promotes.
    pub fn arithmetic(a: ValueType, b: ValueType) -> Option<ValueType> {
        if !(a.is_numeric() || a == ValueType::Boolean) || !(b.is_numeric() || b == ValueType::Boolean) {
            return ValueType::promote(a, b);
        }
        if a.is_integer() && b.is_integer() {
            ValueType::promote(a, b)
        } else {
            ValueType::promote(a.to_float(), b.to_float())
        }
    }

    pub fn from_parameter(ty: ParameterType) -> ValueType {
        match ty {
            ParameterType::Scalar => ValueType::Float,
            ParameterType::Vector => ValueType::Float4,
            ParameterType::Matrix => ValueType::Float4x4,
            ParameterType::Texture2D => ValueType::Texture2D,
            ParameterType::Texture3D => ValueType::Texture3D,
            ParameterType::TextureCube => ValueType::TextureCube,
            ParameterType::StructBuffer => ValueType::StructBuffer,
            ParameterType::Image2D => ValueType::Image2D,
            ParameterType::Image3D => ValueType::Image3D,
            ParameterType::ImageCube => ValueType::ImageCube,
        }
    }

    /// Shader-visible type of a vertex attribute or structured-buffer element.
    pub fn from_data_type(ty: DataType) -> ValueType {
        match ty {
            DataType::Float1 => ValueType::Float,
            DataType::Float2 | DataType::Short2N | DataType::Half2 => ValueType::Float2,
            DataType::Float3 => ValueType::Float3,
            DataType::Float4 | DataType::Byte4N | DataType::Short4N | DataType::Half4 => {
                ValueType::Float4
            }
            DataType::Short2 => ValueType::Integer2,
            DataType::Byte4 | DataType::Short4 => ValueType::Integer4,
            DataType::Integer1 => ValueType::Integer,
            DataType::Integer2 => ValueType::Integer2,
            DataType::Integer3 => ValueType::Integer3,
            DataType::Integer4 => ValueType::Integer4,
        }
    }
}

/// Build a cast expression for `expr` from `from` into `to`.
///
/// Numeric kinds convert first (`f32(x)`, `vec3i(v)`), then widths adjust:
/// scalars splat, narrow vectors pad with zero, wide vectors swizzle down.
/// Returns `None` when `to` is not reachable from `from`.
pub fn cast_expr(expr: &str, from: ValueType, to: ValueType) -> Option<String> {
    if from == to {
        return Some(expr.to_string());
    }
    let numeric = |t: ValueType| t.is_numeric() || t == ValueType::Boolean;
    if !numeric(from) || !numeric(to) {
        return None;
    }
    if to == ValueType::Boolean {
        return None;
    }

    // Kind conversion at the source width.
    let (expr, from) = if to.is_float() && !from.is_float() {
        let t = ValueType::float(from.width());
        (format!("{}({expr})", t.wgsl()), t)
    } else if to.is_integer() && !from.is_integer() {
        let t = ValueType::integer(from.width());
        (format!("{}({expr})", t.wgsl()), t)
    } else {
        (expr.to_string(), from)
    };
    if from == to {
        return Some(expr);
    }

    let (fw, tw) = (from.width(), to.width());
    Some(if fw == 1 {
        format!("{}({expr})", to.wgsl())
    } else if fw < tw {
        let zero = zero_literal(to);
        let pad = vec![zero; (tw - fw) as usize].join(", ");
        format!("{}({expr}, {pad})", to.wgsl())
    } else {
        format!("{expr}.{}", &"xyzw"[..tw as usize])
    })
}

fn zero_literal(ty: ValueType) -> &'static str {
    if ty.is_integer() { "0" } else { "0.0" }
}

/// Literal of `value` in type `ty` (splatted for vectors).
pub fn expand_scalar(value: f32, ty: ValueType) -> String {
    match ty {
        ValueType::Float => fmt_f32(value),
        ValueType::Integer => format!("{}", value as i32),
        ValueType::Boolean => (value != 0.0).to_string(),
        ValueType::Float4x4 => {
            if value == 0.0 {
                "mat4x4f()".to_string()
            } else {
                let v = fmt_f32(value);
                let z = "0.0";
                format!(
                    "mat4x4f({v}, {z}, {z}, {z}, {z}, {v}, {z}, {z}, {z}, {z}, {v}, {z}, {z}, {z}, {z}, {v})"
                )
            }
        }
        t if t.is_integer() => format!("{}({})", t.wgsl(), value as i32),
        t => format!("{}({})", t.wgsl(), fmt_f32(value)),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Stage {
    Vertex,
    Fragment,
    Compute,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Vertex, Stage::Fragment, Stage::Compute];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
            Stage::Compute => "compute",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A generated identifier bound to the output pin that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub pin: Option<OutputPin>,
    pub name: String,
    pub ty: ValueType,
}

impl Variable {
    pub fn new(pin: Option<OutputPin>, name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            pin,
            name: name.into(),
            ty,
        }
    }

    pub fn cast(&self, to: ValueType) -> Option<String> {
        cast_expr(&self.name, self.ty, to)
    }
}
