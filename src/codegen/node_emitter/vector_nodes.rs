//! Emitters for vector and matrix nodes (Dot, Cross, Normalize, Length, Reflect,
//! Swizzle, MixIn, MixOut, MatrixIn, MatrixOut, Transform, Transpose).

use crate::codegen::context::Context;
use crate::codegen::error::EmitError;
use crate::codegen::types::{ValueType, Variable, cast_expr};
use crate::graph::GraphNode;
use crate::nodes::SwizzleParams;

use super::math_nodes::join_operands;

const COMPONENTS: [&str; 4] = ["X", "Y", "Z", "W"];
const AXES: [&str; 4] = ["XAxis", "YAxis", "ZAxis", "Translate"];

fn require_vector(node: &GraphNode, pin: &str, v: &Variable) -> Result<(), EmitError> {
    if v.ty.is_numeric() && v.ty.width() >= 2 {
        Ok(())
    } else {
        Err(EmitError::type_mismatch(
            &node.id,
            format!("`{pin}` must be a vector, got {:?}", v.ty),
        ))
    }
}

fn require_matrix(node: &GraphNode, pin: &str, v: &Variable) -> Result<(), EmitError> {
    if v.ty == ValueType::Float4x4 {
        Ok(())
    } else {
        Err(EmitError::type_mismatch(
            &node.id,
            format!("`{pin}` must be a matrix, got {:?}", v.ty),
        ))
    }
}

/// Dot product of `Input1` and `Input2`.
///
/// # Output
/// - `Output`: scalar of the joined family
///
/// # Example
/// ```wgsl
/// let v2: f32 = dot(v0, v1);
/// ```
pub fn emit_dot(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let a = cx.emit_input(node, "Input1")?;
    let b = cx.emit_input(node, "Input2")?;
    require_vector(node, "Input1", &a)?;
    require_vector(node, "Input2", &b)?;
    let (ea, eb, ty) = join_operands(cx, node, &a, &b)?;
    let scalar = if ty.is_integer() { ValueType::Integer } else { ValueType::Float };
    cx.assign(node, "Output", scalar, format!("dot({ea}, {eb})"))?;
    Ok(())
}

/// Cross product; both operands are taken as `vec3f`.
pub fn emit_cross(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let a = cx.emit_input(node, "Input1")?;
    let b = cx.emit_input(node, "Input2")?;
    require_vector(node, "Input1", &a)?;
    require_vector(node, "Input2", &b)?;
    let (ea, eb) = (cx.cast(node, &a, ValueType::Float3)?, cx.cast(node, &b, ValueType::Float3)?);
    cx.assign(node, "Output", ValueType::Float3, format!("cross({ea}, {eb})"))?;
    Ok(())
}

pub fn emit_normalize(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let v = cx.emit_input(node, "Input")?;
    require_vector(node, "Input", &v)?;
    let ty = v.ty.to_float();
    let e = cx.cast(node, &v, ty)?;
    cx.assign(node, "Output", ty, format!("normalize({e})"))?;
    Ok(())
}

pub fn emit_length(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let v = cx.emit_numeric_input(node, "Input")?;
    let e = cx.cast(node, &v, v.ty.to_float())?;
    cx.assign(node, "Output", ValueType::Float, format!("length({e})"))?;
    Ok(())
}

/// Reflect `Direction` about the surface `Normal`.
///
/// # Example
/// ```wgsl
/// let v2: vec3f = reflect(v1, v0);
/// ```
pub fn emit_reflect(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let n = cx.emit_input(node, "Normal")?;
    let d = cx.emit_input(node, "Direction")?;
    require_vector(node, "Normal", &n)?;
    require_vector(node, "Direction", &d)?;
    let ty = ValueType::promote(n.ty.to_float(), d.ty.to_float()).ok_or_else(|| {
        EmitError::type_mismatch(&node.id, format!("cannot reflect {:?} about {:?}", d.ty, n.ty))
    })?;
    let (en, ed) = (cx.cast(node, &n, ty)?, cx.cast(node, &d, ty)?);
    cx.assign(node, "Output", ty, format!("reflect({ed}, {en})"))?;
    Ok(())
}

/// Reorder components of `Input`.
///
/// The pattern uses `x`, `y`, `z`, `w` (or `r`, `g`, `b`, `a`) to select source
/// components and `0`/`1` for constants; its length (1 to 4) is the output width.
///
/// # Example
/// ```wgsl
/// let v1: vec3f = v0.zyx;
/// let v2: vec4f = vec4f(v0.x, v0.y, 0.0, 1.0);
/// ```
pub fn emit_swizzle(cx: &mut Context<'_>, node: &GraphNode, params: &SwizzleParams) -> Result<(), EmitError> {
    let v = cx.emit_numeric_input(node, "Input")?;
    let pattern = params.swizzle.trim();
    if pattern.is_empty() || pattern.len() > 4 {
        return Err(EmitError::type_mismatch(
            &node.id,
            format!("swizzle `{pattern}` must have one to four components"),
        ));
    }

    enum Part {
        Component(usize),
        Constant(&'static str),
    }
    let integer = v.ty.is_integer();
    let mut parts = Vec::with_capacity(pattern.len());
    for ch in pattern.chars() {
        let part = match ch {
            'x' | 'r' => Part::Component(0),
            'y' | 'g' => Part::Component(1),
            'z' | 'b' => Part::Component(2),
            'w' | 'a' => Part::Component(3),
            '0' => Part::Constant(if integer { "0" } else { "0.0" }),
            '1' => Part::Constant(if integer { "1" } else { "1.0" }),
            other => {
                return Err(EmitError::type_mismatch(
                    &node.id,
                    format!("invalid swizzle component `{other}`"),
                ));
            }
        };
        if let Part::Component(i) = part
            && i >= v.ty.width() as usize
        {
            return Err(EmitError::type_mismatch(
                &node.id,
                format!("swizzle `{pattern}` reads past the {} components of the input", v.ty.width()),
            ));
        }
        parts.push(part);
    }

    let width = parts.len() as u32;
    let ty = if integer { ValueType::integer(width) } else { ValueType::float(width) };
    let scalar_input = v.ty.width() == 1;
    let all_components = parts.iter().all(|p| matches!(p, Part::Component(_)));
    let expr = if all_components && !scalar_input {
        let mask: String = parts
            .iter()
            .filter_map(|p| match p {
                Part::Component(i) => Some(&"xyzw"[*i..=*i]),
                Part::Constant(_) => None,
            })
            .collect();
        format!("{}.{mask}", v.name)
    } else {
        let items: Vec<String> = parts
            .iter()
            .map(|p| match p {
                Part::Component(_) if scalar_input => v.name.clone(),
                Part::Component(i) => format!("{}.{}", v.name, &"xyzw"[*i..=*i]),
                Part::Constant(c) => c.to_string(),
            })
            .collect();
        if width == 1 {
            items.join("")
        } else {
            format!("{}({})", ty.wgsl(), items.join(", "))
        }
    };
    cx.assign(node, "Output", ty, expr)?;
    Ok(())
}

/// Concatenate `X`, `Y`, `Z`, `W` into one vector. Each connected input contributes
/// all of its components; inputs after the first gap are ignored.
///
/// # Example
/// ```wgsl
/// let v2: vec4f = vec4f(v0, v1);
/// ```
pub fn emit_mix_in(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let mut parts: Vec<Variable> = Vec::new();
    for pin in COMPONENTS {
        match cx.emit_optional_input(node, pin)? {
            Some(v) => {
                if !v.ty.is_numeric() {
                    return Err(EmitError::type_mismatch(
                        &node.id,
                        format!("`{pin}` must be a scalar or vector, got {:?}", v.ty),
                    ));
                }
                parts.push(v);
            }
            None if parts.is_empty() => {
                return Err(EmitError::UnconnectedInput {
                    node: node.id.clone(),
                    pin: pin.to_string(),
                });
            }
            None => break,
        }
    }
    let width: u32 = parts.iter().map(|v| v.ty.width()).sum();
    if width > 4 {
        return Err(EmitError::type_mismatch(
            &node.id,
            format!("inputs hold {width} components, more than a vector can"),
        ));
    }
    let integer = parts.iter().all(|v| v.ty.is_integer());
    let ty = if integer { ValueType::integer(width) } else { ValueType::float(width) };
    let mut items = Vec::with_capacity(parts.len());
    for v in &parts {
        let part_ty = if integer { v.ty } else { v.ty.to_float() };
        items.push(cx.cast(node, v, part_ty)?);
    }
    let expr = if width == 1 {
        items.join("")
    } else {
        format!("{}({})", ty.wgsl(), items.join(", "))
    };
    cx.assign(node, "Output", ty, expr)?;
    Ok(())
}

/// Split `Input` into scalar outputs `X`, `Y`, `Z`, `W`. Components the input
/// does not have read as zero.
pub fn emit_mix_out(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let v = cx.emit_numeric_input(node, "Input")?;
    let width = v.ty.width() as usize;
    let scalar = if v.ty.is_integer() { ValueType::Integer } else { ValueType::Float };
    let zero = if v.ty.is_integer() { "0" } else { "0.0" };
    for (i, pin) in COMPONENTS.iter().enumerate() {
        let name = match (width, i) {
            (1, 0) => v.name.clone(),
            (w, i) if i < w => format!("{}.{}", v.name, &"xyzw"[i..=i]),
            _ => zero.to_string(),
        };
        cx.shader().create_variable(Some(node.output(pin)), name, scalar);
    }
    Ok(())
}

/// Build a matrix from three axes and a translation. Missing axes fall back to
/// the identity columns.
///
/// # Example
/// ```wgsl
/// let v3: mat4x4f = mat4x4f(vec4f(v0, 0.0), vec4f(v1, 0.0), vec4f(0.0, 0.0, 1.0, 0.0), vec4f(v2, 1.0));
/// ```
pub fn emit_matrix_in(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let identity = [
        "vec4f(1.0, 0.0, 0.0, 0.0)",
        "vec4f(0.0, 1.0, 0.0, 0.0)",
        "vec4f(0.0, 0.0, 1.0, 0.0)",
        "vec4f(0.0, 0.0, 0.0, 1.0)",
    ];
    let mut columns = Vec::with_capacity(4);
    for (i, pin) in AXES.iter().enumerate() {
        let column = match cx.emit_optional_input(node, pin)? {
            Some(v) => {
                if !v.ty.is_numeric() {
                    return Err(EmitError::type_mismatch(
                        &node.id,
                        format!("`{pin}` must be a vector, got {:?}", v.ty),
                    ));
                }
                let w = if i == 3 { "1.0" } else { "0.0" };
                format!("vec4f({}, {w})", cx.cast(node, &v, ValueType::Float3)?)
            }
            None => identity[i].to_string(),
        };
        columns.push(column);
    }
    cx.assign(node, "Output", ValueType::Float4x4, format!("mat4x4f({})", columns.join(", ")))?;
    Ok(())
}

/// Split a matrix into `XAxis`, `YAxis`, `ZAxis` and `Translate` (`vec3f` each).
pub fn emit_matrix_out(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let m = cx.emit_input(node, "Input")?;
    require_matrix(node, "Input", &m)?;
    for (i, pin) in AXES.iter().enumerate() {
        cx.shader()
            .create_variable(Some(node.output(pin)), format!("{}[{i}].xyz", m.name), ValueType::Float3);
    }
    Ok(())
}

/// Apply the matrix `Transform` to `Input`, widened to `vec4f`.
///
/// # Example
/// ```wgsl
/// let v1: vec4f = UbDraw.world * v0;
/// ```
pub fn emit_transform(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let v = cx.emit_numeric_input(node, "Input")?;
    let m = cx.emit_input(node, "Transform")?;
    require_matrix(node, "Transform", &m)?;
    let ev = cast_expr(&v.name, v.ty, ValueType::Float4).ok_or_else(|| {
        EmitError::type_mismatch(&node.id, format!("cannot transform {:?}", v.ty))
    })?;
    cx.assign(node, "Output", ValueType::Float4, format!("{} * {ev}", m.name))?;
    Ok(())
}

pub fn emit_transpose(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let m = cx.emit_input(node, "Input")?;
    require_matrix(node, "Input", &m)?;
    cx.assign(node, "Output", ValueType::Float4x4, format!("transpose({})", m.name))?;
    Ok(())
}
