//! Emitters for arithmetic nodes (Add, Sub, Mul, Div, Min, Max, Step, unary math,
//! MulAdd, Lerp, Clamp, Pow, Polynomial, Log, Derivative).

use crate::codegen::context::Context;
use crate::codegen::error::EmitError;
use crate::codegen::types::{Stage, ValueType, Variable, expand_scalar};
use crate::codegen::utils::is_integral;
use crate::graph::GraphNode;
use crate::nodes::{Axis, ClampParams, DerivativeParams, LogBase, LogParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Step,
}

impl BinaryOp {
    fn expr(self, a: &str, b: &str) -> String {
        match self {
            BinaryOp::Add => format!("{a} + {b}"),
            BinaryOp::Sub => format!("{a} - {b}"),
            BinaryOp::Mul => format!("{a} * {b}"),
            BinaryOp::Div => format!("{a} / {b}"),
            BinaryOp::Min => format!("min({a}, {b})"),
            BinaryOp::Max => format!("max({a}, {b})"),
            BinaryOp::Step => format!("step({a}, {b})"),
        }
    }

    fn float_only(self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Step)
    }
}

/// Join the operand types for arithmetic and cast both operands into the result.
pub(crate) fn join_operands(
    cx: &Context<'_>,
    node: &GraphNode,
    a: &Variable,
    b: &Variable,
) -> Result<(String, String, ValueType), EmitError> {
    let ty = ValueType::arithmetic(a.ty, b.ty).ok_or_else(|| {
        EmitError::type_mismatch(
            &node.id,
            format!("operands {:?} and {:?} have no common type", a.ty, b.ty),
        )
    })?;
    Ok((cx.cast(node, a, ty)?, cx.cast(node, b, ty)?, ty))
}

/// Emit a two-operand node.
///
/// Operands are joined by [`ValueType::arithmetic`]: mixed integer and float
/// operands convert to float, then the narrower operand is widened. `Div` and
/// `Step` always compute in float. Matrices only combine with matrices; use a
/// `Transform` node to apply a matrix to a vector.
///
/// # Inputs
/// - `Input1`, `Input2`: operands (`Step`: `Input1` is the edge, `Input2` the value)
///
/// # Output
/// - `Output`: joined operand type
///
/// # Example
/// ```wgsl
/// let v2: vec4f = vec4f(f32(v0)) + v1;
/// ```
pub fn emit_binary(cx: &mut Context<'_>, node: &GraphNode, op: BinaryOp) -> Result<(), EmitError> {
    let a = cx.emit_input(node, "Input1")?;
    let b = cx.emit_input(node, "Input2")?;

    let matrix = a.ty == ValueType::Float4x4 || b.ty == ValueType::Float4x4;
    if matrix {
        if a.ty != b.ty {
            return Err(EmitError::type_mismatch(
                &node.id,
                format!(
                    "cannot combine {:?} with {:?}; use a Transform node for matrix-vector products",
                    a.ty, b.ty
                ),
            ));
        }
        if !matches!(op, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul) {
            return Err(EmitError::type_mismatch(
                &node.id,
                format!("{op:?} is not defined for matrices"),
            ));
        }
        cx.assign(node, "Output", ValueType::Float4x4, op.expr(&a.name, &b.name))?;
        return Ok(());
    }

    if !a.ty.is_numeric() || !b.ty.is_numeric() {
        return Err(EmitError::type_mismatch(
            &node.id,
            format!("operands must be scalars or vectors, got {:?} and {:?}", a.ty, b.ty),
        ));
    }
    let (ea, eb, ty) = if op.float_only() {
        let ty = ValueType::float(a.ty.width().max(b.ty.width()));
        (cx.cast(node, &a, ty)?, cx.cast(node, &b, ty)?, ty)
    } else {
        join_operands(cx, node, &a, &b)?
    };
    cx.assign(node, "Output", ty, op.expr(&ea, &eb))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Abs,
    Neg,
    Sign,
    Exp,
    Fraction,
    Round,
    Truncate,
    Sqrt,
    RecipSqrt,
}

impl UnaryOp {
    /// Operations that keep integer operands integer.
    fn keeps_integer(self) -> bool {
        matches!(self, UnaryOp::Abs | UnaryOp::Neg | UnaryOp::Sign)
    }

    fn expr(self, x: &str) -> String {
        match self {
            UnaryOp::Abs => format!("abs({x})"),
            UnaryOp::Neg => format!("-{x}"),
            UnaryOp::Sign => format!("sign({x})"),
            UnaryOp::Exp => format!("exp({x})"),
            UnaryOp::Fraction => format!("fract({x})"),
            UnaryOp::Round => format!("round({x})"),
            UnaryOp::Truncate => format!("trunc({x})"),
            UnaryOp::Sqrt => format!("sqrt({x})"),
            UnaryOp::RecipSqrt => format!("inverseSqrt({x})"),
        }
    }
}

/// Emit a component-wise unary node over `Input`.
pub fn emit_unary(cx: &mut Context<'_>, node: &GraphNode, op: UnaryOp) -> Result<(), EmitError> {
    let x = cx.emit_numeric_input(node, "Input")?;
    let ty = if op.keeps_integer() { x.ty } else { x.ty.to_float() };
    let e = cx.cast(node, &x, ty)?;
    cx.assign(node, "Output", ty, op.expr(&e))?;
    Ok(())
}

/// Logarithm in base two, ten or e.
///
/// # Example
/// ```wgsl
/// let v1: f32 = log2(v0) * 0.301029996;
/// ```
pub fn emit_log(cx: &mut Context<'_>, node: &GraphNode, params: &LogParams) -> Result<(), EmitError> {
    let x = cx.emit_numeric_input(node, "Input")?;
    let ty = x.ty.to_float();
    let e = cx.cast(node, &x, ty)?;
    let expr = match params.base {
        LogBase::Two => format!("log2({e})"),
        LogBase::Natural => format!("log({e})"),
        LogBase::Ten => format!("log2({e}) * 0.301029996"),
    };
    cx.assign(node, "Output", ty, expr)?;
    Ok(())
}

/// Screen-space derivative; fragment stage only.
pub fn emit_derivative(cx: &mut Context<'_>, node: &GraphNode, params: &DerivativeParams) -> Result<(), EmitError> {
    cx.require_stage(node, "Derivative", &[Stage::Fragment])?;
    let x = cx.emit_numeric_input(node, "Input")?;
    let ty = x.ty.to_float();
    let e = cx.cast(node, &x, ty)?;
    let f = match params.axis {
        Axis::X => "dpdx",
        Axis::Y => "dpdy",
    };
    cx.assign(node, "Output", ty, format!("{f}({e})"))?;
    Ok(())
}

/// `Input1 * Input2 + Input3` over the join of all three operand types.
pub fn emit_mul_add(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let a = cx.emit_numeric_input(node, "Input1")?;
    let b = cx.emit_numeric_input(node, "Input2")?;
    let c = cx.emit_numeric_input(node, "Input3")?;
    let ty = ValueType::arithmetic(a.ty, b.ty)
        .and_then(|ab| ValueType::arithmetic(ab, c.ty))
        .ok_or_else(|| {
            EmitError::type_mismatch(
                &node.id,
                format!("operands {:?}, {:?} and {:?} have no common type", a.ty, b.ty, c.ty),
            )
        })?;
    let (ea, eb, ec) = (cx.cast(node, &a, ty)?, cx.cast(node, &b, ty)?, cx.cast(node, &c, ty)?);
    cx.assign(node, "Output", ty, format!("{ea} * {eb} + {ec}"))?;
    Ok(())
}

/// Linear blend between `Input1` and `Input2`.
///
/// # Inputs
/// - `Input1`, `Input2`: endpoints
/// - `Blend`: scalar or per-component factor
///
/// # Example
/// ```wgsl
/// let v3: vec3f = mix(v0, v1, v2);
/// ```
pub fn emit_lerp(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let a = cx.emit_numeric_input(node, "Input1")?;
    let b = cx.emit_numeric_input(node, "Input2")?;
    let t = cx.emit_numeric_input(node, "Blend")?;
    let ty = ValueType::promote(a.ty.to_float(), b.ty.to_float()).ok_or_else(|| {
        EmitError::type_mismatch(&node.id, format!("cannot blend {:?} with {:?}", a.ty, b.ty))
    })?;
    let blend_ty = if t.ty.width() == 1 { ValueType::Float } else { ty };
    let (ea, eb, et) = (cx.cast(node, &a, ty)?, cx.cast(node, &b, ty)?, cx.cast(node, &t, blend_ty)?);
    cx.assign(node, "Output", ty, format!("mix({ea}, {eb}, {et})"))?;
    Ok(())
}

/// Clamp `Input` into `[min, max]`; the bounds are splatted to the input width.
/// An integer input is converted to float when either bound is fractional.
pub fn emit_clamp(cx: &mut Context<'_>, node: &GraphNode, params: &ClampParams) -> Result<(), EmitError> {
    let x = cx.emit_numeric_input(node, "Input")?;
    let ty = if x.ty.is_integer() && !(is_integral(params.min) && is_integral(params.max)) {
        x.ty.to_float()
    } else {
        x.ty
    };
    let ex = cx.cast(node, &x, ty)?;
    let lo = expand_scalar(params.min, ty);
    let hi = expand_scalar(params.max, ty);
    cx.assign(node, "Output", ty, format!("clamp({ex}, {lo}, {hi})"))?;
    Ok(())
}

/// `Input` raised to `Exponent`. The base is clamped at zero so negative bases
/// never reach `pow`.
///
/// # Example
/// ```wgsl
/// let v2: vec3f = pow(max(v0, vec3f(0.0)), vec3f(v1));
/// ```
pub fn emit_pow(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let x = cx.emit_numeric_input(node, "Input")?;
    let e = cx.emit_numeric_input(node, "Exponent")?;
    let ty = ValueType::promote(x.ty.to_float(), e.ty.to_float()).ok_or_else(|| {
        EmitError::type_mismatch(&node.id, format!("cannot raise {:?} to {:?}", x.ty, e.ty))
    })?;
    let (ex, ee) = (cx.cast(node, &x, ty)?, cx.cast(node, &e, ty)?);
    let zero = expand_scalar(0.0, ty);
    cx.assign(node, "Output", ty, format!("pow(max({ex}, {zero}), {ee})"))?;
    Ok(())
}

/// Cubic polynomial in `X` with coefficients `Coefficients.xyzw` (constant term first),
/// evaluated in Horner form.
pub fn emit_polynomial(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let x = cx.emit_numeric_input(node, "X")?;
    let c = cx.emit_numeric_input(node, "Coefficients")?;
    let ty = x.ty.to_float();
    let ex = cx.cast(node, &x, ty)?;
    let width = c.ty.width() as usize;
    let ec = cx.cast(node, &c, ValueType::float(c.ty.width()))?;
    let coefficient = |i: usize| {
        if width == 1 {
            ec.clone()
        } else {
            format!("{ec}.{}", &"xyzw"[i..=i])
        }
    };
    let mut expr = coefficient(width - 1);
    for i in (0..width - 1).rev() {
        expr = format!("({expr}) * {ex} + {}", coefficient(i));
    }
    if width == 1 {
        expr = format!("{ty}({expr})", ty = ty.wgsl());
    }
    cx.assign(node, "Output", ty, expr)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{fragment_graph, fragment_source, generate, node, stage_error, test_connection};
    use crate::codegen::types::Stage;
    use serde_json::json;

    #[test]
    fn scalar_plus_vector_widens_scalar() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("s", "Scalar", json!({ "value": 2.0 })),
                node("v", "Vector", json!({ "value": [0.5, 1.0, 1.0, 1.0] })),
                node("add", "Add", json!({})),
            ],
            vec![
                test_connection("s", "Output", "add", "Input1"),
                test_connection("v", "Output", "add", "Input2"),
            ],
            ("add", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("let v0: i32 = 2;"), "{text}");
        assert!(text.contains("let v2: vec4f = vec4f(f32(v0)) + v1;"), "{text}");
    }

    #[test]
    fn division_is_always_float() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("a", "Scalar", json!({ "value": 3.0 })),
                node("b", "Scalar", json!({ "value": 2.0 })),
                node("div", "Div", json!({})),
            ],
            vec![
                test_connection("a", "Output", "div", "Input1"),
                test_connection("b", "Output", "div", "Input2"),
            ],
            ("div", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("let v2: f32 = f32(v0) / f32(v1);"), "{text}");
    }

    #[test]
    fn matrix_times_vector_is_rejected() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("m", "Uniform", json!({ "parameterName": "world", "parameterType": "Matrix" })),
                node("v", "Vector", json!({ "value": [0.5, 1.0, 1.0, 1.0] })),
                node("mul", "Mul", json!({})),
            ],
            vec![
                test_connection("m", "Output", "mul", "Input1"),
                test_connection("v", "Output", "mul", "Input2"),
            ],
            ("mul", "Output"),
        );
        let program = generate(nodes, conns);
        let err = stage_error(&program, Stage::Fragment).unwrap();
        assert!(err.contains("mul") && err.contains("Transform"), "{err}");
    }

    #[test]
    fn clamp_keeps_fractional_bounds_on_integers() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("i", "Scalar", json!({ "value": 3.0 })),
                node("c", "Clamp", json!({ "min": 0.5, "max": 2.0 })),
                node("k", "Clamp", json!({ "min": 0.0, "max": 2.0 })),
            ],
            vec![
                test_connection("i", "Output", "c", "Input"),
                test_connection("c", "Output", "k", "Input"),
            ],
            ("k", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("let v1: f32 = clamp(f32(v0), 0.5, 2.0);"), "{text}");
        assert!(text.contains("let v2: f32 = clamp(v1, 0.0, 2.0);"), "{text}");
    }

    #[test]
    fn clamp_with_integral_bounds_stays_integer() {
        let (nodes, conns) = fragment_graph(
            vec![node("i", "Scalar", json!({ "value": 3.0 })), node("c", "Clamp", json!({ "min": 0.0, "max": 2.0 }))],
            vec![test_connection("i", "Output", "c", "Input")],
            ("c", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("let v1: i32 = clamp(v0, 0, 2);"), "{text}");
    }

    #[test]
    fn pow_clamps_base() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("x", "Vector", json!({ "value": [0.5, 0.25, 0.5, 1.0] })),
                node("e", "Scalar", json!({ "value": 2.2 })),
                node("pow", "Pow", json!({})),
            ],
            vec![
                test_connection("x", "Output", "pow", "Input"),
                test_connection("e", "Output", "pow", "Exponent"),
            ],
            ("pow", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("pow(max(v0, vec4f(0.0)), vec4f(v1))"), "{text}");
    }

    #[test]
    fn log_ten_uses_log2() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("x", "Scalar", json!({ "value": 0.5 })),
                node("log", "Log", json!({ "base": "Ten" })),
            ],
            vec![test_connection("x", "Output", "log", "Input")],
            ("log", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("let v1: f32 = log2(v0) * 0.301029996;"), "{text}");
    }

    #[test]
    fn derivative_is_fragment_only() {
        let nodes = vec![
            node("x", "Vector", json!({ "value": [0.5, 0.25, 0.5, 1.0] })),
            node("d", "Derivative", json!({})),
            node("vout", "VertexOutput", json!({})),
            node("c", "Vector", json!({ "value": [1.0, 0.0, 0.0, 1.0] })),
            node("pout", "PixelOutput", json!({})),
        ];
        let conns = vec![
            test_connection("x", "Output", "d", "Input"),
            test_connection("d", "Output", "vout", "Input"),
            test_connection("c", "Output", "pout", "Input"),
        ];
        let program = generate(nodes, conns);
        let err = stage_error(&program, Stage::Vertex).unwrap();
        assert!(err.contains("not available in the vertex stage"), "{err}");
        assert!(program.stage(Stage::Fragment).unwrap().source.is_some());
    }

    #[test]
    fn unconnected_operand_names_node() {
        let (nodes, conns) = fragment_graph(
            vec![node("x", "Scalar", json!({ "value": 0.5 })), node("add", "Add", json!({}))],
            vec![test_connection("x", "Output", "add", "Input1")],
            ("add", "Output"),
        );
        let program = generate(nodes, conns);
        let diag = &program.stage(Stage::Fragment).unwrap().diagnostics[0];
        assert_eq!(diag.node.as_deref(), Some("add"));
        assert!(diag.message.contains("`Input2` is not connected"));
    }
}
