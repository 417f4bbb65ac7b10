//! Emitters for trigonometric nodes (Sin, Cos, Tan, ArcusCos, ArcusTan).

use crate::codegen::context::Context;
use crate::codegen::error::EmitError;
use crate::codegen::types::ValueType;
use crate::graph::GraphNode;

/// Component-wise trigonometric function of `Theta`.
///
/// # Inputs
/// - `Theta`: angle in radians (or cosine value for `ArcusCos`)
///
/// # Output
/// - `Output`: float of the input width
///
/// # Example
/// ```wgsl
/// let v1: f32 = sin(v0);
/// ```
pub fn emit_trig(cx: &mut Context<'_>, node: &GraphNode, function: &str) -> Result<(), EmitError> {
    let theta = cx.emit_numeric_input(node, "Theta")?;
    let ty = theta.ty.to_float();
    let e = cx.cast(node, &theta, ty)?;
    cx.assign(node, "Output", ty, format!("{function}({e})"))?;
    Ok(())
}

/// Angle of the 2D vector `XY`.
///
/// # Example
/// ```wgsl
/// let v1: f32 = atan2(v0.x, v0.y);
/// ```
pub fn emit_arcus_tan(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let xy = cx.emit_numeric_input(node, "XY")?;
    if xy.ty.width() < 2 {
        return Err(EmitError::type_mismatch(
            &node.id,
            format!("`XY` must have at least two components, got {:?}", xy.ty),
        ));
    }
    let e = cx.cast(node, &xy, ValueType::Float2)?;
    let expr = if e == xy.name {
        format!("atan2({e}.x, {e}.y)")
    } else {
        let v = cx.assign(node, "__xy", ValueType::Float2, e)?;
        format!("atan2({0}.x, {0}.y)", v.name)
    };
    cx.assign(node, "Output", ValueType::Float, expr)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{fragment_graph, fragment_source, generate, node, stage_error, test_connection};
    use crate::codegen::types::Stage;
    use serde_json::json;

    #[test]
    fn sin_of_integer_converts() {
        let (nodes, conns) = fragment_graph(
            vec![node("x", "Scalar", json!({ "value": 1.0 })), node("sin", "Sin", json!({}))],
            vec![test_connection("x", "Output", "sin", "Theta")],
            ("sin", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("let v1: f32 = sin(f32(v0));"), "{text}");
    }

    #[test]
    fn arcus_tan_reads_two_components() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("v", "Vector", json!({ "value": [0.5, 0.5, 0.0, 0.0] })),
                node("atan", "ArcusTan", json!({})),
            ],
            vec![test_connection("v", "Output", "atan", "XY")],
            ("atan", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("let v1: vec2f = v0.xy;"), "{text}");
        assert!(text.contains("let v2: f32 = atan2(v1.x, v1.y);"), "{text}");
    }

    #[test]
    fn arcus_tan_rejects_scalars() {
        let (nodes, conns) = fragment_graph(
            vec![node("x", "Scalar", json!({ "value": 0.5 })), node("atan", "ArcusTan", json!({}))],
            vec![test_connection("x", "Output", "atan", "XY")],
            ("atan", "Output"),
        );
        let program = generate(nodes, conns);
        assert!(stage_error(&program, Stage::Fragment).unwrap().contains("two components"));
    }
}
