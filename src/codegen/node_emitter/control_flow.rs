//! Emitters for branching nodes (Conditional, Discard, Switch).
//!
//! Branch bodies are generated into captured text inside their own scope. The
//! output variable is declared only once every branch type is known, then each
//! captured body is spliced back followed by a cast assignment into the output.

use crate::codegen::context::Context;
use crate::codegen::error::EmitError;
use crate::codegen::types::{Stage, ValueType, Variable, expand_scalar};
use crate::graph::GraphNode;
use crate::nodes::{Comparison, ConditionalParams, DiscardParams, SwitchParams};

use super::math_nodes::join_operands;

/// `a OP b`, reduced with `all`/`any` for vector operands.
fn comparison(a: &str, b: &str, op: Comparison, ty: ValueType, reduce: &str) -> String {
    if ty.is_scalar() {
        format!("{a} {} {b}", op.wgsl())
    } else {
        format!("{reduce}({a} {} {b})", op.wgsl())
    }
}

fn join_branches(node: &GraphNode, types: impl IntoIterator<Item = ValueType>) -> Result<ValueType, EmitError> {
    let mut joined = ValueType::Void;
    for ty in types {
        joined = ValueType::arithmetic(joined, ty).ok_or_else(|| {
            EmitError::type_mismatch(
                &node.id,
                format!("branch types {joined:?} and {ty:?} have no common type"),
            )
        })?;
    }
    Ok(joined)
}

/// Select between two branches by comparing `Input` against `Reference`.
///
/// Values used by both branches are hoisted in front of the `if`. The output type
/// is the join of both branch types.
///
/// # Example
/// ```wgsl
/// var v2: vec2f;
/// if (v0 < v1) {
///     let v3: f32 = 0.5;
///     v2 = vec2f(v3);
/// } else {
///     v2 = v4;
/// }
/// ```
pub fn emit_conditional(cx: &mut Context<'_>, node: &GraphNode, params: &ConditionalParams) -> Result<(), EmitError> {
    let graph = cx.graph();
    cx.hoist(&graph.find_common_outputs(node.index, &["CaseTrue", "CaseFalse"]))?;

    let input = cx.emit_numeric_input(node, "Input")?;
    let reference = cx.emit_numeric_input(node, "Reference")?;
    let (a, b, compare_ty) = join_operands(cx, node, &input, &reference)?;

    let out = cx.reserve_output(node, "Output");
    let (true_text, case_true) = cx.capture(1, |cx| cx.emit_input(node, "CaseTrue"))?;
    let (false_text, case_false) = cx.capture(1, |cx| cx.emit_input(node, "CaseFalse"))?;

    let ty = join_branches(node, [case_true.ty, case_false.ty])?;
    let out = cx.declare_reserved(node, &out, ty)?;
    let true_value = cx.cast(node, &case_true, ty)?;
    let false_value = cx.cast(node, &case_false, ty)?;

    cx.control_flow_attribute(params.branch);
    cx.write(format!(
        "if ({}) {{",
        comparison(&a, &b, params.operator, compare_ty, "all")
    ));
    cx.write_raw(&true_text);
    cx.write_nested(format!("{} = {true_value};", out.name));
    cx.write("} else {");
    cx.write_raw(&false_text);
    cx.write_nested(format!("{} = {false_value};", out.name));
    cx.write("}");
    Ok(())
}

/// Discard the fragment unless `Input OP Reference` holds; `Output` passes `Pass` through.
///
/// # Example
/// ```wgsl
/// if (v0 >= v1) {
///     discard;
/// }
/// ```
pub fn emit_discard(cx: &mut Context<'_>, node: &GraphNode, params: &DiscardParams) -> Result<(), EmitError> {
    cx.require_stage(node, "Discard", &[Stage::Fragment])?;
    let input = cx.emit_numeric_input(node, "Input")?;
    let reference = cx.emit_numeric_input(node, "Reference")?;
    let (a, b, ty) = join_operands(cx, node, &input, &reference)?;

    cx.control_flow_attribute(params.branch);
    cx.write(format!(
        "if ({}) {{",
        comparison(&a, &b, params.operator.inverted(), ty, "any")
    ));
    cx.write_nested("discard;");
    cx.write("}");

    let pass = cx.emit_input(node, "Pass")?;
    cx.shader()
        .create_variable(Some(node.output("Output")), pass.name, pass.ty);
    Ok(())
}

fn channel_pin(base: &str, width: u32, channel: u32) -> String {
    if width > 1 { format!("{base}{channel}") } else { base.to_string() }
}

fn case_pin(value: i32, width: u32, channel: u32) -> String {
    if width > 1 {
        format!("Case{value}_{channel}")
    } else {
        format!("Case{value}")
    }
}

/// One captured branch of a switch: its text and the value of every channel.
struct SwitchBranch {
    text: String,
    values: Vec<Option<Variable>>,
}

fn capture_branch(cx: &mut Context<'_>, node: &GraphNode, pins: &[String]) -> Result<SwitchBranch, EmitError> {
    let (text, values) = cx.capture(1, |cx| {
        pins.iter()
            .map(|pin| cx.emit_optional_input(node, pin))
            .collect::<Result<Vec<_>, _>>()
    })?;
    Ok(SwitchBranch { text, values })
}

/// Multi-way selection on the integer value of `Select`.
///
/// With `width` above one every case carries `width` channels (`Case{v}_{c}`,
/// `Default{c}`, `Output{c}`). Outputs start at zero; an unconnected case channel
/// keeps that value.
///
/// # Example
/// ```wgsl
/// var v1: f32 = 0.0;
/// if (i32(v0) == 0) {
///     v1 = 1.0;
/// } else if (i32(v0) == 1) {
///     v1 = 2.0;
/// } else {
///     v1 = 3.0;
/// }
/// ```
pub fn emit_switch(cx: &mut Context<'_>, node: &GraphNode, params: &SwitchParams) -> Result<(), EmitError> {
    let width = params.width.clamp(1, 4);
    let select = cx.emit_numeric_input(node, "Select")?;

    let graph = cx.graph();
    for channel in 0..width {
        let pins: Vec<String> = params
            .cases
            .iter()
            .map(|&v| case_pin(v, width, channel))
            .collect();
        let pins: Vec<&str> = pins.iter().map(String::as_str).collect();
        cx.hoist(&graph.find_common_outputs(node.index, &pins))?;
    }
    let selector = cx.cast(node, &select, ValueType::Integer)?;

    let outs: Vec<Variable> = (0..width)
        .map(|c| cx.reserve_output(node, &channel_pin("Output", width, c)))
        .collect();

    let mut cases = Vec::with_capacity(params.cases.len());
    for &value in &params.cases {
        let pins: Vec<String> = (0..width).map(|c| case_pin(value, width, c)).collect();
        cases.push(capture_branch(cx, node, &pins)?);
    }
    let default_pins: Vec<String> = (0..width).map(|c| channel_pin("Default", width, c)).collect();
    let default = capture_branch(cx, node, &default_pins)?;

    let mut declared = Vec::with_capacity(outs.len());
    for (c, out) in outs.iter().enumerate() {
        let types = cases
            .iter()
            .chain(std::iter::once(&default))
            .filter_map(|b| b.values[c].as_ref().map(|v| v.ty));
        let ty = join_branches(node, types)?;
        if ty == ValueType::Void {
            return Err(EmitError::UnconnectedInput {
                node: node.id.clone(),
                pin: default_pins[c].clone(),
            });
        }
        let v = declare_zeroed(cx, node, out, ty)?;
        declared.push(v);
    }

    cx.control_flow_attribute(params.branch);
    if params.cases.is_empty() {
        cx.write("{");
        write_branch(cx, node, &declared, &default)?;
        cx.write("}");
        return Ok(());
    }
    for (i, (value, branch)) in params.cases.iter().zip(&cases).enumerate() {
        if i == 0 {
            cx.write(format!("if ({selector} == {value}) {{"));
        } else {
            cx.write(format!("}} else if ({selector} == {value}) {{"));
        }
        write_branch(cx, node, &declared, branch)?;
    }
    cx.write("} else {");
    write_branch(cx, node, &declared, &default)?;
    cx.write("}");
    Ok(())
}

/// Declare a reserved switch output initialized to zero.
fn declare_zeroed(cx: &mut Context<'_>, node: &GraphNode, out: &Variable, ty: ValueType) -> Result<Variable, EmitError> {
    if !ty.is_declarable() {
        return Err(EmitError::type_mismatch(
            &node.id,
            format!("cannot declare a value of type {ty:?}"),
        ));
    }
    let pin = out.pin.clone().unwrap_or_else(|| node.output("Output"));
    let v = cx
        .shader()
        .retype(&pin, ty)
        .unwrap_or_else(|| Variable::new(Some(pin), out.name.clone(), ty));
    cx.write(format!("var {}: {} = {};", v.name, ty.wgsl(), expand_scalar(0.0, ty)));
    Ok(v)
}

fn write_branch(cx: &mut Context<'_>, node: &GraphNode, outs: &[Variable], branch: &SwitchBranch) -> Result<(), EmitError> {
    cx.write_raw(&branch.text);
    for (out, value) in outs.iter().zip(&branch.values) {
        if let Some(value) = value {
            let e = cx.cast(node, value, out.ty)?;
            cx.write_nested(format!("{} = {e};", out.name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{fragment_graph, fragment_source, generate, node, stage_error, test_connection};
    use crate::codegen::types::Stage;
    use serde_json::json;

    #[test]
    fn conditional_widens_scalar_branch() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("x", "Scalar", json!({ "value": 0.25 })),
                node("r", "Scalar", json!({ "value": 0.75 })),
                node("t", "Scalar", json!({ "value": 0.5 })),
                node("f", "Vector", json!({ "value": [0.5, 0.25, 0.0, 0.0] })),
                node("fxy", "Swizzle", json!({ "swizzle": "xy" })),
                node("cond", "Conditional", json!({ "operator": "Less" })),
            ],
            vec![
                test_connection("x", "Output", "cond", "Input"),
                test_connection("r", "Output", "cond", "Reference"),
                test_connection("t", "Output", "cond", "CaseTrue"),
                test_connection("f", "Output", "fxy", "Input"),
                test_connection("fxy", "Output", "cond", "CaseFalse"),
            ],
            ("cond", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("var v2: vec2f;\n"), "{text}");
        assert!(text.contains("if (v0 < v1) {\n"), "{text}");
        assert!(text.contains("        let v3: f32 = 0.5;\n        v2 = vec2f(v3);\n"), "{text}");
        assert!(text.contains("} else {\n"), "{text}");
        assert_eq!(text.matches("let v3: f32 = 0.5;").count(), 1, "{text}");
    }

    #[test]
    fn conditional_hoists_shared_values() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("x", "Scalar", json!({ "value": 0.25 })),
                node("shared", "Scalar", json!({ "value": 0.5 })),
                node("neg", "Neg", json!({})),
                node("cond", "Conditional", json!({})),
            ],
            vec![
                test_connection("x", "Output", "cond", "Input"),
                test_connection("x", "Output", "cond", "Reference"),
                test_connection("shared", "Output", "neg", "Input"),
                test_connection("shared", "Output", "cond", "CaseTrue"),
                test_connection("neg", "Output", "cond", "CaseFalse"),
            ],
            ("cond", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("    let v0: f32 = 0.5;\n    let v1: f32 = 0.25;\n"), "{text}");
        assert!(text.contains("        v2 = v0;\n"), "{text}");
        assert!(text.contains("        let v3: f32 = -v0;\n        v2 = v3;\n"), "{text}");
    }

    #[test]
    fn conditional_compares_vectors_with_all() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("a", "Vector", json!({ "value": [0.5, 0.5, 0.5, 0.5] })),
                node("t", "Scalar", json!({ "value": 0.5 })),
                node("cond", "Conditional", json!({ "operator": "GreaterEqual" })),
            ],
            vec![
                test_connection("a", "Output", "cond", "Input"),
                test_connection("a", "Output", "cond", "Reference"),
                test_connection("t", "Output", "cond", "CaseTrue"),
                test_connection("t", "Output", "cond", "CaseFalse"),
            ],
            ("cond", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("if (all(v0 >= v0)) {"), "{text}");
    }

    #[test]
    fn conditional_requires_both_cases() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("x", "Scalar", json!({ "value": 0.5 })),
                node("cond", "Conditional", json!({})),
            ],
            vec![
                test_connection("x", "Output", "cond", "Input"),
                test_connection("x", "Output", "cond", "Reference"),
                test_connection("x", "Output", "cond", "CaseTrue"),
            ],
            ("cond", "Output"),
        );
        let program = generate(nodes, conns);
        let err = stage_error(&program, Stage::Fragment).unwrap();
        assert!(err.contains("`CaseFalse` is not connected"), "{err}");
    }

    #[test]
    fn discard_inverts_operator() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("a", "Scalar", json!({ "value": 0.25 })),
                node("r", "Scalar", json!({ "value": 0.5 })),
                node("c", "Vector", json!({ "value": [0.5, 0.5, 0.5, 0.5] })),
                node("d", "Discard", json!({ "operator": "Less" })),
            ],
            vec![
                test_connection("a", "Output", "d", "Input"),
                test_connection("r", "Output", "d", "Reference"),
                test_connection("c", "Output", "d", "Pass"),
            ],
            ("d", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("if (v0 >= v1) {\n        discard;\n    }\n"), "{text}");
        assert!(text.contains("output.color0 = v2;"), "{text}");
    }

    #[test]
    fn discard_outside_fragment_is_rejected() {
        let nodes = vec![
            node("a", "Scalar", json!({ "value": 0.25 })),
            node("p", "Vector", json!({ "value": [0.0, 0.0, 0.5, 1.0] })),
            node("d", "Discard", json!({})),
            node("vout", "VertexOutput", json!({})),
            node("c", "Vector", json!({ "value": [0.5, 0.5, 0.5, 0.5] })),
            node("pout", "PixelOutput", json!({})),
        ];
        let conns = vec![
            test_connection("a", "Output", "d", "Input"),
            test_connection("a", "Output", "d", "Reference"),
            test_connection("p", "Output", "d", "Pass"),
            test_connection("d", "Output", "vout", "Input"),
            test_connection("c", "Output", "pout", "Input"),
        ];
        let program = generate(nodes, conns);
        let err = stage_error(&program, Stage::Vertex).unwrap();
        assert!(err.contains("Discard is not available in the vertex stage"), "{err}");
        assert!(stage_error(&program, Stage::Fragment).is_none());
    }

    #[test]
    fn switch_chains_cases_and_default() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("sel", "Scalar", json!({ "value": 0.5 })),
                node("a", "Scalar", json!({ "value": 0.25 })),
                node("b", "Scalar", json!({ "value": 0.75 })),
                node("sw", "Switch", json!({ "cases": [0, 1] })),
            ],
            vec![
                test_connection("sel", "Output", "sw", "Select"),
                test_connection("a", "Output", "sw", "Case0"),
                test_connection("b", "Output", "sw", "Default"),
            ],
            ("sw", "Output"),
        );
        let text = fragment_source(&generate(nodes, conns));
        assert!(text.contains("var v1: f32 = 0.0;\n"), "{text}");
        assert!(text.contains("if (i32(v0) == 0) {\n        let v2: f32 = 0.25;\n        v1 = v2;\n"), "{text}");
        assert!(text.contains("} else if (i32(v0) == 1) {\n    } else {\n"), "{text}");
        assert!(text.contains("        let v2: f32 = 0.75;\n        v1 = v2;\n    }\n"), "{text}");
    }

    #[test]
    fn switch_without_any_input_is_unconnected() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("sel", "Scalar", json!({ "value": 0.5 })),
                node("sw", "Switch", json!({ "cases": [0] })),
            ],
            vec![test_connection("sel", "Output", "sw", "Select")],
            ("sw", "Output"),
        );
        let program = generate(nodes, conns);
        let err = stage_error(&program, Stage::Fragment).unwrap();
        assert!(err.contains("`Default` is not connected"), "{err}");
    }
}
