//! Emitters for loop nodes (Iterate, Iterate2, Iterate2d, Repeat, Sum).
//!
//! A loop body may read the loop's own outputs, so output types are found by
//! re-emitting the body until they stop changing. Values the body uses but which
//! do not depend on the loop are emitted once, in front of it.

use crate::codegen::context::Context;
use crate::codegen::error::EmitError;
use crate::codegen::types::{ValueType, Variable, expand_scalar};
use crate::graph::{GraphNode, OutputPin};
use crate::nodes::{Iterate2dParams, IterateParams, SumParams};

const MAX_TYPING_PASSES: usize = 4;

/// Body input feeding one loop output, with its optional initial value.
struct Channel {
    input: String,
    initial: Option<String>,
    output: String,
}

impl Channel {
    fn new(input: &str, initial: Option<&str>, output: &str) -> Self {
        Self {
            input: input.to_string(),
            initial: initial.map(str::to_string),
            output: output.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Update {
    Assign,
    Accumulate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConditionAt {
    Start,
    End,
}

struct LoopShape {
    channels: Vec<Channel>,
    induction: &'static [&'static str],
    update: Update,
    condition: Option<ConditionAt>,
    condition_required: bool,
    // Block depth of the body relative to the loop statement.
    depth: usize,
    // Breaks must leave two loops; a flag carries them out of the inner one.
    nested: bool,
}

struct LoweredLoop {
    induction: Vec<Variable>,
    body: String,
    flag: Option<Variable>,
}

fn emit_break_check(cx: &mut Context<'_>, node: &GraphNode, flag: Option<&str>) -> Result<(), EmitError> {
    let Some(condition) = cx.emit_optional_input(node, "Condition")? else {
        return Ok(());
    };
    let c = cx.cast(node, &condition, ValueType::Integer)?;
    cx.write(format!("if ({c} == 0) {{"));
    if let Some(flag) = flag {
        cx.write_nested(format!("{flag} = true;"));
    }
    cx.write_nested("break;");
    cx.write("}");
    Ok(())
}

/// One pass over the body; returns the type of each channel input.
fn emit_body(
    cx: &mut Context<'_>,
    node: &GraphNode,
    shape: &LoopShape,
    outs: &[Variable],
    flag: Option<&str>,
) -> Result<Vec<ValueType>, EmitError> {
    if shape.condition == Some(ConditionAt::Start) {
        emit_break_check(cx, node, flag)?;
    }
    let mut values = Vec::with_capacity(shape.channels.len());
    for channel in &shape.channels {
        values.push(cx.emit_numeric_input(node, &channel.input)?);
    }
    if shape.condition == Some(ConditionAt::End) {
        emit_break_check(cx, node, flag)?;
    }
    let op = match shape.update {
        Update::Assign => "=",
        Update::Accumulate => "+=",
    };
    for (out, value) in outs.iter().zip(&values) {
        let e = value.cast(out.ty).unwrap_or_else(|| value.name.clone());
        cx.write(format!("{} {op} {e};", out.name));
    }
    Ok(values.iter().map(|v| v.ty).collect())
}

/// Hoist, type and declare a loop; the caller writes the loop statement around `body`.
fn lower_loop(cx: &mut Context<'_>, node: &GraphNode, shape: &LoopShape) -> Result<LoweredLoop, EmitError> {
    if shape.condition_required && !cx.is_connected(node, "Condition") {
        return Err(EmitError::UnconnectedInput {
            node: node.id.clone(),
            pin: "Condition".to_string(),
        });
    }

    let induction: Vec<Variable> = shape
        .induction
        .iter()
        .map(|pin| cx.shader().create_temporary(Some(node.output(pin)), ValueType::Integer))
        .collect();
    let mut outs: Vec<Variable> = shape
        .channels
        .iter()
        .map(|c| cx.reserve_output(node, &c.output))
        .collect();

    let dependents: Vec<OutputPin> = shape
        .induction
        .iter()
        .copied()
        .chain(shape.channels.iter().map(|c| c.output.as_str()))
        .map(|pin| node.output(pin))
        .collect();
    let graph = cx.graph();
    let body_pins = shape
        .channels
        .iter()
        .map(|c| c.input.as_str())
        .chain(shape.condition.map(|_| "Condition"));
    for pin in body_pins {
        cx.hoist(&graph.find_non_dependent_outputs(node.index, pin, &dependents))?;
    }

    let mut initials = Vec::with_capacity(shape.channels.len());
    for channel in &shape.channels {
        let initial = match &channel.initial {
            Some(pin) => cx.emit_optional_input(node, pin)?,
            None => None,
        };
        if let Some(v) = &initial
            && !v.ty.is_numeric()
        {
            return Err(EmitError::type_mismatch(
                &node.id,
                format!("initial value must be a scalar or vector, got {:?}", v.ty),
            ));
        }
        initials.push(initial);
    }

    let flag = if shape.nested && cx.is_connected(node, "Condition") {
        Some(cx.shader().create_temporary(None, ValueType::Boolean))
    } else {
        None
    };

    let mut types: Vec<ValueType> = initials
        .iter()
        .map(|i| i.as_ref().map_or(ValueType::Float, |v| v.ty))
        .collect();
    let mut settled = None;
    for pass in 0..MAX_TYPING_PASSES {
        for (out, ty) in outs.iter_mut().zip(&types) {
            if let Some(pin) = &out.pin
                && let Some(v) = cx.shader().retype(pin, *ty)
            {
                *out = v;
            }
        }
        let flag_name = flag.as_ref().map(|f| f.name.as_str());
        let (text, inputs) = cx.capture(shape.depth, |cx| emit_body(cx, node, shape, &outs, flag_name))?;

        let mut next = Vec::with_capacity(types.len());
        for (input, initial) in inputs.into_iter().zip(&initials) {
            let joined = match initial {
                Some(i) => ValueType::arithmetic(i.ty, input),
                None => Some(input),
            };
            next.push(joined.ok_or_else(|| {
                EmitError::type_mismatch(&node.id, format!("loop input {input:?} does not fit its initial value"))
            })?);
        }
        if next == types {
            log::trace!("{}: loop types settled after {} pass(es)", node.id, pass + 1);
            settled = Some(text);
            break;
        }
        types = next;
    }
    let Some(body) = settled else {
        return Err(EmitError::type_mismatch(&node.id, "loop output types do not settle"));
    };

    for ((out, initial), ty) in outs.iter().zip(&initials).zip(&types) {
        let value = match initial {
            Some(v) => cx.cast(node, v, *ty)?,
            None => expand_scalar(0.0, *ty),
        };
        cx.write(format!("var {}: {} = {value};", out.name, ty.wgsl()));
    }
    for v in &induction {
        cx.write(format!("var {}: i32;", v.name));
    }
    if let Some(f) = &flag {
        cx.write(format!("var {}: bool = false;", f.name));
    }
    Ok(LoweredLoop { induction, body, flag })
}

/// Counted loop over `N` in `from..=to`; `Output` takes the last `Input`.
///
/// `Condition` is checked after `Input` each iteration and leaves the loop when zero.
///
/// # Example
/// ```wgsl
/// var v1: vec4f = v3;
/// var v0: i32;
/// for (v0 = 0; v0 <= 3; v0++) {
///     let v4: vec4f = v1 + vec4f(v2);
///     v1 = v4;
/// }
/// ```
pub fn emit_iterate(cx: &mut Context<'_>, node: &GraphNode, params: &IterateParams) -> Result<(), EmitError> {
    let shape = LoopShape {
        channels: vec![Channel::new("Input", Some("Initial"), "Output")],
        induction: &["N"],
        update: Update::Assign,
        condition: Some(ConditionAt::End),
        condition_required: false,
        depth: 1,
        nested: false,
    };
    let lowered = lower_loop(cx, node, &shape)?;
    let n = &lowered.induction[0].name;
    cx.write(format!(
        "for ({n} = {}; {n} <= {}; {n}++) {{",
        params.from, params.to
    ));
    cx.write_raw(&lowered.body);
    cx.write("}");
    Ok(())
}

/// Counted loop with bounds from the `From`/`To` pins and up to four channels
/// (`Input0..3`, `Initial0..3`, `Output0..3`). `Input0` is required.
pub fn emit_iterate2(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let from = cx.emit_numeric_input(node, "From")?;
    let to = cx.emit_numeric_input(node, "To")?;
    let from = cx.cast(node, &from, ValueType::Integer)?;
    let to = cx.cast(node, &to, ValueType::Integer)?;

    if !cx.is_connected(node, "Input0") {
        return Err(EmitError::UnconnectedInput {
            node: node.id.clone(),
            pin: "Input0".to_string(),
        });
    }
    let channels = (0..4)
        .filter(|i| cx.is_connected(node, &format!("Input{i}")))
        .map(|i| {
            Channel::new(
                &format!("Input{i}"),
                Some(format!("Initial{i}").as_str()),
                &format!("Output{i}"),
            )
        })
        .collect();
    let shape = LoopShape {
        channels,
        induction: &["N"],
        update: Update::Assign,
        condition: Some(ConditionAt::End),
        condition_required: false,
        depth: 1,
        nested: false,
    };
    let lowered = lower_loop(cx, node, &shape)?;
    let n = &lowered.induction[0].name;
    cx.write(format!("for ({n} = {from}; {n} <= {to}; {n}++) {{"));
    cx.write_raw(&lowered.body);
    cx.write("}");
    Ok(())
}

/// Two nested counted loops over `X` and `Y`.
///
/// # Example
/// ```wgsl
/// var v4: bool = false;
/// for (v0 = 0; v0 <= 3; v0++) {
///     for (v1 = 0; v1 <= 3; v1++) {
///         if (v3 == 0) {
///             v4 = true;
///             break;
///         }
///         v2 = v0;
///     }
///     if (v4) {
///         break;
///     }
/// }
/// ```
pub fn emit_iterate2d(cx: &mut Context<'_>, node: &GraphNode, params: &Iterate2dParams) -> Result<(), EmitError> {
    let shape = LoopShape {
        channels: vec![Channel::new("Input", Some("Initial"), "Output")],
        induction: &["X", "Y"],
        update: Update::Assign,
        condition: Some(ConditionAt::End),
        condition_required: false,
        depth: 2,
        nested: true,
    };
    let lowered = lower_loop(cx, node, &shape)?;
    let (x, y) = (&lowered.induction[0].name, &lowered.induction[1].name);
    cx.write(format!(
        "for ({x} = {}; {x} <= {}; {x}++) {{",
        params.from_x, params.to_x
    ));
    cx.write_nested(format!(
        "for ({y} = {}; {y} <= {}; {y}++) {{",
        params.from_y, params.to_y
    ));
    cx.write_raw(&lowered.body);
    cx.write_nested("}");
    if let Some(flag) = &lowered.flag {
        cx.write_nested(format!("if ({}) {{", flag.name));
        cx.write_nested("    break;");
        cx.write_nested("}");
    }
    cx.write("}");
    Ok(())
}

/// Unbounded loop; `Condition` is required and checked before `Input` each iteration.
pub fn emit_repeat(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let shape = LoopShape {
        channels: vec![Channel::new("Input", Some("Initial"), "Output")],
        induction: &["N"],
        update: Update::Assign,
        condition: Some(ConditionAt::Start),
        condition_required: true,
        depth: 1,
        nested: false,
    };
    let lowered = lower_loop(cx, node, &shape)?;
    let n = &lowered.induction[0].name;
    cx.write(format!("for ({n} = 0; ; {n}++) {{"));
    cx.write_raw(&lowered.body);
    cx.write("}");
    Ok(())
}

/// Sum of `Input` over `N` in `from..=to`, starting from zero.
///
/// # Example
/// ```wgsl
/// var v1: i32 = 0;
/// var v0: i32;
/// for (v0 = 1; v0 <= 4; v0++) {
///     v1 += v0;
/// }
/// ```
pub fn emit_sum(cx: &mut Context<'_>, node: &GraphNode, params: &SumParams) -> Result<(), EmitError> {
    let shape = LoopShape {
        channels: vec![Channel::new("Input", None, "Output")],
        induction: &["N"],
        update: Update::Accumulate,
        condition: None,
        condition_required: false,
        depth: 1,
        nested: false,
    };
    let lowered = lower_loop(cx, node, &shape)?;
    let n = &lowered.induction[0].name;
    cx.write(format!(
        "for ({n} = {}; {n} <= {}; {n}++) {{",
        params.from, params.to
    ));
    cx.write_raw(&lowered.body);
    cx.write("}");
    Ok(())
}
