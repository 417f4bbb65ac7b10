//! Emitters for constants and built-in stage inputs (Scalar, Vector, Color,
//! VertexInput, Instance, FragmentPosition, FrontFace, DispatchIndex, TargetSize).

use crate::codegen::context::Context;
use crate::codegen::error::EmitError;
use crate::codegen::types::{Stage, ValueType};
use crate::codegen::utils::{fmt_f32, is_integral, sanitize_wgsl_ident, srgb_to_linear_channel};
use crate::graph::GraphNode;
use crate::nodes::{
    ColorParams, DataUsage, DispatchIndexParams, DispatchScope, ScalarParams, VectorParams, VertexInputParams,
};

/// Scalar constant. Integral values produce an `i32`, others an `f32`.
///
/// # Example
/// ```wgsl
/// let v0: i32 = 2;
/// let v1: f32 = 0.5;
/// ```
pub fn emit_scalar(cx: &mut Context<'_>, node: &GraphNode, params: &ScalarParams) -> Result<(), EmitError> {
    if is_integral(params.value) {
        cx.assign(node, "Output", ValueType::Integer, format!("{}", params.value as i32))?;
    } else {
        cx.assign(node, "Output", ValueType::Float, fmt_f32(params.value))?;
    }
    Ok(())
}

/// Four-component constant; integer when every component is integral.
pub fn emit_vector(cx: &mut Context<'_>, node: &GraphNode, params: &VectorParams) -> Result<(), EmitError> {
    let v = params.value;
    if v.iter().all(|c| is_integral(*c)) {
        let items: Vec<String> = v.iter().map(|c| format!("{}", *c as i32)).collect();
        cx.assign(node, "Output", ValueType::Integer4, format!("vec4i({})", items.join(", ")))?;
    } else {
        let items: Vec<String> = v.iter().map(|c| fmt_f32(*c)).collect();
        cx.assign(node, "Output", ValueType::Float4, format!("vec4f({})", items.join(", ")))?;
    }
    Ok(())
}

/// RGBA color constant; sRGB colors are converted to linear at generation time.
pub fn emit_color(cx: &mut Context<'_>, node: &GraphNode, params: &ColorParams) -> Result<(), EmitError> {
    let mut c = params.color;
    if !params.linear {
        for channel in c.iter_mut().take(3) {
            *channel = srgb_to_linear_channel(*channel);
        }
    }
    let items: Vec<String> = c.iter().map(|v| fmt_f32(*v)).collect();
    cx.assign(node, "Output", ValueType::Float4, format!("vec4f({})", items.join(", ")))?;
    Ok(())
}

fn usage_base(usage: DataUsage) -> u32 {
    match usage {
        DataUsage::Position => 0,
        DataUsage::Normal => 1,
        DataUsage::Tangent => 2,
        DataUsage::Binormal => 3,
        DataUsage::Color => 4,
        DataUsage::Custom => 5,
    }
}

/// Per-vertex attribute.
///
/// The attribute lives at location `usage base + index` (Position 0, Normal 1,
/// Tangent 2, Binormal 3, Color 4, Custom 5). Positions are widened to `vec4f`
/// with `w = 1`, normals with `w = 0`, and colors arrive in BGRA order.
///
/// When requested from the fragment stage the attribute is read in the vertex
/// stage and interpolated.
///
/// # Example
/// ```wgsl
/// struct VertexInput {
///     @location(0) Position0: vec3f,
/// }
/// let v0: vec4f = vec4f(input.Position0, 1.0);
/// ```
pub fn emit_vertex_input(cx: &mut Context<'_>, node: &GraphNode, params: &VertexInputParams) -> Result<(), EmitError> {
    match cx.stage() {
        Stage::Vertex => {}
        Stage::Fragment => {
            let value = cx.emit_output_in(Stage::Vertex, &node.output("Output"))?;
            cx.interpolate(node, &value, node.output("Output"))?;
            return Ok(());
        }
        Stage::Compute => {
            return Err(EmitError::UnsupportedContext {
                node: node.id.clone(),
                what: "vertex attributes".to_string(),
                stage: Stage::Compute,
            });
        }
    }

    let name = if params.name.trim().is_empty() {
        format!("{:?}{}", params.usage, params.index)
    } else {
        sanitize_wgsl_ident(params.name.trim())
    };
    let location = usage_base(params.usage) + params.index;
    cx.vertex_location(node, location, &name)?;

    let ty = ValueType::from_data_type(params.data_type);
    cx.shader()
        .declare_input(&name, format!("@location({location}) {name}: {},", ty.wgsl()));
    let member = format!("input.{name}");

    let widened = |w: &str| -> Option<String> {
        let f = if ty.is_float() { member.clone() } else { format!("{}({member})", ty.to_float().wgsl()) };
        match ty.width() {
            1 => Some(format!("vec4f({f}, 0.0, 0.0, {w})")),
            2 => Some(format!("vec4f({f}, 0.0, {w})")),
            3 => Some(format!("vec4f({f}, {w})")),
            _ => None,
        }
    };
    match params.usage {
        DataUsage::Position | DataUsage::Normal => {
            let w = if params.usage == DataUsage::Position { "1.0" } else { "0.0" };
            match widened(w) {
                Some(expr) => {
                    cx.assign(node, "Output", ValueType::Float4, expr)?;
                }
                None if ty.is_float() => {
                    cx.shader().create_variable(Some(node.output("Output")), member, ty);
                }
                None => {
                    cx.assign(node, "Output", ValueType::Float4, format!("vec4f({member})"))?;
                }
            }
        }
        DataUsage::Color if ty.width() == 4 => {
            let f = if ty.is_float() { member.clone() } else { format!("vec4f({member})") };
            cx.assign(node, "Output", ValueType::Float4, format!("{f}.zyxw"))?;
        }
        _ => {
            cx.shader().create_variable(Some(node.output("Output")), member, ty);
        }
    }
    Ok(())
}

/// Instance index as `i32`.
///
/// The vertex stage reads the `instance_index` builtin. The fragment stage
/// receives it through a flat interpolator; with ballot support the value is
/// made uniform across the subgroup.
///
/// # Example
/// ```wgsl
/// let v0: i32 = subgroupBroadcastFirst(input.Attr0.x);
/// ```
pub fn emit_instance(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    match cx.stage() {
        Stage::Vertex => {
            cx.shader()
                .declare_input("instance_index", "@builtin(instance_index) instance_index: u32,");
            cx.assign(node, "Output", ValueType::Integer, "i32(input.instance_index)")?;
        }
        Stage::Fragment => {
            // The interpolated value outlives the scope that first asked for it.
            let carried_pin = node.output("__interpolated");
            let carried = match cx.shader().find_variable(&carried_pin).cloned() {
                Some(v) => v,
                None => {
                    let value = cx.emit_output_in(Stage::Vertex, &node.output("Output"))?;
                    cx.interpolate(node, &value, carried_pin)?
                }
            };
            let expr = if cx.settings().support_ballot_read_first_invocation {
                cx.requirements_mut().extensions.insert("subgroups".to_string());
                cx.shader().add_header("enable subgroups;");
                format!("subgroupBroadcastFirst({})", carried.name)
            } else {
                carried.name
            };
            cx.assign(node, "Output", ValueType::Integer, expr)?;
        }
        Stage::Compute => {
            return Err(EmitError::UnsupportedContext {
                node: node.id.clone(),
                what: "Instance".to_string(),
                stage: Stage::Compute,
            });
        }
    }
    Ok(())
}

/// Fragment coordinate (`@builtin(position)`).
pub fn emit_fragment_position(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    cx.require_stage(node, "FragmentPosition", &[Stage::Fragment])?;
    cx.shader()
        .declare_input("position", "@builtin(position) position: vec4f,");
    cx.shader()
        .create_variable(Some(node.output("Output")), "input.position", ValueType::Float4);
    Ok(())
}

/// One for front-facing primitives, zero otherwise.
pub fn emit_front_face(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    cx.require_stage(node, "FrontFace", &[Stage::Fragment])?;
    cx.shader()
        .declare_input("front_facing", "@builtin(front_facing) front_facing: bool,");
    cx.assign(node, "Output", ValueType::Float, "select(0.0, 1.0, input.front_facing)")?;
    Ok(())
}

/// Compute invocation index in the requested scope, as `vec3i`.
pub fn emit_dispatch_index(cx: &mut Context<'_>, node: &GraphNode, params: &DispatchIndexParams) -> Result<(), EmitError> {
    cx.require_stage(node, "DispatchIndex", &[Stage::Compute])?;
    let (builtin, member) = match params.scope {
        DispatchScope::Global => ("global_invocation_id", "global_id"),
        DispatchScope::Local => ("local_invocation_id", "local_id"),
        DispatchScope::Group => ("workgroup_id", "group_id"),
    };
    cx.shader()
        .declare_input(member, format!("@builtin({builtin}) {member}: vec3u,"));
    cx.assign(node, "Output", ValueType::Integer3, format!("vec3i(input.{member})"))?;
    Ok(())
}

/// Render target size: `xy` in pixels, `zw` their reciprocals.
pub fn emit_target_size(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    cx.shader().set_uses_target_size();
    cx.requirements_mut().use_target_size = true;
    cx.shader()
        .create_variable(Some(node.output("Output")), "push_constants.target_size", ValueType::Float4);
    Ok(())
}
