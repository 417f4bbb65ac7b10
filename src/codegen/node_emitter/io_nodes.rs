//! Stage boundary emitters (VertexOutput, PixelOutput, ComputeOutput, Interpolator).

use crate::codegen::context::Context;
use crate::codegen::error::EmitError;
use crate::codegen::types::{Stage, ValueType, Variable};
use crate::graph::GraphNode;
use crate::nodes::{ComputeOutputParams, PixelOutputParams, VertexOutputParams};

use super::uniform_nodes::struct_layout;

const COLOR_PINS: [&str; 4] = ["Input", "Input1", "Input2", "Input3"];

/// `vec4f` for a color or position target; three-component values get `w = 1`.
fn to_target(cx: &Context<'_>, node: &GraphNode, value: &Variable) -> Result<String, EmitError> {
    if value.ty.width() == 3 {
        let xyz = cx.cast(node, value, ValueType::Float3)?;
        Ok(format!("vec4f({xyz}, 1.0)"))
    } else {
        cx.cast(node, value, ValueType::Float4)
    }
}

/// Clip-space position of the vertex.
///
/// # Example
/// ```wgsl
/// struct VertexOutput {
///     @builtin(position) @invariant position: vec4f,
/// }
/// output.position = v0;
/// ```
pub fn emit_vertex_output(cx: &mut Context<'_>, node: &GraphNode, params: &VertexOutputParams) -> Result<(), EmitError> {
    cx.require_stage(node, "VertexOutput", &[Stage::Vertex])?;
    let value = cx.emit_numeric_input(node, "Input")?;
    let position = to_target(cx, node, &value)?;
    cx.shader()
        .declare_output("position", "@builtin(position) @invariant position: vec4f,");
    cx.write(format!("output.position = {position};"));
    cx.requirements_mut()
        .record_vertex_precision(params.precision_hint);
    Ok(())
}

/// Color targets 0-3 from `Input`, `Input1`..`Input3`.
///
/// A connected `Enable` discards the fragment when it is zero. A zero color
/// write mask writes no targets and leaves `Input` optional.
pub fn emit_pixel_output(cx: &mut Context<'_>, node: &GraphNode, params: &PixelOutputParams) -> Result<(), EmitError> {
    cx.require_stage(node, "PixelOutput", &[Stage::Fragment])?;

    if let Some(enable) = cx.emit_optional_input(node, "Enable")? {
        let e = cx.cast(node, &enable, ValueType::Float)?;
        cx.write(format!("if ({e} == 0.0) {{"));
        cx.write_nested("discard;");
        cx.write("}");
    }

    if params.color_write_mask != 0 {
        if !cx.is_connected(node, "Input") {
            return Err(EmitError::UnconnectedInput {
                node: node.id.clone(),
                pin: "Input".to_string(),
            });
        }
        for (location, pin) in COLOR_PINS.iter().enumerate() {
            let Some(value) = cx.emit_optional_input(node, pin)? else {
                continue;
            };
            if !value.ty.is_numeric() {
                return Err(EmitError::type_mismatch(
                    &node.id,
                    format!("input `{pin}` must be a scalar or vector, got {:?}", value.ty),
                ));
            }
            let color = to_target(cx, node, &value)?;
            let member = format!("color{location}");
            cx.shader()
                .declare_output(&member, format!("@location({location}) {member}: vec4f,"));
            cx.write(format!("output.{member} = {color};"));
        }
    }
    cx.requirements_mut()
        .record_fragment_precision(params.precision_hint);
    Ok(())
}

/// Store `Input` into an image texel or a structured-buffer element at `Offset`.
///
/// # Example
/// ```wgsl
/// textureStore(result, v1.xy, v2);
/// particles[i32(v0.x)].position = v3;
/// ```
pub fn emit_compute_output(cx: &mut Context<'_>, node: &GraphNode, params: &ComputeOutputParams) -> Result<(), EmitError> {
    cx.require_stage(node, "ComputeOutput", &[Stage::Compute])?;
    if params.local_size.contains(&0) {
        return Err(EmitError::type_mismatch(
            &node.id,
            format!("workgroup size {:?} has a zero dimension", params.local_size),
        ));
    }
    cx.requirements_mut().local_size = params.local_size;

    let storage = cx.emit_input(node, "Storage")?;
    let offset = cx.emit_numeric_input(node, "Offset")?;
    let value = cx.emit_numeric_input(node, "Input")?;
    let enable = cx.emit_optional_input(node, "Enable")?;

    let store = if storage.ty.is_image() {
        let access = cx.image_access(node, &storage)?;
        let texel = cx.cast(node, &value, ValueType::Float4)?;
        match storage.ty {
            ValueType::Image2D => {
                let c = cx.cast(node, &offset, ValueType::Integer2)?;
                format!("textureStore({access}, {c}, {texel});")
            }
            ValueType::Image3D => {
                let c = cx.cast(node, &offset, ValueType::Integer3)?;
                format!("textureStore({access}, {c}, {texel});")
            }
            _ => {
                // Cube faces are layers of a 2D array.
                let c = cx.cast(node, &offset, ValueType::Integer3)?;
                let c = if c == offset.name {
                    c
                } else {
                    cx.assign(node, "__offset", ValueType::Integer3, c)?.name
                };
                format!("textureStore({access}, {c}.xy, {c}.z, {texel});")
            }
        }
    } else if storage.ty == ValueType::StructBuffer {
        let (buffer, elements) = struct_layout(cx, node, "Storage")?;
        let element = match &params.field {
            Some(field) => elements.iter().find(|e| &e.name == field).ok_or_else(|| {
                EmitError::type_mismatch(
                    &node.id,
                    format!("structured buffer `{}` has no element `{field}`", buffer.name),
                )
            })?,
            None => elements.first().ok_or_else(|| {
                EmitError::type_mismatch(&node.id, "structured buffer has no elements")
            })?,
        };
        let i = cx.cast(node, &offset, ValueType::Integer)?;
        let ty = ValueType::from_data_type(element.data_type);
        let v = cx.cast(node, &value, ty)?;
        format!("{}[{i}].{} = {v};", buffer.name, element.name)
    } else {
        return Err(EmitError::type_mismatch(
            &node.id,
            format!("`Storage` must be an image or structured buffer, got {:?}", storage.ty),
        ));
    };

    match enable {
        Some(enable) => {
            let e = cx.cast(node, &enable, ValueType::Float)?;
            cx.write(format!("if ({e} != 0.0) {{"));
            cx.write_nested(store);
            cx.write("}");
        }
        None => cx.write(store),
    }
    Ok(())
}

/// Evaluate `Input` per vertex and read it interpolated in the fragment stage.
/// In the vertex stage the node is a passthrough.
pub fn emit_interpolator(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    match cx.stage() {
        Stage::Fragment => {
            let graph = cx.graph();
            let Some(source) = graph.source(node.index, "Input") else {
                return Err(EmitError::UnconnectedInput {
                    node: node.id.clone(),
                    pin: "Input".to_string(),
                });
            };
            let value = cx.emit_output_in(Stage::Vertex, source)?;
            cx.interpolate(node, &value, node.output("Output"))?;
        }
        Stage::Vertex => {
            let value = cx.emit_input(node, "Input")?;
            cx.shader()
                .create_variable(Some(node.output("Output")), value.name, value.ty);
        }
        Stage::Compute => {
            return Err(EmitError::UnsupportedContext {
                node: node.id.clone(),
                what: "Interpolator".to_string(),
                stage: Stage::Compute,
            });
        }
    }
    Ok(())
}
