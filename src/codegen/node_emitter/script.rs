//! Inline script node: user WGSL spliced into the stage body.

use crate::codegen::context::Context;
use crate::codegen::error::EmitError;
use crate::codegen::types::{Stage, ValueType};
use crate::graph::GraphNode;
use crate::nodes::{NodeKind, ScriptParams};

use super::uniform_nodes::indexed_uniform_array;

/// Text substituted for `$name`: textures and images become their access
/// expression, an IndexedUniform without `Index` the whole array.
fn input_text(cx: &mut Context<'_>, node: &GraphNode, name: &str) -> Result<String, EmitError> {
    let graph = cx.graph();
    let Some(source) = graph.source(node.index, name) else {
        return Err(EmitError::UnconnectedInput {
            node: node.id.clone(),
            pin: name.to_string(),
        });
    };
    let producer = graph.node(source.node);
    if let NodeKind::IndexedUniform(p) = &producer.kind
        && graph.source(producer.index, "Index").is_none()
    {
        return indexed_uniform_array(cx, producer, p);
    }
    let v = cx.emit_output(source)?;
    if v.ty.is_texture() {
        cx.texture_plain_access(node, &v)
    } else if v.ty.is_image() {
        cx.image_access(node, &v)
    } else {
        Ok(v.name)
    }
}

/// Splice `params.script` into the body as its own block.
///
/// Every `$name` placeholder of a declared input or output is replaced, longest
/// name first so `$Color` never rewrites part of `$ColorScale`. Outputs are
/// declared as `var` ahead of the block for the script to assign. A script with a
/// technique is a compute entry point and sets the workgroup size.
///
/// # Example
/// ```wgsl
/// var v1: f32;
/// {
///     v1 = v0 * 2.0;
/// }
/// ```
pub fn emit_script(cx: &mut Context<'_>, node: &GraphNode, params: &ScriptParams) -> Result<(), EmitError> {
    if let Some(technique) = &params.technique {
        cx.require_stage(node, "a script technique", &[Stage::Compute])?;
        if params.local_size.contains(&0) {
            return Err(EmitError::type_mismatch(
                &node.id,
                format!("workgroup size {:?} has a zero dimension", params.local_size),
            ));
        }
        log::debug!("script {} runs technique {technique}", node.id);
        cx.requirements_mut().local_size = params.local_size;
    }
    if params.script.trim().is_empty() {
        return Err(EmitError::type_mismatch(&node.id, "script is empty"));
    }

    for module in &params.includes {
        cx.shader().add_module(module, &node.id);
    }

    let mut replacements = Vec::with_capacity(params.inputs.len() + params.outputs.len());
    for name in &params.inputs {
        let text = input_text(cx, node, name)?;
        replacements.push((format!("${name}"), text));
    }
    for output in &params.outputs {
        let ty = ValueType::from_parameter(output.output_type);
        let reserved = cx.reserve_output(node, &output.name);
        let v = cx.declare_reserved(node, &reserved, ty)?;
        replacements.push((format!("${}", output.name), v.name));
    }
    replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut script = params.script.clone();
    for (placeholder, text) in &replacements {
        script = script.replace(placeholder.as_str(), text);
    }

    cx.write("{");
    for line in script.lines().filter(|l| !l.trim().is_empty()) {
        cx.write_nested(line.trim_end());
    }
    cx.write("}");
    Ok(())
}
