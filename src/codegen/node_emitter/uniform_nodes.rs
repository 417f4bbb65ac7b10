//! Emitters for resource declaration nodes (Uniform, IndexedUniform, Struct,
//! ReadStruct, ReadStruct2).

use crate::codegen::context::Context;
use crate::codegen::error::EmitError;
use crate::codegen::types::{ValueType, Variable};
use crate::codegen::utils::{is_generated_identifier, sanitize_wgsl_ident};
use crate::graph::GraphNode;
use crate::nodes::{IndexedUniformParams, NodeKind, ParameterType, StructElement, StructParams, UniformParams};

fn parameter_name(node: &GraphNode, raw: &str) -> Result<String, EmitError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(EmitError::type_mismatch(&node.id, "parameter name is empty"));
    }
    let name = sanitize_wgsl_ident(raw);
    if is_generated_identifier(&name) {
        return Err(EmitError::ResourceConflict {
            node: node.id.clone(),
            name,
            detail: "name is reserved for generated declarations".to_string(),
        });
    }
    Ok(name)
}

/// Declare a named program parameter.
///
/// Numeric parameters become members of the frequency's uniform buffer and are
/// read in place. Textures and images register a binding (or, when bindless, an
/// index member of `UbDraw`); their consumers build the access expression.
///
/// # Example
/// ```wgsl
/// struct UbFrame_Type {
///     time: f32,
/// }
/// @group(0) @binding(0) var<uniform> UbFrame: UbFrame_Type;
/// // Output is bound to `UbFrame.time`
/// ```
pub fn emit_uniform(cx: &mut Context<'_>, node: &GraphNode, params: &UniformParams) -> Result<(), EmitError> {
    let name = parameter_name(node, &params.parameter_name)?;
    let ty = ValueType::from_parameter(params.parameter_type);
    cx.add_parameter(node, &name, params.parameter_type, 1, params.frequency)?;

    let access = match params.parameter_type {
        ParameterType::Scalar | ParameterType::Vector | ParameterType::Matrix => {
            cx.uniform(node, params.frequency, &name, ty, 0)?
        }
        ParameterType::Texture2D | ParameterType::Texture3D | ParameterType::TextureCube => {
            cx.declare_texture(node, &name, ty)?;
            name
        }
        ParameterType::Image2D | ParameterType::Image3D | ParameterType::ImageCube => {
            cx.declare_image(node, &name, ty)?;
            name
        }
        ParameterType::StructBuffer => {
            return Err(EmitError::type_mismatch(
                &node.id,
                "structured buffers are declared with a Struct node",
            ));
        }
    };
    cx.shader().create_variable(Some(node.output("Output")), access, ty);
    Ok(())
}

/// Element type of an indexed uniform and the access suffix reading it.
fn indexed_element(parameter_type: ParameterType) -> Option<(ValueType, &'static str)> {
    match parameter_type {
        ParameterType::Scalar => Some((ValueType::Float, ".x")),
        ParameterType::Vector => Some((ValueType::Float4, "")),
        ParameterType::Matrix => Some((ValueType::Float4x4, "")),
        _ => None,
    }
}

/// Declare a uniform array of `length` elements and read element `Index`.
///
/// Arrays use a 16-byte stride, so scalar arrays read the `.x` lane. When `Index`
/// is unconnected the first element is read.
///
/// # Example
/// ```wgsl
/// let v1: f32 = UbFrame.weights[v0].x;
/// ```
pub fn emit_indexed_uniform(cx: &mut Context<'_>, node: &GraphNode, params: &IndexedUniformParams) -> Result<(), EmitError> {
    let name = parameter_name(node, &params.parameter_name)?;
    let Some((ty, lane)) = indexed_element(params.parameter_type) else {
        return Err(EmitError::type_mismatch(
            &node.id,
            format!("{:?} parameters cannot be indexed", params.parameter_type),
        ));
    };
    if params.length == 0 {
        return Err(EmitError::type_mismatch(&node.id, "indexed uniform length must be at least 1"));
    }
    cx.add_parameter(node, &name, params.parameter_type, params.length, params.frequency)?;
    let access = cx.uniform(node, params.frequency, &name, ty, params.length)?;

    match cx.emit_optional_input(node, "Index")? {
        Some(index) => {
            if !index.ty.is_numeric() {
                return Err(EmitError::type_mismatch(
                    &node.id,
                    format!("`Index` must be numeric, got {:?}", index.ty),
                ));
            }
            let i = cx.cast(node, &index, ValueType::Integer)?;
            cx.assign(node, "Output", ty, format!("{access}[{i}]{lane}"))?;
        }
        None => {
            cx.shader()
                .create_variable(Some(node.output("Output")), format!("{access}[0]{lane}"), ty);
        }
    }
    Ok(())
}

/// Access path of the whole array declared by an IndexedUniform node, for
/// consumers that index it themselves.
pub(crate) fn indexed_uniform_array(cx: &mut Context<'_>, node: &GraphNode, params: &IndexedUniformParams) -> Result<String, EmitError> {
    let name = parameter_name(node, &params.parameter_name)?;
    let Some((ty, _)) = indexed_element(params.parameter_type) else {
        return Err(EmitError::type_mismatch(
            &node.id,
            format!("{:?} parameters cannot be indexed", params.parameter_type),
        ));
    };
    if params.length == 0 {
        return Err(EmitError::type_mismatch(&node.id, "indexed uniform length must be at least 1"));
    }
    cx.add_parameter(node, &name, params.parameter_type, params.length, params.frequency)?;
    cx.uniform(node, params.frequency, &name, ty, params.length)
}

/// Declare a structured storage buffer whose element layout is `elements`.
///
/// # Example
/// ```wgsl
/// struct particles_Type {
///     position: vec3f,
///     mass: f32,
/// }
/// @group(0) @binding(0) var<storage, read> particles: array<particles_Type>;
/// ```
pub fn emit_struct(cx: &mut Context<'_>, node: &GraphNode, params: &StructParams) -> Result<(), EmitError> {
    let name = parameter_name(node, &params.parameter_name)?;
    if params.elements.is_empty() {
        return Err(EmitError::type_mismatch(&node.id, "structured buffer has no elements"));
    }
    cx.storage_buffer(node, &name, &params.elements)?;
    cx.shader()
        .create_variable(Some(node.output("Output")), name, ValueType::StructBuffer);
    Ok(())
}

/// Element layout of the Struct node feeding `node.pin`.
pub(crate) fn struct_layout<'g>(cx: &mut Context<'g>, node: &GraphNode, pin: &str) -> Result<(Variable, &'g [StructElement]), EmitError> {
    let buffer = cx.emit_input(node, pin)?;
    if buffer.ty != ValueType::StructBuffer {
        return Err(EmitError::type_mismatch(
            &node.id,
            format!("`{pin}` must be a structured buffer, got {:?}", buffer.ty),
        ));
    }
    let graph = cx.graph();
    let producer = graph
        .source(node.index, pin)
        .map(|pin| graph.node(pin.node));
    match producer.map(|n| &n.kind) {
        Some(NodeKind::Struct(p)) => Ok((buffer, p.elements.as_slice())),
        _ => Err(EmitError::type_mismatch(
            &node.id,
            format!("`{pin}` must come directly from a Struct node"),
        )),
    }
}

fn element_index(cx: &mut Context<'_>, node: &GraphNode) -> Result<String, EmitError> {
    let index = cx.emit_numeric_input(node, "Index")?;
    cx.cast(node, &index, ValueType::Integer)
}

/// Read one named element of a structured-buffer entry.
///
/// # Example
/// ```wgsl
/// let v1: vec3f = particles[v0].position;
/// ```
pub fn emit_read_struct(cx: &mut Context<'_>, node: &GraphNode, params: &crate::nodes::ReadStructParams) -> Result<(), EmitError> {
    let (buffer, elements) = struct_layout(cx, node, "Struct")?;
    let Some(element) = elements.iter().find(|e| e.name == params.name) else {
        return Err(EmitError::type_mismatch(
            &node.id,
            format!("structured buffer `{}` has no element `{}`", buffer.name, params.name),
        ));
    };
    let i = element_index(cx, node)?;
    let ty = ValueType::from_data_type(element.data_type);
    cx.assign(node, "Output", ty, format!("{}[{i}].{}", buffer.name, element.name))?;
    Ok(())
}

/// Read every element of a structured-buffer entry; one output pin per element name.
pub fn emit_read_struct2(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let (buffer, elements) = struct_layout(cx, node, "Struct")?;
    let i = element_index(cx, node)?;
    for element in elements {
        let ty = ValueType::from_data_type(element.data_type);
        cx.assign(node, &element.name, ty, format!("{}[{i}].{}", buffer.name, element.name))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{fragment_graph, fragment_source, generate, node, stage_error, test_connection};
    use crate::codegen::layout::ResourcePayload;
    use crate::codegen::types::Stage;
    use serde_json::json;

    #[test]
    fn parameter_named_like_a_sampler_is_rejected() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("tex", "Uniform", json!({ "parameterName": "samp_0", "parameterType": "Texture2D" })),
                node("uv", "Vector", json!({ "value": [0.5, 0.25, 0.0, 0.0] })),
                node("s", "Sampler", json!({})),
            ],
            vec![
                test_connection("tex", "Output", "s", "Texture"),
                test_connection("uv", "Output", "s", "TexCoord"),
            ],
            ("s", "Output"),
        );
        let err = stage_error(&generate(nodes, conns), Stage::Fragment).unwrap();
        assert_eq!(err, "tex: resource conflict on `samp_0`: name is reserved for generated declarations");
    }

    #[test]
    fn uniform_reads_buffer_member() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("tint", "Uniform", json!({ "parameterName": "tint", "parameterType": "Vector" })),
                node("neg", "Neg", json!({})),
            ],
            vec![test_connection("tint", "Output", "neg", "Input")],
            ("neg", "Output"),
        );
        let program = generate(nodes, conns);
        let text = fragment_source(&program);
        assert!(text.contains("tint: vec4f,"), "{text}");
        assert!(text.contains("var<uniform> UbFrame: UbFrame_Type;"), "{text}");
        assert!(text.contains("let v0: vec4f = -UbFrame.tint;"), "{text}");
        assert_eq!(program.parameters.len(), 1);
        assert_eq!(program.parameters[0].name, "tint");
    }

    #[test]
    fn indexed_scalar_reads_x_lane() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("i", "Scalar", json!({ "value": 2.0 })),
                node("w", "IndexedUniform", json!({ "parameterName": "weights", "length": 4 })),
            ],
            vec![test_connection("i", "Output", "w", "Index")],
            ("w", "Output"),
        );
        let program = generate(nodes, conns);
        let text = fragment_source(&program);
        assert!(text.contains("weights: array<vec4f, 4>,"), "{text}");
        assert!(text.contains("let v1: f32 = UbFrame.weights[v0].x;"), "{text}");
    }

    #[test]
    fn read_struct_uses_element_type() {
        let (nodes, conns) = fragment_graph(
            vec![
                node(
                    "buf",
                    "Struct",
                    json!({
                        "parameterName": "particles",
                        "elements": [
                            { "name": "position", "type": "Float3" },
                            { "name": "mass", "type": "Float1" }
                        ]
                    }),
                ),
                node("i", "Scalar", json!({ "value": 0.0 })),
                node("read", "ReadStruct", json!({ "name": "position" })),
            ],
            vec![
                test_connection("buf", "Output", "read", "Struct"),
                test_connection("i", "Output", "read", "Index"),
            ],
            ("read", "Output"),
        );
        let program = generate(nodes, conns);
        let text = fragment_source(&program);
        assert!(text.contains("var<storage, read> particles: array<particles_Type>;"), "{text}");
        assert!(text.contains("let v1: vec3f = particles[v0].position;"), "{text}");
        let r = program.layout.iter().find(|r| r.name == "particles").unwrap();
        assert!(matches!(r.payload, ResourcePayload::StorageBuffer { stride: 16, .. }));
    }

    #[test]
    fn texture_and_buffer_names_conflict() {
        let (nodes, conns) = fragment_graph(
            vec![
                node("tex", "Uniform", json!({ "parameterName": "data", "parameterType": "Texture2D" })),
                node("buf", "Struct", json!({ "parameterName": "data", "elements": [{ "name": "v", "type": "Float4" }] })),
                node("i", "Scalar", json!({ "value": 0.0 })),
                node("read", "ReadStruct", json!({ "name": "v" })),
                node("size", "TextureSize", json!({})),
                node("add", "Add", json!({})),
            ],
            vec![
                test_connection("tex", "Output", "size", "Input"),
                test_connection("buf", "Output", "read", "Struct"),
                test_connection("i", "Output", "read", "Index"),
                test_connection("size", "Output", "add", "Input1"),
                test_connection("read", "Output", "add", "Input2"),
            ],
            ("add", "Output"),
        );
        let program = generate(nodes, conns);
        let err = stage_error(&program, Stage::Fragment).unwrap();
        assert!(err.contains("resource conflict on `data`"), "{err}");
    }
}
