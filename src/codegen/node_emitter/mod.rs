//! Node emitter: dispatch from node kind to its code-generation routine.
//!
//! Every routine has the same contract. It gathers its inputs through
//! [`Context::emit_input`], checks their types, binds each of its output pins to a
//! [`Variable`] in the current scope and writes the statements computing them into
//! the current stage's body. Failures propagate with `?` up to the sink.
//!
//! [`Variable`]: crate::codegen::types::Variable

pub mod control_flow;
pub mod input_nodes;
pub mod io_nodes;
pub mod loop_nodes;
pub mod math_nodes;
pub mod script;
pub mod texture_nodes;
pub mod trigonometry_nodes;
pub mod uniform_nodes;
pub mod vector_nodes;

use crate::graph::GraphNode;
use crate::nodes::NodeKind;

use super::context::Context;
use super::error::EmitError;

/// Emit `node` into the current stage, binding all of its output pins.
pub fn emit_node(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    cx.comment(node);
    match &node.kind {
        // Arithmetic
        NodeKind::Add => math_nodes::emit_binary(cx, node, math_nodes::BinaryOp::Add),
        NodeKind::Sub => math_nodes::emit_binary(cx, node, math_nodes::BinaryOp::Sub),
        NodeKind::Mul => math_nodes::emit_binary(cx, node, math_nodes::BinaryOp::Mul),
        NodeKind::Div => math_nodes::emit_binary(cx, node, math_nodes::BinaryOp::Div),
        NodeKind::Min => math_nodes::emit_binary(cx, node, math_nodes::BinaryOp::Min),
        NodeKind::Max => math_nodes::emit_binary(cx, node, math_nodes::BinaryOp::Max),
        NodeKind::Step => math_nodes::emit_binary(cx, node, math_nodes::BinaryOp::Step),
        NodeKind::Abs => math_nodes::emit_unary(cx, node, math_nodes::UnaryOp::Abs),
        NodeKind::Neg => math_nodes::emit_unary(cx, node, math_nodes::UnaryOp::Neg),
        NodeKind::Sign => math_nodes::emit_unary(cx, node, math_nodes::UnaryOp::Sign),
        NodeKind::Exp => math_nodes::emit_unary(cx, node, math_nodes::UnaryOp::Exp),
        NodeKind::Fraction => math_nodes::emit_unary(cx, node, math_nodes::UnaryOp::Fraction),
        NodeKind::Round => math_nodes::emit_unary(cx, node, math_nodes::UnaryOp::Round),
        NodeKind::Truncate => math_nodes::emit_unary(cx, node, math_nodes::UnaryOp::Truncate),
        NodeKind::Sqrt => math_nodes::emit_unary(cx, node, math_nodes::UnaryOp::Sqrt),
        NodeKind::RecipSqrt => math_nodes::emit_unary(cx, node, math_nodes::UnaryOp::RecipSqrt),
        NodeKind::Log(p) => math_nodes::emit_log(cx, node, p),
        NodeKind::Derivative(p) => math_nodes::emit_derivative(cx, node, p),
        NodeKind::MulAdd => math_nodes::emit_mul_add(cx, node),
        NodeKind::Lerp => math_nodes::emit_lerp(cx, node),
        NodeKind::Clamp(p) => math_nodes::emit_clamp(cx, node, p),
        NodeKind::Pow => math_nodes::emit_pow(cx, node),
        NodeKind::Polynomial => math_nodes::emit_polynomial(cx, node),

        // Trigonometry
        NodeKind::Sin => trigonometry_nodes::emit_trig(cx, node, "sin"),
        NodeKind::Cos => trigonometry_nodes::emit_trig(cx, node, "cos"),
        NodeKind::Tan => trigonometry_nodes::emit_trig(cx, node, "tan"),
        NodeKind::ArcusCos => trigonometry_nodes::emit_trig(cx, node, "acos"),
        NodeKind::ArcusTan => trigonometry_nodes::emit_arcus_tan(cx, node),

        // Vectors & matrices
        NodeKind::Dot => vector_nodes::emit_dot(cx, node),
        NodeKind::Cross => vector_nodes::emit_cross(cx, node),
        NodeKind::Normalize => vector_nodes::emit_normalize(cx, node),
        NodeKind::Length => vector_nodes::emit_length(cx, node),
        NodeKind::Reflect => vector_nodes::emit_reflect(cx, node),
        NodeKind::Swizzle(p) => vector_nodes::emit_swizzle(cx, node, p),
        NodeKind::MixIn => vector_nodes::emit_mix_in(cx, node),
        NodeKind::MixOut => vector_nodes::emit_mix_out(cx, node),
        NodeKind::MatrixIn => vector_nodes::emit_matrix_in(cx, node),
        NodeKind::MatrixOut => vector_nodes::emit_matrix_out(cx, node),
        NodeKind::Transform => vector_nodes::emit_transform(cx, node),
        NodeKind::Transpose => vector_nodes::emit_transpose(cx, node),

        // Constants & built-in inputs
        NodeKind::Scalar(p) => input_nodes::emit_scalar(cx, node, p),
        NodeKind::Vector(p) => input_nodes::emit_vector(cx, node, p),
        NodeKind::Color(p) => input_nodes::emit_color(cx, node, p),
        NodeKind::VertexInput(p) => input_nodes::emit_vertex_input(cx, node, p),
        NodeKind::Instance => input_nodes::emit_instance(cx, node),
        NodeKind::FragmentPosition => input_nodes::emit_fragment_position(cx, node),
        NodeKind::FrontFace => input_nodes::emit_front_face(cx, node),
        NodeKind::DispatchIndex(p) => input_nodes::emit_dispatch_index(cx, node, p),
        NodeKind::TargetSize => input_nodes::emit_target_size(cx, node),

        // Branches
        NodeKind::Conditional(p) => control_flow::emit_conditional(cx, node, p),
        NodeKind::Discard(p) => control_flow::emit_discard(cx, node, p),
        NodeKind::Switch(p) => control_flow::emit_switch(cx, node, p),

        // Loops
        NodeKind::Iterate(p) => loop_nodes::emit_iterate(cx, node, p),
        NodeKind::Iterate2 => loop_nodes::emit_iterate2(cx, node),
        NodeKind::Iterate2d(p) => loop_nodes::emit_iterate2d(cx, node, p),
        NodeKind::Repeat => loop_nodes::emit_repeat(cx, node),
        NodeKind::Sum(p) => loop_nodes::emit_sum(cx, node, p),

        // Resources
        NodeKind::Uniform(p) => uniform_nodes::emit_uniform(cx, node, p),
        NodeKind::IndexedUniform(p) => uniform_nodes::emit_indexed_uniform(cx, node, p),
        NodeKind::Struct(p) => uniform_nodes::emit_struct(cx, node, p),
        NodeKind::ReadStruct(p) => uniform_nodes::emit_read_struct(cx, node, p),
        NodeKind::ReadStruct2 => uniform_nodes::emit_read_struct2(cx, node),
        NodeKind::Sampler(p) => texture_nodes::emit_sampler(cx, node, p),
        NodeKind::TextureSize => texture_nodes::emit_texture_size(cx, node),
        NodeKind::TextureState(p) => texture_nodes::emit_texture_state(cx, node, p),

        // Stage boundaries
        NodeKind::VertexOutput(p) => io_nodes::emit_vertex_output(cx, node, p),
        NodeKind::PixelOutput(p) => io_nodes::emit_pixel_output(cx, node, p),
        NodeKind::ComputeOutput(p) => io_nodes::emit_compute_output(cx, node, p),
        NodeKind::Interpolator => io_nodes::emit_interpolator(cx, node),

        NodeKind::Script(p) => script::emit_script(cx, node, p),

        NodeKind::Unknown => Err(EmitError::UnknownNode {
            node: node.id.clone(),
            node_type: node.type_name.clone(),
        }),
    }
}

/// Graph builders for unit tests.
#[cfg(test)]
pub mod test_utils {
    use crate::codegen::settings::GeneratorSettings;
    use crate::codegen::{GeneratedProgram, NoModules, generate_program};
    use crate::dsl::{Connection, Endpoint, Metadata, Node, ShaderGraphDSL};
    use crate::graph::ShaderGraph;

    /// Create a DSL node; `params` must be a JSON object.
    pub fn node(id: &str, node_type: &str, params: serde_json::Value) -> Node {
        Node {
            id: id.to_string(),
            node_type: node_type.to_string(),
            params: match params {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            },
            comment: None,
        }
    }

    /// Create a ShaderGraphDSL for testing with default metadata and version.
    pub fn test_graph_dsl(nodes: Vec<Node>, connections: Vec<Connection>) -> ShaderGraphDSL {
        ShaderGraphDSL {
            version: "1.0".to_string(),
            metadata: Metadata {
                name: "test".to_string(),
                created: None,
                modified: None,
            },
            nodes,
            connections,
        }
    }

    /// Create a Connection for testing.
    pub fn test_connection(from_node: &str, from_port: &str, to_node: &str, to_port: &str) -> Connection {
        Connection {
            id: format!("{}_{}_{}", from_node, to_node, to_port),
            from: Endpoint {
                node_id: from_node.to_string(),
                port_id: from_port.to_string(),
            },
            to: Endpoint {
                node_id: to_node.to_string(),
                port_id: to_port.to_string(),
            },
        }
    }

    pub fn generate_with(
        nodes: Vec<Node>,
        connections: Vec<Connection>,
        settings: &GeneratorSettings,
    ) -> GeneratedProgram {
        let graph = ShaderGraph::from_dsl(&test_graph_dsl(nodes, connections)).unwrap();
        generate_program(&graph, settings, &NoModules)
    }

    /// Generate with default settings but direct texture binding, which keeps
    /// expected text short.
    pub fn generate(nodes: Vec<Node>, connections: Vec<Connection>) -> GeneratedProgram {
        let settings = GeneratorSettings {
            binding_model: crate::codegen::settings::BindingModel::Direct,
            ..GeneratorSettings::default()
        };
        generate_with(nodes, connections, &settings)
    }

    /// Fragment + vertex scaffold: `color_from` feeds the pixel output and a
    /// clip-space position constant feeds the vertex output.
    pub fn fragment_graph(mut nodes: Vec<Node>, mut connections: Vec<Connection>, color_from: (&str, &str)) -> (Vec<Node>, Vec<Connection>) {
        nodes.push(node("__pos", "Vector", serde_json::json!({ "value": [0.0, 0.0, 0.5, 1.0] })));
        nodes.push(node("__vout", "VertexOutput", serde_json::json!({})));
        nodes.push(node("__pout", "PixelOutput", serde_json::json!({})));
        connections.push(test_connection("__pos", "Output", "__vout", "Input"));
        connections.push(test_connection(color_from.0, color_from.1, "__pout", "Input"));
        (nodes, connections)
    }

    /// [`fragment_graph`] whose color reads `value` first inside the true branch of
    /// a Conditional and then again after it, through an Add.
    pub fn read_in_branch_and_after(
        mut nodes: Vec<Node>,
        mut connections: Vec<Connection>,
        value: (&str, &str),
        fallback: f32,
    ) -> (Vec<Node>, Vec<Connection>) {
        nodes.push(node("__x", "Scalar", serde_json::json!({ "value": 0.25 })));
        nodes.push(node("__r", "Scalar", serde_json::json!({ "value": 0.75 })));
        nodes.push(node("__else", "Scalar", serde_json::json!({ "value": fallback })));
        nodes.push(node("__cond", "Conditional", serde_json::json!({})));
        nodes.push(node("__after", "Add", serde_json::json!({})));
        connections.push(test_connection("__x", "Output", "__cond", "Input"));
        connections.push(test_connection("__r", "Output", "__cond", "Reference"));
        connections.push(test_connection(value.0, value.1, "__cond", "CaseTrue"));
        connections.push(test_connection("__else", "Output", "__cond", "CaseFalse"));
        connections.push(test_connection("__cond", "Output", "__after", "Input1"));
        connections.push(test_connection(value.0, value.1, "__after", "Input2"));
        fragment_graph(nodes, connections, ("__after", "Output"))
    }

    /// Fragment stage text of a graph built with [`fragment_graph`]; panics with
    /// the diagnostics when the stage failed.
    pub fn fragment_source(program: &GeneratedProgram) -> String {
        stage_source(program, crate::codegen::types::Stage::Fragment)
    }

    pub fn stage_source(program: &GeneratedProgram, stage: crate::codegen::types::Stage) -> String {
        let s = program
            .stage(stage)
            .unwrap_or_else(|| panic!("no {stage} stage generated"));
        match &s.source {
            Some(text) => text.clone(),
            None => panic!("{stage} stage failed: {:?}", s.diagnostics),
        }
    }

    /// First diagnostic message of `stage`, if any.
    pub fn stage_error(program: &GeneratedProgram, stage: crate::codegen::types::Stage) -> Option<String> {
        program
            .stage(stage)
            .and_then(|s| s.diagnostics.first())
            .map(|d| d.message.clone())
    }
}
