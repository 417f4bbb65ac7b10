use proptest::prelude::*;
use serde_json::json;

use node_forge_shadergen::codegen::layout::ResourceLayout;
use node_forge_shadergen::codegen::shader::Shader;
use node_forge_shadergen::codegen::types::{Stage, ValueType, cast_expr};
use node_forge_shadergen::dsl::ShaderGraphDSL;
use node_forge_shadergen::graph::{OutputPin, ShaderGraph};
use node_forge_shadergen::nodes::{Address, SamplerState};
use node_forge_shadergen::{BindingModel, GeneratedProgram, GeneratorSettings, NoModules, generate_program};

fn value_type() -> impl Strategy<Value = ValueType> {
    prop::sample::select(ValueType::ALL.to_vec())
}

fn stage() -> impl Strategy<Value = Stage> {
    prop::sample::select(vec![Stage::Vertex, Stage::Fragment, Stage::Compute])
}

/// Fragment/vertex graph whose pixel output reads `color` (a node id).
fn render_graph(mut nodes: Vec<serde_json::Value>, mut connections: Vec<serde_json::Value>, color: &str) -> GeneratedProgram {
    nodes.push(json!({ "id": "pos", "type": "Vector", "params": { "value": [0.0, 0.0, 0.5, 1.0] } }));
    nodes.push(json!({ "id": "vout", "type": "VertexOutput" }));
    nodes.push(json!({ "id": "pout", "type": "PixelOutput" }));
    connections.push(link("pos", "Output", "vout", "Input"));
    connections.push(link(color, "Output", "pout", "Input"));
    let dsl: ShaderGraphDSL = serde_json::from_value(json!({
        "version": "1.0",
        "metadata": { "name": "prop" },
        "nodes": nodes,
        "connections": connections,
    }))
    .unwrap();
    let graph = ShaderGraph::from_dsl(&dsl).unwrap();
    let settings = GeneratorSettings {
        binding_model: BindingModel::Direct,
        ..GeneratorSettings::default()
    };
    generate_program(&graph, &settings, &NoModules)
}

fn link(from: &str, from_port: &str, to: &str, to_port: &str) -> serde_json::Value {
    json!({
        "id": format!("{from}_{to}_{to_port}"),
        "from": { "nodeId": from, "portId": from_port },
        "to": { "nodeId": to, "portId": to_port },
    })
}

proptest! {
    #[test]
    fn promote_is_an_upper_bound(a in value_type(), b in value_type()) {
        if let Some(joined) = ValueType::promote(a, b) {
            prop_assert!(ValueType::le(a, joined), "{a:?} <= {joined:?}");
            prop_assert!(ValueType::le(b, joined), "{b:?} <= {joined:?}");
        }
        prop_assert_eq!(ValueType::promote(a, b), ValueType::promote(b, a));
    }

    #[test]
    fn promoted_operands_can_be_cast_to_the_join(a in value_type(), b in value_type()) {
        let joined = ValueType::promote(a, b).filter(|_| a.is_numeric() && b.is_numeric());
        if let Some(joined) = joined {
            prop_assert!(cast_expr("x", a, joined).is_some());
            prop_assert!(cast_expr("x", b, joined).is_some());
        }
    }

    #[test]
    fn matrix_with_vector_reports_type_mismatch(vector in prop::bool::ANY, op in prop::sample::select(vec!["Add", "Sub", "Min"])) {
        let other = if vector { "Vector" } else { "Scalar" };
        let program = render_graph(
            vec![
                json!({ "id": "m", "type": "Uniform", "params": { "parameterName": "world", "parameterType": "Matrix" } }),
                json!({ "id": "o", "type": "Uniform", "params": { "parameterName": "other", "parameterType": other } }),
                json!({ "id": "op", "type": op }),
            ],
            vec![link("m", "Output", "op", "Input1"), link("o", "Output", "op", "Input2")],
            "op",
        );
        let fragment = program.stage(Stage::Fragment).unwrap();
        prop_assert!(fragment.source.is_none());
        prop_assert!(fragment.diagnostics[0].message.contains("type mismatch"), "{}", fragment.diagnostics[0].message);
    }

    #[test]
    fn temporaries_do_not_leak_out_of_scopes(outer in 0usize..6, inner in 1usize..6) {
        let mut shader = Shader::new(Stage::Fragment);
        for i in 0..outer {
            shader.create_temporary(Some(OutputPin::new(i, "Output")), ValueType::Float);
        }

        shader.push_scope();
        let mut inner_names = Vec::new();
        for i in 0..inner {
            let v = shader.create_temporary(Some(OutputPin::new(outer + i, "Output")), ValueType::Float);
            inner_names.push(v.name);
        }
        prop_assert_eq!(&inner_names[0], &format!("v{outer}"));
        shader.pop_scope();

        for i in 0..inner {
            prop_assert!(shader.find_variable(&OutputPin::new(outer + i, "Output")).is_none());
        }
        for i in 0..outer {
            prop_assert!(shader.find_variable(&OutputPin::new(i, "Output")).is_some());
        }
        prop_assert_eq!(shader.variable_count(), outer);
        let reused = shader.create_temporary(None, ValueType::Float);
        prop_assert_eq!(reused.name, format!("v{outer}"));
    }

    #[test]
    fn equal_samplers_merge_stage_masks(first in stage(), second in stage(), clamp in prop::bool::ANY) {
        let mut layout = ResourceLayout::new();
        let mut state = SamplerState::default();
        if clamp {
            state.address_u = Address::Clamp;
        }
        let a = layout.sampler(&state, first);
        let b = layout.sampler(&state, second);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(layout.resources().len(), 1);
        let r = layout.find(&a).unwrap();
        prop_assert!(r.stages.contains(first));
        prop_assert!(r.stages.contains(second));
    }

    #[test]
    fn fan_out_emits_one_statement(fan in 2usize..6) {
        let mut nodes = vec![json!({ "id": "s", "type": "Scalar", "params": { "value": 0.5 } })];
        let mut connections = Vec::new();
        let mut previous = "s".to_string();
        for i in 0..fan {
            let id = format!("add{i}");
            nodes.push(json!({ "id": id, "type": "Add" }));
            connections.push(link(&previous, "Output", &id, "Input1"));
            connections.push(link("s", "Output", &id, "Input2"));
            previous = id;
        }
        let program = render_graph(nodes, connections, &previous);
        let fragment = program.stage(Stage::Fragment).unwrap().source.clone().unwrap();
        prop_assert_eq!(fragment.matches("= 0.5;").count(), 1, "{}", fragment);
        prop_assert_eq!(fragment.matches(": f32 = ").count(), fan + 1, "{}", fragment);
    }
}
