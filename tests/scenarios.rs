use std::path::PathBuf;

use node_forge_shadergen::codegen::layout::ResourcePayload;
use node_forge_shadergen::codegen::types::Stage;
use node_forge_shadergen::graph::ShaderGraph;
use node_forge_shadergen::{BindingModel, GeneratedProgram, GeneratorSettings, NoModules, dsl, generate_program};

fn case_path(case_name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("cases")
        .join(format!("{case_name}.json"))
}

fn direct_settings() -> GeneratorSettings {
    GeneratorSettings {
        binding_model: BindingModel::Direct,
        ..GeneratorSettings::default()
    }
}

fn generate_case(case_name: &str) -> GeneratedProgram {
    let _ = env_logger::builder().is_test(true).try_init();
    let dsl = dsl::load_graph_from_path(case_path(case_name))
        .unwrap_or_else(|e| panic!("case {case_name}: load failed: {e:#}"));
    let graph = ShaderGraph::from_dsl(&dsl).unwrap_or_else(|e| panic!("case {case_name}: {e:#}"));
    generate_program(&graph, &direct_settings(), &NoModules)
}

fn source(program: &GeneratedProgram, stage: Stage) -> &str {
    let s = program
        .stage(stage)
        .unwrap_or_else(|| panic!("no {stage} stage generated"));
    s.source
        .as_deref()
        .unwrap_or_else(|| panic!("{stage} stage failed: {:?}", s.diagnostics))
}

#[test]
fn unconnected_add_fails_fragment_stage() {
    let program = generate_case("unconnected_add");
    let fragment = program.stage(Stage::Fragment).unwrap();
    assert!(fragment.source.is_none());
    assert_eq!(fragment.diagnostics.len(), 1);
    let d = &fragment.diagnostics[0];
    assert_eq!(d.node.as_deref(), Some("add"));
    assert!(d.message.contains("is not connected"), "{}", d.message);

    // The vertex stage is independent of the failed pixel sink.
    assert!(program.stage(Stage::Vertex).unwrap().source.is_some());
    assert!(!program.is_success());
}

#[test]
fn scalar_operand_is_cast_up_to_vector() {
    let program = generate_case("scalar_plus_vector");
    let fragment = source(&program, Stage::Fragment);
    assert!(fragment.contains("let v0: i32 = 2;"), "{fragment}");
    assert!(fragment.contains("let v2: vec4f = vec4f(f32(v0)) + v1;"), "{fragment}");
    assert!(fragment.contains("output.color0 = v2;"), "{fragment}");
}

#[test]
fn identical_samplers_share_one_resource() {
    let program = generate_case("shared_sampler");
    let fragment = source(&program, Stage::Fragment);
    let samplers: Vec<_> = program
        .layout
        .iter()
        .filter(|r| matches!(r.payload, ResourcePayload::Sampler { .. }))
        .collect();
    assert_eq!(samplers.len(), 1, "{:?}", program.layout);
    assert_eq!(samplers[0].name, "samp_0");
    assert_eq!(fragment.matches("textureSample(albedo, samp_0, v0.xy)").count(), 2, "{fragment}");
    assert!(!fragment.contains("samp_1"), "{fragment}");
}

#[test]
fn conditional_output_takes_widest_branch_type() {
    let program = generate_case("conditional_widening");
    let fragment = source(&program, Stage::Fragment);
    assert!(fragment.contains("var v2: vec2f;\n"), "{fragment}");
    assert!(fragment.contains("v2 = vec2f(v3);"), "{fragment}");
    assert_eq!(fragment.matches("let v3: f32 = 0.5;").count(), 1, "{fragment}");
}

#[test]
fn compute_output_sets_workgroup_size() {
    let program = generate_case("compute_workgroup");
    assert_eq!(program.stages.len(), 1);
    let compute = source(&program, Stage::Compute);
    assert!(compute.contains("@compute @workgroup_size(8, 8, 1)\n"), "{compute}");
    assert_eq!(program.requirements.local_size, [8, 8, 1]);
}

#[test]
fn widths_three_and_one_share_an_interpolator() {
    let program = generate_case("interpolator_packing");
    assert_eq!(program.requirements.interpolator_count, 1);

    let fragment = source(&program, Stage::Fragment);
    assert_eq!(fragment.matches("@location(0) Attr0: vec4f,").count(), 1, "{fragment}");
    assert!(!fragment.contains("Attr1"), "{fragment}");
    assert!(fragment.contains("input.Attr0.xyz"), "{fragment}");
    assert!(fragment.contains("input.Attr0.w"), "{fragment}");

    let vertex = source(&program, Stage::Vertex);
    assert_eq!(vertex.matches("@location(0) Attr0: vec4f,").count(), 1, "{vertex}");
    assert!(vertex.contains("output.Attr0.z = "), "{vertex}");
    assert!(vertex.contains("output.Attr0.w = "), "{vertex}");
    assert!(!vertex.contains("Attr1"), "{vertex}");
}

#[test]
fn generation_is_deterministic() {
    for case_name in ["shared_sampler", "conditional_widening", "interpolator_packing", "compute_workgroup"] {
        let first = generate_case(case_name);
        let second = generate_case(case_name);
        for (a, b) in first.stages.iter().zip(&second.stages) {
            assert_eq!(a.source, b.source, "case {case_name}: {} stage differs", a.stage);
        }
        assert_eq!(
            serde_json::to_string(&first.layout).unwrap(),
            serde_json::to_string(&second.layout).unwrap(),
            "case {case_name}: layout differs"
        );
        assert_eq!(first.layout, second.layout);
    }
}

#[test]
fn shared_output_pin_is_emitted_once() {
    let program = generate_case("shared_sampler");
    let fragment = source(&program, Stage::Fragment);
    // `uv` feeds both samplers.
    assert_eq!(fragment.matches("vec4f(0.5, 0.25, 0.0, 0.0)").count(), 1, "{fragment}");
}

#[test]
fn layout_serializes_bindings() {
    let program = generate_case("shared_sampler");
    let json = serde_json::to_value(&program.layout).unwrap();
    let entries = json.as_array().unwrap();
    let albedo = entries.iter().find(|e| e["name"] == "albedo").unwrap();
    assert_eq!(albedo["group"], 0);
    assert_eq!(albedo["binding"], 0);
    let sampler = entries.iter().find(|e| e["name"] == "samp_0").unwrap();
    assert_eq!(sampler["binding"], 1);
}
