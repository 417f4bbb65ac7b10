use std::path::PathBuf;

use node_forge_shadergen::codegen::validation;
use node_forge_shadergen::graph::ShaderGraph;
use node_forge_shadergen::{BindingModel, GeneratorSettings, NoModules, dsl, generate_program};

fn cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("cases")
}

/// Fixtures whose every stage is expected to generate.
const VALID_CASES: &[&str] = &[
    "scalar_plus_vector",
    "shared_sampler",
    "conditional_widening",
    "compute_workgroup",
    "interpolator_packing",
];

#[test]
fn generated_stages_pass_naga_validation() {
    let _ = env_logger::builder().is_test(true).try_init();
    let settings = GeneratorSettings {
        binding_model: BindingModel::Direct,
        ..GeneratorSettings::default()
    };

    for case_name in VALID_CASES {
        let path = cases_dir().join(format!("{case_name}.json"));
        let dsl = dsl::load_graph_from_path(&path)
            .unwrap_or_else(|e| panic!("case {case_name}: load input DSL json failed: {e:#}"));
        let graph = ShaderGraph::from_dsl(&dsl).unwrap_or_else(|e| panic!("case {case_name}: {e:#}"));
        let program = generate_program(&graph, &settings, &NoModules);
        assert!(program.is_success(), "case {case_name}: {:?}", program.stages);

        for stage in &program.stages {
            let source = stage.source.as_deref().unwrap();
            let context = format!("{} stage of {case_name}", stage.stage);
            if let Err(e) = validation::validate_wgsl_with_context(source, &context) {
                panic!("{e:#}");
            }
        }
    }
}

#[test]
fn every_fixture_parses() {
    let mut count = 0;
    for entry in std::fs::read_dir(cases_dir()).unwrap().flatten() {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let dsl = dsl::load_graph_from_path(&path).unwrap_or_else(|e| panic!("{e:#}"));
        ShaderGraph::from_dsl(&dsl).unwrap_or_else(|e| panic!("{}: {e:#}", path.display()));
        count += 1;
    }
    assert!(count >= VALID_CASES.len(), "expected fixtures in {}", cases_dir().display());
}
