use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use node_forge_shadergen::codegen::settings::Dialect;
use node_forge_shadergen::codegen::types::Stage;
use node_forge_shadergen::codegen::validation;
use node_forge_shadergen::graph::ShaderGraph;
use node_forge_shadergen::{DirectoryModules, GeneratorSettings, ModuleResolver, NoModules, dsl, generate_program};

/// Generate WGSL stage programs from a node-forge shader graph
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Shader graph JSON file
    graph: PathBuf,

    /// Generator settings JSON file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Override one setting, e.g. `--set BindingModel=Direct`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Directory holding `<id>.wgsl` modules for script includes
    #[arg(long)]
    modules_dir: Option<PathBuf>,

    /// Write `<name>.<stage>.wgsl` files here instead of printing to stdout
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Validate every generated WGSL stage with naga
    #[arg(long)]
    validate: bool,

    /// Print the resource layout as JSON
    #[arg(long)]
    layout: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_settings(cli: &Cli) -> Result<GeneratorSettings> {
    let mut settings = match &cli.settings {
        Some(path) => GeneratorSettings::load_from_path(path)?,
        None => GeneratorSettings::default(),
    };
    for assignment in &cli.overrides {
        settings
            .apply_override(assignment)
            .with_context(|| format!("invalid --set {assignment}"))?;
    }
    Ok(settings)
}

fn stage_path(out_dir: &Path, name: &str, stage: Stage, extension: &str) -> PathBuf {
    out_dir.join(format!("{name}.{stage}.{extension}"))
}

/// Returns whether every stage generated (and validated, when asked).
fn run(cli: Cli) -> Result<bool> {
    let settings = load_settings(&cli)?;
    let dsl = dsl::load_graph_from_path(&cli.graph)?;
    let graph = ShaderGraph::from_dsl(&dsl)
        .with_context(|| format!("invalid shader graph {}", cli.graph.display()))?;

    let directory = cli.modules_dir.as_ref().map(DirectoryModules::new);
    let modules: &dyn ModuleResolver = match &directory {
        Some(d) => d,
        None => &NoModules,
    };
    let program = generate_program(&graph, &settings, modules);

    for d in program.diagnostics() {
        eprintln!("{d}");
    }
    if program.stages.is_empty() {
        eprintln!("graph {} has no output nodes", graph.name);
    }

    let extension = match settings.dialect()? {
        Dialect::Wgsl => "wgsl",
        Dialect::Msl => "metal",
    };
    let mut ok = program.is_success();
    for stage in &program.stages {
        let Some(source) = &stage.source else {
            continue;
        };
        if cli.validate && extension == "wgsl" {
            let context = format!("{} stage of {}", stage.stage, graph.name);
            if let Err(e) = validation::validate_wgsl_with_context(source, &context) {
                eprintln!("{e:#}");
                ok = false;
            }
        }
        match &cli.out_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                let path = stage_path(dir, &graph.name, stage.stage, extension);
                std::fs::write(&path, source)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("wrote {}", path.display());
            }
            None => {
                println!("// ---- {} stage ----", stage.stage);
                print!("{source}");
            }
        }
    }

    if cli.layout {
        let json = serde_json::to_string_pretty(&program.layout).context("failed to serialize layout")?;
        println!("{json}");
    }
    Ok(ok)
}
