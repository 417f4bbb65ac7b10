//! Shader code generation: lowers a resolved node graph into one WGSL program
//! per pipeline stage plus the resource layout the runtime binds against.
//!
//! Generation is driven from the sink nodes. Each sink pulls its inputs on
//! demand through [`context::Context`]; every output pin is emitted at most once
//! per scope. A failing sink fails only its own stage.

pub mod context;
pub mod error;
pub mod layout;
pub mod modules;
pub mod node_emitter;
pub mod requirements;
pub mod settings;
pub mod shader;
pub mod types;
pub mod utils;
pub mod validation;

use serde::Serialize;

use crate::graph::{NodeIndex, ShaderGraph};
use crate::nodes::{NodeKind, PrecisionHint};

use context::{Context, ProgramParameter};
use error::{Diagnostic, EmitError};
use layout::Resource;
use requirements::Requirements;
use settings::{Dialect, GeneratorSettings};
use shader::Shader;
use types::Stage;

pub use modules::{DirectoryModules, ModuleResolver, NoModules};

/// Text of one stage, or the diagnostics explaining why it has none.
#[derive(Debug, Clone, Serialize)]
pub struct StageProgram {
    pub stage: Stage,
    pub source: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedProgram {
    pub stages: Vec<StageProgram>,
    pub layout: Vec<Resource>,
    pub requirements: Requirements,
    pub parameters: Vec<ProgramParameter>,
}

impl GeneratedProgram {
    pub fn stage(&self, stage: Stage) -> Option<&StageProgram> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// True when at least one stage was generated and none failed.
    pub fn is_success(&self) -> bool {
        !self.stages.is_empty() && self.stages.iter().all(|s| s.source.is_some())
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.stages.iter().flat_map(|s| s.diagnostics.iter())
    }
}

fn emit_sinks(cx: &mut Context<'_>, stage: Stage, sinks: &[NodeIndex]) {
    let graph = cx.graph();
    for &index in sinks {
        let node = graph.node(index);
        if cx.stage_failed(stage) {
            log::warn!("{stage} stage already failed; skipping sink {}", node.id);
            continue;
        }
        log::debug!("emitting sink {} ({}) in {stage} stage", node.id, node.type_name);
        if let Err(e) = node_emitter::emit_node(cx, node) {
            log::warn!("{stage} stage failed: {e}");
            cx.push_error(stage, &e);
        }
    }
}

/// Generate every stage the graph's sinks call for.
///
/// A graph with both PixelOutput and VertexOutput sinks produces vertex and
/// fragment programs; the fragment sinks run first so interpolated values can
/// append their vertex-side writes before the vertex sink closes that body.
/// Otherwise ComputeOutput sinks and Script nodes with a technique produce a
/// compute program.
pub fn generate_program(graph: &ShaderGraph, settings: &GeneratorSettings, modules: &dyn ModuleResolver) -> GeneratedProgram {
    let mut cx = Context::new(graph, settings);

    let pixel = graph.nodes_where(|k| matches!(k, NodeKind::PixelOutput(_)));
    let vertex = graph.nodes_where(|k| matches!(k, NodeKind::VertexOutput(_)));
    let stages = if !pixel.is_empty() && !vertex.is_empty() {
        cx.enter_fragment();
        emit_sinks(&mut cx, Stage::Fragment, &pixel);
        cx.enter_vertex();
        emit_sinks(&mut cx, Stage::Vertex, &vertex);
        vec![Stage::Vertex, Stage::Fragment]
    } else {
        if !pixel.is_empty() || !vertex.is_empty() {
            log::warn!(
                "graph {} needs both PixelOutput and VertexOutput for a render program; dropping {} sink(s)",
                graph.name,
                pixel.len() + vertex.len()
            );
        }
        let compute = graph.nodes_where(|k| match k {
            NodeKind::ComputeOutput(_) => true,
            NodeKind::Script(p) => p.technique.is_some(),
            _ => false,
        });
        if compute.is_empty() {
            log::warn!("graph {} has no sinks to generate", graph.name);
            Vec::new()
        } else {
            cx.enter_compute();
            emit_sinks(&mut cx, Stage::Compute, &compute);
            vec![Stage::Compute]
        }
    };

    cx.layout_mut().finalize();
    let mut parts = cx.into_parts();

    let mut programs = Vec::with_capacity(stages.len());
    for stage in stages {
        let mut diagnostics: Vec<Diagnostic> = parts
            .diagnostics
            .iter()
            .filter(|d| d.stage == stage)
            .cloned()
            .collect();
        let source = if diagnostics.is_empty() {
            let precision = match stage {
                Stage::Vertex => parts.requirements.vertex_precision_hint,
                Stage::Fragment => parts.requirements.fragment_precision_hint,
                Stage::Compute => PrecisionHint::Undefined,
            };
            let shader = match stage {
                Stage::Vertex => &mut parts.vertex,
                Stage::Fragment => &mut parts.fragment,
                Stage::Compute => &mut parts.compute,
            };
            if !settings.ignore_precision_hint && precision != PrecisionHint::Undefined {
                shader.add_header(format!("// precision: {precision:?}"));
            }
            let resources = parts.layout.declarations(stage);
            match assemble_stage(shader, &resources, parts.requirements.local_size, modules) {
                Ok(text) => finish_stage(stage, text, settings, &mut diagnostics),
                Err(e) => {
                    log::warn!("{stage} stage failed: {e}");
                    diagnostics.push(Diagnostic::from_error(stage, &e));
                    None
                }
            }
        } else {
            None
        };
        log::debug!(
            "{stage} stage: {}",
            if source.is_some() { "generated" } else { "failed" }
        );
        programs.push(StageProgram {
            stage,
            source,
            diagnostics,
        });
    }

    GeneratedProgram {
        stages: programs,
        layout: parts.layout.resources().to_vec(),
        requirements: parts.requirements,
        parameters: parts.parameters,
    }
}

fn assemble_stage(
    shader: &Shader,
    resources: &str,
    local_size: [u32; 3],
    modules: &dyn ModuleResolver,
) -> Result<String, EmitError> {
    let mut included = Vec::new();
    for (id, node) in shader.modules() {
        let text = modules.resolve(id).ok_or_else(|| EmitError::UnresolvedModule {
            node: node.to_string(),
            module: id.to_string(),
        })?;
        included.push((id.to_string(), text));
    }
    Ok(shader.assemble(resources, &included, local_size))
}

/// Apply the output dialect to an assembled WGSL stage.
fn finish_stage(stage: Stage, text: String, settings: &GeneratorSettings, diagnostics: &mut Vec<Diagnostic>) -> Option<String> {
    let dialect = match settings.dialect() {
        Ok(d) => d,
        Err(e) => {
            diagnostics.push(Diagnostic::stage_level(stage, format!("{e:#}")));
            return None;
        }
    };
    match dialect {
        Dialect::Wgsl => Some(text),
        Dialect::Msl => match validation::cross_compile_msl(&text) {
            Ok(msl) => Some(msl),
            Err(e) => {
                log::warn!("{stage} stage failed to cross-compile");
                diagnostics.push(Diagnostic::stage_level(stage, format!("{e:#}")));
                None
            }
        },
    }
}
