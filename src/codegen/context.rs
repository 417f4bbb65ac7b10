//! Generation context: current stage, the three stage accumulators, the resource
//! layout, cross-stage requirements and diagnostics of one run.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::graph::{GraphNode, OutputPin, ShaderGraph};
use crate::nodes::{ParameterType, SamplerState, StructElement, UpdateFrequency};

use super::error::{Diagnostic, EmitError};
use super::layout::{LayoutConflict, ResourceLayout};
use super::node_emitter;
use super::requirements::Requirements;
use super::settings::GeneratorSettings;
use super::shader::Shader;
use super::types::{Stage, ValueType, Variable, cast_expr};

/// Uniform parameter exposed by the program, for the runtime to fill in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    pub length: u32,
    pub frequency: UpdateFrequency,
}

pub struct Context<'a> {
    graph: &'a ShaderGraph,
    settings: &'a GeneratorSettings,
    current: Option<Stage>,
    vertex: Shader,
    fragment: Shader,
    compute: Shader,
    layout: ResourceLayout,
    requirements: Requirements,
    parameters: BTreeMap<String, ProgramParameter>,
    // Vertex attribute location -> member name.
    vertex_locations: BTreeMap<u32, String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Context<'a> {
    pub fn new(graph: &'a ShaderGraph, settings: &'a GeneratorSettings) -> Self {
        Self {
            graph,
            settings,
            current: None,
            vertex: Shader::new(Stage::Vertex),
            fragment: Shader::new(Stage::Fragment),
            compute: Shader::new(Stage::Compute),
            layout: ResourceLayout::new(),
            requirements: Requirements::default(),
            parameters: BTreeMap::new(),
            vertex_locations: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn graph(&self) -> &'a ShaderGraph {
        self.graph
    }

    pub fn settings(&self) -> &'a GeneratorSettings {
        self.settings
    }

    // ---- stages ----

    pub fn stage(&self) -> Stage {
        self.current
            .expect("node emitted before any stage was entered")
    }

    pub fn in_fragment(&self) -> bool {
        self.current == Some(Stage::Fragment)
    }

    pub fn enter_vertex(&mut self) {
        self.current = Some(Stage::Vertex);
    }

    pub fn enter_fragment(&mut self) {
        self.current = Some(Stage::Fragment);
    }

    pub fn enter_compute(&mut self) {
        self.current = Some(Stage::Compute);
    }

    /// Run `f` with `stage` current, restoring the previous stage afterwards.
    pub fn with_stage<T>(&mut self, stage: Stage, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = self.current.replace(stage);
        let result = f(self);
        self.current = previous;
        result
    }

    pub fn shader(&mut self) -> &mut Shader {
        let stage = self.stage();
        self.shader_of(stage)
    }

    pub fn shader_of(&mut self, stage: Stage) -> &mut Shader {
        match stage {
            Stage::Vertex => &mut self.vertex,
            Stage::Fragment => &mut self.fragment,
            Stage::Compute => &mut self.compute,
        }
    }

    pub fn shader_ref(&self, stage: Stage) -> &Shader {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Fragment => &self.fragment,
            Stage::Compute => &self.compute,
        }
    }

    /// Fail with Unsupported-context unless the current stage is one of `stages`.
    pub fn require_stage(&self, node: &GraphNode, what: &str, stages: &[Stage]) -> Result<(), EmitError> {
        let stage = self.stage();
        if stages.contains(&stage) {
            Ok(())
        } else {
            Err(EmitError::UnsupportedContext {
                node: node.id.clone(),
                what: what.to_string(),
                stage,
            })
        }
    }

    // ---- inputs ----

    /// Resolve the value feeding `node.pin`, emitting its producer on first use.
    pub fn emit_input(&mut self, node: &GraphNode, pin: &str) -> Result<Variable, EmitError> {
        self.emit_optional_input(node, pin)?
            .ok_or_else(|| EmitError::UnconnectedInput {
                node: node.id.clone(),
                pin: pin.to_string(),
            })
    }

    pub fn emit_optional_input(&mut self, node: &GraphNode, pin: &str) -> Result<Option<Variable>, EmitError> {
        let graph = self.graph;
        let Some(source) = graph.source(node.index, pin) else {
            return Ok(None);
        };
        self.emit_output(source).map(Some)
    }

    /// Input that must be connected and numeric.
    pub fn emit_numeric_input(&mut self, node: &GraphNode, pin: &str) -> Result<Variable, EmitError> {
        let v = self.emit_input(node, pin)?;
        if !v.ty.is_numeric() {
            return Err(EmitError::type_mismatch(
                &node.id,
                format!("input `{pin}` must be a scalar or vector, got {:?}", v.ty),
            ));
        }
        Ok(v)
    }

    /// Memoized value of an output pin.
    pub fn emit_output(&mut self, source: &OutputPin) -> Result<Variable, EmitError> {
        if let Some(v) = self.shader().find_variable(source) {
            return Ok(v.clone());
        }
        let graph = self.graph;
        let producer = graph.node(source.node);
        log::trace!(
            "emit {} ({}) in {} stage",
            producer.id,
            producer.type_name,
            self.stage()
        );
        node_emitter::emit_node(self, producer)?;
        self.shader().find_variable(source).cloned().ok_or_else(|| {
            EmitError::type_mismatch(&producer.id, format!("node has no output pin `{}`", source.pin))
        })
    }

    /// Value of `pin` as produced in `stage`, emitting it there if needed.
    pub fn emit_output_in(&mut self, stage: Stage, pin: &OutputPin) -> Result<Variable, EmitError> {
        self.with_stage(stage, |cx| cx.emit_output(pin))
    }

    /// Carry a vertex-stage value into the fragment stage through an interpolator slot.
    ///
    /// The vertex side writes the value component-wise into the slot; the fragment
    /// side binds `bind` in its outer table to the matching component mask.
    /// Integer values travel in `@interpolate(flat)` `vec4i` slots and keep their type.
    pub fn interpolate(&mut self, node: &GraphNode, value: &Variable, bind: OutputPin) -> Result<Variable, EmitError> {
        let width = value.ty.width();
        if !value.ty.is_numeric() || width == 0 || width > 4 {
            return Err(EmitError::type_mismatch(
                &node.id,
                format!("cannot interpolate a value of type {:?}", value.ty),
            ));
        }
        let flat = value.ty.is_integer();
        let slot = self.requirements.allocate_interpolator(width, flat);
        let attr = format!("Attr{}", slot.slot);
        if slot.declare {
            let member = if flat {
                format!("@location({}) @interpolate(flat) {attr}: vec4i,", slot.slot)
            } else {
                format!("@location({}) {attr}: vec4f,", slot.slot)
            };
            self.vertex.declare_output(&attr, member.clone());
            self.fragment.declare_input(&attr, member);
        }
        let mask = &"xyzw"[slot.offset as usize..(slot.offset + width) as usize];
        for (i, c) in mask.chars().enumerate() {
            let component = if width == 1 {
                value.name.clone()
            } else {
                format!("{}.{}", value.name, &"xyzw"[i..=i])
            };
            self.vertex.write(format!("output.{attr}.{c} = {component};"));
        }
        Ok(self
            .fragment
            .create_outer_variable(bind, format!("input.{attr}.{mask}"), value.ty))
    }

    /// Register a vertex attribute location, rejecting one location used under two names.
    pub fn vertex_location(&mut self, node: &GraphNode, location: u32, name: &str) -> Result<(), EmitError> {
        match self.vertex_locations.get(&location) {
            Some(existing) if existing != name => Err(EmitError::ResourceConflict {
                node: node.id.clone(),
                name: name.to_string(),
                detail: format!("vertex location {location} already holds `{existing}`"),
            }),
            Some(_) => Ok(()),
            None => {
                if let Some((other, _)) = self.vertex_locations.iter().find(|(_, n)| n.as_str() == name) {
                    return Err(EmitError::ResourceConflict {
                        node: node.id.clone(),
                        name: name.to_string(),
                        detail: format!("attribute already bound to location {other}"),
                    });
                }
                self.vertex_locations.insert(location, name.to_string());
                Ok(())
            }
        }
    }

    /// Whether `node.pin` has an upstream producer.
    pub fn is_connected(&self, node: &GraphNode, pin: &str) -> bool {
        self.graph.source(node.index, pin).is_some()
    }

    // ---- statements ----

    /// Write the node's editor comment, if any.
    pub fn comment(&mut self, node: &GraphNode) {
        if let Some(c) = &node.comment {
            for line in c.lines() {
                self.shader().write(format!("// {}", line.trim_end()));
            }
        }
    }

    /// `let vN: T = expr;` bound to `node.pin`.
    pub fn assign(&mut self, node: &GraphNode, pin: &str, ty: ValueType, expr: impl AsRef<str>) -> Result<Variable, EmitError> {
        self.declare_checked(node, ty)?;
        let v = self.shader().create_temporary(Some(node.output(pin)), ty);
        self.shader()
            .write(format!("let {}: {} = {};", v.name, ty.wgsl(), expr.as_ref()));
        Ok(v)
    }

    /// `var vN: T = expr;` bound to `node.pin`.
    pub fn assign_mutable(
        &mut self,
        node: &GraphNode,
        pin: &str,
        ty: ValueType,
        expr: impl AsRef<str>,
    ) -> Result<Variable, EmitError> {
        self.declare_checked(node, ty)?;
        let v = self.shader().create_temporary(Some(node.output(pin)), ty);
        self.shader()
            .write(format!("var {}: {} = {};", v.name, ty.wgsl(), expr.as_ref()));
        Ok(v)
    }

    fn declare_checked(&self, node: &GraphNode, ty: ValueType) -> Result<(), EmitError> {
        if ty.is_declarable() {
            Ok(())
        } else {
            Err(EmitError::type_mismatch(
                &node.id,
                format!("cannot declare a value of type {ty:?}"),
            ))
        }
    }

    /// Reserve the output variable of a branch/loop node; typed once branches are known.
    pub fn reserve_output(&mut self, node: &GraphNode, pin: &str) -> Variable {
        self.shader().create_temporary(Some(node.output(pin)), ValueType::Void)
    }

    /// Fix the type of a reserved output and write `var vN: T;`.
    pub fn declare_reserved(&mut self, node: &GraphNode, out: &Variable, ty: ValueType) -> Result<Variable, EmitError> {
        self.declare_checked(node, ty)?;
        let pin = out.pin.clone().unwrap_or_else(|| node.output("Output"));
        let v = self
            .shader()
            .retype(&pin, ty)
            .unwrap_or_else(|| Variable::new(Some(pin), out.name.clone(), ty));
        self.shader().write(format!("var {}: {};", v.name, ty.wgsl()));
        Ok(v)
    }

    pub fn write(&mut self, line: impl AsRef<str>) {
        self.shader().write(line);
    }

    /// Write one line a block deeper than the current depth.
    pub fn write_nested(&mut self, line: impl AsRef<str>) {
        self.shader().write(format!("    {}", line.as_ref()));
    }

    pub fn write_raw(&mut self, text: &str) {
        self.shader().write_raw(text);
    }

    /// Cast `v` into `to`, failing with Type-mismatch when unreachable.
    pub fn cast(&self, node: &GraphNode, v: &Variable, to: ValueType) -> Result<String, EmitError> {
        cast_expr(&v.name, v.ty, to).ok_or_else(|| {
            EmitError::type_mismatch(
                &node.id,
                format!("cannot convert `{}` from {:?} to {:?}", v.name, v.ty, to),
            )
        })
    }

    /// Emit `f` into a fresh scope and redirected body; returns the captured text.
    ///
    /// `extra_depth` is the block nesting the text will be spliced into.
    pub fn capture<T>(
        &mut self,
        extra_depth: usize,
        f: impl FnOnce(&mut Self) -> Result<T, EmitError>,
    ) -> Result<(String, T), EmitError> {
        let stage = self.stage();
        let shader = self.shader_of(stage);
        shader.push_output_stream(extra_depth);
        shader.push_scope();
        let result = f(self);
        let shader = self.shader_of(stage);
        shader.pop_scope();
        let text = shader.pop_output_stream();
        result.map(|value| (text, value))
    }

    /// Emit every pin in `pins` ahead of a branch so it is evaluated once, outside.
    pub fn hoist(&mut self, pins: &[OutputPin]) -> Result<(), EmitError> {
        for pin in pins {
            self.emit_output(pin)?;
        }
        Ok(())
    }

    /// Annotation line for a control-flow hint, when the backend allows it.
    pub fn control_flow_attribute(&mut self, hint: crate::nodes::BranchHint) {
        if !self.settings.support_control_flow_attributes {
            return;
        }
        match hint {
            crate::nodes::BranchHint::Static => self.write("// @flatten"),
            crate::nodes::BranchHint::Dynamic => self.write("// @branch"),
            crate::nodes::BranchHint::Auto => {}
        }
    }

    // ---- resources ----

    pub fn layout(&self) -> &ResourceLayout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut ResourceLayout {
        &mut self.layout
    }

    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    pub fn requirements_mut(&mut self) -> &mut Requirements {
        &mut self.requirements
    }

    pub fn conflict(node: &GraphNode, c: LayoutConflict) -> EmitError {
        EmitError::ResourceConflict {
            node: node.id.clone(),
            name: c.name,
            detail: c.detail,
        }
    }

    pub fn add_parameter(
        &mut self,
        node: &GraphNode,
        name: &str,
        parameter_type: ParameterType,
        length: u32,
        frequency: UpdateFrequency,
    ) -> Result<(), EmitError> {
        let p = ProgramParameter {
            name: name.to_string(),
            parameter_type,
            length,
            frequency,
        };
        match self.parameters.get(name) {
            Some(existing) if *existing != p => Err(EmitError::ResourceConflict {
                node: node.id.clone(),
                name: name.to_string(),
                detail: format!(
                    "parameter declared as {:?}[{}] ({:?}) and {:?}[{}] ({:?})",
                    existing.parameter_type,
                    existing.length,
                    existing.frequency,
                    parameter_type,
                    length,
                    frequency
                ),
            }),
            Some(_) => Ok(()),
            None => {
                self.parameters.insert(name.to_string(), p);
                Ok(())
            }
        }
    }

    /// Uniform member access path, registering the member in the current stage.
    pub fn uniform(
        &mut self,
        node: &GraphNode,
        frequency: UpdateFrequency,
        name: &str,
        ty: ValueType,
        length: u32,
    ) -> Result<String, EmitError> {
        let stage = self.stage();
        self.layout
            .uniform(frequency, name, ty, length, stage)
            .map_err(|c| Self::conflict(node, c))
    }

    /// Register a texture declared by a Uniform node under the active binding model.
    pub fn declare_texture(&mut self, node: &GraphNode, name: &str, ty: ValueType) -> Result<(), EmitError> {
        let stage = self.stage();
        if self.settings.bindless() {
            self.layout
                .uniform(UpdateFrequency::Draw, name, ValueType::Integer, 0, stage)
                .map(|_| ())
                .map_err(|c| Self::conflict(node, c))
        } else {
            self.layout
                .texture(name, ty, stage)
                .map_err(|c| Self::conflict(node, c))
        }
    }

    /// Expression reaching a texture variable in the current stage.
    pub fn texture_access(&mut self, node: &GraphNode, texture: &Variable, compared: bool) -> Result<String, EmitError> {
        if !texture.ty.is_texture() {
            return Err(EmitError::type_mismatch(
                &node.id,
                format!("expected a texture, got {:?}", texture.ty),
            ));
        }
        let stage = self.stage();
        if self.settings.bindless() {
            if compared && texture.ty == ValueType::Texture3D {
                return Err(EmitError::type_mismatch(&node.id, "3D textures cannot be compare-sampled"));
            }
            let index = self
                .layout
                .uniform(UpdateFrequency::Draw, &texture.name, ValueType::Integer, 0, stage)
                .map_err(|c| Self::conflict(node, c))?;
            let array = self.layout.texture_array(texture.ty, compared, stage);
            Ok(format!("{array}[{index}]"))
        } else {
            self.layout
                .texture(&texture.name, texture.ty, stage)
                .map_err(|c| Self::conflict(node, c))?;
            Ok(texture.name.clone())
        }
    }

    /// Record how a directly bound texture is sampled. No-op for bindless arrays,
    /// whose element type already follows the compare mode.
    pub fn mark_sampled(&mut self, node: &GraphNode, texture: &Variable, compared: bool) -> Result<(), EmitError> {
        if self.settings.bindless() {
            return Ok(());
        }
        self.layout
            .mark_texture_sampling(&texture.name, compared)
            .map_err(|c| Self::conflict(node, c))
    }

    /// Texture access for consumers that do not sample (size queries, scripts).
    pub fn texture_plain_access(&mut self, node: &GraphNode, texture: &Variable) -> Result<String, EmitError> {
        self.texture_access(node, texture, false)
    }

    pub fn declare_image(&mut self, node: &GraphNode, name: &str, ty: ValueType) -> Result<(), EmitError> {
        let stage = self.stage();
        if self.settings.bindless() {
            self.layout
                .uniform(UpdateFrequency::Draw, name, ValueType::Integer, 0, stage)
                .map(|_| ())
                .map_err(|c| Self::conflict(node, c))
        } else {
            self.layout.image(name, ty, stage).map_err(|c| Self::conflict(node, c))
        }
    }

    pub fn image_access(&mut self, node: &GraphNode, image: &Variable) -> Result<String, EmitError> {
        if !image.ty.is_image() {
            return Err(EmitError::type_mismatch(
                &node.id,
                format!("expected an image, got {:?}", image.ty),
            ));
        }
        let stage = self.stage();
        if self.settings.bindless() {
            let index = self
                .layout
                .uniform(UpdateFrequency::Draw, &image.name, ValueType::Integer, 0, stage)
                .map_err(|c| Self::conflict(node, c))?;
            let array = self.layout.image_array(image.ty, stage);
            Ok(format!("{array}[{index}]"))
        } else {
            self.layout
                .image(&image.name, image.ty, stage)
                .map_err(|c| Self::conflict(node, c))?;
            Ok(image.name.clone())
        }
    }

    pub fn sampler(&mut self, state: &SamplerState) -> String {
        let stage = self.stage();
        self.layout.sampler(state, stage)
    }

    pub fn storage_buffer(&mut self, node: &GraphNode, name: &str, elements: &[StructElement]) -> Result<(), EmitError> {
        let stage = self.stage();
        self.layout
            .storage_buffer(name, elements, stage)
            .map_err(|c| Self::conflict(node, c))
    }

    // ---- diagnostics & results ----

    pub fn push_error(&mut self, stage: Stage, err: &EmitError) {
        self.diagnostics.push(Diagnostic::from_error(stage, err));
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn stage_failed(&self, stage: Stage) -> bool {
        self.diagnostics.iter().any(|d| d.stage == stage)
    }

    pub fn into_parts(self) -> ContextParts {
        ContextParts {
            vertex: self.vertex,
            fragment: self.fragment,
            compute: self.compute,
            layout: self.layout,
            requirements: self.requirements,
            parameters: self.parameters.into_values().collect(),
            diagnostics: self.diagnostics,
        }
    }
}

/// Owned results of a run, used by the driver to assemble stage text.
pub struct ContextParts {
    pub vertex: Shader,
    pub fragment: Shader,
    pub compute: Shader,
    pub layout: ResourceLayout,
    pub requirements: Requirements,
    pub parameters: Vec<ProgramParameter>,
    pub diagnostics: Vec<Diagnostic>,
}
