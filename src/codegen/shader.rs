//! Stage accumulator: per-stage text buffers, variable table and temporary names.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::graph::OutputPin;

use super::types::{Stage, ValueType, Variable};
use super::utils::indent;

#[derive(Debug, Clone, Default)]
struct ScopeFrame {
    variable_mark: usize,
    temporaries: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct Shader {
    stage: Stage,
    inputs: Vec<String>,
    outputs: Vec<String>,
    declared: HashSet<String>,
    // Body redirect stack; the first entry is the entry-point body.
    bodies: Vec<String>,
    depths: Vec<usize>,
    variables: Vec<Variable>,
    outer: HashMap<OutputPin, Variable>,
    scopes: Vec<ScopeFrame>,
    temporaries: BTreeSet<u32>,
    // Module id -> first node that included it.
    modules: BTreeMap<String, String>,
    header: Vec<String>,
    uses_target_size: bool,
    touched: bool,
}

impl Shader {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            inputs: Vec::new(),
            outputs: Vec::new(),
            declared: HashSet::new(),
            bodies: vec![String::new()],
            depths: vec![1],
            variables: Vec::new(),
            outer: HashMap::new(),
            scopes: vec![ScopeFrame::default()],
            temporaries: BTreeSet::new(),
            modules: BTreeMap::new(),
            header: Vec::new(),
            uses_target_size: false,
            touched: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// True once anything has been written to or declared in this stage.
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    // ---- text buffers ----

    /// Append one statement line to the current body buffer.
    pub fn write(&mut self, line: impl AsRef<str>) {
        self.touched = true;
        let depth = self.depth();
        let body = self.current_body();
        body.push_str(&indent(depth));
        body.push_str(line.as_ref());
        body.push('\n');
    }

    /// Append already-indented text, typically a captured branch.
    pub fn write_raw(&mut self, text: &str) {
        self.touched = true;
        self.current_body().push_str(text);
    }

    pub fn depth(&self) -> usize {
        self.depths.last().copied().unwrap_or(1)
    }

    fn current_body(&mut self) -> &mut String {
        if self.bodies.is_empty() {
            self.bodies.push(String::new());
        }
        let last = self.bodies.len() - 1;
        &mut self.bodies[last]
    }

    /// Redirect body writes into a fresh buffer, `extra_depth` levels deeper.
    pub fn push_output_stream(&mut self, extra_depth: usize) {
        let depth = self.depth() + extra_depth;
        self.bodies.push(String::new());
        self.depths.push(depth);
    }

    /// End the innermost redirect and return what was written into it.
    pub fn pop_output_stream(&mut self) -> String {
        debug_assert!(self.bodies.len() > 1, "pop_output_stream without push");
        if self.bodies.len() <= 1 {
            return String::new();
        }
        self.depths.pop();
        self.bodies.pop().unwrap_or_default()
    }

    /// Declare an entry-point input member once per `key`. Returns true when added.
    pub fn declare_input(&mut self, key: &str, member: impl Into<String>) -> bool {
        self.touched = true;
        if !self.declared.insert(format!("in:{key}")) {
            return false;
        }
        self.inputs.push(member.into());
        true
    }

    pub fn declare_output(&mut self, key: &str, member: impl Into<String>) -> bool {
        self.touched = true;
        if !self.declared.insert(format!("out:{key}")) {
            return false;
        }
        self.outputs.push(member.into());
        true
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn add_module(&mut self, id: &str, node: &str) {
        self.touched = true;
        self.modules
            .entry(id.to_string())
            .or_insert_with(|| node.to_string());
    }

    /// Included module ids with the node that requested each, sorted by id.
    pub fn modules(&self) -> impl Iterator<Item = (&str, &str)> {
        self.modules.iter().map(|(id, node)| (id.as_str(), node.as_str()))
    }

    pub fn add_header(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !self.header.contains(&line) {
            self.header.push(line);
        }
    }

    pub fn set_uses_target_size(&mut self) {
        self.uses_target_size = true;
    }

    pub fn uses_target_size(&self) -> bool {
        self.uses_target_size
    }

    // ---- scopes & variables ----

    pub fn push_scope(&mut self) {
        self.scopes.push(ScopeFrame {
            variable_mark: self.variables.len(),
            temporaries: Vec::new(),
        });
    }

    /// Drop every variable created since the matching push and release its temporaries.
    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "pop_scope without push_scope");
        if self.scopes.len() <= 1 {
            return;
        }
        if let Some(frame) = self.scopes.pop() {
            self.variables.truncate(frame.variable_mark);
            for t in frame.temporaries {
                self.temporaries.remove(&t);
            }
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Innermost binding of `pin`, falling back to values produced in another stage.
    pub fn find_variable(&self, pin: &OutputPin) -> Option<&Variable> {
        self.variables
            .iter()
            .rev()
            .find(|v| v.pin.as_ref() == Some(pin))
            .or_else(|| self.outer.get(pin))
    }

    pub fn create_variable(&mut self, pin: Option<OutputPin>, name: impl Into<String>, ty: ValueType) -> Variable {
        let v = Variable::new(pin, name, ty);
        self.variables.push(v.clone());
        v
    }

    /// Bind `pin` to the lowest free `v{N}` name of the current scope chain.
    pub fn create_temporary(&mut self, pin: Option<OutputPin>, ty: ValueType) -> Variable {
        let index = (0u32..)
            .find(|i| !self.temporaries.contains(i))
            .unwrap_or_default();
        self.temporaries.insert(index);
        if let Some(frame) = self.scopes.last_mut() {
            frame.temporaries.push(index);
        }
        self.create_variable(pin, format!("v{index}"), ty)
    }

    pub fn create_outer_variable(&mut self, pin: OutputPin, name: impl Into<String>, ty: ValueType) -> Variable {
        let v = Variable::new(Some(pin.clone()), name, ty);
        self.outer.insert(pin, v.clone());
        v
    }

    /// Change the type of the innermost variable bound to `pin`.
    pub fn retype(&mut self, pin: &OutputPin, ty: ValueType) -> Option<Variable> {
        let v = self
            .variables
            .iter_mut()
            .rev()
            .find(|v| v.pin.as_ref() == Some(pin))?;
        v.ty = ty;
        Some(v.clone())
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    // ---- assembly ----

    fn struct_name(&self, output: bool) -> &'static str {
        match (self.stage, output) {
            (Stage::Vertex, false) => "VertexInput",
            (Stage::Vertex, true) => "VertexOutput",
            (Stage::Fragment, false) => "FragmentInput",
            (Stage::Fragment, true) => "FragmentOutput",
            (Stage::Compute, false) => "ComputeInput",
            (Stage::Compute, true) => "ComputeOutput",
        }
    }

    /// Concatenate the stage program: header, push constants, resources, modules,
    /// entry-point structs, entry point.
    pub fn assemble(&self, resources: &str, modules: &[(String, String)], local_size: [u32; 3]) -> String {
        debug_assert_eq!(self.bodies.len(), 1, "unbalanced output stream redirects");
        debug_assert_eq!(self.scopes.len(), 1, "unbalanced scopes");

        let mut out = String::new();
        for line in &self.header {
            out.push_str(line);
            out.push('\n');
        }
        if !self.header.is_empty() {
            out.push('\n');
        }

        if self.uses_target_size {
            out.push_str("struct PushConstants {\n    target_size: vec4f,\n}\n");
            out.push_str("var<push_constant> push_constants: PushConstants;\n\n");
        }

        if !resources.is_empty() {
            out.push_str(resources);
            out.push('\n');
        }

        for (id, text) in modules {
            out.push_str(&format!("// module {id}\n"));
            out.push_str(text.trim_end());
            out.push_str("\n\n");
        }

        let has_outputs = !self.outputs.is_empty() && self.stage != Stage::Compute;
        for (members, output) in [(&self.inputs, false), (&self.outputs, true)] {
            if members.is_empty() || (output && !has_outputs) {
                continue;
            }
            out.push_str(&format!("struct {} {{\n", self.struct_name(output)));
            for m in members.iter() {
                out.push_str("    ");
                out.push_str(m);
                out.push('\n');
            }
            out.push_str("}\n\n");
        }

        match self.stage {
            Stage::Vertex => out.push_str("@vertex\n"),
            Stage::Fragment => out.push_str("@fragment\n"),
            Stage::Compute => out.push_str(&format!(
                "@compute @workgroup_size({}, {}, {})\n",
                local_size[0], local_size[1], local_size[2]
            )),
        }
        let params = if self.inputs.is_empty() {
            String::new()
        } else {
            format!("input: {}", self.struct_name(false))
        };
        if has_outputs {
            out.push_str(&format!(
                "fn main({params}) -> {} {{\n    var output: {};\n",
                self.struct_name(true),
                self.struct_name(true)
            ));
        } else {
            out.push_str(&format!("fn main({params}) {{\n"));
        }
        out.push_str(&self.bodies[0]);
        if has_outputs {
            out.push_str("    return output;\n");
        }
        out.push_str("}\n");
        out
    }
}
