//! Node-graph shader generator: turns node-editor shader graphs into WGSL stage
//! programs and the resource layout they bind against.

pub mod codegen;
pub mod dsl;
pub mod graph;
pub mod nodes;

pub use codegen::settings::{BindingModel, GeneratorSettings};
pub use codegen::{DirectoryModules, GeneratedProgram, ModuleResolver, NoModules, StageProgram, generate_program};
