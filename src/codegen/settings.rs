//! Generator configuration: named options recognized by node routines and the
//! backend policy (binding model, extensions, output dialect).

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum BindingModel {
    /// One binding per texture/image.
    Direct,
    /// Textures/images live in shared `binding_array`s indexed by an `i32` uniform.
    #[default]
    Bindless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Wgsl,
    Msl,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct GeneratorSettings {
    pub support_control_flow_attributes: bool,
    pub support_ballot_read_first_invocation: bool,
    pub ignore_precision_hint: bool,
    /// Empty keeps the native WGSL output.
    pub cross_compile_dialect: String,
    pub binding_model: BindingModel,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            support_control_flow_attributes: false,
            support_ballot_read_first_invocation: false,
            ignore_precision_hint: false,
            cross_compile_dialect: String::new(),
            binding_model: BindingModel::Bindless,
        }
    }
}

impl GeneratorSettings {
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings json at {}", path.display()))?;
        let settings: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse settings json at {}", path.display()))?;
        settings.dialect()?;
        Ok(settings)
    }

    /// Apply a `Key=Value` override, as given on the command line.
    pub fn apply_override(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("expected Key=Value, got `{assignment}`"))?;
        let (key, value) = (key.trim(), value.trim());
        let flag = || -> Result<bool> {
            value
                .parse::<bool>()
                .with_context(|| format!("{key} expects true or false, got `{value}`"))
        };
        match key {
            "SupportControlFlowAttributes" => self.support_control_flow_attributes = flag()?,
            "SupportBallotReadFirstInvocation" => self.support_ballot_read_first_invocation = flag()?,
            "IgnorePrecisionHint" => self.ignore_precision_hint = flag()?,
            "CrossCompileDialect" => self.cross_compile_dialect = value.to_string(),
            "BindingModel" => {
                self.binding_model = match value {
                    "Direct" => BindingModel::Direct,
                    "Bindless" => BindingModel::Bindless,
                    other => bail!("unknown binding model `{other}` (expected Direct or Bindless)"),
                }
            }
            other => bail!("unknown setting `{other}`"),
        }
        self.dialect()?;
        Ok(())
    }

    pub fn dialect(&self) -> Result<Dialect> {
        match self.cross_compile_dialect.to_ascii_lowercase().as_str() {
            "" | "wgsl" => Ok(Dialect::Wgsl),
            "msl" | "metal" => Ok(Dialect::Msl),
            other => bail!("unsupported cross-compile dialect `{other}` (expected msl)"),
        }
    }

    pub fn bindless(&self) -> bool {
        self.binding_model == BindingModel::Bindless
    }
}
