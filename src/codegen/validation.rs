//! WGSL validation and cross-compilation using the naga library.

use anyhow::{Context, Result, anyhow};

/// Parse WGSL source code with naga's front end.
///
/// # Returns
/// The parsed naga Module on success, or an error listing the numbered source on failure.
///
/// # Example
/// ```ignore
/// let wgsl = "@fragment fn main() -> @location(0) vec4f { return vec4f(1.0); }";
/// match validate_wgsl(wgsl) {
///     Ok(module) => println!("Valid WGSL"),
///     Err(e) => eprintln!("Invalid WGSL: {}", e),
/// }
/// ```
pub fn validate_wgsl(source: &str) -> Result<naga::Module> {
    naga::front::wgsl::parse_str(source).map_err(|e| {
        anyhow!(
            "WGSL validation failed:\n{}",
            format_naga_error(source, &e.emit_to_string(source))
        )
    })
}

/// Validate WGSL and provide context about which stage/graph generated it.
///
/// # Arguments
/// * `source` - The WGSL source code to validate
/// * `context` - Description of what generated this WGSL (e.g., "fragment stage of graph foo")
pub fn validate_wgsl_with_context(source: &str, context: &str) -> Result<naga::Module> {
    validate_module(source)
        .map(|(module, _)| module)
        .with_context(|| format!("{} generated invalid WGSL", context))
}

/// Parse and run naga's validator (types, uniformity, bindings) over `source`.
pub fn validate_module(source: &str) -> Result<(naga::Module, naga::valid::ModuleInfo)> {
    let module = validate_wgsl(source)?;
    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| {
        anyhow!(
            "WGSL validation failed:\n{}",
            format_naga_error(source, &e.emit_to_string(source))
        )
    })?;
    Ok((module, info))
}

/// Translate one generated WGSL stage into Metal Shading Language.
pub fn cross_compile_msl(source: &str) -> Result<String> {
    let (module, info) = validate_module(source)?;
    let options = naga::back::msl::Options {
        lang_version: (2, 1),
        ..Default::default()
    };
    let pipeline = naga::back::msl::PipelineOptions::default();
    let (text, _) = naga::back::msl::write_string(&module, &info, &options, &pipeline)
        .map_err(|e| anyhow!("MSL writer failed: {e}"))?;
    Ok(text)
}

/// Format a naga error message followed by the numbered source it refers to.
fn format_naga_error(source: &str, message: &str) -> String {
    let mut output = String::new();
    output.push_str(&format!("  {}\n", message.trim_end()));

    output.push_str("\nGenerated WGSL:\n");
    output.push_str("---\n");
    for (line_num, line) in source.lines().enumerate() {
        output.push_str(&format!("{:4} | {}\n", line_num + 1, line));
    }
    output.push_str("---\n");

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = r#"
struct FragmentOutput {
    @location(0) color0: vec4f,
}

@fragment
fn main() -> FragmentOutput {
    var output: FragmentOutput;
    let v0: f32 = 0.5;
    output.color0 = vec4f(v0);
    return output;
}
"#;

    #[test]
    fn test_valid_wgsl() {
        assert!(validate_module(FRAGMENT).is_ok());
    }

    #[test]
    fn test_invalid_wgsl_syntax() {
        let source = "fn invalid() -> { return vec4f(1.0); }"; // Missing type
        assert!(validate_wgsl(source).is_err());
    }

    #[test]
    fn test_invalid_wgsl_type_error() {
        let source = r#"
@fragment
fn main() -> @location(0) vec4f {
    let x: vec4f = 1.0;
    return x;
}
"#;
        let err = format!("{:#}", validate_wgsl(source).unwrap_err());
        assert!(err.contains("   4 |     let x: vec4f = 1.0;"), "{err}");
    }

    #[test]
    fn test_validate_with_context() {
        let result = validate_wgsl_with_context("invalid wgsl", "fragment stage");
        assert!(result.is_err());
        let err_msg = format!("{:#}", result.unwrap_err());
        assert!(err_msg.contains("fragment stage"));
    }

    #[test]
    fn msl_output_has_fragment_entry() {
        let msl = cross_compile_msl(FRAGMENT).unwrap();
        assert!(msl.contains("fragment"), "{msl}");
        assert!(msl.contains("#include <metal_stdlib>"), "{msl}");
    }
}
