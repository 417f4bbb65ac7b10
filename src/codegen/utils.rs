//! Formatting helpers shared by the stage accumulator and node emitters.

/// Format a float as a WGSL literal, removing trailing zeros but keeping a fraction.
pub fn fmt_f32(v: f32) -> String {
    if v.is_finite() {
        let s = format!("{v:.9}");
        let s = s.trim_end_matches('0');
        if s.ends_with('.') {
            format!("{s}0")
        } else {
            s.to_string()
        }
    } else {
        "0.0".to_string()
    }
}

/// Sanitize a string to be a valid WGSL identifier.
pub fn sanitize_wgsl_ident(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    // Identifiers starting with two underscores are reserved.
    while out.starts_with("__") {
        out.remove(0);
    }
    out
}

/// Identifiers the generator declares itself: entry points and their I/O,
/// uniform buffers, samplers, bindless arrays, helper struct types and temporaries.
pub fn is_generated_identifier(name: &str) -> bool {
    const FIXED: [&str; 14] = [
        "main",
        "input",
        "output",
        "UbOnce",
        "UbFrame",
        "UbDraw",
        "PushConstants",
        "push_constants",
        "VertexInput",
        "VertexOutput",
        "FragmentInput",
        "FragmentOutput",
        "ComputeInput",
        "ComputeOutput",
    ];
    let numbered = |prefix: &str| {
        name.strip_prefix(prefix)
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    };
    FIXED.contains(&name)
        || numbered("samp_")
        || numbered("v")
        || name.starts_with("bindless_")
        || name.ends_with("_Type")
}

/// True when `v` has no fractional part and fits an i32.
pub fn is_integral(v: f32) -> bool {
    v.is_finite() && v.fract() == 0.0 && v.abs() < i32::MAX as f32
}

pub fn srgb_to_linear_channel(x: f32) -> f32 {
    // https://en.wikipedia.org/wiki/SRGB
    if x <= 0.040_45 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

pub fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_f32_keeps_fraction() {
        assert_eq!(fmt_f32(1.0), "1.0");
        assert_eq!(fmt_f32(0.5), "0.5");
        assert_eq!(fmt_f32(-2.0), "-2.0");
        assert_eq!(fmt_f32(f32::NAN), "0.0");
    }

    #[test]
    fn sanitize_handles_reserved_prefixes() {
        assert_eq!(sanitize_wgsl_ident("my-param"), "my_param");
        assert_eq!(sanitize_wgsl_ident("3d"), "_3d");
        assert_eq!(sanitize_wgsl_ident("__x"), "_x");
    }

    #[test]
    fn generated_identifiers_are_recognized() {
        for name in ["samp_0", "samp_12", "UbDraw", "bindless_textures_2d", "world_Type", "v3", "main"] {
            assert!(is_generated_identifier(name), "{name}");
        }
        for name in ["samp_", "sampler_0", "velocity", "v", "albedo", "UbDrawExtra"] {
            assert!(!is_generated_identifier(name), "{name}");
        }
    }

    #[test]
    fn srgb_endpoints() {
        assert_eq!(srgb_to_linear_channel(0.0), 0.0);
        assert!((srgb_to_linear_channel(1.0) - 1.0).abs() < 1e-6);
    }
}
