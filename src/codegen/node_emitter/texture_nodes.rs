//! Emitters for texture access nodes (Sampler, TextureSize, TextureState).

use crate::codegen::context::Context;
use crate::codegen::error::EmitError;
use crate::codegen::types::ValueType;
use crate::codegen::utils::fmt_f32;
use crate::graph::GraphNode;
use crate::nodes::{Address, Filter, NodeKind, SamplerParams, SamplerState, TextureStateParams};

/// Sampler state of `node`, taken from a TextureState node on `State` when connected.
fn sampler_state(cx: &Context<'_>, node: &GraphNode, params: &SamplerParams) -> Result<SamplerState, EmitError> {
    let graph = cx.graph();
    let Some(source) = graph.source(node.index, "State") else {
        return Ok(params.sampler_state);
    };
    match &graph.node(source.node).kind {
        NodeKind::TextureState(p) => Ok(p.sampler_state),
        _ => Err(EmitError::type_mismatch(
            &node.id,
            "`State` must come from a TextureState node",
        )),
    }
}

/// Sample `Texture` at `TexCoord`.
///
/// Identical sampler states share one sampler binding. Comparison states sample a
/// depth texture with the reference value taken from the component after the
/// coordinates. Implicit-LOD sampling is only used in the fragment stage; other
/// stages, `ignoreMips` and a connected `Mip` sample an explicit level.
///
/// # Inputs
/// - `Texture`: 2D, 3D or cube texture
/// - `TexCoord`: coordinates (plus reference value when comparing)
/// - `Mip` (optional): explicit level of detail
///
/// # Output
/// - `Output`: `vec4f`, or `f32` for comparison sampling
///
/// # Example
/// ```wgsl
/// let v1: vec4f = textureSample(albedo, samp_0, v0.xy);
/// ```
pub fn emit_sampler(cx: &mut Context<'_>, node: &GraphNode, params: &SamplerParams) -> Result<(), EmitError> {
    let texture = cx.emit_input(node, "Texture")?;
    if !texture.ty.is_texture() {
        return Err(EmitError::type_mismatch(
            &node.id,
            format!("`Texture` must be a texture, got {:?}", texture.ty),
        ));
    }
    let coord = cx.emit_numeric_input(node, "TexCoord")?;
    let mip = cx.emit_optional_input(node, "Mip")?;

    let mut state = sampler_state(cx, node, params)?;
    if state.ignore_mips {
        state.mip_filter = Filter::Point;
    }
    if texture.ty == ValueType::Texture2D {
        state.address_w = Address::Wrap;
    }
    let compared = state.is_comparison();
    if compared && texture.ty == ValueType::Texture3D {
        return Err(EmitError::type_mismatch(&node.id, "3D textures cannot be compare-sampled"));
    }

    let access = cx.texture_access(node, &texture, compared)?;
    cx.mark_sampled(node, &texture, compared)?;
    let sampler = cx.sampler(&state);

    let coord_ty = if texture.ty == ValueType::Texture2D {
        ValueType::Float2
    } else {
        ValueType::Float3
    };
    let explicit_lod = mip.is_some() || state.ignore_mips || !cx.in_fragment();

    if compared {
        let width = coord_ty.width() as usize;
        let full = ValueType::float(coord_ty.width() + 1);
        let c = cx.cast(node, &coord, full)?;
        let c = if c == coord.name {
            c
        } else {
            cx.assign(node, "__coord", full, c)?.name
        };
        let function = if explicit_lod {
            "textureSampleCompareLevel"
        } else {
            "textureSampleCompare"
        };
        cx.assign(
            node,
            "Output",
            ValueType::Float,
            format!(
                "{function}({access}, {sampler}, {c}.{}, {c}.{})",
                &"xyzw"[..width],
                &"xyzw"[width..=width]
            ),
        )?;
        return Ok(());
    }

    let c = cx.cast(node, &coord, coord_ty)?;
    let expr = if explicit_lod {
        let lod = match &mip {
            Some(m) if m.ty.is_numeric() => cx.cast(node, m, ValueType::Float)?,
            Some(m) => {
                return Err(EmitError::type_mismatch(
                    &node.id,
                    format!("`Mip` must be numeric, got {:?}", m.ty),
                ));
            }
            None => "0.0".to_string(),
        };
        format!("textureSampleLevel({access}, {sampler}, {c}, {lod})")
    } else if state.mip_bias.abs() > SamplerState::MIP_BIAS_EPSILON {
        format!(
            "textureSampleBias({access}, {sampler}, {c}, {})",
            fmt_f32(state.mip_bias)
        )
    } else {
        format!("textureSample({access}, {sampler}, {c})")
    };
    cx.assign(node, "Output", ValueType::Float4, expr)?;
    Ok(())
}

/// Size of mip level zero in texels: `vec2f` for 2D and cube textures, `vec3f` for 3D.
pub fn emit_texture_size(cx: &mut Context<'_>, node: &GraphNode) -> Result<(), EmitError> {
    let texture = cx.emit_input(node, "Input")?;
    let access = cx.texture_plain_access(node, &texture)?;
    let ty = if texture.ty == ValueType::Texture3D {
        ValueType::Float3
    } else {
        ValueType::Float2
    };
    cx.assign(node, "Output", ty, format!("{}(textureDimensions({access}))", ty.wgsl()))?;
    Ok(())
}

/// Register a sampler for use by scripts; `Output` names the sampler.
pub fn emit_texture_state(cx: &mut Context<'_>, node: &GraphNode, params: &TextureStateParams) -> Result<(), EmitError> {
    let sampler = cx.sampler(&params.sampler_state);
    cx.shader()
        .create_variable(Some(node.output("Output")), sampler, ValueType::Void);
    Ok(())
}
