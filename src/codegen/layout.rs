//! Resource layout: uniform buffers, textures, samplers, images and storage
//! buffers referenced by the generated stages.
//!
//! Resources are registered while nodes are emitted; bindings are assigned once in
//! [`ResourceLayout::finalize`], after every stage has been generated, so a resource
//! shared by several stages receives one binding valid in all of them.

use serde::{Serialize, Serializer};

use crate::nodes::{SamplerState, StructElement, UpdateFrequency};

use super::types::{Stage, ValueType};

/// Group holding directly bound resources.
pub const DEFAULT_GROUP: u32 = 0;
/// Group holding the shared bindless arrays.
pub const BINDLESS_GROUP: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct StageMask(u8);

impl StageMask {
    pub const EMPTY: StageMask = StageMask(0);

    pub fn of(stage: Stage) -> Self {
        StageMask(match stage {
            Stage::Vertex => 1,
            Stage::Fragment => 2,
            Stage::Compute => 4,
        })
    }

    pub fn contains(self, stage: Stage) -> bool {
        self.0 & StageMask::of(stage).0 != 0
    }

    pub fn insert(&mut self, stage: Stage) {
        self.0 |= StageMask::of(stage).0;
    }

    pub fn union(self, other: StageMask) -> StageMask {
        StageMask(self.0 | other.0)
    }

    pub fn stages(self) -> Vec<Stage> {
        Stage::ALL.into_iter().filter(|s| self.contains(*s)).collect()
    }
}

impl Serialize for StageMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.stages().into_iter().map(Stage::name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniformMember {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    /// Element count for arrays, zero for plain members.
    pub length: u32,
    pub offset: u32,
    pub size: u32,
}

impl UniformMember {
    /// WGSL type of the member; arrays use 16-byte element strides.
    pub fn wgsl_type(&self) -> String {
        if self.length == 0 {
            self.ty.wgsl().to_string()
        } else {
            format!("array<{}, {}>", array_element(self.ty).wgsl(), self.length)
        }
    }
}

fn array_element(ty: ValueType) -> ValueType {
    if ty == ValueType::Float4x4 {
        ValueType::Float4x4
    } else if ty.is_integer() {
        ValueType::Integer4
    } else {
        ValueType::Float4
    }
}

/// (alignment, size) of a value in the uniform/storage address spaces.
pub fn align_size(ty: ValueType) -> (u32, u32) {
    match ty.width() {
        1 => (4, 4),
        2 => (8, 8),
        3 => (16, 12),
        4 => (16, 16),
        16 => (16, 64),
        _ => (4, 4),
    }
}

fn round_up(align: u32, v: u32) -> u32 {
    v.div_ceil(align) * align
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ResourcePayload {
    UniformBuffer {
        frequency: UpdateFrequency,
        members: Vec<UniformMember>,
        size: u32,
    },
    Texture {
        #[serde(rename = "type")]
        ty: ValueType,
        sampled: bool,
        compared: bool,
    },
    TextureArray {
        #[serde(rename = "type")]
        ty: ValueType,
        depth: bool,
    },
    Sampler {
        state: SamplerState,
    },
    Image {
        #[serde(rename = "type")]
        ty: ValueType,
    },
    ImageArray {
        #[serde(rename = "type")]
        ty: ValueType,
    },
    StorageBuffer {
        elements: Vec<StructElement>,
        stride: u32,
    },
}

impl ResourcePayload {
    fn kind_name(&self) -> &'static str {
        match self {
            ResourcePayload::UniformBuffer { .. } => "uniform buffer",
            ResourcePayload::Texture { .. } => "texture",
            ResourcePayload::TextureArray { .. } => "texture array",
            ResourcePayload::Sampler { .. } => "sampler",
            ResourcePayload::Image { .. } => "image",
            ResourcePayload::ImageArray { .. } => "image array",
            ResourcePayload::StorageBuffer { .. } => "storage buffer",
        }
    }

    /// Position in the binding order of its group.
    fn binding_rank(&self) -> u32 {
        match self {
            ResourcePayload::UniformBuffer { frequency, .. } => match frequency {
                UpdateFrequency::Once => 0,
                UpdateFrequency::Frame => 1,
                UpdateFrequency::Draw => 2,
            },
            ResourcePayload::Texture { .. } | ResourcePayload::TextureArray { .. } => 3,
            ResourcePayload::Sampler { .. } => 4,
            ResourcePayload::Image { .. } | ResourcePayload::ImageArray { .. } => 5,
            ResourcePayload::StorageBuffer { .. } => 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub name: String,
    pub stages: StageMask,
    pub group: u32,
    pub binding: Option<u32>,
    #[serde(flatten)]
    pub payload: ResourcePayload,
}

/// Two declarations of one name disagree in kind or shape.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConflict {
    pub name: String,
    pub detail: String,
}

impl LayoutConflict {
    fn new(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            detail: detail.into(),
        }
    }
}

pub fn uniform_buffer_name(frequency: UpdateFrequency) -> &'static str {
    match frequency {
        UpdateFrequency::Once => "UbOnce",
        UpdateFrequency::Frame => "UbFrame",
        UpdateFrequency::Draw => "UbDraw",
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceLayout {
    resources: Vec<Resource>,
    finalized: bool,
}

impl ResourceLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn find(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.name == name)
    }

    fn push(&mut self, name: &str, group: u32, stage: Stage, payload: ResourcePayload) -> usize {
        debug_assert!(!self.finalized, "resource registered after finalize");
        self.resources.push(Resource {
            name: name.to_string(),
            stages: StageMask::of(stage),
            group,
            binding: None,
            payload,
        });
        self.resources.len() - 1
    }

    /// Append a member to the frequency's uniform buffer, returning its access path.
    pub fn uniform(
        &mut self,
        frequency: UpdateFrequency,
        name: &str,
        ty: ValueType,
        length: u32,
        stage: Stage,
    ) -> Result<String, LayoutConflict> {
        let buffer = uniform_buffer_name(frequency);

        // One parameter name lives in exactly one buffer.
        for r in &self.resources {
            if let ResourcePayload::UniformBuffer {
                frequency: f,
                members,
                ..
            } = &r.payload
                && let Some(m) = members.iter().find(|m| m.name == name)
            {
                if *f != frequency || m.ty != ty || m.length != length {
                    return Err(LayoutConflict::new(
                        name,
                        format!(
                            "declared as {:?}[{}] in {} and as {:?}[{}] in {}",
                            m.ty,
                            m.length,
                            r.name,
                            ty,
                            length,
                            buffer
                        ),
                    ));
                }
            }
        }

        let index = match self.position(buffer) {
            Some(i) => i,
            None => self.push(
                buffer,
                DEFAULT_GROUP,
                stage,
                ResourcePayload::UniformBuffer {
                    frequency,
                    members: Vec::new(),
                    size: 0,
                },
            ),
        };
        let resource = &mut self.resources[index];
        resource.stages.insert(stage);
        if let ResourcePayload::UniformBuffer { members, size, .. } = &mut resource.payload
            && !members.iter().any(|m| m.name == name)
        {
            let (align, member_size) = if length == 0 {
                align_size(ty)
            } else {
                let (_, element) = align_size(array_element(ty));
                (16, element * length)
            };
            let end = members.last().map(|m| m.offset + m.size).unwrap_or(0);
            let offset = round_up(align, end);
            members.push(UniformMember {
                name: name.to_string(),
                ty,
                length,
                offset,
                size: member_size,
            });
            *size = round_up(16, offset + member_size);
        }
        Ok(format!("{buffer}.{name}"))
    }

    /// Directly bound texture.
    pub fn texture(&mut self, name: &str, ty: ValueType, stage: Stage) -> Result<(), LayoutConflict> {
        match self.position(name) {
            Some(i) => {
                let r = &mut self.resources[i];
                match &r.payload {
                    ResourcePayload::Texture { ty: existing, .. } if *existing == ty => {
                        r.stages.insert(stage);
                        Ok(())
                    }
                    ResourcePayload::Texture { ty: existing, .. } => Err(LayoutConflict::new(
                        name,
                        format!("texture declared as both {existing:?} and {ty:?}"),
                    )),
                    other => Err(LayoutConflict::new(
                        name,
                        format!("already declared as {}", other.kind_name()),
                    )),
                }
            }
            None => {
                self.push(
                    name,
                    DEFAULT_GROUP,
                    stage,
                    ResourcePayload::Texture {
                        ty,
                        sampled: false,
                        compared: false,
                    },
                );
                Ok(())
            }
        }
    }

    /// Record how a direct texture is sampled; a texture is either a color or a depth texture.
    pub fn mark_texture_sampling(&mut self, name: &str, compared: bool) -> Result<(), LayoutConflict> {
        let Some(i) = self.position(name) else {
            return Err(LayoutConflict::new(name, "sampled texture was never declared"));
        };
        match &mut self.resources[i].payload {
            ResourcePayload::Texture {
                ty,
                sampled,
                compared: c,
            } => {
                if compared && *ty == ValueType::Texture3D {
                    return Err(LayoutConflict::new(name, "3D textures cannot be compare-sampled"));
                }
                if (compared && *sampled) || (!compared && *c) {
                    return Err(LayoutConflict::new(
                        name,
                        "texture is sampled both with and without a compare function",
                    ));
                }
                if compared {
                    *c = true;
                } else {
                    *sampled = true;
                }
                Ok(())
            }
            other => Err(LayoutConflict::new(
                name,
                format!("expected a texture, found {}", other.kind_name()),
            )),
        }
    }

    /// Shared bindless array for one texture dimensionality.
    pub fn texture_array(&mut self, ty: ValueType, depth: bool, stage: Stage) -> String {
        let suffix = dimension_suffix(ty);
        let name = if depth {
            format!("bindless_depth_textures_{suffix}")
        } else {
            format!("bindless_textures_{suffix}")
        };
        match self.position(&name) {
            Some(i) => self.resources[i].stages.insert(stage),
            None => {
                self.push(
                    &name,
                    BINDLESS_GROUP,
                    stage,
                    ResourcePayload::TextureArray { ty, depth },
                );
            }
        }
        name
    }

    /// Find a sampler with matching state or create a new one; returns its name.
    pub fn sampler(&mut self, state: &SamplerState, stage: Stage) -> String {
        let existing = self.resources.iter_mut().find(|r| {
            matches!(&r.payload, ResourcePayload::Sampler { state: s } if s.matches(state))
        });
        if let Some(r) = existing {
            r.stages.insert(stage);
            return r.name.clone();
        }
        let count = self
            .resources
            .iter()
            .filter(|r| matches!(r.payload, ResourcePayload::Sampler { .. }))
            .count();
        let name = format!("samp_{count}");
        self.push(
            &name,
            DEFAULT_GROUP,
            stage,
            ResourcePayload::Sampler { state: *state },
        );
        name
    }

    pub fn image(&mut self, name: &str, ty: ValueType, stage: Stage) -> Result<(), LayoutConflict> {
        match self.position(name) {
            Some(i) => {
                let r = &mut self.resources[i];
                match &r.payload {
                    ResourcePayload::Image { ty: existing } if *existing == ty => {
                        r.stages.insert(stage);
                        Ok(())
                    }
                    other => Err(LayoutConflict::new(
                        name,
                        format!("already declared as {}", other.kind_name()),
                    )),
                }
            }
            None => {
                self.push(name, DEFAULT_GROUP, stage, ResourcePayload::Image { ty });
                Ok(())
            }
        }
    }

    pub fn image_array(&mut self, ty: ValueType, stage: Stage) -> String {
        let name = format!("bindless_images_{}", dimension_suffix(ty));
        match self.position(&name) {
            Some(i) => self.resources[i].stages.insert(stage),
            None => {
                self.push(&name, BINDLESS_GROUP, stage, ResourcePayload::ImageArray { ty });
            }
        }
        name
    }

    pub fn storage_buffer(
        &mut self,
        name: &str,
        elements: &[StructElement],
        stage: Stage,
    ) -> Result<(), LayoutConflict> {
        match self.position(name) {
            Some(i) => {
                let r = &mut self.resources[i];
                match &r.payload {
                    ResourcePayload::StorageBuffer { elements: existing, .. } if existing == elements => {
                        r.stages.insert(stage);
                        Ok(())
                    }
                    ResourcePayload::StorageBuffer { .. } => Err(LayoutConflict::new(
                        name,
                        "structured buffer element layout differs from a prior declaration",
                    )),
                    other => Err(LayoutConflict::new(
                        name,
                        format!("already declared as {}", other.kind_name()),
                    )),
                }
            }
            None => {
                let stride = storage_stride(elements);
                self.push(
                    name,
                    DEFAULT_GROUP,
                    stage,
                    ResourcePayload::StorageBuffer {
                        elements: elements.to_vec(),
                        stride,
                    },
                );
                Ok(())
            }
        }
    }

    /// Assign bindings: monotonic per group, ordered by kind then registration.
    pub fn finalize(&mut self) {
        let mut order: Vec<usize> = (0..self.resources.len()).collect();
        order.sort_by_key(|&i| {
            let r = &self.resources[i];
            (r.group, r.payload.binding_rank(), i)
        });
        let mut next = [0u32; 2];
        for i in order {
            let r = &mut self.resources[i];
            if r.stages == StageMask::EMPTY {
                continue;
            }
            if let ResourcePayload::UniformBuffer { members, .. } = &r.payload
                && members.is_empty()
            {
                continue;
            }
            let slot = &mut next[(r.group as usize).min(1)];
            r.binding = Some(*slot);
            *slot += 1;
        }
        self.finalized = true;
    }

    /// WGSL declarations of every resource referenced by `stage`, in binding order.
    pub fn declarations(&self, stage: Stage) -> String {
        let mut ordered: Vec<&Resource> = self
            .resources
            .iter()
            .filter(|r| r.stages.contains(stage) && r.binding.is_some())
            .collect();
        ordered.sort_by_key(|r| (r.group, r.binding));

        let mut out = String::new();
        for r in ordered {
            let binding = r.binding.unwrap_or_default();
            let prefix = format!("@group({}) @binding({binding})", r.group);
            match &r.payload {
                ResourcePayload::UniformBuffer { members, .. } => {
                    out.push_str(&format!("struct {}_Type {{\n", r.name));
                    for m in members {
                        out.push_str(&format!("    {}: {},\n", m.name, m.wgsl_type()));
                    }
                    out.push_str("}\n");
                    out.push_str(&format!("{prefix} var<uniform> {}: {}_Type;\n", r.name, r.name));
                }
                ResourcePayload::Texture { ty, compared, .. } => {
                    out.push_str(&format!("{prefix} var {}: {};\n", r.name, texture_type(*ty, *compared)));
                }
                ResourcePayload::TextureArray { ty, depth } => {
                    out.push_str(&format!(
                        "{prefix} var {}: binding_array<{}>;\n",
                        r.name,
                        texture_type(*ty, *depth)
                    ));
                }
                ResourcePayload::Sampler { state } => {
                    let ty = if state.is_comparison() { "sampler_comparison" } else { "sampler" };
                    out.push_str(&format!("{prefix} var {}: {ty};\n", r.name));
                }
                ResourcePayload::Image { ty } => {
                    out.push_str(&format!("{prefix} var {}: {};\n", r.name, ty.wgsl()));
                }
                ResourcePayload::ImageArray { ty } => {
                    out.push_str(&format!("{prefix} var {}: binding_array<{}>;\n", r.name, ty.wgsl()));
                }
                ResourcePayload::StorageBuffer { elements, .. } => {
                    out.push_str(&format!("struct {}_Type {{\n", r.name));
                    for e in elements {
                        out.push_str(&format!(
                            "    {}: {},\n",
                            e.name,
                            ValueType::from_data_type(e.data_type).wgsl()
                        ));
                    }
                    out.push_str("}\n");
                    let access = if stage == Stage::Compute { "read_write" } else { "read" };
                    out.push_str(&format!(
                        "{prefix} var<storage, {access}> {}: array<{}_Type>;\n",
                        r.name, r.name
                    ));
                }
            }
        }
        out
    }
}

fn dimension_suffix(ty: ValueType) -> &'static str {
    match ty {
        ValueType::Texture3D | ValueType::Image3D => "3d",
        ValueType::TextureCube | ValueType::ImageCube => "cube",
        _ => "2d",
    }
}

fn texture_type(ty: ValueType, depth: bool) -> &'static str {
    match (ty, depth) {
        (ValueType::TextureCube, true) => "texture_depth_cube",
        (_, true) => "texture_depth_2d",
        (t, false) => t.wgsl(),
    }
}

/// Array stride of a structured-buffer element in the storage address space.
pub fn storage_stride(elements: &[StructElement]) -> u32 {
    let mut end = 0;
    let mut struct_align = 4;
    for e in elements {
        let (align, size) = align_size(ValueType::from_data_type(e.data_type));
        end = round_up(align, end) + size;
        struct_align = struct_align.max(align);
    }
    round_up(struct_align, end.max(struct_align))
}
