//! Node kinds understood by the shader generator and their parameters.
//!
//! A DSL node's `params` object is merged with its `type` tag and deserialized
//! into [`NodeKind`]. Kinds without parameters are unit variants; any type name
//! that is not listed here lands in [`NodeKind::Unknown`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    Abs,
    Add,
    ArcusCos,
    ArcusTan,
    Clamp(ClampParams),
    Color(ColorParams),
    ComputeOutput(ComputeOutputParams),
    Conditional(ConditionalParams),
    Cos,
    Cross,
    Derivative(DerivativeParams),
    Discard(DiscardParams),
    DispatchIndex(DispatchIndexParams),
    Div,
    Dot,
    Exp,
    Fraction,
    FragmentPosition,
    FrontFace,
    IndexedUniform(IndexedUniformParams),
    Instance,
    Interpolator,
    Iterate(IterateParams),
    Iterate2,
    Iterate2d(Iterate2dParams),
    Length,
    Lerp,
    Log(LogParams),
    MatrixIn,
    MatrixOut,
    Max,
    Min,
    MixIn,
    MixOut,
    Mul,
    MulAdd,
    Neg,
    Normalize,
    PixelOutput(PixelOutputParams),
    Polynomial,
    Pow,
    ReadStruct(ReadStructParams),
    ReadStruct2,
    Reflect,
    RecipSqrt,
    Repeat,
    Round,
    Sampler(SamplerParams),
    Scalar(ScalarParams),
    Script(ScriptParams),
    Sign,
    Sin,
    Sqrt,
    Step,
    Struct(StructParams),
    Sub,
    Sum(SumParams),
    Swizzle(SwizzleParams),
    Switch(SwitchParams),
    Tan,
    TargetSize,
    TextureSize,
    TextureState(TextureStateParams),
    Transform,
    Transpose,
    Truncate,
    Uniform(UniformParams),
    Vector(VectorParams),
    VertexInput(VertexInputParams),
    VertexOutput(VertexOutputParams),
    #[serde(other)]
    Unknown,
}

impl NodeKind {
    /// Nodes that terminate a stage and are driven by the generator.
    pub fn is_sink(&self) -> bool {
        match self {
            NodeKind::PixelOutput(_) | NodeKind::VertexOutput(_) | NodeKind::ComputeOutput(_) => true,
            NodeKind::Script(p) => p.technique.is_some(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum Comparison {
    #[default]
    Less,
    LessEqual,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
}

impl Comparison {
    pub fn wgsl(self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::LessEqual => "<=",
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
            Comparison::Greater => ">",
            Comparison::GreaterEqual => ">=",
        }
    }

    /// The comparison that holds exactly when `self` does not.
    pub fn inverted(self) -> Self {
        match self {
            Comparison::Less => Comparison::GreaterEqual,
            Comparison::LessEqual => Comparison::Greater,
            Comparison::Equal => Comparison::NotEqual,
            Comparison::NotEqual => Comparison::Equal,
            Comparison::Greater => Comparison::LessEqual,
            Comparison::GreaterEqual => Comparison::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum BranchHint {
    #[default]
    Auto,
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize, Serialize)]
pub enum PrecisionHint {
    #[default]
    Undefined,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize, Serialize)]
pub enum UpdateFrequency {
    Once,
    #[default]
    Frame,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum ParameterType {
    #[default]
    Scalar,
    Vector,
    Matrix,
    Texture2D,
    Texture3D,
    TextureCube,
    StructBuffer,
    Image2D,
    Image3D,
    ImageCube,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum DataUsage {
    #[default]
    Position,
    Normal,
    Tangent,
    Binormal,
    Color,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum DataType {
    Float1,
    Float2,
    Float3,
    #[default]
    Float4,
    Byte4,
    Byte4N,
    Short2,
    Short4,
    Short2N,
    Short4N,
    Half2,
    Half4,
    Integer1,
    Integer2,
    Integer3,
    Integer4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum Filter {
    Point,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum Address {
    #[default]
    Wrap,
    Mirror,
    Clamp,
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum CompareFunction {
    Always,
    Never,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    #[default]
    None,
}

/// Full fixed-function sampler state. Two samplers are interchangeable when
/// [`SamplerState::matches`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplerState {
    pub min_filter: Filter,
    pub mip_filter: Filter,
    pub mag_filter: Filter,
    pub address_u: Address,
    pub address_v: Address,
    pub address_w: Address,
    pub compare: CompareFunction,
    pub mip_bias: f32,
    pub ignore_mips: bool,
    pub use_anisotropic: bool,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            min_filter: Filter::Linear,
            mip_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            address_u: Address::Wrap,
            address_v: Address::Wrap,
            address_w: Address::Wrap,
            compare: CompareFunction::None,
            mip_bias: 0.0,
            ignore_mips: false,
            use_anisotropic: false,
        }
    }
}

impl SamplerState {
    pub const MIP_BIAS_EPSILON: f32 = 1e-4;

    pub fn matches(&self, other: &SamplerState) -> bool {
        self.min_filter == other.min_filter
            && self.mip_filter == other.mip_filter
            && self.mag_filter == other.mag_filter
            && self.address_u == other.address_u
            && self.address_v == other.address_v
            && self.address_w == other.address_w
            && self.compare == other.compare
            && (self.mip_bias - other.mip_bias).abs() <= Self::MIP_BIAS_EPSILON
            && self.ignore_mips == other.ignore_mips
            && self.use_anisotropic == other.use_anisotropic
    }

    pub fn is_comparison(&self) -> bool {
        self.compare != CompareFunction::None
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClampParams {
    pub min: f32,
    pub max: f32,
}

impl Default for ClampParams {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorParams {
    pub color: [f32; 4],
    pub linear: bool,
}

impl Default for ColorParams {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            linear: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComputeOutputParams {
    pub local_size: [u32; 3],
    /// Element written when `Storage` is a structured buffer; defaults to the first element.
    pub field: Option<String>,
}

impl Default for ComputeOutputParams {
    fn default() -> Self {
        Self {
            local_size: [1, 1, 1],
            field: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionalParams {
    pub operator: Comparison,
    pub branch: BranchHint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Axis {
    #[default]
    X,
    Y,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DerivativeParams {
    pub axis: Axis,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscardParams {
    pub operator: Comparison,
    pub branch: BranchHint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum DispatchScope {
    #[default]
    Global,
    Local,
    Group,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchIndexParams {
    pub scope: DispatchScope,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexedUniformParams {
    pub parameter_name: String,
    pub parameter_type: ParameterType,
    pub frequency: UpdateFrequency,
    pub length: u32,
}

impl Default for IndexedUniformParams {
    fn default() -> Self {
        Self {
            parameter_name: String::new(),
            parameter_type: ParameterType::Scalar,
            frequency: UpdateFrequency::Frame,
            length: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IterateParams {
    pub from: i32,
    pub to: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Iterate2dParams {
    pub from_x: i32,
    pub to_x: i32,
    pub from_y: i32,
    pub to_y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum LogBase {
    Two,
    Ten,
    #[default]
    Natural,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogParams {
    pub base: LogBase,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PixelOutputParams {
    pub precision_hint: PrecisionHint,
    /// RGBA bit mask; zero disables every color target.
    pub color_write_mask: u32,
}

impl Default for PixelOutputParams {
    fn default() -> Self {
        Self {
            precision_hint: PrecisionHint::Undefined,
            color_write_mask: 0b1111,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadStructParams {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplerParams {
    pub sampler_state: SamplerState,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScalarParams {
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptOutput {
    pub name: String,
    #[serde(rename = "type", default)]
    pub output_type: ParameterType,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptParams {
    pub script: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<ScriptOutput>,
    pub includes: Vec<String>,
    pub technique: Option<String>,
    pub local_size: [u32; 3],
}

impl Default for ScriptParams {
    fn default() -> Self {
        Self {
            script: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            includes: Vec::new(),
            technique: None,
            local_size: [1, 1, 1],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct StructElement {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructParams {
    pub parameter_name: String,
    pub elements: Vec<StructElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SumParams {
    pub from: i32,
    pub to: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwizzleParams {
    pub swizzle: String,
}

impl Default for SwizzleParams {
    fn default() -> Self {
        Self {
            swizzle: "xyzw".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwitchParams {
    pub cases: Vec<i32>,
    pub width: u32,
    pub branch: BranchHint,
}

impl Default for SwitchParams {
    fn default() -> Self {
        Self {
            cases: Vec::new(),
            width: 1,
            branch: BranchHint::Auto,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextureStateParams {
    pub sampler_state: SamplerState,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UniformParams {
    pub parameter_name: String,
    pub parameter_type: ParameterType,
    pub frequency: UpdateFrequency,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VectorParams {
    pub value: [f32; 4],
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VertexInputParams {
    pub name: String,
    pub usage: DataUsage,
    pub data_type: DataType,
    pub index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VertexOutputParams {
    pub precision_hint: PrecisionHint,
}
