//! Typed shader variable descriptors.
//!
//! Every value that flows through a generated shader is a [`Parameter`]: vertex attributes,
//! interpolators, locals, uniforms and inline literals. Parameters are shared between the
//! function parameter lists and the operands that reference them, so they are handed out as
//! [`ParameterRef`] (`Rc<Parameter>`) and compared by identity.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::auto_constants::AutoConstantType;
use crate::error::{Error, Result};

/// Shared handle to a parameter. Identity (`Rc::ptr_eq`) is the parameter's identity.
pub type ParameterRef = Rc<Parameter>;

/// Maximum number of texture coordinate sets addressable by content types.
pub const MAX_TEXTURE_COORDINATE_SETS: u32 = 8;

/// Maximum number of lights addressable by per-light content types.
pub const MAX_LIGHTS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GpuConstantType {
    Float1,
    Float2,
    Float3,
    Float4,
    Int1,
    Int2,
    Int3,
    Int4,
    UInt1,
    UInt2,
    UInt3,
    UInt4,
    Matrix2x2,
    Matrix2x3,
    Matrix2x4,
    Matrix3x2,
    Matrix3x3,
    Matrix3x4,
    Matrix4x2,
    Matrix4x3,
    Matrix4x4,
    Sampler1D,
    Sampler2D,
    Sampler2DArray,
    Sampler3D,
    SamplerCube,
    Sampler1DShadow,
    Sampler2DShadow,
}

impl GpuConstantType {
    pub const ALL: [GpuConstantType; 28] = [
        GpuConstantType::Float1,
        GpuConstantType::Float2,
        GpuConstantType::Float3,
        GpuConstantType::Float4,
        GpuConstantType::Int1,
        GpuConstantType::Int2,
        GpuConstantType::Int3,
        GpuConstantType::Int4,
        GpuConstantType::UInt1,
        GpuConstantType::UInt2,
        GpuConstantType::UInt3,
        GpuConstantType::UInt4,
        GpuConstantType::Matrix2x2,
        GpuConstantType::Matrix2x3,
        GpuConstantType::Matrix2x4,
        GpuConstantType::Matrix3x2,
        GpuConstantType::Matrix3x3,
        GpuConstantType::Matrix3x4,
        GpuConstantType::Matrix4x2,
        GpuConstantType::Matrix4x3,
        GpuConstantType::Matrix4x4,
        GpuConstantType::Sampler1D,
        GpuConstantType::Sampler2D,
        GpuConstantType::Sampler2DArray,
        GpuConstantType::Sampler3D,
        GpuConstantType::SamplerCube,
        GpuConstantType::Sampler1DShadow,
        GpuConstantType::Sampler2DShadow,
    ];

    /// Float vector type with `count` components (1..=4).
    pub fn float_vector(count: usize) -> Option<Self> {
        match count {
            1 => Some(GpuConstantType::Float1),
            2 => Some(GpuConstantType::Float2),
            3 => Some(GpuConstantType::Float3),
            4 => Some(GpuConstantType::Float4),
            _ => None,
        }
    }

    /// Number of floats of a float scalar/vector type, `None` for every other type.
    pub fn float_count(self) -> Option<usize> {
        match self {
            GpuConstantType::Float1 => Some(1),
            GpuConstantType::Float2 => Some(2),
            GpuConstantType::Float3 => Some(3),
            GpuConstantType::Float4 => Some(4),
            _ => None,
        }
    }

    pub fn is_sampler(self) -> bool {
        matches!(
            self,
            GpuConstantType::Sampler1D
                | GpuConstantType::Sampler2D
                | GpuConstantType::Sampler2DArray
                | GpuConstantType::Sampler3D
                | GpuConstantType::SamplerCube
                | GpuConstantType::Sampler1DShadow
                | GpuConstantType::Sampler2DShadow
        )
    }

    pub fn is_matrix(self) -> bool {
        matches!(
            self,
            GpuConstantType::Matrix2x2
                | GpuConstantType::Matrix2x3
                | GpuConstantType::Matrix2x4
                | GpuConstantType::Matrix3x2
                | GpuConstantType::Matrix3x3
                | GpuConstantType::Matrix3x4
                | GpuConstantType::Matrix4x2
                | GpuConstantType::Matrix4x3
                | GpuConstantType::Matrix4x4
        )
    }
}

/// Binding semantic of a parameter (what hardware slot it is bound to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    Unknown,
    Position,
    BlendWeights,
    BlendIndices,
    Normal,
    Color,
    TextureCoordinates,
    Binormal,
    Tangent,
}

impl Semantic {
    /// Stem used when naming interface parameters (`iPos_0`, `oTexcoord_3`, ...).
    fn name_stem(self) -> &'static str {
        match self {
            Semantic::Unknown => "Param",
            Semantic::Position => "Pos",
            Semantic::BlendWeights => "BlendWeights",
            Semantic::BlendIndices => "BlendIndices",
            Semantic::Normal => "Normal",
            Semantic::Color => "Color",
            Semantic::TextureCoordinates => "Texcoord",
            Semantic::Binormal => "BiNormal",
            Semantic::Tangent => "Tangent",
        }
    }
}

/// Fine-grained role of a parameter, used to match producer outputs with consumer inputs by
/// meaning rather than by binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Content {
    Unknown,
    PositionObjectSpace,
    PositionWorldSpace,
    PositionViewSpace,
    PositionProjectiveSpace,
    PositionLightSpace(u8),
    NormalObjectSpace,
    NormalWorldSpace,
    NormalViewSpace,
    NormalTangentSpace,
    TangentObjectSpace,
    BinormalObjectSpace,
    ViewDirectionObjectSpace,
    ViewDirectionViewSpace,
    ViewDirectionTangentSpace,
    LightDirectionObjectSpace(u8),
    LightDirectionWorldSpace(u8),
    LightDirectionViewSpace(u8),
    LightDirectionTangentSpace(u8),
    LightPositionObjectSpace(u8),
    LightPositionViewSpace(u8),
    LightPositionTangentSpace(u8),
    BlendWeights,
    BlendIndices,
    ColorDiffuse,
    ColorSpecular,
    DepthObjectSpace,
    DepthViewSpace,
    DepthProjectiveSpace,
    TextureCoordinate(u8),
    /// Producer-defined content, outside the built-in catalogue.
    Custom(u32),
}

impl Content {
    pub fn texture_coordinate(index: u32) -> Result<Self> {
        Ok(Content::TextureCoordinate(checked_index(
            "texture coordinate set",
            index,
            MAX_TEXTURE_COORDINATE_SETS,
        )?))
    }

    pub fn light_direction_object_space(light: u32) -> Result<Self> {
        Ok(Content::LightDirectionObjectSpace(checked_index(
            "light", light, MAX_LIGHTS,
        )?))
    }

    pub fn light_direction_view_space(light: u32) -> Result<Self> {
        Ok(Content::LightDirectionViewSpace(checked_index(
            "light", light, MAX_LIGHTS,
        )?))
    }

    pub fn light_position_view_space(light: u32) -> Result<Self> {
        Ok(Content::LightPositionViewSpace(checked_index(
            "light", light, MAX_LIGHTS,
        )?))
    }

    pub fn position_light_space(light: u32) -> Result<Self> {
        Ok(Content::PositionLightSpace(checked_index(
            "light", light, MAX_LIGHTS,
        )?))
    }
}

fn checked_index(what: &'static str, index: u32, limit: u32) -> Result<u8> {
    if index >= limit {
        return Err(Error::IndexOutOfRange { what, index, limit });
    }
    Ok(index as u8)
}

bitflags! {
    /// When a uniform's value has to be re-uploaded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Variability: u8 {
        const GLOBAL = 1 << 0;
        const PER_OBJECT = 1 << 1;
        const LIGHTS = 1 << 2;
        const PER_FRAME = 1 << 3;
        const CUSTOM = 1 << 4;
    }
}

/// Engine-computed value a uniform is bound to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutoBinding {
    Int {
        constant: AutoConstantType,
        data: u32,
    },
    Real {
        constant: AutoConstantType,
        data: f32,
    },
}

impl AutoBinding {
    pub fn constant(&self) -> AutoConstantType {
        match *self {
            AutoBinding::Int { constant, .. } | AutoBinding::Real { constant, .. } => constant,
        }
    }
}

#[derive(Debug)]
pub struct UniformInfo {
    variability: Cell<Variability>,
    auto: Option<AutoBinding>,
}

impl UniformInfo {
    pub fn variability(&self) -> Variability {
        self.variability.get()
    }

    pub fn auto_binding(&self) -> Option<AutoBinding> {
        self.auto
    }

    pub(crate) fn add_variability(&self, variability: Variability) {
        self.variability.set(self.variability.get() | variability);
    }
}

/// Literal substituted inline wherever a constant parameter is referenced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl ConstValue {
    pub fn constant_type(&self) -> GpuConstantType {
        match self {
            ConstValue::Float(_) => GpuConstantType::Float1,
            ConstValue::Vec2(_) => GpuConstantType::Float2,
            ConstValue::Vec3(_) => GpuConstantType::Float3,
            ConstValue::Vec4(_) => GpuConstantType::Float4,
        }
    }

    pub fn components(&self) -> &[f32] {
        match self {
            ConstValue::Float(v) => std::slice::from_ref(v),
            ConstValue::Vec2(v) => v,
            ConstValue::Vec3(v) => v,
            ConstValue::Vec4(v) => v,
        }
    }

    /// Renders the literal, using `vector_type` as constructor for multi-component values.
    pub fn render(&self, vector_type: &str) -> String {
        match self {
            ConstValue::Float(v) => format_float(*v),
            _ => {
                let parts: Vec<String> =
                    self.components().iter().map(|v| format_float(*v)).collect();
                format!("{vector_type}({})", parts.join(", "))
            }
        }
    }
}

/// Formats a float so it is always a float literal in every target language (`1.0`, not `1`).
pub(crate) fn format_float(value: f32) -> String {
    let text = format!("{value}");
    if text.contains('.') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{text}.0")
    }
}

#[derive(Debug)]
pub enum ParameterKind {
    /// Function input, output or local.
    Variable,
    Uniform(UniformInfo),
    Const(ConstValue),
}

#[derive(Debug)]
pub struct Parameter {
    name: String,
    ty: GpuConstantType,
    semantic: Semantic,
    index: u32,
    content: Content,
    array_size: Option<usize>,
    kind: ParameterKind,
}

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        ty: GpuConstantType,
        semantic: Semantic,
        index: u32,
        content: Content,
    ) -> ParameterRef {
        Rc::new(Self {
            name: name.into(),
            ty,
            semantic,
            index,
            content,
            array_size: None,
            kind: ParameterKind::Variable,
        })
    }

    /// Function input named after its semantic, e.g. `iTexcoord_2`.
    pub fn input(
        semantic: Semantic,
        index: u32,
        content: Content,
        ty: GpuConstantType,
    ) -> ParameterRef {
        Self::new(
            format!("i{}_{index}", semantic.name_stem()),
            ty,
            semantic,
            index,
            content,
        )
    }

    /// Function output named after its semantic, e.g. `oColor_0`.
    pub fn output(
        semantic: Semantic,
        index: u32,
        content: Content,
        ty: GpuConstantType,
    ) -> ParameterRef {
        Self::new(
            format!("o{}_{index}", semantic.name_stem()),
            ty,
            semantic,
            index,
            content,
        )
    }

    pub fn uniform(
        name: impl Into<String>,
        ty: GpuConstantType,
        index: u32,
        variability: Variability,
        array_size: Option<usize>,
        auto: Option<AutoBinding>,
    ) -> ParameterRef {
        Rc::new(Self {
            name: name.into(),
            ty,
            semantic: Semantic::Unknown,
            index,
            content: Content::Unknown,
            array_size,
            kind: ParameterKind::Uniform(UniformInfo {
                variability: Cell::new(variability),
                auto,
            }),
        })
    }

    pub fn constant(value: ConstValue) -> ParameterRef {
        Rc::new(Self {
            name: String::new(),
            ty: value.constant_type(),
            semantic: Semantic::Unknown,
            index: 0,
            content: Content::Unknown,
            array_size: None,
            kind: ParameterKind::Const(value),
        })
    }

    /// Same descriptor under a different name. Used when interface parameters have to be
    /// renamed to link against the other stage.
    pub fn renamed(&self, name: impl Into<String>) -> ParameterRef {
        Self::new(name, self.ty, self.semantic, self.index, self.content)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> GpuConstantType {
        self.ty
    }

    pub fn semantic(&self) -> Semantic {
        self.semantic
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn content(&self) -> Content {
        self.content
    }

    pub fn array_size(&self) -> Option<usize> {
        self.array_size
    }

    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }

    pub fn uniform_info(&self) -> Option<&UniformInfo> {
        match &self.kind {
            ParameterKind::Uniform(info) => Some(info),
            _ => None,
        }
    }

    pub fn const_value(&self) -> Option<&ConstValue> {
        match &self.kind {
            ParameterKind::Const(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self.kind, ParameterKind::Const(_))
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self.kind, ParameterKind::Uniform(_))
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParameterKind::Const(value) => write!(f, "{value:?}"),
            _ => f.write_str(&self.name),
        }
    }
}

pub(crate) fn find_by_name<'a>(list: &'a [ParameterRef], name: &str) -> Option<&'a ParameterRef> {
    list.iter().find(|p| p.name() == name)
}

pub(crate) fn find_by_semantic<'a>(
    list: &'a [ParameterRef],
    semantic: Semantic,
    index: u32,
) -> Option<&'a ParameterRef> {
    list.iter()
        .find(|p| p.semantic() == semantic && p.index() == index)
}

pub(crate) fn find_by_content<'a>(
    list: &'a [ParameterRef],
    content: Content,
    ty: GpuConstantType,
) -> Option<&'a ParameterRef> {
    if content == Content::Unknown {
        return None;
    }
    list.iter().find(|p| p.content() == content && p.ty() == ty)
}

pub(crate) fn contains(list: &[ParameterRef], parameter: &ParameterRef) -> bool {
    list.iter().any(|p| Rc::ptr_eq(p, parameter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_names_follow_semantic_and_index() {
        let p = Parameter::input(
            Semantic::TextureCoordinates,
            3,
            Content::TextureCoordinate(3),
            GpuConstantType::Float2,
        );
        assert_eq!(p.name(), "iTexcoord_3");
        let p = Parameter::output(
            Semantic::Color,
            0,
            Content::ColorDiffuse,
            GpuConstantType::Float4,
        );
        assert_eq!(p.name(), "oColor_0");
    }

    #[test]
    fn const_literals_are_always_floats() {
        assert_eq!(ConstValue::Float(1.0).render("float"), "1.0");
        assert_eq!(ConstValue::Float(0.25).render("float"), "0.25");
        assert_eq!(
            ConstValue::Vec4([1.0, 0.0, 0.5, -2.0]).render("vec4"),
            "vec4(1.0, 0.0, 0.5, -2.0)"
        );
        assert_eq!(ConstValue::Vec2([3.0, 4.0]).render("float2"), "float2(3.0, 4.0)");
    }

    #[test]
    fn content_indices_are_range_checked() {
        assert_eq!(
            Content::texture_coordinate(7).unwrap(),
            Content::TextureCoordinate(7)
        );
        let err = Content::texture_coordinate(8).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 8, limit: 8, .. }), "{err}");
        assert!(Content::light_direction_object_space(MAX_LIGHTS).is_err());
    }

    #[test]
    fn uniform_variability_accumulates() {
        let p = Parameter::uniform(
            "gTint",
            GpuConstantType::Float4,
            0,
            Variability::GLOBAL,
            None,
            None,
        );
        let info = p.uniform_info().unwrap();
        info.add_variability(Variability::PER_OBJECT);
        assert_eq!(
            info.variability(),
            Variability::GLOBAL | Variability::PER_OBJECT
        );
    }

    #[test]
    fn float_vector_round_trips_width() {
        for n in 1..=4 {
            assert_eq!(
                GpuConstantType::float_vector(n).unwrap().float_count(),
                Some(n)
            );
        }
        assert_eq!(GpuConstantType::float_vector(5), None);
        assert_eq!(GpuConstantType::Matrix4x4.float_count(), None);
    }
}
