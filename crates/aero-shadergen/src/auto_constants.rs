//! Catalogue of engine-computed uniform values.
//!
//! The table is a compile-time `match`: every [`AutoConstantType`] maps to the uniform name and
//! type the generated shaders declare for it, and to the variability the runtime uses to decide
//! when to re-upload it.

use crate::parameter::{GpuConstantType, Variability};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoConstantType {
    WorldMatrix,
    InverseWorldMatrix,
    TransposeWorldMatrix,
    InverseTransposeWorldMatrix,
    WorldMatrixArray3x4,
    ViewMatrix,
    InverseViewMatrix,
    ProjectionMatrix,
    ViewProjMatrix,
    WorldViewMatrix,
    InverseWorldViewMatrix,
    InverseTransposeWorldViewMatrix,
    WorldViewProjMatrix,
    TextureMatrix,
    LightPosition,
    LightPositionObjectSpace,
    LightPositionViewSpace,
    LightDirection,
    LightDirectionObjectSpace,
    LightDirectionViewSpace,
    LightDiffuseColour,
    LightSpecularColour,
    LightAttenuation,
    SpotlightParams,
    LightCount,
    SurfaceAmbientColour,
    SurfaceDiffuseColour,
    SurfaceSpecularColour,
    SurfaceEmissiveColour,
    SurfaceShininess,
    AmbientLightColour,
    DerivedSceneColour,
    FogColour,
    FogParams,
    CameraPosition,
    CameraPositionObjectSpace,
    Time,
    TimeModulo,
    TextureSize,
    InverseTextureSize,
    ViewportSize,
}

/// Kind of extra data an auto constant is parameterised with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoDataKind {
    None,
    /// Light, texture unit or array element index.
    Int,
    /// Scale or period.
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoConstantDefinition {
    pub name: &'static str,
    pub ty: GpuConstantType,
    pub variability: Variability,
    pub data: AutoDataKind,
}

const fn def(
    name: &'static str,
    ty: GpuConstantType,
    variability: Variability,
    data: AutoDataKind,
) -> AutoConstantDefinition {
    AutoConstantDefinition {
        name,
        ty,
        variability,
        data,
    }
}

impl AutoConstantType {
    pub const fn definition(self) -> AutoConstantDefinition {
        use AutoConstantType as A;
        use AutoDataKind::{Int, None, Real};
        use GpuConstantType as T;

        const OBJECT: Variability = Variability::PER_OBJECT;
        const GLOBAL: Variability = Variability::GLOBAL;
        const LIGHTS: Variability = Variability::LIGHTS;
        const FRAME: Variability = Variability::PER_FRAME;

        match self {
            A::WorldMatrix => def("world_matrix", T::Matrix4x4, OBJECT, None),
            A::InverseWorldMatrix => def("inverse_world_matrix", T::Matrix4x4, OBJECT, None),
            A::TransposeWorldMatrix => def("transpose_world_matrix", T::Matrix4x4, OBJECT, None),
            A::InverseTransposeWorldMatrix => {
                def("inverse_transpose_world_matrix", T::Matrix4x4, OBJECT, None)
            }
            A::WorldMatrixArray3x4 => def("world_matrix_array_3x4", T::Matrix3x4, OBJECT, None),
            A::ViewMatrix => def("view_matrix", T::Matrix4x4, GLOBAL, None),
            A::InverseViewMatrix => def("inverse_view_matrix", T::Matrix4x4, GLOBAL, None),
            A::ProjectionMatrix => def("projection_matrix", T::Matrix4x4, GLOBAL, None),
            A::ViewProjMatrix => def("viewproj_matrix", T::Matrix4x4, GLOBAL, None),
            A::WorldViewMatrix => def("worldview_matrix", T::Matrix4x4, OBJECT, None),
            A::InverseWorldViewMatrix => {
                def("inverse_worldview_matrix", T::Matrix4x4, OBJECT, None)
            }
            A::InverseTransposeWorldViewMatrix => {
                def("inverse_transpose_worldview_matrix", T::Matrix4x4, OBJECT, None)
            }
            A::WorldViewProjMatrix => def("worldviewproj_matrix", T::Matrix4x4, OBJECT, None),
            A::TextureMatrix => def("texture_matrix", T::Matrix4x4, OBJECT, Int),
            A::LightPosition => def("light_position", T::Float4, LIGHTS, Int),
            A::LightPositionObjectSpace => {
                def("light_position_object_space", T::Float4, LIGHTS, Int)
            }
            A::LightPositionViewSpace => def("light_position_view_space", T::Float4, LIGHTS, Int),
            A::LightDirection => def("light_direction", T::Float4, LIGHTS, Int),
            A::LightDirectionObjectSpace => {
                def("light_direction_object_space", T::Float4, LIGHTS, Int)
            }
            A::LightDirectionViewSpace => {
                def("light_direction_view_space", T::Float4, LIGHTS, Int)
            }
            A::LightDiffuseColour => def("light_diffuse_colour", T::Float4, LIGHTS, Int),
            A::LightSpecularColour => def("light_specular_colour", T::Float4, LIGHTS, Int),
            A::LightAttenuation => def("light_attenuation", T::Float4, LIGHTS, Int),
            A::SpotlightParams => def("spotlight_params", T::Float4, LIGHTS, Int),
            A::LightCount => def("light_count", T::Float1, LIGHTS, None),
            A::SurfaceAmbientColour => def("surface_ambient_colour", T::Float4, GLOBAL, None),
            A::SurfaceDiffuseColour => def("surface_diffuse_colour", T::Float4, GLOBAL, None),
            A::SurfaceSpecularColour => def("surface_specular_colour", T::Float4, GLOBAL, None),
            A::SurfaceEmissiveColour => def("surface_emissive_colour", T::Float4, GLOBAL, None),
            A::SurfaceShininess => def("surface_shininess", T::Float1, GLOBAL, None),
            A::AmbientLightColour => def("ambient_light_colour", T::Float4, GLOBAL, None),
            A::DerivedSceneColour => def("derived_scene_colour", T::Float4, GLOBAL, None),
            A::FogColour => def("fog_colour", T::Float4, GLOBAL, None),
            A::FogParams => def("fog_params", T::Float4, GLOBAL, None),
            A::CameraPosition => def("camera_position", T::Float4, GLOBAL, None),
            A::CameraPositionObjectSpace => {
                def("camera_position_object_space", T::Float4, OBJECT, None)
            }
            A::Time => def("time", T::Float1, FRAME, Real),
            A::TimeModulo => def("time_0_x", T::Float1, FRAME, Real),
            A::TextureSize => def("texture_size", T::Float4, GLOBAL, Int),
            A::InverseTextureSize => def("inverse_texture_size", T::Float4, GLOBAL, Int),
            A::ViewportSize => def("viewport_size", T::Float4, GLOBAL, None),
        }
    }
}
