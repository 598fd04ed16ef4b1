//! Reference fixed-function sub render states.
//!
//! These cover the minimal fixed-function pass: transform the position, pass the diffuse colour
//! through and modulate it by any number of texture stages. Their library functions live in
//! `media/<language>/FFPLib_*.<language>`.

use crate::auto_constants::AutoConstantType;
use crate::error::{Error, Result};
use crate::invocation::{AtomOp, FunctionInvocation, GroupOrder};
use crate::operand::{OperandMask, OperandSemantic};
use crate::parameter::{Content, GpuConstantType, ParameterRef, Semantic, Variability};
use crate::program::ProgramSet;
use crate::render_state::{RenderStateRegistry, SubRenderState, SubRenderStateFactory};

pub const FFP_TRANSFORM: i32 = 100;
pub const FFP_COLOUR: i32 = 200;
pub const FFP_TEXTURING: i32 = 300;

const LIB_COMMON: &str = "FFPLib_Common";
const LIB_TRANSFORM: &str = "FFPLib_Transform";
const LIB_TEXTURING: &str = "FFPLib_Texturing";

pub(crate) fn register_factories(registry: &mut RenderStateRegistry) {
    registry.add_factory(Box::new(FfpTransformFactory));
    registry.add_factory(Box::new(FfpColourFactory));
    registry.add_factory(Box::new(FfpTexturingFactory));
}

fn resolved<'a>(parameter: &'a Option<ParameterRef>, op: &str) -> Result<&'a ParameterRef> {
    parameter.as_ref().ok_or_else(|| Error::InvalidAtom {
        op: op.to_owned(),
        reason: "operand parameter was not resolved",
    })
}

/// Object space position to clip space through the world-view-projection matrix.
#[derive(Debug, Default)]
pub struct FfpTransform {
    world_view_proj: Option<ParameterRef>,
    position_in: Option<ParameterRef>,
    position_out: Option<ParameterRef>,
}

impl SubRenderState for FfpTransform {
    fn type_name(&self) -> &'static str {
        "FFP_Transform"
    }

    fn execution_order(&self) -> i32 {
        FFP_TRANSFORM
    }

    fn resolve_parameters(&mut self, set: &mut ProgramSet) -> Result<()> {
        let vs = set.vertex_mut();
        self.world_view_proj =
            Some(vs.resolve_auto_parameter_int(AutoConstantType::WorldViewProjMatrix, 0)?);
        let main = vs.entry_function_mut();
        self.position_in = Some(main.resolve_input_parameter(
            Semantic::Position,
            Some(0),
            Content::PositionObjectSpace,
            GpuConstantType::Float4,
        )?);
        self.position_out = Some(main.resolve_output_parameter(
            Semantic::Position,
            Some(0),
            Content::PositionProjectiveSpace,
            GpuConstantType::Float4,
        )?);
        Ok(())
    }

    fn resolve_dependencies(&mut self, set: &mut ProgramSet) -> Result<()> {
        set.vertex_mut().add_dependency(LIB_TRANSFORM);
        Ok(())
    }

    fn add_function_invocations(&mut self, set: &mut ProgramSet) -> Result<()> {
        let atom = FunctionInvocation::new(
            AtomOp::call("FFP_Transform"),
            GroupOrder::VS_TRANSFORM,
            0,
        )
        .with_operand(
            resolved(&self.world_view_proj, "FFP_Transform")?,
            OperandSemantic::In,
            OperandMask::ALL,
        )
        .with_operand(
            resolved(&self.position_in, "FFP_Transform")?,
            OperandSemantic::In,
            OperandMask::ALL,
        )
        .with_operand(
            resolved(&self.position_out, "FFP_Transform")?,
            OperandSemantic::Out,
            OperandMask::ALL,
        );
        set.vertex_mut().entry_function_mut().add_atom_instance(atom);
        Ok(())
    }
}

/// Vertex diffuse colour passed through to the fragment output.
#[derive(Debug, Default)]
pub struct FfpColour {
    vs_diffuse_in: Option<ParameterRef>,
    vs_diffuse_out: Option<ParameterRef>,
    ps_diffuse_in: Option<ParameterRef>,
    ps_colour_out: Option<ParameterRef>,
}

impl SubRenderState for FfpColour {
    fn type_name(&self) -> &'static str {
        "FFP_Colour"
    }

    fn execution_order(&self) -> i32 {
        FFP_COLOUR
    }

    fn resolve_parameters(&mut self, set: &mut ProgramSet) -> Result<()> {
        let vs_main = set.vertex_mut().entry_function_mut();
        self.vs_diffuse_in = Some(vs_main.resolve_input_parameter(
            Semantic::Color,
            Some(0),
            Content::ColorDiffuse,
            GpuConstantType::Float4,
        )?);
        self.vs_diffuse_out = Some(vs_main.resolve_output_parameter(
            Semantic::Color,
            Some(0),
            Content::ColorDiffuse,
            GpuConstantType::Float4,
        )?);

        let ps_main = set.fragment_mut().entry_function_mut();
        self.ps_diffuse_in = Some(ps_main.resolve_input_parameter(
            Semantic::Color,
            Some(0),
            Content::ColorDiffuse,
            GpuConstantType::Float4,
        )?);
        self.ps_colour_out = Some(ps_main.resolve_output_parameter(
            Semantic::Color,
            Some(0),
            Content::Unknown,
            GpuConstantType::Float4,
        )?);
        Ok(())
    }

    fn resolve_dependencies(&mut self, set: &mut ProgramSet) -> Result<()> {
        set.vertex_mut().add_dependency(LIB_COMMON);
        set.fragment_mut().add_dependency(LIB_COMMON);
        Ok(())
    }

    fn add_function_invocations(&mut self, set: &mut ProgramSet) -> Result<()> {
        set.vertex_mut().entry_function_mut().add_atom_assign(
            resolved(&self.vs_diffuse_out, "assign")?,
            resolved(&self.vs_diffuse_in, "assign")?,
            GroupOrder::VS_COLOUR,
            0,
        );
        set.fragment_mut().entry_function_mut().add_atom_assign(
            resolved(&self.ps_colour_out, "assign")?,
            resolved(&self.ps_diffuse_in, "assign")?,
            GroupOrder::PS_COLOUR_BEGIN,
            0,
        );
        Ok(())
    }
}

/// One texture stage: pass the stage's texcoord set through, sample, and modulate the
/// fragment colour by the texel.
#[derive(Debug, Default)]
pub struct FfpTexturing {
    stage: u32,
    vs_texcoord_in: Option<ParameterRef>,
    vs_texcoord_out: Option<ParameterRef>,
    ps_texcoord_in: Option<ParameterRef>,
    sampler: Option<ParameterRef>,
    texel: Option<ParameterRef>,
    ps_colour_out: Option<ParameterRef>,
}

impl FfpTexturing {
    pub fn new(stage: u32) -> Self {
        Self {
            stage,
            ..Default::default()
        }
    }

    pub fn stage(&self) -> u32 {
        self.stage
    }
}

impl SubRenderState for FfpTexturing {
    fn type_name(&self) -> &'static str {
        "FFP_Texturing"
    }

    fn execution_order(&self) -> i32 {
        FFP_TEXTURING
    }

    fn resolve_parameters(&mut self, set: &mut ProgramSet) -> Result<()> {
        let stage = self.stage;
        let content = Content::texture_coordinate(stage)?;

        let vs_main = set.vertex_mut().entry_function_mut();
        self.vs_texcoord_in = Some(vs_main.resolve_input_parameter(
            Semantic::TextureCoordinates,
            Some(stage),
            content,
            GpuConstantType::Float2,
        )?);
        let vs_out = vs_main.resolve_output_parameter(
            Semantic::TextureCoordinates,
            None,
            content,
            GpuConstantType::Float2,
        )?;

        let ps = set.fragment_mut();
        self.sampler = Some(ps.resolve_parameter(
            GpuConstantType::Sampler2D,
            stage,
            Variability::GLOBAL,
            &format!("gTextureSampler{stage}"),
            None,
        )?);
        let ps_main = ps.entry_function_mut();
        self.ps_texcoord_in = Some(ps_main.resolve_input_parameter(
            Semantic::TextureCoordinates,
            Some(vs_out.index()),
            content,
            GpuConstantType::Float2,
        )?);
        self.texel = Some(ps_main.resolve_local_parameter(
            Semantic::Unknown,
            0,
            &format!("texel_{stage}"),
            GpuConstantType::Float4,
        )?);
        self.ps_colour_out = Some(ps_main.resolve_output_parameter(
            Semantic::Color,
            Some(0),
            Content::Unknown,
            GpuConstantType::Float4,
        )?);
        self.vs_texcoord_out = Some(vs_out);
        Ok(())
    }

    fn resolve_dependencies(&mut self, set: &mut ProgramSet) -> Result<()> {
        set.fragment_mut().add_dependency(LIB_COMMON);
        set.fragment_mut().add_dependency(LIB_TEXTURING);
        Ok(())
    }

    fn add_function_invocations(&mut self, set: &mut ProgramSet) -> Result<()> {
        let order = self.stage as i32;
        set.vertex_mut().entry_function_mut().add_atom_assign(
            resolved(&self.vs_texcoord_out, "assign")?,
            resolved(&self.vs_texcoord_in, "assign")?,
            GroupOrder::VS_TEXTURING,
            order,
        );

        let ps_main = set.fragment_mut().entry_function_mut();
        let texel = resolved(&self.texel, "sample")?;
        let colour = resolved(&self.ps_colour_out, "FFP_Modulate")?;
        ps_main.add_atom_instance(
            FunctionInvocation::new(AtomOp::Sample, GroupOrder::PS_SAMPLING, order)
                .with_operand(
                    resolved(&self.sampler, "sample")?,
                    OperandSemantic::In,
                    OperandMask::ALL,
                )
                .with_operand(
                    resolved(&self.ps_texcoord_in, "sample")?,
                    OperandSemantic::In,
                    OperandMask::ALL,
                )
                .with_operand(texel, OperandSemantic::Out, OperandMask::ALL),
        );
        ps_main.add_atom_instance(
            FunctionInvocation::new(AtomOp::call("FFP_Modulate"), GroupOrder::PS_TEXTURING, order)
                .with_operand(texel, OperandSemantic::In, OperandMask::ALL)
                .with_operand(colour, OperandSemantic::In, OperandMask::ALL)
                .with_operand(colour, OperandSemantic::Out, OperandMask::ALL),
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FfpTransformFactory;

impl SubRenderStateFactory for FfpTransformFactory {
    fn type_name(&self) -> &'static str {
        "FFP_Transform"
    }

    fn create_instance(&self) -> Box<dyn SubRenderState> {
        Box::new(FfpTransform::default())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FfpColourFactory;

impl SubRenderStateFactory for FfpColourFactory {
    fn type_name(&self) -> &'static str {
        "FFP_Colour"
    }

    fn create_instance(&self) -> Box<dyn SubRenderState> {
        Box::new(FfpColour::default())
    }
}

/// Creates texture stage 0. Further stages are added with [`FfpTexturing::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FfpTexturingFactory;

impl SubRenderStateFactory for FfpTexturingFactory {
    fn type_name(&self) -> &'static str {
        "FFP_Texturing"
    }

    fn create_instance(&self) -> Box<dyn SubRenderState> {
        Box::new(FfpTexturing::new(0))
    }
}
