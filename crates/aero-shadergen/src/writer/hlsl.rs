use std::fmt::Write;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::library::ShaderLibrarySource;
use crate::options::ShaderGenOptions;
use crate::parameter::{GpuConstantType, ParameterRef, Semantic};
use crate::program::{Program, ProgramType};

use super::{
    write_atom, write_program_title, write_section_title, AtomSyntax, ProgramWriter,
    ProgramWriterFactory,
};

const LANGUAGE: &str = "hlsl";

/// HLSL (shader model 2 to 5) writer. Libraries are pulled in with `#include`.
#[derive(Debug, Clone)]
pub struct HlslProgramWriter {
    shader_model_4: bool,
}

impl HlslProgramWriter {
    pub fn new(options: &ShaderGenOptions) -> Self {
        Self {
            shader_model_4: options.hlsl_shader_model_4(),
        }
    }

    pub fn type_name(ty: GpuConstantType) -> Option<&'static str> {
        use GpuConstantType as T;
        Some(match ty {
            T::Float1 => "float",
            T::Float2 => "float2",
            T::Float3 => "float3",
            T::Float4 => "float4",
            T::Int1 => "int",
            T::Int2 => "int2",
            T::Int3 => "int3",
            T::Int4 => "int4",
            T::UInt1 => "uint",
            T::UInt2 => "uint2",
            T::UInt3 => "uint3",
            T::UInt4 => "uint4",
            T::Matrix2x2 => "float2x2",
            T::Matrix2x3 => "float2x3",
            T::Matrix2x4 => "float2x4",
            T::Matrix3x2 => "float3x2",
            T::Matrix3x3 => "float3x3",
            T::Matrix3x4 => "float3x4",
            T::Matrix4x2 => "float4x2",
            T::Matrix4x3 => "float4x3",
            T::Matrix4x4 => "float4x4",
            T::Sampler1D | T::Sampler1DShadow => "sampler1D",
            T::Sampler2D | T::Sampler2DShadow => "sampler2D",
            T::Sampler2DArray => "sampler2DArray",
            T::Sampler3D => "sampler3D",
            T::SamplerCube => "samplerCUBE",
        })
    }

    fn type_of(ty: GpuConstantType) -> Result<&'static str> {
        Self::type_name(ty).ok_or(Error::MissingTypeMapping {
            language: LANGUAGE,
            ty,
        })
    }

    /// Vertex colours arrive packed into a `uint` under shader model 4.
    fn is_packed_colour(&self, program: &Program, parameter: &ParameterRef) -> bool {
        self.shader_model_4
            && program.ty() == ProgramType::Vertex
            && parameter.semantic() == Semantic::Color
            && parameter.ty() == GpuConstantType::Float4
    }

    fn semantic_name(
        &self,
        program: ProgramType,
        parameter: &ParameterRef,
        is_output: bool,
    ) -> Result<String> {
        let index = parameter.index();
        let name = match parameter.semantic() {
            Semantic::Position => {
                let system_value = match program {
                    ProgramType::Vertex | ProgramType::Geometry => is_output,
                    ProgramType::Fragment => !is_output,
                };
                if self.shader_model_4 && system_value {
                    "SV_Position".to_owned()
                } else {
                    "POSITION".to_owned()
                }
            }
            Semantic::Color if program == ProgramType::Fragment && is_output => {
                match (self.shader_model_4, index) {
                    (true, 0) => "SV_Target".to_owned(),
                    (true, n) => format!("SV_Target{n}"),
                    (false, n) => format!("COLOR{n}"),
                }
            }
            Semantic::Color => format!("COLOR{index}"),
            Semantic::TextureCoordinates => format!("TEXCOORD{index}"),
            Semantic::Normal => "NORMAL".to_owned(),
            Semantic::BlendIndices => "BLENDINDICES".to_owned(),
            Semantic::BlendWeights => "BLENDWEIGHT".to_owned(),
            Semantic::Tangent => "TANGENT".to_owned(),
            Semantic::Binormal => "BINORMAL".to_owned(),
            Semantic::Unknown => {
                return Err(Error::MissingSemanticMapping {
                    language: LANGUAGE,
                    name: parameter.name().to_owned(),
                    semantic: parameter.semantic(),
                })
            }
        };
        Ok(name)
    }

    fn write_uniforms(&self, os: &mut String, program: &Program) -> Result<()> {
        write_section_title(os, "GLOBAL PARAMETERS");
        for uniform in program.uniforms() {
            let ty = Self::type_of(uniform.ty())?;
            let _ = write!(os, "uniform\t{ty}\t{}", uniform.name());
            if let Some(size) = uniform.array_size() {
                let _ = write!(os, "[{size}]");
            }
            if uniform.ty().is_sampler() {
                let _ = write!(os, " : register(s{})", uniform.index());
            }
            os.push_str(";\n");
        }
        Ok(())
    }

    fn write_signature(&self, os: &mut String, program: &Program) -> Result<()> {
        let main = program.entry_function();
        let mut params = Vec::with_capacity(main.inputs().len() + main.outputs().len());
        for input in main.inputs() {
            let semantic = self.semantic_name(program.ty(), input, false)?;
            if self.is_packed_colour(program, input) {
                params.push(format!(
                    "\tin unsigned int {}_packed : {semantic}",
                    input.name()
                ));
            } else {
                let ty = Self::type_of(input.ty())?;
                params.push(format!("\tin {ty} {} : {semantic}", input.name()));
            }
        }
        for output in main.outputs() {
            let semantic = self.semantic_name(program.ty(), output, true)?;
            let ty = Self::type_of(output.ty())?;
            params.push(format!("\tout {ty} {} : {semantic}", output.name()));
        }

        let _ = writeln!(os, "// {}", main.description());
        let _ = writeln!(os, "void {}(", main.name());
        let _ = writeln!(os, "{}", params.join(",\n"));
        os.push_str(")\n{\n");
        Ok(())
    }
}

impl AtomSyntax for HlslProgramWriter {
    fn parameter_name(&self, parameter: &ParameterRef) -> String {
        parameter.name().to_owned()
    }

    fn float_vector_type(&self, count: usize) -> &'static str {
        ["float", "float2", "float3", "float4"][count.clamp(1, 4) - 1]
    }

    fn transform(&self, matrix: &str, vector: &str) -> String {
        format!("mul({matrix}, {vector})")
    }

    fn sample_function(&self, sampler: GpuConstantType) -> Option<&'static str> {
        use GpuConstantType as T;
        match sampler {
            T::Sampler1D | T::Sampler1DShadow => Some("tex1D"),
            T::Sampler2D | T::Sampler2DShadow | T::Sampler2DArray => Some("tex2D"),
            T::Sampler3D => Some("tex3D"),
            T::SamplerCube => Some("texCUBE"),
            _ => None,
        }
    }
}

impl ProgramWriter for HlslProgramWriter {
    fn target_language(&self) -> &'static str {
        LANGUAGE
    }

    fn write_source_code(&mut self, os: &mut String, program: &Program) -> Result<()> {
        // Rendered aside so a failed program leaves `os` untouched.
        let mut source = String::new();
        self.write_program(&mut source, program)?;
        os.push_str(&source);
        Ok(())
    }
}

impl HlslProgramWriter {
    fn write_program(&self, os: &mut String, program: &Program) -> Result<()> {
        program.validate()?;

        write_program_title(os, program, LANGUAGE);

        write_section_title(os, "PROGRAM DEPENDENCIES");
        for dependency in program.dependencies() {
            let _ = writeln!(os, "#include \"{dependency}.{LANGUAGE}\"");
        }

        self.write_uniforms(os, program)?;

        write_section_title(os, "MAIN");
        self.write_signature(os, program)?;

        let main = program.entry_function();
        for local in main.locals() {
            let ty = Self::type_of(local.ty())?;
            let _ = writeln!(os, "\t{ty}\t{};", local.name());
        }

        for input in main.inputs() {
            if self.is_packed_colour(program, input) {
                let name = input.name();
                let packed = format!("{name}_packed");
                let _ = writeln!(
                    os,
                    "\tfloat4 {name} = float4((({packed} >> 16) & 0xFF) / 255.0, (({packed} >> 8) & 0xFF) / 255.0, ({packed} & 0xFF) / 255.0, (({packed} >> 24) & 0xFF) / 255.0);"
                );
            }
        }

        os.push('\n');
        for atom in main.atoms() {
            write_atom(os, atom, self)?;
        }
        os.push_str("}\n\n");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HlslProgramWriterFactory;

impl ProgramWriterFactory for HlslProgramWriterFactory {
    fn target_language(&self) -> &'static str {
        LANGUAGE
    }

    fn create(
        &self,
        options: &ShaderGenOptions,
        _library: Rc<dyn ShaderLibrarySource>,
    ) -> Box<dyn ProgramWriter> {
        Box::new(HlslProgramWriter::new(options))
    }
}
