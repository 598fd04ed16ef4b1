//! Desktop GLSL writer and the code shared with the GLSL ES writer.
//!
//! GLSL links stages by variable name and exposes fixed-function slots as built-ins, so unlike
//! HLSL the interface parameters are renamed: vertex attributes after their content
//! (`vertex`, `normal`, `uv0`, ...), the clip-space position to `gl_Position` and fragment colour
//! outputs to `gl_FragColor` / `gl_FragData[n]` (`fragColour` from version 130). Inputs are
//! read-only, so an atom writing one goes through a `local_<name>` copy declared right before it.

use std::fmt::Write;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::library::ShaderLibrarySource;
use crate::operand::Operand;
use crate::options::ShaderGenOptions;
use crate::parameter::{contains, Content, GpuConstantType, ParameterRef, Semantic};
use crate::program::{same, Program, ProgramType};

use super::{
    write_atom, write_program_title, write_section_title, AtomSyntax, ProgramWriter,
    ProgramWriterFactory,
};

const LANGUAGE: &str = "glsl";

/// Version dependent GLSL syntax, shared by the GLSL and GLSL ES writers.
#[derive(Debug, Clone, Copy)]
pub(super) struct GlslDialect {
    pub language: &'static str,
    pub version: u32,
    pub es: bool,
}

impl GlslDialect {
    /// `in`/`out` storage qualifiers and the generic `texture` lookup.
    fn modern(&self) -> bool {
        if self.es {
            self.version >= 300
        } else {
            self.version >= 130
        }
    }

    pub fn type_name(&self, ty: GpuConstantType) -> Option<&'static str> {
        use GpuConstantType as T;
        let name = match ty {
            T::Float1 => "float",
            T::Float2 => "vec2",
            T::Float3 => "vec3",
            T::Float4 => "vec4",
            T::Int1 => "int",
            T::Int2 => "ivec2",
            T::Int3 => "ivec3",
            T::Int4 => "ivec4",
            T::Matrix2x2 => "mat2",
            T::Matrix3x3 => "mat3",
            T::Matrix4x4 => "mat4",
            T::Sampler2D => "sampler2D",
            T::SamplerCube => "samplerCube",
            // ES 1.00 stops at the square float matrices; ES 3.00 still lacks 1D samplers.
            _ if self.es && !self.modern() => return None,
            T::Sampler1D | T::Sampler1DShadow if self.es => return None,
            T::UInt1 => "uint",
            T::UInt2 => "uvec2",
            T::UInt3 => "uvec3",
            T::UInt4 => "uvec4",
            T::Matrix2x3 => "mat2x3",
            T::Matrix2x4 => "mat2x4",
            T::Matrix3x2 => "mat3x2",
            T::Matrix3x4 => "mat3x4",
            T::Matrix4x2 => "mat4x2",
            T::Matrix4x3 => "mat4x3",
            T::Sampler1D => "sampler1D",
            T::Sampler2DArray => "sampler2DArray",
            T::Sampler3D => "sampler3D",
            T::Sampler1DShadow => "sampler1DShadow",
            T::Sampler2DShadow => "sampler2DShadow",
        };
        Some(name)
    }

    fn type_of(&self, ty: GpuConstantType) -> Result<&'static str> {
        self.type_name(ty).ok_or(Error::MissingTypeMapping {
            language: self.language,
            ty,
        })
    }

    fn sample_function(&self, sampler: GpuConstantType) -> Option<&'static str> {
        use GpuConstantType as T;
        if !sampler.is_sampler() {
            return None;
        }
        if self.modern() {
            return Some("texture");
        }
        match sampler {
            T::Sampler1D => Some("texture1D"),
            T::Sampler2D => Some("texture2D"),
            T::Sampler2DArray => Some("texture2DArray"),
            T::Sampler3D => Some("texture3D"),
            T::SamplerCube => Some("textureCube"),
            T::Sampler1DShadow => Some("shadow1D"),
            T::Sampler2DShadow => Some("shadow2D"),
            _ => None,
        }
    }

    fn write_version(&self, os: &mut String) {
        match (self.es, self.version) {
            (true, v) if v >= 300 => {
                let _ = writeln!(os, "#version {v} es");
            }
            (_, v) => {
                let _ = writeln!(os, "#version {v}");
            }
        }
        if self.es {
            os.push_str("precision mediump float;\n");
        }
        if self.es && self.modern() {
            // No default precision for these in ES 3.00.
            for sampler in ["sampler3D", "sampler2DArray", "sampler2DShadow"] {
                let _ = writeln!(os, "precision mediump {sampler};");
            }
        }
    }

    /// Attribute name of a vertex input, derived from its content (or semantic as a fallback).
    fn vertex_input_name(&self, parameter: &ParameterRef) -> Result<String> {
        let by_content = match parameter.content() {
            Content::PositionObjectSpace => Some("vertex".to_owned()),
            Content::NormalObjectSpace => Some("normal".to_owned()),
            Content::TangentObjectSpace => Some("tangent".to_owned()),
            Content::BinormalObjectSpace => Some("binormal".to_owned()),
            Content::BlendWeights => Some("blendWeights".to_owned()),
            Content::BlendIndices => Some("blendIndices".to_owned()),
            Content::ColorDiffuse => Some("colour".to_owned()),
            Content::ColorSpecular => Some("secondary_colour".to_owned()),
            Content::TextureCoordinate(n) if n < 8 => Some(format!("uv{n}")),
            _ => None,
        };
        if let Some(name) = by_content {
            return Ok(name);
        }

        let index = parameter.index();
        let by_semantic = match parameter.semantic() {
            Semantic::Position => Some("vertex".to_owned()),
            Semantic::Normal => Some("normal".to_owned()),
            Semantic::Tangent => Some("tangent".to_owned()),
            Semantic::Binormal => Some("binormal".to_owned()),
            Semantic::BlendWeights => Some("blendWeights".to_owned()),
            Semantic::BlendIndices => Some("blendIndices".to_owned()),
            Semantic::Color if index == 0 => Some("colour".to_owned()),
            Semantic::Color if index == 1 => Some("secondary_colour".to_owned()),
            Semantic::TextureCoordinates if index < 8 => Some(format!("uv{index}")),
            _ => None,
        };
        by_semantic.ok_or_else(|| Error::MissingSemanticMapping {
            language: self.language,
            name: parameter.name().to_owned(),
            semantic: parameter.semantic(),
        })
    }

    /// Name an output is written under, and whether it is a built-in needing no declaration.
    ///
    /// Fragment colour outputs never keep their own name: after input synchronisation a
    /// fragment input may already be called `oColor_0`.
    fn output_name(&self, program: &Program, parameter: &ParameterRef) -> (String, bool) {
        match (program.ty(), parameter.semantic()) {
            (ProgramType::Vertex, Semantic::Position) => ("gl_Position".to_owned(), true),
            (ProgramType::Fragment, Semantic::Color) => {
                let colour_outputs = program
                    .entry_function()
                    .outputs()
                    .iter()
                    .filter(|p| p.semantic() == Semantic::Color)
                    .count();
                let single = colour_outputs == 1 && parameter.index() == 0;
                let index = parameter.index();
                match (self.modern(), single) {
                    (false, true) => ("gl_FragColor".to_owned(), true),
                    (false, false) => (format!("gl_FragData[{index}]"), true),
                    (true, true) => ("fragColour".to_owned(), false),
                    (true, false) => (format!("fragColour{index}"), false),
                }
            }
            _ => (parameter.name().to_owned(), false),
        }
    }

    /// Writes a whole program. `library` is inserted where the dependencies go. Nothing is
    /// appended to `os` when an error is returned.
    pub fn write_program(&self, os: &mut String, program: &Program, library: &str) -> Result<()> {
        let mut source = String::new();
        self.render_program(&mut source, program, library)?;
        os.push_str(&source);
        Ok(())
    }

    fn render_program(&self, os: &mut String, program: &Program, library: &str) -> Result<()> {
        program.validate()?;

        self.write_version(os);
        write_program_title(os, program, self.language);

        write_section_title(os, "PROGRAM DEPENDENCIES");
        os.push_str(library);

        write_section_title(os, "GLOBAL PARAMETERS");
        for uniform in program.uniforms() {
            let ty = self.type_of(uniform.ty())?;
            let _ = write!(os, "uniform\t{ty}\t{}", uniform.name());
            if let Some(size) = uniform.array_size() {
                let _ = write!(os, "[{size}]");
            }
            os.push_str(";\n");
        }

        write_section_title(os, "MAIN");
        let mut names = NameMap::new(*self);
        let main = program.entry_function();
        let (input_qualifier, output_qualifier) = match (program.ty(), self.modern()) {
            (_, true) => ("in", "out"),
            (ProgramType::Vertex, false) => ("attribute", "varying"),
            (_, false) => ("varying", "varying"),
        };

        for input in main.inputs() {
            let ty = self.type_of(input.ty())?;
            let name = match program.ty() {
                ProgramType::Vertex => {
                    let name = self.vertex_input_name(input)?;
                    names.insert(input, name.clone())?;
                    name
                }
                _ => input.name().to_owned(),
            };
            let _ = writeln!(os, "{input_qualifier} {ty} {name};");
        }
        for output in main.outputs() {
            let ty = self.type_of(output.ty())?;
            if program.ty() == ProgramType::Fragment && output.semantic() != Semantic::Color {
                return Err(Error::MissingSemanticMapping {
                    language: self.language,
                    name: output.name().to_owned(),
                    semantic: output.semantic(),
                });
            }
            let (name, builtin) = self.output_name(program, output);
            if !builtin {
                let _ = writeln!(os, "{output_qualifier} {ty} {name};");
            }
            names.insert(output, name)?;
        }

        let _ = writeln!(os, "\n// {}", main.description());
        os.push_str("void main()\n{\n");
        for local in main.locals() {
            let ty = self.type_of(local.ty())?;
            let _ = writeln!(os, "\t{ty}\t{};", local.name());
        }
        os.push('\n');

        for atom in main.atoms() {
            for operand in atom.operands() {
                names.copy_if_written_input(os, main.inputs(), operand)?;
            }
            write_atom(os, atom, &names)?;
        }
        os.push_str("}\n\n");
        Ok(())
    }
}

/// Emitted names of parameters, keyed by parameter identity.
struct NameMap {
    dialect: GlslDialect,
    names: Vec<(ParameterRef, String)>,
    copied: Vec<ParameterRef>,
}

impl NameMap {
    fn new(dialect: GlslDialect) -> Self {
        Self {
            dialect,
            names: Vec::new(),
            copied: Vec::new(),
        }
    }

    /// Records the emitted name of `parameter`. Two parameters may not share one name.
    fn insert(&mut self, parameter: &ParameterRef, name: String) -> Result<()> {
        if let Some((other, _)) = self.names.iter().find(|(_, n)| *n == name) {
            return Err(Error::DuplicateInterfaceName {
                language: self.dialect.language,
                name,
                first: other.name().to_owned(),
                second: parameter.name().to_owned(),
            });
        }
        self.names.push((parameter.clone(), name));
        Ok(())
    }

    fn copy_if_written_input(
        &mut self,
        os: &mut String,
        inputs: &[ParameterRef],
        operand: &Operand,
    ) -> Result<()> {
        let parameter = operand.parameter();
        if !operand.semantic().is_write()
            || !contains(inputs, parameter)
            || contains(&self.copied, parameter)
        {
            return Ok(());
        }
        let ty = self.dialect.type_of(parameter.ty())?;
        let current = self.parameter_name(parameter);
        let local = format!("local_{}", parameter.name());
        let _ = writeln!(os, "\t{ty} {local} = {current};");
        self.copied.push(parameter.clone());
        self.names.retain(|(p, _)| !same(p, parameter));
        self.insert(parameter, local)
    }
}

impl AtomSyntax for NameMap {
    fn parameter_name(&self, parameter: &ParameterRef) -> String {
        self.names
            .iter()
            .find(|(p, _)| same(p, parameter))
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| parameter.name().to_owned())
    }

    fn float_vector_type(&self, count: usize) -> &'static str {
        ["float", "vec2", "vec3", "vec4"][count.clamp(1, 4) - 1]
    }

    fn transform(&self, matrix: &str, vector: &str) -> String {
        format!("{matrix} * {vector}")
    }

    fn sample_function(&self, sampler: GpuConstantType) -> Option<&'static str> {
        self.dialect.sample_function(sampler)
    }
}

/// Desktop GLSL writer. Libraries are referenced with `#include`.
#[derive(Debug, Clone)]
pub struct GlslProgramWriter {
    dialect: GlslDialect,
}

impl GlslProgramWriter {
    pub fn new(options: &ShaderGenOptions) -> Self {
        Self {
            dialect: GlslDialect {
                language: LANGUAGE,
                version: options.glsl_version,
                es: false,
            },
        }
    }

    pub fn type_name(&self, ty: GpuConstantType) -> Option<&'static str> {
        self.dialect.type_name(ty)
    }
}

impl ProgramWriter for GlslProgramWriter {
    fn target_language(&self) -> &'static str {
        LANGUAGE
    }

    fn write_source_code(&mut self, os: &mut String, program: &Program) -> Result<()> {
        let mut includes = String::new();
        for dependency in program.dependencies() {
            let _ = writeln!(includes, "#include \"{dependency}.{LANGUAGE}\"");
        }
        self.dialect.write_program(os, program, &includes)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GlslProgramWriterFactory;

impl ProgramWriterFactory for GlslProgramWriterFactory {
    fn target_language(&self) -> &'static str {
        LANGUAGE
    }

    fn create(
        &self,
        options: &ShaderGenOptions,
        _library: Rc<dyn ShaderLibrarySource>,
    ) -> Box<dyn ProgramWriter> {
        Box::new(GlslProgramWriter::new(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::{AtomOp, FunctionInvocation, GroupOrder};
    use crate::operand::{OperandMask, OperandSemantic};
    use crate::parameter::Variability;

    fn textured_fragment() -> Program {
        let mut program = Program::new(ProgramType::Fragment);
        let sampler = program
            .resolve_parameter(
                GpuConstantType::Sampler2D,
                0,
                Variability::GLOBAL,
                "gTextureSampler0",
                None,
            )
            .unwrap();
        let main = program.entry_function_mut();
        let uv = main
            .resolve_input_parameter(
                Semantic::TextureCoordinates,
                Some(0),
                Content::TextureCoordinate(0),
                GpuConstantType::Float2,
            )
            .unwrap();
        let out = main
            .resolve_output_parameter(
                Semantic::Color,
                Some(0),
                Content::Unknown,
                GpuConstantType::Float4,
            )
            .unwrap();
        main.add_atom_instance(
            FunctionInvocation::new(AtomOp::Sample, GroupOrder::PS_SAMPLING, 0)
                .with_operand(&sampler, OperandSemantic::In, OperandMask::ALL)
                .with_operand(&uv, OperandSemantic::In, OperandMask::ALL)
                .with_operand(&out, OperandSemantic::Out, OperandMask::ALL),
        );
        program
    }

    #[test]
    fn legacy_fragment_uses_builtin_outputs() {
        let mut os = String::new();
        GlslProgramWriter::new(&ShaderGenOptions::default())
            .write_source_code(&mut os, &textured_fragment())
            .unwrap();
        assert!(os.starts_with("#version 120\n"), "{os}");
        assert!(os.contains("varying vec2 iTexcoord_0;\n"), "{os}");
        assert!(!os.contains("oColor_0"), "{os}");
        assert!(
            os.contains("\tgl_FragColor = texture2D(gTextureSampler0, iTexcoord_0);\n"),
            "{os}"
        );
    }

    #[test]
    fn modern_fragment_declares_outputs() {
        let mut options = ShaderGenOptions::default();
        options.glsl_version = 150;
        let mut os = String::new();
        GlslProgramWriter::new(&options)
            .write_source_code(&mut os, &textured_fragment())
            .unwrap();
        assert!(os.contains("in vec2 iTexcoord_0;\n"), "{os}");
        assert!(os.contains("out vec4 fragColour;\n"), "{os}");
        assert!(
            os.contains("\tfragColour = texture(gTextureSampler0, iTexcoord_0);\n"),
            "{os}"
        );
    }

    #[test]
    fn vertex_inputs_are_named_by_content() {
        let dialect = GlslDialect {
            language: LANGUAGE,
            version: 120,
            es: false,
        };
        let named = |semantic, index, content| {
            let p = crate::parameter::Parameter::input(
                semantic,
                index,
                content,
                GpuConstantType::Float4,
            );
            dialect.vertex_input_name(&p)
        };
        assert_eq!(
            named(Semantic::Position, 0, Content::PositionObjectSpace).unwrap(),
            "vertex"
        );
        assert_eq!(
            named(Semantic::Color, 1, Content::ColorSpecular).unwrap(),
            "secondary_colour"
        );
        assert_eq!(
            named(Semantic::TextureCoordinates, 5, Content::Unknown).unwrap(),
            "uv5"
        );
        assert!(matches!(
            named(Semantic::Color, 2, Content::Unknown),
            Err(Error::MissingSemanticMapping { .. })
        ));
    }

    #[test]
    fn colliding_attribute_names_are_rejected() {
        let mut program = Program::new(ProgramType::Vertex);
        let main = program.entry_function_mut();
        for (index, content) in [(0, Content::TextureCoordinate(1)), (1, Content::Unknown)] {
            main.resolve_input_parameter(
                Semantic::TextureCoordinates,
                Some(index),
                content,
                GpuConstantType::Float2,
            )
            .unwrap();
        }
        let mut os = String::new();
        let err = GlslProgramWriter::new(&ShaderGenOptions::default())
            .write_source_code(&mut os, &program)
            .unwrap_err();
        assert!(
            matches!(
                &err,
                Error::DuplicateInterfaceName { name, first, second, .. }
                    if name == "uv1" && first == "iTexcoord_0" && second == "iTexcoord_1"
            ),
            "{err}"
        );
        assert!(os.is_empty(), "{os}");
    }

    #[test]
    fn every_type_has_a_desktop_mapping() {
        let writer = GlslProgramWriter::new(&ShaderGenOptions::default());
        for ty in GpuConstantType::ALL {
            assert!(writer.type_name(ty).is_some(), "{ty:?}");
        }
    }
}
