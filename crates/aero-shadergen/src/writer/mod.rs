//! Program writers: serialisation of a [`Program`] into target shading language source.
//!
//! Writers are created through a [`ProgramWriterManager`], which maps target language names to
//! [`ProgramWriterFactory`] instances. All writers share the atom lowering in this module and
//! differ in declaration syntax, type names and a handful of operator spellings.

mod glsl;
mod glsles;
mod hlsl;

use std::collections::BTreeMap;
use std::fmt::Write;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::invocation::{AtomOp, FunctionInvocation};
use crate::library::ShaderLibrarySource;
use crate::operand::{Operand, OperandSemantic};
use crate::options::ShaderGenOptions;
use crate::parameter::{GpuConstantType, ParameterRef};
use crate::program::{Program, ProgramType};

pub use glsl::{GlslProgramWriter, GlslProgramWriterFactory};
pub use glsles::{GlslEsProgramWriter, GlslEsProgramWriterFactory};
pub use hlsl::{HlslProgramWriter, HlslProgramWriterFactory};

pub trait ProgramWriter {
    fn target_language(&self) -> &'static str;

    /// Appends the source text of `program` to `os`.
    fn write_source_code(&mut self, os: &mut String, program: &Program) -> Result<()>;
}

pub trait ProgramWriterFactory {
    fn target_language(&self) -> &'static str;

    fn create(
        &self,
        options: &ShaderGenOptions,
        library: Rc<dyn ShaderLibrarySource>,
    ) -> Box<dyn ProgramWriter>;
}

/// Registry of writer factories keyed by target language.
pub struct ProgramWriterManager {
    factories: BTreeMap<&'static str, Box<dyn ProgramWriterFactory>>,
}

impl Default for ProgramWriterManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramWriterManager {
    /// Manager with the built-in `hlsl`, `glsl` and `glsles` writers registered.
    pub fn new() -> Self {
        let mut manager = Self::empty();
        manager.add_factory(Box::new(HlslProgramWriterFactory));
        manager.add_factory(Box::new(GlslProgramWriterFactory));
        manager.add_factory(Box::new(GlslEsProgramWriterFactory));
        manager
    }

    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registers `factory`, replacing any factory for the same language.
    pub fn add_factory(&mut self, factory: Box<dyn ProgramWriterFactory>) {
        self.factories.insert(factory.target_language(), factory);
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        self.factories.contains_key(language)
    }

    pub fn languages(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn create_program_writer(
        &self,
        language: &str,
        options: &ShaderGenOptions,
        library: Rc<dyn ShaderLibrarySource>,
    ) -> Result<Box<dyn ProgramWriter>> {
        let factory = self
            .factories
            .get(language)
            .ok_or_else(|| Error::UnknownLanguage(language.to_owned()))?;
        tracing::debug!(language, "creating program writer");
        Ok(factory.create(options, library))
    }
}

pub(crate) const SEPARATOR: &str =
    "//-----------------------------------------------------------------------------";

pub(crate) fn program_type_name(ty: ProgramType) -> &'static str {
    match ty {
        ProgramType::Vertex => "Vertex Program",
        ProgramType::Fragment => "Fragment Program",
        ProgramType::Geometry => "Geometry Program",
    }
}

pub(crate) fn write_program_title(os: &mut String, program: &Program, language: &str) {
    let _ = writeln!(os, "{SEPARATOR}");
    let _ = writeln!(os, "// Program Type: {}", program_type_name(program.ty()));
    let _ = writeln!(os, "// Language: {language}");
    let _ = writeln!(os, "// Created by aero-shadergen. DO NOT MODIFY");
    let _ = writeln!(os, "{SEPARATOR}");
}

pub(crate) fn write_section_title(os: &mut String, title: &str) {
    let _ = writeln!(os, "\n{SEPARATOR}");
    let _ = writeln!(os, "//                         {title}");
    let _ = writeln!(os, "{SEPARATOR}");
}

/// Target specific spellings used by [`write_atom`].
pub(crate) trait AtomSyntax {
    /// Name used for `parameter` in statements.
    fn parameter_name(&self, parameter: &ParameterRef) -> String;

    /// Constructor name of a float vector type with `count` components.
    fn float_vector_type(&self, count: usize) -> &'static str;

    fn transform(&self, matrix: &str, vector: &str) -> String;

    fn sample_function(&self, sampler: GpuConstantType) -> Option<&'static str>;
}

/// Renders one operand chain: the head operand plus the operands indexing it.
fn render_chain(
    operands: &[Operand],
    level: u16,
    syntax: &dyn AtomSyntax,
) -> (String, usize) {
    let head = &operands[0];
    let parameter = head.parameter();
    let mut expr = match parameter.const_value() {
        Some(value) => value.render(syntax.float_vector_type(value.components().len())),
        None => syntax.parameter_name(parameter),
    };

    let mut used = 1;
    while used < operands.len() && operands[used].indirection_level() == level + 1 {
        let (index, consumed) = render_chain(&operands[used..], level + 1, syntax);
        expr = format!("{expr}[int({index})]");
        used += consumed;
    }

    let scalar_literal = parameter
        .const_value()
        .is_some_and(|value| value.components().len() == 1);
    if let (Some(swizzle), false) = (head.mask().swizzle(), scalar_literal) {
        expr = format!("{expr}.{swizzle}");
    }
    (expr, used)
}

/// An atom operand after indirection grouping.
pub(crate) struct RenderedOperand<'a> {
    pub operand: &'a Operand,
    pub text: String,
}

pub(crate) fn render_operands<'a>(
    atom: &'a FunctionInvocation,
    syntax: &dyn AtomSyntax,
) -> Vec<RenderedOperand<'a>> {
    let operands = atom.operands();
    let mut rendered = Vec::with_capacity(operands.len());
    let mut i = 0;
    while i < operands.len() {
        let (text, used) = render_chain(&operands[i..], operands[i].indirection_level(), syntax);
        rendered.push(RenderedOperand {
            operand: &operands[i],
            text,
        });
        i += used;
    }
    rendered
}

/// Writes the statement for `atom`, one line, tab indented.
pub(crate) fn write_atom(
    os: &mut String,
    atom: &FunctionInvocation,
    syntax: &dyn AtomSyntax,
) -> Result<()> {
    let operands = render_operands(atom, syntax);

    if let AtomOp::Call(name) = atom.op() {
        let args: Vec<&str> = operands.iter().map(|op| op.text.as_str()).collect();
        let _ = writeln!(os, "\t{name}({});", args.join(", "));
        return Ok(());
    }

    let invalid = |reason: &'static str| Error::InvalidAtom {
        op: atom.op().to_string(),
        reason,
    };
    let mut destinations = operands
        .iter()
        .filter(|op| op.operand.semantic() == OperandSemantic::Out);
    let dst = destinations
        .next()
        .ok_or_else(|| invalid("missing destination operand"))?;
    if destinations.next().is_some() {
        return Err(invalid("more than one destination operand"));
    }
    let sources: Vec<&RenderedOperand> = operands
        .iter()
        .filter(|op| op.operand.semantic() == OperandSemantic::In)
        .collect();
    if Some(sources.len()) != atom.op().source_count() {
        return Err(invalid("wrong number of source operands"));
    }

    let expr = match atom.op() {
        AtomOp::Assign => sources[0].text.clone(),
        AtomOp::Add => format!("{} + {}", sources[0].text, sources[1].text),
        AtomOp::Subtract => format!("{} - {}", sources[0].text, sources[1].text),
        AtomOp::Modulate => format!("{} * {}", sources[0].text, sources[1].text),
        AtomOp::Transform => syntax.transform(&sources[0].text, &sources[1].text),
        AtomOp::Sample => {
            let sampler = sources[0].operand.parameter().ty();
            let function = syntax
                .sample_function(sampler)
                .ok_or_else(|| invalid("first source is not a sampler"))?;
            format!("{function}({}, {})", sources[0].text, sources[1].text)
        }
        AtomOp::Call(_) => unreachable!("library calls are written above"),
    };
    let _ = writeln!(os, "\t{} = {expr};", dst.text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::GroupOrder;
    use crate::operand::OperandMask;
    use crate::parameter::{ConstValue, Content, Parameter, Semantic, Variability};

    struct TestSyntax;

    impl AtomSyntax for TestSyntax {
        fn parameter_name(&self, parameter: &ParameterRef) -> String {
            parameter.name().to_owned()
        }

        fn float_vector_type(&self, count: usize) -> &'static str {
            ["float", "vec2", "vec3", "vec4"][count - 1]
        }

        fn transform(&self, matrix: &str, vector: &str) -> String {
            format!("{matrix} * {vector}")
        }

        fn sample_function(&self, sampler: GpuConstantType) -> Option<&'static str> {
            sampler.is_sampler().then_some("texture")
        }
    }

    fn write(atom: &FunctionInvocation) -> Result<String> {
        let mut os = String::new();
        write_atom(&mut os, atom, &TestSyntax)?;
        Ok(os)
    }

    #[test]
    fn indirection_indexes_previous_operand() {
        let palette = Parameter::uniform(
            "gPalette",
            GpuConstantType::Matrix3x4,
            0,
            Variability::PER_OBJECT,
            Some(24),
            None,
        );
        let indices = Parameter::input(
            Semantic::BlendIndices,
            0,
            Content::BlendIndices,
            GpuConstantType::Float4,
        );
        let pos = Parameter::input(
            Semantic::Position,
            0,
            Content::PositionObjectSpace,
            GpuConstantType::Float4,
        );
        let out = Parameter::new(
            "lPos",
            GpuConstantType::Float3,
            Semantic::Unknown,
            0,
            Content::Unknown,
        );
        let mut atom = FunctionInvocation::new(AtomOp::Transform, GroupOrder::VS_TRANSFORM, 0);
        atom.push_operand(palette, OperandSemantic::In, OperandMask::ALL, 0)
            .push_operand(indices, OperandSemantic::In, OperandMask::X, 1)
            .push_operand(pos, OperandSemantic::In, OperandMask::ALL, 0)
            .push_operand(out, OperandSemantic::Out, OperandMask::ALL, 0);
        assert_eq!(
            write(&atom).unwrap(),
            "\tlPos = gPalette[int(iBlendIndices_0.x)] * iPos_0;\n"
        );
    }

    #[test]
    fn literals_are_inlined() {
        let dst = Parameter::new(
            "lColour",
            GpuConstantType::Float4,
            Semantic::Unknown,
            0,
            Content::Unknown,
        );
        let atom = FunctionInvocation::new(AtomOp::Modulate, GroupOrder::PS_COLOUR_END, 0)
            .with_operand(
                &Parameter::constant(ConstValue::Vec4([1.0, 1.0, 1.0, 0.5])),
                OperandSemantic::In,
                OperandMask::ALL,
            )
            .with_operand(
                &Parameter::constant(ConstValue::Float(2.0)),
                OperandSemantic::In,
                OperandMask::X,
            )
            .with_operand(&dst, OperandSemantic::Out, OperandMask::ALL);
        assert_eq!(
            write(&atom).unwrap(),
            "\tlColour = vec4(1.0, 1.0, 1.0, 0.5) * 2.0;\n"
        );
    }

    #[test]
    fn malformed_pseudo_ops_are_rejected() {
        let p = Parameter::new(
            "lTmp",
            GpuConstantType::Float4,
            Semantic::Unknown,
            0,
            Content::Unknown,
        );
        let no_dst = FunctionInvocation::new(AtomOp::Assign, GroupOrder::PS_COLOUR_END, 0)
            .with_operand(&p, OperandSemantic::In, OperandMask::ALL);
        assert!(matches!(write(&no_dst), Err(Error::InvalidAtom { .. })));

        let not_sampler = FunctionInvocation::new(AtomOp::Sample, GroupOrder::PS_SAMPLING, 0)
            .with_operand(&p, OperandSemantic::In, OperandMask::ALL)
            .with_operand(&p, OperandSemantic::In, OperandMask::XY)
            .with_operand(&p, OperandSemantic::Out, OperandMask::ALL);
        assert!(matches!(write(&not_sampler), Err(Error::InvalidAtom { .. })));
    }

    #[test]
    fn unknown_language_is_an_error() {
        let manager = ProgramWriterManager::new();
        assert_eq!(
            manager.languages().collect::<Vec<_>>(),
            ["glsl", "glsles", "hlsl"]
        );
        let library: Rc<dyn ShaderLibrarySource> =
            Rc::new(crate::library::MemoryLibrarySource::new());
        let err = manager
            .create_program_writer("cg", &ShaderGenOptions::default(), library)
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownLanguage(lang) if lang == "cg"));
    }
}
