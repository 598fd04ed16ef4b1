use std::fs;
use std::io::Cursor;
use std::rc::Rc;

use aero_shadergen::library::parse_library;
use aero_shadergen::writer::GlslEsProgramWriter;
use aero_shadergen::{
    AtomOp, Content, DirectoryLibrarySource, Error, FunctionInvocation, GpuConstantType,
    GroupOrder, MemoryLibrarySource, OperandMask, OperandSemantic, Program, ProgramType,
    ProgramWriter, Semantic, ShaderGenOptions, ShaderLibrarySource,
};
use pretty_assertions::assert_eq;

const CALL_CHAIN: &str = "\
#define GAIN 0.5

// A is called from B only.
void A(inout vec4 c)
{
    c *= GAIN;
}

void B(inout vec4 c)
{
    A(c);
    c = clamp(c, 0.0, 1.0);
}

void C(inout vec4 c)
{
    c = vec4(1.0);
}
";

fn fragment_calling(library: &str, calls: &[&str]) -> Program {
    let mut program = Program::new(ProgramType::Fragment);
    program.add_dependency(library);
    let main = program.entry_function_mut();
    let colour = main
        .resolve_output_parameter(
            Semantic::Color,
            Some(0),
            Content::Unknown,
            GpuConstantType::Float4,
        )
        .unwrap();
    for (order, name) in calls.iter().enumerate() {
        main.add_atom_instance(
            FunctionInvocation::new(AtomOp::call(*name), GroupOrder::PS_COLOUR_END, order as i32)
                .with_operand(&colour, OperandSemantic::InOut, OperandMask::ALL),
        );
    }
    program
}

#[test]
fn callees_are_declared_before_callers_once() {
    let source = MemoryLibrarySource::new().with_file("Chain.glsles", CALL_CHAIN);
    let mut writer = GlslEsProgramWriter::new(&ShaderGenOptions::default(), Rc::new(source));
    let mut os = String::new();
    writer
        .write_source_code(&mut os, &fragment_calling("Chain", &["B", "B"]))
        .unwrap();

    assert_eq!(os.matches("#define GAIN 0.5\n").count(), 1, "{os}");
    assert_eq!(os.matches("void A(inout vec4 c);\n").count(), 1, "{os}");
    assert_eq!(os.matches("void B(inout vec4 c);\n").count(), 1, "{os}");
    assert!(!os.contains("void C("), "{os}");

    let define = os.find("#define GAIN").unwrap();
    let a = os.find("void A(inout vec4 c);").unwrap();
    let b = os.find("void B(inout vec4 c);").unwrap();
    let a_body = os.find("void A(inout vec4 c)\n{").unwrap();
    let b_body = os.find("void B(inout vec4 c)\n{").unwrap();
    assert!(define < a && a < b && b < a_body && a_body < b_body, "{os}");

    assert!(os.contains("\tB(gl_FragColor);\n\tB(gl_FragColor);\n"), "{os}");
}

#[test]
fn libraries_are_read_once_per_writer() {
    use std::cell::Cell;
    use std::io::BufRead;

    struct Counting {
        inner: MemoryLibrarySource,
        opened: Cell<usize>,
    }

    impl ShaderLibrarySource for Counting {
        fn open(&self, name: &str) -> aero_shadergen::Result<Box<dyn BufRead + '_>> {
            self.opened.set(self.opened.get() + 1);
            self.inner.open(name)
        }
    }

    let source = Rc::new(Counting {
        inner: MemoryLibrarySource::new().with_file("Chain.glsles", CALL_CHAIN),
        opened: Cell::new(0),
    });
    let mut writer = GlslEsProgramWriter::new(&ShaderGenOptions::default(), source.clone());
    for calls in [&["A"][..], &["B"][..], &["C", "A"][..]] {
        let mut os = String::new();
        writer
            .write_source_code(&mut os, &fragment_calling("Chain", calls))
            .unwrap();
    }
    assert_eq!(source.opened.get(), 1);
}

#[test]
fn malformed_libraries_are_reported_with_a_line() {
    let cases = [
        ("void f()\n{\n  return;\n", 2, "unclosed '{'"),
        ("void f() { }\n\n}\n", 3, "unexpected '}'"),
        ("/* never closed\nvoid f() {}\n", 1, "unterminated block comment"),
        ("void f(in vec4 a)\n", 1, "declaration without a body"),
    ];
    for (text, expected_line, expected_message) in cases {
        match parse_library("Broken.glsles", Cursor::new(text)) {
            Err(Error::LibraryParse {
                library,
                line,
                message,
            }) => {
                assert_eq!(library, "Broken.glsles");
                assert_eq!((line, message.as_str()), (expected_line, expected_message));
            }
            other => panic!("{text:?}: unexpected result {other:?}"),
        }
    }
}

#[test]
fn directory_source_searches_language_subdirectory_then_root() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("glsles")).unwrap();
    fs::write(dir.path().join("glsles/Nested.glsles"), "void N() {}\n").unwrap();
    fs::write(dir.path().join("Flat.glsles"), "void F() {}\n").unwrap();

    let source = DirectoryLibrarySource::new(dir.path());
    for (name, function) in [("Nested.glsles", "N"), ("Flat.glsles", "F")] {
        let parsed = parse_library(name, source.open(name).unwrap()).unwrap();
        assert_eq!(parsed.functions.len(), 1);
        assert_eq!(parsed.functions[0].name, function);
    }
    assert!(matches!(
        source.open("Missing.glsles"),
        Err(Error::LibraryNotFound(name)) if name == "Missing.glsles"
    ));
}

#[test]
fn bundled_libraries_parse() {
    let source = DirectoryLibrarySource::bundled();
    for language in ["glsles", "glsl", "hlsl"] {
        for library in ["FFPLib_Common", "FFPLib_Transform", "FFPLib_Texturing"] {
            let name = format!("{library}.{language}");
            let parsed = parse_library(&name, source.open(&name).unwrap()).unwrap();
            assert!(!parsed.functions.is_empty(), "{name}");
        }
    }

    let common = parse_library(
        "FFPLib_Common.glsles",
        source.open("FFPLib_Common.glsles").unwrap(),
    )
    .unwrap();
    let modulate: Vec<_> = common
        .functions
        .iter()
        .filter(|f| f.name == "FFP_Modulate")
        .collect();
    assert_eq!(modulate.len(), 2);
    assert_eq!(
        modulate[0].prototype,
        "void FFP_Modulate(in vec4 vIn0, in vec4 vIn1, out vec4 vOut)"
    );
    assert!(modulate[0].calls.iter().any(|c| c == "FFP_Saturate"));
    assert_eq!(common.defines.len(), 2);
}
