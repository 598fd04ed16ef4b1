use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::invocation::AtomOp;
use crate::library::{parse_library, LibraryFunction, ParsedLibrary, ShaderLibrarySource};
use crate::options::ShaderGenOptions;
use crate::parameter::GpuConstantType;
use crate::program::{Program, ProgramType};

use super::glsl::GlslDialect;
use super::{ProgramWriter, ProgramWriterFactory};

const LANGUAGE: &str = "glsles";

/// GLSL ES writer.
///
/// GLSL ES has no include mechanism, so the library functions a program calls are copied into
/// it: only the transitively called subset, callees before callers, with the libraries'
/// `#define`s hoisted above them. Parsed libraries are cached for the lifetime of the writer.
pub struct GlslEsProgramWriter {
    dialect: GlslDialect,
    library: Rc<dyn ShaderLibrarySource>,
    cache: HashMap<String, ParsedLibrary>,
}

impl GlslEsProgramWriter {
    pub fn new(options: &ShaderGenOptions, library: Rc<dyn ShaderLibrarySource>) -> Self {
        Self {
            dialect: GlslDialect {
                language: LANGUAGE,
                version: options.glsles_version,
                es: true,
            },
            library,
            cache: HashMap::new(),
        }
    }

    pub fn type_name(&self, ty: GpuConstantType) -> Option<&'static str> {
        self.dialect.type_name(ty)
    }

    fn load(&mut self, dependency: &str) -> Result<&ParsedLibrary> {
        if !self.cache.contains_key(dependency) {
            let file = format!("{dependency}.{LANGUAGE}");
            let reader = self.library.open(&file)?;
            let parsed = parse_library(&file, reader)?;
            debug!(
                library = %file,
                functions = parsed.functions.len(),
                defines = parsed.defines.len(),
                "loaded shader library"
            );
            self.cache.insert(dependency.to_owned(), parsed);
        }
        self.cache
            .get(dependency)
            .ok_or_else(|| Error::LibraryNotFound(dependency.to_owned()))
    }

    /// Library text for `program`: hoisted defines, prototypes, then definitions.
    fn extract_functions(&mut self, program: &Program) -> Result<String> {
        for dependency in program.dependencies() {
            self.load(dependency)?;
        }

        let mut defines: Vec<&str> = Vec::new();
        let mut functions: HashMap<&str, Vec<&LibraryFunction>> = HashMap::new();
        for dependency in program.dependencies() {
            let Some(library) = self.cache.get(dependency) else {
                continue;
            };
            for define in &library.defines {
                if !defines.contains(&define.as_str()) {
                    defines.push(define);
                }
            }
            for function in &library.functions {
                functions
                    .entry(function.name.as_str())
                    .or_default()
                    .push(function);
            }
        }

        let mut order: Vec<&str> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        for atom in program.entry_function().atoms() {
            let AtomOp::Call(name) = atom.op() else {
                continue;
            };
            if !functions.contains_key(name.as_str()) {
                if visited.insert(name.as_str()) {
                    warn!(function = %name, "function not found in shader libraries");
                }
                continue;
            }
            visit(name, &functions, &mut visited, &mut order);
        }

        let mut os = String::new();
        for define in &defines {
            let _ = writeln!(os, "{define}");
        }
        if !defines.is_empty() {
            os.push('\n');
        }
        for name in &order {
            for function in &functions[name] {
                let _ = writeln!(os, "{};", function.prototype);
            }
        }
        if !order.is_empty() {
            os.push('\n');
        }
        for name in &order {
            for function in &functions[name] {
                let _ = writeln!(os, "{}\n", function.definition());
            }
        }
        Ok(os)
    }
}

/// Post-order walk of the call graph, so callees land before their callers.
fn visit<'a>(
    name: &'a str,
    functions: &HashMap<&'a str, Vec<&'a LibraryFunction>>,
    visited: &mut HashSet<&'a str>,
    order: &mut Vec<&'a str>,
) {
    let Some((&key, overloads)) = functions.get_key_value(name) else {
        return;
    };
    if !visited.insert(key) {
        return;
    }
    for function in overloads.iter().copied() {
        for call in &function.calls {
            if call != key {
                visit(call, functions, visited, order);
            }
        }
    }
    order.push(key);
}

impl ProgramWriter for GlslEsProgramWriter {
    fn target_language(&self) -> &'static str {
        LANGUAGE
    }

    fn write_source_code(&mut self, os: &mut String, program: &Program) -> Result<()> {
        if program.ty() == ProgramType::Geometry {
            return Err(Error::UnsupportedProgramType {
                language: LANGUAGE,
                program_type: program.ty(),
            });
        }
        let library = self.extract_functions(program)?;
        self.dialect.write_program(os, program, &library)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GlslEsProgramWriterFactory;

impl ProgramWriterFactory for GlslEsProgramWriterFactory {
    fn target_language(&self) -> &'static str {
        LANGUAGE
    }

    fn create(
        &self,
        options: &ShaderGenOptions,
        library: Rc<dyn ShaderLibrarySource>,
    ) -> Box<dyn ProgramWriter> {
        Box::new(GlslEsProgramWriter::new(options, library))
    }
}
