//! Shader library sources and the library text scanner.
//!
//! Libraries are plain shader source files holding `#define` lines and function definitions.
//! Writers that cannot `#include` them (GLSL ES) copy the functions they need into the generated
//! program; [`parse_library`] splits a library into those pieces.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Provider of shader library files, looked up by file name (`FFPLib_Common.glsles`).
pub trait ShaderLibrarySource {
    fn open(&self, name: &str) -> Result<Box<dyn BufRead + '_>>;
}

/// Libraries stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryLibrarySource {
    root: PathBuf,
}

impl DirectoryLibrarySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The libraries shipped with this crate.
    pub fn bundled() -> Self {
        Self::new(concat!(env!("CARGO_MANIFEST_DIR"), "/media"))
    }
}

impl ShaderLibrarySource for DirectoryLibrarySource {
    fn open(&self, name: &str) -> Result<Box<dyn BufRead + '_>> {
        let extension = name.rsplit('.').next().unwrap_or_default();
        let candidates = [self.root.join(extension).join(name), self.root.join(name)];
        for path in &candidates {
            match File::open(path) {
                Ok(file) => return Ok(Box::new(BufReader::new(file))),
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(Error::LibraryIo {
                        name: name.to_owned(),
                        source,
                    })
                }
            }
        }
        Err(Error::LibraryNotFound(name.to_owned()))
    }
}

/// Libraries held in memory, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryLibrarySource {
    files: HashMap<String, String>,
}

impl MemoryLibrarySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.files.insert(name.into(), source.into());
    }

    pub fn with_file(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }
}

impl ShaderLibrarySource for MemoryLibrarySource {
    fn open(&self, name: &str) -> Result<Box<dyn BufRead + '_>> {
        let source = self
            .files
            .get(name)
            .ok_or_else(|| Error::LibraryNotFound(name.to_owned()))?;
        Ok(Box::new(Cursor::new(source.as_bytes())))
    }
}

/// One function definition found in a library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFunction {
    pub name: String,
    /// `returnType name(params)`, whitespace normalised.
    pub prototype: String,
    /// Body including the outer braces, as written in the library.
    pub body: String,
    /// Identifiers called from the body, in first-call order.
    pub calls: Vec<String>,
}

impl LibraryFunction {
    pub fn definition(&self) -> String {
        format!("{}\n{}", self.prototype, self.body)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLibrary {
    pub defines: Vec<String>,
    pub functions: Vec<LibraryFunction>,
}

const KEYWORDS: &[&str] = &["if", "for", "while", "return", "switch", "do"];

/// Splits library text into defines and function definitions.
///
/// Everything at file scope that is neither a `#define` nor a function definition (other
/// preprocessor lines, global declarations, structs) is skipped.
pub fn parse_library(library: &str, reader: impl BufRead) -> Result<ParsedLibrary> {
    let parse_error = |line: usize, message: &str| Error::LibraryParse {
        library: library.to_owned(),
        line,
        message: message.to_owned(),
    };

    let mut parsed = ParsedLibrary::default();
    // Comment free source, one entry per input line.
    let mut lines: Vec<String> = Vec::new();
    let mut in_block_comment = false;
    let mut block_comment_start = 0;

    for (number, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| Error::LibraryIo {
            name: library.to_owned(),
            source,
        })?;
        let mut clean = String::with_capacity(line.len());
        let mut rest = line.as_str();
        loop {
            if in_block_comment {
                match rest.find("*/") {
                    Some(end) => {
                        rest = &rest[end + 2..];
                        in_block_comment = false;
                    }
                    None => break,
                }
            } else {
                let block = rest.find("/*");
                let comment = rest.find("//");
                match (block, comment) {
                    (Some(b), c) if c.map_or(true, |c| b < c) => {
                        clean.push_str(&rest[..b]);
                        clean.push(' ');
                        rest = &rest[b + 2..];
                        in_block_comment = true;
                        block_comment_start = number + 1;
                    }
                    (_, Some(c)) => {
                        clean.push_str(&rest[..c]);
                        break;
                    }
                    _ => {
                        clean.push_str(rest);
                        break;
                    }
                }
            }
        }

        let trimmed = clean.trim();
        if trimmed.starts_with("#define") {
            parsed.defines.push(trimmed.to_owned());
            clean.clear();
        } else if trimmed.starts_with('#') {
            clean.clear();
        }
        lines.push(clean);
    }
    if in_block_comment {
        return Err(parse_error(block_comment_start, "unterminated block comment"));
    }

    let mut header = String::new();
    let mut body = String::new();
    let mut depth = 0usize;
    let mut block_start = 0;

    for (number, line) in lines.iter().enumerate() {
        let number = number + 1;
        for c in line.chars() {
            match (depth, c) {
                (0, '{') => {
                    let opens = header.matches('(').count();
                    let closes = header.matches(')').count();
                    if opens != closes {
                        return Err(parse_error(number, "unbalanced parentheses in declaration"));
                    }
                    depth = 1;
                    block_start = number;
                    body.clear();
                    body.push('{');
                }
                (0, '}') => return Err(parse_error(number, "unexpected '}'")),
                (0, ';') => header.clear(),
                (0, _) => header.push(c),
                (_, '{') => {
                    depth += 1;
                    body.push(c);
                }
                (_, '}') => {
                    depth -= 1;
                    body.push(c);
                    if depth == 0 {
                        if let Some(function) = parse_function(&header, &body) {
                            parsed.functions.push(function);
                        }
                        header.clear();
                    }
                }
                _ => body.push(c),
            }
        }
        if depth == 0 {
            header.push(' ');
        } else {
            body.push('\n');
        }
    }
    if depth > 0 {
        return Err(parse_error(block_start, "unclosed '{'"));
    }
    if header.contains('(') {
        let line = lines.len();
        return Err(parse_error(line, "declaration without a body"));
    }

    Ok(parsed)
}

fn parse_function(header: &str, body: &str) -> Option<LibraryFunction> {
    let header = header.trim();
    let open = header.find('(')?;
    let close = header.rfind(')')?;
    if !header[close + 1..].trim().is_empty() {
        return None;
    }
    let signature: Vec<&str> = header[..open].split_whitespace().collect();
    let (name, return_type) = signature.split_last()?;
    if return_type.is_empty() || !is_identifier(name) {
        return None;
    }
    let params = header[open + 1..close]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(" ,", ",");

    Some(LibraryFunction {
        name: (*name).to_owned(),
        prototype: format!("{} {name}({params})", return_type.join(" ")),
        body: body.to_owned(),
        calls: called_identifiers(body),
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Identifiers immediately followed by `(`, excluding control flow keywords.
fn called_identifiers(body: &str) -> Vec<String> {
    let mut calls: Vec<String> = Vec::new();
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_alphabetic() || c == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let ident = &body[start..i];
            let mut j = i;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            let preceded_by_dot = start > 0 && bytes[start - 1] == b'.';
            if j < bytes.len()
                && bytes[j] == b'('
                && !preceded_by_dot
                && !KEYWORDS.contains(&ident)
                && !calls.iter().any(|c| c == ident)
            {
                calls.push(ident.to_owned());
            }
        } else if c.is_ascii_digit() {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    calls
}
