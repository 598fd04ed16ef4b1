use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::error::Result;
use crate::library::{DirectoryLibrarySource, ShaderLibrarySource};
use crate::options::ShaderGenOptions;
use crate::processor::ProgramProcessor;
use crate::program::ProgramSet;
use crate::render_state::TargetRenderState;
use crate::writer::{ProgramWriter, ProgramWriterManager};

/// Source text generated for one program set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedShaders {
    pub language: String,
    pub vertex_source: String,
    pub fragment_source: String,
}

/// Everything needed to turn program sets into source text: options, the writer registry, the
/// library source, and the writers created so far (which keep their library caches).
///
/// Contexts hold `Rc`s and are not `Send`; generate on several threads with one context each.
pub struct GenerationContext {
    options: ShaderGenOptions,
    writers: ProgramWriterManager,
    library: Rc<dyn ShaderLibrarySource>,
    writer_cache: HashMap<String, Box<dyn ProgramWriter>>,
}

impl GenerationContext {
    pub fn new(options: ShaderGenOptions, library: Rc<dyn ShaderLibrarySource>) -> Self {
        Self {
            options,
            writers: ProgramWriterManager::new(),
            library,
            writer_cache: HashMap::new(),
        }
    }

    /// Context reading the FFP libraries shipped with this crate.
    pub fn with_bundled_libraries(options: ShaderGenOptions) -> Self {
        Self::new(options, Rc::new(DirectoryLibrarySource::bundled()))
    }

    pub fn options(&self) -> &ShaderGenOptions {
        &self.options
    }

    /// Replaces the options. Cached writers are dropped since they captured the old ones.
    pub fn set_options(&mut self, options: ShaderGenOptions) {
        self.options = options;
        self.writer_cache.clear();
    }

    pub fn writer_manager_mut(&mut self) -> &mut ProgramWriterManager {
        self.writer_cache.clear();
        &mut self.writers
    }

    fn writer(&mut self, language: &str) -> Result<&mut Box<dyn ProgramWriter>> {
        match self.writer_cache.entry(language.to_owned()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let writer = self.writers.create_program_writer(
                    language,
                    &self.options,
                    self.library.clone(),
                )?;
                Ok(entry.insert(writer))
            }
        }
    }

    /// Processes `set` for the configured target language and writes both programs.
    pub fn generate(&mut self, set: &mut ProgramSet) -> Result<GeneratedShaders> {
        let language = self.options.target_language.clone();
        // Fail on an unknown language before touching the program set.
        self.writer(&language)?;

        set.sort_atom_instances();
        ProgramProcessor::new(&self.options).pre_create_gpu_programs(set, &language)?;
        set.sort_atom_instances();

        let writer = self.writer(&language)?;
        let mut vertex_source = String::new();
        writer.write_source_code(&mut vertex_source, set.vertex())?;
        let mut fragment_source = String::new();
        writer.write_source_code(&mut fragment_source, set.fragment())?;

        debug!(
            language = %language,
            vertex_bytes = vertex_source.len(),
            fragment_bytes = fragment_source.len(),
            "generated shaders"
        );
        Ok(GeneratedShaders {
            language,
            vertex_source,
            fragment_source,
        })
    }

    /// Builds the program set of `target` and generates it.
    pub fn generate_render_state(
        &mut self,
        target: &mut TargetRenderState,
    ) -> Result<GeneratedShaders> {
        let mut set = target.create_program_set()?;
        self.generate(&mut set)
    }
}
