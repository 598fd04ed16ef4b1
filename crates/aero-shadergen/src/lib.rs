//! Fixed-function to programmable shader generation.
//!
//! Render state is expressed as a [`ProgramSet`]: one vertex and one fragment [`Program`], each
//! with an entry [`Function`] made of ordered atoms ([`FunctionInvocation`]s) over typed
//! [`Parameter`]s. Sub render states ([`SubRenderState`]) populate the set, the
//! [`ProgramProcessor`] compacts the vertex-to-fragment interpolators, and a
//! [`ProgramWriter`] serialises each program as HLSL, GLSL or GLSL ES.
//!
//! [`GenerationContext`] ties the pieces together:
//!
//! ```no_run
//! use aero_shadergen::{
//!     GenerationContext, RenderStateRegistry, ShaderGenOptions, TargetRenderState,
//! };
//!
//! let registry = RenderStateRegistry::with_ffp_factories();
//! let mut target = TargetRenderState::new();
//! for state in ["FFP_Transform", "FFP_Colour", "FFP_Texturing"] {
//!     target.add_by_name(&registry, state)?;
//! }
//! let options = ShaderGenOptions::default().with_target_language("glsles");
//! let mut context = GenerationContext::with_bundled_libraries(options);
//! let shaders = context.generate_render_state(&mut target)?;
//! println!("{}", shaders.fragment_source);
//! # Ok::<(), aero_shadergen::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod auto_constants;
mod context;
mod error;
pub mod ffp;
mod function;
mod invocation;
pub mod library;
mod operand;
mod options;
mod parameter;
pub mod processor;
mod program;
mod render_state;
pub mod writer;

pub use auto_constants::{AutoConstantDefinition, AutoConstantType, AutoDataKind};
pub use context::{GeneratedShaders, GenerationContext};
pub use error::{Error, Result};
pub use function::Function;
pub use invocation::{AtomOp, FunctionInvocation, GroupOrder};
pub use library::{DirectoryLibrarySource, MemoryLibrarySource, ShaderLibrarySource};
pub use operand::{Operand, OperandMask, OperandSemantic};
pub use options::{
    CompactPolicy, ShaderGenOptions, DEFAULT_MAX_TEXCOORD_FLOATS, DEFAULT_MAX_TEXCOORD_SLOTS,
};
pub use parameter::{
    AutoBinding, ConstValue, Content, GpuConstantType, Parameter, ParameterKind, ParameterRef,
    Semantic, UniformInfo, Variability, MAX_LIGHTS, MAX_TEXTURE_COORDINATE_SETS,
};
pub use processor::{synchronize_fragment_inputs, ProgramProcessor};
pub use program::{Program, ProgramSet, ProgramType};
pub use render_state::{
    RenderStateRegistry, SubRenderState, SubRenderStateFactory, TargetRenderState,
};
pub use writer::{ProgramWriter, ProgramWriterFactory, ProgramWriterManager};
