//! Shader program cache.
//!
//! Programs are written in WGSL. Each stage is compiled (parsed + validated by
//! naga), the pair is linked (stage interface and resource bindings checked),
//! and the resulting [`LinkedProgram`] is handed to the graphics backend.
//! Attribute/uniform locations are resolved once per program and cached.

mod compile;
mod error;
mod program;
mod sources;

pub use compile::{
    compile_and_link, AttributeInfo, LinkedProgram, ProgramInterface, ResourceInfo, ResourceKind,
    StageSource,
};
pub use error::{ShaderError, Stage};
pub use program::{ProgramCache, ProgramLocations, ShaderBindings, ShaderProgram};
pub use sources::{ShaderSources, DEFAULT_VERTEX, TEXTURED_FRAGMENT};
