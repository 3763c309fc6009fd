//! Error taxonomy for program construction and buffer operations.

use thiserror::Error;

/// Convenience alias used by every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes surfaced by the resource core.
///
/// Nothing here is retried internally: every variant reports a caller or
/// environment defect detected synchronously by the call that failed.
/// Deletion paths never produce an error.
#[derive(Debug, Error)]
pub enum Error {
    /// The owning context has been torn down; the back-reference could not
    /// be upgraded and no native call can be made safely.
    #[error("the owning context is no longer alive")]
    ContextLost,

    /// The native allocator returned the 0 "no object" sentinel.
    #[error("failed to create a native {0} object")]
    ObjectCreation(&'static str),

    /// The native compiler rejected the shader source. Carries the raw
    /// compiler log and the source annotated with 1-based line numbers so
    /// error locations are immediately correlatable.
    #[error("shader compilation failed:\n{log}\n{listing}")]
    Compile {
        /// Raw info log from the native compiler.
        log: String,
        /// The rejected source, one line per line, numbered `001: ...`.
        listing: String,
    },

    /// The native linker rejected the program. Carries the program info log.
    #[error("program link failed: {0}")]
    Link(String),

    /// No active uniform or uniform block with the given name.
    #[error("no uniform or uniform block named `{0}`")]
    UniformNotFound(String),

    /// An active uniform has a type this crate cannot marshal.
    #[error("uniform `{name}` has unsupported type 0x{gl_type:04x}")]
    UnsupportedUniform {
        /// Uniform name as reported by the native API.
        name: String,
        /// Raw GL type enum.
        gl_type: u32,
    },

    /// A value passed to a uniform setter has the wrong shape for the
    /// uniform's declared type.
    #[error("value for `{name}` has {got} components, expected {expected}")]
    UniformValueSize {
        /// Uniform name.
        name: String,
        /// Component count the declared type requires.
        expected: usize,
        /// Component count the caller supplied.
        got: usize,
    },

    /// A uniform block's binding was assigned something other than a
    /// non-negative binding point index.
    #[error("uniform block `{0}` takes a binding point index, not a component value")]
    InvalidBlockBinding(String),

    /// A byte range falls outside the valid extent of a buffer.
    #[error("{what}: {requested} bytes at offset {offset} exceed buffer size {available}")]
    OutOfRange {
        /// Which operation rejected the range.
        what: &'static str,
        /// Requested length in bytes.
        requested: usize,
        /// Requested starting offset.
        offset: usize,
        /// The buffer's current byte size.
        available: usize,
    },

    /// Buffer construction was given neither data nor a positive reserve
    /// size.
    #[error("buffer needs content: supply non-empty data or a positive reserve size")]
    EmptyBuffer,
}
