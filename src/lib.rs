//! Compute-program and byte-buffer lifecycle over a raw OpenGL context.
//!
//! This crate manages two GPU resource types on top of the stateful-binding
//! OpenGL API: a compute [`Program`] (compile, link, uniform introspection,
//! dispatch) and a byte [`Buffer`] (read, write, GPU-side copy, orphaning,
//! indexed binds). It does not create windows or contexts, render, or manage
//! textures — an active context is assumed, reached through the [`GlApi`]
//! seam.
//!
//! # Overview
//!
//! - [`Context`] owns the backend handle, the explicit binding table, the
//!   allocation counters, and the cleanup policy ([`GcMode`]).
//! - [`Program`] is a linked compute kernel with name-indexed uniform and
//!   uniform-block access.
//! - [`Buffer`] is GPU-resident byte storage with range-validated reads and
//!   GPU-side copies.
//! - [`Uniform`] / [`UniformBlock`] are the value-binding descriptors
//!   introspection produces; [`UniformValue`] is the host-side value type.
//! - [`RawGl`] implements [`GlApi`] over the `gl` crate for production use.
//!
//! # Cleanup
//!
//! Native deletion timing is an explicit policy on the context, not a
//! language finalizer: immediate on drop ([`GcMode::Auto`]), deferred to
//! [`Context::gc`] ([`GcMode::ContextGc`], the default), or suppressed
//! entirely for contexts being torn down ([`GcMode::None`]). Explicit
//! `delete()` and drop are both idempotent.
//!
//! # Example
//!
//! ```rust,no_run
//! use glcore::{BufferSource, BufferUsage, Context, RawGl, UniformValue};
//!
//! # fn main() -> glcore::Result<()> {
//! // An OpenGL context must already be current on this thread.
//! let ctx = Context::new(RawGl::load());
//!
//! let program = ctx.program(
//!     "#version 430\n\
//!      layout(local_size_x = 64) in;\n\
//!      uniform float scale;\n\
//!      layout(std430, binding = 0) buffer Data { float values[]; };\n\
//!      void main() { values[gl_GlobalInvocationID.x] *= scale; }\n",
//! )?;
//!
//! let buffer = ctx.buffer(BufferSource::Reserve(1024), BufferUsage::Dynamic)?;
//! buffer.bind_to_storage_buffer(0, 0, None)?;
//!
//! program.set("scale", &UniformValue::Float(2.0))?;
//! program.run(4, 1, 1)?;
//!
//! let results = buffer.read(None, 0)?;
//! # let _ = results;
//! ctx.gc();
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod buffer;
pub mod context;
pub mod error;
pub mod program;
pub mod uniform;

pub use api::{GlApi, RawGl, NO_OBJECT};
pub use buffer::{Buffer, BufferSource, BufferUsage};
pub use context::{Context, ContextStats, GcMode, ResourceKind};
pub use error::{Error, Result};
pub use program::Program;
pub use uniform::{Uniform, UniformBlock, UniformValue};
