//! GPU byte buffer: allocation, read/write/copy, orphaning, and indexed
//! binds.

use std::rc::{Rc, Weak};

use gl::types::{GLenum, GLuint};
use tracing::{debug, trace};

use crate::api::NO_OBJECT;
use crate::context::{Context, ContextInner, ResourceKind};
use crate::error::{Error, Result};

/// Allocation strategy hint passed to the native API. Informational only;
/// it never affects correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferUsage {
    #[default]
    Static,
    Dynamic,
    Stream,
}

impl BufferUsage {
    fn to_gl(self) -> GLenum {
        match self {
            Self::Static => gl::STATIC_DRAW,
            Self::Dynamic => gl::DYNAMIC_DRAW,
            Self::Stream => gl::STREAM_DRAW,
        }
    }
}

/// Initial contents of a new buffer: either host data to upload, or a byte
/// count to reserve. Exactly one, by construction.
#[derive(Debug, Clone, Copy)]
pub enum BufferSource<'a> {
    /// Upload these bytes; the buffer's size is their length.
    Data(&'a [u8]),
    /// Reserve this many bytes without an upload.
    Reserve(usize),
}

/// A contiguous block of GPU-resident byte storage.
///
/// Every data-moving operation rebinds this buffer to the array-buffer
/// target before acting — the native API is stateful-binding, so a
/// bind-plus-operate sequence is logically atomic and the context's
/// [binding table](crate::Context::bound_buffer) tracks the result.
///
/// `size` changes only through [`Buffer::orphan`].
pub struct Buffer {
    handle: GLuint,
    size: usize,
    usage: BufferUsage,
    ctx: Weak<ContextInner>,
}

/// True when `offset + size` fits within `available` without overflowing.
fn range_fits(offset: usize, size: usize, available: usize) -> bool {
    offset.checked_add(size).is_some_and(|end| end <= available)
}

impl Buffer {
    pub(crate) fn new(ctx: &Context, source: BufferSource<'_>, usage: BufferUsage) -> Result<Self> {
        let size = match source {
            BufferSource::Data(data) => data.len(),
            BufferSource::Reserve(reserve) => reserve,
        };
        if size == 0 {
            return Err(Error::EmptyBuffer);
        }

        let inner = ctx.inner();
        let handle = inner.api.create_buffer();
        if handle == NO_OBJECT {
            return Err(Error::ObjectCreation("buffer"));
        }

        inner.bind_array_buffer(handle);
        match source {
            BufferSource::Data(data) => inner.api.buffer_data(Some(data), size, usage.to_gl()),
            BufferSource::Reserve(_) => inner.api.buffer_data(None, size, usage.to_gl()),
        }

        debug!(handle, size, "created buffer");
        inner.stats.borrow_mut().incr(ResourceKind::Buffer);

        Ok(Self {
            handle,
            size,
            usage,
            ctx: ctx.downgrade(),
        })
    }

    /// Native buffer handle.
    pub fn handle(&self) -> GLuint {
        self.handle
    }

    /// Current byte length of the GPU-resident storage.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn ctx(&self) -> Result<Rc<ContextInner>> {
        self.ctx.upgrade().ok_or(Error::ContextLost)
    }

    /// Upgrade the context and rebind self to the array-buffer target.
    fn bind(&self) -> Result<Rc<ContextInner>> {
        let ctx = self.ctx()?;
        ctx.bind_array_buffer(self.handle);
        Ok(ctx)
    }

    /// Read back `size` bytes starting at `offset`. `None` means the
    /// remaining bytes from `offset` to the end of the buffer.
    ///
    /// An empty or out-of-extent range is an error; reading never mutates
    /// the buffer.
    pub fn read(&self, size: Option<usize>, offset: usize) -> Result<Vec<u8>> {
        let size = size.unwrap_or_else(|| self.size.saturating_sub(offset));
        if size == 0 || !range_fits(offset, size, self.size) {
            return Err(Error::OutOfRange {
                what: "read",
                requested: size,
                offset,
                available: self.size,
            });
        }
        let ctx = self.bind()?;
        Ok(ctx.api.map_read(offset, size))
    }

    /// Write `data` into the buffer at `offset`.
    ///
    /// Unlike [`Buffer::read`], the range is not pre-validated against
    /// `size`; an out-of-extent write is rejected by the native API and
    /// shows up in [`Context::error`].
    pub fn write(&self, data: &[u8], offset: usize) -> Result<()> {
        let ctx = self.bind()?;
        ctx.api.buffer_sub_data(offset, data);
        Ok(())
    }

    /// Copy bytes from another buffer, GPU-side, without staging through
    /// host memory. `size == None` copies the whole source.
    ///
    /// Both extents are validated before any native call, so a rejected
    /// copy mutates neither buffer.
    pub fn copy_from_buffer(
        &self,
        source: &Buffer,
        size: Option<usize>,
        offset: usize,
        source_offset: usize,
    ) -> Result<()> {
        let size = size.unwrap_or(source.size);
        if !range_fits(source_offset, size, source.size) {
            return Err(Error::OutOfRange {
                what: "copy source",
                requested: size,
                offset: source_offset,
                available: source.size,
            });
        }
        if !range_fits(offset, size, self.size) {
            return Err(Error::OutOfRange {
                what: "copy destination",
                requested: size,
                offset,
                available: self.size,
            });
        }
        let ctx = self.ctx()?;
        ctx.api
            .copy_buffer_sub_data(source.handle, self.handle, source_offset, offset, size);
        Ok(())
    }

    /// Reallocate the backing storage, discarding the old contents.
    ///
    /// Detaches storage that may still be in flight on the GPU instead of
    /// stalling on it. `size == None` keeps the current size; `double`
    /// doubles the resulting size after `size` is resolved. The new
    /// contents are unspecified.
    pub fn orphan(&mut self, size: Option<usize>, double: bool) -> Result<()> {
        let mut size = size.unwrap_or(self.size);
        if double {
            size = size.checked_mul(2).ok_or(Error::OutOfRange {
                what: "orphan",
                requested: size,
                offset: 0,
                available: usize::MAX / 2,
            })?;
        }
        self.size = size;
        let ctx = self.bind()?;
        ctx.api.buffer_data(None, size, self.usage.to_gl());
        Ok(())
    }

    /// Bind a byte range of this buffer to an indexed uniform-buffer
    /// binding point. `size == None` binds the whole buffer.
    pub fn bind_to_uniform_block(
        &self,
        binding: u32,
        offset: usize,
        size: Option<usize>,
    ) -> Result<()> {
        let ctx = self.ctx()?;
        ctx.api.bind_buffer_range(
            gl::UNIFORM_BUFFER,
            binding,
            self.handle,
            offset,
            size.unwrap_or(self.size),
        );
        Ok(())
    }

    /// Bind a byte range of this buffer to an indexed shader-storage
    /// binding point. `size == None` binds the whole buffer.
    pub fn bind_to_storage_buffer(
        &self,
        binding: u32,
        offset: usize,
        size: Option<usize>,
    ) -> Result<()> {
        let ctx = self.ctx()?;
        ctx.api.bind_buffer_range(
            gl::SHADER_STORAGE_BUFFER,
            binding,
            self.handle,
            offset,
            size.unwrap_or(self.size),
        );
        Ok(())
    }

    /// Delete the native buffer now. Idempotent: later calls, and the
    /// eventual drop, are no-ops.
    pub fn delete(&mut self) {
        let handle = std::mem::replace(&mut self.handle, NO_OBJECT);
        if handle == NO_OBJECT {
            return;
        }
        if let Some(ctx) = self.ctx.upgrade() {
            trace!(handle, "deleting buffer");
            ctx.api.delete_buffer(handle);
            ctx.stats.borrow_mut().decr(ResourceKind::Buffer);
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        let handle = std::mem::replace(&mut self.handle, NO_OBJECT);
        if handle == NO_OBJECT {
            return;
        }
        if let Some(ctx) = self.ctx.upgrade() {
            ctx.retire(ResourceKind::Buffer, handle);
        }
    }
}
