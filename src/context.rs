//! Owning context: binding state, cleanup policy, and resource factories.
//!
//! A [`Context`] is a cheap handle (`Rc` inside) to the state every resource
//! shares: the [`GlApi`] backend, the explicit [`BindingTable`] mirroring the
//! native single-slot binding targets, the garbage-collection policy, the
//! deferred-deletion queue, and the per-kind allocation counters.
//! [`Program`](crate::Program) and [`Buffer`](crate::Buffer) hold a
//! non-owning `Weak` back-reference; tearing the context down while
//! resources are still alive is tolerated (their cleanup becomes a no-op).

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use gl::types::GLuint;
use tracing::{debug, trace};

use crate::api::GlApi;
use crate::buffer::{Buffer, BufferSource, BufferUsage};
use crate::error::Result;
use crate::program::Program;

/// When native deletion happens for a logically dead resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcMode {
    /// Delete synchronously when the resource is dropped.
    Auto,
    /// Enqueue the handle on the context; [`Context::gc`] deletes later.
    ContextGc,
    /// Do nothing on drop. For contexts that are being torn down, where
    /// native deletion would be invalid.
    None,
}

/// Resource kinds tracked by [`ContextStats`] and the deferred queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Program,
    Buffer,
}

impl ResourceKind {
    fn label(self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::Buffer => "buffer",
        }
    }
}

/// A handle whose owner died under [`GcMode::ContextGc`], awaiting native
/// deletion.
pub(crate) struct DeadObject {
    pub(crate) kind: ResourceKind,
    pub(crate) handle: GLuint,
}

/// Explicit model of the native single-slot binding state.
///
/// The native API binds one object per target globally; resource operations
/// consult and update this table instead of trusting whatever happens to be
/// bound.
#[derive(Default)]
pub(crate) struct BindingTable {
    pub(crate) array_buffer: GLuint,
    pub(crate) active_program: GLuint,
}

/// Per-kind `(created, freed)` counters with a warn threshold.
#[derive(Debug, Clone, Copy)]
pub struct ContextStats {
    warn_threshold: u64,
    program: (u64, u64),
    buffer: (u64, u64),
}

impl ContextStats {
    fn new(warn_threshold: u64) -> Self {
        Self {
            warn_threshold,
            program: (0, 0),
            buffer: (0, 0),
        }
    }

    fn slot(&mut self, kind: ResourceKind) -> &mut (u64, u64) {
        match kind {
            ResourceKind::Program => &mut self.program,
            ResourceKind::Buffer => &mut self.buffer,
        }
    }

    pub(crate) fn incr(&mut self, kind: ResourceKind) {
        let threshold = self.warn_threshold;
        let slot = self.slot(kind);
        slot.0 += 1;
        let (created, freed) = *slot;
        if created % threshold == 0 {
            debug!(
                kind = kind.label(),
                threshold,
                created,
                freed,
                active = created - freed,
                "allocation count passed threshold"
            );
        }
    }

    pub(crate) fn decr(&mut self, kind: ResourceKind) {
        self.slot(kind).1 += 1;
    }

    /// `(created, freed)` for a resource kind.
    pub fn counts(&self, kind: ResourceKind) -> (u64, u64) {
        match kind {
            ResourceKind::Program => self.program,
            ResourceKind::Buffer => self.buffer,
        }
    }

    /// Resources of a kind currently alive.
    pub fn active(&self, kind: ResourceKind) -> u64 {
        let (created, freed) = self.counts(kind);
        created - freed
    }
}

pub(crate) struct ContextInner {
    pub(crate) api: Rc<dyn GlApi>,
    pub(crate) bindings: RefCell<BindingTable>,
    pub(crate) gc_mode: Cell<GcMode>,
    pub(crate) pending: RefCell<VecDeque<DeadObject>>,
    pub(crate) stats: RefCell<ContextStats>,
}

/// The owning context for GPU resources.
///
/// Clones share the same underlying state. Resources are created through
/// [`Context::program`] and [`Context::buffer`]; native allocation happens
/// immediately in those calls, never lazily.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Context {
    /// Create a context over a backend. The default cleanup policy is
    /// [`GcMode::ContextGc`]; call [`Context::set_gc_mode`] to change it.
    pub fn new(api: Rc<dyn GlApi>) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                api,
                bindings: RefCell::new(BindingTable::default()),
                gc_mode: Cell::new(GcMode::ContextGc),
                pending: RefCell::new(VecDeque::new()),
                stats: RefCell::new(ContextStats::new(1000)),
            }),
        }
    }

    pub fn gc_mode(&self) -> GcMode {
        self.inner.gc_mode.get()
    }

    pub fn set_gc_mode(&self, mode: GcMode) {
        self.inner.gc_mode.set(mode);
    }

    /// Snapshot of the allocation counters.
    pub fn stats(&self) -> ContextStats {
        *self.inner.stats.borrow()
    }

    /// Compile and link a compute program from GLSL source.
    pub fn program(&self, source: &str) -> Result<Program> {
        Program::new(self, source)
    }

    /// Allocate a GPU buffer from host data or a reserved byte size.
    pub fn buffer(&self, source: BufferSource<'_>, usage: BufferUsage) -> Result<Buffer> {
        Buffer::new(self, source, usage)
    }

    /// Delete every resource enqueued under [`GcMode::ContextGc`].
    ///
    /// Returns the number of resources destroyed. Loops until the queue is
    /// empty: deleting one object can enqueue more.
    pub fn gc(&self) -> usize {
        let mut destroyed = 0;
        loop {
            let dead = self.inner.pending.borrow_mut().pop_front();
            let Some(dead) = dead else {
                break;
            };
            trace!(kind = dead.kind.label(), handle = dead.handle, "deferred delete");
            match dead.kind {
                ResourceKind::Program => self.inner.api.delete_program(dead.handle),
                ResourceKind::Buffer => self.inner.api.delete_buffer(dead.handle),
            }
            self.inner.stats.borrow_mut().decr(dead.kind);
            destroyed += 1;
        }
        destroyed
    }

    /// The native error flag, as a string, or `None` if no error has
    /// occurred. Reading clears the flag.
    pub fn error(&self) -> Option<&'static str> {
        match self.inner.api.get_error() {
            gl::NO_ERROR => None,
            gl::INVALID_ENUM => Some("GL_INVALID_ENUM"),
            gl::INVALID_VALUE => Some("GL_INVALID_VALUE"),
            gl::INVALID_OPERATION => Some("GL_INVALID_OPERATION"),
            gl::INVALID_FRAMEBUFFER_OPERATION => Some("GL_INVALID_FRAMEBUFFER_OPERATION"),
            gl::OUT_OF_MEMORY => Some("GL_OUT_OF_MEMORY"),
            gl::STACK_UNDERFLOW => Some("GL_STACK_UNDERFLOW"),
            gl::STACK_OVERFLOW => Some("GL_STACK_OVERFLOW"),
            _ => Some("GL_UNKNOWN_ERROR"),
        }
    }

    /// Handle of the program currently recorded as active.
    pub fn active_program(&self) -> GLuint {
        self.inner.bindings.borrow().active_program
    }

    /// Handle of the buffer currently bound to the array-buffer target.
    pub fn bound_buffer(&self) -> GLuint {
        self.inner.bindings.borrow().array_buffer
    }

    pub(crate) fn inner(&self) -> &Rc<ContextInner> {
        &self.inner
    }

    pub(crate) fn downgrade(&self) -> Weak<ContextInner> {
        Rc::downgrade(&self.inner)
    }
}

impl ContextInner {
    /// Route a logically dead resource to the active cleanup policy.
    pub(crate) fn retire(&self, kind: ResourceKind, handle: GLuint) {
        match self.gc_mode.get() {
            GcMode::Auto => {
                trace!(kind = kind.label(), handle, "immediate delete");
                match kind {
                    ResourceKind::Program => self.api.delete_program(handle),
                    ResourceKind::Buffer => self.api.delete_buffer(handle),
                }
                self.stats.borrow_mut().decr(kind);
            }
            GcMode::ContextGc => {
                self.pending.borrow_mut().push_back(DeadObject { kind, handle });
            }
            GcMode::None => {}
        }
    }

    pub(crate) fn bind_array_buffer(&self, handle: GLuint) {
        self.api.bind_array_buffer(handle);
        self.bindings.borrow_mut().array_buffer = handle;
    }

    pub(crate) fn use_program(&self, handle: GLuint) {
        self.api.use_program(handle);
        self.bindings.borrow_mut().active_program = handle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeGl;
    use crate::uniform::UniformValue;

    const SRC: &str = "#version 430\n\
                       layout(local_size_x = 1) in;\n\
                       uniform float scale;\n\
                       void main() {}\n";

    #[test]
    fn gc_drains_queue_and_counts_both_kinds() {
        let fake = FakeGl::new();
        let ctx = Context::new(fake.clone());

        let program = ctx.program(SRC).unwrap();
        let buffer = ctx
            .buffer(BufferSource::Reserve(16), BufferUsage::Static)
            .unwrap();
        drop(program);
        drop(buffer);

        // ContextGc is the default: nothing deleted yet.
        assert_eq!(fake.live_objects(), 2);
        assert_eq!(ctx.gc(), 2);
        assert_eq!(fake.live_objects(), 0);
        assert_eq!(ctx.gc(), 0);

        let stats = ctx.stats();
        assert_eq!(stats.counts(ResourceKind::Program), (1, 1));
        assert_eq!(stats.counts(ResourceKind::Buffer), (1, 1));
    }

    #[test]
    fn gc_mode_none_leaves_native_objects_alone() {
        let fake = FakeGl::new();
        let ctx = Context::new(fake.clone());
        ctx.set_gc_mode(GcMode::None);

        let buffer = ctx
            .buffer(BufferSource::Reserve(8), BufferUsage::Static)
            .unwrap();
        let handle = buffer.handle();
        drop(buffer);

        assert!(fake.has_buffer(handle));
        assert_eq!(ctx.gc(), 0);
        assert_eq!(ctx.stats().active(ResourceKind::Buffer), 1);
    }

    #[test]
    fn auto_mode_deletes_on_drop() {
        let fake = FakeGl::new();
        let ctx = Context::new(fake.clone());
        ctx.set_gc_mode(GcMode::Auto);

        let buffer = ctx
            .buffer(BufferSource::Reserve(8), BufferUsage::Static)
            .unwrap();
        let handle = buffer.handle();
        drop(buffer);

        assert!(!fake.has_buffer(handle));
        assert_eq!(ctx.stats().counts(ResourceKind::Buffer), (1, 1));
    }

    #[test]
    fn error_reports_and_clears_the_native_flag() {
        let fake = FakeGl::new();
        let ctx = Context::new(fake);
        assert_eq!(ctx.error(), None);
    }

    #[test]
    fn resources_survive_context_teardown() {
        let fake = FakeGl::new();
        let ctx = Context::new(fake);
        let buffer = ctx
            .buffer(BufferSource::Reserve(8), BufferUsage::Static)
            .unwrap();
        let program = ctx.program(SRC).unwrap();
        drop(ctx);

        // Operations report the loss; drop is a tolerated no-op.
        assert!(matches!(
            buffer.read(None, 0),
            Err(crate::Error::ContextLost)
        ));
        assert!(matches!(
            program.set("scale", &UniformValue::Float(1.0)),
            Err(crate::Error::ContextLost)
        ));
        drop(buffer);
        drop(program);
    }
}
