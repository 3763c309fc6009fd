//! Compute program lifecycle: compile, link, introspect, dispatch.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use gl::types::GLuint;
use tracing::{debug, trace};

use crate::api::{GlApi, NO_OBJECT};
use crate::context::{Context, ContextInner, ResourceKind};
use crate::error::{Error, Result};
use crate::uniform::{describe, Uniform, UniformBlock, UniformValue};

/// A linked, executable GPU compute kernel built from shader source.
///
/// Construction is all-or-nothing: allocate, compile, link, and introspect
/// happen synchronously in [`Context::program`], and any failure destroys the
/// partially created native objects before the error is returned. The
/// intermediate shader object is deleted as soon as linking completes,
/// whatever the outcome.
///
/// Active uniforms and uniform blocks are queryable by name immediately
/// after construction; array uniforms are keyed without the `[0]` suffix the
/// native API reports.
#[derive(Debug)]
pub struct Program {
    handle: GLuint,
    source: String,
    uniforms: HashMap<String, Uniform>,
    uniform_blocks: HashMap<String, UniformBlock>,
    ctx: Weak<ContextInner>,
}

/// The source with 1-based, zero-padded line numbers, one line per line.
fn annotated_source(source: &str) -> String {
    source
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:03}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Enumerate the active uniforms and uniform blocks of a linked program.
fn introspect(
    api: &dyn GlApi,
    program: GLuint,
) -> Result<(HashMap<String, Uniform>, HashMap<String, UniformBlock>)> {
    let mut uniforms = HashMap::new();
    for index in 0..api.active_uniform_count(program) {
        let (reported, gl_type, array_size) = api.active_uniform(program, index);
        let location = api.uniform_location(program, &reported);
        if location == -1 {
            // Compiled out, or folded into a uniform block.
            continue;
        }
        if describe(gl_type).is_none() {
            return Err(Error::UnsupportedUniform {
                name: reported,
                gl_type,
            });
        }
        let name = reported
            .strip_suffix("[0]")
            .unwrap_or(&reported)
            .to_string();
        uniforms.insert(
            name.clone(),
            Uniform::new(program, name, gl_type, array_size, location),
        );
    }

    let mut blocks = HashMap::new();
    for index in 0..api.active_uniform_block_count(program) {
        let (name, size) = api.active_uniform_block(program, index);
        blocks.insert(name.clone(), UniformBlock::new(program, name, index, size));
    }
    Ok((uniforms, blocks))
}

impl Program {
    pub(crate) fn new(ctx: &Context, source: &str) -> Result<Self> {
        let inner = ctx.inner();
        let api = inner.api.as_ref();

        let program = api.create_program();
        if program == NO_OBJECT {
            return Err(Error::ObjectCreation("program"));
        }
        let shader = api.create_shader(gl::COMPUTE_SHADER);
        if shader == NO_OBJECT {
            api.delete_program(program);
            return Err(Error::ObjectCreation("shader"));
        }

        api.shader_source(shader, source);
        if !api.compile_shader(shader) {
            let log = api.shader_info_log(shader);
            api.delete_shader(shader);
            api.delete_program(program);
            return Err(Error::Compile {
                log,
                listing: annotated_source(source),
            });
        }

        api.attach_shader(program, shader);
        let linked = api.link_program(program);
        // The shader object is not needed past this point, link or not.
        api.delete_shader(shader);
        if !linked {
            let log = api.program_info_log(program);
            api.delete_program(program);
            return Err(Error::Link(log));
        }

        let (uniforms, uniform_blocks) = match introspect(api, program) {
            Ok(interface) => interface,
            Err(err) => {
                api.delete_program(program);
                return Err(err);
            }
        };

        debug!(
            handle = program,
            uniforms = uniforms.len(),
            uniform_blocks = uniform_blocks.len(),
            "created compute program"
        );
        inner.stats.borrow_mut().incr(ResourceKind::Program);

        Ok(Self {
            handle: program,
            source: source.to_string(),
            uniforms,
            uniform_blocks,
            ctx: ctx.downgrade(),
        })
    }

    /// Native program handle.
    pub fn handle(&self) -> GLuint {
        self.handle
    }

    /// The shader source this program was built from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Active uniforms, keyed by name (array `[0]` suffix stripped).
    pub fn uniforms(&self) -> &HashMap<String, Uniform> {
        &self.uniforms
    }

    /// Active uniform blocks, keyed by name.
    pub fn uniform_blocks(&self) -> &HashMap<String, UniformBlock> {
        &self.uniform_blocks
    }

    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.get(name)
    }

    pub fn uniform_block(&self, name: &str) -> Option<&UniformBlock> {
        self.uniform_blocks.get(name)
    }

    fn ctx(&self) -> Result<Rc<ContextInner>> {
        self.ctx.upgrade().ok_or(Error::ContextLost)
    }

    /// Bind this program as the context's active program.
    pub fn use_program(&self) -> Result<()> {
        self.ctx()?.use_program(self.handle);
        Ok(())
    }

    /// Bind and dispatch the compute workload over a 3-D group count.
    ///
    /// Native dispatch failures are not checked here; inspect
    /// [`Context::error`] if needed.
    pub fn run(&self, groups_x: u32, groups_y: u32, groups_z: u32) -> Result<()> {
        let ctx = self.ctx()?;
        ctx.use_program(self.handle);
        ctx.api.dispatch_compute(groups_x, groups_y, groups_z);
        Ok(())
    }

    /// Read a uniform's current value, or a uniform block's binding point.
    pub fn get(&self, name: &str) -> Result<UniformValue> {
        let ctx = self.ctx()?;
        if let Some(uniform) = self.uniforms.get(name) {
            uniform.get(ctx.api.as_ref())
        } else if let Some(block) = self.uniform_blocks.get(name) {
            Ok(UniformValue::Block(block.binding()))
        } else {
            Err(Error::UniformNotFound(name.to_string()))
        }
    }

    /// Set a uniform's value, or assign a uniform block's binding point.
    ///
    /// Rebinds this program as the active program first if some other
    /// program is currently active.
    pub fn set(&self, name: &str, value: &UniformValue) -> Result<()> {
        let ctx = self.ctx()?;
        if let Some(uniform) = self.uniforms.get(name) {
            if ctx.bindings.borrow().active_program != self.handle {
                ctx.use_program(self.handle);
            }
            uniform.set(ctx.api.as_ref(), value)
        } else if let Some(block) = self.uniform_blocks.get(name) {
            let binding = match value {
                UniformValue::Block(n) | UniformValue::UInt(n) => *n,
                UniformValue::Int(n) if *n >= 0 => *n as u32,
                _ => return Err(Error::InvalidBlockBinding(name.to_string())),
            };
            block.set_binding(ctx.api.as_ref(), binding);
            Ok(())
        } else {
            Err(Error::UniformNotFound(name.to_string()))
        }
    }

    /// Delete the native program now. Idempotent: later calls, and the
    /// eventual drop, are no-ops.
    pub fn delete(&mut self) {
        let handle = std::mem::replace(&mut self.handle, NO_OBJECT);
        if handle == NO_OBJECT {
            return;
        }
        if let Some(ctx) = self.ctx.upgrade() {
            trace!(handle, "deleting compute program");
            ctx.api.delete_program(handle);
            ctx.stats.borrow_mut().decr(ResourceKind::Program);
        }
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        let handle = std::mem::replace(&mut self.handle, NO_OBJECT);
        if handle == NO_OBJECT {
            return;
        }
        if let Some(ctx) = self.ctx.upgrade() {
            ctx.retire(ResourceKind::Program, handle);
        }
    }
}
