//! Native OpenGL access seam.
//!
//! [`GlApi`] covers exactly the native calls the resource core needs:
//! program/shader creation, compilation, linking and introspection, buffer
//! allocation and byte movement, uniform upload/readback, compute dispatch,
//! and the error query. [`Context`](crate::Context) holds the implementation
//! behind an `Rc<dyn GlApi>` so resource objects never touch global GL state
//! directly.
//!
//! [`RawGl`] is the production implementation over the `gl` crate, loading
//! function pointers exactly once from the current context. Unit tests run
//! against an in-memory double (`fake::FakeGl`) instead, so no live GL
//! context is required.

use std::ffi::CString;
use std::os::raw::c_void;
use std::rc::Rc;
use std::sync::Once;

use gl::types::{GLchar, GLenum, GLint, GLintptr, GLsizei, GLsizeiptr, GLuint};

/// The "no object" sentinel every native allocator returns on failure, and
/// the value a deleted handle is reset to.
pub const NO_OBJECT: GLuint = 0;

/// The native calls consumed by [`Program`](crate::Program),
/// [`Buffer`](crate::Buffer), and [`Context`](crate::Context).
///
/// Buffer data calls (`buffer_data`, `buffer_sub_data`, `map_read`) act on
/// the currently bound array buffer — the native API is stateful-binding,
/// not handle-parameterised, which is why callers rebind before every data
/// operation. Uniform setters act on the currently active program.
pub trait GlApi {
    // --- Programs and shaders ---
    fn create_program(&self) -> GLuint;
    fn create_shader(&self, kind: GLenum) -> GLuint;
    fn shader_source(&self, shader: GLuint, source: &str);
    /// Compile and return the compile status.
    fn compile_shader(&self, shader: GLuint) -> bool;
    fn shader_info_log(&self, shader: GLuint) -> String;
    fn attach_shader(&self, program: GLuint, shader: GLuint);
    /// Link and return the link status.
    fn link_program(&self, program: GLuint) -> bool;
    fn program_info_log(&self, program: GLuint) -> String;
    fn delete_shader(&self, shader: GLuint);
    fn delete_program(&self, program: GLuint);
    fn use_program(&self, program: GLuint);
    fn dispatch_compute(&self, groups_x: u32, groups_y: u32, groups_z: u32);

    // --- Introspection ---
    fn active_uniform_count(&self, program: GLuint) -> u32;
    /// `(reported name, gl type, array size)` for one active uniform.
    fn active_uniform(&self, program: GLuint, index: u32) -> (String, GLenum, usize);
    fn uniform_location(&self, program: GLuint, name: &str) -> GLint;
    fn active_uniform_block_count(&self, program: GLuint) -> u32;
    /// `(name, data size)` for one active uniform block.
    fn active_uniform_block(&self, program: GLuint, index: u32) -> (String, usize);
    fn uniform_block_binding(&self, program: GLuint, block_index: u32, binding: u32);

    // --- Uniform values ---
    fn uniform_f32(&self, location: GLint, gl_type: GLenum, count: GLint, data: &[f32]);
    fn uniform_i32(&self, location: GLint, gl_type: GLenum, count: GLint, data: &[i32]);
    fn uniform_u32(&self, location: GLint, gl_type: GLenum, count: GLint, data: &[u32]);
    fn get_uniform_f32(&self, program: GLuint, location: GLint, len: usize) -> Vec<f32>;
    fn get_uniform_i32(&self, program: GLuint, location: GLint, len: usize) -> Vec<i32>;
    fn get_uniform_u32(&self, program: GLuint, location: GLint, len: usize) -> Vec<u32>;

    // --- Buffers ---
    fn create_buffer(&self) -> GLuint;
    fn bind_array_buffer(&self, buffer: GLuint);
    /// Allocate storage for the bound array buffer. `None` reserves `size`
    /// bytes without an upload.
    fn buffer_data(&self, data: Option<&[u8]>, size: usize, usage: GLenum);
    fn buffer_sub_data(&self, offset: usize, data: &[u8]);
    /// Map the bound array buffer for reading and copy out `size` bytes.
    fn map_read(&self, offset: usize, size: usize) -> Vec<u8>;
    fn copy_buffer_sub_data(
        &self,
        src: GLuint,
        dst: GLuint,
        src_offset: usize,
        dst_offset: usize,
        size: usize,
    );
    fn bind_buffer_range(
        &self,
        target: GLenum,
        binding: u32,
        buffer: GLuint,
        offset: usize,
        size: usize,
    );
    fn delete_buffer(&self, buffer: GLuint);

    // --- Error state ---
    /// The native error flag. Reading clears it.
    fn get_error(&self) -> GLenum;
}

static GL_INIT_ONCE: Once = Once::new();

/// Production [`GlApi`] over the `gl` crate.
///
/// # Safety
///
/// [`RawGl::load`] assumes an OpenGL context is current on the calling
/// thread, and every method assumes the same context is still current.
/// Using it without a current context is undefined behavior.
pub struct RawGl;

impl RawGl {
    /// Load GL function pointers (once per process) and return the backend.
    pub fn load() -> Rc<Self> {
        GL_INIT_ONCE.call_once(|| {
            gl_loader::init_gl();
            gl::load_with(|s| gl_loader::get_proc_address(s).cast());
        });
        Rc::new(Self)
    }
}

impl GlApi for RawGl {
    fn create_program(&self) -> GLuint {
        unsafe { gl::CreateProgram() }
    }

    fn create_shader(&self, kind: GLenum) -> GLuint {
        unsafe { gl::CreateShader(kind) }
    }

    fn shader_source(&self, shader: GLuint, source: &str) {
        let ptr = source.as_ptr() as *const GLchar;
        let len = source.len() as GLint;
        unsafe { gl::ShaderSource(shader, 1, &ptr, &len) }
    }

    fn compile_shader(&self, shader: GLuint) -> bool {
        let mut status: GLint = 0;
        unsafe {
            gl::CompileShader(shader);
            gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status);
        }
        status != 0
    }

    fn shader_info_log(&self, shader: GLuint) -> String {
        let mut len: GLint = 0;
        unsafe { gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len) };
        if len <= 0 {
            return String::new();
        }
        let mut buf = vec![0u8; len as usize];
        let mut written: GLsizei = 0;
        unsafe {
            gl::GetShaderInfoLog(shader, len, &mut written, buf.as_mut_ptr() as *mut GLchar)
        };
        buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn attach_shader(&self, program: GLuint, shader: GLuint) {
        unsafe { gl::AttachShader(program, shader) }
    }

    fn link_program(&self, program: GLuint) -> bool {
        let mut status: GLint = 0;
        unsafe {
            gl::LinkProgram(program);
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);
        }
        status != 0
    }

    fn program_info_log(&self, program: GLuint) -> String {
        let mut len: GLint = 0;
        unsafe { gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len) };
        if len <= 0 {
            return String::new();
        }
        let mut buf = vec![0u8; len as usize];
        let mut written: GLsizei = 0;
        unsafe {
            gl::GetProgramInfoLog(program, len, &mut written, buf.as_mut_ptr() as *mut GLchar)
        };
        buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn delete_shader(&self, shader: GLuint) {
        unsafe { gl::DeleteShader(shader) }
    }

    fn delete_program(&self, program: GLuint) {
        unsafe { gl::DeleteProgram(program) }
    }

    fn use_program(&self, program: GLuint) {
        unsafe { gl::UseProgram(program) }
    }

    fn dispatch_compute(&self, groups_x: u32, groups_y: u32, groups_z: u32) {
        unsafe { gl::DispatchCompute(groups_x, groups_y, groups_z) }
    }

    fn active_uniform_count(&self, program: GLuint) -> u32 {
        let mut count: GLint = 0;
        unsafe { gl::GetProgramiv(program, gl::ACTIVE_UNIFORMS, &mut count) };
        count.max(0) as u32
    }

    fn active_uniform(&self, program: GLuint, index: u32) -> (String, GLenum, usize) {
        let mut buf = [0u8; 256];
        let mut written: GLsizei = 0;
        let mut size: GLint = 0;
        let mut gl_type: GLenum = 0;
        unsafe {
            gl::GetActiveUniform(
                program,
                index,
                buf.len() as GLsizei,
                &mut written,
                &mut size,
                &mut gl_type,
                buf.as_mut_ptr() as *mut GLchar,
            );
        }
        let name = String::from_utf8_lossy(&buf[..written.max(0) as usize]).into_owned();
        (name, gl_type, size.max(1) as usize)
    }

    fn uniform_location(&self, program: GLuint, name: &str) -> GLint {
        let Ok(cname) = CString::new(name) else {
            return -1;
        };
        unsafe { gl::GetUniformLocation(program, cname.as_ptr()) }
    }

    fn active_uniform_block_count(&self, program: GLuint) -> u32 {
        let mut count: GLint = 0;
        unsafe { gl::GetProgramiv(program, gl::ACTIVE_UNIFORM_BLOCKS, &mut count) };
        count.max(0) as u32
    }

    fn active_uniform_block(&self, program: GLuint, index: u32) -> (String, usize) {
        let mut buf = [0u8; 256];
        let mut written: GLsizei = 0;
        let mut size: GLint = 0;
        unsafe {
            gl::GetActiveUniformBlockName(
                program,
                index,
                buf.len() as GLsizei,
                &mut written,
                buf.as_mut_ptr() as *mut GLchar,
            );
            gl::GetActiveUniformBlockiv(
                program,
                index,
                gl::UNIFORM_BLOCK_DATA_SIZE,
                &mut size,
            );
        }
        let name = String::from_utf8_lossy(&buf[..written.max(0) as usize]).into_owned();
        (name, size.max(0) as usize)
    }

    fn uniform_block_binding(&self, program: GLuint, block_index: u32, binding: u32) {
        unsafe { gl::UniformBlockBinding(program, block_index, binding) }
    }

    fn uniform_f32(&self, location: GLint, gl_type: GLenum, count: GLint, data: &[f32]) {
        let p = data.as_ptr();
        unsafe {
            match gl_type {
                gl::FLOAT => gl::Uniform1fv(location, count, p),
                gl::FLOAT_VEC2 => gl::Uniform2fv(location, count, p),
                gl::FLOAT_VEC3 => gl::Uniform3fv(location, count, p),
                gl::FLOAT_VEC4 => gl::Uniform4fv(location, count, p),
                gl::FLOAT_MAT2 => gl::UniformMatrix2fv(location, count, gl::FALSE, p),
                gl::FLOAT_MAT3 => gl::UniformMatrix3fv(location, count, gl::FALSE, p),
                gl::FLOAT_MAT4 => gl::UniformMatrix4fv(location, count, gl::FALSE, p),
                _ => {}
            }
        }
    }

    fn uniform_i32(&self, location: GLint, gl_type: GLenum, count: GLint, data: &[i32]) {
        let p = data.as_ptr();
        unsafe {
            match gl_type {
                gl::INT_VEC2 | gl::BOOL_VEC2 => gl::Uniform2iv(location, count, p),
                gl::INT_VEC3 | gl::BOOL_VEC3 => gl::Uniform3iv(location, count, p),
                gl::INT_VEC4 | gl::BOOL_VEC4 => gl::Uniform4iv(location, count, p),
                // INT, BOOL, samplers, images, atomic counters.
                _ => gl::Uniform1iv(location, count, p),
            }
        }
    }

    fn uniform_u32(&self, location: GLint, gl_type: GLenum, count: GLint, data: &[u32]) {
        let p = data.as_ptr();
        unsafe {
            match gl_type {
                gl::UNSIGNED_INT_VEC2 => gl::Uniform2uiv(location, count, p),
                gl::UNSIGNED_INT_VEC3 => gl::Uniform3uiv(location, count, p),
                gl::UNSIGNED_INT_VEC4 => gl::Uniform4uiv(location, count, p),
                _ => gl::Uniform1uiv(location, count, p),
            }
        }
    }

    fn get_uniform_f32(&self, program: GLuint, location: GLint, len: usize) -> Vec<f32> {
        let mut out = vec![0f32; len];
        unsafe { gl::GetUniformfv(program, location, out.as_mut_ptr()) };
        out
    }

    fn get_uniform_i32(&self, program: GLuint, location: GLint, len: usize) -> Vec<i32> {
        let mut out = vec![0i32; len];
        unsafe { gl::GetUniformiv(program, location, out.as_mut_ptr()) };
        out
    }

    fn get_uniform_u32(&self, program: GLuint, location: GLint, len: usize) -> Vec<u32> {
        let mut out = vec![0u32; len];
        unsafe { gl::GetUniformuiv(program, location, out.as_mut_ptr()) };
        out
    }

    fn create_buffer(&self) -> GLuint {
        let mut buffer: GLuint = 0;
        unsafe { gl::GenBuffers(1, &mut buffer) };
        buffer
    }

    fn bind_array_buffer(&self, buffer: GLuint) {
        unsafe { gl::BindBuffer(gl::ARRAY_BUFFER, buffer) }
    }

    fn buffer_data(&self, data: Option<&[u8]>, size: usize, usage: GLenum) {
        let ptr = data.map_or(std::ptr::null(), |d| d.as_ptr() as *const c_void);
        unsafe { gl::BufferData(gl::ARRAY_BUFFER, size as GLsizeiptr, ptr, usage) }
    }

    fn buffer_sub_data(&self, offset: usize, data: &[u8]) {
        unsafe {
            gl::BufferSubData(
                gl::ARRAY_BUFFER,
                offset as GLintptr,
                data.len() as GLsizeiptr,
                data.as_ptr() as *const c_void,
            )
        }
    }

    fn map_read(&self, offset: usize, size: usize) -> Vec<u8> {
        let mut out = vec![0u8; size];
        unsafe {
            let ptr = gl::MapBufferRange(
                gl::ARRAY_BUFFER,
                offset as GLintptr,
                size as GLsizeiptr,
                gl::MAP_READ_BIT,
            );
            if !ptr.is_null() {
                std::ptr::copy_nonoverlapping(ptr as *const u8, out.as_mut_ptr(), size);
                gl::UnmapBuffer(gl::ARRAY_BUFFER);
            }
        }
        out
    }

    fn copy_buffer_sub_data(
        &self,
        src: GLuint,
        dst: GLuint,
        src_offset: usize,
        dst_offset: usize,
        size: usize,
    ) {
        unsafe {
            gl::BindBuffer(gl::COPY_READ_BUFFER, src);
            gl::BindBuffer(gl::COPY_WRITE_BUFFER, dst);
            gl::CopyBufferSubData(
                gl::COPY_READ_BUFFER,
                gl::COPY_WRITE_BUFFER,
                src_offset as GLintptr,
                dst_offset as GLintptr,
                size as GLsizeiptr,
            );
        }
    }

    fn bind_buffer_range(
        &self,
        target: GLenum,
        binding: u32,
        buffer: GLuint,
        offset: usize,
        size: usize,
    ) {
        unsafe {
            gl::BindBufferRange(
                target,
                binding,
                buffer,
                offset as GLintptr,
                size as GLsizeiptr,
            )
        }
    }

    fn delete_buffer(&self, buffer: GLuint) {
        unsafe { gl::DeleteBuffers(1, &buffer) }
    }

    fn get_error(&self) -> GLenum {
        unsafe { gl::GetError() }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory [`GlApi`] double for unit tests.
    //!
    //! Programs and buffers live in hash maps. Compilation runs a minimal
    //! line check (statements must end in `;`, `{`, `}`, or `)`), linking
    //! requires a `void main` entry point, and the active-uniform
    //! enumeration is scraped from `uniform` declarations in the attached
    //! sources. Uniforms whose name starts with `dead` report location −1,
    //! modelling declarations the optimizer compiled out. Array uniforms
    //! are reported with the native `[0]` suffix.

    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    pub(crate) struct FakeGl {
        state: RefCell<State>,
    }

    #[derive(Default)]
    struct State {
        next_handle: GLuint,
        fail_allocations: bool,
        error: GLenum,
        shaders: HashMap<GLuint, FakeShader>,
        programs: HashMap<GLuint, FakeProgram>,
        buffers: HashMap<GLuint, Vec<u8>>,
        bound_array: GLuint,
        active_program: GLuint,
        dispatches: Vec<(u32, u32, u32)>,
        range_bindings: HashMap<(GLenum, u32), (GLuint, usize, usize)>,
    }

    #[derive(Default)]
    struct FakeShader {
        source: String,
        compiled: bool,
        log: String,
    }

    #[derive(Default)]
    struct FakeProgram {
        attached: Vec<GLuint>,
        log: String,
        uniforms: Vec<ActiveUniform>,
        blocks: Vec<(String, usize)>,
        block_bindings: HashMap<u32, u32>,
        f32s: HashMap<GLint, Vec<f32>>,
        i32s: HashMap<GLint, Vec<i32>>,
        u32s: HashMap<GLint, Vec<u32>>,
    }

    struct ActiveUniform {
        reported: String,
        base: String,
        gl_type: GLenum,
        size: usize,
        location: GLint,
    }

    impl State {
        fn alloc(&mut self) -> GLuint {
            if self.fail_allocations {
                return NO_OBJECT;
            }
            self.next_handle += 1;
            self.next_handle
        }
    }

    impl FakeGl {
        pub(crate) fn new() -> Rc<Self> {
            Rc::new(Self::default())
        }

        pub(crate) fn fail_allocations(&self, fail: bool) {
            self.state.borrow_mut().fail_allocations = fail;
        }

        pub(crate) fn buffer_bytes(&self, handle: GLuint) -> Option<Vec<u8>> {
            self.state.borrow().buffers.get(&handle).cloned()
        }

        pub(crate) fn has_program(&self, handle: GLuint) -> bool {
            self.state.borrow().programs.contains_key(&handle)
        }

        pub(crate) fn has_buffer(&self, handle: GLuint) -> bool {
            self.state.borrow().buffers.contains_key(&handle)
        }

        /// Shaders + programs + buffers still alive.
        pub(crate) fn live_objects(&self) -> usize {
            let s = self.state.borrow();
            s.shaders.len() + s.programs.len() + s.buffers.len()
        }

        pub(crate) fn last_dispatch(&self) -> Option<(u32, u32, u32)> {
            self.state.borrow().dispatches.last().copied()
        }

        pub(crate) fn active_program(&self) -> GLuint {
            self.state.borrow().active_program
        }

        pub(crate) fn bound_array(&self) -> GLuint {
            self.state.borrow().bound_array
        }

        pub(crate) fn range_binding(
            &self,
            target: GLenum,
            binding: u32,
        ) -> Option<(GLuint, usize, usize)> {
            self.state
                .borrow()
                .range_bindings
                .get(&(target, binding))
                .copied()
        }
    }

    /// Minimal statement check: every non-empty, non-comment, non-directive
    /// line must end with `;`, `{`, `}`, or `)`.
    fn check_syntax(source: &str) -> std::result::Result<(), String> {
        for (i, line) in source.lines().enumerate() {
            let t = line.trim();
            if t.is_empty() || t.starts_with("//") || t.starts_with('#') {
                continue;
            }
            if t.ends_with(';') || t.ends_with('{') || t.ends_with('}') || t.ends_with(')') {
                continue;
            }
            return Err(format!("ERROR: 0:{}: '' : syntax error", i + 1));
        }
        Ok(())
    }

    fn type_token(ty: &str) -> GLenum {
        match ty {
            "float" => gl::FLOAT,
            "vec2" => gl::FLOAT_VEC2,
            "vec3" => gl::FLOAT_VEC3,
            "vec4" => gl::FLOAT_VEC4,
            "mat2" => gl::FLOAT_MAT2,
            "mat3" => gl::FLOAT_MAT3,
            "mat4" => gl::FLOAT_MAT4,
            "int" => gl::INT,
            "ivec2" => gl::INT_VEC2,
            "ivec3" => gl::INT_VEC3,
            "ivec4" => gl::INT_VEC4,
            "uint" => gl::UNSIGNED_INT,
            "uvec2" => gl::UNSIGNED_INT_VEC2,
            "uvec3" => gl::UNSIGNED_INT_VEC3,
            "uvec4" => gl::UNSIGNED_INT_VEC4,
            "bool" => gl::BOOL,
            "bvec2" => gl::BOOL_VEC2,
            "bvec3" => gl::BOOL_VEC3,
            "bvec4" => gl::BOOL_VEC4,
            "sampler2D" => gl::SAMPLER_2D,
            "image2D" => gl::IMAGE_2D,
            _ => gl::FLOAT,
        }
    }

    /// Scrape `uniform` declarations and uniform blocks out of a source.
    fn extract_interface(
        source: &str,
        uniforms: &mut Vec<ActiveUniform>,
        blocks: &mut Vec<(String, usize)>,
        next_location: &mut GLint,
    ) {
        let lines: Vec<&str> = source.lines().collect();
        let mut i = 0;
        while i < lines.len() {
            let mut t = lines[i].trim();
            if t.starts_with("layout") {
                if let Some(close) = t.find(')') {
                    t = t[close + 1..].trim();
                }
            }
            if let Some(rest) = t.strip_prefix("uniform ") {
                let rest = rest.trim();
                if rest.ends_with('{') {
                    let name = rest.trim_end_matches('{').trim().to_string();
                    let mut members = 0;
                    i += 1;
                    while i < lines.len() && !lines[i].trim_start().starts_with('}') {
                        if !lines[i].trim().is_empty() {
                            members += 1;
                        }
                        i += 1;
                    }
                    // Fake std140: one 16-byte slot per member.
                    blocks.push((name, members * 16));
                } else {
                    let decl = rest.trim_end_matches(';').trim();
                    let mut parts = decl.split_whitespace();
                    if let (Some(ty), Some(name)) = (parts.next(), parts.next()) {
                        let gl_type = type_token(ty);
                        let (base, size) = match name.split_once('[') {
                            Some((base, n)) => (
                                base.to_string(),
                                n.trim_end_matches(']').parse().unwrap_or(1),
                            ),
                            None => (name.to_string(), 1),
                        };
                        let location = if base.starts_with("dead") {
                            -1
                        } else {
                            let l = *next_location;
                            *next_location += size as GLint;
                            l
                        };
                        let reported = if size > 1 {
                            format!("{base}[0]")
                        } else {
                            base.clone()
                        };
                        uniforms.push(ActiveUniform {
                            reported,
                            base,
                            gl_type,
                            size,
                            location,
                        });
                    }
                }
            }
            i += 1;
        }
    }

    impl GlApi for FakeGl {
        fn create_program(&self) -> GLuint {
            let mut s = self.state.borrow_mut();
            let handle = s.alloc();
            if handle != NO_OBJECT {
                s.programs.insert(handle, FakeProgram::default());
            }
            handle
        }

        fn create_shader(&self, _kind: GLenum) -> GLuint {
            let mut s = self.state.borrow_mut();
            let handle = s.alloc();
            if handle != NO_OBJECT {
                s.shaders.insert(handle, FakeShader::default());
            }
            handle
        }

        fn shader_source(&self, shader: GLuint, source: &str) {
            if let Some(sh) = self.state.borrow_mut().shaders.get_mut(&shader) {
                sh.source = source.to_string();
            }
        }

        fn compile_shader(&self, shader: GLuint) -> bool {
            let mut s = self.state.borrow_mut();
            let Some(sh) = s.shaders.get_mut(&shader) else {
                return false;
            };
            match check_syntax(&sh.source) {
                Ok(()) => {
                    sh.compiled = true;
                    sh.log.clear();
                }
                Err(log) => {
                    sh.compiled = false;
                    sh.log = log;
                }
            }
            sh.compiled
        }

        fn shader_info_log(&self, shader: GLuint) -> String {
            self.state
                .borrow()
                .shaders
                .get(&shader)
                .map(|sh| sh.log.clone())
                .unwrap_or_default()
        }

        fn attach_shader(&self, program: GLuint, shader: GLuint) {
            if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
                p.attached.push(shader);
            }
        }

        fn link_program(&self, program: GLuint) -> bool {
            let mut s = self.state.borrow_mut();
            let Some(p) = s.programs.get(&program) else {
                return false;
            };
            let sources: Vec<String> = p
                .attached
                .iter()
                .filter_map(|sh| s.shaders.get(sh))
                .map(|sh| sh.source.clone())
                .collect();

            if !sources.iter().any(|src| src.contains("void main")) {
                if let Some(p) = s.programs.get_mut(&program) {
                    p.log = "error: no main entry point".to_string();
                }
                return false;
            }

            let mut uniforms = Vec::new();
            let mut blocks = Vec::new();
            let mut next_location: GLint = 0;
            for src in &sources {
                extract_interface(src, &mut uniforms, &mut blocks, &mut next_location);
            }
            if let Some(p) = s.programs.get_mut(&program) {
                p.uniforms = uniforms;
                p.blocks = blocks;
                p.log.clear();
            }
            true
        }

        fn program_info_log(&self, program: GLuint) -> String {
            self.state
                .borrow()
                .programs
                .get(&program)
                .map(|p| p.log.clone())
                .unwrap_or_default()
        }

        fn delete_shader(&self, shader: GLuint) {
            self.state.borrow_mut().shaders.remove(&shader);
        }

        fn delete_program(&self, program: GLuint) {
            self.state.borrow_mut().programs.remove(&program);
        }

        fn use_program(&self, program: GLuint) {
            self.state.borrow_mut().active_program = program;
        }

        fn dispatch_compute(&self, groups_x: u32, groups_y: u32, groups_z: u32) {
            self.state
                .borrow_mut()
                .dispatches
                .push((groups_x, groups_y, groups_z));
        }

        fn active_uniform_count(&self, program: GLuint) -> u32 {
            self.state
                .borrow()
                .programs
                .get(&program)
                .map(|p| p.uniforms.len() as u32)
                .unwrap_or(0)
        }

        fn active_uniform(&self, program: GLuint, index: u32) -> (String, GLenum, usize) {
            let s = self.state.borrow();
            s.programs
                .get(&program)
                .and_then(|p| p.uniforms.get(index as usize))
                .map(|u| (u.reported.clone(), u.gl_type, u.size))
                .unwrap_or((String::new(), gl::FLOAT, 1))
        }

        fn uniform_location(&self, program: GLuint, name: &str) -> GLint {
            let s = self.state.borrow();
            s.programs
                .get(&program)
                .and_then(|p| {
                    p.uniforms
                        .iter()
                        .find(|u| u.reported == name || u.base == name)
                })
                .map(|u| u.location)
                .unwrap_or(-1)
        }

        fn active_uniform_block_count(&self, program: GLuint) -> u32 {
            self.state
                .borrow()
                .programs
                .get(&program)
                .map(|p| p.blocks.len() as u32)
                .unwrap_or(0)
        }

        fn active_uniform_block(&self, program: GLuint, index: u32) -> (String, usize) {
            self.state
                .borrow()
                .programs
                .get(&program)
                .and_then(|p| p.blocks.get(index as usize))
                .cloned()
                .unwrap_or((String::new(), 0))
        }

        fn uniform_block_binding(&self, program: GLuint, block_index: u32, binding: u32) {
            if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
                p.block_bindings.insert(block_index, binding);
            }
        }

        fn uniform_f32(&self, location: GLint, _gl_type: GLenum, _count: GLint, data: &[f32]) {
            let mut s = self.state.borrow_mut();
            let active = s.active_program;
            if let Some(p) = s.programs.get_mut(&active) {
                p.f32s.insert(location, data.to_vec());
            }
        }

        fn uniform_i32(&self, location: GLint, _gl_type: GLenum, _count: GLint, data: &[i32]) {
            let mut s = self.state.borrow_mut();
            let active = s.active_program;
            if let Some(p) = s.programs.get_mut(&active) {
                p.i32s.insert(location, data.to_vec());
            }
        }

        fn uniform_u32(&self, location: GLint, _gl_type: GLenum, _count: GLint, data: &[u32]) {
            let mut s = self.state.borrow_mut();
            let active = s.active_program;
            if let Some(p) = s.programs.get_mut(&active) {
                p.u32s.insert(location, data.to_vec());
            }
        }

        fn get_uniform_f32(&self, program: GLuint, location: GLint, len: usize) -> Vec<f32> {
            let mut out = self
                .state
                .borrow()
                .programs
                .get(&program)
                .and_then(|p| p.f32s.get(&location))
                .cloned()
                .unwrap_or_default();
            out.resize(len, 0.0);
            out
        }

        fn get_uniform_i32(&self, program: GLuint, location: GLint, len: usize) -> Vec<i32> {
            let mut out = self
                .state
                .borrow()
                .programs
                .get(&program)
                .and_then(|p| p.i32s.get(&location))
                .cloned()
                .unwrap_or_default();
            out.resize(len, 0);
            out
        }

        fn get_uniform_u32(&self, program: GLuint, location: GLint, len: usize) -> Vec<u32> {
            let mut out = self
                .state
                .borrow()
                .programs
                .get(&program)
                .and_then(|p| p.u32s.get(&location))
                .cloned()
                .unwrap_or_default();
            out.resize(len, 0);
            out
        }

        fn create_buffer(&self) -> GLuint {
            let mut s = self.state.borrow_mut();
            let handle = s.alloc();
            if handle != NO_OBJECT {
                s.buffers.insert(handle, Vec::new());
            }
            handle
        }

        fn bind_array_buffer(&self, buffer: GLuint) {
            self.state.borrow_mut().bound_array = buffer;
        }

        fn buffer_data(&self, data: Option<&[u8]>, size: usize, _usage: GLenum) {
            let mut s = self.state.borrow_mut();
            let bound = s.bound_array;
            let storage = match data {
                Some(d) => d.to_vec(),
                None => vec![0u8; size],
            };
            s.buffers.insert(bound, storage);
        }

        fn buffer_sub_data(&self, offset: usize, data: &[u8]) {
            let mut s = self.state.borrow_mut();
            let st = &mut *s;
            let Some(buf) = st.buffers.get_mut(&st.bound_array) else {
                return;
            };
            if offset + data.len() > buf.len() {
                st.error = gl::INVALID_VALUE;
                return;
            }
            buf[offset..offset + data.len()].copy_from_slice(data);
        }

        fn map_read(&self, offset: usize, size: usize) -> Vec<u8> {
            let s = self.state.borrow();
            s.buffers
                .get(&s.bound_array)
                .and_then(|buf| buf.get(offset..offset + size))
                .map(|slice| slice.to_vec())
                .unwrap_or_else(|| vec![0u8; size])
        }

        fn copy_buffer_sub_data(
            &self,
            src: GLuint,
            dst: GLuint,
            src_offset: usize,
            dst_offset: usize,
            size: usize,
        ) {
            let mut s = self.state.borrow_mut();
            let st = &mut *s;
            let Some(chunk) = st
                .buffers
                .get(&src)
                .and_then(|buf| buf.get(src_offset..src_offset + size))
                .map(|slice| slice.to_vec())
            else {
                st.error = gl::INVALID_VALUE;
                return;
            };
            let Some(buf) = st.buffers.get_mut(&dst) else {
                return;
            };
            if dst_offset + size > buf.len() {
                st.error = gl::INVALID_VALUE;
                return;
            }
            buf[dst_offset..dst_offset + size].copy_from_slice(&chunk);
        }

        fn bind_buffer_range(
            &self,
            target: GLenum,
            binding: u32,
            buffer: GLuint,
            offset: usize,
            size: usize,
        ) {
            self.state
                .borrow_mut()
                .range_bindings
                .insert((target, binding), (buffer, offset, size));
        }

        fn delete_buffer(&self, buffer: GLuint) {
            self.state.borrow_mut().buffers.remove(&buffer);
        }

        fn get_error(&self) -> GLenum {
            let mut s = self.state.borrow_mut();
            std::mem::replace(&mut s.error, gl::NO_ERROR)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn syntax_check_reports_the_offending_line() {
            let src = "void main() {\n    float x = 1.0\n}\n";
            let err = check_syntax(src).unwrap_err();
            assert!(err.contains("0:2"), "log was: {err}");
        }

        #[test]
        fn directives_and_comments_are_not_statements() {
            let src = "#version 430\n// setup\nvoid main() {}\n";
            assert!(check_syntax(src).is_ok());
        }
    }
}
