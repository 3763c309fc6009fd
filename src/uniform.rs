//! Value-binding descriptors produced by program introspection.
//!
//! A [`Uniform`] is a named, typed, program-scoped value slot; a
//! [`UniformBlock`] is a named, indexed group of uniforms backed by a buffer
//! binding point. [`crate::Program`] constructs these after a successful link
//! and routes its name-indexed `get`/`set` calls through them. The actual
//! native upload/readback goes through the [`GlApi`] seam.

use std::cell::Cell;

use gl::types::{GLenum, GLint, GLuint};

use crate::api::GlApi;
use crate::error::{Error, Result};

/// A host-side uniform value.
///
/// Scalars and flat component vectors cover every type in the supported
/// table below (vectors and matrices are their column-major components).
/// Boolean uniforms marshal through the native int path but read back as
/// [`UniformValue::Bool`]/[`UniformValue::Bools`]. [`UniformValue::Block`]
/// is the binding point of a uniform block.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Bool(bool),
    /// Components of a vector, matrix, or array uniform.
    Floats(Vec<f32>),
    Ints(Vec<i32>),
    UInts(Vec<u32>),
    Bools(Vec<bool>),
    /// Binding point of a uniform block.
    Block(u32),
}

impl UniformValue {
    fn to_f32(&self) -> Option<Vec<f32>> {
        match self {
            Self::Float(v) => Some(vec![*v]),
            Self::Int(v) => Some(vec![*v as f32]),
            Self::UInt(v) => Some(vec![*v as f32]),
            Self::Bool(v) => Some(vec![*v as i32 as f32]),
            Self::Floats(v) => Some(v.clone()),
            Self::Ints(v) => Some(v.iter().map(|&x| x as f32).collect()),
            Self::UInts(v) => Some(v.iter().map(|&x| x as f32).collect()),
            Self::Bools(v) => Some(v.iter().map(|&x| x as i32 as f32).collect()),
            Self::Block(_) => None,
        }
    }

    fn to_i32(&self) -> Option<Vec<i32>> {
        match self {
            Self::Float(v) => Some(vec![*v as i32]),
            Self::Int(v) => Some(vec![*v]),
            Self::UInt(v) => Some(vec![*v as i32]),
            Self::Bool(v) => Some(vec![*v as i32]),
            Self::Floats(v) => Some(v.iter().map(|&x| x as i32).collect()),
            Self::Ints(v) => Some(v.clone()),
            Self::UInts(v) => Some(v.iter().map(|&x| x as i32).collect()),
            Self::Bools(v) => Some(v.iter().map(|&x| x as i32).collect()),
            Self::Block(_) => None,
        }
    }

    fn to_u32(&self) -> Option<Vec<u32>> {
        match self {
            Self::Float(v) => Some(vec![*v as u32]),
            Self::Int(v) => Some(vec![*v as u32]),
            Self::UInt(v) => Some(vec![*v]),
            Self::Bool(v) => Some(vec![*v as u32]),
            Self::Floats(v) => Some(v.iter().map(|&x| x as u32).collect()),
            Self::Ints(v) => Some(v.iter().map(|&x| x as u32).collect()),
            Self::UInts(v) => Some(v.clone()),
            Self::Bools(v) => Some(v.iter().map(|&x| x as u32).collect()),
            Self::Block(_) => None,
        }
    }
}

/// Scalar family a uniform type marshals through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scalar {
    Float,
    Int,
    UInt,
    Bool,
}

/// Scalar family and per-element component count for a GL uniform type.
///
/// Returns `None` for types this crate cannot marshal; introspection turns
/// that into [`Error::UnsupportedUniform`] so a program never carries a
/// uniform it cannot service. Sampler and image types marshal as a single
/// int (the texture/image unit), matching native semantics.
pub(crate) fn describe(gl_type: GLenum) -> Option<(Scalar, usize)> {
    let desc = match gl_type {
        gl::FLOAT => (Scalar::Float, 1),
        gl::FLOAT_VEC2 => (Scalar::Float, 2),
        gl::FLOAT_VEC3 => (Scalar::Float, 3),
        gl::FLOAT_VEC4 => (Scalar::Float, 4),
        gl::FLOAT_MAT2 => (Scalar::Float, 4),
        gl::FLOAT_MAT3 => (Scalar::Float, 9),
        gl::FLOAT_MAT4 => (Scalar::Float, 16),
        gl::INT => (Scalar::Int, 1),
        gl::INT_VEC2 => (Scalar::Int, 2),
        gl::INT_VEC3 => (Scalar::Int, 3),
        gl::INT_VEC4 => (Scalar::Int, 4),
        gl::UNSIGNED_INT => (Scalar::UInt, 1),
        gl::UNSIGNED_INT_VEC2 => (Scalar::UInt, 2),
        gl::UNSIGNED_INT_VEC3 => (Scalar::UInt, 3),
        gl::UNSIGNED_INT_VEC4 => (Scalar::UInt, 4),
        gl::BOOL => (Scalar::Bool, 1),
        gl::BOOL_VEC2 => (Scalar::Bool, 2),
        gl::BOOL_VEC3 => (Scalar::Bool, 3),
        gl::BOOL_VEC4 => (Scalar::Bool, 4),
        gl::SAMPLER_2D
        | gl::SAMPLER_3D
        | gl::SAMPLER_CUBE
        | gl::SAMPLER_2D_ARRAY
        | gl::IMAGE_2D
        | gl::UNSIGNED_INT_ATOMIC_COUNTER => (Scalar::Int, 1),
        _ => return None,
    };
    Some(desc)
}

/// An active uniform of a linked program.
///
/// Holds everything needed to marshal values without consulting the program
/// again: the owning program handle, the reported name (array `[0]` suffix
/// already stripped by introspection), the GL type, the array size (`> 1`
/// only for array uniforms), and the resolved location.
#[derive(Debug)]
pub struct Uniform {
    program: GLuint,
    name: String,
    gl_type: GLenum,
    array_size: usize,
    location: GLint,
}

impl Uniform {
    pub(crate) fn new(
        program: GLuint,
        name: String,
        gl_type: GLenum,
        array_size: usize,
        location: GLint,
    ) -> Self {
        Self {
            program,
            name,
            gl_type,
            array_size,
            location,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gl_type(&self) -> GLenum {
        self.gl_type
    }

    /// Number of array elements. 1 for non-array uniforms.
    pub fn array_size(&self) -> usize {
        self.array_size
    }

    pub fn location(&self) -> GLint {
        self.location
    }

    /// Total component count across all array elements.
    fn component_count(&self) -> Result<(Scalar, usize)> {
        let (scalar, comps) = describe(self.gl_type).ok_or_else(|| Error::UnsupportedUniform {
            name: self.name.clone(),
            gl_type: self.gl_type,
        })?;
        Ok((scalar, comps * self.array_size))
    }

    /// Read the current value back from the native program.
    pub(crate) fn get(&self, api: &dyn GlApi) -> Result<UniformValue> {
        let (scalar, total) = self.component_count()?;
        let value = match scalar {
            Scalar::Float => {
                let data = api.get_uniform_f32(self.program, self.location, total);
                if total == 1 {
                    UniformValue::Float(data[0])
                } else {
                    UniformValue::Floats(data)
                }
            }
            Scalar::Int => {
                let data = api.get_uniform_i32(self.program, self.location, total);
                if total == 1 {
                    UniformValue::Int(data[0])
                } else {
                    UniformValue::Ints(data)
                }
            }
            Scalar::UInt => {
                let data = api.get_uniform_u32(self.program, self.location, total);
                if total == 1 {
                    UniformValue::UInt(data[0])
                } else {
                    UniformValue::UInts(data)
                }
            }
            Scalar::Bool => {
                let data = api.get_uniform_i32(self.program, self.location, total);
                if total == 1 {
                    UniformValue::Bool(data[0] != 0)
                } else {
                    UniformValue::Bools(data.into_iter().map(|x| x != 0).collect())
                }
            }
        };
        Ok(value)
    }

    /// Upload a value. The owning program must be the active program.
    pub(crate) fn set(&self, api: &dyn GlApi, value: &UniformValue) -> Result<()> {
        let (scalar, total) = self.component_count()?;
        let count = self.array_size as GLint;
        match scalar {
            Scalar::Float => {
                let data = self.checked(value.to_f32(), total)?;
                api.uniform_f32(self.location, self.gl_type, count, &data);
            }
            Scalar::Int | Scalar::Bool => {
                let data = self.checked(value.to_i32(), total)?;
                api.uniform_i32(self.location, self.gl_type, count, &data);
            }
            Scalar::UInt => {
                let data = self.checked(value.to_u32(), total)?;
                api.uniform_u32(self.location, self.gl_type, count, &data);
            }
        }
        Ok(())
    }

    fn checked<T>(&self, data: Option<Vec<T>>, expected: usize) -> Result<Vec<T>> {
        let data = data.unwrap_or_default();
        if data.len() != expected {
            return Err(Error::UniformValueSize {
                name: self.name.clone(),
                expected,
                got: data.len(),
            });
        }
        Ok(data)
    }
}

/// An active uniform block of a linked program.
#[derive(Debug)]
pub struct UniformBlock {
    program: GLuint,
    name: String,
    index: u32,
    size: usize,
    binding: Cell<u32>,
}

impl UniformBlock {
    pub(crate) fn new(program: GLuint, name: String, index: u32, size: usize) -> Self {
        Self {
            program,
            name,
            index,
            size,
            binding: Cell::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block index within the owning program.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Minimum backing-buffer size in bytes, as reported by the linker.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The binding point this block was last assigned to.
    pub fn binding(&self) -> u32 {
        self.binding.get()
    }

    /// Assign the block to an indexed uniform-buffer binding point.
    pub(crate) fn set_binding(&self, api: &dyn GlApi, binding: u32) {
        api.uniform_block_binding(self.program, self.index, binding);
        self.binding.set(binding);
    }
}
