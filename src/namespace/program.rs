/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Program and uniform block queries.
//!
//! How much these commands write depends on the program object, which the
//! registry can only describe as `COMPSIZE(...)`. So their bound forms take a
//! caller-provided buffer. The helpers here ask the program how many values
//! to expect first, check indices against it, and return plain values.

use super::Namespace;
use crate::binding::{Arg, BoundCommand, Value};
use crate::error::CallError;

pub const GL_ACTIVE_UNIFORMS: u32 = 0x8B86;
pub const GL_ACTIVE_UNIFORM_BLOCK_MAX_NAME_LENGTH: u32 = 0x8A35;
pub const GL_ACTIVE_UNIFORM_BLOCKS: u32 = 0x8A36;
pub const GL_UNIFORM_BLOCK_ACTIVE_UNIFORMS: u32 = 0x8A42;
pub const GL_UNIFORM_BLOCK_ACTIVE_UNIFORM_INDICES: u32 = 0x8A43;

fn integer(command: &BoundCommand, value: Option<Value>) -> Result<i64, CallError> {
    value
        .as_ref()
        .and_then(Value::as_i64)
        .ok_or_else(|| CallError::UnexpectedResult {
            command: command.name().to_string(),
            expected: "an integer",
        })
}

/// One value on its own, anything else as a list.
fn scalar_or_list(values: Vec<i32>) -> Value {
    if let [value] = values[..] {
        return Value::Int(value.into());
    }
    Value::List(values.into_iter().map(|v| Value::Int(v.into())).collect())
}

impl Namespace {
    fn bound(&self, name: &str) -> Result<&BoundCommand, CallError> {
        self.command(name)
            .ok_or_else(|| CallError::NotBound(name.to_string()))
    }

    /// `glGetShaderiv`, returning the value.
    pub fn get_shader_iv(&self, shader: u32, pname: u32) -> Result<i64, CallError> {
        let command = self.bound("glGetShaderiv")?;
        integer(command, command.call([Arg::from(shader), Arg::from(pname)])?)
    }

    /// `glGetProgramiv`, returning the value. For
    /// `GL_COMPUTE_WORK_GROUP_SIZE` that's only the first of the three.
    pub fn get_program_iv(&self, program: u32, pname: u32) -> Result<i64, CallError> {
        let command = self.bound("glGetProgramiv")?;
        integer(command, command.call([Arg::from(program), Arg::from(pname)])?)
    }

    fn check_index(&self, program: u32, count_pname: u32, index: u32) -> Result<(), CallError> {
        let count = self.get_program_iv(program, count_pname)?;
        if i64::from(index) < count {
            Ok(())
        } else {
            Err(CallError::IndexOutOfRange { index, count })
        }
    }

    /// The name of an active uniform block of `program`.
    pub fn get_active_uniform_block_name(
        &self,
        program: u32,
        index: u32,
    ) -> Result<String, CallError> {
        self.check_index(program, GL_ACTIVE_UNIFORM_BLOCKS, index)?;
        let max_length = self.get_program_iv(program, GL_ACTIVE_UNIFORM_BLOCK_MAX_NAME_LENGTH)?;
        let command = self.bound("glGetActiveUniformBlockName")?;
        // (name, length)
        let result = command.call([Arg::from(program), Arg::from(index), Arg::from(max_length)])?;
        let name = match &result {
            Some(Value::List(values)) => values.first(),
            other => other.as_ref(),
        };
        name.and_then(Value::as_text)
            .map(str::to_string)
            .ok_or_else(|| CallError::UnexpectedResult {
                command: command.name().to_string(),
                expected: "a name",
            })
    }

    fn uniform_block_iv(
        &self,
        program: u32,
        index: u32,
        pname: u32,
        len: usize,
    ) -> Result<Vec<i32>, CallError> {
        let command = self.bound("glGetActiveUniformBlockiv")?;
        let mut params = vec![0i32; len];
        command.call([
            Arg::from(program),
            Arg::from(index),
            Arg::from(pname),
            Arg::from(&mut params),
        ])?;
        Ok(params)
    }

    /// `glGetActiveUniformBlockiv`. `GL_UNIFORM_BLOCK_ACTIVE_UNIFORM_INDICES`
    /// gives a list with an entry per active uniform of the block, anything
    /// else a single value.
    pub fn get_active_uniform_block_iv(
        &self,
        program: u32,
        index: u32,
        pname: u32,
    ) -> Result<Value, CallError> {
        self.check_index(program, GL_ACTIVE_UNIFORM_BLOCKS, index)?;
        if pname != GL_UNIFORM_BLOCK_ACTIVE_UNIFORM_INDICES {
            let params = self.uniform_block_iv(program, index, pname, 1)?;
            return Ok(scalar_or_list(params));
        }
        let active =
            self.uniform_block_iv(program, index, GL_UNIFORM_BLOCK_ACTIVE_UNIFORMS, 1)?[0];
        let params = self.uniform_block_iv(
            program,
            index,
            pname,
            usize::try_from(active).unwrap_or(0),
        )?;
        Ok(Value::List(
            params.into_iter().map(|v| Value::Int(v.into())).collect(),
        ))
    }

    /// `glGetActiveUniformsiv`: one value for each of `indices`, as a single
    /// value if there is only one.
    pub fn get_active_uniforms_iv(
        &self,
        program: u32,
        indices: &[u32],
        pname: u32,
    ) -> Result<Value, CallError> {
        let count = self.get_program_iv(program, GL_ACTIVE_UNIFORMS)?;
        if let Some(&index) = indices.iter().find(|&&index| i64::from(index) >= count) {
            return Err(CallError::IndexOutOfRange { index, count });
        }
        let command = self.bound("glGetActiveUniformsiv")?;
        let indices = indices.to_vec();
        let mut params = vec![0i32; indices.len()];
        command.call([
            Arg::from(program),
            Arg::from(&indices),
            Arg::from(pname),
            Arg::from(&mut params),
        ])?;
        Ok(scalar_or_list(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{NativeLibrary, RawValue, StubLibrary};
    use crate::namespace::Session;
    use crate::options::Options;
    use crate::registry::{ApiNumber, Registry};
    use std::rc::Rc;

    const REGISTRY: &str = r#"<registry>
    <types>
        <type>typedef unsigned int <name>GLenum</name>;</type>
        <type>typedef unsigned int <name>GLuint</name>;</type>
        <type>typedef int <name>GLint</name>;</type>
        <type>typedef int <name>GLsizei</name>;</type>
        <type>typedef char <name>GLchar</name>;</type>
    </types>
    <commands>
        <command>
            <proto>void <name>glGetShaderiv</name></proto>
            <param><ptype>GLuint</ptype> <name>shader</name></param>
            <param><ptype>GLenum</ptype> <name>pname</name></param>
            <param len="COMPSIZE(pname)"><ptype>GLint</ptype> *<name>params</name></param>
        </command>
        <command>
            <proto>void <name>glGetProgramiv</name></proto>
            <param><ptype>GLuint</ptype> <name>program</name></param>
            <param><ptype>GLenum</ptype> <name>pname</name></param>
            <param len="COMPSIZE(pname)"><ptype>GLint</ptype> *<name>params</name></param>
        </command>
        <command>
            <proto>void <name>glGetActiveUniformBlockName</name></proto>
            <param><ptype>GLuint</ptype> <name>program</name></param>
            <param><ptype>GLuint</ptype> <name>uniformBlockIndex</name></param>
            <param><ptype>GLsizei</ptype> <name>bufSize</name></param>
            <param len="1"><ptype>GLsizei</ptype> *<name>length</name></param>
            <param len="bufSize"><ptype>GLchar</ptype> *<name>uniformBlockName</name></param>
        </command>
        <command>
            <proto>void <name>glGetActiveUniformBlockiv</name></proto>
            <param><ptype>GLuint</ptype> <name>program</name></param>
            <param><ptype>GLuint</ptype> <name>uniformBlockIndex</name></param>
            <param><ptype>GLenum</ptype> <name>pname</name></param>
            <param len="COMPSIZE(program,uniformBlockIndex,pname)"><ptype>GLint</ptype> *<name>params</name></param>
        </command>
        <command>
            <proto>void <name>glGetActiveUniformsiv</name></proto>
            <param><ptype>GLuint</ptype> <name>program</name></param>
            <param><ptype>GLsizei</ptype> <name>uniformCount</name></param>
            <param len="uniformCount">const <ptype>GLuint</ptype> *<name>uniformIndices</name></param>
            <param><ptype>GLenum</ptype> <name>pname</name></param>
            <param len="COMPSIZE(uniformCount,pname)"><ptype>GLint</ptype> *<name>params</name></param>
        </command>
    </commands>
    <feature api="gl" name="GL_VERSION_3_1" number="3.1">
        <require>
            <command name="glGetShaderiv"/>
            <command name="glGetProgramiv"/>
            <command name="glGetActiveUniformBlockName"/>
            <command name="glGetActiveUniformBlockiv"/>
            <command name="glGetActiveUniformsiv"/>
        </require>
    </feature>
</registry>"#;

    const GL_COMPILE_STATUS: u32 = 0x8B81;
    const GL_UNIFORM_BLOCK_DATA_SIZE: u32 = 0x8A40;
    const GL_UNIFORM_TYPE: u32 = 0x8A37;

    fn pname(arg: &RawValue) -> u32 {
        arg.as_i64().unwrap() as u32
    }

    fn int_pointer(arg: &RawValue) -> *mut i32 {
        arg.as_pointer().unwrap().cast()
    }

    /// A program with two uniform blocks and three uniforms.
    fn program_library() -> Rc<dyn NativeLibrary> {
        Rc::new(
            StubLibrary::new()
                .with_function("glGetShaderiv", |args| {
                    unsafe { int_pointer(&args[2]).write(1) };
                    RawValue::Void
                })
                .with_function("glGetProgramiv", |args| {
                    let value = match pname(&args[1]) {
                        GL_ACTIVE_UNIFORM_BLOCKS => 2,
                        GL_ACTIVE_UNIFORM_BLOCK_MAX_NAME_LENGTH => 16,
                        GL_ACTIVE_UNIFORMS => 3,
                        _ => 0,
                    };
                    unsafe { int_pointer(&args[2]).write(value) };
                    RawValue::Void
                })
                .with_function("glGetActiveUniformBlockName", |args| {
                    let index = args[1].as_i64().unwrap();
                    let size = args[2].as_i64().unwrap() as usize;
                    let name = format!("Block{}\0", index);
                    assert!(name.len() <= size);
                    unsafe {
                        int_pointer(&args[3]).write(name.len() as i32 - 1);
                        let out = args[4].as_pointer().unwrap().cast::<u8>();
                        std::ptr::copy_nonoverlapping(name.as_ptr(), out, name.len());
                    }
                    RawValue::Void
                })
                .with_function("glGetActiveUniformBlockiv", |args| {
                    let params = int_pointer(&args[3]);
                    unsafe {
                        match pname(&args[2]) {
                            GL_UNIFORM_BLOCK_ACTIVE_UNIFORMS => params.write(2),
                            GL_UNIFORM_BLOCK_ACTIVE_UNIFORM_INDICES => {
                                params.write(4);
                                params.add(1).write(5);
                            }
                            _ => params.write(64),
                        }
                    }
                    RawValue::Void
                })
                .with_function("glGetActiveUniformsiv", |args| {
                    let count = args[1].as_i64().unwrap() as usize;
                    let indices = args[2].as_pointer().unwrap().cast::<u32>();
                    let params = int_pointer(&args[4]);
                    for i in 0..count {
                        unsafe { params.add(i).write(*indices.add(i) as i32 * 10) };
                    }
                    RawValue::Void
                }),
        )
    }

    fn options() -> Options {
        Options {
            version: Some(ApiNumber::new(3, 1)),
            ..Options::default()
        }
    }

    #[test]
    fn single_values() {
        let registry = Registry::parse(REGISTRY).unwrap();
        let session = Session::new(&registry, program_library(), &options()).unwrap();
        let gl = session.namespace();
        assert!(gl.skipped().is_empty());

        // the bound commands return the value themselves
        let get_shader = gl.command("glGetShaderiv").unwrap();
        assert_eq!(get_shader.arity(), 2);
        assert_eq!(
            get_shader.call([Arg::from(1), Arg::from(GL_COMPILE_STATUS)]),
            Ok(Some(Value::Int(1)))
        );

        assert_eq!(gl.get_shader_iv(1, GL_COMPILE_STATUS), Ok(1));
        assert_eq!(gl.get_program_iv(1, GL_ACTIVE_UNIFORMS), Ok(3));
    }

    #[test]
    fn uniform_blocks() {
        let registry = Registry::parse(REGISTRY).unwrap();
        let session = Session::new(&registry, program_library(), &options()).unwrap();
        let gl = session.namespace();

        assert_eq!(
            gl.get_active_uniform_block_name(1, 1).as_deref(),
            Ok("Block1")
        );
        assert_eq!(
            gl.get_active_uniform_block_name(1, 2),
            Err(CallError::IndexOutOfRange { index: 2, count: 2 })
        );

        assert_eq!(
            gl.get_active_uniform_block_iv(1, 0, GL_UNIFORM_BLOCK_DATA_SIZE),
            Ok(Value::Int(64))
        );
        assert_eq!(
            gl.get_active_uniform_block_iv(1, 0, GL_UNIFORM_BLOCK_ACTIVE_UNIFORM_INDICES),
            Ok(Value::List(vec![Value::Int(4), Value::Int(5)]))
        );
        assert!(matches!(
            gl.get_active_uniform_block_iv(1, 5, GL_UNIFORM_BLOCK_DATA_SIZE),
            Err(CallError::IndexOutOfRange { index: 5, .. })
        ));
    }

    #[test]
    fn uniforms() {
        let registry = Registry::parse(REGISTRY).unwrap();
        let session = Session::new(&registry, program_library(), &options()).unwrap();
        let gl = session.namespace();

        assert_eq!(
            gl.get_active_uniforms_iv(1, &[0, 2], GL_UNIFORM_TYPE),
            Ok(Value::List(vec![Value::Int(0), Value::Int(20)]))
        );
        assert_eq!(
            gl.get_active_uniforms_iv(1, &[1], GL_UNIFORM_TYPE),
            Ok(Value::Int(10))
        );
        assert_eq!(
            gl.get_active_uniforms_iv(1, &[1, 3], GL_UNIFORM_TYPE),
            Err(CallError::IndexOutOfRange { index: 3, count: 3 })
        );
    }

    #[test]
    fn missing_commands() {
        let registry = Registry::parse(REGISTRY).unwrap();
        let library: Rc<dyn NativeLibrary> = Rc::new(StubLibrary::new());
        let session = Session::new(&registry, library, &options()).unwrap();
        assert_eq!(
            session.namespace().get_program_iv(1, GL_ACTIVE_UNIFORMS),
            Err(CallError::NotBound("glGetProgramiv".to_string()))
        );
    }
}
