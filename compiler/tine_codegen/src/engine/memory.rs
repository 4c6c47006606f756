//! The memory image of one instance.
//!
//! ```text
//! 0                 null guard, never accessible
//! GUARD             global data, statics written at creation
//! stack_base        call frames, growing upwards
//! len               end of the image
//! ```
//!
//! Every access is bounds-checked against the image; a stray pointer is a
//! runtime error, never a host fault.

use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{CodeLocation, NativeType, Value};
use tine_types::{align_up, MAX_SIZE};

/// Bytes below the globals that no pointer may touch.
pub const GUARD: u32 = 16;

/// Default size of the call stack area.
pub const DEFAULT_STACK_SIZE: u32 = 64 * 1024;

/// Largest stack area an instance may ask for.
pub const MAX_STACK_SIZE: u32 = 64 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Memory {
    bytes: Vec<u8>,
    stack_base: u64,
}

impl Memory {
    pub fn new(
        globals_size: u32,
        statics: &[(u32, Value)],
        stack_size: u32,
    ) -> Result<Self, CompileError> {
        let refuse = |what: String| {
            CompileError::runtime(
                ErrorCode::E6007,
                format!("cannot allocate instance memory: {what}"),
                CodeLocation::SYNTHETIC,
            )
        };
        if globals_size > MAX_SIZE {
            return Err(refuse(format!("{globals_size} bytes of global data")));
        }
        if stack_size > MAX_STACK_SIZE {
            return Err(refuse(format!("a stack of {stack_size} bytes")));
        }
        let stack_base = align_up(GUARD + globals_size, 16);
        let len = stack_base as usize + stack_size as usize;
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(len).map_err(|e| refuse(e.to_string()))?;
        bytes.resize(len, 0);
        let mut memory = Memory {
            bytes,
            stack_base: u64::from(stack_base),
        };
        for &(offset, value) in statics {
            memory.write(global_address(offset), value)?;
        }
        Ok(memory)
    }

    pub fn stack_base(&self) -> u64 {
        self.stack_base
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// `true` if `[at, at + size)` lies inside the image.
    pub fn fits(&self, at: u64, size: u32) -> bool {
        at.checked_add(u64::from(size))
            .is_some_and(|end| end <= self.len())
    }

    fn range(&self, at: u64, size: u32) -> Result<std::ops::Range<usize>, CompileError> {
        if at < u64::from(GUARD) || !self.fits(at, size) {
            return Err(CompileError::runtime(
                ErrorCode::E6004,
                format!("invalid memory access of {size} bytes at {at:#x}"),
                CodeLocation::SYNTHETIC,
            ));
        }
        let start = at as usize;
        Ok(start..start + size as usize)
    }

    pub fn read(&self, ty: NativeType, at: u64) -> Result<Value, CompileError> {
        let range = self.range(at, ty.size())?;
        Value::from_le_bytes(ty, &self.bytes[range]).ok_or_else(|| {
            CompileError::internal(format!("load of {}", ty.name()), CodeLocation::SYNTHETIC)
        })
    }

    pub fn write(&mut self, at: u64, value: Value) -> Result<(), CompileError> {
        let (bytes, len) = value.to_le_bytes();
        let range = self.range(at, len as u32)?;
        self.bytes[range].copy_from_slice(&bytes[..len]);
        Ok(())
    }

    /// Raw 8-byte slot, used for memory-backed registers.
    pub fn read_slot(&self, at: u64) -> Result<u64, CompileError> {
        let range = self.range(at, 8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.bytes[range]);
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn write_slot(&mut self, at: u64, bits: u64) -> Result<(), CompileError> {
        let range = self.range(at, 8)?;
        self.bytes[range].copy_from_slice(&bits.to_le_bytes());
        Ok(())
    }

    /// Overlapping ranges copy as if through a temporary.
    pub fn copy(&mut self, dst: u64, src: u64, size: u32) -> Result<(), CompileError> {
        if size == 0 {
            return Ok(());
        }
        let from = self.range(src, size)?;
        let to = self.range(dst, size)?;
        self.bytes.copy_within(from, to.start);
        Ok(())
    }

    pub fn zero(&mut self, dst: u64, size: u32) -> Result<(), CompileError> {
        if size == 0 {
            return Ok(());
        }
        let range = self.range(dst, size)?;
        self.bytes[range].fill(0);
        Ok(())
    }
}

/// Image address of a global data offset.
pub fn global_address(offset: u32) -> u64 {
    u64::from(GUARD) + u64::from(offset)
}

#[cfg(test)]
mod tests;
