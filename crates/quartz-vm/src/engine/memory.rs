//! Interpreter-managed address space.
//!
//! Memory is a set of independent byte blocks (call frames, `MALLOC`
//! results). An address packs the block index into the high half of a
//! pointer word and the byte offset into the low half, so it fits exactly
//! in one pointer-sized slot of an extern aggregate. Block 0 is never
//! allocated: address 0 is null.
//!
//! Released blocks are never reused, so a dangling pointer reliably fails
//! with [`RuntimeError::InvalidAddress`] instead of aliasing a newer block.

use super::error::RuntimeError;

/// Bits of an address holding the offset within a block.
pub const OFFSET_BITS: u32 = usize::BITS / 2;
const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;
const MAX_BLOCK: u64 = (usize::MAX as u64) >> OFFSET_BITS;

#[derive(Debug)]
pub struct Memory {
    blocks: Vec<Option<Box<[u8]>>>,
    live: usize,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            blocks: vec![None],
            live: 0,
        }
    }

    /// Allocate a zeroed block and return the address of its first byte.
    pub fn alloc(&mut self, size: usize) -> Result<u64, RuntimeError> {
        let block = self.blocks.len() as u64;
        if size as u64 > OFFSET_MASK || block > MAX_BLOCK {
            return Err(RuntimeError::AllocationTooLarge(size));
        }
        self.blocks.push(Some(vec![0; size].into_boxed_slice()));
        self.live += 1;
        Ok(block << OFFSET_BITS)
    }

    /// Release the block starting at `address`.
    pub fn free(&mut self, address: u64) -> Result<(), RuntimeError> {
        let (block, offset) = split(address)?;
        match self.blocks.get_mut(block) {
            Some(slot) if slot.is_some() && offset == 0 => {
                *slot = None;
                self.live -= 1;
                Ok(())
            }
            _ => Err(RuntimeError::InvalidAddress(address)),
        }
    }

    pub fn read(&self, address: u64, len: usize) -> Result<&[u8], RuntimeError> {
        let (block, offset) = split(address)?;
        self.blocks
            .get(block)
            .and_then(|b| b.as_deref())
            .and_then(|b| b.get(offset..offset.checked_add(len)?))
            .ok_or(RuntimeError::InvalidAddress(address))
    }

    pub fn slice_mut(&mut self, address: u64, len: usize) -> Result<&mut [u8], RuntimeError> {
        let (block, offset) = split(address)?;
        self.blocks
            .get_mut(block)
            .and_then(|b| b.as_deref_mut())
            .and_then(|b| b.get_mut(offset..offset.checked_add(len)?))
            .ok_or(RuntimeError::InvalidAddress(address))
    }

    pub fn write(&mut self, address: u64, bytes: &[u8]) -> Result<(), RuntimeError> {
        self.slice_mut(address, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Number of allocated, not yet released blocks.
    pub fn live_blocks(&self) -> usize {
        self.live
    }
}

/// Move `address` by `delta` bytes within its block.
///
/// Only the offset half changes; leaving the representable range is an
/// error. Whether the result is in bounds is checked on access.
pub fn offset_address(address: u64, delta: i64) -> Result<u64, RuntimeError> {
    if address == 0 {
        return Err(RuntimeError::NullDereference);
    }
    let offset = (address & OFFSET_MASK) as i64;
    match offset.checked_add(delta) {
        Some(moved) if (0..=OFFSET_MASK as i64).contains(&moved) => {
            Ok((address & !OFFSET_MASK) | moved as u64)
        }
        _ => Err(RuntimeError::InvalidAddress(address)),
    }
}

fn split(address: u64) -> Result<(usize, usize), RuntimeError> {
    if address == 0 {
        return Err(RuntimeError::NullDereference);
    }
    Ok((
        (address >> OFFSET_BITS) as usize,
        (address & OFFSET_MASK) as usize,
    ))
}
