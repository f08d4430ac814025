use super::error::RuntimeError;
use super::memory::{Memory, OFFSET_BITS, offset_address};

#[test]
fn alloc_returns_distinct_zeroed_blocks() {
    let mut memory = Memory::new();
    let a = memory.alloc(16).unwrap();
    let b = memory.alloc(8).unwrap();

    assert_ne!(a, 0);
    assert_ne!(a, b);
    assert_eq!(a >> OFFSET_BITS, 1);
    assert_eq!(b >> OFFSET_BITS, 2);
    assert_eq!(memory.read(a, 16).unwrap(), &[0u8; 16]);
    assert_eq!(memory.live_blocks(), 2);
}

#[test]
fn write_then_read_within_block() {
    let mut memory = Memory::new();
    let base = memory.alloc(8).unwrap();
    let mid = offset_address(base, 4).unwrap();

    memory.write(mid, &[1, 2, 3, 4]).unwrap();

    assert_eq!(memory.read(base, 8).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);
    assert_eq!(memory.read(mid, 2).unwrap(), &[1, 2]);
}

#[test]
fn out_of_bounds_access_fails() {
    let mut memory = Memory::new();
    let base = memory.alloc(4).unwrap();
    let end = offset_address(base, 4).unwrap();

    assert_eq!(memory.read(base, 5), Err(RuntimeError::InvalidAddress(base)));
    assert_eq!(memory.read(end, 1), Err(RuntimeError::InvalidAddress(end)));
    assert_eq!(memory.read(end, 0).unwrap(), &[] as &[u8]);
    assert_eq!(
        memory.write(end, &[9]),
        Err(RuntimeError::InvalidAddress(end))
    );
}

#[test]
fn null_is_never_addressable() {
    let mut memory = Memory::new();
    memory.alloc(4).unwrap();

    assert_eq!(memory.read(0, 1), Err(RuntimeError::NullDereference));
    assert_eq!(memory.write(0, &[1]), Err(RuntimeError::NullDereference));
    assert_eq!(offset_address(0, 8), Err(RuntimeError::NullDereference));
}

#[test]
fn freed_blocks_stay_dead() {
    let mut memory = Memory::new();
    let a = memory.alloc(4).unwrap();
    memory.free(a).unwrap();
    let b = memory.alloc(4).unwrap();

    assert_ne!(a, b);
    assert_eq!(memory.read(a, 1), Err(RuntimeError::InvalidAddress(a)));
    assert_eq!(memory.free(a), Err(RuntimeError::InvalidAddress(a)));
    assert_eq!(memory.live_blocks(), 1);
}

#[test]
fn free_requires_block_start() {
    let mut memory = Memory::new();
    let a = memory.alloc(4).unwrap();
    let inner = offset_address(a, 1).unwrap();

    assert_eq!(memory.free(inner), Err(RuntimeError::InvalidAddress(inner)));
    assert_eq!(memory.live_blocks(), 1);
}

#[test]
fn offset_address_stays_in_block() {
    let mut memory = Memory::new();
    let a = memory.alloc(4).unwrap();

    let moved = offset_address(a, 3).unwrap();
    assert_eq!(offset_address(moved, -3).unwrap(), a);
    assert_eq!(offset_address(a, -1), Err(RuntimeError::InvalidAddress(a)));
    // Past the end is representable; the access is what fails.
    let past = offset_address(a, 100).unwrap();
    assert_eq!(past >> OFFSET_BITS, a >> OFFSET_BITS);
    assert!(memory.read(past, 1).is_err());
}
