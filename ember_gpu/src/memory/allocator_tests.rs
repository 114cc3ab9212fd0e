/// Unit tests for MemoryAllocator.

use std::sync::{Arc, Mutex};

use super::*;
use crate::device::mock_graphics_device::{MockCall, MockDeviceState, MockGraphicsDevice};
use crate::error::Error;

fn allocator() -> (MemoryAllocator, Arc<Mutex<MockDeviceState>>) {
    let device = MockGraphicsDevice::new();
    let state = device.state();
    (MemoryAllocator::new(Box::new(device), AllocatorConfig::default()), state)
}

fn created_buffers(state: &Arc<Mutex<MockDeviceState>>) -> usize {
    state.lock().unwrap().count_calls(|c| matches!(c, MockCall::CreateBuffer { .. }))
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn test_allocate_returns_live_buffer() {
    let (mut alloc, _state) = allocator();
    let buffer = alloc
        .allocate(256, BufferUsage::TRANSFER_DST | BufferUsage::VERTEX, MemoryClass::DeviceLocal)
        .unwrap();

    assert_eq!(buffer.size(), 256);
    assert_eq!(buffer.memory_class(), MemoryClass::DeviceLocal);
    assert!(buffer.usage().contains(BufferUsage::VERTEX));
    assert!(alloc.is_live(&buffer));
    assert!(alloc.resolve(&buffer).is_ok());
}

#[test]
fn test_allocate_zero_size_never_reaches_device() {
    let (mut alloc, state) = allocator();

    let result = alloc.allocate(0, BufferUsage::VERTEX, MemoryClass::DeviceLocal);
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert_eq!(created_buffers(&state), 0);
}

#[test]
fn test_allocate_rejects_oversized_and_empty_usage() {
    let device = MockGraphicsDevice::new();
    let state = device.state();
    let config = AllocatorConfig { max_buffer_size: 1024, ..Default::default() };
    let mut alloc = MemoryAllocator::new(Box::new(device), config);

    assert!(matches!(
        alloc.allocate(2048, BufferUsage::VERTEX, MemoryClass::DeviceLocal),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        alloc.allocate(16, BufferUsage::empty(), MemoryClass::DeviceLocal),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(created_buffers(&state), 0);
}

#[test]
fn test_allocate_propagates_out_of_memory() {
    let (mut alloc, state) = allocator();
    state.lock().unwrap().fail_next_buffer = Some(Error::OutOfDeviceMemory);

    let result = alloc.allocate(64, BufferUsage::VERTEX, MemoryClass::DeviceLocal);
    assert_eq!(result, Err(Error::OutOfDeviceMemory));
    assert_eq!(alloc.stats().live_buffers, 0);
}

// ============================================================================
// Free / use-after-free
// ============================================================================

#[test]
fn test_free_releases_buffer_and_memory_together() {
    let (mut alloc, state) = allocator();
    let buffer = alloc.allocate(32, BufferUsage::VERTEX, MemoryClass::DeviceLocal).unwrap();
    let raw = alloc.resolve(&buffer).unwrap();

    alloc.free(&buffer).unwrap();

    assert!(!alloc.is_live(&buffer));
    let state = state.lock().unwrap();
    assert!(state.contents(raw).is_none());
    assert_eq!(state.count_calls(|c| *c == MockCall::DestroyBuffer { id: raw.buffer.0 }), 1);
}

#[test]
fn test_double_free_is_detected() {
    let (mut alloc, state) = allocator();
    let buffer = alloc.allocate(32, BufferUsage::VERTEX, MemoryClass::DeviceLocal).unwrap();

    alloc.free(&buffer).unwrap();
    assert!(matches!(alloc.free(&buffer), Err(Error::DoubleFree(_))));

    // The device saw exactly one destroy
    let destroys = state.lock().unwrap().count_calls(|c| matches!(c, MockCall::DestroyBuffer { .. }));
    assert_eq!(destroys, 1);
}

#[test]
fn test_operations_after_free_are_use_after_free() {
    let (mut alloc, _state) = allocator();
    let host = alloc.allocate(16, BufferUsage::TRANSFER_SRC, MemoryClass::HostVisible).unwrap();
    let device = alloc
        .allocate(16, BufferUsage::TRANSFER_DST | BufferUsage::VERTEX, MemoryClass::DeviceLocal)
        .unwrap();

    alloc.free(&host).unwrap();

    assert!(matches!(alloc.resolve(&host), Err(Error::UseAfterFree(_))));
    assert!(matches!(alloc.write(&host, 0, &[1, 2]), Err(Error::UseAfterFree(_))));
    assert!(matches!(alloc.read(&host, 0, 2), Err(Error::UseAfterFree(_))));
    assert!(matches!(alloc.copy(&host, &device, 16), Err(Error::UseAfterFree(_))));
}

#[test]
fn test_reused_slot_does_not_revive_old_handle() {
    let (mut alloc, _state) = allocator();
    let first = alloc.allocate(8, BufferUsage::VERTEX, MemoryClass::DeviceLocal).unwrap();
    alloc.free(&first).unwrap();

    let second = alloc.allocate(8, BufferUsage::VERTEX, MemoryClass::DeviceLocal).unwrap();
    assert!(alloc.is_live(&second));
    assert!(!alloc.is_live(&first));
    assert!(matches!(alloc.free(&first), Err(Error::DoubleFree(_))));
}

#[test]
fn test_empty_buffer_semantics() {
    let (mut alloc, state) = allocator();
    let empty = BufferObject::empty();

    assert!(empty.is_empty());
    assert_eq!(empty.size(), 0);
    assert!(!alloc.is_live(&empty));
    assert!(matches!(alloc.resolve(&empty), Err(Error::InvalidArgument(_))));
    assert!(alloc.free(&empty).is_ok());
    assert!(state.lock().unwrap().calls.is_empty());
}

// ============================================================================
// Host access / copy
// ============================================================================

#[test]
fn test_write_and_read_host_visible() {
    let (mut alloc, _state) = allocator();
    let buffer = alloc.allocate(8, BufferUsage::TRANSFER_SRC, MemoryClass::HostVisible).unwrap();

    alloc.write(&buffer, 2, &[9, 8, 7]).unwrap();
    assert_eq!(alloc.read(&buffer, 0, 8).unwrap(), vec![0, 0, 9, 8, 7, 0, 0, 0]);
}

#[test]
fn test_write_is_bounds_checked() {
    let (mut alloc, state) = allocator();
    let buffer = alloc.allocate(4, BufferUsage::TRANSFER_SRC, MemoryClass::HostVisible).unwrap();

    assert!(matches!(alloc.write(&buffer, 2, &[1, 2, 3]), Err(Error::InvalidArgument(_))));
    assert!(matches!(alloc.write(&buffer, u64::MAX, &[1]), Err(Error::InvalidArgument(_))));
    assert!(state.lock().unwrap().count_calls(|c| matches!(c, MockCall::Map { .. })) == 0);
}

#[test]
fn test_write_requires_host_visible() {
    let (mut alloc, _state) = allocator();
    let buffer = alloc.allocate(4, BufferUsage::VERTEX, MemoryClass::DeviceLocal).unwrap();

    assert!(matches!(alloc.write(&buffer, 0, &[1]), Err(Error::InvalidArgument(_))));
    assert!(matches!(alloc.read(&buffer, 0, 1), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_copy_validates_usage_and_size() {
    let (mut alloc, _state) = allocator();
    let src = alloc.allocate(16, BufferUsage::TRANSFER_SRC, MemoryClass::HostVisible).unwrap();
    let dst = alloc
        .allocate(8, BufferUsage::TRANSFER_DST | BufferUsage::VERTEX, MemoryClass::DeviceLocal)
        .unwrap();
    let no_dst = alloc.allocate(16, BufferUsage::VERTEX, MemoryClass::DeviceLocal).unwrap();

    assert!(matches!(alloc.copy(&src, &dst, 16), Err(Error::InvalidArgument(_))));
    assert!(matches!(alloc.copy(&src, &dst, 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(alloc.copy(&src, &no_dst, 8), Err(Error::InvalidArgument(_))));
    assert!(matches!(alloc.copy(&dst, &src, 8), Err(Error::InvalidArgument(_))));
    assert!(alloc.copy(&src, &dst, 8).is_ok());
}

// ============================================================================
// Stats / shutdown
// ============================================================================

#[test]
fn test_stats_track_live_bytes_per_class() {
    let (mut alloc, _state) = allocator();
    let a = alloc.allocate(100, BufferUsage::TRANSFER_SRC, MemoryClass::HostVisible).unwrap();
    let b = alloc.allocate(300, BufferUsage::VERTEX, MemoryClass::DeviceLocal).unwrap();

    let stats = alloc.stats();
    assert_eq!(stats.live_buffers, 2);
    assert_eq!(stats.live_bytes(MemoryClass::HostVisible), 100);
    assert_eq!(stats.live_bytes(MemoryClass::DeviceLocal), 300);

    alloc.free(&a).unwrap();
    alloc.free(&b).unwrap();
    let stats = alloc.stats();
    assert_eq!(stats.live_buffers, 0);
    assert_eq!(stats.total_allocations, 2);
    assert_eq!(stats.total_frees, 2);
    assert_eq!(stats.live_bytes(MemoryClass::DeviceLocal), 0);
}

#[test]
fn test_shutdown_releases_leaked_buffers() {
    let (mut alloc, state) = allocator();
    let _leaked = alloc.allocate(64, BufferUsage::VERTEX, MemoryClass::DeviceLocal).unwrap();

    alloc.shutdown().unwrap();

    let state = state.lock().unwrap();
    assert!(state.buffers.is_empty());
    assert!(state.shut_down);
    assert_eq!(state.count_calls(|c| *c == MockCall::Shutdown), 1);
}

#[test]
fn test_drop_tears_down_once() {
    let (alloc, state) = allocator();
    drop(alloc);

    let state = state.lock().unwrap();
    assert!(state.shut_down);
    assert_eq!(state.count_calls(|c| *c == MockCall::Shutdown), 1);
}
