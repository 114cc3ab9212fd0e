/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Keeps buffer contents in host memory, records every call in order and can
/// be told to fail the next buffer creation. The state lives behind an
/// `Arc<Mutex<_>>` so tests keep a handle after boxing the device.

use std::sync::{Arc, Mutex, MutexGuard};
use rustc_hash::FxHashMap;

use crate::device::{
    GraphicsDevice, MappedReader, MappedWriter, BufferDesc, BufferUsage, MemoryClass,
    RawBuffer, DeviceBufferId, AllocationId, DescriptorPoolDesc, DescriptorPoolId,
    DescriptorSetId, DescriptorSetLayoutId,
};
use crate::error::{Error, Result};

// ============================================================================
// Recorded calls
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    CreateBuffer { id: u64, size: u64, memory_class: MemoryClass },
    DestroyBuffer { id: u64 },
    Map { id: u64 },
    Unmap { id: u64 },
    CopyBuffer { src: u64, dst: u64, size: u64 },
    CreateDescriptorPool { id: u64 },
    AllocateDescriptorSets { pool: u64, count: u32 },
    FreeDescriptorSets { pool: u64, count: usize },
    DestroyDescriptorPool { id: u64 },
    WaitIdle,
    Shutdown,
}

// ============================================================================
// Mock state
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub allocation: u64,
    pub usage: BufferUsage,
    pub memory_class: MemoryClass,
    pub name: &'static str,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct MockPool {
    pub desc: DescriptorPoolDesc,
    pub sets: Vec<u64>,
}

#[derive(Debug, Default)]
pub struct MockDeviceState {
    next_id: u64,
    pub buffers: FxHashMap<u64, MockBuffer>,
    pub pools: FxHashMap<u64, MockPool>,
    pub calls: Vec<MockCall>,
    pub mapped: Vec<u64>,
    pub fail_next_buffer: Option<Error>,
    /// Successful creations to let through before `fail_next_buffer` fires
    pub fail_after: usize,
    pub shut_down: bool,
}

impl MockDeviceState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Contents of a live buffer
    pub fn contents(&self, buffer: RawBuffer) -> Option<&[u8]> {
        self.buffers.get(&buffer.buffer.0).map(|b| b.data.as_slice())
    }

    /// Number of recorded calls matching `predicate`
    pub fn count_calls(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    fn buffer(&self, buffer: RawBuffer) -> Result<&MockBuffer> {
        self.buffers
            .get(&buffer.buffer.0)
            .filter(|b| b.allocation == buffer.allocation.0)
            .ok_or_else(|| Error::BackendError(format!("unknown buffer {}", buffer.buffer.0)))
    }

    fn range(data_len: usize, offset: u64, size: u64) -> Result<std::ops::Range<usize>> {
        let start = offset as usize;
        let end = offset
            .checked_add(size)
            .map(|end| end as usize)
            .filter(|&end| end <= data_len)
            .ok_or_else(|| Error::BackendError(format!(
                "mapped range {}+{} exceeds buffer of {} bytes", offset, size, data_len
            )))?;
        Ok(start..end)
    }
}

// ============================================================================
// Mock device
// ============================================================================

pub struct MockGraphicsDevice {
    state: Arc<Mutex<MockDeviceState>>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(MockDeviceState::default())) }
    }

    /// Shared handle on the mock state (survives boxing the device)
    pub fn state(&self) -> Arc<Mutex<MockDeviceState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> MutexGuard<'_, MockDeviceState> {
        self.state.lock().unwrap()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<RawBuffer> {
        let mut state = self.lock();
        if state.fail_next_buffer.is_some() {
            if state.fail_after > 0 {
                state.fail_after -= 1;
            } else if let Some(err) = state.fail_next_buffer.take() {
                return Err(err);
            }
        }
        let id = state.next_id();
        let allocation = state.next_id();
        state.buffers.insert(id, MockBuffer {
            allocation,
            usage: desc.usage,
            memory_class: desc.memory_class,
            name: desc.name,
            data: vec![0; desc.size as usize],
        });
        state.calls.push(MockCall::CreateBuffer { id, size: desc.size, memory_class: desc.memory_class });
        Ok(RawBuffer { buffer: DeviceBufferId(id), allocation: AllocationId(allocation) })
    }

    fn destroy_buffer(&mut self, buffer: RawBuffer) -> Result<()> {
        let mut state = self.lock();
        state.buffer(buffer)?;
        state.buffers.remove(&buffer.buffer.0);
        state.calls.push(MockCall::DestroyBuffer { id: buffer.buffer.0 });
        Ok(())
    }

    fn write_mapped(
        &mut self,
        buffer: RawBuffer,
        offset: u64,
        size: u64,
        writer: &mut MappedWriter<'_>,
    ) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let id = buffer.buffer.0;
        let target = state.buffer(buffer)?;
        if !target.memory_class.is_host_mappable() {
            return Err(Error::BackendError(format!("buffer {} is not host-visible", id)));
        }
        let range = MockDeviceState::range(target.data.len(), offset, size)?;

        state.calls.push(MockCall::Map { id });
        state.mapped.push(id);
        let result = match state.buffers.get_mut(&id) {
            Some(target) => writer(&mut target.data[range]),
            None => Err(Error::BackendError(format!("unknown buffer {}", id))),
        };
        state.mapped.retain(|&mapped| mapped != id);
        state.calls.push(MockCall::Unmap { id });
        result
    }

    fn read_mapped(
        &mut self,
        buffer: RawBuffer,
        offset: u64,
        size: u64,
        reader: &mut MappedReader<'_>,
    ) -> Result<()> {
        let mut state = self.lock();
        let id = buffer.buffer.0;
        let target = state.buffer(buffer)?;
        if !target.memory_class.is_host_mappable() {
            return Err(Error::BackendError(format!("buffer {} is not host-visible", id)));
        }
        let range = MockDeviceState::range(target.data.len(), offset, size)?;
        let bytes = target.data[range].to_vec();

        state.calls.push(MockCall::Map { id });
        let result = reader(&bytes);
        state.calls.push(MockCall::Unmap { id });
        result
    }

    fn copy_buffer(&mut self, src: RawBuffer, dst: RawBuffer, size: u64) -> Result<()> {
        let mut state = self.lock();
        let src_data = state.buffer(src)?.data.clone();
        let range = MockDeviceState::range(src_data.len(), 0, size)?;
        let dst_len = state.buffer(dst)?.data.len();
        MockDeviceState::range(dst_len, 0, size)?;

        if let Some(target) = state.buffers.get_mut(&dst.buffer.0) {
            target.data[range.clone()].copy_from_slice(&src_data[range]);
        }
        state.calls.push(MockCall::CopyBuffer { src: src.buffer.0, dst: dst.buffer.0, size });
        Ok(())
    }

    fn create_descriptor_pool(&mut self, desc: &DescriptorPoolDesc) -> Result<DescriptorPoolId> {
        let mut state = self.lock();
        let id = state.next_id();
        state.pools.insert(id, MockPool { desc: *desc, sets: Vec::new() });
        state.calls.push(MockCall::CreateDescriptorPool { id });
        Ok(DescriptorPoolId(id))
    }

    fn allocate_descriptor_sets(
        &mut self,
        pool: DescriptorPoolId,
        _layout: DescriptorSetLayoutId,
        count: u32,
    ) -> Result<Vec<DescriptorSetId>> {
        let mut state = self.lock();
        let ids: Vec<u64> = (0..count).map(|_| state.next_id()).collect();
        let target = state
            .pools
            .get_mut(&pool.0)
            .ok_or_else(|| Error::BackendError(format!("unknown descriptor pool {}", pool.0)))?;
        if target.sets.len() + count as usize > target.desc.max_sets as usize {
            return Err(Error::BackendError("descriptor pool out of memory".to_string()));
        }
        target.sets.extend(&ids);
        state.calls.push(MockCall::AllocateDescriptorSets { pool: pool.0, count });
        Ok(ids.into_iter().map(DescriptorSetId).collect())
    }

    fn free_descriptor_sets(&mut self, pool: DescriptorPoolId, sets: &[DescriptorSetId]) -> Result<()> {
        let mut state = self.lock();
        let target = state
            .pools
            .get_mut(&pool.0)
            .ok_or_else(|| Error::BackendError(format!("unknown descriptor pool {}", pool.0)))?;
        if !target.desc.allow_individual_free {
            return Err(Error::BackendError("pool does not allow freeing individual sets".to_string()));
        }
        target.sets.retain(|id| !sets.iter().any(|set| set.0 == *id));
        state.calls.push(MockCall::FreeDescriptorSets { pool: pool.0, count: sets.len() });
        Ok(())
    }

    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolId) -> Result<()> {
        let mut state = self.lock();
        if state.pools.remove(&pool.0).is_none() {
            return Err(Error::BackendError(format!("unknown descriptor pool {}", pool.0)));
        }
        state.calls.push(MockCall::DestroyDescriptorPool { id: pool.0 });
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.lock().calls.push(MockCall::WaitIdle);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.shut_down = true;
        state.calls.push(MockCall::Shutdown);
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
