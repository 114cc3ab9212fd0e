//! Integration tests for the buffer lifecycle through the public API
//!
//! A minimal host-memory `GraphicsDevice` stands in for a GPU so the whole
//! allocate / stage / copy / read-back / free path runs end to end.
//!
//! Run with: cargo test --test buffer_lifecycle_integration_tests

use std::collections::HashMap;

use ember_gpu::ember::descriptor::{DescriptorSets, DescriptorSetsState};
use ember_gpu::ember::memory::{download_via_staging, AllocatorConfig, GlobalBufferManager, MemoryAllocator};
use ember_gpu::ember::vertex::{vertex_format, IndexPayload, VertexPayload};
use ember_gpu::ember::{
    AllocationId, BufferDesc, BufferUsage, DescriptorPoolDesc, DescriptorPoolId, DescriptorSetId,
    DescriptorSetLayoutId, DeviceBufferId, Error, GraphicsDevice, MappedReader, MappedWriter, MemoryClass,
    RawBuffer, Result,
};
use ember_gpu::glam::Vec3;

// ============================================================================
// HOST DEVICE
// ============================================================================

#[derive(Default)]
struct HostDevice {
    next_id: u64,
    buffers: HashMap<u64, (MemoryClass, Vec<u8>)>,
    pools: HashMap<u64, u32>,
}

impl HostDevice {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn slice(&mut self, buffer: RawBuffer, offset: u64, size: u64) -> Result<&mut [u8]> {
        let (class, data) = self
            .buffers
            .get_mut(&buffer.buffer.0)
            .ok_or_else(|| Error::BackendError("unknown buffer".to_string()))?;
        if *class == MemoryClass::DeviceLocal {
            return Err(Error::BackendError("not mappable".to_string()));
        }
        data.get_mut(offset as usize..(offset + size) as usize)
            .ok_or_else(|| Error::BackendError("range out of bounds".to_string()))
    }
}

impl GraphicsDevice for HostDevice {
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<RawBuffer> {
        let id = self.id();
        self.buffers.insert(id, (desc.memory_class, vec![0; desc.size as usize]));
        Ok(RawBuffer { buffer: DeviceBufferId(id), allocation: AllocationId(id) })
    }

    fn destroy_buffer(&mut self, buffer: RawBuffer) -> Result<()> {
        self.buffers
            .remove(&buffer.buffer.0)
            .map(|_| ())
            .ok_or_else(|| Error::BackendError("unknown buffer".to_string()))
    }

    fn write_mapped(&mut self, buffer: RawBuffer, offset: u64, size: u64, writer: &mut MappedWriter<'_>) -> Result<()> {
        writer(self.slice(buffer, offset, size)?)
    }

    fn read_mapped(&mut self, buffer: RawBuffer, offset: u64, size: u64, reader: &mut MappedReader<'_>) -> Result<()> {
        reader(self.slice(buffer, offset, size)?)
    }

    fn copy_buffer(&mut self, src: RawBuffer, dst: RawBuffer, size: u64) -> Result<()> {
        let bytes = self.buffers[&src.buffer.0].1[..size as usize].to_vec();
        let target = self
            .buffers
            .get_mut(&dst.buffer.0)
            .ok_or_else(|| Error::BackendError("unknown buffer".to_string()))?;
        target.1[..size as usize].copy_from_slice(&bytes);
        Ok(())
    }

    fn create_descriptor_pool(&mut self, desc: &DescriptorPoolDesc) -> Result<DescriptorPoolId> {
        let id = self.id();
        self.pools.insert(id, desc.max_sets);
        Ok(DescriptorPoolId(id))
    }

    fn allocate_descriptor_sets(
        &mut self,
        _pool: DescriptorPoolId,
        _layout: DescriptorSetLayoutId,
        count: u32,
    ) -> Result<Vec<DescriptorSetId>> {
        Ok((0..count).map(|_| DescriptorSetId(self.id())).collect())
    }

    fn free_descriptor_sets(&mut self, _pool: DescriptorPoolId, _sets: &[DescriptorSetId]) -> Result<()> {
        Ok(())
    }

    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolId) -> Result<()> {
        self.pools.remove(&pool.0).map(|_| ()).ok_or_else(|| Error::BackendError("unknown pool".to_string()))
    }

    fn wait_idle(&mut self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

fn allocator() -> MemoryAllocator {
    MemoryAllocator::new(Box::new(HostDevice::default()), AllocatorConfig::default())
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
fn test_integration_frame_geometry_upload() {
    let mut alloc = allocator();
    let manager = GlobalBufferManager::with_extra_usage(BufferUsage::TRANSFER_SRC);

    let triangle = VertexPayload::from_positions(&[Vec3::ZERO, Vec3::X, Vec3::Y]);
    let quad = VertexPayload::new(vertex_format::POSITION_COLOR, vec![7; 24 * 4]).unwrap();
    let vertices = manager.build_vertex_buffer(&mut alloc, &[&triangle, &quad]).unwrap();

    assert_eq!(vertices.size(), 36 + 96);
    let bytes = download_via_staging(&mut alloc, &vertices, vertices.size()).unwrap();
    assert_eq!(&bytes[..36], triangle.bytes());
    assert_eq!(&bytes[36..], quad.bytes());

    let indices = manager
        .build_index_buffer(&mut alloc, &[IndexPayload::from_u16(&[0, 1, 2]), IndexPayload::from_u16(&[0, 2, 3])])
        .unwrap();
    assert_eq!(indices.size(), 12);
    assert_eq!(alloc.stats().live_buffers, 2);

    alloc.free(&vertices).unwrap();
    alloc.free(&indices).unwrap();
    assert!(matches!(alloc.free(&vertices), Err(Error::DoubleFree(_))));
    assert!(matches!(alloc.resolve(&indices), Err(Error::UseAfterFree(_))));
    alloc.shutdown().unwrap();
}

#[test]
fn test_integration_descriptor_pool_lifecycle() {
    let mut alloc = allocator();
    let layout = DescriptorSetLayoutId(1);

    let mut sets = DescriptorSets::with_new_pool(alloc.device_mut(), &DescriptorPoolDesc::default(), 4).unwrap();
    sets.allocate(alloc.device_mut(), layout, 4).unwrap();
    assert_eq!(sets.state(), DescriptorSetsState::Populated);

    sets.free(alloc.device_mut()).unwrap();
    assert_eq!(sets.state(), DescriptorSetsState::Released);
    assert!(matches!(sets.free(alloc.device_mut()), Err(Error::DoubleFree(_))));

    sets.clear();
    let pool = alloc.device_mut().create_descriptor_pool(&DescriptorPoolDesc::default()).unwrap();
    sets.set_descriptor_pool(pool).unwrap();
    assert_eq!(sets.allocate(alloc.device_mut(), layout, 1).unwrap().len(), 1);
}

#[test]
fn test_integration_empty_frame_allocates_nothing() {
    let mut alloc = allocator();
    let none: [VertexPayload; 0] = [];

    let buffer = GlobalBufferManager::new().build_vertex_buffer(&mut alloc, &none).unwrap();
    assert!(buffer.is_empty());
    assert_eq!(alloc.stats().total_allocations, 0);
}
