/// Descriptor pool descriptor and raw descriptor identifiers

/// Opaque descriptor pool identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorPoolId(pub u64);

/// Opaque descriptor set identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorSetId(pub u64);

/// Opaque descriptor set layout identifier
///
/// Layouts are created by the pipeline collaborator; this crate only forwards them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorSetLayoutId(pub u64);

/// Descriptor for creating a descriptor pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolDesc {
    /// Maximum number of sets allocated from the pool
    pub max_sets: u32,
    /// Uniform buffer descriptors available across all sets
    pub uniform_buffers: u32,
    /// Storage buffer descriptors available across all sets
    pub storage_buffers: u32,
    /// Combined image sampler descriptors available across all sets
    pub combined_image_samplers: u32,
    /// Whether single sets may be returned to the pool before it is destroyed
    pub allow_individual_free: bool,
}

impl Default for DescriptorPoolDesc {
    fn default() -> Self {
        Self {
            max_sets: 1024,
            uniform_buffers: 1024,
            storage_buffers: 1024,
            combined_image_samplers: 2048,
            allow_individual_free: true,
        }
    }
}
