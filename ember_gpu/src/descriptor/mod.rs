/// Descriptor module - descriptor set tracking per pool

pub mod descriptor_sets;

pub use descriptor_sets::{DescriptorSetHandle, DescriptorSets, DescriptorSetsState};
