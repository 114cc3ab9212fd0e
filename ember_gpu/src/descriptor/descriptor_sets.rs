/// Descriptor set tracking for one descriptor pool
///
/// `DescriptorSets` records every set issued from its pool so the whole
/// group can be released in one pool destroy. Two teardown paths exist:
///
/// - `free` destroys the pool on the device (one bulk call) and marks the
///   tracker `Released`.
/// - `clear` only drops the local bookkeeping. Use it when the pool was
///   already destroyed elsewhere (e.g. pool recreation on resize); it never
///   calls the device.
///
/// ```text
/// Empty --add/allocate--> Populated --free--> Released
///   ^                         |                  |
///   +--------- clear ---------+------------------+
/// ```

use crate::device::{DescriptorPoolDesc, DescriptorPoolId, DescriptorSetId, DescriptorSetLayoutId, GraphicsDevice};
use crate::error::Result;
use crate::{engine_bail, engine_debug, engine_err, engine_trace};

/// A descriptor set and the pool that owns its storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSetHandle {
    set: DescriptorSetId,
    pool: DescriptorPoolId,
}

impl DescriptorSetHandle {
    pub fn new(set: DescriptorSetId, pool: DescriptorPoolId) -> Self {
        Self { set, pool }
    }

    pub fn set(&self) -> DescriptorSetId {
        self.set
    }

    pub fn pool(&self) -> DescriptorPoolId {
        self.pool
    }
}

/// Lifecycle state of a `DescriptorSets` tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorSetsState {
    /// No tracked sets
    Empty,
    /// At least one tracked set
    Populated,
    /// Pool destroyed through `free`; only `clear` is accepted
    Released,
}

/// Tracked descriptor sets of one pool generation
#[derive(Debug)]
pub struct DescriptorSets {
    pool: Option<DescriptorPoolId>,
    sets: Vec<DescriptorSetHandle>,
    state: DescriptorSetsState,
}

impl DescriptorSets {
    /// Tracker bound to an existing pool
    pub fn new(pool: DescriptorPoolId, capacity: usize) -> Self {
        Self {
            pool: Some(pool),
            sets: Vec::with_capacity(capacity),
            state: DescriptorSetsState::Empty,
        }
    }

    /// Tracker with no pool; bind one with `set_descriptor_pool`
    pub fn unbound() -> Self {
        Self {
            pool: None,
            sets: Vec::new(),
            state: DescriptorSetsState::Empty,
        }
    }

    /// Create a pool on `device` and track it
    pub fn with_new_pool(device: &mut dyn GraphicsDevice, desc: &DescriptorPoolDesc, capacity: usize) -> Result<Self> {
        let pool = device.create_descriptor_pool(desc)?;
        engine_debug!("ember::descriptor_sets", "Created descriptor pool {:?} (max {} sets)", pool, desc.max_sets);
        Ok(Self::new(pool, capacity))
    }

    pub fn pool(&self) -> Option<DescriptorPoolId> {
        self.pool
    }

    pub fn state(&self) -> DescriptorSetsState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Tracked handles, in insertion order
    pub fn raw_descriptor_sets(&self) -> &[DescriptorSetHandle] {
        &self.sets
    }

    /// Allocate `count` sets of `layout` from the tracked pool
    ///
    /// # Errors
    ///
    /// - `UseAfterFree` once the pool was released
    /// - `InvalidArgument` for `count == 0` or when no pool is bound
    /// - backend errors (e.g. pool exhausted), unchanged
    pub fn allocate(
        &mut self,
        device: &mut dyn GraphicsDevice,
        layout: DescriptorSetLayoutId,
        count: u32,
    ) -> Result<Vec<DescriptorSetHandle>> {
        let pool = self.live_pool()?;
        if count == 0 {
            engine_bail!(InvalidArgument => "ember::descriptor_sets", "Descriptor set count must be > 0");
        }

        let handles: Vec<DescriptorSetHandle> = device
            .allocate_descriptor_sets(pool, layout, count)?
            .into_iter()
            .map(|set| DescriptorSetHandle::new(set, pool))
            .collect();

        self.sets.extend_from_slice(&handles);
        self.state = DescriptorSetsState::Populated;
        engine_trace!("ember::descriptor_sets", "Allocated {} set(s) from pool {:?}", count, pool);
        Ok(handles)
    }

    /// Track a set allocated elsewhere from the same pool
    pub fn add(&mut self, handle: DescriptorSetHandle) -> Result<()> {
        let pool = self.live_pool()?;
        if handle.pool != pool {
            engine_bail!(InvalidArgument => "ember::descriptor_sets",
                "Descriptor set {:?} belongs to pool {:?}, not {:?}", handle.set, handle.pool, pool);
        }
        if self.sets.contains(&handle) {
            engine_bail!(InvalidArgument => "ember::descriptor_sets",
                "Descriptor set {:?} is already tracked", handle.set);
        }
        self.sets.push(handle);
        self.state = DescriptorSetsState::Populated;
        Ok(())
    }

    /// Return one set to the live pool
    ///
    /// Requires a pool created with `allow_individual_free`.
    ///
    /// # Errors
    ///
    /// `DoubleFree` if `handle` is not tracked, `UseAfterFree` once the pool was released.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice, handle: DescriptorSetHandle) -> Result<()> {
        let pool = self.live_pool()?;
        let index = self.sets.iter().position(|h| *h == handle).ok_or_else(|| {
            engine_err!(DoubleFree => "ember::descriptor_sets",
                "Descriptor set {:?} is not tracked (already released?)", handle.set)
        })?;

        device.free_descriptor_sets(pool, &[handle.set])?;
        self.sets.remove(index);
        if self.sets.is_empty() {
            self.state = DescriptorSetsState::Empty;
        }
        Ok(())
    }

    /// Destroy the pool, invalidating every tracked set in one call
    ///
    /// # Errors
    ///
    /// - `DoubleFree` if already released
    /// - `InvalidArgument` if no pool is bound
    pub fn free(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if self.state == DescriptorSetsState::Released {
            engine_bail!(DoubleFree => "ember::descriptor_sets",
                "Descriptor pool {:?} freed twice", self.pool);
        }
        let Some(pool) = self.pool else {
            engine_bail!(InvalidArgument => "ember::descriptor_sets", "No descriptor pool bound");
        };

        device.destroy_descriptor_pool(pool)?;
        engine_debug!("ember::descriptor_sets",
            "Destroyed descriptor pool {:?} ({} tracked set(s))", pool, self.sets.len());
        self.sets.clear();
        self.state = DescriptorSetsState::Released;
        Ok(())
    }

    /// Drop local bookkeeping after the pool was released by other means
    ///
    /// Never calls the device. Leaves the tracker `Empty` with no pool.
    pub fn clear(&mut self) {
        engine_trace!("ember::descriptor_sets",
            "Clearing {} tracked set(s) of pool {:?}", self.sets.len(), self.pool);
        self.sets.clear();
        self.pool = None;
        self.state = DescriptorSetsState::Empty;
    }

    /// Bind a new pool to an empty tracker
    ///
    /// # Errors
    ///
    /// `InvalidArgument` while sets are tracked, `UseAfterFree` if released
    /// and not yet cleared.
    pub fn set_descriptor_pool(&mut self, pool: DescriptorPoolId) -> Result<()> {
        match self.state {
            DescriptorSetsState::Empty => {
                self.pool = Some(pool);
                Ok(())
            }
            DescriptorSetsState::Populated => Err(engine_err!(InvalidArgument => "ember::descriptor_sets",
                "Cannot rebind a tracker holding {} set(s)", self.sets.len())),
            DescriptorSetsState::Released => Err(engine_err!(UseAfterFree => "ember::descriptor_sets",
                "Tracker of released pool {:?} must be cleared before rebinding", self.pool)),
        }
    }

    fn live_pool(&self) -> Result<DescriptorPoolId> {
        if self.state == DescriptorSetsState::Released {
            engine_bail!(UseAfterFree => "ember::descriptor_sets",
                "Descriptor pool {:?} used after free", self.pool);
        }
        self.pool.ok_or_else(|| engine_err!(InvalidArgument => "ember::descriptor_sets", "No descriptor pool bound"))
    }
}

#[cfg(test)]
#[path = "descriptor_sets_tests.rs"]
mod tests;
