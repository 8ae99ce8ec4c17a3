//! Point light batch
//!
//! A single fixed-size array of lights shared by every draw. Free slots hold a
//! zeroed light, which contributes nothing.

use super::{BatchError, BatchResult, DirtyRanges, LightSlot, SlotPool};
use crate::ecs::components::PointLight;
use crate::ecs::Entity;
use crate::foundation::math::Vec3;
use bytemuck::Zeroable;
use std::ops::Range;

/// Fixed-capacity array of point lights
#[derive(Debug, Clone)]
pub struct PointLightBatch {
    lights: Vec<PointLight>,
    slots: SlotPool,
    dirty: DirtyRanges,
}

impl PointLightBatch {
    /// Create a batch with `capacity` free slots
    pub fn new(capacity: usize) -> Self {
        Self {
            lights: vec![PointLight::zeroed(); capacity],
            slots: SlotPool::new(capacity),
            dirty: DirtyRanges::new(),
        }
    }

    /// Reserve a slot for a light placed at `position`
    pub fn attach(&mut self, owner: Entity, light: &PointLight, position: &Vec3) -> BatchResult<LightSlot> {
        let handle = self.slots.allocate(owner).ok_or_else(|| {
            BatchError::Exhausted(format!("all {} point light slots are in use", self.lights.len()))
        })?;
        let slot = LightSlot(handle);
        self.write(slot, light, position);
        Ok(slot)
    }

    /// Overwrite a light's parameters and position
    pub fn update(&mut self, slot: LightSlot, light: &PointLight, position: &Vec3) -> BatchResult<()> {
        if !self.slots.is_live(slot.0) {
            return Err(BatchError::StaleHandle(slot.0));
        }
        self.write(slot, light, position);
        Ok(())
    }

    fn write(&mut self, slot: LightSlot, light: &PointLight, position: &Vec3) {
        let mut placed = *light;
        placed.position = [position.x, position.y, position.z, 1.0];
        self.lights[slot.index()] = placed;
        self.dirty.mark(slot.index());
    }

    /// Release a slot and zero its light
    pub fn detach(&mut self, slot: LightSlot) -> BatchResult<Entity> {
        let owner = self.slots.release(slot.0)?;
        self.lights[slot.index()] = PointLight::zeroed();
        self.dirty.mark(slot.index());
        Ok(owner)
    }

    /// Light array mirror
    pub fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    /// Lights the shaders iterate: up to the highest reserved slot
    pub fn active_count(&self) -> usize {
        self.slots.highest_occupied().map_or(0, |slot| slot + 1)
    }

    /// Reserved slots
    pub fn occupied(&self) -> usize {
        self.slots.occupied()
    }

    /// Slot count
    pub fn capacity(&self) -> usize {
        self.lights.len()
    }

    /// Number of pending dirty ranges
    pub fn pending_ranges(&self) -> usize {
        self.dirty.len()
    }

    /// Pending slot ranges
    pub fn dirty_ranges(&self) -> &[Range<usize>] {
        self.dirty.ranges()
    }

    /// Drain dirty slot ranges
    pub fn take_dirty(&mut self) -> Vec<Range<usize>> {
        self.dirty.take()
    }

    /// Forget pending ranges after a full upload
    pub fn mark_clean(&mut self) {
        self.dirty.clear();
    }
}
