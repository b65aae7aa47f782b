//! Typed resource handles and the arena that owns what they point at
//!
//! Handles are a slot index plus the generation of that slot. The backend owns
//! the actual objects in a [`ResourceTable`] per kind, so destroying a resource
//! is removing its entry and dropping the backend drops everything that is left.

use crate::error::{GpuError, GpuResult};
use std::fmt;
use std::marker::PhantomData;

pub trait Handle: Copy + Eq + fmt::Debug {
    const KIND: &'static str;

    fn new(index: u32, generation: u32) -> Self;
    fn index(self) -> u32;
    fn generation(self) -> u32;

    /// First generation of slot `index`
    fn from_index(index: u32) -> Self {
        Self::new(index, 0)
    }
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl Handle for $name {
            const KIND: &'static str = $kind;

            fn new(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            fn index(self) -> u32 {
                self.index
            }

            fn generation(self) -> u32 {
                self.generation
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.generation {
                    0 => write!(f, "{}#{}", $kind, self.index),
                    g => write!(f, "{}#{}v{}", $kind, self.index, g),
                }
            }
        }
    };
}

handle!(BufferId, "buffer");
handle!(ImageId, "image");
handle!(ImageViewId, "image-view");
handle!(PipelineId, "pipeline");
handle!(RenderPassId, "render-pass");
handle!(DescriptorLayoutId, "descriptor-layout");
handle!(DescriptorSetId, "descriptor-set");
handle!(FenceId, "fence");
handle!(SemaphoreId, "semaphore");
handle!(
    /// Identifies a command recorder across resets
    RecorderId,
    "recorder"
);

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of resources addressed by handle.
///
/// Freed slots are reused with a bumped generation, so a stale handle reports
/// `UnknownHandle` instead of silently aliasing the newer resource.
pub struct ResourceTable<H, T> {
    entries: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
    _handle: PhantomData<H>,
}

impl<H: Handle, T> Default for ResourceTable<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Handle, T> ResourceTable<H, T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            live: 0,
            _handle: PhantomData,
        }
    }

    pub fn insert(&mut self, value: T) -> H {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.entries[index as usize];
                slot.value = Some(value);
                H::new(index, slot.generation)
            }
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                H::new(index, 0)
            }
        }
    }

    fn slot(&self, handle: H) -> Option<&Slot<T>> {
        self.entries
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }

    fn slot_mut(&mut self, handle: H) -> Option<&mut Slot<T>> {
        self.entries
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }

    pub fn get(&self, handle: H) -> GpuResult<&T> {
        self.slot(handle)
            .and_then(|slot| slot.value.as_ref())
            .ok_or_else(|| unknown(handle))
    }

    pub fn get_mut(&mut self, handle: H) -> GpuResult<&mut T> {
        self.slot_mut(handle)
            .and_then(|slot| slot.value.as_mut())
            .ok_or_else(|| unknown(handle))
    }

    pub fn remove(&mut self, handle: H) -> GpuResult<T> {
        let slot = self.slot_mut(handle).ok_or_else(|| unknown(handle))?;
        let value = slot.value.take().ok_or_else(|| unknown(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        self.live -= 1;
        Ok(value)
    }

    /// Slots allocated so far, live or free
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, handle: H) -> bool {
        self.get(handle).is_ok()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let handle = H::new(i as u32, slot.generation);
                slot.value.as_ref().map(|value| (handle, value))
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (H, &mut T)> {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| {
                let handle = H::new(i as u32, slot.generation);
                slot.value.as_mut().map(|value| (handle, value))
            })
    }
}

fn unknown<H: Handle>(handle: H) -> GpuError {
    GpuError::UnknownHandle {
        kind: H::KIND,
        index: handle.index(),
    }
}
