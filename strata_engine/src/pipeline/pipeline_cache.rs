/// PipelineCache - deduplicating, lazily compiling pipeline permutation cache
///
/// Definitions are interned once and identified by a stable `PipelineId`.
/// Native pipeline objects are render-pass specific, so each entry keeps one
/// optional handle per `RenderPassKind` and compiles it on first use there.

use rustc_hash::FxHashMap;
use crate::error::{StrataError, StrataResult};
use crate::graphics_device::{CommandBufferHandle, GraphicsDevice, PipelineHandle};
use crate::pipeline::{PipelineDefinition, PipelineTarget};
use crate::render_pass::RenderPassKind;
use crate::{engine_debug, engine_error};

/// Index of an interned pipeline definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(pub u32);

/// One interned definition and its per-pass native objects
#[derive(Debug, Clone)]
pub struct PipelineCacheEntry {
    pub definition: PipelineDefinition,
    handles: [Option<PipelineHandle>; RenderPassKind::COUNT],
}

impl PipelineCacheEntry {
    /// Native handle compiled for `kind`, if any
    pub fn handle(&self, kind: RenderPassKind) -> Option<PipelineHandle> {
        self.handles[kind.index()]
    }
}

/// Permutation cache keyed by structural equality of definitions
pub struct PipelineCache {
    entries: Vec<PipelineCacheEntry>,
    lookup: FxHashMap<PipelineDefinition, PipelineId>,
    capacity: usize,
    /// Entries below this index survive `release_since(persistent_watermark)`
    persistent: u32,
    compiled: u64,
}

impl PipelineCache {
    /// Create an empty cache holding at most `capacity` definitions
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            lookup: FxHashMap::default(),
            capacity,
            persistent: 0,
            compiled: 0,
        }
    }

    /// Return the id of an equal definition, or intern a new one
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` when the table is full.
    pub fn find_or_alloc(&mut self, definition: &PipelineDefinition) -> StrataResult<PipelineId> {
        if let Some(&id) = self.lookup.get(definition) {
            return Ok(id);
        }

        if self.entries.len() >= self.capacity {
            engine_error!("strata::pipeline", "Pipeline table full ({} entries)", self.capacity);
            return Err(StrataError::CapacityExceeded { what: "pipelines", limit: self.capacity });
        }

        let id = PipelineId(self.entries.len() as u32);
        self.entries.push(PipelineCacheEntry {
            definition: *definition,
            handles: [None; RenderPassKind::COUNT],
        });
        self.lookup.insert(*definition, id);
        Ok(id)
    }

    /// Id of an equal definition without interning
    pub fn find(&self, definition: &PipelineDefinition) -> Option<PipelineId> {
        self.lookup.get(definition).copied()
    }

    pub fn entry(&self, id: PipelineId) -> Option<&PipelineCacheEntry> {
        self.entries.get(id.0 as usize)
    }

    /// Native handle for `id` in `target.kind`, compiling it on first request
    pub fn materialize<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        id: PipelineId,
        target: &PipelineTarget,
    ) -> StrataResult<PipelineHandle> {
        let entry = self.entries.get_mut(id.0 as usize).ok_or_else(|| {
            StrataError::InvalidResource(format!("unknown pipeline id {}", id.0))
        })?;

        let slot = &mut entry.handles[target.kind.index()];
        if let Some(handle) = *slot {
            return Ok(handle);
        }

        let handle = device.create_pipeline(&entry.definition, target).map_err(|e| {
            engine_error!(
                "strata::pipeline",
                "Failed to compile pipeline {} for {:?}: {}",
                id.0, target.kind, e
            );
            e
        })?;
        *slot = Some(handle);
        self.compiled += 1;
        engine_debug!("strata::pipeline", "Compiled pipeline {} for {:?}", id.0, target.kind);
        Ok(handle)
    }

    /// Bind `id` for `target`, skipping the command if it is already bound
    ///
    /// # Arguments
    ///
    /// * `last_bound` - Last pipeline bound in the command stream; updated on bind
    pub fn bind<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        cb: CommandBufferHandle,
        id: PipelineId,
        target: &PipelineTarget,
        last_bound: &mut Option<PipelineHandle>,
    ) -> StrataResult<PipelineHandle> {
        let handle = self.materialize(device, id, target)?;
        if *last_bound != Some(handle) {
            device.cmd_bind_pipeline(cb, handle);
            *last_bound = Some(handle);
        }
        Ok(handle)
    }

    /// Record the current size as the persistent watermark
    pub fn mark_persistent(&mut self) -> PipelineId {
        self.persistent = self.entries.len() as u32;
        PipelineId(self.persistent)
    }

    pub fn persistent_watermark(&self) -> PipelineId {
        PipelineId(self.persistent)
    }

    /// Destroy every entry with id >= `watermark`
    pub fn release_since<D: GraphicsDevice>(&mut self, device: &mut D, watermark: PipelineId) {
        let start = (watermark.0 as usize).min(self.entries.len());
        for entry in self.entries.drain(start..) {
            self.lookup.remove(&entry.definition);
            for handle in entry.handles.iter().flatten() {
                device.destroy_pipeline(*handle);
            }
        }
        if self.persistent as usize > start {
            self.persistent = start as u32;
        }
    }

    /// Destroy every native object but keep all definitions and ids
    pub fn destroy_native<D: GraphicsDevice>(&mut self, device: &mut D) {
        for entry in &mut self.entries {
            for slot in entry.handles.iter_mut() {
                if let Some(handle) = slot.take() {
                    device.destroy_pipeline(handle);
                }
            }
        }
    }

    /// Number of interned definitions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total native compilations performed
    pub fn compile_count(&self) -> u64 {
        self.compiled
    }
}

#[cfg(test)]
#[path = "pipeline_cache_tests.rs"]
mod tests;
