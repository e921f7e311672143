/// Descriptor set layouts, the pipeline layouts and growing descriptor pools
///
/// Main-layout set indices follow `DescriptorBinding`: storage and uniform
/// buffers with dynamic offsets, then three texture sets and the fog texture
/// set. The post-process and blend layouts are built from the sampler set
/// layout only. Each set holds exactly one descriptor at binding 0.

use ash::vk;
use rustc_hash::FxHashMap;
use strata_engine::strata::device::BufferDescriptorKind;
use strata_engine::strata::render::{DescriptorBinding, PipelineLayoutKind};
use strata_engine::strata::{StrataError, StrataResult};
use strata_engine::{engine_debug, engine_err, engine_error};

/// Sets per pool before a new pool is created
const SETS_PER_POOL: u32 = 1024;

/// Descriptor type of the single descriptor in each binding's set
pub(crate) fn binding_descriptor_type(binding: DescriptorBinding) -> vk::DescriptorType {
    match binding {
        DescriptorBinding::Storage => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        DescriptorBinding::Uniform => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        _ => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

/// Set layout of every set in a pipeline layout, by the binding it mirrors
///
/// Post-processing sets are plain sampled images, the same layout as a
/// texture binding.
fn layout_sets(kind: PipelineLayoutKind) -> Vec<DescriptorBinding> {
    match kind {
        PipelineLayoutKind::Main => DescriptorBinding::ALL.to_vec(),
        PipelineLayoutKind::PostProcess | PipelineLayoutKind::Blend => {
            vec![DescriptorBinding::Texture0; kind.set_count() as usize]
        }
    }
}

fn binding_stages(binding: DescriptorBinding) -> vk::ShaderStageFlags {
    match binding {
        DescriptorBinding::Storage | DescriptorBinding::Uniform => {
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        }
        _ => vk::ShaderStageFlags::FRAGMENT,
    }
}

pub(crate) struct DescriptorAllocator {
    storage_layout: vk::DescriptorSetLayout,
    uniform_layout: vk::DescriptorSetLayout,
    sampler_layout: vk::DescriptorSetLayout,
    main_layout: vk::PipelineLayout,
    post_process_layout: vk::PipelineLayout,
    blend_layout: vk::PipelineLayout,
    pools: Vec<vk::DescriptorPool>,
    /// Pool each live set was allocated from
    owners: FxHashMap<vk::DescriptorSet, vk::DescriptorPool>,
}

impl DescriptorAllocator {
    pub(crate) fn new(device: &ash::Device) -> StrataResult<Self> {
        let mut allocator = Self {
            storage_layout: vk::DescriptorSetLayout::null(),
            uniform_layout: vk::DescriptorSetLayout::null(),
            sampler_layout: vk::DescriptorSetLayout::null(),
            main_layout: vk::PipelineLayout::null(),
            post_process_layout: vk::PipelineLayout::null(),
            blend_layout: vk::PipelineLayout::null(),
            pools: Vec::new(),
            owners: FxHashMap::default(),
        };
        if let Err(err) = allocator.create_layouts(device) {
            allocator.destroy(device);
            return Err(err);
        }
        Ok(allocator)
    }

    fn create_layouts(&mut self, device: &ash::Device) -> StrataResult<()> {
        self.storage_layout = create_set_layout(device, DescriptorBinding::Storage)?;
        self.uniform_layout = create_set_layout(device, DescriptorBinding::Uniform)?;
        self.sampler_layout = create_set_layout(device, DescriptorBinding::Texture0)?;

        for kind in [PipelineLayoutKind::Main, PipelineLayoutKind::PostProcess, PipelineLayoutKind::Blend] {
            let set_layouts: Vec<vk::DescriptorSetLayout> = layout_sets(kind)
                .into_iter()
                .map(|binding| self.layout_for(binding))
                .collect();
            let layout = create_pipeline_layout(device, &set_layouts)?;
            match kind {
                PipelineLayoutKind::Main => self.main_layout = layout,
                PipelineLayoutKind::PostProcess => self.post_process_layout = layout,
                PipelineLayoutKind::Blend => self.blend_layout = layout,
            }
        }

        self.pools.push(create_pool(device)?);
        Ok(())
    }

    pub(crate) fn pipeline_layout(&self, kind: PipelineLayoutKind) -> vk::PipelineLayout {
        match kind {
            PipelineLayoutKind::Main => self.main_layout,
            PipelineLayoutKind::PostProcess => self.post_process_layout,
            PipelineLayoutKind::Blend => self.blend_layout,
        }
    }

    fn layout_for(&self, binding: DescriptorBinding) -> vk::DescriptorSetLayout {
        match binding {
            DescriptorBinding::Storage => self.storage_layout,
            DescriptorBinding::Uniform => self.uniform_layout,
            _ => self.sampler_layout,
        }
    }

    /// Allocate one set, adding a pool when the current one is exhausted
    fn allocate(&mut self, device: &ash::Device, layout: vk::DescriptorSetLayout) -> StrataResult<vk::DescriptorSet> {
        let layouts = [layout];
        for attempt in 0..2 {
            let pool = match self.pools.last() {
                Some(pool) => *pool,
                None => break,
            };
            let info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);
            match unsafe { device.allocate_descriptor_sets(&info) } {
                Ok(sets) => {
                    let set = sets
                        .into_iter()
                        .next()
                        .ok_or_else(|| engine_err!("strata::vulkan", "Descriptor set allocation returned no set"))?;
                    self.owners.insert(set, pool);
                    return Ok(set);
                }
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL)
                    if attempt == 0 =>
                {
                    engine_debug!("strata::vulkan", "Descriptor pool {} exhausted, adding a pool", self.pools.len());
                    self.pools.push(create_pool(device)?);
                }
                Err(e) => {
                    return Err(engine_err!("strata::vulkan", "Failed to allocate descriptor set: {:?}", e));
                }
            }
        }
        Err(engine_err!("strata::vulkan", "No descriptor pool available"))
    }

    pub(crate) fn create_image_set(
        &mut self,
        device: &ash::Device,
        view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> StrataResult<vk::DescriptorSet> {
        let set = self.allocate(device, self.sampler_layout)?;
        let image_info = [vk::DescriptorImageInfo {
            sampler,
            image_view: view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info);
        unsafe { device.update_descriptor_sets(&[write], &[]) };
        Ok(set)
    }

    pub(crate) fn create_buffer_set(
        &mut self,
        device: &ash::Device,
        buffer: vk::Buffer,
        range: u64,
        kind: BufferDescriptorKind,
    ) -> StrataResult<vk::DescriptorSet> {
        let binding = match kind {
            BufferDescriptorKind::Uniform => DescriptorBinding::Uniform,
            BufferDescriptorKind::Storage => DescriptorBinding::Storage,
        };
        let set = self.allocate(device, self.layout_for(binding))?;
        let buffer_info = [vk::DescriptorBufferInfo { buffer, offset: 0, range }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(binding_descriptor_type(binding))
            .buffer_info(&buffer_info);
        unsafe { device.update_descriptor_sets(&[write], &[]) };
        Ok(set)
    }

    pub(crate) fn free(&mut self, device: &ash::Device, set: vk::DescriptorSet) {
        if let Some(pool) = self.owners.remove(&set) {
            unsafe { device.free_descriptor_sets(pool, &[set]).ok() };
        }
    }

    pub(crate) fn live_sets(&self) -> usize {
        self.owners.len()
    }

    pub(crate) fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            for pool in self.pools.drain(..) {
                device.destroy_descriptor_pool(pool, None);
            }
            self.owners.clear();
            for layout in [self.main_layout, self.post_process_layout, self.blend_layout] {
                if layout != vk::PipelineLayout::null() {
                    device.destroy_pipeline_layout(layout, None);
                }
            }
            for layout in [self.storage_layout, self.uniform_layout, self.sampler_layout] {
                if layout != vk::DescriptorSetLayout::null() {
                    device.destroy_descriptor_set_layout(layout, None);
                }
            }
        }
        self.main_layout = vk::PipelineLayout::null();
        self.post_process_layout = vk::PipelineLayout::null();
        self.blend_layout = vk::PipelineLayout::null();
        self.storage_layout = vk::DescriptorSetLayout::null();
        self.uniform_layout = vk::DescriptorSetLayout::null();
        self.sampler_layout = vk::DescriptorSetLayout::null();
    }
}

fn create_set_layout(device: &ash::Device, binding: DescriptorBinding) -> StrataResult<vk::DescriptorSetLayout> {
    let bindings = [vk::DescriptorSetLayoutBinding::default()
        .binding(0)
        .descriptor_type(binding_descriptor_type(binding))
        .descriptor_count(1)
        .stage_flags(binding_stages(binding))];
    let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
    unsafe {
        device
            .create_descriptor_set_layout(&info, None)
            .map_err(|e| init_failed("Failed to create descriptor set layout", e))
    }
}

fn create_pipeline_layout(
    device: &ash::Device,
    set_layouts: &[vk::DescriptorSetLayout],
) -> StrataResult<vk::PipelineLayout> {
    let info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts);
    unsafe {
        device
            .create_pipeline_layout(&info, None)
            .map_err(|e| init_failed("Failed to create pipeline layout", e))
    }
}

fn create_pool(device: &ash::Device) -> StrataResult<vk::DescriptorPool> {
    let pool_sizes = [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: SETS_PER_POOL,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            descriptor_count: 16,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
            descriptor_count: 16,
        },
    ];
    let info = vk::DescriptorPoolCreateInfo::default()
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        .pool_sizes(&pool_sizes)
        .max_sets(SETS_PER_POOL);
    unsafe {
        device
            .create_descriptor_pool(&info, None)
            .map_err(|e| init_failed("Failed to create descriptor pool", e))
    }
}

fn init_failed(what: &str, e: vk::Result) -> StrataError {
    engine_error!("strata::vulkan", "{}: {:?}", what, e);
    StrataError::InitializationFailed(format!("{}: {:?}", what, e))
}
