/// Conversions between strata value types and their Vulkan equivalents
///
/// Everything here is a pure mapping so it can be tested without a GPU.

use ash::vk;
use strata_engine::strata::device::{
    AcquireStatus, FenceStatus, ImageAspect, ImageFormat, ImageLayout, ImageTiling, ImageUsage,
    IndexType, LoadOp, MemoryProperties, PresentStatus, SampleCount, StoreOp,
};
use strata_engine::strata::render::{
    AddressMode, BlendFactor, CullMode, Filter, MipmapMode, SamplerDef, Topology,
};

// ===== Formats =====

pub(crate) fn format_to_vk(format: ImageFormat) -> vk::Format {
    match format {
        ImageFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        ImageFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        ImageFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        ImageFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        ImageFormat::R8G8B8_UNORM => vk::Format::R8G8B8_UNORM,
        ImageFormat::B4G4R4A4_UNORM_PACK16 => vk::Format::B4G4R4A4_UNORM_PACK16,
        ImageFormat::A1R5G5B5_UNORM_PACK16 => vk::Format::A1R5G5B5_UNORM_PACK16,
        ImageFormat::A2B10G10R10_UNORM_PACK32 => vk::Format::A2B10G10R10_UNORM_PACK32,
        ImageFormat::R16G16B16A16_UNORM => vk::Format::R16G16B16A16_UNORM,
        ImageFormat::D16_UNORM => vk::Format::D16_UNORM,
        ImageFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        ImageFormat::D32_SFLOAT => vk::Format::D32_SFLOAT,
        ImageFormat::D32_SFLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// Reverse of `format_to_vk`, for formats reported by the surface
pub(crate) fn format_from_vk(format: vk::Format) -> Option<ImageFormat> {
    let format = match format {
        vk::Format::R8G8B8A8_UNORM => ImageFormat::R8G8B8A8_UNORM,
        vk::Format::R8G8B8A8_SRGB => ImageFormat::R8G8B8A8_SRGB,
        vk::Format::B8G8R8A8_UNORM => ImageFormat::B8G8R8A8_UNORM,
        vk::Format::B8G8R8A8_SRGB => ImageFormat::B8G8R8A8_SRGB,
        vk::Format::R8G8B8_UNORM => ImageFormat::R8G8B8_UNORM,
        vk::Format::B4G4R4A4_UNORM_PACK16 => ImageFormat::B4G4R4A4_UNORM_PACK16,
        vk::Format::A1R5G5B5_UNORM_PACK16 => ImageFormat::A1R5G5B5_UNORM_PACK16,
        vk::Format::A2B10G10R10_UNORM_PACK32 => ImageFormat::A2B10G10R10_UNORM_PACK32,
        vk::Format::R16G16B16A16_UNORM => ImageFormat::R16G16B16A16_UNORM,
        vk::Format::D16_UNORM => ImageFormat::D16_UNORM,
        vk::Format::D24_UNORM_S8_UINT => ImageFormat::D24_UNORM_S8_UINT,
        vk::Format::D32_SFLOAT => ImageFormat::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT => ImageFormat::D32_SFLOAT_S8_UINT,
        _ => return None,
    };
    Some(format)
}

pub(crate) fn sample_count_to_vk(count: SampleCount) -> vk::SampleCountFlags {
    match count {
        SampleCount::S1 => vk::SampleCountFlags::TYPE_1,
        SampleCount::S2 => vk::SampleCountFlags::TYPE_2,
        SampleCount::S4 => vk::SampleCountFlags::TYPE_4,
        SampleCount::S8 => vk::SampleCountFlags::TYPE_8,
    }
}

pub(crate) fn tiling_to_vk(tiling: ImageTiling) -> vk::ImageTiling {
    match tiling {
        ImageTiling::Optimal => vk::ImageTiling::OPTIMAL,
        ImageTiling::Linear => vk::ImageTiling::LINEAR,
    }
}

pub(crate) fn image_usage_to_vk(usage: ImageUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(ImageUsage::TRANSFER_SRC) { flags |= vk::ImageUsageFlags::TRANSFER_SRC; }
    if usage.contains(ImageUsage::TRANSFER_DST) { flags |= vk::ImageUsageFlags::TRANSFER_DST; }
    if usage.contains(ImageUsage::SAMPLED) { flags |= vk::ImageUsageFlags::SAMPLED; }
    if usage.contains(ImageUsage::COLOR_ATTACHMENT) { flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT; }
    if usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(ImageUsage::TRANSIENT_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::TRANSIENT_ATTACHMENT;
    }
    flags
}

pub(crate) fn aspect_to_vk(aspect: ImageAspect) -> vk::ImageAspectFlags {
    let mut flags = vk::ImageAspectFlags::empty();
    if aspect.contains(ImageAspect::COLOR) { flags |= vk::ImageAspectFlags::COLOR; }
    if aspect.contains(ImageAspect::DEPTH) { flags |= vk::ImageAspectFlags::DEPTH; }
    if aspect.contains(ImageAspect::STENCIL) { flags |= vk::ImageAspectFlags::STENCIL; }
    flags
}

/// Memory property flags share their bit values with Vulkan
pub(crate) fn memory_properties_from_vk(flags: vk::MemoryPropertyFlags) -> MemoryProperties {
    MemoryProperties::from_bits_truncate(flags.as_raw())
}

pub(crate) fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

// ===== Render passes =====

pub(crate) fn load_op_to_vk(load_op: LoadOp) -> vk::AttachmentLoadOp {
    match load_op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub(crate) fn store_op_to_vk(store_op: StoreOp) -> vk::AttachmentStoreOp {
    match store_op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub(crate) fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

/// Accesses that must complete before an image leaves `layout`
pub(crate) fn src_sync(layout: ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        ImageLayout::Undefined | ImageLayout::PresentSrc => {
            (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE)
        }
        ImageLayout::General => (
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
        ImageLayout::ColorAttachment => (
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        ImageLayout::DepthStencilAttachment => (
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        ),
        ImageLayout::ShaderReadOnly => {
            (vk::AccessFlags::SHADER_READ, vk::PipelineStageFlags::FRAGMENT_SHADER)
        }
        ImageLayout::TransferSrc => {
            (vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER)
        }
        ImageLayout::TransferDst => {
            (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER)
        }
    }
}

/// Accesses that wait for an image to enter `layout`
pub(crate) fn dst_sync(layout: ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        ImageLayout::Undefined | ImageLayout::PresentSrc => {
            (vk::AccessFlags::empty(), vk::PipelineStageFlags::BOTTOM_OF_PIPE)
        }
        ImageLayout::General => (
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
        ImageLayout::ColorAttachment => (
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        ImageLayout::DepthStencilAttachment => (
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        ),
        ImageLayout::ShaderReadOnly => {
            (vk::AccessFlags::SHADER_READ, vk::PipelineStageFlags::FRAGMENT_SHADER)
        }
        ImageLayout::TransferSrc => {
            (vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER)
        }
        ImageLayout::TransferDst => {
            (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER)
        }
    }
}

// ===== Pipeline state =====

pub(crate) fn topology_to_vk(topology: Topology) -> vk::PrimitiveTopology {
    match topology {
        Topology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        Topology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        Topology::LineList => vk::PrimitiveTopology::LINE_LIST,
        Topology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

pub(crate) fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub(crate) fn blend_factor_to_vk(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::SrcAlphaSaturate => vk::BlendFactor::SRC_ALPHA_SATURATE,
    }
}

// ===== Samplers =====

pub(crate) fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub(crate) fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
    }
}

/// Sampler create info for `def`
///
/// # Arguments
///
/// * `max_anisotropy` - Device limit, used when the definition asks for anisotropy
pub(crate) fn sampler_create_info(def: &SamplerDef, max_anisotropy: f32) -> vk::SamplerCreateInfo<'static> {
    let address = address_mode_to_vk(def.address_mode);
    let mipmap_mode = match def.mipmap_mode {
        Some(MipmapMode::Linear) => vk::SamplerMipmapMode::LINEAR,
        Some(MipmapMode::Nearest) | None => vk::SamplerMipmapMode::NEAREST,
    };
    vk::SamplerCreateInfo::default()
        .mag_filter(filter_to_vk(def.mag_filter))
        .min_filter(filter_to_vk(def.min_filter))
        .mipmap_mode(mipmap_mode)
        .address_mode_u(address)
        .address_mode_v(address)
        .address_mode_w(address)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(def.max_lod())
        .anisotropy_enable(def.anisotropy && max_anisotropy > 1.0)
        .max_anisotropy(if def.anisotropy { max_anisotropy.max(1.0) } else { 1.0 })
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
}

// ===== Status codes =====

pub(crate) fn acquire_status_from_vk(result: ash::prelude::VkResult<(u32, bool)>) -> Option<AcquireStatus> {
    match result {
        Ok((index, false)) => Some(AcquireStatus::Acquired(index)),
        Ok((index, true)) => Some(AcquireStatus::Suboptimal(index)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Some(AcquireStatus::OutOfDate),
        Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Some(AcquireStatus::Timeout),
        Err(_) => None,
    }
}

pub(crate) fn present_status_from_vk(result: ash::prelude::VkResult<bool>) -> Option<PresentStatus> {
    match result {
        Ok(false) => Some(PresentStatus::Presented),
        Ok(true) => Some(PresentStatus::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::ERROR_SURFACE_LOST_KHR) => {
            Some(PresentStatus::OutOfDate)
        }
        Err(vk::Result::ERROR_DEVICE_LOST) => Some(PresentStatus::DeviceLost),
        Err(_) => None,
    }
}

pub(crate) fn fence_status_from_vk(result: ash::prelude::VkResult<()>) -> Option<FenceStatus> {
    match result {
        Ok(()) => Some(FenceStatus::Signaled),
        Err(vk::Result::TIMEOUT) => Some(FenceStatus::Timeout),
        Err(vk::Result::ERROR_DEVICE_LOST) => Some(FenceStatus::DeviceLost),
        Err(_) => None,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
