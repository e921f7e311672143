/// Opaque device object handles
///
/// Every native object is referred to by a copyable 64-bit handle. Zero is the
/// null handle. Backends convert to and from their native handle type.

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
            pub struct $name(pub u64);

            impl $name {
                pub const NULL: Self = Self(0);

                pub fn is_null(&self) -> bool {
                    self.0 == 0
                }

                pub fn as_raw(&self) -> u64 {
                    self.0
                }
            }
        )*
    };
}

define_handle! {
    /// Device image
    ImageHandle;
    /// View over a device image
    ImageViewHandle;
    /// Block of device memory
    MemoryHandle;
    /// Host-visible mapped buffer
    BufferHandle;
    /// Compiled graphics pipeline
    PipelineHandle;
    RenderPassHandle;
    FramebufferHandle;
    /// Descriptor set bound through `cmd_bind_descriptor_sets`
    DescriptorSetHandle;
    SamplerHandle;
    /// CPU-observable completion signal
    FenceHandle;
    /// GPU-side ordering signal
    SemaphoreHandle;
    CommandBufferHandle;
}
