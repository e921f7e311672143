/// One-shot command submission for setup work outside the frame stream

use crate::error::StrataResult;
use crate::graphics_device::{CommandBufferHandle, GraphicsDevice};

/// Record, submit and wait for a throwaway command buffer
///
/// Used for attachment layout initialization, texture uploads and readback.
/// Blocks until the device is idle.
pub fn submit_one_shot<D, F>(device: &mut D, record: F) -> StrataResult<()>
where
    D: GraphicsDevice,
    F: FnOnce(&mut D, CommandBufferHandle),
{
    let cb = device.allocate_command_buffer()?;
    let result = (|| {
        device.begin_command_buffer(cb)?;
        record(device, cb);
        device.end_command_buffer(cb)?;
        device.submit(cb, None, None, None)?;
        device.wait_idle()
    })();
    device.free_command_buffer(cb);
    result
}
