use super::*;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use glam::{Vec2, Vec3};

fn ring(device: &mut MockGraphicsDevice, capacity: u64) -> GeometryRing {
    GeometryRing::new(device, 2, capacity, 32).unwrap()
}

fn triangle() -> GeometryBatch {
    GeometryBatch {
        xyz: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        rgba: vec![[255, 0, 0, 255]; 3],
        st0: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
        indexes: vec![0, 1, 2],
        ..Default::default()
    }
}

// ============================================================================
// Appending
// ============================================================================

#[test]
fn test_append_pads_to_alignment() {
    let mut device = MockGraphicsDevice::new();
    let mut ring = ring(&mut device, 1024);

    assert_eq!(ring.append(&mut device, &[1; 10]).unwrap(), Some(0));
    assert_eq!(ring.append(&mut device, &[2; 10]).unwrap(), Some(32));
    assert_eq!(ring.cursor(), 42);

    let contents = &device.buffers[&ring.buffer().unwrap()];
    assert_eq!(&contents[32..42], &[2; 10]);
}

#[test]
fn test_slots_have_separate_buffers() {
    let mut device = MockGraphicsDevice::new();
    let mut ring = ring(&mut device, 1024);
    ring.begin_slot(0);
    let first = ring.buffer().unwrap();
    ring.append(&mut device, &[7; 64]).unwrap();

    ring.begin_slot(1);
    assert_ne!(ring.buffer().unwrap(), first);
    assert_eq!(ring.cursor(), 0);
    assert_eq!(ring.append(&mut device, &[8; 8]).unwrap(), Some(0));
}

#[test]
fn test_attribute_bindings_cover_selected_range() {
    let mut device = MockGraphicsDevice::new();
    let mut ring = ring(&mut device, 4096);
    let batch = triangle();

    let bindings = ring
        .append_attributes(&mut device, &batch, TessFlags::XYZ | TessFlags::ST0)
        .unwrap()
        .unwrap();

    assert_eq!(bindings.first_binding, 0);
    // position at 0, color untouched, st0 after padding
    assert_eq!(bindings.offsets, vec![0, 0, 64]);
}

#[test]
fn test_attribute_length_mismatch() {
    let mut device = MockGraphicsDevice::new();
    let mut ring = ring(&mut device, 4096);
    let mut batch = triangle();
    batch.rgba.pop();

    let result = ring.append_attributes(&mut device, &batch, TessFlags::RGBA);
    assert!(matches!(result, Err(StrataError::InvalidResource(_))));
}

#[test]
fn test_no_vertex_streams_binds_nothing() {
    let mut device = MockGraphicsDevice::new();
    let mut ring = ring(&mut device, 4096);
    let bindings = ring.append_attributes(&mut device, &triangle(), TessFlags::IDX).unwrap();
    assert!(bindings.is_none());
    assert_eq!(ring.cursor(), 0);
}

#[test]
fn test_indexes_follow_cursor() {
    let mut device = MockGraphicsDevice::new();
    let mut ring = ring(&mut device, 4096);
    ring.append(&mut device, &[0; 6]).unwrap();
    assert_eq!(ring.append_indexes(&mut device, &[0, 1, 2]).unwrap(), Some(8));
    assert_eq!(ring.cursor(), 20);
}

// ============================================================================
// Overflow and growth
// ============================================================================

#[test]
fn test_overflow_writes_nothing() {
    let mut device = MockGraphicsDevice::new();
    let mut ring = ring(&mut device, 256);
    ring.append(&mut device, &[1; 200]).unwrap();

    assert_eq!(ring.append(&mut device, &[2; 100]).unwrap(), None);
    assert!(ring.overflowed());
    assert_eq!(ring.cursor(), 200);
    // 224 + 100 rounded up to the next power of two
    assert_eq!(ring.pending_capacity(), Some(512));
    let contents = &device.buffers[&ring.buffer().unwrap()];
    assert!(contents[200..].iter().all(|b| *b == 0));
}

#[test]
fn test_pending_capacity_keeps_largest_request() {
    let mut device = MockGraphicsDevice::new();
    let mut ring = ring(&mut device, 256);
    ring.append(&mut device, &[0; 1000]).unwrap();
    ring.append(&mut device, &[0; 300]).unwrap();
    assert_eq!(ring.pending_capacity(), Some(1024));
}

#[test]
fn test_overflow_recovery_preserves_previous_frame() {
    let mut device = MockGraphicsDevice::new();
    let mut ring = ring(&mut device, 256);

    // completed frame in slot 0
    ring.begin_slot(0);
    ring.append(&mut device, &[0xAB; 128]).unwrap();
    let previous = ring.buffer().unwrap();

    // frame in slot 1 overflows
    ring.begin_slot(1);
    assert_eq!(ring.append(&mut device, &[0xCD; 600]).unwrap(), None);
    assert!(device.buffers[&previous][..128].iter().all(|b| *b == 0xAB));

    let grown = ring.apply_growth(&mut device).unwrap().unwrap();
    assert!(grown >= 600);
    assert_eq!(ring.capacity(), grown);
    assert!(!ring.overflowed());
    assert_eq!(ring.slot_count(), 2);
    assert!(!device.buffers.contains_key(&previous));

    ring.begin_slot(1);
    assert_eq!(ring.append(&mut device, &[0xCD; 600]).unwrap(), Some(0));
}

#[test]
fn test_growth_is_monotonic() {
    let mut device = MockGraphicsDevice::new();
    let mut ring = ring(&mut device, 4096);
    assert_eq!(ring.apply_growth(&mut device).unwrap(), None);
    assert_eq!(ring.capacity(), 4096);
    assert_eq!(device.count("create_host_buffer"), 2);
}

#[test]
fn test_overflowed_attributes_bind_nothing() {
    let mut device = MockGraphicsDevice::new();
    let mut ring = ring(&mut device, 32);
    let bindings = ring.append_attributes(&mut device, &triangle(), TessFlags::XYZ | TessFlags::RGBA).unwrap();
    assert!(bindings.is_none());
    assert!(ring.overflowed());
}

#[test]
fn test_destroy_releases_buffers_and_descriptors() {
    let mut device = MockGraphicsDevice::new();
    let mut ring = ring(&mut device, 1024);
    ring.destroy(&mut device);
    assert!(device.buffers.is_empty());
    assert_eq!(device.count("destroy_descriptor_set"), 2);
    assert!(device.live.is_empty());
}
