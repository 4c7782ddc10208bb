//! Field buffers - GPU-resident 2D fields with ping-pong pairing.

use super::FluidError;

/// Number of f32 channels per texel. Velocity uses xy, pressure and
/// divergence use x, dye uses xyz.
pub const CHANNELS: usize = 4;

/// A 2D physical field sampled on a regular grid, stored as a storage
/// buffer of `width * height` RGBA texels.
///
/// A field is written only as the destination of a solver stage, and is
/// never bound as both input and output of the same dispatch; see
/// [`FieldPair`].
#[derive(Debug)]
pub struct FieldBuffer {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
}

impl FieldBuffer {
    /// Allocate a zero-initialized field.
    pub fn new(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: byte_size(width, height),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            width,
            height,
        }
    }

    /// Allocate a field seeded with `data`, which must hold exactly
    /// `width * height * 4` floats (RGBA per texel).
    pub fn with_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        label: &str,
        data: &[f32],
    ) -> Result<Self, FluidError> {
        let field = Self::new(device, width, height, label);
        field.write_data(queue, data)?;
        Ok(field)
    }

    /// Overwrite the whole field with `data` (length-checked).
    pub fn write_data(&self, queue: &wgpu::Queue, data: &[f32]) -> Result<(), FluidError> {
        let expected = self.texel_count() * CHANNELS;
        if data.len() != expected {
            return Err(FluidError::SeedLength {
                expected,
                got: data.len(),
            });
        }
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(data));
        Ok(())
    }

    /// Reset every texel to zero. Off the hot path; per-frame stages
    /// overwrite their destination entirely, so clearing is only needed
    /// when re-seeding.
    pub fn clear(&self, queue: &wgpu::Queue) {
        let zeros = vec![0.0f32; self.texel_count() * CHANNELS];
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&zeros));
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn byte_size(&self) -> u64 {
        byte_size(self.width, self.height)
    }
}

fn byte_size(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * (CHANNELS * std::mem::size_of::<f32>()) as u64
}

/// Double-buffered field: stages read `current` and write the back
/// buffer, then the pair swaps so `current` always names the most
/// recently written field. The pair upholds the no-aliasing invariant
/// without any copying.
#[derive(Debug)]
pub struct FieldPair {
    current: FieldBuffer,
    previous: FieldBuffer,
}

impl FieldPair {
    /// Allocate a zeroed pair.
    pub fn new(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        Self {
            current: FieldBuffer::new(device, width, height, &format!("{label}.a")),
            previous: FieldBuffer::new(device, width, height, &format!("{label}.b")),
        }
    }

    /// The most recently written field (a stage's read source).
    pub fn current(&self) -> &FieldBuffer {
        &self.current
    }

    /// The write target for the next stage invocation.
    pub fn back(&self) -> &FieldBuffer {
        &self.previous
    }

    /// Promote the back buffer to current after a stage wrote into it.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
    }
}
