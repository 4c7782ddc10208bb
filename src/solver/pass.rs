//! Stage passes - one compiled compute pipeline per solver operator.

use super::FluidError;

/// Workgroup edge length; must match the `@workgroup_size` in the WGSL
/// sources.
pub const WORKGROUP_SIZE: u32 = 16;

/// Shared state handed to every stage invocation within one frame.
pub struct StageContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
}

/// A compiled solver stage: compute pipeline plus its bind group layout.
///
/// The layout is always `uniform params, N read-only fields, 1 writable
/// destination`, bound in that order. Uniform inputs are typed
/// `bytemuck::Pod` structs resolved at compile time, so there is no
/// by-name uniform lookup at dispatch.
///
/// Immutable after construction.
#[derive(Debug)]
pub struct StagePass {
    label: &'static str,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    inputs: usize,
}

impl StagePass {
    /// Compile `source` and build the pipeline for a stage reading
    /// `inputs` fields.
    ///
    /// Compilation and pipeline validation failures are fatal and carry
    /// the driver diagnostic text.
    pub async fn new(
        device: &wgpu::Device,
        label: &'static str,
        source: &str,
        inputs: usize,
    ) -> Result<Self, FluidError> {
        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(err) = error_scope.pop().await {
            return Err(FluidError::ShaderCompile {
                stage: label,
                message: err.to_string(),
            });
        }

        let layout = create_stage_layout(device, label, inputs);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            ..Default::default()
        });

        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });
        if let Some(err) = error_scope.pop().await {
            return Err(FluidError::PipelineLink {
                stage: label,
                message: err.to_string(),
            });
        }

        Ok(Self {
            label,
            pipeline,
            layout,
            inputs,
        })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Encode one invocation of this stage: upload `params`, bind each
    /// input field to the binding matching its position, bind `dst` as
    /// the writable destination, and dispatch enough workgroups to cover
    /// every texel of a `width x height` grid exactly once.
    pub fn dispatch(
        &self,
        ctx: &mut StageContext<'_>,
        params: &[u8],
        inputs: &[&wgpu::Buffer],
        dst: &wgpu::Buffer,
        width: u32,
        height: u32,
    ) {
        debug_assert_eq!(
            inputs.len(),
            self.inputs,
            "stage '{}' expects {} input fields",
            self.label,
            self.inputs
        );

        let params_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(self.label),
            size: params.len() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        ctx.queue.write_buffer(&params_buffer, 0, params);

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: params_buffer.as_entire_binding(),
        }];
        for (i, input) in inputs.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: (i + 1) as u32,
                resource: input.as_entire_binding(),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: (inputs.len() + 1) as u32,
            resource: dst.as_entire_binding(),
        });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.layout,
            entries: &entries,
        });

        let workgroups_x = width.div_ceil(WORKGROUP_SIZE);
        let workgroups_y = height.div_ceil(WORKGROUP_SIZE);

        let mut pass = ctx
            .encoder
            .begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(self.label),
                timestamp_writes: None,
            });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups_x, workgroups_y, 1);
    }
}

fn create_stage_layout(
    device: &wgpu::Device,
    label: &str,
    inputs: usize,
) -> wgpu::BindGroupLayout {
    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }];

    for i in 0..inputs {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: (i + 1) as u32,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }

    entries.push(wgpu::BindGroupLayoutEntry {
        binding: (inputs + 1) as u32,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    });

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}
