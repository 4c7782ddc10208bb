//! Simulation loop - per-frame orchestration of the solver stages.

use crate::schema::{PointerState, SimulationConfig};

use super::{FieldBuffer, FieldPair, FluidError, StageContext, StagePass, TimestepClock, stages};

// Embed shader sources at compile time
const ADVECT_SHADER: &str = include_str!("shaders/advect.wgsl");
const FORCE_SHADER: &str = include_str!("shaders/force.wgsl");
const DYE_SHADER: &str = include_str!("shaders/dye.wgsl");
const JACOBI_SHADER: &str = include_str!("shaders/jacobi.wgsl");
const DIVERGENCE_SHADER: &str = include_str!("shaders/divergence.wgsl");
const SUBTRACT_SHADER: &str = include_str!("shaders/subtract.wgsl");
const BOUNDARY_SHADER: &str = include_str!("shaders/boundary.wgsl");
const VORTICITY_SHADER: &str = include_str!("shaders/vorticity.wgsl");
const EXPORT_SHADER: &str = include_str!("shaders/export.wgsl");

/// GPU Stable Fluids solver.
///
/// Owns the device, one [`StagePass`] per operator, and the
/// double-buffered velocity, pressure, and dye fields for the lifetime
/// of one simulation session. Grid geometry is fixed at construction; a
/// resize means dropping the solver and building a new one.
///
/// Single-threaded by design: one `step` per display refresh, stages
/// issued in strict sequence on one queue.
#[derive(Debug)]
pub struct FluidSolver {
    device: wgpu::Device,
    queue: wgpu::Queue,
    width: u32,
    height: u32,

    advect_pass: StagePass,
    force_pass: StagePass,
    dye_pass: StagePass,
    jacobi_pass: StagePass,
    divergence_pass: StagePass,
    subtract_pass: StagePass,
    boundary_pass: StagePass,
    vorticity_pass: StagePass,
    export_pass: StagePass,

    velocity: FieldPair,
    pressure: FieldPair,
    dye: FieldPair,
    divergence: FieldBuffer,

    pixel_buffer: wgpu::Buffer,
    pixel_staging: wgpu::Buffer,
    field_staging: wgpu::Buffer,

    seed: crate::schema::DyeSeed,
    clock: TimestepClock,
    time: f32,
    frame: u64,
}

impl FluidSolver {
    /// Create a solver for the configured grid.
    ///
    /// Any failure here (no adapter, device rejection, field allocation
    /// over device limits, shader compile or pipeline error) is fatal:
    /// the solver never enters its running state.
    pub async fn new(config: &SimulationConfig) -> Result<Self, FluidError> {
        config.validate()?;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| FluidError::NoAdapter)?;
        log::debug!("using adapter: {}", adapter.get_info().name);

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Stable Fluids GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        let width = config.width as u32;
        let height = config.height as u32;

        // The float-field capability check: every field must fit one
        // storage binding.
        let field_bytes = width as u64 * height as u64 * 16;
        let limit = device.limits().max_storage_buffer_binding_size as u64;
        if field_bytes > limit {
            return Err(FluidError::Allocation {
                needed: field_bytes,
                limit,
            });
        }

        let advect_pass = StagePass::new(&device, "advect", ADVECT_SHADER, 2).await?;
        let force_pass = StagePass::new(&device, "force", FORCE_SHADER, 1).await?;
        let dye_pass = StagePass::new(&device, "dye", DYE_SHADER, 1).await?;
        let jacobi_pass = StagePass::new(&device, "jacobi", JACOBI_SHADER, 2).await?;
        let divergence_pass = StagePass::new(&device, "divergence", DIVERGENCE_SHADER, 1).await?;
        let subtract_pass = StagePass::new(&device, "subtract", SUBTRACT_SHADER, 2).await?;
        let boundary_pass = StagePass::new(&device, "boundary", BOUNDARY_SHADER, 1).await?;
        let vorticity_pass = StagePass::new(&device, "vorticity", VORTICITY_SHADER, 1).await?;
        let export_pass = StagePass::new(&device, "export", EXPORT_SHADER, 1).await?;

        let velocity = FieldPair::new(&device, width, height, "velocity");
        let pressure = FieldPair::new(&device, width, height, "pressure");
        let dye = FieldPair::new(&device, width, height, "dye");
        let divergence = FieldBuffer::new(&device, width, height, "divergence");

        dye.current()
            .write_data(&queue, &config.seed.generate(config.width, config.height))?;

        let pixel_bytes = width as u64 * height as u64 * 4;
        let pixel_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pixel Buffer"),
            size: pixel_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let pixel_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pixel Staging Buffer"),
            size: pixel_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let field_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Field Staging Buffer"),
            size: field_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::info!("fluid solver ready: {width}x{height} grid");

        Ok(Self {
            device,
            queue,
            width,
            height,
            advect_pass,
            force_pass,
            dye_pass,
            jacobi_pass,
            divergence_pass,
            subtract_pass,
            boundary_pass,
            vorticity_pass,
            export_pass,
            velocity,
            pressure,
            dye,
            divergence,
            pixel_buffer,
            pixel_staging,
            field_staging,
            seed: config.seed.clone(),
            clock: TimestepClock::new(),
            time: 0.0,
            frame: 0,
        })
    }

    /// Advance one frame, measuring the timestep from the wall clock.
    ///
    /// `params` carries the live knobs (viscosity, iteration count,
    /// force scale, ...) and is re-read every call; grid geometry stays
    /// whatever it was at construction.
    pub fn step(&mut self, params: &SimulationConfig, pointer: PointerState) {
        let dt = self.clock.tick();
        self.advance(params, pointer, dt);
    }

    /// Advance one frame with an explicit raw frame gap in seconds (the
    /// clamping rule still applies). Used by headless drivers and tests.
    pub fn step_with_dt(&mut self, params: &SimulationConfig, pointer: PointerState, raw_dt: f32) {
        let dt = TimestepClock::clamp(Some(raw_dt));
        self.advance(params, pointer, dt);
    }

    fn advance(&mut self, params: &SimulationConfig, pointer: PointerState, dt: f32) {
        let dx = 1.0 / self.width as f32;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut ctx = StageContext {
                device: &self.device,
                queue: &self.queue,
                encoder: &mut encoder,
            };

            if pointer.active {
                let force = [
                    pointer.velocity[0] * params.force_scale,
                    pointer.velocity[1] * params.force_scale,
                ];
                stages::apply_force(
                    &mut ctx,
                    &self.force_pass,
                    dt,
                    params.rho,
                    params.impulse_radius,
                    force,
                    pointer.position,
                    &mut self.velocity,
                );
                stages::inject_dye(
                    &mut ctx,
                    &self.dye_pass,
                    params.impulse_radius,
                    params.dye_color,
                    pointer.position,
                    &mut self.dye,
                );
            }

            stages::self_advect(&mut ctx, &self.advect_pass, dt, &mut self.velocity);

            let alpha = dx * dx / (params.viscosity * dt);
            let r_beta = 1.0 / (4.0 + alpha);
            stages::jacobi_diffuse(
                &mut ctx,
                &self.jacobi_pass,
                params.jacobi_iterations,
                alpha,
                r_beta,
                &mut self.velocity,
            );

            stages::divergence(
                &mut ctx,
                &self.divergence_pass,
                dx,
                self.velocity.current(),
                &self.divergence,
            );

            // Pressure is warm-started from the previous frame's solution;
            // temporal coherence shortens effective convergence.
            stages::jacobi_method(
                &mut ctx,
                &self.jacobi_pass,
                params.jacobi_iterations,
                -(dx * dx),
                0.25,
                &mut self.pressure,
                &self.divergence,
            );

            stages::subtract_gradient(
                &mut ctx,
                &self.subtract_pass,
                dx,
                self.pressure.current(),
                &mut self.velocity,
            );

            stages::apply_boundary(&mut ctx, &self.boundary_pass, -1.0, &mut self.velocity);
            stages::apply_boundary(&mut ctx, &self.boundary_pass, 1.0, &mut self.pressure);

            if params.vorticity_scale > 0.0 {
                stages::vorticity_confine(
                    &mut ctx,
                    &self.vorticity_pass,
                    dt,
                    dx,
                    params.vorticity_scale,
                    &mut self.velocity,
                );
            }

            stages::advect(&mut ctx, &self.advect_pass, dt, &mut self.dye, self.velocity.current());
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        self.time += dt;
        self.frame += 1;
    }

    /// Reset all fields to their initial state: zero velocity and
    /// pressure, freshly seeded dye.
    pub fn reset(&mut self) -> Result<(), FluidError> {
        self.velocity.current().clear(&self.queue);
        self.velocity.back().clear(&self.queue);
        self.pressure.current().clear(&self.queue);
        self.pressure.back().clear(&self.queue);
        self.divergence.clear(&self.queue);
        self.dye.back().clear(&self.queue);
        self.dye.current().write_data(
            &self.queue,
            &self.seed.generate(self.width as usize, self.height as usize),
        )?;
        self.time = 0.0;
        self.frame = 0;
        Ok(())
    }

    /// Upload velocity texel data (RGBA, xy used). For initial
    /// conditions and diagnostics.
    pub fn seed_velocity(&self, data: &[f32]) -> Result<(), FluidError> {
        self.velocity.current().write_data(&self.queue, data)
    }

    /// Read back the velocity field as RGBA f32 texels.
    pub fn velocity_field(&self) -> Result<Vec<f32>, FluidError> {
        self.read_field(self.velocity.current())
    }

    /// Read back the pressure field.
    pub fn pressure_field(&self) -> Result<Vec<f32>, FluidError> {
        self.read_field(self.pressure.current())
    }

    /// Read back the dye field.
    pub fn dye_field(&self) -> Result<Vec<f32>, FluidError> {
        self.read_field(self.dye.current())
    }

    /// Recompute and read back the divergence of the current velocity
    /// field. Diagnostic; the per-frame solve uses the same stage.
    pub fn compute_divergence(&mut self) -> Result<Vec<f32>, FluidError> {
        let dx = 1.0 / self.width as f32;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Divergence Encoder"),
            });
        {
            let mut ctx = StageContext {
                device: &self.device,
                queue: &self.queue,
                encoder: &mut encoder,
            };
            stages::divergence(
                &mut ctx,
                &self.divergence_pass,
                dx,
                self.velocity.current(),
                &self.divergence,
            );
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.read_field(&self.divergence)
    }

    /// Run the export pass and read back the dye field as packed RGBA8
    /// pixels, row-major from the bottom-left texel.
    pub fn frame_rgba8(&self) -> Result<Vec<u8>, FluidError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Export Encoder"),
            });
        {
            let mut ctx = StageContext {
                device: &self.device,
                queue: &self.queue,
                encoder: &mut encoder,
            };
            stages::export_rgba(&mut ctx, &self.export_pass, self.dye.current(), &self.pixel_buffer);
        }
        let pixel_bytes = self.width as u64 * self.height as u64 * 4;
        encoder.copy_buffer_to_buffer(&self.pixel_buffer, 0, &self.pixel_staging, 0, pixel_bytes);
        self.queue.submit(std::iter::once(encoder.finish()));

        self.map_staging(&self.pixel_staging, pixel_bytes)
    }

    /// Synchronous field readback through the staging buffer.
    fn read_field(&self, field: &FieldBuffer) -> Result<Vec<f32>, FluidError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(field.buffer(), 0, &self.field_staging, 0, field.byte_size());
        self.queue.submit(std::iter::once(encoder.finish()));

        let bytes = self.map_staging(&self.field_staging, field.byte_size())?;
        Ok(bytemuck::cast_slice(&bytes).to_vec())
    }

    fn map_staging(&self, staging: &wgpu::Buffer, len: u64) -> Result<Vec<u8>, FluidError> {
        let slice = staging.slice(..len);

        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device.poll(wgpu::PollType::wait_indefinitely()).ok();
        rx.recv().expect("map callback dropped")?;

        let data = {
            let view = slice.get_mapped_range();
            view.to_vec()
        };
        staging.unmap();
        Ok(data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Simulated time in seconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Frames advanced so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Summary statistics over one channel of a field readback.
#[derive(Debug, Clone, Copy)]
pub struct FieldStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub l2: f32,
}

impl FieldStats {
    /// Compute stats over `channel` (0..4) of RGBA texel data.
    pub fn of_channel(data: &[f32], channel: usize) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut count = 0usize;

        for texel in data.chunks_exact(crate::solver::CHANNELS) {
            let v = texel[channel];
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
            sum_sq += (v as f64) * (v as f64);
            count += 1;
        }

        if count == 0 {
            return Self {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                l2: 0.0,
            };
        }

        Self {
            min,
            max,
            mean: (sum / count as f64) as f32,
            l2: sum_sq.sqrt() as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DyeSeed;

    fn test_config() -> SimulationConfig {
        SimulationConfig {
            width: 64,
            height: 64,
            seed: DyeSeed::Blank,
            ..Default::default()
        }
    }

    fn create_solver(config: &SimulationConfig) -> Option<FluidSolver> {
        match pollster::block_on(FluidSolver::new(config)) {
            Ok(solver) => Some(solver),
            Err(FluidError::NoAdapter) => {
                eprintln!("Skipping GPU test: no adapter available");
                None
            }
            Err(e) => panic!("Failed to create fluid solver: {e:?}"),
        }
    }

    fn uniform_field(width: usize, height: usize, texel: [f32; 4]) -> Vec<f32> {
        let mut data = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            data.extend_from_slice(&texel);
        }
        data
    }

    /// L2 norm of one channel over texels at least `margin` from the
    /// edge.
    fn interior_l2(data: &[f32], width: usize, height: usize, channel: usize, margin: usize) -> f64 {
        let mut sum = 0.0f64;
        for y in margin..height - margin {
            for x in margin..width - margin {
                let v = data[(y * width + x) * 4 + channel] as f64;
                sum += v * v;
            }
        }
        sum.sqrt()
    }

    #[test]
    fn solver_creation() {
        let config = test_config();
        if create_solver(&config).is_none() {
            return;
        }
    }

    #[test]
    fn oversized_grid_fails_allocation() {
        let config = SimulationConfig {
            width: 8192,
            height: 8192,
            seed: DyeSeed::Blank,
            ..Default::default()
        };
        match pollster::block_on(FluidSolver::new(&config)) {
            Err(FluidError::Allocation { needed, limit }) => {
                assert!(needed > limit);
            }
            Err(FluidError::NoAdapter) => {
                eprintln!("Skipping GPU test: no adapter available");
            }
            other => panic!("expected allocation failure, got {other:?}"),
        }
    }

    #[test]
    fn broken_shader_reports_compile_diagnostic() {
        let Some(solver) = create_solver(&test_config()) else {
            return;
        };
        let result =
            pollster::block_on(StagePass::new(&solver.device, "broken", "not wgsl at all", 1));
        match result {
            Err(FluidError::ShaderCompile { stage, message }) => {
                assert_eq!(stage, "broken");
                assert!(!message.is_empty());
            }
            other => panic!("expected shader compile error, got {other:?}"),
        }
    }

    #[test]
    fn divergence_of_uniform_field_is_zero() {
        let Some(mut solver) = create_solver(&test_config()) else {
            return;
        };
        solver
            .seed_velocity(&uniform_field(64, 64, [0.3, -0.2, 0.0, 0.0]))
            .unwrap();

        let div = solver.compute_divergence().unwrap();
        for y in 1..63 {
            for x in 1..63 {
                let v = div[(y * 64 + x) * 4];
                assert!(v.abs() < 1e-5, "divergence at ({x},{y}) = {v}");
            }
        }
    }

    #[test]
    fn diffusion_of_uniform_field_is_fixed_point() {
        let Some(mut solver) = create_solver(&test_config()) else {
            return;
        };
        solver
            .seed_velocity(&uniform_field(64, 64, [1.0, 2.0, 0.0, 0.0]))
            .unwrap();

        let dx = 1.0 / 64.0f32;
        let dt = 1.0 / 60.0f32;
        let alpha = dx * dx / (1e-7 * dt);
        let r_beta = 1.0 / (4.0 + alpha);

        let mut encoder = solver
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let mut ctx = StageContext {
                device: &solver.device,
                queue: &solver.queue,
                encoder: &mut encoder,
            };
            stages::jacobi_diffuse(&mut ctx, &solver.jacobi_pass, 20, alpha, r_beta, &mut solver.velocity);
        }
        solver.queue.submit(std::iter::once(encoder.finish()));

        let velocity = solver.velocity_field().unwrap();
        for texel in velocity.chunks_exact(4) {
            assert!((texel[0] - 1.0).abs() < 1e-3);
            assert!((texel[1] - 2.0).abs() < 1e-3);
        }
    }

    #[test]
    fn boundary_edges_copy_scaled_interior_neighbor() {
        let Some(mut solver) = create_solver(&test_config()) else {
            return;
        };

        // Deterministic non-uniform field.
        let mut data = vec![0.0f32; 64 * 64 * 4];
        for y in 0..64 {
            for x in 0..64 {
                data[(y * 64 + x) * 4] = x as f32 + y as f32 * 0.5;
                data[(y * 64 + x) * 4 + 1] = x as f32 - y as f32;
            }
        }
        solver.seed_velocity(&data).unwrap();

        for scale in [-1.0f32, 1.0] {
            let mut encoder = solver
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
            {
                let mut ctx = StageContext {
                    device: &solver.device,
                    queue: &solver.queue,
                    encoder: &mut encoder,
                };
                // Re-seed the pair's current buffer each round.
                solver.velocity.current().write_data(&solver.queue, &data).unwrap();
                stages::apply_boundary(&mut ctx, &solver.boundary_pass, scale, &mut solver.velocity);
            }
            solver.queue.submit(std::iter::once(encoder.finish()));

            let out = solver.velocity_field().unwrap();
            let at = |x: usize, y: usize| out[(y * 64 + x) * 4];
            let src = |x: usize, y: usize| data[(y * 64 + x) * 4];

            // Left edge (non-corner), top edge, right edge.
            assert!((at(0, 10) - scale * src(1, 10)).abs() < 1e-5);
            assert!((at(63, 20) - scale * src(62, 20)).abs() < 1e-5);
            assert!((at(30, 63) - scale * src(30, 62)).abs() < 1e-5);
            // Interior passthrough.
            assert!((at(32, 32) - src(32, 32)).abs() < 1e-5);
        }
    }

    #[test]
    fn force_impulse_is_gaussian_in_x() {
        let Some(solver) = create_solver(&test_config()) else {
            return;
        };

        let mut velocity = FieldPair::new(&solver.device, 64, 64, "test.velocity");
        let mut encoder = solver
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let mut ctx = StageContext {
                device: &solver.device,
                queue: &solver.queue,
                encoder: &mut encoder,
            };
            stages::apply_force(
                &mut ctx,
                &solver.force_pass,
                1.0 / 60.0,
                1e-3,
                1e-3,
                [500.0, 0.0],
                [0.5, 0.5],
                &mut velocity,
            );
        }
        solver.queue.submit(std::iter::once(encoder.finish()));

        let field = solver.read_field(velocity.current()).unwrap();
        let vx = |x: usize, y: usize| field[(y * 64 + x) * 4];
        let vy = |x: usize, y: usize| field[(y * 64 + x) * 4 + 1];

        // Strongest at the impulse center, Gaussian falloff away from it,
        // no lateral component for a pure-x force.
        let center = vx(32, 32);
        assert!(center > 1000.0, "center impulse too weak: {center}");
        assert!(vy(32, 32).abs() < 1e-3);

        let mid = vx(40, 32);
        let far = vx(56, 32);
        assert!(
            center > mid && mid > far,
            "impulse should decay with distance: {center}, {mid}, {far}"
        );
    }

    #[test]
    fn zero_velocity_advection_is_fixed_point() {
        let config = SimulationConfig {
            width: 64,
            height: 64,
            seed: DyeSeed::Solid {
                color: [0.25, 0.5, 0.75],
            },
            ..Default::default()
        };
        let Some(mut solver) = create_solver(&config) else {
            return;
        };

        let before = solver.dye_field().unwrap();
        for _ in 0..10 {
            solver.step_with_dt(&config, PointerState::default(), 1.0 / 60.0);
        }
        let after = solver.dye_field().unwrap();

        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-5, "dye drifted: {a} -> {b}");
        }

        let velocity = solver.velocity_field().unwrap();
        let stats = FieldStats::of_channel(&velocity, 0);
        assert!(stats.max.abs() < 1e-6 && stats.min.abs() < 1e-6);
    }

    #[test]
    fn projection_reduces_divergence_by_an_order_of_magnitude() {
        let Some(mut solver) = create_solver(&test_config()) else {
            return;
        };

        // High-frequency divergent field: vx = sin(2 pi k x), vy = sin(2 pi k y).
        let k = 8.0 * std::f32::consts::TAU;
        let mut data = vec![0.0f32; 64 * 64 * 4];
        for y in 0..64 {
            for x in 0..64 {
                let fx = (x as f32 + 0.5) / 64.0;
                let fy = (y as f32 + 0.5) / 64.0;
                data[(y * 64 + x) * 4] = (k * fx).sin();
                data[(y * 64 + x) * 4 + 1] = (k * fy).sin();
            }
        }
        solver.seed_velocity(&data).unwrap();

        let div_before = solver.compute_divergence().unwrap();
        let l2_before = interior_l2(&div_before, 64, 64, 0, 8);
        assert!(l2_before > 1.0, "seed field should be divergent");

        let dx = 1.0 / 64.0f32;
        let mut encoder = solver
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let mut ctx = StageContext {
                device: &solver.device,
                queue: &solver.queue,
                encoder: &mut encoder,
            };
            stages::jacobi_method(
                &mut ctx,
                &solver.jacobi_pass,
                20,
                -(dx * dx),
                0.25,
                &mut solver.pressure,
                &solver.divergence,
            );
            stages::subtract_gradient(
                &mut ctx,
                &solver.subtract_pass,
                dx,
                solver.pressure.current(),
                &mut solver.velocity,
            );
        }
        solver.queue.submit(std::iter::once(encoder.finish()));

        let div_after = solver.compute_divergence().unwrap();
        let l2_after = interior_l2(&div_after, 64, 64, 0, 8);

        assert!(
            l2_after * 10.0 <= l2_before,
            "projection too weak: {l2_before} -> {l2_after}"
        );
    }

    #[test]
    fn dye_seed_is_uploaded() {
        let config = SimulationConfig {
            width: 64,
            height: 64,
            seed: DyeSeed::Checkerboard { blocks: 8 },
            ..Default::default()
        };
        let Some(solver) = create_solver(&config) else {
            return;
        };

        let expected = config.seed.generate(64, 64);
        let dye = solver.dye_field().unwrap();
        assert_eq!(dye, expected);
    }

    #[test]
    fn reset_restores_initial_state() {
        let config = SimulationConfig {
            width: 64,
            height: 64,
            seed: DyeSeed::Checkerboard { blocks: 8 },
            ..Default::default()
        };
        let Some(mut solver) = create_solver(&config) else {
            return;
        };

        let pointer = PointerState {
            position: [0.5, 0.5],
            velocity: [0.05, 0.0],
            active: true,
        };
        for _ in 0..5 {
            solver.step_with_dt(&config, pointer, 1.0 / 60.0);
        }
        assert_eq!(solver.frame(), 5);

        solver.reset().unwrap();
        assert_eq!(solver.frame(), 0);
        assert_eq!(solver.time(), 0.0);

        let velocity = solver.velocity_field().unwrap();
        assert!(velocity.iter().all(|&v| v == 0.0));
        assert_eq!(solver.dye_field().unwrap(), config.seed.generate(64, 64));
    }

    #[test]
    fn frame_export_packs_rgba8() {
        let config = SimulationConfig {
            width: 64,
            height: 64,
            seed: DyeSeed::Solid {
                color: [1.0, 0.5, 0.0],
            },
            ..Default::default()
        };
        let Some(solver) = create_solver(&config) else {
            return;
        };

        let pixels = solver.frame_rgba8().unwrap();
        assert_eq!(pixels.len(), 64 * 64 * 4);
        assert_eq!(pixels[0], 255);
        assert_eq!(pixels[1], 128);
        assert_eq!(pixels[2], 0);
        assert_eq!(pixels[3], 255);
    }

    #[test]
    fn stats_of_channel() {
        let data = [1.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0];
        let stats = FieldStats::of_channel(&data, 0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.mean, 2.0);
        assert!((stats.l2 - 10.0f32.sqrt()).abs() < 1e-6);
    }
}
