//! Solver module - GPU-accelerated Stable Fluids pipeline.
//!
//! Implements the classic per-frame sequence (advection, viscous
//! diffusion, pressure projection, boundary conditions, vorticity
//! confinement, dye transport) as wgpu compute passes over double-buffered
//! RGBA32F field buffers.

mod clock;
mod field;
mod pass;
mod simulation;
pub mod stages;

pub use clock::*;
pub use field::*;
pub use pass::*;
pub use simulation::*;

use crate::schema::ConfigError;

/// Error type for solver setup and GPU operations.
///
/// Every variant except `BufferMap` can only occur before the solver
/// enters its running state; per-frame GPU work is assumed infallible on
/// a healthy context.
#[derive(Debug, thiserror::Error)]
pub enum FluidError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Field allocation of {needed} bytes exceeds device limit of {limit} bytes")]
    Allocation { needed: u64, limit: u64 },

    #[error("Shader for stage '{stage}' failed to compile: {message}")]
    ShaderCompile { stage: &'static str, message: String },

    #[error("Pipeline for stage '{stage}' failed to link: {message}")]
    PipelineLink { stage: &'static str, message: String },

    #[error("Seed data holds {got} floats, field expects {expected}")]
    SeedLength { expected: usize, got: usize },

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),
}
