//! # stable-flow
//!
//! Real-time 2D fluid simulation on the GPU, after Stam's Stable Fluids
//! method. Velocity, pressure, and dye live in double-buffered storage
//! buffers; every solver operator (semi-Lagrangian advection, Jacobi
//! diffusion, pressure projection, boundary conditions, vorticity
//! confinement, dye transport) is one wgpu compute pass over the grid.
//!
//! The crate is host-agnostic: a windowed frontend feeds real pointer
//! events through a [`PointerTracker`] and presents [`FluidSolver::frame_rgba8`]
//! frames however it likes; headless drivers call
//! [`FluidSolver::step_with_dt`] with a fixed step.
//!
//! ```no_run
//! use stable_flow::{FluidSolver, PointerState, SimulationConfig};
//!
//! # fn main() -> Result<(), stable_flow::FluidError> {
//! let config = SimulationConfig::default();
//! let mut solver = pollster::block_on(FluidSolver::new(&config))?;
//!
//! // Drag the pointer through the center of the grid.
//! let pointer = PointerState {
//!     position: [0.5, 0.5],
//!     velocity: [0.01, 0.0],
//!     active: true,
//! };
//! for _ in 0..60 {
//!     solver.step_with_dt(&config, pointer, 1.0 / 60.0);
//! }
//!
//! let pixels = solver.frame_rgba8()?;
//! # let _ = pixels;
//! # Ok(())
//! # }
//! ```

pub mod schema;
pub mod solver;

pub use schema::{ConfigError, DyeSeed, PointerState, PointerTracker, SimulationConfig};
pub use solver::{FieldStats, FluidError, FluidSolver, TimestepClock};
