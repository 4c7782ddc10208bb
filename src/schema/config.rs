//! Configuration types for the fluid simulation.

use serde::{Deserialize, Serialize};

use super::DyeSeed;

fn default_rho() -> f32 {
    1e-3
}

fn default_impulse_radius() -> f32 {
    1e-3
}

fn default_dye_color() -> [f32; 3] {
    [1.0, 0.6, 0.0]
}

/// Top-level simulation configuration.
///
/// All numeric fields are live parameters: the solver reads them at the
/// start of every frame, so the caller may mutate them between frames
/// (slider input) without touching the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Grid width in texels.
    pub width: usize,
    /// Grid height in texels.
    pub height: usize,
    /// Kinematic viscosity (typically 1e-7..1e-4).
    pub viscosity: f32,
    /// Jacobi iteration count for diffusion and the pressure solve.
    pub jacobi_iterations: u32,
    /// Scale applied to pointer velocity to form the impulse force.
    pub force_scale: f32,
    /// Vorticity confinement strength. Zero disables the stage.
    pub vorticity_scale: f32,
    /// Fluid density used by the force impulse.
    #[serde(default = "default_rho")]
    pub rho: f32,
    /// Gaussian falloff radius of force/dye splats, in UV space.
    #[serde(default = "default_impulse_radius")]
    pub impulse_radius: f32,
    /// Dye color injected at the pointer.
    #[serde(default = "default_dye_color")]
    pub dye_color: [f32; 3],
    /// Initial dye field pattern.
    #[serde(default)]
    pub seed: DyeSeed,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            viscosity: 1e-7,
            jacobi_iterations: 20,
            force_scale: 500.0,
            vorticity_scale: 0.0,
            rho: default_rho(),
            impulse_radius: default_impulse_radius(),
            dye_color: default_dye_color(),
            seed: DyeSeed::default(),
        }
    }
}

impl SimulationConfig {
    /// Grid spacing. Derived from width only; non-square grids keep a
    /// square spacing, which is a known limitation of the method here.
    pub fn grid_spacing(&self) -> f32 {
        1.0 / self.width as f32
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.viscosity <= 0.0 {
            return Err(ConfigError::InvalidViscosity);
        }
        if self.jacobi_iterations == 0 {
            return Err(ConfigError::InvalidIterations);
        }
        if self.rho <= 0.0 {
            return Err(ConfigError::InvalidDensity);
        }
        if self.impulse_radius <= 0.0 {
            return Err(ConfigError::InvalidImpulseRadius);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions must be non-zero")]
    InvalidDimensions,
    #[error("Viscosity must be positive")]
    InvalidViscosity,
    #[error("Jacobi iteration count must be non-zero")]
    InvalidIterations,
    #[error("Density (rho) must be positive")]
    InvalidDensity,
    #[error("Impulse radius must be positive")]
    InvalidImpulseRadius,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_dimensions() {
        let config = SimulationConfig {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn rejects_zero_iterations() {
        let config = SimulationConfig {
            jacobi_iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidIterations)
        ));
    }

    #[test]
    fn grid_spacing_derives_from_width() {
        let config = SimulationConfig {
            width: 256,
            height: 128,
            ..Default::default()
        };
        assert_eq!(config.grid_spacing(), 1.0 / 256.0);
    }

    #[test]
    fn serde_round_trip() {
        let config = SimulationConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.width, config.width);
        assert_eq!(parsed.viscosity, config.viscosity);
        assert_eq!(parsed.jacobi_iterations, config.jacobi_iterations);
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let json = r#"{
            "width": 128,
            "height": 128,
            "viscosity": 1e-7,
            "jacobi_iterations": 20,
            "force_scale": 500.0,
            "vorticity_scale": 0.0
        }"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.rho, 1e-3);
        assert_eq!(config.dye_color, [1.0, 0.6, 0.0]);
    }
}
