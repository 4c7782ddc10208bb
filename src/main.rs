//! Stable Fluids CLI - Run headless simulations from JSON configuration.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use stable_flow::{FieldStats, FluidSolver, PointerTracker, SimulationConfig};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [steps] [frame.ppm]", args[0]);
        eprintln!();
        eprintln!("Run a headless Stable Fluids simulation from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to simulation configuration file");
        eprintln!("  steps        Number of frames to simulate (default: 300)");
        eprintln!("  frame.ppm    Optional path for the final dye frame (binary PPM)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let steps: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(300);
    let frame_path = args.get(3).map(PathBuf::from);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: SimulationConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    println!("Stable Fluids Simulation");
    println!("========================");
    println!("Grid: {}x{}", config.width, config.height);
    println!("Viscosity: {}", config.viscosity);
    println!("Jacobi iterations: {}", config.jacobi_iterations);
    println!("Steps: {}", steps);
    println!();

    let mut solver = pollster::block_on(FluidSolver::new(&config)).unwrap_or_else(|e| {
        eprintln!("Error creating solver: {}", e);
        std::process::exit(1);
    });

    // Scripted pointer input: a circular drag around the grid center
    // stands in for the mouse.
    let pointer = PointerTracker::new();
    pointer.pressed();

    println!("Running simulation...");
    let start = Instant::now();

    for i in 0..steps {
        let angle = i as f32 * 0.05;
        pointer.moved([
            0.5 + 0.25 * angle.cos(),
            0.5 + 0.25 * angle.sin(),
        ]);

        solver.step_with_dt(&config, pointer.snapshot(), 1.0 / 60.0);

        // Print progress every 10%
        if (i + 1) % (steps / 10).max(1) == 0 {
            let velocity = solver.velocity_field().unwrap_or_else(report_gpu_error);
            let dye = solver.dye_field().unwrap_or_else(report_gpu_error);
            let vx = FieldStats::of_channel(&velocity, 0);
            let vy = FieldStats::of_channel(&velocity, 1);
            let red = FieldStats::of_channel(&dye, 0);
            let elapsed = start.elapsed().as_secs_f32();
            println!(
                "  Step {}/{}: |vx|<={:.4}, |vy|<={:.4}, dye mean={:.4}, {:.1} steps/s",
                i + 1,
                steps,
                vx.max.abs().max(vx.min.abs()),
                vy.max.abs().max(vy.min.abs()),
                red.mean,
                (i + 1) as f32 / elapsed
            );
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "Simulated {:.2}s of fluid time in {:.2}s ({:.1} steps/s)",
        solver.time(),
        elapsed.as_secs_f32(),
        steps as f32 / elapsed.as_secs_f32()
    );

    if let Some(path) = frame_path {
        let pixels = solver.frame_rgba8().unwrap_or_else(report_gpu_error);
        write_ppm(&path, solver.width(), solver.height(), &pixels).unwrap_or_else(|e| {
            eprintln!("Error writing frame: {}", e);
            std::process::exit(1);
        });
        println!("Wrote final frame to {}", path.display());
    }
}

/// Dump RGBA8 pixels as a binary PPM (alpha dropped), flipping rows so
/// the image is top-down while the field is bottom-up.
fn write_ppm(path: &std::path::Path, width: u32, height: u32, pixels: &[u8]) -> std::io::Result<()> {
    let mut out = Vec::with_capacity(pixels.len() / 4 * 3 + 32);
    out.extend_from_slice(format!("P6\n{} {}\n255\n", width, height).as_bytes());
    for y in (0..height).rev() {
        for x in 0..width {
            let idx = ((y * width + x) * 4) as usize;
            out.extend_from_slice(&pixels[idx..idx + 3]);
        }
    }
    fs::write(path, out)
}

fn report_gpu_error<T>(e: stable_flow::FluidError) -> T {
    eprintln!("GPU readback failed: {}", e);
    std::process::exit(1);
}

fn print_example_config() {
    let config = SimulationConfig::default();

    println!("Example configuration (config.json):");
    println!("{}", serde_json::to_string_pretty(&config).unwrap());
}
