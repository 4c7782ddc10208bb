//! Solver stage library - one orchestration function per physical
//! operator.
//!
//! Each stage encodes exactly one full-grid dispatch: it binds its source
//! fields read-only, the destination read-write, uploads a typed params
//! struct, and (for double-buffered fields) swaps the pair so `current()`
//! names the just-written buffer. The borrow checker enforces the
//! ping-pong convention: a caller cannot retain a stale buffer reference
//! across a stage call.

use super::{FieldBuffer, FieldPair, StageContext, StagePass};

/// Uniform params for the advection shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct AdvectParams {
    width: u32,
    height: u32,
    dt: f32,
    _pad: f32,
}

/// Uniform params for the force impulse shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ForceParams {
    width: u32,
    height: u32,
    dt: f32,
    rho: f32,
    force: [f32; 2],
    impulse_pos: [f32; 2],
    radius: f32,
    _pad: [f32; 3],
}

/// Uniform params for the dye injection shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct DyeParams {
    width: u32,
    height: u32,
    radius: f32,
    _pad0: f32,
    color: [f32; 4],
    impulse_pos: [f32; 2],
    _pad1: [f32; 2],
}

/// Uniform params for the Jacobi relaxation shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct JacobiParams {
    width: u32,
    height: u32,
    alpha: f32,
    r_beta: f32,
}

/// Uniform params for the divergence and gradient-subtraction shaders.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct StencilParams {
    width: u32,
    height: u32,
    half_rdx: f32,
    _pad: f32,
}

/// Uniform params for the boundary shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BoundaryParams {
    width: u32,
    height: u32,
    scale: f32,
    _pad: f32,
}

/// Uniform params for the vorticity confinement shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct VorticityParams {
    width: u32,
    height: u32,
    dt: f32,
    dx: f32,
    scale: f32,
    _pad: [f32; 3],
}

/// Uniform params for the frame export shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ExportParams {
    width: u32,
    height: u32,
    _pad0: u32,
    _pad1: u32,
}

/// Transport `field` along `velocity` (semi-Lagrangian backtrace).
pub fn advect(
    ctx: &mut StageContext<'_>,
    pass: &StagePass,
    dt: f32,
    field: &mut FieldPair,
    velocity: &FieldBuffer,
) {
    let (w, h) = (field.current().width(), field.current().height());
    let params = AdvectParams {
        width: w,
        height: h,
        dt,
        _pad: 0.0,
    };
    pass.dispatch(
        ctx,
        bytemuck::bytes_of(&params),
        &[field.current().buffer(), velocity.buffer()],
        field.back().buffer(),
        w,
        h,
    );
    field.swap();
}

/// Advect the velocity field by itself. The current buffer is bound as
/// both transported field and carrier, which is sound because both
/// bindings are read-only.
pub fn self_advect(ctx: &mut StageContext<'_>, pass: &StagePass, dt: f32, velocity: &mut FieldPair) {
    let (w, h) = (velocity.current().width(), velocity.current().height());
    let params = AdvectParams {
        width: w,
        height: h,
        dt,
        _pad: 0.0,
    };
    pass.dispatch(
        ctx,
        bytemuck::bytes_of(&params),
        &[velocity.current().buffer(), velocity.current().buffer()],
        velocity.back().buffer(),
        w,
        h,
    );
    velocity.swap();
}

/// Add a Gaussian force impulse at `impulse_pos`, scaled by `dt / rho`.
#[allow(clippy::too_many_arguments)]
pub fn apply_force(
    ctx: &mut StageContext<'_>,
    pass: &StagePass,
    dt: f32,
    rho: f32,
    radius: f32,
    force: [f32; 2],
    impulse_pos: [f32; 2],
    velocity: &mut FieldPair,
) {
    let (w, h) = (velocity.current().width(), velocity.current().height());
    let params = ForceParams {
        width: w,
        height: h,
        dt,
        rho,
        force,
        impulse_pos,
        radius,
        _pad: [0.0; 3],
    };
    pass.dispatch(
        ctx,
        bytemuck::bytes_of(&params),
        &[velocity.current().buffer()],
        velocity.back().buffer(),
        w,
        h,
    );
    velocity.swap();
}

/// Splat `color` into the dye field around `impulse_pos`.
pub fn inject_dye(
    ctx: &mut StageContext<'_>,
    pass: &StagePass,
    radius: f32,
    color: [f32; 3],
    impulse_pos: [f32; 2],
    dye: &mut FieldPair,
) {
    let (w, h) = (dye.current().width(), dye.current().height());
    let params = DyeParams {
        width: w,
        height: h,
        radius,
        _pad0: 0.0,
        color: [color[0], color[1], color[2], 1.0],
        impulse_pos,
        _pad1: [0.0; 2],
    };
    pass.dispatch(
        ctx,
        bytemuck::bytes_of(&params),
        &[dye.current().buffer()],
        dye.back().buffer(),
        w,
        h,
    );
    dye.swap();
}

/// One Jacobi relaxation step of `(laplacian - alpha) x = b`.
pub fn jacobi_iterate(
    ctx: &mut StageContext<'_>,
    pass: &StagePass,
    alpha: f32,
    r_beta: f32,
    x: &mut FieldPair,
    b: &FieldBuffer,
) {
    let (w, h) = (x.current().width(), x.current().height());
    let params = JacobiParams {
        width: w,
        height: h,
        alpha,
        r_beta,
    };
    pass.dispatch(
        ctx,
        bytemuck::bytes_of(&params),
        &[x.current().buffer(), b.buffer()],
        x.back().buffer(),
        w,
        h,
    );
    x.swap();
}

/// Run `iterations` Jacobi steps against a fixed right-hand side,
/// ping-ponging `x` so each step reads the previous result. Convergence
/// is governed by the iteration budget, not measured.
pub fn jacobi_method(
    ctx: &mut StageContext<'_>,
    pass: &StagePass,
    iterations: u32,
    alpha: f32,
    r_beta: f32,
    x: &mut FieldPair,
    b: &FieldBuffer,
) {
    for _ in 0..iterations {
        jacobi_iterate(ctx, pass, alpha, r_beta, x, b);
    }
}

/// Viscous diffusion: Jacobi steps where the right-hand side is the
/// current iterate itself, as in the implicit diffusion formulation.
pub fn jacobi_diffuse(
    ctx: &mut StageContext<'_>,
    pass: &StagePass,
    iterations: u32,
    alpha: f32,
    r_beta: f32,
    x: &mut FieldPair,
) {
    let (w, h) = (x.current().width(), x.current().height());
    let params = JacobiParams {
        width: w,
        height: h,
        alpha,
        r_beta,
    };
    for _ in 0..iterations {
        pass.dispatch(
            ctx,
            bytemuck::bytes_of(&params),
            &[x.current().buffer(), x.current().buffer()],
            x.back().buffer(),
            w,
            h,
        );
        x.swap();
    }
}

/// Central-difference divergence of `velocity`, written into `dst.x`.
pub fn divergence(
    ctx: &mut StageContext<'_>,
    pass: &StagePass,
    dx: f32,
    velocity: &FieldBuffer,
    dst: &FieldBuffer,
) {
    let (w, h) = (velocity.width(), velocity.height());
    let params = StencilParams {
        width: w,
        height: h,
        half_rdx: 0.5 / dx,
        _pad: 0.0,
    };
    pass.dispatch(
        ctx,
        bytemuck::bytes_of(&params),
        &[velocity.buffer()],
        dst.buffer(),
        w,
        h,
    );
}

/// Subtract the pressure gradient from the velocity field.
pub fn subtract_gradient(
    ctx: &mut StageContext<'_>,
    pass: &StagePass,
    dx: f32,
    pressure: &FieldBuffer,
    velocity: &mut FieldPair,
) {
    let (w, h) = (velocity.current().width(), velocity.current().height());
    let params = StencilParams {
        width: w,
        height: h,
        half_rdx: 0.5 / dx,
        _pad: 0.0,
    };
    pass.dispatch(
        ctx,
        bytemuck::bytes_of(&params),
        &[pressure.buffer(), velocity.current().buffer()],
        velocity.back().buffer(),
        w,
        h,
    );
    velocity.swap();
}

/// Apply boundary conditions: edge texels copy the interior neighbor
/// scaled by `scale` (-1 reflective, +1 Neumann).
pub fn apply_boundary(
    ctx: &mut StageContext<'_>,
    pass: &StagePass,
    scale: f32,
    field: &mut FieldPair,
) {
    let (w, h) = (field.current().width(), field.current().height());
    let params = BoundaryParams {
        width: w,
        height: h,
        scale,
        _pad: 0.0,
    };
    pass.dispatch(
        ctx,
        bytemuck::bytes_of(&params),
        &[field.current().buffer()],
        field.back().buffer(),
        w,
        h,
    );
    field.swap();
}

/// Vorticity confinement: restore small-scale rotation to the velocity
/// field, scaled by `scale`.
pub fn vorticity_confine(
    ctx: &mut StageContext<'_>,
    pass: &StagePass,
    dt: f32,
    dx: f32,
    scale: f32,
    velocity: &mut FieldPair,
) {
    let (w, h) = (velocity.current().width(), velocity.current().height());
    let params = VorticityParams {
        width: w,
        height: h,
        dt,
        dx,
        scale,
        _pad: [0.0; 3],
    };
    pass.dispatch(
        ctx,
        bytemuck::bytes_of(&params),
        &[velocity.current().buffer()],
        velocity.back().buffer(),
        w,
        h,
    );
    velocity.swap();
}

/// Pack the dye field into RGBA8 pixels in `pixels`.
pub fn export_rgba(
    ctx: &mut StageContext<'_>,
    pass: &StagePass,
    dye: &FieldBuffer,
    pixels: &wgpu::Buffer,
) {
    let (w, h) = (dye.width(), dye.height());
    let params = ExportParams {
        width: w,
        height: h,
        _pad0: 0,
        _pad1: 0,
    };
    pass.dispatch(
        ctx,
        bytemuck::bytes_of(&params),
        &[dye.buffer()],
        pixels,
        w,
        h,
    );
}
