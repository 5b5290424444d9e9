use criterion::{criterion_group, criterion_main, Criterion};
use lrfit::{errors::LRError, ApproxConfig, InitialSurface, SurfaceApprox};

fn build_points(n: usize) -> Vec<f64>
{
    let mut points = Vec::with_capacity(3 * n * n);
    for i in 0..n
    {
        for j in 0..n
        {
            let (u, v) = (i as f64 / (n - 1) as f64, j as f64 / (n - 1) as f64);
            points.extend([u, v, (4.0 * u).sin() * (3.0 * v).cos()]);
        }
    }
    points
}

fn approximate(points: &[f64], max_iter: usize) -> Result<(), LRError>
{
    // every run starts from the original parameters
    let mut points = points.to_vec();
    let mut approx = SurfaceApprox::new(&mut points, 1, ApproxConfig::new(1e-4), &InitialSurface::Default)?;
    let _result = approx.get_approx_surf(max_iter)?;
    Ok(())
}

fn run_wave(c: &mut Criterion)
{
    let points = build_points(40);
    c.bench_function("wave 40x40, 4 iterations", |b| b.iter(|| approximate(&points, 4).unwrap()));
}

criterion_group!(benches, run_wave);
criterion_main!(benches);
