use std::f64::consts::PI;

/// Legendre polynomial `P_n(x)` and its derivative, for `|x| < 1`.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let (mut prev, mut p) = (1.0, x);
    for k in 2..=n {
        let k = k as f64;
        (prev, p) = (p, ((2.0 * k - 1.0) * x * p - (k - 1.0) * prev) / k);
    }
    (p, n as f64 * (x * p - prev) / (x * x - 1.0))
}

/// Gauss-Legendre nodes and weights on the interval (0, 1).
///
/// An `n` point rule integrates polynomials up to degree `2n - 1` exactly.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    if n == 1 {
        return (vec![0.5], vec![1.0]);
    }
    let mut pairs = Vec::with_capacity(n);
    let eps = 1e-15;

    for i in 0..n {
        // Chebyshev-like initial guess
        let theta = PI * (i as f64 + 0.75) / (n as f64 + 0.5);
        let mut x = theta.cos();

        for _ in 0..100 {
            let (p, dp) = legendre(n, x);
            let dx = -p / dp;
            x += dx;
            if dx.abs() < eps {
                break;
            }
        }

        let (_, dp) = legendre(n, x);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        pairs.push((0.5 * (x + 1.0), 0.5 * w));
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    pairs.into_iter().unzip()
}

/// Gauss-Legendre rule mapped onto `[a, b]`.
pub fn gauss_legendre_on(n: usize, a: f64, b: f64) -> (Vec<f64>, Vec<f64>)
{
    let (nodes, weights) = gauss_legendre(n);
    let width = b - a;
    (nodes.iter().map(|x| a + width * x).collect(), weights.iter().map(|w| w * width).collect())
}

#[test]
fn test_gauss_legendre() {
    let (nodes, weights) = gauss_legendre(10);
    let expected_nodes = [0.0130467357414145,0.067468316655508,0.160295215850488,0.283302302935377,0.425562830509185,0.574437169490815,0.716697697064624,0.839704784149512,0.932531683344492,0.986953264258586];
    let expected_weights = [0.033335672154344,0.07472567457529,0.109543181257991,0.134633359654998,0.147762112357376,0.147762112357376,0.134633359654998,0.109543181257991,0.07472567457529,0.033335672154344];

    for (n1, n2) in nodes.iter().zip(expected_nodes.iter()) {
        assert!((n1 - n2).abs() < 1e-12);
    }
    for (w1, w2) in weights.iter().zip(expected_weights.iter()) {
        assert!((w1 - w2).abs() < 1e-12);
    }
}

#[test]
fn test_gauss_legendre_polynomial_exactness()
{
    // 3 points integrate x^5 exactly
    let (nodes, weights) = gauss_legendre_on(3, 1.0, 3.0);
    let integral: f64 = nodes.iter().zip(weights.iter()).map(|(x, w)| w * x.powi(5)).sum();
    assert!((integral - (3.0_f64.powi(6) - 1.0) / 6.0).abs() < 1e-10);
}
