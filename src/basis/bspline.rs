//! Univariate B-splines defined by a local knot vector.
//!
//! A B-spline of order `k` is given by `k + 1` non-decreasing knots. The
//! parameter `end` is the upper end of the global parameter domain: the last
//! non-empty knot span ending there is treated as closed so the basis remains
//! a partition of unity on the whole closed domain.

#[inline]
fn indicator(t0: f64, t1: f64, x: f64, end: f64) -> f64
{
    if t0 < t1 && t0 <= x && (x < t1 || (x == end && t1 == end))
    {
        1.0
    }
    else
    {
        0.0
    }
}

/// Value of the B-spline with local knots `knots` at `x`.
pub fn evaluate(knots: &[f64], x: f64, end: f64) -> f64
{
    let order = knots.len() - 1;
    if order == 1
    {
        return indicator(knots[0], knots[1], x, end);
    }
    let t0 = knots[0];
    let tk = knots[order];
    if x < t0 || x > tk
    {
        return 0.0;
    }
    let mut value = 0.0;
    let d1 = knots[order - 1] - t0;
    if d1 > 0.0
    {
        value += (x - t0) / d1 * evaluate(&knots[..order], x, end);
    }
    let d2 = tk - knots[1];
    if d2 > 0.0
    {
        value += (tk - x) / d2 * evaluate(&knots[1..], x, end);
    }
    value
}

/// Derivative of order `nderiv` of the B-spline with local knots `knots` at `x`.
pub fn derivative(knots: &[f64], x: f64, end: f64, nderiv: usize) -> f64
{
    if nderiv == 0
    {
        return evaluate(knots, x, end);
    }
    let order = knots.len() - 1;
    if order == 1
    {
        return 0.0;
    }
    let t0 = knots[0];
    let tk = knots[order];
    if x < t0 || x > tk
    {
        return 0.0;
    }
    let mut value = 0.0;
    let d1 = knots[order - 1] - t0;
    if d1 > 0.0
    {
        value += derivative(&knots[..order], x, end, nderiv - 1) / d1;
    }
    let d2 = tk - knots[1];
    if d2 > 0.0
    {
        value -= derivative(&knots[1..], x, end, nderiv - 1) / d2;
    }
    (order - 1) as f64 * value
}

/// Value and derivatives up to `nderiv` (at most 2). Unused entries are zero.
pub fn evaluate_with_derivs(knots: &[f64], x: f64, end: f64, nderiv: usize) -> [f64; 3]
{
    let mut result = [0.0; 3];
    for (d, r) in result.iter_mut().enumerate().take(nderiv.min(2) + 1)
    {
        *r = derivative(knots, x, end, d);
    }
    result
}

/// Number of knots in `knots` equal to `value`.
#[inline]
pub fn multiplicity(knots: &[f64], value: f64) -> usize
{
    knots.iter().filter(|&&t| t == value).count()
}

///
/// Split a B-spline by inserting `x` into its local knot vector.
///
/// Returns the two children together with their scaling factors, so that
/// `B[knots] = alpha1 * B[child1] + alpha2 * B[child2]`. `x` must lie strictly
/// inside the support.
///
pub fn insert_knot(knots: &[f64], x: f64) -> ((Vec<f64>, f64), (Vec<f64>, f64))
{
    let order = knots.len() - 1;
    let pos = knots.partition_point(|&t| t <= x);
    let mut refined = Vec::with_capacity(knots.len() + 1);
    refined.extend_from_slice(&knots[..pos]);
    refined.push(x);
    refined.extend_from_slice(&knots[pos..]);

    let t0 = knots[0];
    let tk = knots[order];
    let alpha1 = if x >= knots[order - 1] { 1.0 } else { (x - t0) / (knots[order - 1] - t0) };
    let alpha2 = if x <= knots[1] { 1.0 } else { (tk - x) / (tk - knots[1]) };

    ((refined[..=order].to_vec(), alpha1), (refined[1..].to_vec(), alpha2))
}

/// Open knot vector with `ncoef` coefficients of order `order` and uniform
/// interior knots on `[start, end]`.
pub fn uniform_open_knots(ncoef: usize, order: usize, start: f64, end: f64) -> Vec<f64>
{
    let num_spans = ncoef + 1 - order;
    let mut knots = Vec::with_capacity(ncoef + order);
    knots.extend(std::iter::repeat(start).take(order));
    for i in 1..num_spans
    {
        knots.push(start + (end - start) * i as f64 / num_spans as f64);
    }
    knots.extend(std::iter::repeat(end).take(order));
    knots
}

#[cfg(test)]
mod tests
{
    use super::*;
    use ::approx::assert_abs_diff_eq;

    #[test]
    fn check_partition_of_unity()
    {
        let knots = [0.0, 0.0, 0.0, 0.3, 0.5, 1.0, 1.0, 1.0];
        let order = 3;
        for &x in &[0.0, 0.1, 0.3, 0.45, 0.77, 1.0]
        {
            let sum: f64 = (0..knots.len() - order).map(|i| evaluate(&knots[i..=i + order], x, 1.0)).sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn check_derivative_of_quadratic()
    {
        // B[0,0,0,1] = (1-x)^2
        let knots = [0.0, 0.0, 0.0, 1.0];
        let x = 0.25;
        let values = evaluate_with_derivs(&knots, x, 1.0, 2);
        assert_abs_diff_eq!(values[0], 0.5625, epsilon = 1e-14);
        assert_abs_diff_eq!(values[1], -1.5, epsilon = 1e-14);
        assert_abs_diff_eq!(values[2], 2.0, epsilon = 1e-14);
    }

    #[test]
    fn check_knot_insertion_reproduces_parent()
    {
        let knots = [0.0, 0.2, 0.5, 1.0];
        let ((k1, a1), (k2, a2)) = insert_knot(&knots, 0.7);
        assert_eq!(k1, vec![0.0, 0.2, 0.5, 0.7]);
        assert_eq!(k2, vec![0.2, 0.5, 0.7, 1.0]);
        for i in 0..=20
        {
            let x = i as f64 / 20.0;
            let parent = evaluate(&knots, x, 1.0);
            let children = a1 * evaluate(&k1, x, 1.0) + a2 * evaluate(&k2, x, 1.0);
            assert_abs_diff_eq!(parent, children, epsilon = 1e-14);
        }
    }

    #[test]
    fn check_uniform_open_knots()
    {
        assert_eq!(uniform_open_knots(3, 3, 0.0, 1.0), vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(uniform_open_knots(4, 2, 0.0, 3.0), vec![0.0, 0.0, 1.0, 2.0, 3.0, 3.0]);
    }
}
