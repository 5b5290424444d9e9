//! Least squares system for the coefficients of an LR surface, combining a
//! data term with a thin plate smoothing term.

use nalgebra::DMatrix;

use crate::basis::quadrature::gauss_legendre_on;
use crate::errors::{LRError, Result};
use crate::surface::traits::{BasisValue, LRSurface};

/// Smallest pivot, relative to the largest diagonal entry, of a regular system.
const RANK_TOLERANCE: f64 = 1.0e-12;

///
/// Normal equations `A x = b` over the free coefficients of a surface.
///
/// Fixed coefficients do not appear as unknowns: their contribution is moved
/// to the right hand side, and `solve` returns them unchanged.
///
#[derive(Clone, Debug)]
pub struct LeastSquaresSystem
{
    dim: usize,
    /// Row of each coefficient in the system, `None` for fixed coefficients.
    free_index: Vec<Option<usize>>,
    coefs: Vec<f64>,
    lhs: DMatrix<f64>,
    rhs: DMatrix<f64>,
}

impl LeastSquaresSystem
{
    pub fn new<S: LRSurface + ?Sized>(surface: &S, coef_known: &[i32]) -> Result<Self>
    {
        let ncoef = surface.num_coefs();
        if coef_known.len() != ncoef
        {
            return Err(LRError::invalid(format!("{} fixation flags for {ncoef} coefficients", coef_known.len())));
        }
        let mut nfree = 0;
        let free_index = coef_known.iter().map(|&flag| if flag > 0 { None } else { nfree += 1; Some(nfree - 1) }).collect();
        let dim = surface.dim();
        Ok(Self { dim, free_index, coefs: surface.coefs(), lhs: DMatrix::zeros(nfree, nfree), rhs: DMatrix::zeros(nfree, dim) })
    }

    pub fn num_free(&self) -> usize
    {
        self.lhs.nrows()
    }

    ///
    /// Add `weight * sum |S(u_k, v_k) - x_k|^2` over all records
    /// `(u, v, x_1, ..., x_dim)` of `points`.
    ///
    pub fn add_data_term<S: LRSurface + ?Sized>(&mut self, surface: &S, points: &[f64], weight: f64)
    {
        let dim = self.dim;
        let mut residual = vec![0.0; dim];
        for record in points.chunks_exact(dim + 2)
        {
            let basis = surface.basis_values(record[0], record[1], 0);
            residual.copy_from_slice(&record[2..]);
            for b in basis.iter().filter(|b| self.free_index[b.index].is_none())
            {
                let c = &self.coefs[b.index * dim..(b.index + 1) * dim];
                residual.iter_mut().zip(c).for_each(|(r, c)| *r -= b.values[0] * c);
            }
            for bi in &basis
            {
                let Some(row) = self.free_index[bi.index] else { continue };
                for d in 0..dim
                {
                    self.rhs[(row, d)] += weight * bi.values[0] * residual[d];
                }
                for bj in &basis
                {
                    if let Some(col) = self.free_index[bj.index]
                    {
                        self.lhs[(row, col)] += weight * bi.values[0] * bj.values[0];
                    }
                }
            }
        }
    }

    ///
    /// Add `weight` times the thin plate energy
    /// `integral(S_uu^2 + 2 S_uv^2 + S_vv^2)`, integrated element by element
    /// with Gauss-Legendre quadrature.
    ///
    pub fn add_smoothing_term<S: LRSurface + ?Sized>(&mut self, surface: &S, weight: f64)
    {
        if weight == 0.0
        {
            return;
        }
        let (order_u, order_v) = surface.orders();
        let dim = self.dim;
        for element in surface.elements()
        {
            let (nodes_u, weights_u) = gauss_legendre_on(order_u.max(2), element.umin, element.umax);
            let (nodes_v, weights_v) = gauss_legendre_on(order_v.max(2), element.vmin, element.vmax);
            for (&v, &wv) in nodes_v.iter().zip(&weights_v)
            {
                for (&u, &wu) in nodes_u.iter().zip(&weights_u)
                {
                    let basis = surface.basis_values(u, v, 2);
                    self.add_energy_at(&basis, weight * wu * wv, dim);
                }
            }
        }
    }

    fn add_energy_at(&mut self, basis: &[BasisValue], weight: f64, dim: usize)
    {
        let energy = |a: &BasisValue, b: &BasisValue| a.values[3] * b.values[3] + 2.0 * a.values[4] * b.values[4] + a.values[5] * b.values[5];
        for bi in basis
        {
            let Some(row) = self.free_index[bi.index] else { continue };
            for bj in basis
            {
                let e = weight * energy(bi, bj);
                match self.free_index[bj.index]
                {
                    Some(col) => self.lhs[(row, col)] += e,
                    None =>
                    {
                        for d in 0..dim
                        {
                            self.rhs[(row, d)] -= e * self.coefs[bj.index * dim + d];
                        }
                    }
                }
            }
        }
    }

    ///
    /// Solve for the free coefficients and return the full coefficient vector.
    /// Cholesky factorization is tried first, LU with partial pivoting if the
    /// matrix is not numerically positive definite. A pivot below
    /// `RANK_TOLERANCE` times the largest diagonal entry means the system is
    /// rank deficient and the solve fails.
    ///
    pub fn solve(&self) -> Result<Vec<f64>>
    {
        let mut coefs = self.coefs.clone();
        if self.num_free() == 0
        {
            return Ok(coefs);
        }
        let threshold = RANK_TOLERANCE * self.lhs.diagonal().amax();
        let singular = || LRError::NumericalFailure(format!("singular system with {} free coefficients", self.num_free()));
        let solution = match self.lhs.clone().cholesky()
        {
            Some(cholesky) if cholesky.l_dirty().diagonal().iter().all(|l| l * l > threshold) => cholesky.solve(&self.rhs),
            _ =>
            {
                let lu = self.lhs.clone().lu();
                if lu.u().diagonal().iter().any(|p| p.abs() <= threshold)
                {
                    return Err(singular());
                }
                lu.solve(&self.rhs).ok_or_else(singular)?
            }
        };
        if solution.iter().any(|x| !x.is_finite())
        {
            return Err(LRError::NumericalFailure("least squares solution is not finite".to_string()));
        }
        for (i, free) in self.free_index.iter().enumerate()
        {
            if let Some(row) = free
            {
                for d in 0..self.dim
                {
                    coefs[i * self.dim + d] = solution[(*row, d)];
                }
            }
        }
        Ok(coefs)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::surface::lr_spline::LRSplineSurface;
    use crate::surface::tensor::SplineBasis;
    use ::approx::assert_abs_diff_eq;

    fn surface(ncoef: usize, order: usize, dim: usize) -> LRSplineSurface
    {
        let bu = SplineBasis::uniform(ncoef, order, 0.0, 1.0).unwrap();
        let bv = SplineBasis::uniform(ncoef, order, 0.0, 1.0).unwrap();
        LRSplineSurface::new(bu, bv, vec![0.0; ncoef * ncoef * dim], dim).unwrap()
    }

    fn sample<F: Fn(f64, f64) -> f64>(n: usize, f: F) -> Vec<f64>
    {
        let mut points = Vec::new();
        for i in 0..n
        {
            for j in 0..n
            {
                let (u, v) = (i as f64 / (n - 1) as f64, j as f64 / (n - 1) as f64);
                points.extend([u, v, f(u, v)]);
            }
        }
        points
    }

    #[test]
    fn check_reproduces_polynomial()
    {
        let mut s = surface(4, 3, 1);
        let points = sample(9, |u, v| 1.0 + u * u - 2.0 * u * v + v);
        let mut system = LeastSquaresSystem::new(&s, &vec![0; s.num_coefs()]).unwrap();
        system.add_data_term(&s, &points, 1.0);
        let coefs = system.solve().unwrap();
        s.set_coefs(&coefs).unwrap();
        let mut result = [0.0];
        for record in points.chunks_exact(3)
        {
            s.evaluate(record[0], record[1], &mut result);
            assert_abs_diff_eq!(result[0], record[2], epsilon = 1e-10);
        }
    }

    #[test]
    fn check_fixed_coefficients_pass_through()
    {
        let mut s = surface(3, 3, 2);
        let initial: Vec<f64> = (0..18).map(|i| 0.1 * i as f64).collect();
        s.set_coefs(&initial).unwrap();
        let mut flags = vec![1; 9];
        flags[4] = 0;
        let points: Vec<f64> = sample(5, |u, v| u + v).chunks_exact(3).flat_map(|r| [r[0], r[1], r[2], -r[2]]).collect();
        let mut system = LeastSquaresSystem::new(&s, &flags).unwrap();
        assert_eq!(system.num_free(), 1);
        system.add_data_term(&s, &points, 1.0);
        system.add_smoothing_term(&s, 1.0e-3);
        let coefs = system.solve().unwrap();
        for i in (0..9).filter(|&i| i != 4)
        {
            assert_eq!(coefs[2 * i], initial[2 * i]);
            assert_eq!(coefs[2 * i + 1], initial[2 * i + 1]);
        }
        assert_ne!(coefs[8], initial[8]);
    }

    #[test]
    fn check_smoothing_only_flattens()
    {
        // pure smoothing with a fixed boundary leaves a plane through the boundary
        let mut s = surface(3, 3, 1);
        let boundary = [0.0, 0.5, 1.0, 0.5, 1.0, 1.5, 1.0, 1.5, 2.0];
        s.set_coefs(&boundary).unwrap();
        let mut flags = vec![1; 9];
        flags[4] = 0;
        let mut system = LeastSquaresSystem::new(&s, &flags).unwrap();
        system.add_smoothing_term(&s, 1.0);
        let coefs = system.solve().unwrap();
        assert_abs_diff_eq!(coefs[4], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn check_singular_system_fails()
    {
        let s = surface(3, 3, 1);
        let mut system = LeastSquaresSystem::new(&s, &vec![0; 9]).unwrap();
        // a zero weight leaves the normal matrix empty
        system.add_data_term(&s, &[0.5, 0.5, 1.0], 0.0);
        assert!(matches!(system.solve(), Err(LRError::NumericalFailure(_))));
    }

    #[test]
    fn check_rank_deficient_system_fails()
    {
        // thin plate energy alone vanishes on every linear function
        let s = surface(4, 3, 1);
        let mut system = LeastSquaresSystem::new(&s, &vec![0; 16]).unwrap();
        system.add_data_term(&s, &sample(6, |u, v| (3.0 * u).sin() * v), 0.0);
        system.add_smoothing_term(&s, 1.0);
        assert!(matches!(system.solve(), Err(LRError::NumericalFailure(_))));

        // too few points to pin down a biquadratic
        let mut system = LeastSquaresSystem::new(&s, &vec![0; 16]).unwrap();
        system.add_data_term(&s, &sample(3, |u, v| u + v), 1.0);
        assert!(matches!(system.solve(), Err(LRError::NumericalFailure(_))));
    }

    #[test]
    fn check_flag_length_mismatch()
    {
        let s = surface(3, 3, 1);
        assert!(matches!(LeastSquaresSystem::new(&s, &[0; 4]), Err(LRError::InvalidInput(_))));
    }
}
