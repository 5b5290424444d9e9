use log::debug;

use crate::approx::config::DEFAULT_SMOOTHING_WEIGHT;
use crate::approx::solver::LeastSquaresSystem;
use crate::errors::Result;
use crate::surface::traits::LRSurface;

///
/// One weighted least squares fit of the free coefficients of a surface,
/// minimizing `(1 - w) * data + w * smoothness` for a smoothing weight `w`.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothingApproximator
{
    weight: f64,
}

impl Default for SmoothingApproximator
{
    fn default() -> Self
    {
        Self { weight: DEFAULT_SMOOTHING_WEIGHT }
    }
}

impl SmoothingApproximator
{
    /// The weight is clamped to `[0, 1]`.
    pub fn new(weight: f64) -> Self
    {
        Self { weight: weight.clamp(0.0, 1.0) }
    }

    pub fn weight(&self) -> f64
    {
        self.weight
    }

    ///
    /// Fit the coefficients of `surface` not fixed by `coef_known` to
    /// `points`. Coefficients are replaced only after a successful solve.
    /// Returns false if every coefficient is fixed, in which case nothing
    /// changes.
    ///
    pub fn fit<S: LRSurface + ?Sized>(&self, surface: &mut S, points: &[f64], coef_known: &[i32]) -> Result<bool>
    {
        let mut system = LeastSquaresSystem::new(&*surface, coef_known)?;
        if system.num_free() == 0
        {
            debug!("all {} coefficients fixed, skipping fit", coef_known.len());
            return Ok(false);
        }
        system.add_data_term(&*surface, points, 1.0 - self.weight);
        system.add_smoothing_term(&*surface, self.weight);
        let coefs = system.solve()?;
        surface.set_coefs(&coefs)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::surface::lr_spline::LRSplineSurface;
    use crate::surface::tensor::SplineBasis;
    use ::approx::assert_abs_diff_eq;

    fn bilinear_points() -> Vec<f64>
    {
        let mut points = Vec::new();
        for i in 0..6
        {
            for j in 0..6
            {
                let (u, v) = (i as f64 / 5.0, j as f64 / 5.0);
                points.extend([u, v, 2.0 + u - 3.0 * v]);
            }
        }
        points
    }

    fn biquadratic() -> LRSplineSurface
    {
        let bu = SplineBasis::uniform(3, 3, 0.0, 1.0).unwrap();
        let bv = SplineBasis::uniform(3, 3, 0.0, 1.0).unwrap();
        LRSplineSurface::new(bu, bv, vec![0.0; 9], 1).unwrap()
    }

    #[test]
    fn check_weight_is_clamped()
    {
        assert_eq!(SmoothingApproximator::new(-0.5).weight(), 0.0);
        assert_eq!(SmoothingApproximator::new(3.0).weight(), 1.0);
        assert_eq!(SmoothingApproximator::default().weight(), DEFAULT_SMOOTHING_WEIGHT);
    }

    #[test]
    fn check_fit_plane()
    {
        let mut surface = biquadratic();
        let points = bilinear_points();
        assert!(SmoothingApproximator::new(0.1).fit(&mut surface, &points, &[0; 9]).unwrap());
        // a plane has no bending energy, so smoothing does not bias the fit
        let mut result = [0.0];
        surface.evaluate(0.3, 0.7, &mut result);
        assert_abs_diff_eq!(result[0], 2.0 + 0.3 - 2.1, epsilon = 1e-10);
    }

    #[test]
    fn check_all_fixed_is_noop()
    {
        let mut surface = biquadratic();
        let before = surface.coefs();
        assert!(!SmoothingApproximator::default().fit(&mut surface, &bilinear_points(), &[1; 9]).unwrap());
        assert_eq!(surface.coefs(), before);
    }
}
