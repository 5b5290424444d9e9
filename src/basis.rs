pub mod bspline;
pub mod quadrature;
