pub mod basis_function;
pub mod handle;
pub mod lr_spline;
pub mod mesh;
pub mod projection;
pub mod tensor;
pub mod traits;
