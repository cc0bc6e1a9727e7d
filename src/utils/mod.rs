pub mod curve_fitting;
pub use curve_fitting::{get_lower_index, least_squares_slope, linear_interpolation};
