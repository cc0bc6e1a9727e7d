/// Linear interpolation between two points. Returns the average y value when `x1 == x2`.
#[must_use]
pub fn linear_interpolation(x1: f64, x2: f64, y1: f64, y2: f64, xp: f64) -> f64 {
    // Repeated knots in a value map collapse to a single point; use the average of the
    // y values there (x1 == x2 == xp).
    #[allow(clippy::float_cmp)]
    if x1 == x2 {
        return f64::midpoint(y1, y2);
    }
    y1 + (y2 - y1) / (x2 - x1) * (xp - x1)
}

/// Get the index of the largest value in `xs` that is less than or equal to `xp`, and the same
/// index clamped so that there is always a following value to interpolate towards.
/// `xs` must be sorted and hold at least two values.
#[must_use]
pub fn get_lower_index(xs: &[f64], xp: f64) -> (usize, usize) {
    let lower_index = match xs.binary_search_by(|x| x.total_cmp(&xp)) {
        Ok(i) => i,
        // xp may be less than min(xs), so binary search may return Err(0); clamp to 0 so
        // that extrapolation uses the two smallest values.
        Err(i) => usize::max(i, 1) - 1,
    };
    (lower_index, usize::min(lower_index, xs.len().saturating_sub(2)))
}

/// Least squares slope of `y` on `x` for a line through the origin.
/// Returns 0.0 when every `x` is zero.
#[must_use]
pub fn least_squares_slope(x: &[f64], y: &[f64]) -> f64 {
    let sxx: f64 = x.iter().map(|v| v * v).sum();
    if sxx == 0.0 {
        return 0.0;
    }
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    sxy / sxx
}

#[cfg(test)]
mod test {
    use statrs::assert_almost_eq;

    use super::{get_lower_index, least_squares_slope, linear_interpolation};

    #[test]
    fn test_linear_interpolation_simple() {
        let result = linear_interpolation(1.0, 2.0, 3.0, 6.0, 1.25);
        assert_almost_eq!(result, 3.75, 0.0);
    }

    #[test]
    fn test_linear_extrapolation_simple() {
        let result = linear_interpolation(1.0, 2.0, 3.0, 6.0, 2.5);
        assert_almost_eq!(result, 7.5, 0.0);
    }

    #[test]
    fn test_linear_interpolation_same_x() {
        let result = linear_interpolation(1.0, 1.0, 3.0, 6.0, 1.0);
        assert_almost_eq!(result, 4.5, 0.0);
    }

    #[test]
    fn test_get_lower_index() {
        let xs = vec![1960.0, 1961.0, 1962.0, 1963.0];
        assert_eq!(get_lower_index(&xs, 1961.5), (1, 1));
        assert_eq!(get_lower_index(&xs, 1963.0), (3, 2));
        assert_eq!(get_lower_index(&xs, 1950.0), (0, 0));
        assert_eq!(get_lower_index(&xs, 1970.0), (3, 2));
    }

    #[test]
    fn test_least_squares_slope() {
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 4.0, 6.0];
        assert_almost_eq!(least_squares_slope(&x, &y), 2.0, 1e-12);
        assert_almost_eq!(least_squares_slope(&[0.0, 0.0], &[1.0, 2.0]), 0.0, 0.0);
    }
}
