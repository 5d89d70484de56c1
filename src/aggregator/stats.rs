//! Pearson correlation with a two-sided significance test.

use crate::utils::error::StatsError;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Result of a correlation test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    /// Pearson's r, in [-1, 1]
    pub coefficient: f64,
    /// Two-sided p-value from Student's t with n - 2 degrees of freedom
    pub p_value: f64,
}

impl Correlation {
    /// Correlation of a constant series, reported as NaN
    pub fn undefined() -> Self {
        Self {
            coefficient: f64::NAN,
            p_value: f64::NAN,
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.coefficient.is_nan()
    }
}

/// Pearson correlation coefficient of two equally long series
///
/// **Public** - used for the runtime/stage gap correlation
///
/// # Errors
/// * `StatsError::LengthMismatch` - Series differ in length
/// * `StatsError::NotEnoughSamples` - Fewer than 2 samples
/// * `StatsError::ConstantInput` - Either series has zero variance
pub fn pearson(x: &[f64], y: &[f64]) -> Result<Correlation, StatsError> {
    if x.len() != y.len() {
        return Err(StatsError::LengthMismatch(x.len(), y.len()));
    }
    let n = x.len();
    if n < 2 {
        return Err(StatsError::NotEnoughSamples(n));
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return Err(StatsError::ConstantInput);
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    Ok(Correlation {
        coefficient: r,
        p_value: two_sided_p_value(r, n)?,
    })
}

/// Two-sided p-value of `r` under the null hypothesis of no correlation
fn two_sided_p_value(r: f64, n: usize) -> Result<f64, StatsError> {
    // Two points always lie on a line
    if n == 2 {
        return Ok(1.0);
    }
    if r.abs() >= 1.0 {
        return Ok(0.0);
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| StatsError::Distribution(e.to_string()))?;
    Ok((2.0 * dist.sf(t.abs())).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {} but got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_perfect_linear() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let up: Vec<f64> = x.iter().map(|v| 3.0 * v + 1.0).collect();
        let down: Vec<f64> = x.iter().map(|v| -0.5 * v).collect();

        let r = pearson(&x, &up).unwrap();
        assert_close(r.coefficient, 1.0, 1e-12);
        assert_close(r.p_value, 0.0, 1e-12);
        assert_close(pearson(&x, &down).unwrap().coefficient, -1.0, 1e-12);
    }

    #[test]
    fn test_p_value_three_points() {
        // r = 0.5 with one degree of freedom gives p = 2/3 exactly
        let r = pearson(&[1.0, 2.0, 3.0], &[1.0, 3.0, 2.0]).unwrap();
        assert_close(r.coefficient, 0.5, 1e-12);
        assert_close(r.p_value, 2.0 / 3.0, 1e-8);
    }

    #[test]
    fn test_uncorrelated() {
        let r = pearson(&[1.0, 2.0, 3.0, 4.0], &[1.0, -1.0, -1.0, 1.0]).unwrap();
        assert_close(r.coefficient, 0.0, 1e-12);
        assert_close(r.p_value, 1.0, 1e-8);
    }

    #[test]
    fn test_two_samples() {
        let r = pearson(&[1.0, 2.0], &[5.0, 3.0]).unwrap();
        assert_close(r.coefficient, -1.0, 1e-12);
        assert_eq!(r.p_value, 1.0);
    }

    #[test]
    fn test_p_value_matches_t_table() {
        // Ten noisy samples, eight degrees of freedom
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let noise = [0.0, 3.0, -2.0, 1.0, -3.0, 2.5, -1.5, 2.0, -2.5, 0.5];
        let y: Vec<f64> = x.iter().zip(noise).map(|(v, e)| v + e).collect();
        let r = pearson(&x, &y).unwrap();

        let df = 8.0;
        let t = r.coefficient * (df / (1.0 - r.coefficient * r.coefficient)).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df).unwrap();
        assert_close(r.p_value, 2.0 * (1.0 - dist.cdf(t.abs())), 1e-12);
        assert!(r.p_value > 0.0 && r.p_value < 1.0);
    }

    #[test]
    fn test_undefined_correlation() {
        let c = Correlation::undefined();
        assert!(!c.is_defined());
        assert!(Correlation { coefficient: 0.0, p_value: 1.0 }.is_defined());
    }

    #[test]
    fn test_errors() {
        assert_eq!(pearson(&[1.0], &[1.0, 2.0]), Err(StatsError::LengthMismatch(1, 2)));
        assert_eq!(pearson(&[1.0], &[1.0]), Err(StatsError::NotEnoughSamples(1)));
        assert_eq!(
            pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]),
            Err(StatsError::ConstantInput)
        );
    }
}
