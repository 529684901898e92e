use nalgebra::{DMatrix, DVector};

use super::report::FeatureScaling;

/// Predictors centred and scaled to unit population variance, response centred.
///
/// Constant columns keep a scale of zero and are zeroed out; the solver never
/// lets them enter the model.
#[derive(Debug, Clone)]
pub(crate) struct Standardized {
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub y_mean: f64,
}

impl Standardized {
    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn is_active(&self, j: usize) -> bool {
        self.scales[j] > 0.0
    }

    /// Map coefficients fitted on the standardized scale back to the input scale.
    pub fn unstandardize(&self, beta: &DVector<f64>) -> (f64, Vec<f64>) {
        let weights: Vec<f64> = beta
            .iter()
            .zip(&self.scales)
            .map(|(b, s)| if *s > 0.0 { b / s } else { 0.0 })
            .collect();
        let shift: f64 = weights.iter().zip(&self.means).map(|(w, m)| w * m).sum();
        (self.y_mean - shift, weights)
    }
}

pub(crate) fn standardize(x: &DMatrix<f64>, y: &DVector<f64>) -> Standardized {
    let rows = x.nrows();
    let n = rows.max(1) as f64;

    let mut standardized = x.clone();
    let mut means = Vec::with_capacity(x.ncols());
    let mut scales = Vec::with_capacity(x.ncols());

    for j in 0..x.ncols() {
        let mut column = standardized.column_mut(j);
        let mean = column.sum() / n;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        if is_constant(mean, std_dev) {
            column.fill(0.0);
            scales.push(0.0);
        } else {
            column.apply(|v| *v = (*v - mean) / std_dev);
            scales.push(std_dev);
        }
        means.push(mean);
    }

    let y_mean = y.sum() / n;
    let mut centred = y.map(|v| v - y_mean);
    if is_constant(y_mean, (centred.norm_squared() / n).sqrt()) {
        centred.fill(0.0);
    }

    Standardized {
        x: standardized,
        y: centred,
        means,
        scales,
        y_mean,
    }
}

// Relative cutoff so that float noise around a constant reads as constant.
fn is_constant(mean: f64, std_dev: f64) -> bool {
    !std_dev.is_finite() || std_dev <= 1e-12 * mean.abs().max(1.0)
}

pub(crate) fn feature_scaling(standardized: &Standardized, names: &[String]) -> Vec<FeatureScaling> {
    names
        .iter()
        .zip(standardized.means.iter().zip(&standardized.scales))
        .map(|(name, (mean, std_dev))| FeatureScaling {
            feature: name.clone(),
            mean: *mean,
            std_dev: *std_dev,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn standardize_produces_unit_population_variance() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0]);
        let y = DVector::from_vec(vec![1.0, 2.0, 3.0, 6.0]);
        let s = standardize(&x, &y);

        for j in 0..2 {
            let column = s.x.column(j);
            assert_abs_diff_eq!(column.sum(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(column.norm_squared() / 4.0, 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(s.means[1], 25.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.y_mean, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.y.sum(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_columns_are_marked_inactive() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 5.0, 2.0, 5.0, 3.0, 5.0]);
        let y = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let s = standardize(&x, &y);

        assert!(s.is_active(0));
        assert!(!s.is_active(1));
        assert!(s.x.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn constant_response_centres_to_exact_zero() {
        let x = DMatrix::from_row_slice(10, 1, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let y = DVector::from_element(10, 4.2);
        let s = standardize(&x, &y);
        assert_eq!(s.y.norm_squared(), 0.0);
        assert_abs_diff_eq!(s.y_mean, 4.2, epsilon = 1e-12);
    }

    #[test]
    fn unstandardize_recovers_input_scale() {
        // y = 1 + 2 * x exactly; the standardized slope is 2 * sd(x).
        let x = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, 2.0]);
        let y = DVector::from_vec(vec![1.0, 3.0, 5.0]);
        let s = standardize(&x, &y);
        let beta = DVector::from_vec(vec![2.0 * s.scales[0]]);

        let (intercept, weights) = s.unstandardize(&beta);
        assert_abs_diff_eq!(weights[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(intercept, 1.0, epsilon = 1e-12);
    }
}
