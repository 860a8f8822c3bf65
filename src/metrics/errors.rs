//! Pointwise forecast error metrics.
//!
//! Sequences are paired by position. An empty input yields `NaN`.

/// Denominator guard used by sMAPE.
pub const SMAPE_EPS: f64 = 1e-8;

/// Floor added to the MASE scale so a perfect naive fit does not divide by zero.
pub const MASE_FLOOR: f64 = 1e-12;

/// Mean absolute error.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(y, yhat)| (y - yhat).abs()))
}

/// Symmetric mean absolute percentage error with the default epsilon.
///
/// Bounded in `[0, 2]`.
pub fn smape(actual: &[f64], predicted: &[f64]) -> f64 {
    smape_with_eps(actual, predicted, SMAPE_EPS)
}

pub fn smape_with_eps(actual: &[f64], predicted: &[f64], eps: f64) -> f64 {
    mean(
        actual
            .iter()
            .zip(predicted)
            .map(|(y, yhat)| 2.0 * (y - yhat).abs() / (y.abs() + yhat.abs() + eps)),
    )
}

/// Mean absolute scaled error.
///
/// Validation MAE divided by the MAE of a reference forecast over the
/// training slice, which makes the value comparable across series of
/// different scale.
pub fn mase(actual: &[f64], predicted: &[f64], train_actual: &[f64], train_reference: &[f64]) -> f64 {
    mae(actual, predicted) / (mae(train_actual, train_reference) + MASE_FLOOR)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return f64::NAN;
    }
    sum / count as f64
}
