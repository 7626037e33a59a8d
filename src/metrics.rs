/// Coefficient of determination:
/// `1 - mean((y - ŷ)²) / mean((y - mean(y))²)`.
///
/// Not clamped: a model worse than predicting the mean scores below zero.
/// When the labels have no variance (constant, a single value, or none at
/// all) the ratio is undefined and 0.0 is returned, so a NaN never reaches
/// the aggregated results.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn r_squared(labels: &[f64], predictions: &[f64]) -> f64 {
    assert_eq!(
        labels.len(),
        predictions.len(),
        "labels and predictions must have equal length"
    );
    if labels.is_empty() {
        return 0.0;
    }
    let n = labels.len() as f64;
    let mean = labels.iter().sum::<f64>() / n;
    let ss_res = labels.iter().zip(predictions).map(|(y, p)| (y - p).powi(2)).sum::<f64>() / n;
    let ss_tot = labels.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / n;
    if ss_tot == 0.0 {
        return 0.0;
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_prediction_scores_one() {
        let y = [21.0, 34.5, 60.0, 45.25];
        assert_eq!(r_squared(&y, &y), 1.0);
    }

    #[test]
    fn predicting_the_mean_scores_zero() {
        let y = [20.0, 30.0, 40.0, 50.0];
        assert_eq!(r_squared(&y, &[35.0; 4]), 0.0);
    }

    #[test]
    fn worse_than_the_mean_is_negative() {
        let y = [1.0, 2.0, 3.0];
        assert!(r_squared(&y, &[3.0, 2.0, 1.0]) < 0.0);
    }

    #[test]
    fn constant_labels_score_zero_whatever_the_predictions() {
        let y = [5.0; 4];
        assert_eq!(r_squared(&y, &[4.0, 6.5, 5.0, 5.1]), 0.0);
        assert_eq!(r_squared(&y, &y), 0.0);
        assert_eq!(r_squared(&[], &[]), 0.0);
    }
}
