pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE: mean((predicted - expected)²)
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        assert_eq!(predicted.len(), expected.len(), "prediction/label length mismatch");
        let n = predicted.len() as f64;
        predicted.iter().zip(expected.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>() / n
    }

    /// Gradient of the mean loss w.r.t. each prediction: 2·(predicted - expected) / n
    pub fn derivative(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        let n = predicted.len() as f64;
        predicted.iter().zip(expected.iter())
            .map(|(a, b)| 2.0 * (a - b) / n)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_and_gradient() {
        let p = [1.0, 2.0, 4.0, 0.0];
        let y = [1.0, 0.0, 5.0, 0.0];
        assert_eq!(MseLoss::loss(&p, &y), (0.0 + 4.0 + 1.0 + 0.0) / 4.0);
        assert_eq!(MseLoss::derivative(&p, &y), vec![0.0, 1.0, -0.5, 0.0]);
    }
}
