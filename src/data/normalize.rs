/// Statistics a `normalize` call used.
///
/// `scale` is `None` when the input had no spread (every value equal, or no
/// values at all): the data was centered but not scaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormStats {
    pub mean: f64,
    pub scale: Option<f64>,
}

/// Replaces every NaN with 0.0 and returns how many were replaced.
///
/// Must run before `normalize`: a single NaN would poison the mean.
pub fn replace_nan(values: &mut [f64]) -> usize {
    let mut replaced = 0;
    for v in values.iter_mut().filter(|v| v.is_nan()) {
        *v = 0.0;
        replaced += 1;
    }
    replaced
}

/// Zero-centers `values` and scales them to unit max-absolute-value:
/// `x' = (x - mean) / max|x - mean|`.
///
/// Statistics are computed from `values` alone, so normalizing two splits
/// separately never leaks one split's statistics into the other. Running it
/// a second time recomputes the statistics; on already normalized data they
/// come out as mean 0 and scale 1, so the result only moves by rounding.
pub fn normalize(values: &mut [f64]) -> NormStats {
    if values.is_empty() {
        return NormStats { mean: 0.0, scale: None };
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let mut max_abs = 0.0f64;
    for v in values.iter_mut() {
        *v -= mean;
        max_abs = max_abs.max(v.abs());
    }
    if max_abs == 0.0 {
        return NormStats { mean, scale: None };
    }
    for v in values.iter_mut() {
        *v /= max_abs;
    }
    NormStats { mean, scale: Some(max_abs) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn centers_and_scales_to_unit_max_abs() {
        let mut v = vec![1.0, 2.0, 3.0, 6.0];
        let stats = normalize(&mut v);
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.scale, Some(3.0));
        assert_eq!(v, vec![-2.0 / 3.0, -1.0 / 3.0, 0.0, 1.0]);
    }

    #[test]
    fn second_pass_is_a_no_op_up_to_rounding() {
        let mut v: Vec<f64> = (0..50).map(|i| ((i * 37) % 11) as f64 * 0.3 - 1.1).collect();
        normalize(&mut v);
        let once = v.clone();
        let stats = normalize(&mut v);
        assert_abs_diff_eq!(stats.mean, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.scale.unwrap(), 1.0, epsilon = 1e-12);
        for (a, b) in once.iter().zip(&v) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_input_is_centered_but_not_scaled() {
        let mut v = vec![4.5; 6];
        let stats = normalize(&mut v);
        assert_eq!(stats, NormStats { mean: 4.5, scale: None });
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn empty_input_is_untouched() {
        let mut v: Vec<f64> = vec![];
        assert_eq!(normalize(&mut v).scale, None);
    }

    #[test]
    fn nan_is_replaced_before_statistics() {
        let mut v = vec![f64::NAN, 2.0, f64::NAN, -2.0];
        assert_eq!(replace_nan(&mut v), 2);
        let stats = normalize(&mut v);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(v, vec![0.0, 1.0, 0.0, -1.0]);
    }
}
