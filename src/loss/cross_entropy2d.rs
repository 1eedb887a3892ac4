use crate::data::sample::{LabelMap, IGNORE_INDEX};
use crate::error::{Result, SegError};
use crate::math::FeatureMap;

/// Unnormalized pixel-wise cross-entropy of one sample.
///
/// `loss` and `grad` are sums over the pixels whose label is not
/// `IGNORE_INDEX`; `valid` counts those pixels. Summing these across a
/// batch and dividing by the pooled `valid` gives the batch mean over
/// every labeled pixel.
#[derive(Debug, Clone)]
pub struct PixelLoss {
    pub loss: f64,
    pub grad: FeatureMap,
    pub valid: usize,
}

/// Pixel-wise categorical cross-entropy over raw logits.
///
/// For every pixel, softmax is taken across the channel axis and the
/// negative log-probability of the target class is accumulated. The result
/// is averaged over the pixels whose label is not `IGNORE_INDEX`.
///
/// Returns the scalar loss together with ∂L/∂logits, which for the fused
/// softmax + cross-entropy reduces to `(softmax - onehot) / valid_pixels`.
pub fn cross_entropy2d(logits: &FeatureMap, target: &LabelMap) -> Result<(f64, FeatureMap)> {
    let PixelLoss { loss, mut grad, valid } = cross_entropy2d_sum(logits, target)?;
    if valid == 0 {
        return Ok((0.0, grad));
    }
    let inv = 1.0 / valid as f64;
    grad.data.iter_mut().for_each(|g| *g *= inv);
    Ok((loss * inv, grad))
}

/// Same as [`cross_entropy2d`] without the final division.
pub fn cross_entropy2d_sum(logits: &FeatureMap, target: &LabelMap) -> Result<PixelLoss> {
    if logits.height != target.height || logits.width != target.width {
        return Err(SegError::ShapeMismatch {
            expected: format!("labels {}x{}", logits.height, logits.width),
            got: format!("labels {}x{}", target.height, target.width),
        });
    }

    let n_classes = logits.channels;
    let n = logits.plane_len();
    let mut grad = FeatureMap::zeros(n_classes, logits.height, logits.width);
    let mut total = 0.0;
    let mut valid = 0usize;
    let mut probs = vec![0.0; n_classes];

    for p in 0..n {
        let label = target.data[p];
        if label == IGNORE_INDEX {
            continue;
        }
        let label = label as usize;
        if label >= n_classes {
            return Err(SegError::LabelOutOfRange { label: target.data[p], n_classes });
        }

        // Log-sum-exp with max shift for numerical stability.
        let max = (0..n_classes)
            .map(|c| logits.data[c * n + p])
            .fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for (c, prob) in probs.iter_mut().enumerate() {
            *prob = (logits.data[c * n + p] - max).exp();
            sum += *prob;
        }
        total += sum.ln() + max - logits.data[label * n + p];

        for (c, prob) in probs.iter().enumerate() {
            let onehot = if c == label { 1.0 } else { 0.0 };
            grad.data[c * n + p] = prob / sum - onehot;
        }
        valid += 1;
    }

    Ok(PixelLoss { loss: total, grad, valid })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_logits_give_log_n_classes() {
        let logits = FeatureMap::zeros(4, 2, 2);
        let target = LabelMap::from_vec(2, 2, vec![0, 1, 2, 3]);
        let (loss, grad) = cross_entropy2d(&logits, &target).unwrap();
        assert!((loss - 4f64.ln()).abs() < 1e-12);
        // gradient for the target class at pixel 0: (0.25 - 1) / 4
        assert!((grad.data[0] - (-0.75 / 4.0)).abs() < 1e-12);
    }

    #[test]
    fn ignored_pixels_have_no_gradient() {
        let logits = FeatureMap::from_vec(2, 1, 2, vec![1.0, -2.0, 0.5, 3.0]);
        let target = LabelMap::from_vec(1, 2, vec![1, IGNORE_INDEX]);
        let (loss, grad) = cross_entropy2d(&logits, &target).unwrap();
        assert!(loss > 0.0);
        assert_eq!(grad.data[1], 0.0);
        assert_eq!(grad.data[3], 0.0);
    }

    #[test]
    fn all_ignored_is_zero() {
        let logits = FeatureMap::from_vec(2, 1, 1, vec![1.0, 2.0]);
        let target = LabelMap::from_vec(1, 1, vec![IGNORE_INDEX]);
        let (loss, grad) = cross_entropy2d(&logits, &target).unwrap();
        assert_eq!(loss, 0.0);
        assert!(grad.data.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn rejects_out_of_range_labels_and_shape_mismatch() {
        let logits = FeatureMap::zeros(3, 1, 1);
        assert!(matches!(
            cross_entropy2d(&logits, &LabelMap::from_vec(1, 1, vec![3])),
            Err(SegError::LabelOutOfRange { label: 3, n_classes: 3 })
        ));
        assert!(matches!(
            cross_entropy2d(&logits, &LabelMap::from_vec(1, 2, vec![0, 0])),
            Err(SegError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let logits = FeatureMap::from_vec(3, 1, 2, vec![0.3, -1.2, 2.0, 0.1, -0.4, 0.9]);
        let target = LabelMap::from_vec(1, 2, vec![2, 0]);
        let (_, grad) = cross_entropy2d(&logits, &target).unwrap();
        let h = 1e-6;
        for i in 0..logits.data.len() {
            let mut plus = logits.clone();
            plus.data[i] += h;
            let mut minus = logits.clone();
            minus.data[i] -= h;
            let numeric = (cross_entropy2d(&plus, &target).unwrap().0
                - cross_entropy2d(&minus, &target).unwrap().0) / (2.0 * h);
            assert!((numeric - grad.data[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn summed_form_pools_across_samples() {
        let a = FeatureMap::from_vec(2, 1, 2, vec![1.0, -1.0, 0.0, 2.0]);
        let b = FeatureMap::from_vec(2, 1, 2, vec![0.5, 0.2, -0.3, 1.5]);
        let ta = LabelMap::from_vec(1, 2, vec![0, 1]);
        let tb = LabelMap::from_vec(1, 2, vec![1, IGNORE_INDEX]);

        let sa = cross_entropy2d_sum(&a, &ta).unwrap();
        let sb = cross_entropy2d_sum(&b, &tb).unwrap();
        assert_eq!((sa.valid, sb.valid), (2, 1));

        // Pooled mean equals the mean over all three labeled pixels.
        let (la, _) = cross_entropy2d(&a, &ta).unwrap();
        let (lb, _) = cross_entropy2d(&b, &tb).unwrap();
        let pooled = (sa.loss + sb.loss) / 3.0;
        assert!((pooled - (2.0 * la + lb) / 3.0).abs() < 1e-12);
        assert!((pooled - (la + lb) / 2.0).abs() > 1e-6);
    }
}
