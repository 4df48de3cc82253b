use {
    candle_core::{
        Error,
        Result,
        Tensor,
    },
    candle_nn::ops::softmax,
    rand::{
        distributions::WeightedIndex,
        prelude::Distribution,
        thread_rng,
        Rng,
    },
    rand_distr::Gumbel,
};

const LOG_SQRT_2PI: f64 = 0.9189385332046727;
const SQUASH_EPS: f64 = 1e-6;

/// Reparameterized sample from a diagonal Gaussian: `mu + eps * exp(log_std)`
/// with `eps ~ N(0, 1)`. `log_std` is shared across the batch.
pub fn sample_gaussian(
    mu: &Tensor,
    log_std: &Tensor,
) -> Result<Tensor> {
    let eps = mu.randn_like(0.0, 1.0)?;
    mu.add(&eps.broadcast_mul(&log_std.exp()?)?)
}

/// Row-wise log-density of `x` under a diagonal Gaussian, summed over the
/// action dimensions and shaped `(batch, 1)`.
pub fn gaussian_log_prob(
    x: &Tensor,
    mu: &Tensor,
    log_std: &Tensor,
) -> Result<Tensor> {
    let z = x.sub(mu)?.broadcast_div(&log_std.exp()?)?;
    let per_dim = (z.sqr()? * -0.5)?
        .broadcast_sub(log_std)?
        .affine(1.0, -LOG_SQRT_2PI)?;
    per_dim.sum_keepdim(1)
}

/// Log-density of an already tanh-squashed action under the squashed
/// Gaussian policy: the pre-squash sample is recovered by atanh and the
/// density corrected by the tanh change of variables.
pub fn squashed_gaussian_log_prob(
    action: &Tensor,
    mu: &Tensor,
    log_std: &Tensor,
) -> Result<Tensor> {
    let clipped = action.clamp(-1.0 + SQUASH_EPS, 1.0 - SQUASH_EPS)?;
    let pre_squash = atanh(&clipped)?;
    let log_prob = gaussian_log_prob(&pre_squash, mu, log_std)?;
    let correction = clipped
        .sqr()?
        .affine(-1.0, 1.0 + SQUASH_EPS)?
        .log()?
        .sum_keepdim(1)?;
    log_prob.sub(&correction)
}

/// Entropy of a diagonal Gaussian with the given shared `log_std`, as a
/// scalar tensor.
pub fn gaussian_entropy(log_std: &Tensor) -> Result<Tensor> {
    log_std.affine(1.0, 0.5 + LOG_SQRT_2PI)?.sum_all()
}

/// Sample one categorical action per row of `logits`, returned as flat
/// indices of shape `(batch,)`.
pub fn categorical_sample(logits: &Tensor) -> Result<Tensor> {
    let probs = softmax(logits, 1)?.to_vec2::<f64>()?;
    let mut rng = thread_rng();
    let samples = probs
        .iter()
        .map(|row| {
            WeightedIndex::new(row)
                .map(|dist| dist.sample(&mut rng) as u32)
                .map_err(Error::wrap)
        })
        .collect::<Result<Vec<_>>>()?;
    Tensor::from_vec(samples, probs.len(), logits.device())
}

/// Mean entropy of the categorical distributions described by row-wise
/// log-probabilities, as a scalar tensor.
pub fn categorical_entropy(logp_all: &Tensor) -> Result<Tensor> {
    logp_all
        .exp()?
        .mul(logp_all)?
        .sum_keepdim(1)?
        .mean_all()?
        .neg()
}

/// One-hot encode flat indices of shape `(batch,)` over `count` classes.
pub fn one_hot_rows(
    indices: &Tensor,
    count: usize,
) -> Result<Tensor> {
    let device = indices.device().clone();
    let indices = indices.to_dtype(candle_core::DType::F64)?.to_vec1::<f64>()?;
    let n = indices.len();
    let mut encoded = vec![0.0f64; n * count];
    for (i, &v) in indices.iter().enumerate() {
        encoded[i * count + v as usize] = 1.0;
    }
    Tensor::from_vec(encoded, (n, count), &device)
}

/// The Gumbel-softmax relaxation: `softmax((logp + g) / tau)` with
/// `g ~ Gumbel(0, 1)`. Gradients flow through the soft sample.
pub fn gumbel_softmax(
    logp_all: &Tensor,
    tau: f64,
) -> Result<Tensor> {
    let (n, k) = logp_all.dims2()?;
    let gumbel = Gumbel::new(0.0, 1.0).map_err(Error::wrap)?;
    let noise = thread_rng()
        .sample_iter::<f64, _>(gumbel)
        .take(n * k)
        .collect::<Vec<_>>();
    let noise = Tensor::from_vec(noise, (n, k), logp_all.device())?;
    softmax(&((logp_all + noise)? / tau)?, 1)
}

/// The straight-through estimator over a soft categorical sample: the
/// forward value is the hard one-hot arg-max, the gradient is that of the
/// soft relaxation.
pub fn straight_through(soft: &Tensor) -> Result<Tensor> {
    let (_, k) = soft.dims2()?;
    let hard = one_hot_rows(&soft.argmax(1)?, k)?;
    hard.sub(soft)?.detach().add(soft)
}

fn atanh(x: &Tensor) -> Result<Tensor> {
    // atanh(x) = ln((1 + x) / (1 - x)) / 2
    let num = x.affine(1.0, 1.0)?;
    let den = x.affine(-1.0, 1.0)?;
    num.div(&den)?.log()? * 0.5
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        candle_core::Device,
    };

    #[test]
    fn gaussian_log_prob_matches_the_standard_normal_at_zero() {
        let device = Device::Cpu;
        let x = Tensor::zeros((1, 1), candle_core::DType::F64, &device).unwrap();
        let mu = x.clone();
        let log_std = Tensor::zeros(1, candle_core::DType::F64, &device).unwrap();

        let lp = gaussian_log_prob(&x, &mu, &log_std).unwrap();
        let lp = lp.flatten_all().unwrap().to_vec1::<f64>().unwrap()[0];
        assert!((lp - (-LOG_SQRT_2PI)).abs() < 1e-12);
    }

    #[test]
    fn categorical_sampling_respects_degenerate_distributions() {
        let device = Device::Cpu;
        // overwhelming logit on class 2
        let logits =
            Tensor::from_vec(vec![0.0f64, 0.0, 50.0, 0.0], (1, 4), &device).unwrap();
        for _ in 0..10 {
            let sample = categorical_sample(&logits).unwrap().to_vec1::<u32>().unwrap();
            assert_eq!(sample, vec![2]);
        }
    }

    #[test]
    fn straight_through_forwards_a_hard_one_hot() {
        let device = Device::Cpu;
        let soft =
            Tensor::from_vec(vec![0.1f64, 0.7, 0.2, 0.5, 0.2, 0.3], (2, 3), &device).unwrap();
        let hard = straight_through(&soft).unwrap().to_vec2::<f64>().unwrap();
        assert_eq!(hard[0], vec![0.0, 1.0, 0.0]);
        assert_eq!(hard[1], vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn gumbel_softmax_rows_are_distributions() {
        let device = Device::Cpu;
        let logp = candle_nn::ops::log_softmax(
            &Tensor::from_vec(vec![0.0f64, 1.0, 2.0, -1.0, 0.5, 0.0], (2, 3), &device).unwrap(),
            1,
        )
        .unwrap();
        let soft = gumbel_softmax(&logp, 0.5).unwrap();
        for row in soft.to_vec2::<f64>().unwrap() {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|&p| p >= 0.0));
        }
    }
}
