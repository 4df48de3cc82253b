use {
    anyhow::Result,
    candle_core::{
        DType,
        Tensor,
    },
    serde::{
        Deserialize,
        Serialize,
    },
};

/// An observation- or action-space descriptor.
///
/// Discrete spaces are described by their branch cardinalities: a space with
/// `branches = [3, 4]` holds two categorical sub-dimensions and 12 distinct
/// joint values. Continuous spaces carry per-dimension bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Space {
    Discrete {
        branches: Vec<usize>,
    },
    Continuous {
        shape: Vec<usize>,
        low: Vec<f64>,
        high: Vec<f64>,
    },
}

impl Space {
    pub fn is_discrete(&self) -> bool {
        matches!(self, Space::Discrete { .. })
    }

    /// Visual spaces are continuous with a (height, width, channels) shape.
    pub fn is_visual(&self) -> bool {
        matches!(self, Space::Continuous { shape, .. } if shape.len() == 3)
    }

    /// The number of distinct joint values (discrete) or the flattened
    /// dimensionality (continuous).
    pub fn count(&self) -> usize {
        match self {
            Space::Discrete { branches } => branches.iter().product(),
            Space::Continuous { shape, .. } => shape.iter().product(),
        }
    }

    /// The width of the encoded observation / action vector fed to the
    /// function approximators.
    pub fn flat_dim(&self) -> usize {
        self.count()
    }

    /// The affine factors mapping normalized actions in [-1, 1] onto this
    /// space: `(bias, scale)` with `bias = (high + low) / 2` and
    /// `scale = (high - low) / 2`. Discrete spaces map identically.
    pub fn normalize_factors(&self) -> (Vec<f64>, Vec<f64>) {
        match self {
            Space::Discrete { branches } => {
                (vec![0.0; branches.len()], vec![1.0; branches.len()])
            }
            Space::Continuous { low, high, .. } => (
                low.iter().zip(high).map(|(l, h)| (h + l) / 2.0).collect(),
                low.iter().zip(high).map(|(l, h)| (h - l) / 2.0).collect(),
            ),
        }
    }
}

/// One batched observation: a vector part, a visual part, or both.
///
/// Vectorized environments report observations for all `n` instances at
/// once, so both parts carry a leading batch dimension.
#[derive(Clone)]
pub struct ObsBatch {
    pub vector: Option<Tensor>,
    pub visual: Option<Tensor>,
}

impl ObsBatch {
    pub fn vector(t: Tensor) -> Self {
        Self {
            vector: Some(t),
            visual: None,
        }
    }

    pub fn visual(t: Tensor) -> Self {
        Self {
            vector: None,
            visual: Some(t),
        }
    }

    pub fn batch_size(&self) -> Result<usize> {
        match (&self.vector, &self.visual) {
            (Some(v), _) => Ok(v.dim(0)?),
            (None, Some(v)) => Ok(v.dim(0)?),
            (None, None) => anyhow::bail!("observation batch holds neither a vector nor a visual part"),
        }
    }

    /// The flat feature tensor fed to the function approximators: the vector
    /// part concatenated with the flattened visual part.
    pub fn features(&self) -> candle_core::Result<Tensor> {
        match (&self.vector, &self.visual) {
            (Some(vec), Some(vis)) => Tensor::cat(&[vec, &vis.flatten_from(1)?], 1),
            (Some(vec), None) => Ok(vec.clone()),
            (None, Some(vis)) => vis.flatten_from(1),
            (None, None) => candle_core::bail!(
                "observation batch holds neither a vector nor a visual part"
            ),
        }
    }

    /// A single-row view of instance `i`, keeping the batch dimension.
    pub fn row(&self, i: usize) -> candle_core::Result<Self> {
        Ok(Self {
            vector: match &self.vector {
                Some(t) => Some(t.narrow(0, i, 1)?),
                None => None,
            },
            visual: match &self.visual {
                Some(t) => Some(t.narrow(0, i, 1)?),
                None => None,
            },
        })
    }

    /// Rebuild the batch with the rows at `indices` taken from
    /// `replacement` (row `k` of `replacement` lands at `indices[k]`). Used
    /// for partial resets of finished environment instances.
    pub fn replace_rows(
        &self,
        indices: &[usize],
        replacement: &ObsBatch,
    ) -> candle_core::Result<Self> {
        let splice = |full: &Tensor, fresh: Option<&Tensor>| -> candle_core::Result<Tensor> {
            let fresh = match fresh {
                Some(t) => t,
                None => candle_core::bail!("partial reset observation is missing a part"),
            };
            let mut rows = Vec::with_capacity(full.dim(0)?);
            for i in 0..full.dim(0)? {
                match indices.iter().position(|&j| j == i) {
                    Some(k) => rows.push(fresh.narrow(0, k, 1)?),
                    None => rows.push(full.narrow(0, i, 1)?),
                }
            }
            Tensor::cat(&rows, 0)
        };

        Ok(Self {
            vector: match &self.vector {
                Some(t) => Some(splice(t, replacement.vector.as_ref())?),
                None => None,
            },
            visual: match &self.visual {
                Some(t) => Some(splice(t, replacement.visual.as_ref())?),
                None => None,
            },
        })
    }

    /// Concatenate batches along the batch dimension. All batches must hold
    /// the same parts.
    pub fn cat(batches: &[ObsBatch]) -> candle_core::Result<Self> {
        let vectors = batches.iter().filter_map(|b| b.vector.clone()).collect::<Vec<_>>();
        let visuals = batches.iter().filter_map(|b| b.visual.clone()).collect::<Vec<_>>();
        Ok(Self {
            vector: if vectors.len() == batches.len() {
                Some(Tensor::cat(&vectors, 0)?)
            } else {
                None
            },
            visual: if visuals.len() == batches.len() {
                Some(Tensor::cat(&visuals, 0)?)
            } else {
                None
            },
        })
    }
}

/// The result of one vectorized environment step, shaped `(n, ...)`.
#[derive(Debug)]
pub struct EnvStep {
    pub obs: Tensor,
    pub reward: Vec<f64>,
    pub done: Vec<bool>,
}

/// A vectorized (multi-instance) environment.
///
/// One `step` call advances all `n` independent instances at once. Finished
/// instances keep stepping until the driver resets them individually via
/// [`Environment::partial_reset`]; `dones_index` reports which instances
/// finished on the most recent step.
pub trait Environment {
    /// The number of independent instances advanced per step.
    fn n(&self) -> usize;

    fn reset(&mut self) -> Result<Tensor>;

    fn step(
        &mut self,
        action: &Tensor,
    ) -> Result<EnvStep>;

    /// Instances that reported done on the most recent step.
    fn dones_index(&self) -> Vec<usize>;

    /// Reset only the instances in `dones_index`, returning their fresh
    /// observations stacked in `dones_index` order.
    fn partial_reset(&mut self) -> Result<Tensor>;

    fn observation_space(&self) -> Space;
    fn action_space(&self) -> Space;

    /// The average return at which this environment counts as solved.
    fn reward_threshold(&self) -> Option<f64> {
        None
    }

    /// A uniformly random batch of actions in the environment's native
    /// format.
    fn sample_action(&mut self) -> Result<Tensor>;
}

/// One-hot encode a batch of categorical observations, flattening
/// multi-dimensional category indices into a single index by mixed-radix
/// multiplication. Continuous observations pass through unchanged.
///
/// An observation batch `[[1, 0], [2, 1]]` over branches `[3, 4]` flattens
/// to indices `[4, 9]` and scatters into vectors of width 12.
pub fn maybe_one_hot(
    obs: &Tensor,
    space: &Space,
) -> candle_core::Result<Tensor> {
    let branches = match space {
        Space::Discrete { branches } => branches,
        Space::Continuous { .. } => return Ok(obs.clone()),
    };
    let obs = match obs.rank() {
        1 => obs.unsqueeze(1)?,
        _ => obs.clone(),
    };
    let (n, d) = obs.dims2()?;
    if d != branches.len() {
        candle_core::bail!(
            "categorical observation has {d} dimensions, space has {}",
            branches.len()
        )
    }

    let radix = mixed_radix(branches);
    let width: usize = branches.iter().product();
    let rows = obs.to_dtype(DType::F64)?.to_vec2::<f64>()?;

    let mut encoded = vec![0.0f64; n * width];
    for (i, row) in rows.iter().enumerate() {
        let flat: usize = row
            .iter()
            .zip(&radix)
            .map(|(&v, &r)| v as usize * r)
            .sum();
        encoded[i * width + flat] = 1.0;
    }
    Tensor::from_vec(encoded, (n, width), obs.device())
}

/// Wrap a raw observation batch into the encoded form the agents consume.
pub fn encode_observation(
    obs: &Tensor,
    space: &Space,
) -> candle_core::Result<ObsBatch> {
    if space.is_visual() {
        Ok(ObsBatch::visual(obs.clone()))
    } else {
        Ok(ObsBatch::vector(maybe_one_hot(obs, space)?))
    }
}

/// Map normalized continuous actions in [-1, 1] onto the environment's
/// action bounds: `action * (high - low) / 2 + (high + low) / 2`. Discrete
/// actions pass through unchanged.
pub fn denormalize_action(
    action: &Tensor,
    space: &Space,
) -> candle_core::Result<Tensor> {
    if space.is_discrete() {
        return Ok(action.clone());
    }
    let (bias, scale) = space.normalize_factors();
    let dim = scale.len();
    let scale = Tensor::from_vec(scale, (1, dim), action.device())?;
    let bias = Tensor::from_vec(bias, (1, dim), action.device())?;
    action.broadcast_mul(&scale)?.broadcast_add(&bias)
}

/// Decode flat categorical indices into per-branch indices, the inverse of
/// the mixed-radix flattening.
pub fn decode_flat_index(
    flat: &Tensor,
    branches: &[usize],
) -> candle_core::Result<Tensor> {
    let n = flat.dim(0)?;
    let device = flat.device().clone();
    let radix = mixed_radix(branches);
    let flat = flat.to_dtype(DType::F64)?.to_vec1::<f64>()?;

    let mut decoded = Vec::with_capacity(n * branches.len());
    for &v in &flat {
        let v = v as usize;
        for (j, &b) in branches.iter().enumerate() {
            decoded.push(((v / radix[j]) % b) as u32);
        }
    }
    Tensor::from_vec(decoded, (n, branches.len()), &device)
}

/// One-hot encode per-branch categorical action indices over the joint
/// action count.
pub fn index_to_one_hot(
    indices: &Tensor,
    branches: &[usize],
) -> candle_core::Result<Tensor> {
    let indices = match indices.rank() {
        1 => indices.unsqueeze(1)?,
        _ => indices.clone(),
    };
    let (n, d) = indices.dims2()?;
    if d != branches.len() {
        candle_core::bail!("action has {d} branches, space has {}", branches.len())
    }
    let radix = mixed_radix(branches);
    let width: usize = branches.iter().product();
    let rows = indices.to_dtype(DType::F64)?.to_vec2::<f64>()?;

    let mut encoded = vec![0.0f64; n * width];
    for (i, row) in rows.iter().enumerate() {
        let flat: usize = row
            .iter()
            .zip(&radix)
            .map(|(&v, &r)| v as usize * r)
            .sum();
        encoded[i * width + flat] = 1.0;
    }
    Tensor::from_vec(encoded, (n, width), indices.device())
}

/// Suffix products: the place value of each branch when flattening.
fn mixed_radix(branches: &[usize]) -> Vec<usize> {
    let mut radix = vec![1usize; branches.len()];
    for j in (0..branches.len().saturating_sub(1)).rev() {
        radix[j] = radix[j + 1] * branches[j + 1];
    }
    radix
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        candle_core::Device,
    };

    #[test]
    fn one_hot_flattens_multi_dimensional_indices() {
        let space = Space::Discrete {
            branches: vec![3, 4],
        };
        let obs = Tensor::from_vec(vec![1u32, 0, 2, 1], (2, 2), &Device::Cpu).unwrap();
        let encoded = maybe_one_hot(&obs, &space).unwrap();
        assert_eq!(encoded.dims(), &[2, 12]);

        let rows = encoded.to_vec2::<f64>().unwrap();
        assert_eq!(rows[0].iter().position(|&v| v == 1.0), Some(4));
        assert_eq!(rows[1].iter().position(|&v| v == 1.0), Some(9));
    }

    #[test]
    fn one_hot_roundtrips_through_argmax() {
        let branches = vec![5usize];
        for index in 0..5u32 {
            let indices = Tensor::from_vec(vec![index], (1, 1), &Device::Cpu).unwrap();
            let one_hot = index_to_one_hot(&indices, &branches).unwrap();
            let recovered = one_hot.argmax(1).unwrap().to_vec1::<u32>().unwrap();
            assert_eq!(recovered, vec![index]);
        }
    }

    #[test]
    fn flat_index_decode_inverts_flattening() {
        let branches = vec![3usize, 4];
        let flat = Tensor::from_vec(vec![4u32, 9], 2, &Device::Cpu).unwrap();
        let decoded = decode_flat_index(&flat, &branches).unwrap();
        assert_eq!(
            decoded.to_vec2::<u32>().unwrap(),
            vec![vec![1, 0], vec![2, 1]],
        );
    }

    #[test]
    fn denormalization_maps_boundaries_onto_bounds() {
        let space = Space::Continuous {
            shape: vec![2],
            low: vec![-2.0, -3.0],
            high: vec![2.0, 6.0],
        };
        let action =
            Tensor::from_vec(vec![-1.0f64, -1.0, 1.0, 1.0, 0.0, 0.0], (3, 2), &Device::Cpu)
                .unwrap();
        let mapped = denormalize_action(&action, &space).unwrap();
        assert_eq!(
            mapped.to_vec2::<f64>().unwrap(),
            vec![vec![-2.0, -3.0], vec![2.0, 6.0], vec![0.0, 1.5]],
        );
    }
}
