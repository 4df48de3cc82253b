use {
    crate::envs::ObsBatch,
    candle_core::{
        Result,
        Tensor,
    },
};

/// One stored environment step of an on-policy rollout, still batched over
/// the vectorized instances: `reward` and `done` are shaped `(n, 1)`.
pub struct RolloutStep {
    pub obs: ObsBatch,
    pub action: Tensor,
    pub reward: Tensor,
    pub next_obs: ObsBatch,
    pub done: Tensor,
    pub discounted_reward: Option<Tensor>,
}

/// A contiguous slice of the rollout, flattened to `(steps * n, ...)` for
/// gradient updates.
pub struct RolloutBatch {
    pub obs: ObsBatch,
    pub action: Tensor,
    pub discounted_reward: Tensor,
}

/// The on-policy transition store: an append-only sequence covering the
/// current episode only. `learn` consumes it destructively — returns are
/// computed once per episode and the buffer is cleared afterwards.
#[derive(Default)]
pub struct RolloutBuffer {
    steps: Vec<RolloutStep>,
}

impl RolloutBuffer {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn add(
        &mut self,
        step: RolloutStep,
    ) {
        self.steps.push(step);
    }

    /// The observation that follows the final stored step, the bootstrap
    /// point for the return computation.
    pub fn last_next_obs(&self) -> Option<&ObsBatch> {
        self.steps.last().map(|s| &s.next_obs)
    }

    /// Fill in `discounted_reward` for every step by the backward recursion
    /// `G_t = r_t + gamma * G_{t+1} * (1 - done_t)`, seeded with
    /// `bootstrap_value` (the critic's estimate of the final next-state,
    /// shaped `(n, 1)`).
    pub fn compute_returns(
        &mut self,
        bootstrap_value: &Tensor,
        gamma: f64,
    ) -> Result<()> {
        let mut running = bootstrap_value.clone();
        for step in self.steps.iter_mut().rev() {
            let continuation = step.done.affine(-1.0, 1.0)?;
            running = (&step.reward + (gamma * running)?.mul(&continuation)?)?;
            step.discounted_reward = Some(running.clone());
        }
        Ok(())
    }

    /// A contiguous batch of `batch_size` steps starting at `index`,
    /// flattened over the vectorized instances. Requires
    /// [`RolloutBuffer::compute_returns`] to have run.
    pub fn get_batch(
        &self,
        index: usize,
        batch_size: usize,
    ) -> Result<RolloutBatch> {
        let end = (index + batch_size).min(self.len());
        let slice = &self.steps[index..end];

        let obs = slice.iter().map(|s| s.obs.clone()).collect::<Vec<_>>();
        let actions = slice.iter().map(|s| s.action.clone()).collect::<Vec<_>>();
        let returns = slice
            .iter()
            .map(|s| {
                s.discounted_reward.clone().ok_or_else(|| {
                    candle_core::Error::Msg(
                        "rollout batch requested before returns were computed".into(),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RolloutBatch {
            obs: ObsBatch::cat(&obs)?,
            action: Tensor::cat(&actions, 0)?,
            discounted_reward: Tensor::cat(&returns, 0)?,
        })
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        candle_core::Device,
    };

    fn push_step(
        buffer: &mut RolloutBuffer,
        reward: f64,
        done: f64,
    ) {
        let device = Device::Cpu;
        let row = |v: f64| Tensor::from_vec(vec![v], (1, 1), &device).unwrap();
        buffer.add(RolloutStep {
            obs: ObsBatch::vector(row(0.0)),
            action: row(0.0),
            reward: row(reward),
            next_obs: ObsBatch::vector(row(0.0)),
            done: row(done),
            discounted_reward: None,
        });
    }

    fn returns_of(buffer: &RolloutBuffer) -> Vec<f64> {
        buffer
            .steps
            .iter()
            .map(|s| {
                s.discounted_reward
                    .as_ref()
                    .unwrap()
                    .flatten_all()
                    .unwrap()
                    .to_vec1::<f64>()
                    .unwrap()[0]
            })
            .collect()
    }

    #[test]
    fn backward_recursion_matches_hand_computation() {
        let mut buffer = RolloutBuffer::new();
        push_step(&mut buffer, 1.0, 0.0);
        push_step(&mut buffer, 2.0, 0.0);
        push_step(&mut buffer, 3.0, 1.0);

        let bootstrap = Tensor::from_vec(vec![10.0f64], (1, 1), &Device::Cpu).unwrap();
        buffer.compute_returns(&bootstrap, 0.9).unwrap();

        // G2 = 3 (done cuts the bootstrap), G1 = 2 + 0.9*3, G0 = 1 + 0.9*G1
        let gs = returns_of(&buffer);
        assert!((gs[2] - 3.0).abs() < 1e-12);
        assert!((gs[1] - 4.7).abs() < 1e-12);
        assert!((gs[0] - 5.23).abs() < 1e-12);
    }

    #[test]
    fn bootstrap_flows_through_unfinished_tails() {
        let mut buffer = RolloutBuffer::new();
        push_step(&mut buffer, 0.0, 0.0);

        let bootstrap = Tensor::from_vec(vec![10.0f64], (1, 1), &Device::Cpu).unwrap();
        buffer.compute_returns(&bootstrap, 0.5).unwrap();
        assert_eq!(returns_of(&buffer), vec![5.0]);
    }

    #[test]
    fn batches_flatten_steps_and_clear_empties() {
        let mut buffer = RolloutBuffer::new();
        for i in 0..5 {
            push_step(&mut buffer, i as f64, 0.0);
        }
        let bootstrap = Tensor::zeros((1, 1), candle_core::DType::F64, &Device::Cpu).unwrap();
        buffer.compute_returns(&bootstrap, 0.99).unwrap();

        let batch = buffer.get_batch(3, 4).unwrap();
        assert_eq!(batch.discounted_reward.dims(), &[2, 1]);

        buffer.clear();
        assert!(buffer.is_empty());
    }
}
