use {
    super::{
        schedule::BetaAnneal,
        sum_tree::SumTree,
    },
    crate::envs::ObsBatch,
    candle_core::{
        Result,
        Tensor,
    },
    rand::{
        distributions::Uniform,
        thread_rng,
        Rng,
    },
    unzip_n::unzip_n,
};

unzip_n!(6);

/// One environment transition, stored row-wise (every tensor keeps a batch
/// dimension of 1).
///
/// The action is stored in the encoding the learners consume: a one-hot
/// vector for discrete action spaces, the raw normalized vector for
/// continuous ones. `log_prob` carries the behavior policy's log-probability
/// for algorithms that apply an importance-sampling correction.
#[derive(Clone)]
pub struct Transition {
    pub obs: ObsBatch,
    pub action: Tensor,
    pub log_prob: Option<Tensor>,
    pub reward: Tensor,
    pub next_obs: ObsBatch,
    pub done: Tensor,
}

/// A sampled minibatch, fields concatenated along the batch dimension.
pub struct ReplayBatch {
    pub obs: ObsBatch,
    pub action: Tensor,
    pub log_prob: Option<Tensor>,
    pub reward: Tensor,
    pub next_obs: ObsBatch,
    pub done: Tensor,
    /// Buffer slots the batch was drawn from, for priority updates.
    pub indices: Vec<usize>,
    /// Importance-sampling weights, present only under prioritized
    /// sampling.
    pub is_weights: Option<Tensor>,
}

impl ReplayBatch {
    /// The importance-sampling correction, defaulting to 1 for uniform
    /// sampling.
    pub fn importance_weights(&self) -> Result<Tensor> {
        match &self.is_weights {
            Some(ws) => Ok(ws.clone()),
            None => self.reward.ones_like(),
        }
    }
}

/// A fixed-capacity experience store for off-policy algorithms.
///
/// Implemented as a ring: once full, each insertion overwrites the oldest
/// transition. Sampling is uniform unless the buffer was constructed with
/// prioritization, in which case transitions are drawn proportionally to
/// their recorded |TD-error| and the batch carries importance-sampling
/// weights with an episode-annealed exponent.
pub struct ReplayBuffer {
    buffer: Vec<Transition>,
    capacity: usize,
    cursor: usize,
    sum_tree: Option<SumTree>,
    beta: BetaAnneal,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
            sum_tree: None,
            beta: BetaAnneal::default(),
        }
    }

    /// A prioritized buffer: `alpha` shapes the priority distribution,
    /// `beta` anneals linearly from its initial value to 1 over
    /// `max_episode` episodes.
    pub fn prioritized(
        capacity: usize,
        alpha: f64,
        beta: BetaAnneal,
    ) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
            sum_tree: Some(SumTree::new(capacity, alpha)),
            beta,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether enough transitions exist to draw a batch. Learners must
    /// check this before sampling; a short buffer skips the training step.
    pub fn is_lg_batch_size(
        &self,
        batch_size: usize,
    ) -> bool {
        self.len() >= batch_size
    }

    /// Insert a transition, evicting the oldest one once at capacity.
    pub fn add(
        &mut self,
        transition: Transition,
    ) {
        let slot = self.cursor;
        if self.buffer.len() < self.capacity {
            self.buffer.push(transition);
        } else {
            self.buffer[slot] = transition;
        }
        if let Some(tree) = &mut self.sum_tree {
            // fresh transitions enter at the running maximum priority
            let p = tree.max_priority();
            tree.add(slot, p);
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// Draw a batch. `episode` drives the importance-sampling exponent
    /// annealing under prioritized sampling and is ignored otherwise.
    pub fn sample(
        &self,
        batch_size: usize,
        episode: usize,
    ) -> Result<ReplayBatch> {
        if !self.is_lg_batch_size(batch_size) {
            candle_core::bail!(
                "replay buffer holds {} transitions, cannot sample {batch_size}",
                self.len()
            )
        }

        let (indices, is_weights) = match &self.sum_tree {
            Some(tree) => {
                let (indices, ws) = tree.sample(batch_size, self.beta.beta(episode));
                let device = self.buffer[0].reward.device().clone();
                let ws = Tensor::from_vec(ws, (batch_size, 1), &device)?;
                (indices, Some(ws))
            }
            None => {
                let indices = thread_rng()
                    .sample_iter(Uniform::from(0..self.len()))
                    .take(batch_size)
                    .collect::<Vec<_>>();
                (indices, None)
            }
        };

        let (obs, actions, log_probs, rewards, next_obs, dones) = indices
            .iter()
            .map(|&i| {
                let t = &self.buffer[i];
                (
                    t.obs.clone(),
                    t.action.clone(),
                    t.log_prob.clone(),
                    t.reward.clone(),
                    t.next_obs.clone(),
                    t.done.clone(),
                )
            })
            .unzip_n_vec();

        let log_prob = if log_probs.iter().all(|l| l.is_some()) {
            let log_probs = log_probs.into_iter().flatten().collect::<Vec<_>>();
            Some(Tensor::cat(&log_probs, 0)?)
        } else {
            None
        };

        Ok(ReplayBatch {
            obs: ObsBatch::cat(&obs)?,
            action: Tensor::cat(&actions, 0)?,
            log_prob,
            reward: Tensor::cat(&rewards, 0)?,
            next_obs: ObsBatch::cat(&next_obs)?,
            done: Tensor::cat(&dones, 0)?,
            indices,
            is_weights,
        })
    }

    /// Rewrite the priorities of the sampled slots from the absolute
    /// TD-errors of the latest update. A no-op for uniform buffers.
    pub fn update_priorities(
        &mut self,
        indices: &[usize],
        td_error: &Tensor,
    ) -> Result<()> {
        let Some(tree) = &mut self.sum_tree else {
            return Ok(());
        };
        let td = td_error.abs()?.flatten_all()?.to_vec1::<f64>()?;
        for (&ix, &p) in indices.iter().zip(td.iter()) {
            tree.update(ix, p);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        candle_core::Device,
    };

    fn transition(value: f64) -> Transition {
        let device = Device::Cpu;
        let row = |v: f64| Tensor::from_vec(vec![v], (1, 1), &device).unwrap();
        Transition {
            obs: ObsBatch::vector(row(value)),
            action: row(0.0),
            log_prob: None,
            reward: row(value),
            next_obs: ObsBatch::vector(row(value + 1.0)),
            done: row(0.0),
        }
    }

    #[test]
    fn capacity_is_never_exceeded_and_eviction_is_fifo() {
        let mut buffer = ReplayBuffer::new(4);
        for i in 0..10 {
            buffer.add(transition(i as f64));
            assert!(buffer.len() <= 4);
        }

        let rewards: Vec<f64> = buffer
            .buffer
            .iter()
            .map(|t| t.reward.flatten_all().unwrap().to_vec1::<f64>().unwrap()[0])
            .collect();
        // transitions 0..=5 were evicted oldest-first
        let mut sorted = rewards.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(sorted, vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn occupancy_gates_sampling() {
        let mut buffer = ReplayBuffer::new(8);
        buffer.add(transition(0.0));
        assert!(!buffer.is_lg_batch_size(2));
        assert!(buffer.sample(2, 0).is_err());

        buffer.add(transition(1.0));
        assert!(buffer.is_lg_batch_size(2));
        let batch = buffer.sample(2, 0).unwrap();
        assert_eq!(batch.reward.dims(), &[2, 1]);
        assert!(batch.is_weights.is_none());

        let ws = batch.importance_weights().unwrap().to_vec2::<f64>().unwrap();
        assert_eq!(ws, vec![vec![1.0], vec![1.0]]);
    }

    #[test]
    fn prioritized_sampling_reports_weights_and_takes_updates() {
        let mut buffer = ReplayBuffer::prioritized(8, 0.6, BetaAnneal::new(0.4, 100));
        for i in 0..4 {
            buffer.add(transition(i as f64));
        }

        let batch = buffer.sample(3, 10).unwrap();
        let ws = batch.is_weights.as_ref().unwrap();
        assert_eq!(ws.dims(), &[3, 1]);

        let td = Tensor::from_vec(vec![0.5f64, 1.5, 0.1], (3, 1), &Device::Cpu).unwrap();
        buffer.update_priorities(&batch.indices, &td).unwrap();
    }
}
