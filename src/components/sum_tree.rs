use segment_tree::{
    ops::MaxIgnoreNaN,
    SegmentPoint,
};

/// A sum tree over transition priorities for proportional prioritized
/// sampling.
///
/// Leaves hold `(p + eps)^alpha`; internal nodes hold subtree sums, so
/// drawing a uniform value in `[0, total)` and descending the tree selects
/// leaf `i` with probability proportional to its priority mass.
pub struct SumTree {
    eps: f64,
    alpha: f64,
    capacity: usize,
    n_samples: usize,
    tree: Vec<f64>,
    max_tree: SegmentPoint<f64, MaxIgnoreNaN>,
}

impl SumTree {
    pub fn new(
        capacity: usize,
        alpha: f64,
    ) -> Self {
        Self {
            eps: 1e-8,
            alpha,
            capacity,
            n_samples: 0,
            tree: vec![0f64; 2 * capacity - 1],
            max_tree: SegmentPoint::build(vec![0f64; capacity], MaxIgnoreNaN),
        }
    }

    /// The total priority mass.
    pub fn total(&self) -> f64 {
        self.tree[0]
    }

    /// The largest raw priority currently stored, or 1 while the tree is
    /// empty. New transitions enter at this value so they are seen at least
    /// once.
    pub fn max_priority(&self) -> f64 {
        let max = self.max_tree.query(0, self.capacity);
        if max > 0.0 {
            max
        } else {
            1.0
        }
    }

    /// Record a new sample at slot `ix` with raw priority `p`.
    pub fn add(
        &mut self,
        ix: usize,
        p: f64,
    ) {
        self.update(ix, p);
        if self.n_samples < self.capacity {
            self.n_samples += 1;
        }
    }

    /// Overwrite the priority at slot `ix` with `(p + eps)^alpha`.
    pub fn update(
        &mut self,
        ix: usize,
        p: f64,
    ) {
        debug_assert!(ix < self.capacity);
        let mass = (p + self.eps).powf(self.alpha);
        self.max_tree.modify(ix, p);
        let ix = ix + self.capacity - 1;
        let change = mass - self.tree[ix];
        self.tree[ix] = mass;
        self.propagate(ix, change);
    }

    /// The leaf index whose cumulative mass interval contains `s`.
    pub fn get(
        &self,
        s: f64,
    ) -> usize {
        let ix = self.retrieve(0, s);
        debug_assert!(ix >= self.capacity - 1);
        ix + 1 - self.capacity
    }

    /// Sample a batch of slot indices proportionally to priority mass,
    /// together with importance-sampling weights
    /// `w_i = (N · P(i))^-beta`, normalized by the batch maximum.
    pub fn sample(
        &self,
        batch_size: usize,
        beta: f64,
    ) -> (Vec<usize>, Vec<f64>) {
        let p_sum = self.total();
        let indices = (0..batch_size)
            .map(|_| self.get(p_sum * fastrand::f64()))
            .collect::<Vec<_>>();

        let n = self.n_samples as f64 / p_sum;
        let ws = indices
            .iter()
            .map(|&ix| self.tree[ix + self.capacity - 1])
            .map(|p| (n * p).powf(-beta))
            .collect::<Vec<_>>();

        let w_max = ws.iter().fold(f64::MIN, |m, &v| v.max(m));
        let ws = ws.iter().map(|w| w / w_max).collect();

        (indices, ws)
    }

    fn propagate(
        &mut self,
        ix: usize,
        change: f64,
    ) {
        let parent = (ix - 1) / 2;
        self.tree[parent] += change;
        if parent != 0 {
            self.propagate(parent, change);
        }
    }

    fn retrieve(
        &self,
        ix: usize,
        s: f64,
    ) -> usize {
        let left = 2 * ix + 1;
        let right = left + 1;

        if left >= self.tree.len() {
            return ix;
        }

        if s <= self.tree[left] || self.tree[right] == 0f64 {
            self.retrieve(left, s)
        } else {
            self.retrieve(right, s - self.tree[left])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SumTree;

    #[test]
    fn cumulative_lookup_selects_the_owning_leaf() {
        let data = [0.5, 0.2, 0.8, 0.3];
        let mut tree = SumTree::new(4, 1.0);
        for (ix, &p) in data.iter().enumerate() {
            tree.add(ix, p);
        }

        assert_eq!(tree.get(0.0), 0);
        assert_eq!(tree.get(0.4), 0);
        assert_eq!(tree.get(0.6), 1);
        assert_eq!(tree.get(0.8), 2);
        assert_eq!(tree.get(1.6), 3);

        let total = tree.total();
        assert!((total - 1.8).abs() < 1e-6);
    }

    #[test]
    fn sampled_indices_stay_in_range_and_weights_normalize() {
        let mut tree = SumTree::new(8, 0.6);
        for ix in 0..6 {
            tree.add(ix, 1.0 + ix as f64);
        }

        let (indices, ws) = tree.sample(64, 0.4);
        assert!(indices.iter().all(|&ix| ix < 6));
        assert!(ws.iter().all(|&w| w > 0.0 && w <= 1.0 + 1e-12));
        assert!(ws.iter().any(|&w| (w - 1.0).abs() < 1e-12));
    }
}
