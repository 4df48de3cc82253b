/// A linear (power 1) polynomial decay from `initial` to `terminal` over
/// `max_episode` episodes, evaluated on demand so the optimizer always sees
/// the rate that belongs to the episode being learned from.
#[derive(Clone, Copy, Debug)]
pub struct PolynomialDecay {
    initial: f64,
    terminal: f64,
    max_episode: usize,
}

impl PolynomialDecay {
    pub fn new(
        initial: f64,
        max_episode: usize,
    ) -> Self {
        Self {
            initial,
            terminal: 1e-10,
            max_episode,
        }
    }

    pub fn rate(
        &self,
        episode: usize,
    ) -> f64 {
        let progress = episode.min(self.max_episode) as f64 / self.max_episode as f64;
        (self.initial - self.terminal) * (1.0 - progress) + self.terminal
    }
}

/// The importance-sampling exponent annealing for prioritized replay:
/// beta climbs linearly from its initial value to 1 over `max_episode`
/// episodes, fully correcting the sampling bias by the end of training.
#[derive(Clone, Copy, Debug)]
pub struct BetaAnneal {
    initial: f64,
    max_episode: usize,
}

impl BetaAnneal {
    pub fn new(
        initial: f64,
        max_episode: usize,
    ) -> Self {
        Self {
            initial,
            max_episode,
        }
    }

    pub fn beta(
        &self,
        episode: usize,
    ) -> f64 {
        let progress = episode.min(self.max_episode) as f64 / self.max_episode as f64;
        self.initial + (1.0 - self.initial) * progress
    }
}

impl Default for BetaAnneal {
    fn default() -> Self {
        Self::new(0.4, 50_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_hits_its_endpoints() {
        let schedule = PolynomialDecay::new(5e-4, 100);
        assert!((schedule.rate(0) - 5e-4).abs() < 1e-12);
        assert!((schedule.rate(50) - 2.5e-4).abs() < 1e-8);
        assert!((schedule.rate(100) - 1e-10).abs() < 1e-12);
        // clamped past the end
        assert!((schedule.rate(500) - 1e-10).abs() < 1e-12);
    }

    #[test]
    fn beta_anneals_to_one() {
        let anneal = BetaAnneal::new(0.4, 10);
        assert!((anneal.beta(0) - 0.4).abs() < 1e-12);
        assert!((anneal.beta(5) - 0.7).abs() < 1e-12);
        assert!((anneal.beta(10) - 1.0).abs() < 1e-12);
        assert!((anneal.beta(99) - 1.0).abs() < 1e-12);
    }
}
