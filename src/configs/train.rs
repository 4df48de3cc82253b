use serde::{
    Deserialize,
    Serialize,
};

/// Settings for the episode-level training loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainConfig {
    // The episode index to resume counting from.
    pub begin_episode: usize,
    // The total number of training episodes.
    pub max_episode: usize,
    // The step cap per episode.
    pub max_step: usize,
    // How often (in episodes) to save checkpoints.
    pub save_frequency: usize,
    // Whether crossing the reward threshold triggers greedy evaluation.
    pub eval_while_train: bool,
    // The number of episodes per evaluation round.
    pub max_eval_episode: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            begin_episode: 0,
            max_episode: 5_000,
            max_step: 200,
            save_frequency: 100,
            eval_while_train: true,
            max_eval_episode: 100,
        }
    }
}

impl TrainConfig {
    pub fn new(
        begin_episode: usize,
        max_episode: usize,
        max_step: usize,
        save_frequency: usize,
        eval_while_train: bool,
        max_eval_episode: usize,
    ) -> Self {
        Self {
            begin_episode,
            max_episode,
            max_step,
            save_frequency,
            eval_while_train,
            max_eval_episode,
        }
    }
}
