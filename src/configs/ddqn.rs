use {
    serde::{
        Deserialize,
        Serialize,
    },
    std::path::PathBuf,
};

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DDQN_Config {
    pub learning_rate: f64,
    pub gamma: f64,
    pub max_episode: usize,
    pub batch_size: usize,
    pub buffer_size: usize,
    pub use_priority: bool,
    pub priority_alpha: f64,
    pub priority_beta: f64,
    // Random-action probability of the epsilon-greedy exploration policy.
    pub epsilon: f64,
    // Hard target sync cadence in global steps.
    pub assign_interval: u64,
    pub hidden_1_size: usize,
    pub hidden_2_size: usize,
    pub base_dir: Option<PathBuf>,
}

impl Default for DDQN_Config {
    fn default() -> Self {
        Self {
            learning_rate: 5.0e-4,
            gamma: 0.99,
            max_episode: 50_000,
            batch_size: 128,
            buffer_size: 10_000,
            use_priority: false,
            priority_alpha: 0.6,
            priority_beta: 0.4,
            epsilon: 0.2,
            assign_interval: 2,
            hidden_1_size: 32,
            hidden_2_size: 32,
            base_dir: None,
        }
    }
}
