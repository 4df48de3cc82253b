use {
    serde::{
        Deserialize,
        Serialize,
    },
    std::path::PathBuf,
};

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DPG_Config {
    // One shared learning rate; DPG does not decay it.
    pub learning_rate: f64,
    pub gamma: f64,
    pub batch_size: usize,
    pub buffer_size: usize,
    pub use_priority: bool,
    pub priority_alpha: f64,
    pub priority_beta: f64,
    pub max_episode: usize,
    // Ornstein-Uhlenbeck process parameters for continuous exploration.
    pub ou_theta: f64,
    pub ou_sigma: f64,
    pub ou_dt: f64,
    pub hidden_1_size: usize,
    pub hidden_2_size: usize,
    pub base_dir: Option<PathBuf>,
}

impl Default for DPG_Config {
    fn default() -> Self {
        Self {
            learning_rate: 5.0e-4,
            gamma: 0.99,
            batch_size: 128,
            buffer_size: 10_000,
            use_priority: false,
            priority_alpha: 0.6,
            priority_beta: 0.4,
            max_episode: 50_000,
            ou_theta: 0.15,
            ou_sigma: 0.2,
            ou_dt: 1e-2,
            hidden_1_size: 32,
            hidden_2_size: 32,
            base_dir: None,
        }
    }
}
