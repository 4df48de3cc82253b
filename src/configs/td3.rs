use {
    serde::{
        Deserialize,
        Serialize,
    },
    std::path::PathBuf,
};

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TD3_Config {
    pub actor_learning_rate: f64,
    pub critic_learning_rate: f64,
    pub gamma: f64,
    pub max_episode: usize,
    pub batch_size: usize,
    pub buffer_size: usize,
    pub use_priority: bool,
    pub priority_alpha: f64,
    pub priority_beta: f64,
    // The weight kept by the target networks on each Polyak update.
    pub ployak: f64,
    // Gumbel-softmax temperature of the discrete-action relaxation.
    pub discrete_tau: f64,
    pub ou_theta: f64,
    pub ou_sigma: f64,
    pub ou_dt: f64,
    pub hidden_1_size: usize,
    pub hidden_2_size: usize,
    pub base_dir: Option<PathBuf>,
}

impl Default for TD3_Config {
    fn default() -> Self {
        Self {
            actor_learning_rate: 5.0e-4,
            critic_learning_rate: 1.0e-3,
            gamma: 0.99,
            max_episode: 50_000,
            batch_size: 128,
            buffer_size: 10_000,
            use_priority: false,
            priority_alpha: 0.6,
            priority_beta: 0.4,
            ployak: 0.995,
            discrete_tau: 1.0,
            ou_theta: 0.15,
            ou_sigma: 0.2,
            ou_dt: 1e-2,
            hidden_1_size: 32,
            hidden_2_size: 32,
            base_dir: None,
        }
    }
}
