use {
    serde::{
        Deserialize,
        Serialize,
    },
    std::path::PathBuf,
};

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct A2C_Config {
    // The learning rates for the actor and critic networks.
    pub actor_learning_rate: f64,
    pub critic_learning_rate: f64,
    // The discount factor.
    pub gamma: f64,
    // The episode horizon of the learning-rate decay.
    pub max_episode: usize,
    // The number of rollout steps per gradient update.
    pub batch_size: usize,
    // Full passes over the rollout per learn call.
    pub epoch: usize,
    // The entropy regularization coefficient.
    pub beta: f64,
    // The number of neurons in the hidden layers of all networks.
    pub hidden_1_size: usize,
    pub hidden_2_size: usize,
    // Where checkpoints are written, if anywhere.
    pub base_dir: Option<PathBuf>,
}

impl Default for A2C_Config {
    fn default() -> Self {
        Self {
            actor_learning_rate: 5.0e-4,
            critic_learning_rate: 1.0e-3,
            gamma: 0.99,
            max_episode: 50_000,
            batch_size: 128,
            epoch: 5,
            beta: 1.0e-3,
            hidden_1_size: 32,
            hidden_2_size: 32,
            base_dir: None,
        }
    }
}
