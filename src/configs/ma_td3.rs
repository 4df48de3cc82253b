use {
    serde::{
        Deserialize,
        Serialize,
    },
    std::path::PathBuf,
};

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MATD3_Config {
    pub actor_learning_rate: f64,
    pub critic_learning_rate: f64,
    pub gamma: f64,
    pub max_episode: usize,
    // The number of cooperating agents the joint critics condition on.
    pub n_agents: usize,
    // This agent's slot within the joint action concatenation.
    pub agent_index: usize,
    // The weight kept by the target networks on each Polyak update.
    pub ployak: f64,
    pub ou_theta: f64,
    pub ou_sigma: f64,
    pub ou_dt: f64,
    pub hidden_1_size: usize,
    pub hidden_2_size: usize,
    pub base_dir: Option<PathBuf>,
}

impl Default for MATD3_Config {
    fn default() -> Self {
        Self {
            actor_learning_rate: 5.0e-4,
            critic_learning_rate: 1.0e-3,
            gamma: 0.99,
            max_episode: 50_000,
            n_agents: 1,
            agent_index: 0,
            ployak: 0.995,
            ou_theta: 0.15,
            ou_sigma: 0.2,
            ou_dt: 1e-2,
            hidden_1_size: 32,
            hidden_2_size: 32,
            base_dir: None,
        }
    }
}
