mod distributions;
mod nets;
mod ou_noise;
mod recorder;
mod replay_buffer;
mod rollout_buffer;
mod schedule;
mod sum_tree;

pub use distributions::{
    categorical_entropy,
    categorical_sample,
    gaussian_entropy,
    gaussian_log_prob,
    gumbel_softmax,
    one_hot_rows,
    sample_gaussian,
    squashed_gaussian_log_prob,
    straight_through,
};
pub use nets::{
    actor_continuous,
    actor_logits,
    critic_q,
    critic_q_all,
    critic_v,
    Head,
    Mlp,
    QNetwork,
};
pub use ou_noise::OuNoise;
pub use recorder::Recorder;
pub use replay_buffer::{
    ReplayBatch,
    ReplayBuffer,
    Transition,
};
pub use rollout_buffer::{
    RolloutBatch,
    RolloutBuffer,
    RolloutStep,
};
pub use schedule::{
    BetaAnneal,
    PolynomialDecay,
};
pub use sum_tree::SumTree;
