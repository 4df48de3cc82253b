use {
    super::run::evaluate,
    crate::{
        agents::{
            Policy,
            PolicyMode,
        },
        configs::TrainConfig,
        envs::{
            denormalize_action,
            encode_observation,
            Environment,
        },
    },
    anyhow::Result,
    tracing::{
        info,
        warn,
    },
};

/// Per-episode data collected over one training run.
pub struct TrainReport {
    /// Mean return across the vectorized instances, per episode.
    pub mean_returns: Vec<f64>,
    /// The first step at which every instance had terminated, per episode
    /// (-1 if the episode hit the step cap first).
    pub last_done_steps: Vec<i64>,
}

/// Drive one training run: collect episodes, call `learn` after each one,
/// checkpoint on the configured cadence, and evaluate greedily whenever an
/// episode's best instance crosses the environment's solve threshold.
pub fn train<P, E>(
    env: &mut E,
    model: &mut P,
    config: &TrainConfig,
) -> Result<TrainReport>
where
    P: Policy,
    E: Environment,
{
    let n = env.n();
    let obs_space = env.observation_space();
    let action_space = env.action_space();
    warn!("action space: {:?}", action_space);
    warn!("observation space: {:?}", obs_space);

    let mut report = TrainReport {
        mean_returns: Vec::new(),
        last_done_steps: Vec::new(),
    };

    for episode in config.begin_episode..config.max_episode {
        let mut state = encode_observation(&env.reset()?, &obs_space)?;
        let mut dones_flag = vec![false; n];
        let mut returns = vec![0.0f64; n];
        let mut step = 0usize;
        let mut last_done_step: i64 = -1;

        loop {
            step += 1;
            let action = model.choose_action(&state)?;
            let env_step = env.step(&denormalize_action(&action, &action_space)?)?;

            // rewards only count for instances that had not terminated
            // before this step
            for i in 0..n {
                if !dones_flag[i] {
                    returns[i] += env_step.reward[i];
                }
                dones_flag[i] |= env_step.done[i];
            }

            let mut new_state = encode_observation(&env_step.obs, &obs_space)?;
            model.store_data(
                &state,
                &action,
                &env_step.reward,
                &new_state,
                &env_step.done,
            )?;

            if dones_flag.iter().all(|&d| d) {
                if last_done_step == -1 {
                    last_done_step = step as i64;
                }
                if model.mode() == PolicyMode::OffPolicy {
                    break;
                }
            }

            if step >= config.max_step {
                break;
            }

            // finished instances restart individually while the rest keep
            // running
            let dones_index = env.dones_index();
            if !dones_index.is_empty() {
                let fresh = encode_observation(&env.partial_reset()?, &obs_space)?;
                new_state = new_state.replace_rows(&dones_index, &fresh)?;
            }
            state = new_state;
        }

        model.learn(episode, step)?;

        let mean_return = returns.iter().sum::<f64>() / n as f64;
        model.writer_summary(episode, mean_return, last_done_step);
        info!(
            "episode: {episode:3} | step: {step:4} | last_done_step: {last_done_step:4} \
             | rewards: {returns:?}"
        );
        report.mean_returns.push(mean_return);
        report.last_done_steps.push(last_done_step);

        if episode % config.save_frequency == 0 {
            model.save_checkpoint(episode)?;
        }

        if config.eval_while_train {
            if let Some(threshold) = env.reward_threshold() {
                let best = returns.iter().cloned().fold(f64::MIN, f64::max);
                if best >= threshold {
                    let (average_reward, average_step) =
                        evaluate(env, model, config.max_step, config.max_eval_episode)?;
                    let solved = average_reward >= threshold;
                    warn!(
                        "evaluated episode {episode}: {} runs | average step: \
                         {average_step} | average reward: {average_reward} | solved: {solved}",
                        config.max_eval_episode,
                    );
                }
            }
        }
    }

    Ok(report)
}
