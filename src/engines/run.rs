use {
    crate::{
        agents::Policy,
        envs::{
            denormalize_action,
            encode_observation,
            Environment,
        },
    },
    anyhow::Result,
};

/// Run `max_eval_episode` greedy episodes (in rounds of `env.n()` parallel
/// instances) and report the average per-instance return and step count.
pub fn evaluate<P, E>(
    env: &mut E,
    model: &mut P,
    max_step: usize,
    max_eval_episode: usize,
) -> Result<(f64, usize)>
where
    P: Policy,
    E: Environment,
{
    let n = env.n();
    let obs_space = env.observation_space();
    let action_space = env.action_space();

    let mut total_rewards = vec![0.0f64; n];
    let mut total_steps = vec![0.0f64; n];
    let episodes = (max_eval_episode / n).max(1);

    for _ in 0..episodes {
        let mut state = encode_observation(&env.reset()?, &obs_space)?;
        let mut dones_flag = vec![false; n];
        let mut rewards = vec![0.0f64; n];
        let mut steps = vec![0.0f64; n];

        loop {
            let action = model.choose_inference_action(&state)?;
            let env_step = env.step(&denormalize_action(&action, &action_space)?)?;

            for i in 0..n {
                if !dones_flag[i] {
                    rewards[i] += env_step.reward[i];
                    steps[i] += 1.0;
                }
                dones_flag[i] |= env_step.done[i];
            }
            state = encode_observation(&env_step.obs, &obs_space)?;

            let all_done = dones_flag.iter().all(|&d| d);
            let step_capped = steps.iter().any(|&s| s >= max_step as f64);
            if all_done || step_capped {
                break;
            }
        }

        for i in 0..n {
            total_rewards[i] += rewards[i];
            total_steps[i] += steps[i];
        }
    }

    let average_reward =
        total_rewards.iter().sum::<f64>() / n as f64 / episodes as f64;
    let average_step =
        (total_steps.iter().sum::<f64>() / n as f64 / episodes as f64) as usize;
    Ok((average_reward, average_step))
}

/// Show off a trained model: greedy actions, no learning, forever. Finished
/// instances restart individually; the loop only ends with the process.
pub fn inference<P, E>(
    env: &mut E,
    model: &mut P,
) -> Result<()>
where
    P: Policy,
    E: Environment,
{
    let obs_space = env.observation_space();
    let action_space = env.action_space();

    loop {
        let mut state = encode_observation(&env.reset()?, &obs_space)?;
        loop {
            let action = model.choose_inference_action(&state)?;
            let env_step = env.step(&denormalize_action(&action, &action_space)?)?;
            state = encode_observation(&env_step.obs, &obs_space)?;

            let dones_index = env.dones_index();
            if !dones_index.is_empty() {
                let fresh = encode_observation(&env.partial_reset()?, &obs_space)?;
                state = state.replace_rows(&dones_index, &fresh)?;
            }
        }
    }
}
