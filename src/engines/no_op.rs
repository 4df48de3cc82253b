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
    tracing::info,
};

/// Pre-fill the replay buffer with `steps` environment steps before
/// training starts, so off-policy algorithms can draw a first batch.
///
/// With `choose` unset the environment's own random actions are used (and
/// stepped in the environment's native format); otherwise the model's
/// exploratory policy drives the warm-up.
pub fn no_op<P, E>(
    env: &mut E,
    model: &mut P,
    steps: usize,
    choose: bool,
) -> Result<()>
where
    P: Policy,
    E: Environment,
{
    let n = env.n();
    let obs_space = env.observation_space();
    let action_space = env.action_space();

    let mut state = encode_observation(&env.reset()?, &obs_space)?;
    let steps = steps / n + 1;

    for step in 0..steps {
        info!("no op step {step}");

        let (action, env_step) = if choose {
            let action = model.choose_action(&state)?;
            let env_step = env.step(&denormalize_action(&action, &action_space)?)?;
            (action, env_step)
        } else {
            let action = env.sample_action()?;
            let env_step = env.step(&action)?;
            (action, env_step)
        };

        let mut new_state = encode_observation(&env_step.obs, &obs_space)?;
        model.no_op_store(
            &state,
            &action,
            &env_step.reward,
            &new_state,
            &env_step.done,
        )?;

        let dones_index = env.dones_index();
        if !dones_index.is_empty() {
            let fresh = encode_observation(&env.partial_reset()?, &obs_space)?;
            new_state = new_state.replace_rows(&dones_index, &fresh)?;
        }
        state = new_state;
    }
    Ok(())
}
