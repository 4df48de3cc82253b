use {
    super::train::train,
    crate::{
        agents::Policy,
        configs::TrainConfig,
        envs::Environment,
        util::write_config,
    },
    anyhow::{
        anyhow,
        Result,
    },
    polars::prelude::{
        DataFrame,
        NamedFrom,
        ParquetWriter,
        Series,
    },
    std::{
        fs::{
            create_dir_all,
            File,
        },
        path::Path,
    },
    tracing::warn,
};

/// Run `n_repetitions` identical training runs and persist the collected
/// data.
///
/// Each run gets a fresh model from `make_model`; the per-episode mean
/// returns and last-done-steps land in one parquet file per run under
/// `data/<path>/`, next to the RON-serialized training config. Refuses to
/// write into a directory that already holds a config, since that would
/// clobber somebody's collected data.
pub fn run_experiment<P, E, F>(
    path: &dyn AsRef<Path>,
    n_repetitions: usize,
    env: &mut E,
    train_config: &TrainConfig,
    mut make_model: F,
) -> Result<()>
where
    P: Policy,
    E: Environment,
    F: FnMut() -> Result<P>,
{
    let path = Path::new("data/").join(path);

    if path.join("config_training.ron").try_exists()? {
        Err(anyhow!(concat!(
            "Config files already exist in this directory!\n",
            "I am assuming I would be overwriting existing data!",
        )))?
    }
    create_dir_all(path.as_path())?;
    write_config(train_config, path.join("config_training.ron"))?;

    for run in 0..n_repetitions {
        warn!("Collecting data, run {run}/{n_repetitions}");

        let mut model = make_model()?;
        let report = train(env, &mut model, train_config)?;

        let mut df = DataFrame::new(vec![
            Series::new(
                &format!("run_{run}_total_rewards"),
                &report.mean_returns,
            ),
            Series::new(
                &format!("run_{run}_last_done_steps"),
                &report.last_done_steps,
            ),
        ])?;

        ParquetWriter::new(File::create(path.join(format!("run_{run}_data.parquet")))?)
            .finish(&mut df)?;
    }
    Ok(())
}
