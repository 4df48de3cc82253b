use {
    anyhow::Result,
    std::{
        fs::File,
        path::Path,
        sync::Arc,
    },
    tracing::Level,
    tracing_subscriber::{
        fmt::{
            layer,
            writer::MakeWriterExt,
        },
        layer::SubscriberExt,
        util::SubscriberInitExt,
    },
};

/// Initialize the global tracing subscriber.
///
/// Episode summaries and scalar metrics are emitted as tracing events, so
/// this needs to be called once before any training loop if you want to see
/// them. The stdout layer is always installed; a file layer is added when a
/// path is given.
pub fn setup_logging(
    min_level_stdout: Level,
    logfile: Option<(&dyn AsRef<Path>, Level)>,
) -> Result<()> {
    match logfile {
        Some((path, min_level_file)) => {
            let log_file = Arc::new(File::create(path)?);
            tracing_subscriber::registry()
                .with(
                    layer()
                        .with_writer(log_file.with_max_level(min_level_file))
                        .with_ansi(false),
                )
                .with(
                    layer()
                        .with_writer(std::io::stdout.with_max_level(min_level_stdout))
                        .compact()
                        .with_line_number(false)
                        .with_thread_ids(false)
                        .with_target(true),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(
                    layer()
                        .with_writer(std::io::stdout.with_max_level(min_level_stdout))
                        .compact()
                        .with_line_number(false)
                        .with_thread_ids(false)
                        .with_target(true),
                )
                .init();
        }
    }

    Ok(())
}
