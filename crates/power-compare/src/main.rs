mod bootstrap;
mod report;

use anyhow::{Context, Result};
use power_core::settings::Settings;
use power_data::analysis;

fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("power-compare v{} starting", env!("CARGO_PKG_VERSION"));

    let config = settings.pipeline_config()?;
    let mode = settings.run_mode()?;

    tracing::info!(
        "Mode: {}, tolerance: {} s, strategy: {}, idle session: '{}'",
        settings.mode,
        config.tolerance_secs(),
        settings.strategy,
        config.idle_session
    );
    tracing::debug!(
        "Reference: {}, secondary: {}, output: {}",
        config.reference_path.display(),
        config.secondary_path.display(),
        config.output_dir.display()
    );

    let result = analysis::run(mode, &config)
        .with_context(|| format!("'{}' run failed", settings.mode))?;

    print!("{}", report::render(&result));

    tracing::info!(
        "Done: {} file(s) written to {}",
        result.metadata.outputs.len(),
        config.output_dir.display()
    );

    Ok(())
}
