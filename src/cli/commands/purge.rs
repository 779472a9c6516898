//! Purge command - drop every derivative of one package

use crate::cli::args::PurgeArgs;
use crate::config::{Config, ConfigManager};
use crate::error::{DerivoError, DerivoResult};
use crate::ui::{self, Level, UiContext};

pub async fn execute(args: PurgeArgs, config: &Config) -> DerivoResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let registry = ConfigManager::registry(config)?;
    registry.resolve(&args.package)?;

    let prompt = format!(
        "Delete every cached derivative of package '{}' under {}?",
        args.package,
        config.images_dir().display()
    );
    if !ui::confirm(&ctx, &prompt, false).await? {
        ui::outro(&ctx, Level::Warn, "Purge cancelled");
        return Ok(());
    }

    let service = super::service(config).await?;
    let report = service
        .invalidator()
        .purge_package(&args.package)
        .await
        .map_err(|e| DerivoError::Internal(format!("purge task failed: {}", e)))?;

    for (path, reason) in &report.failed {
        ui::step(&ctx, Level::Fail, &path.display().to_string(), Some(reason));
    }

    let summary = format!(
        "Purged {} file(s) of package {}",
        report.deleted.len(),
        report.package
    );
    let level = if report.failed.is_empty() {
        Level::Ok
    } else {
        Level::Warn
    };
    ui::outro(&ctx, level, &summary);
    Ok(())
}
