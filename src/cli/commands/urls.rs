//! Urls command - list derivative URLs of a source

use crate::cli::args::UrlsArgs;
use crate::config::Config;
use crate::error::{DerivoError, DerivoResult};
use crate::ui::{self, UiContext};

pub async fn execute(args: UrlsArgs, config: &Config) -> DerivoResult<()> {
    let ctx = UiContext::detect();
    let service = super::service(config).await?;

    let source = service
        .sources()
        .find(&args.id)
        .await?
        .ok_or_else(|| DerivoError::SourceNotFound(args.id.clone()))?;

    let paths = service.resolver().paths();
    let urls = paths.urls_for(&source)?;
    let files = paths.paths_for(&source)?;

    for (package, url) in &urls {
        ui::section(&ctx, package);
        ui::key_value("url", url);
        if let Some(path) = files.get(package) {
            ui::key_value_status("path", &path.display().to_string(), path.exists());
        }
    }
    Ok(())
}
