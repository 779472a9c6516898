//! Invalidate command - drop every derivative of one source

use crate::cli::args::InvalidateArgs;
use crate::config::Config;
use crate::error::DerivoResult;
use crate::ui::{self, Level, UiContext};

pub async fn execute(args: InvalidateArgs, config: &Config) -> DerivoResult<()> {
    let ctx = UiContext::detect();
    let service = super::service(config).await?;

    let removed = service.invalidator().invalidate(&args.id).await?;
    ui::step(
        &ctx,
        Level::Ok,
        &format!("Removed {} derivative(s) of {}", removed, args.id),
        None,
    );
    Ok(())
}
