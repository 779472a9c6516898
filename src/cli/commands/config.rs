//! Config command - show or check configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::DerivoResult;
use crate::source::CatalogSourceStore;
use crate::ui::{self, Level, UiContext};

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
) -> DerivoResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Check) => check_config(config).await?,
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> DerivoResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn check_config(config: &Config) -> DerivoResult<()> {
    let ctx = UiContext::detect();

    let registry = ConfigManager::registry(config)?;
    ui::step(
        &ctx,
        Level::Ok,
        "Packages valid",
        Some(&format!("{} defined", registry.len())),
    );

    CatalogSourceStore::load(&config.catalog_path()).await?;
    ui::step(
        &ctx,
        Level::Ok,
        "Source catalogue readable",
        Some(&config.catalog_path().display().to_string()),
    );

    for warning in ConfigManager::engine_warnings(config) {
        ui::step(
            &ctx,
            Level::Warn,
            &warning,
            Some("set [engine] kind = \"graphicsmagick\""),
        );
    }

    ui::step(
        &ctx,
        Level::Info,
        "Extensions",
        Some(&config.server.extensions.join(", ")),
    );
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> DerivoResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step(
            &ctx,
            Level::Warn,
            &format!("Config already exists at {}", path.display()),
            Some("use --force to overwrite"),
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step(
        &ctx,
        Level::Ok,
        "Configuration initialized",
        Some(&path.display().to_string()),
    );
    Ok(())
}
