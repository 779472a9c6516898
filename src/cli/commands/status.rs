//! Status command - check engine, directories and packages

use crate::config::{Config, ConfigManager};
use crate::error::DerivoResult;
use crate::transform::create_engine;
use console::{style, Emoji};

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

/// Execute the status command
pub async fn execute(config: &Config) -> DerivoResult<()> {
    println!("{}", style("Derivo Status").bold().cyan());

    let mut all_ok = true;
    all_ok &= check_engine(config).await;
    all_ok &= check_directories(config);
    all_ok &= check_packages(config);

    println!();
    if all_ok {
        println!("{}", style("All checks passed").green().bold());
    } else {
        println!(
            "{}",
            style("Some checks failed - see above for details").yellow().bold()
        );
    }

    Ok(())
}

async fn check_engine(config: &Config) -> bool {
    println!();
    println!("{}", style("Engine:").bold());

    let engine = create_engine(config);
    if engine.is_available().await {
        println!("  {} {}", CHECK, style(engine.engine_name()).green());
        true
    } else {
        println!(
            "  {} {} - Install GraphicsMagick or set [engine].kind = \"raster\"",
            CROSS,
            style(engine.engine_name()).red()
        );
        false
    }
}

fn check_directories(config: &Config) -> bool {
    println!();
    println!("{}", style("Paths:").bold());

    let mut ok = true;
    let root = &config.server.root_path;
    if root.is_dir() {
        println!("  {} Root: {}", CHECK, root.display());
    } else {
        println!("  {} Root missing: {}", CROSS, style(root.display()).red());
        ok = false;
    }

    let images = config.images_dir();
    if images.is_dir() {
        println!("  {} Images: {}", CHECK, images.display());
    } else {
        println!(
            "  {} Images: {} - created on first request",
            WARN,
            style(images.display()).yellow()
        );
    }

    let catalog = config.catalog_path();
    if catalog.is_file() {
        println!("  {} Catalogue: {}", CHECK, catalog.display());
    } else {
        println!(
            "  {} Catalogue: {} - no sources will resolve",
            WARN,
            style(catalog.display()).yellow()
        );
    }

    ok
}

fn check_packages(config: &Config) -> bool {
    println!();
    println!("{}", style("Packages:").bold());

    match ConfigManager::registry(config) {
        Ok(registry) => {
            for (name, package) in registry.iter() {
                println!("  {} {} ({})", CHECK, name, package.kind);
            }
            true
        }
        Err(e) => {
            println!("  {} {}", CROSS, style(e).red());
            false
        }
    }
}

