//! Resolve command - generate or look up one derivative

use crate::cache::DerivativeKey;
use crate::cli::args::ResolveArgs;
use crate::config::Config;
use crate::error::DerivoResult;

pub async fn execute(args: ResolveArgs, config: &Config) -> DerivoResult<()> {
    let service = super::service(config).await?;
    let key = DerivativeKey::new(args.id, args.package, args.ext);

    let path = service.resolver().resolve(&key, args.no_cache).await?;
    println!("{}", path.display());
    Ok(())
}
