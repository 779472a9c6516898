//! Confirmation prompt with a non-interactive fallback

use super::context::UiContext;
use crate::error::{DerivoError, DerivoResult};

/// Ask a yes/no question
///
/// Auto-yes answers `true`; a non-interactive context answers `default`.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> DerivoResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(message).initial_value(default).interact()
    })
    .await
    .map_err(|e| DerivoError::User(format!("prompt task failed: {}", e)))?
    .map_err(|e| DerivoError::User(format!("prompt failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn auto_yes_skips_prompt() {
        let ctx = UiContext::non_interactive().with_auto_yes(true);
        assert!(confirm(&ctx, "Purge?", false).await.unwrap());
    }

    #[tokio::test]
    async fn non_interactive_uses_default() {
        let ctx = UiContext::non_interactive();
        assert!(!confirm(&ctx, "Purge?", false).await.unwrap());
        assert!(confirm(&ctx, "Purge?", true).await.unwrap());
    }
}
