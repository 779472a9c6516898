//! Styled output helpers

use super::context::UiContext;
use console::{style, Style};

/// Severity of a reported step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Ok,
    Info,
    Warn,
    Fail,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Ok => "[OK]",
            Level::Info => "[INFO]",
            Level::Warn => "[WARN]",
            Level::Fail => "[FAIL]",
        }
    }

    fn style(self) -> Style {
        match self {
            Level::Ok => Style::new().green(),
            Level::Info => Style::new().cyan(),
            Level::Warn => Style::new().yellow(),
            Level::Fail => Style::new().red(),
        }
    }
}

/// Opening banner
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.is_interactive() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}", style(title).cyan().bold());
    }
}

/// Closing line, coloured by level
pub fn outro(ctx: &UiContext, level: Level, message: &str) {
    if ctx.is_interactive() {
        cliclack::outro(level.style().bold().apply_to(message)).ok();
    } else {
        println!("{} {}", level.style().apply_to(level.tag()), message);
    }
}

pub fn section(ctx: &UiContext, title: &str) {
    println!();
    if ctx.is_interactive() {
        cliclack::log::info(style(title).bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

/// One reported step, with optional dimmed detail
pub fn step(ctx: &UiContext, level: Level, message: &str, detail: Option<&str>) {
    let line = match detail {
        Some(detail) => format!("{} ({})", message, style(detail).dim()),
        None => message.to_string(),
    };

    if ctx.is_interactive() {
        let shown = match level {
            Level::Ok => cliclack::log::success(line),
            Level::Info => cliclack::log::info(line),
            Level::Warn => cliclack::log::warning(line),
            Level::Fail => cliclack::log::error(line),
        };
        shown.ok();
    } else {
        println!("  {} {}", level.style().apply_to(level.tag()), line);
    }
}

pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

pub fn key_value(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Key-value line with the value green when `ok`, yellow otherwise
pub fn key_value_status(key: &str, value: &str, ok: bool) {
    let level = if ok { Level::Ok } else { Level::Warn };
    println!("  {}: {}", style(key).dim(), level.style().apply_to(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_does_not_panic() {
        let ctx = UiContext::non_interactive();
        intro(&ctx, "derivo");
        step(&ctx, Level::Ok, "engine", Some("raster"));
        step(&ctx, Level::Fail, "catalog", None);
        outro(&ctx, Level::Warn, "done");
    }

    #[test]
    fn tags_are_bracketed() {
        assert_eq!(Level::Fail.tag(), "[FAIL]");
        assert_eq!(Level::Ok.tag(), "[OK]");
    }
}
