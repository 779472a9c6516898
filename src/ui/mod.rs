//! Terminal output for the `derivo` binary
//!
//! Interactive terminals get `cliclack` styling; pipes and CI get plain
//! bracketed lines that are stable enough to grep in tests.

mod context;
mod output;
mod prompts;

pub use context::UiContext;
pub use output::{intro, key_value, key_value_status, outro, remark, section, step, Level};
pub use prompts::confirm;
