pub mod postgres;
pub mod status;
pub mod sync;
pub mod validate;

use anyhow::Result;

use crate::Context;
use crate::config::Config;

/// Load the config file selected by `--config`.
pub fn load_config(ctx: &Context) -> Result<Config> {
    let path = Config::path(ctx.config.as_deref());
    log::debug!("Loading config from {}", path.display());
    Config::load(&path)
}
