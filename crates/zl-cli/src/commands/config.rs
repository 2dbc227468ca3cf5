//! Config command implementations

use anyhow::Result;

use crate::context::AppContext;
use crate::output::print_info;

/// Print the config and session file locations
pub fn config_path(ctx: &AppContext) -> Result<()> {
    println!("{}", ctx.config_path.display());
    println!("{}", ctx.sessions_path.display());
    Ok(())
}

/// Print the effective configuration as TOML
pub fn config_show(ctx: &AppContext) -> Result<()> {
    if !ctx.config_path.exists() {
        print_info(&format!(
            "No config file at {:?}, showing defaults",
            ctx.config_path
        ));
    }
    print!("{}", toml::to_string_pretty(&ctx.config)?);
    Ok(())
}
