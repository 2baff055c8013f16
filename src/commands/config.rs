use anyhow::Context;
use tracestats::config::{self, CONFIG_EXAMPLE, TracestatsConfig};
use tracestats::styling::{BOLD, HINT_EMOJI, HINT, INFO_EMOJI, format_success, print, println};

/// Write the example config file, keeping an existing one unless `force`.
pub fn handle_config_init(force: bool) -> anyhow::Result<()> {
    let config_path = config::config_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;

    if config_path.exists() && !force {
        println!(
            "{INFO_EMOJI} Config already exists: {BOLD}{}{BOLD:#}",
            config_path.display()
        );
        println!(
            "{HINT_EMOJI} {HINT}Use 'tracestats config show' to view it, or --force to overwrite{HINT:#}"
        );
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    std::fs::write(&config_path, CONFIG_EXAMPLE).context("Failed to write config file")?;

    println!(
        "{}",
        format_success(&format!(
            "Created config file: {BOLD}{}{BOLD:#}",
            config_path.display()
        ))
    );
    Ok(())
}

/// Print where the config lives and the values in effect.
pub fn handle_config_show(config: &TracestatsConfig) -> anyhow::Result<()> {
    match config::config_path() {
        Some(path) if path.exists() => {
            println!("{INFO_EMOJI} Config: {BOLD}{}{BOLD:#}", path.display())
        }
        Some(path) => {
            println!("{INFO_EMOJI} Config: {BOLD}{}{BOLD:#}", path.display());
            println!("{HINT_EMOJI} {HINT}Not found (using defaults); run 'tracestats config init' to create it{HINT:#}");
        }
        None => println!("{INFO_EMOJI} Config: {HINT}no config directory available{HINT:#}"),
    }
    match config.store_path() {
        Ok(path) => println!("{INFO_EMOJI} Store: {BOLD}{}{BOLD:#}", path.display()),
        Err(e) => println!("{INFO_EMOJI} Store: {HINT}{e}{HINT:#}"),
    }
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}
