//! `chatrelay config`: Show or initialise configuration.

use chatrelay_agent::{KNOWN_MODELS, Personality};
use chatrelay_config::AppConfig;

/// Print the effective configuration with secrets redacted.
pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{}", config.redacted_toml()?);

    println!("# Models");
    for model in KNOWN_MODELS {
        println!("#   {:<45} {} ({})", model.id, model.name, model.description);
    }
    println!("# Personalities");
    for p in Personality::ALL {
        println!("#   {:<12} {}: {}", p.key(), p.display_name(), p.description());
    }
    Ok(())
}

/// Write the default configuration file, refusing to overwrite one.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()).into());
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, AppConfig::default_toml()?)?;
    println!("Created {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = chatrelay_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().ends_with("config.toml"));
        assert!(path.to_str().unwrap().contains(".chatrelay"));
    }
}
