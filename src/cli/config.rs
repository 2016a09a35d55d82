use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::{Path, PathBuf};

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = dirs::home_dir()
        .map(|home| home.join(".config/cwquery/config.yml"))
        .ok_or("Could not determine home directory. Use --stdout to print the config")?;

    write_config(&config_content, &config_path)?;
    println!("Config file written to {}", config_path.display());
    Ok(())
}

/// Write `config_content` to `path`, refusing to replace an existing file.
pub fn write_config(config_content: &str, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        return Err(format!(
            "Config file already exists at {}. Remove it first or use --stdout to print the config",
            path.display()
        )
        .into());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, config_content)?;
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());
    crate::config::load_config(&path)?;
    println!("Config is valid");
    Ok(())
}
