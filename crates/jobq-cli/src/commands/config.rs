//! Configuration commands.

use anyhow::Result;
use jobq_config::ConfigProvider;

pub fn set(key: &str, value: &str) -> Result<()> {
    let provider = ConfigProvider::new();
    let stored = provider.set(key, value)?;
    println!("Config updated: {key} = {stored}");
    Ok(())
}

pub fn get(key: Option<&str>) -> Result<()> {
    match key {
        Some(key) => {
            let provider = ConfigProvider::new();
            println!("{key} = {}", provider.get(key)?);
            Ok(())
        }
        None => show(),
    }
}

pub fn show() -> Result<()> {
    let provider = ConfigProvider::new();
    println!("Effective config:");
    for (key, value) in provider.effective()? {
        println!("  {:<24} {}", key, value);
    }
    println!("(stored file: {})", provider.path().display());
    Ok(())
}
