use crate::config::RunSettings;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and validate run settings from a YAML file
pub fn load_settings(path: &Path) -> Result<RunSettings> {
    info!("Loading settings from: {:?}", path);

    let file = File::open(path)
        .wrap_err_with(|| format!("Failed to open settings file '{}'", path.display()))?;

    let settings: RunSettings = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse settings file '{}'", path.display()))?;

    settings.validate()?;

    Ok(settings)
}

/// Resolve settings: file if given, defaults otherwise, then CLI overrides
pub fn resolve_settings(path: Option<&Path>, force_sudo: bool) -> Result<RunSettings> {
    let mut settings = match path {
        Some(path) => load_settings(path)?,
        None => RunSettings::default(),
    };

    if force_sudo {
        settings.use_sudo = true;
    }

    Ok(settings)
}
