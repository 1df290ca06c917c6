use super::ConfigDocument;
use crate::config::Config;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const APP_DIR: &str = "padfeeder";
const CONFIG_FILE: &str = "padfeeder.toml";

/// Reads and writes the configuration file.
///
/// The file named by `path` may redirect to another file via `AltPath`;
/// after a load, saves go to wherever the configuration was actually read.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
    effective: Option<PathBuf>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            effective: None,
        }
    }

    /// Uses `override_path` if given, otherwise the per-user config directory.
    pub fn locate(override_path: Option<PathBuf>) -> Self {
        match override_path {
            Some(path) => Self::new(path),
            None => {
                let mut path = get_config_dir();
                path.push(APP_DIR);
                path.push(CONFIG_FILE);
                Self::new(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File the configuration is read from and saved to.
    pub fn effective_path(&self) -> &Path {
        self.effective.as_deref().unwrap_or(&self.path)
    }

    /// Writes the starter configuration if no file exists yet.
    pub async fn ensure_default(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Ok(());
        }
        info!("No config at {}, writing defaults", self.path.display());
        write_config(&self.path, &Config::starter()).await
    }

    pub async fn load(&mut self) -> Result<Config> {
        let document = read_document(&self.path).await?;

        let (document, effective) = match document.alt_path.clone() {
            Some(alt) => {
                let alt = resolve_relative(&self.path, &alt);
                info!("Config redirects to {}", alt.display());
                let redirected = read_document(&alt).await?;
                if redirected.alt_path.is_some() {
                    warn!("Ignoring nested AltPath in {}", alt.display());
                }
                (redirected, alt)
            }
            None => (document, self.path.clone()),
        };

        let config = document.to_config();
        info!(
            "Loaded {} profile(s) from {}",
            config.profiles.len(),
            effective.display()
        );
        self.effective = Some(effective);
        Ok(config)
    }

    pub async fn save(&self, config: &Config) -> Result<()> {
        write_config(self.effective_path(), config).await
    }
}

async fn read_document(path: &Path) -> Result<ConfigDocument> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
    ConfigDocument::parse(&text)
}

async fn write_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
    }
    let content = ConfigDocument::from_config(config).render()?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| eyre!("Failed to write config file: {}", e))?;
    debug!("Config written to {}", path.display());
    Ok(())
}

fn resolve_relative(base_file: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        return target.to_path_buf();
    }
    match base_file.parent() {
        Some(dir) => dir.join(target),
        None => target.to_path_buf(),
    }
}

fn get_config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| {
        warn!("Could not determine config directory, using current directory");
        PathBuf::from(".")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::keycode::KeyCode;

    #[tokio::test]
    async fn default_file_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::new(dir.path().join("nested").join("pad.toml"));
        store.ensure_default().await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, Config::starter());

        let mut changed = loaded.clone();
        changed.mouse_check_frequency_ms = 90;
        store.save(&changed).await.unwrap();
        store.ensure_default().await.unwrap();
        assert_eq!(store.load().await.unwrap().mouse_check_frequency_ms, 90);
    }

    #[tokio::test]
    async fn alt_path_redirects_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.toml");
        tokio::fs::write(&main, "AltPath = \"real.toml\"\n").await.unwrap();
        tokio::fs::write(
            dir.path().join("real.toml"),
            "[HotKeys]\nShowUI = \"F2\"\n\n[Profiles.Redirected]\nXboxCount = 1\n",
        )
        .await
        .unwrap();

        let mut store = ConfigStore::new(&main);
        let config = store.load().await.unwrap();
        assert!(config.profiles.contains_key("Redirected"));
        assert_eq!(config.hotkey_show_ui, KeyCode(0x71));
        assert_eq!(store.effective_path(), dir.path().join("real.toml"));

        store.save(&config).await.unwrap();
        let main_text = tokio::fs::read_to_string(&main).await.unwrap();
        assert!(main_text.contains("AltPath"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::new(dir.path().join("absent.toml"));
        assert!(store.load().await.is_err());
    }

    #[test]
    fn override_path_wins() {
        let store = ConfigStore::locate(Some(PathBuf::from("custom.toml")));
        assert_eq!(store.path(), Path::new("custom.toml"));
        assert!(ConfigStore::locate(None).path().ends_with("padfeeder/padfeeder.toml"));
    }
}
