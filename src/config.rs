use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::env;
use std::fs;
use std::time::Duration;

use crate::order::PartDescriptor;
use crate::script::{Script, ScriptLine, DEFAULT_FINAL_IMAGE_URL, DEFAULT_REPLY_DELAY};

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub debug: Option<bool>,
    pub reply_delay_ms: Option<u64>,
    pub script: Option<Vec<ScriptLine>>,
    pub final_image_url: Option<String>,
    pub part: Option<PartDescriptor>,
    #[serde(default)]
    pub emailjs: EmailJsConfig,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EmailJsConfig {
    pub service_id: Option<String>,
    pub template_id: Option<String>,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub base_url: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        let config_paths = [
            dirs::home_dir().map(|p| p.join(".automate.json")),
            dirs::config_dir().map(|p| p.join("automate/.automate.json")),
            Some(PathBuf::from("./.automate.json")),
        ];
        let mut cfg = Self::load_from_files(config_paths.iter().flatten());
        cfg.apply_env(|key| env::var(key).ok());
        log::debug!("Loaded config: {:?}", cfg);
        cfg
    }

    /// Merges the given files in order, later files overriding earlier ones.
    /// Missing files are skipped; unreadable or unparsable ones are logged and skipped.
    pub fn load_from_files<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> Self {
        let mut config = Config::default();
        for path in paths {
            if !path.exists() {
                continue;
            }
            log::debug!("Attempting to load config from: {:?}", path);
            match Self::read_file(path) {
                Ok(loaded) => {
                    config.merge(loaded);
                    log::info!("Successfully loaded and merged config from: {:?}", path);
                }
                Err(e) => log::warn!("Failed to load config file at {:?}: {}", path, e),
            }
        }
        config
    }

    fn read_file(path: &Path) -> anyhow::Result<Config> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str::<Config>(&content)?)
    }

    fn merge(&mut self, loaded: Config) {
        if loaded.debug.is_some() { self.debug = loaded.debug; }
        if loaded.reply_delay_ms.is_some() { self.reply_delay_ms = loaded.reply_delay_ms; }
        if loaded.script.is_some() { self.script = loaded.script; }
        if loaded.final_image_url.is_some() { self.final_image_url = loaded.final_image_url; }
        if loaded.part.is_some() { self.part = loaded.part; }

        let e = loaded.emailjs;
        if e.service_id.is_some() { self.emailjs.service_id = e.service_id; }
        if e.template_id.is_some() { self.emailjs.template_id = e.template_id; }
        if e.public_key.is_some() { self.emailjs.public_key = e.public_key; }
        if e.private_key.is_some() { self.emailjs.private_key = e.private_key; }
        if e.base_url.is_some() { self.emailjs.base_url = e.base_url; }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("EMAILJS_SERVICE_ID") { self.emailjs.service_id = Some(v); }
        if let Some(v) = var("EMAILJS_TEMPLATE_ID") { self.emailjs.template_id = Some(v); }
        if let Some(v) = var("EMAILJS_PUBLIC_KEY") { self.emailjs.public_key = Some(v); }
        if let Some(v) = var("EMAILJS_PRIVATE_KEY") { self.emailjs.private_key = Some(v); }

        if let Some(debug_env) = var("AUTOMATE_DEBUG").and_then(|s| s.parse::<bool>().ok()) {
            self.debug = Some(debug_env);
        }
    }

    pub fn reply_delay(&self) -> Duration {
        self.reply_delay_ms.map(Duration::from_millis).unwrap_or(DEFAULT_REPLY_DELAY)
    }

    pub fn script(&self) -> Script {
        let image = self.final_image_url.clone().unwrap_or_else(|| DEFAULT_FINAL_IMAGE_URL.to_string());
        match &self.script {
            Some(lines) if !lines.is_empty() => Script::new(lines.clone(), image),
            Some(_) => {
                log::warn!("Configured script is empty, using the built-in one");
                Script::new(Script::reference().lines().to_vec(), image)
            }
            None => Script::new(Script::reference().lines().to_vec(), image),
        }
    }

    pub fn part(&self) -> PartDescriptor {
        self.part.clone().unwrap_or_default()
    }
}
