use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result, bail};
use bpf_common::config::ModuleConfig;

pub const DENTRY_RESOLVER_SECTION: &str = "dentry-resolver";
pub const BPF_FILTERING_SECTION: &str = "bpf-filtering";
pub const PROCESS_RESOLVER_SECTION: &str = "process-resolver";

/// Configuration of every component, one `INI` section each.
///
/// A missing section or key means the component default.
#[derive(Debug, Clone, Default)]
pub struct VigilConfig {
    configs: HashMap<String, ModuleConfig>,
}

impl VigilConfig {
    /// Load configuration from an `INI` file, which must exist.
    pub fn with_custom_file(config_file: impl AsRef<Path>) -> Result<Self> {
        let config_file = config_file.as_ref();
        if !config_file.exists() {
            bail!("Configuration file {} not found", config_file.display());
        }
        let conf = ini::Ini::load_from_file(config_file)
            .with_context(|| format!("Error loading configuration from {config_file:?}"))?;
        Ok(Self::from_ini(&conf))
    }

    /// Parse configuration from `INI` text.
    pub fn from_ini_str(content: &str) -> Result<Self> {
        let conf = ini::Ini::load_from_str(content).context("Error parsing configuration")?;
        Ok(Self::from_ini(&conf))
    }

    fn from_ini(conf: &ini::Ini) -> Self {
        let mut configs: HashMap<String, ModuleConfig> = HashMap::new();
        for (section, prop) in conf {
            if let Some(section) = section {
                let component_config = configs.entry(section.to_string()).or_default();
                for (key, value) in prop.iter() {
                    log::debug!("{}.{}={}", section, key, value);
                    component_config.insert(key, value);
                }
            } else if !prop.is_empty() {
                log::warn!("Ignoring configuration keys outside of any section");
            }
        }
        Self { configs }
    }

    /// Raw configuration of a component, empty when the section is missing.
    pub fn get_module_config(&self, component: &str) -> ModuleConfig {
        self.configs.get(component).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, component: &str, key: &str, value: &str) {
        self.configs
            .entry(component.to_string())
            .or_default()
            .insert(key, value);
    }

    pub fn dentry_resolver(&self) -> Result<dentry_resolver::Config> {
        dentry_resolver::Config::try_from(&self.get_module_config(DENTRY_RESOLVER_SECTION))
            .with_context(|| format!("Invalid [{DENTRY_RESOLVER_SECTION}] configuration"))
    }

    pub fn bpf_filtering(&self) -> Result<bpf_filtering::Config> {
        bpf_filtering::Config::try_from(&self.get_module_config(BPF_FILTERING_SECTION))
            .with_context(|| format!("Invalid [{BPF_FILTERING_SECTION}] configuration"))
    }

    pub fn process_resolver(&self) -> Result<process_resolver::Config> {
        process_resolver::Config::try_from(&self.get_module_config(PROCESS_RESOLVER_SECTION))
            .with_context(|| format!("Invalid [{PROCESS_RESOLVER_SECTION}] configuration"))
    }
}
