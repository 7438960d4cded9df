use std::{collections::HashMap, fmt::Display, str::FromStr};

use thiserror::Error;

/// Raw configuration of a single component, as read from one section of
/// the configuration file. Components turn it into their typed config with
/// `TryFrom<&ModuleConfig>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleConfig {
    inner: HashMap<String, String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("field {field} is required")]
    RequiredValue { field: String },
    #[error("{value} is not a valid value for field {field}: {err}")]
    InvalidValue {
        field: String,
        value: String,
        err: String,
    },
}

impl ModuleConfig {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.inner.insert(key.into(), value.into())
    }

    pub fn get_raw(&self, config_name: &str) -> Option<&str> {
        self.inner.get(config_name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn required<T>(&self, config_name: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        match self.inner.get(config_name) {
            None => Err(ConfigError::RequiredValue {
                field: config_name.to_string(),
            }),
            Some(value) => parse(value, config_name),
        }
    }

    pub fn optional<T>(&self, config_name: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        self.inner
            .get(config_name)
            .map(|value| parse(value, config_name))
            .transpose()
    }

    /// Typed value, or `default` when the field is missing.
    pub fn with_default<T>(&self, config_name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        Ok(self.optional(config_name)?.unwrap_or(default))
    }

    /// Return a comma separed list of values. Return empty vector if field is missing.
    pub fn get_list<T>(&self, config_name: &str) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        self.inner
            .get(config_name)
            .iter()
            .flat_map(|config| config.split(','))
            .filter(|item| !item.is_empty())
            .map(|item| parse(item.trim(), config_name))
            .collect()
    }

    pub fn get_list_with_default<T>(
        &self,
        config_name: &str,
        default: Vec<T>,
    ) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        if self.inner.contains_key(config_name) {
            self.get_list(config_name)
        } else {
            Ok(default)
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ModuleConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

fn parse<T>(value: &str, config_name: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    T::from_str(value).map_err(|err| ConfigError::InvalidValue {
        field: config_name.to_string(),
        value: value.to_string(),
        err: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_values() {
        let config: ModuleConfig = [("size", "12"), ("name", "pathnames")].into_iter().collect();
        assert_eq!(config.required::<usize>("size"), Ok(12));
        assert_eq!(config.with_default("missing", 7usize), Ok(7));
        assert_eq!(config.optional::<String>("name"), Ok(Some("pathnames".into())));
        assert_eq!(
            config.required::<u32>("missing"),
            Err(ConfigError::RequiredValue {
                field: "missing".to_string()
            })
        );
    }

    #[test]
    fn invalid_value() {
        let config: ModuleConfig = [("size", "big")].into_iter().collect();
        assert!(matches!(
            config.with_default("size", 1usize),
            Err(ConfigError::InvalidValue { field, value, .. }) if field == "size" && value == "big"
        ));
    }

    #[test]
    fn lists() {
        let config: ModuleConfig = [("names", "ls, cat,,sh")].into_iter().collect();
        assert_eq!(
            config.get_list::<String>("names").unwrap(),
            vec!["ls".to_string(), "cat".to_string(), "sh".to_string()]
        );
        assert_eq!(
            config.get_list_with_default("other", vec![1u32]).unwrap(),
            vec![1]
        );
    }
}
