//! Composer autoload (PSR-4) configuration
//!
//! Only `autoload.psr-4` is read. Values may be a single directory or a list.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::ConfigResult;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Psr4Dirs {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
struct ComposerAutoload {
    #[serde(rename = "psr-4", default)]
    psr4: BTreeMap<String, Psr4Dirs>,
}

#[derive(Debug, Default, Deserialize)]
struct ComposerFile {
    #[serde(default)]
    autoload: ComposerAutoload,
}

/// PSR-4 namespace prefix → directories, relative to the project root
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoloadConfig {
    root: PathBuf,
    psr4: BTreeMap<String, Vec<String>>,
}

impl AutoloadConfig {
    /// Load `composer.json` from the project root; a missing file yields an empty config
    pub fn load(root: &Path) -> ConfigResult<Self> {
        let path = root.join("composer.json");
        if !path.is_file() {
            return Ok(Self {
                root: root.to_path_buf(),
                psr4: BTreeMap::new(),
            });
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_json(root, &content)
    }

    /// Parse composer.json text
    pub fn from_json(root: &Path, content: &str) -> ConfigResult<Self> {
        let file: ComposerFile = serde_json::from_str(content)?;
        let psr4 = file
            .autoload
            .psr4
            .into_iter()
            .map(|(prefix, dirs)| {
                let dirs = match dirs {
                    Psr4Dirs::One(d) => vec![d],
                    Psr4Dirs::Many(ds) => ds,
                };
                (prefix.trim_start_matches('\\').to_string(), dirs)
            })
            .collect();
        Ok(Self {
            root: root.to_path_buf(),
            psr4,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.psr4.is_empty()
    }

    /// Candidate file for a fully-qualified class name (longest prefix wins)
    pub fn resolve_class(&self, class_name: &str) -> Option<PathBuf> {
        let class_name = class_name.trim_start_matches('\\');
        let (prefix, dirs) = self
            .psr4
            .iter()
            .filter(|(prefix, _)| class_name.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())?;

        let relative = class_name[prefix.len()..].replace('\\', "/");
        if relative.is_empty() {
            return None;
        }
        dirs.iter()
            .map(|dir| self.root.join(dir).join(format!("{}.php", relative)))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_composer_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = AutoloadConfig::load(dir.path()).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_resolve_longest_prefix() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/Db")).unwrap();
        std::fs::write(dir.path().join("src/Db/Conn.php"), "<?php").unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();

        let config = AutoloadConfig::from_json(
            dir.path(),
            r#"{"autoload": {"psr-4": {"App\\": "src/", "App\\Other\\": ["lib/"]}}}"#,
        )
        .unwrap();

        assert_eq!(
            config.resolve_class("\\App\\Db\\Conn"),
            Some(dir.path().join("src/").join("Db/Conn.php"))
        );
        assert_eq!(config.resolve_class("App\\Other\\Missing"), None);
        assert_eq!(config.resolve_class("Vendor\\Thing"), None);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(AutoloadConfig::from_json(dir.path(), "{not json").is_err());
    }
}
