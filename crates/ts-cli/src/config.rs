//! Optional `ts.toml` config file, merged underneath CLI flags (§6.1, §10).

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub heap_size: Option<usize>,
    pub surgescript_gc_interval: Option<u64>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl FileConfig {
    /// Reads `ts.toml` from `dir` if present; a missing file is not an
    /// error, a malformed one is.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join("ts.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("ts-cli-config-test-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_yields_defaults_not_an_error() {
        let dir = scratch_dir("missing");
        let config = FileConfig::load(&dir).unwrap();
        assert_eq!(config.heap_size, None);
        assert_eq!(config.surgescript_gc_interval, None);
        assert!(config.args.is_empty());
    }

    #[test]
    fn present_file_is_parsed() {
        let dir = scratch_dir("present");
        std::fs::write(dir.join("ts.toml"), "heap_size = 4096\nsurgescript_gc_interval = 500\nargs = [\"a\", \"b\"]\n").unwrap();
        let config = FileConfig::load(&dir).unwrap();
        assert_eq!(config.heap_size, Some(4096));
        assert_eq!(config.surgescript_gc_interval, Some(500));
        assert_eq!(config.args, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = scratch_dir("malformed");
        std::fs::write(dir.join("ts.toml"), "heap_size = [this is not valid toml").unwrap();
        assert!(FileConfig::load(&dir).is_err());
    }
}
