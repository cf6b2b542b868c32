//! Loader for Chorus configuration with YAML + environment overlays.
//!
//! Sources merge in the usual precedence: built-in defaults, then an optional
//! config file, then `CHORUS_`-prefixed environment variables (`__` as the
//! nesting separator, e.g. `CHORUS_LIMITS__MAX_CONTENTS=5`). String values
//! may reference `${VAR}` placeholders, expanded recursively up to a fixed
//! depth so cycles terminate.

use chorus_common::ChorusConfig;
use config::{Config, ConfigError, Environment, File};
use serde_json::Value;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring.
pub struct ChorusConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ChorusConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ChorusConfigLoader {
    /// Start with `CHORUS_` env overrides as the highest-precedence source.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(
            Environment::with_prefix("CHORUS")
                .separator("__")
                .try_parsing(true),
        );
        Self { builder }
    }

    /// Attach a config file; the `config` crate infers the format from the
    /// suffix. Missing files are tolerated so a bare environment still works.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet (tests, CLI overrides).
    ///
    /// ```
    /// use chorus_config::ChorusConfigLoader;
    ///
    /// let cfg = ChorusConfigLoader::new()
    ///     .with_yaml_str("crawl_interval: 0.5\nheadless: true")
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(cfg.crawl_interval, 0.5);
    /// assert!(cfg.headless);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders, and materialise the
    /// typed configuration. Fields no source mentions keep their defaults.
    pub fn load(self) -> Result<ChorusConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: ChorusConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_common::LoginMode;
    use serde_json::json;

    #[test]
    fn empty_sources_yield_defaults() {
        let cfg = ChorusConfigLoader::new().load().unwrap();
        assert_eq!(cfg, ChorusConfig::default());
    }

    #[test]
    fn yaml_overrides_only_named_fields() {
        let cfg = ChorusConfigLoader::new()
            .with_yaml_str(
                r#"
login_mode: cookie
cookies: "SESSDATA=abc"
limits:
  max_contents: 5
"#,
            )
            .load()
            .unwrap();

        assert_eq!(cfg.login_mode, LoginMode::Cookie);
        assert_eq!(cfg.cookies, "SESSDATA=abc");
        assert_eq!(cfg.limits.max_contents, 5);
        // Untouched fields keep defaults.
        assert_eq!(cfg.limits.zhihu_comments, 20);
        assert_eq!(cfg.crawl_interval, 1.5);
    }

    #[test]
    fn env_placeholders_expand_in_strings() {
        temp_env::with_var("CHORUS_TEST_COOKIE", Some("tok=1"), || {
            let cfg = ChorusConfigLoader::new()
                .with_yaml_str("cookies: \"${CHORUS_TEST_COOKIE}; extra=2\"")
                .load()
                .unwrap();
            assert_eq!(cfg.cookies, "tok=1; extra=2");
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST_ANYWHERE}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST_ANYWHERE}"));
    }

    #[test]
    fn expansion_recurses_and_terminates_on_cycles() {
        temp_env::with_vars([("CH_A", Some("${CH_B}")), ("CH_B", Some("${CH_A}"))], || {
            let mut v = json!("x=${CH_A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn missing_config_files_are_tolerated() {
        let cfg = ChorusConfigLoader::new()
            .with_file("/definitely/not/there/chorus.yaml")
            .load()
            .unwrap();
        assert_eq!(cfg, ChorusConfig::default());
    }
}
