/// Typed key/value configuration: a default key set, optional list
/// keys, keyed mutation prefixes (`enable-`, `add-`, ...), and value
/// interpolation in defaults.
use hashbrown::HashMap;

use crate::error::{Error, ErrorKind, Result};

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum KeyType {
    StringKey,
    IntKey,
    BoolKey,
    ListKey,
}

struct KeyInfo {
    kin_type: KeyType,
    kin_default: &'static str,
}

// (name, type, default). A default may interpolate other keys with
// <key>, paths with <a/b>, concatenation with <a:b>, the directory
// of a file key with <a^b>, and environment variables with
// <$VAR|fallback>. A "!" default expands to a built-in: !lang and
// !encoding resolve through the corresponding key.
const DEFAULT_KEYS: &[(&str, KeyType, &str)] = &[
    ("lang", KeyType::StringKey, "en_US"),
    ("actual-lang", KeyType::StringKey, ""),
    ("encoding", KeyType::StringKey, "utf-8"),
    ("data-dir", KeyType::StringKey, "."),
    ("dict-dir", KeyType::StringKey, "<data-dir>"),
    ("home-dir", KeyType::StringKey, "<$HOME|.>"),
    ("personal", KeyType::StringKey, "<lang>.pws"),
    ("personal-path", KeyType::StringKey, "<home-dir/personal>"),
    ("repl", KeyType::StringKey, "<lang>.prepl"),
    ("repl-path", KeyType::StringKey, "<home-dir/repl>"),
    ("master", KeyType::StringKey, "!lang"),
    ("module", KeyType::StringKey, "default"),
    ("size", KeyType::StringKey, "+60"),
    ("variety", KeyType::ListKey, ""),
    ("mode", KeyType::StringKey, "none"),
    ("filter", KeyType::ListKey, ""),
    ("extra-dicts", KeyType::ListKey, ""),
    ("run-together", KeyType::BoolKey, "false"),
    ("run-together-limit", KeyType::IntKey, "8"),
    ("run-together-min", KeyType::IntKey, "3"),
    ("ignore-case", KeyType::BoolKey, "false"),
    ("ignore-accents", KeyType::BoolKey, "false"),
    ("span-strings", KeyType::BoolKey, "false"),
    ("norm-strict", KeyType::BoolKey, "false"),
    ("validate-words", KeyType::BoolKey, "true"),
    ("validate-affixes", KeyType::BoolKey, "true"),
    ("clean-words", KeyType::BoolKey, "false"),
    ("clean-affixes", KeyType::BoolKey, "true"),
    ("skip-invalid-words", KeyType::BoolKey, "true"),
];

pub struct Config {
    cfg_keys: HashMap<String, KeyInfo>,
    cfg_values: HashMap<String, String>,
    cfg_lists: HashMap<String, Vec<String>>,
}

impl Config {
    pub fn new() -> Config {
        let mut keys = HashMap::new();
        for (name, ktype, default) in DEFAULT_KEYS {
            keys.insert(
                name.to_string(),
                KeyInfo {
                    kin_type: *ktype,
                    kin_default: default,
                },
            );
        }
        Config {
            cfg_keys: keys,
            cfg_values: HashMap::new(),
            cfg_lists: HashMap::new(),
        }
    }

    /// Registers an extra key, as filter modules do.
    pub fn add_key(&mut self, name: &str, ktype: KeyType, default: &'static str) {
        self.cfg_keys.insert(
            name.to_string(),
            KeyInfo {
                kin_type: ktype,
                kin_default: default,
            },
        );
    }

    pub fn have(&self, key: &str) -> bool {
        self.cfg_values.contains_key(key) || self.cfg_lists.contains_key(key)
    }

    fn key_info(&self, key: &str) -> Result<&KeyInfo> {
        self.cfg_keys.get(key).ok_or_else(|| {
            Error::new(
                ErrorKind::UnknownKey,
                format!("The key \"{}\" is unknown.", key),
            )
        })
    }

    /// Applies one `key` / `value` pair, honoring the mutation
    /// prefixes. A boolean prefix given an explicit value is an
    /// error since the prefix already carries the value.
    pub fn replace(&mut self, key: &str, value: &str) -> Result<()> {
        for (prefix, bool_value) in [("enable-", "true"), ("disable-", "false"), ("dont-", "false")]
        {
            if let Some(base) = key.strip_prefix(prefix) {
                if !value.is_empty() {
                    return Err(Error::new(
                        ErrorKind::IdenticalOption,
                        format!("The key \"{}\" already carries its value.", key),
                    ));
                }
                return self.set_scalar(base, bool_value);
            }
        }
        if let Some(base) = key.strip_prefix("reset-") {
            self.key_info(base)?;
            self.cfg_values.remove(base);
            self.cfg_lists.remove(base);
            return Ok(());
        }
        if let Some(base) = key.strip_prefix("clear-") {
            self.list_info(base)?;
            self.cfg_lists.insert(base.to_string(), Vec::new());
            return Ok(());
        }
        if let Some(base) = key.strip_prefix("lset-") {
            self.list_info(base)?;
            self.cfg_lists
                .insert(base.to_string(), vec![value.to_string()]);
            return Ok(());
        }
        if let Some(base) = key.strip_prefix("add-") {
            self.list_info(base)?;
            let list = self.cfg_lists.entry(base.to_string()).or_default();
            if !list.iter().any(|v| v == value) {
                list.push(value.to_string());
            }
            return Ok(());
        }
        for prefix in ["remove-", "rem-"] {
            if let Some(base) = key.strip_prefix(prefix) {
                self.list_info(base)?;
                if let Some(list) = self.cfg_lists.get_mut(base) {
                    list.retain(|v| v != value);
                }
                return Ok(());
            }
        }
        self.set_scalar(key, value)
    }

    fn list_info(&self, key: &str) -> Result<()> {
        let info = self.key_info(key)?;
        if info.kin_type != KeyType::ListKey {
            return Err(Error::new(
                ErrorKind::KeyNotList,
                format!("The key \"{}\" is not a list.", key),
            ));
        }
        Ok(())
    }

    fn set_scalar(&mut self, key: &str, value: &str) -> Result<()> {
        let info = self.key_info(key)?;
        match info.kin_type {
            KeyType::BoolKey => {
                if value != "true" && value != "false" {
                    return Err(Error::new(
                        ErrorKind::KeyNotBool,
                        format!("The value \"{}\" is not boolean for key \"{}\".", value, key),
                    ));
                }
            }
            KeyType::IntKey => {
                if value.parse::<i64>().is_err() {
                    return Err(Error::new(
                        ErrorKind::KeyNotInt,
                        format!("The value \"{}\" is not a number for key \"{}\".", value, key),
                    ));
                }
            }
            KeyType::ListKey => {
                self.cfg_lists
                    .insert(key.to_string(), vec![value.to_string()]);
                return Ok(());
            }
            KeyType::StringKey => {}
        }
        self.cfg_values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn retrieve(&self, key: &str) -> Result<String> {
        let info = self.key_info(key)?;
        if info.kin_type == KeyType::ListKey {
            return Err(Error::new(
                ErrorKind::KeyNotString,
                format!("The key \"{}\" is a list.", key),
            ));
        }
        let raw = match self.cfg_values.get(key) {
            Some(v) => v.clone(),
            None => info.kin_default.to_string(),
        };
        if let Some(special) = raw.strip_prefix('!') {
            return match special {
                "lang" => self.retrieve("lang"),
                "encoding" => self.retrieve("encoding"),
                _ => Err(Error::new(
                    ErrorKind::BadValue,
                    format!("The special default \"{}\" is unknown.", raw),
                )),
            };
        }
        self.expand(&raw)
    }

    pub fn retrieve_bool(&self, key: &str) -> Result<bool> {
        let info = self.key_info(key)?;
        if info.kin_type != KeyType::BoolKey {
            return Err(Error::new(
                ErrorKind::KeyNotBool,
                format!("The key \"{}\" is not boolean.", key),
            ));
        }
        Ok(self.retrieve(key)? == "true")
    }

    pub fn retrieve_int(&self, key: &str) -> Result<i64> {
        let info = self.key_info(key)?;
        if info.kin_type != KeyType::IntKey {
            return Err(Error::new(
                ErrorKind::KeyNotInt,
                format!("The key \"{}\" is not an integer.", key),
            ));
        }
        let value = self.retrieve(key)?;
        value.parse::<i64>().map_err(|_| {
            Error::new(
                ErrorKind::BadValue,
                format!("The value \"{}\" is not a number.", value),
            )
        })
    }

    pub fn retrieve_list(&self, key: &str) -> Result<Vec<String>> {
        let info = self.key_info(key)?;
        if info.kin_type != KeyType::ListKey {
            return Err(Error::new(
                ErrorKind::KeyNotList,
                format!("The key \"{}\" is not a list.", key),
            ));
        }
        Ok(self.cfg_lists.get(key).cloned().unwrap_or_default())
    }

    // Expands <...> forms inside a default value.
    fn expand(&self, raw: &str) -> Result<String> {
        let mut out = String::new();
        let mut rest = raw;
        while let Some(open) = rest.find('<') {
            out.push_str(&rest[..open]);
            let close = rest[open..].find('>').map(|c| open + c).ok_or_else(|| {
                Error::new(
                    ErrorKind::BadValue,
                    format!("Unbalanced '<' in \"{}\".", raw),
                )
            })?;
            let inner = &rest[open + 1..close];
            out.push_str(&self.expand_form(inner)?);
            rest = &rest[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn expand_form(&self, inner: &str) -> Result<String> {
        if let Some(env_form) = inner.strip_prefix('$') {
            let (var, fallback) = match env_form.split_once('|') {
                Some((v, f)) => (v, f),
                None => (env_form, ""),
            };
            return match std::env::var(var) {
                Ok(value) => Ok(value),
                Err(_) => self.expand_part(fallback),
            };
        }
        if let Some((a, b)) = inner.split_once('^') {
            let file = self.expand_part(a)?;
            let dir = match file.rfind('/') {
                Some(ix) => file[..ix].to_string(),
                None => ".".to_string(),
            };
            if b.is_empty() {
                return Ok(dir);
            }
            return Ok(format!("{}/{}", dir, self.expand_part(b)?));
        }
        if let Some((a, b)) = inner.split_once('/') {
            return Ok(format!(
                "{}/{}",
                self.expand_part(a)?,
                self.expand_part(b)?
            ));
        }
        if let Some((a, b)) = inner.split_once(':') {
            return Ok(format!("{}{}", self.expand_part(a)?, self.expand_part(b)?));
        }
        self.retrieve(inner)
    }

    // A part is a key when one exists by that name, otherwise text.
    fn expand_part(&self, part: &str) -> Result<String> {
        if self.cfg_keys.contains_key(part) {
            self.retrieve(part)
        } else {
            Ok(part.to_string())
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_types_are_enforced() {
        let mut config = Config::new();
        config.replace("run-together", "true").unwrap();
        assert!(config.retrieve_bool("run-together").unwrap());
        let err = config.replace("run-together", "maybe").unwrap_err();
        assert!(err.is_a(ErrorKind::ConfigError));
        let err = config.replace("run-together-limit", "x").unwrap_err();
        assert_eq!(err.err_kind, ErrorKind::KeyNotInt);
        let err = config.replace("no-such-key", "x").unwrap_err();
        assert_eq!(err.err_kind, ErrorKind::UnknownKey);
    }

    #[test]
    fn boolean_prefixes() {
        let mut config = Config::new();
        config.replace("enable-run-together", "").unwrap();
        assert!(config.retrieve_bool("run-together").unwrap());
        config.replace("dont-run-together", "").unwrap();
        assert!(!config.retrieve_bool("run-together").unwrap());
        let err = config.replace("enable-run-together", "true").unwrap_err();
        assert_eq!(err.err_kind, ErrorKind::IdenticalOption);
    }

    #[test]
    fn list_prefixes() {
        let mut config = Config::new();
        config.replace("add-filter", "url").unwrap();
        config.replace("add-filter", "url").unwrap(); // no duplicates
        assert_eq!(config.retrieve_list("filter").unwrap(), vec!["url"]);
        config.replace("rem-filter", "url").unwrap();
        assert!(config.retrieve_list("filter").unwrap().is_empty());
        config.replace("lset-variety", "med").unwrap();
        assert_eq!(config.retrieve_list("variety").unwrap(), vec!["med"]);
        config.replace("clear-variety", "").unwrap();
        assert!(config.retrieve_list("variety").unwrap().is_empty());
        let err = config.replace("add-lang", "x").unwrap_err();
        assert_eq!(err.err_kind, ErrorKind::KeyNotList);
    }

    #[test]
    fn reset_restores_default() {
        let mut config = Config::new();
        config.replace("lang", "de_DE").unwrap();
        assert_eq!(config.retrieve("lang").unwrap(), "de_DE");
        config.replace("reset-lang", "").unwrap();
        assert_eq!(config.retrieve("lang").unwrap(), "en_US");
    }

    #[test]
    fn interpolation_forms() {
        let mut config = Config::new();
        config.replace("lang", "en_GB").unwrap();
        assert_eq!(config.retrieve("personal").unwrap(), "en_GB.pws");
        // <home-dir/personal> resolves both parts as keys
        config.replace("home-dir", "/tmp/u").unwrap();
        assert_eq!(
            config.retrieve("personal-path").unwrap(),
            "/tmp/u/en_GB.pws"
        );
        // <data-dir> inside dict-dir
        config.replace("data-dir", "/usr/share/spell").unwrap();
        assert_eq!(config.retrieve("dict-dir").unwrap(), "/usr/share/spell");
    }

    #[test]
    fn env_fallback_form() {
        let mut config = Config::new();
        config.add_key("probe", KeyType::StringKey, "<$ORTHOSPELL_NO_SUCH_VAR|lang>");
        config.replace("lang", "fr_FR").unwrap();
        // the fallback part names a key, so it resolves through it
        assert_eq!(config.retrieve("probe").unwrap(), "fr_FR");
    }

    #[test]
    fn bang_defaults() {
        let mut config = Config::new();
        config.replace("lang", "nl").unwrap();
        assert_eq!(config.retrieve("master").unwrap(), "nl");
    }

    #[test]
    fn directory_form() {
        let mut config = Config::new();
        config.add_key("wordlist", KeyType::StringKey, "/data/en/words.txt");
        config.add_key("nearby", KeyType::StringKey, "<wordlist^extra.txt>");
        assert_eq!(config.retrieve("nearby").unwrap(), "/data/en/extra.txt");
    }
}
