//! Loaded server modules and their argument strings.
//!
//! Module arguments travel as a single string of `key=value` pairs separated
//! by whitespace.  Values containing whitespace are quoted:
//!
//! ```text
//! sink_name=tunnel server=10.0.0.2 sink_properties="device.description='Living Room'"
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::proplist::Proplist;
use crate::domain::Record;
use crate::protocol::fields::Fields;
use crate::protocol::tagstruct::{DecodeError, Value};

// ── Arguments ─────────────────────────────────────────────────────────────────

/// Ordered `key=value` arguments for loading a module.
///
/// # Examples
///
/// ```rust
/// use pulse_proto::domain::ModuleArguments;
///
/// let args = ModuleArguments::new()
///     .arg("sink_name", "null")
///     .arg("sink_properties", "device.description=Null Output");
/// assert_eq!(
///     args.to_string(),
///     "sink_name=null sink_properties=\"device.description=Null Output\""
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleArguments {
    entries: Vec<(String, String)>,
}

impl ModuleArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets `key`, replacing an earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses an argument string.
    ///
    /// Quoting follows the server: `'...'` and `"..."` group whitespace, a
    /// backslash escapes the next character.  A bare word without `=` is kept
    /// as a key with an empty value.
    pub fn parse(input: &str) -> Self {
        let mut args = ModuleArguments::new();
        let mut chars = input.chars().peekable();
        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            if chars.peek().is_none() {
                break;
            }
            let mut key = String::new();
            while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
                key.push(c);
            }
            let mut value = String::new();
            if chars.next_if_eq(&'=').is_some() {
                let mut quote: Option<char> = None;
                while let Some(&c) = chars.peek() {
                    match (quote, c) {
                        (None, c) if c.is_whitespace() => break,
                        (None, '\'' | '"') => quote = Some(c),
                        (Some(q), c) if c == q => quote = None,
                        (_, '\\') => {
                            chars.next();
                            if let Some(escaped) = chars.peek().copied() {
                                value.push(escaped);
                            } else {
                                break;
                            }
                        }
                        (_, c) => value.push(c),
                    }
                    chars.next();
                }
            }
            args.insert(key, value);
        }
        args
    }
}

impl fmt::Display for ModuleArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '\\') {
                write!(f, "{key}=\"")?;
                for c in value.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\"")?;
            } else {
                write!(f, "{key}={value}")?;
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ModuleArguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = ModuleArguments::new();
        for (k, v) in iter {
            args.insert(k, v);
        }
        args
    }
}

// ── Module record ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub index: u32,
    pub name: String,
    pub argument: Option<String>,
    /// Number of users, `None` when the server does not track it.
    pub n_used: Option<u32>,
    /// Protocol 15+.
    pub proplist: Proplist,
}

impl ModuleInfo {
    /// The argument string split into key/value pairs.
    pub fn arguments(&self) -> ModuleArguments {
        self.argument
            .as_deref()
            .map(ModuleArguments::parse)
            .unwrap_or_default()
    }

    pub fn description(&self) -> Option<&str> {
        self.proplist
            .get_str(crate::domain::proplist::keys::MODULE_DESCRIPTION)
    }
}

impl Record for ModuleInfo {
    fn decode(fields: &mut Fields<'_>, version: u32) -> Result<Self, DecodeError> {
        let index = fields.u32("index")?;
        let name = fields.required_string("name")?;
        let argument = fields.string("argument")?;
        let n_used = fields.index("n_used")?;
        let proplist = if version < 15 {
            // autoload flag, long gone from the server
            fields.boolean("auto_unload")?;
            Proplist::new()
        } else {
            fields.proplist("proplist")?
        };
        Ok(ModuleInfo {
            index,
            name,
            argument,
            n_used,
            proplist,
        })
    }

    fn encode(&self, out: &mut Vec<Value>, version: u32) {
        out.push(Value::U32(self.index));
        out.push(Value::string(self.name.as_str()));
        out.push(Value::String(self.argument.clone()));
        out.push(crate::domain::opt_index(self.n_used));
        if version < 15 {
            out.push(Value::Boolean(false));
        } else {
            out.push(Value::Proplist(self.proplist.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decode_records;

    #[test]
    fn test_parse_simple_arguments() {
        let args = ModuleArguments::parse("sink_name=null rate=48000");
        assert_eq!(args.get("sink_name"), Some("null"));
        assert_eq!(args.get("rate"), Some("48000"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_parse_quoted_values_keep_whitespace() {
        // Arrange
        let input = "sink_properties=\"device.description='Living Room'\"  server=10.0.0.2";

        // Act
        let args = ModuleArguments::parse(input);

        // Assert
        assert_eq!(
            args.get("sink_properties"),
            Some("device.description='Living Room'")
        );
        assert_eq!(args.get("server"), Some("10.0.0.2"));
    }

    #[test]
    fn test_parse_backslash_escape_and_bare_key() {
        let args = ModuleArguments::parse(r#"a=x\"y flag"#);
        assert_eq!(args.get("a"), Some("x\"y"));
        assert_eq!(args.get("flag"), Some(""));
    }

    #[test]
    fn test_display_quotes_only_when_needed() {
        let args = ModuleArguments::new()
            .arg("plain", "v")
            .arg("spaced", "a b")
            .arg("empty", "");
        assert_eq!(args.to_string(), "plain=v spaced=\"a b\" empty=\"\"");
    }

    #[test]
    fn test_display_then_parse_preserves_entries() {
        let args = ModuleArguments::new()
            .arg("k", "has \"quotes\" and \\slash")
            .arg("n", "1");
        assert_eq!(ModuleArguments::parse(&args.to_string()), args);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut args = ModuleArguments::new().arg("a", "1").arg("b", "2");
        args.insert("a", "3");
        let pairs: Vec<_> = args.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_module_records_before_version_15_carry_autoload_flag() {
        // Arrange
        let modules = vec![
            ModuleInfo {
                index: 0,
                name: "module-null-sink".to_string(),
                argument: Some("sink_name=null".to_string()),
                n_used: Some(1),
                proplist: Proplist::new(),
            },
            ModuleInfo {
                index: 1,
                name: "module-native-protocol-unix".to_string(),
                argument: None,
                n_used: None,
                proplist: Proplist::new(),
            },
        ];
        let mut values = Vec::new();
        for m in &modules {
            m.encode(&mut values, 14);
        }

        // Act
        let decoded: Vec<ModuleInfo> = decode_records(&values, 14).unwrap();

        // Assert
        assert_eq!(decoded, modules);
        assert_eq!(decoded[0].arguments().get("sink_name"), Some("null"));
        assert!(decoded[1].arguments().is_empty());
    }
}
