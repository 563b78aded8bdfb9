//! Parsed Command Arguments
//!
//! Commands are resolved at runtime, so their options are not known to the
//! top-level parser. Everything after the command name is parsed here into
//! positionals plus a flag map, in the same shape plugins have always
//! received (`_` for positionals, one key per option).

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Flags that never consume the following argument as their value.
const BOOLEAN_FLAGS: &[&str] = &[
    "h",
    "help",
    "debug",
    "silent",
    "disable-check",
    "auto-update",
    "version",
    "v",
];

/// Arguments handed to a command handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    positional: Vec<String>,
    flags: BTreeMap<String, Value>,
    raw: Vec<String>,
}

impl ParsedArgs {
    /// Parse raw arguments (excluding the command name).
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let raw: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut parsed = ParsedArgs {
            raw: raw.clone(),
            ..Default::default()
        };

        let mut iter = raw.into_iter().peekable();
        while let Some(arg) = iter.next() {
            if arg == "--" {
                parsed.positional.extend(iter.by_ref());
                break;
            }

            if let Some(long) = arg.strip_prefix("--") {
                if let Some((key, value)) = long.split_once('=') {
                    parsed.set(key, Value::String(value.to_string()));
                } else if let Some(negated) = long.strip_prefix("no-") {
                    parsed.set(negated, Value::Bool(false));
                } else if !BOOLEAN_FLAGS.contains(&long)
                    && iter.peek().is_some_and(|next| !next.starts_with('-'))
                {
                    let value = iter.next().unwrap_or_default();
                    parsed.set(long, Value::String(value));
                } else {
                    parsed.set(long, Value::Bool(true));
                }
                continue;
            }

            if let Some(short) = arg.strip_prefix('-').filter(|s| !s.is_empty()) {
                let mut letters: Vec<char> = short.chars().collect();
                let last = letters.pop().unwrap_or('-');
                for letter in &letters {
                    parsed.set(&letter.to_string(), Value::Bool(true));
                }
                let key = last.to_string();
                if !BOOLEAN_FLAGS.contains(&key.as_str())
                    && iter.peek().is_some_and(|next| !next.starts_with('-'))
                {
                    let value = iter.next().unwrap_or_default();
                    parsed.set(&key, Value::String(value));
                } else {
                    parsed.set(&key, Value::Bool(true));
                }
                continue;
            }

            parsed.positional.push(arg);
        }

        parsed
    }

    fn set(&mut self, key: &str, value: Value) {
        self.flags.insert(key.to_string(), value);
    }

    /// Positional arguments (`_`).
    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    /// The arguments exactly as typed, for pass-through to subprocesses.
    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    /// Raw value of an option, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.flags.get(key)
    }

    /// String value of an option, if it was given one.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.flags.get(key).and_then(Value::as_str)
    }

    /// Whether a flag is set. `--x false` and `--no-x` count as unset.
    pub fn flag(&self, key: &str) -> bool {
        match self.flags.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s != "false",
            Some(_) => true,
            None => false,
        }
    }

    /// `-h` / `--help` was requested.
    pub fn wants_help(&self) -> bool {
        self.flag("h") || self.flag("help")
    }

    /// The minimist-shaped JSON object (`{"_": [...], "key": value}`).
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "_".to_string(),
            Value::Array(self.positional.iter().cloned().map(Value::String).collect()),
        );
        for (key, value) in &self.flags {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positionals_and_long_options() {
        let args = ParsedArgs::parse(["lint", "--fix", "src", "--max=3"]);
        assert_eq!(args.positional(), &["lint".to_string()]);
        assert_eq!(args.get_str("fix"), Some("src"));
        assert_eq!(args.get_str("max"), Some("3"));
    }

    #[test]
    fn test_boolean_flags_do_not_consume_values() {
        let args = ParsedArgs::parse(["--debug", "target", "-h"]);
        assert!(args.flag("debug"));
        assert!(args.wants_help());
        assert_eq!(args.positional(), &["target".to_string()]);
    }

    #[test]
    fn test_negation_and_bundled_shorts() {
        let args = ParsedArgs::parse(["--no-color", "-abc"]);
        assert!(!args.flag("color"));
        assert!(args.get("color").is_some());
        assert!(args.flag("a"));
        assert!(args.flag("b"));
        assert!(args.flag("c"));
    }

    #[test]
    fn test_double_dash_stops_parsing() {
        let args = ParsedArgs::parse(["--", "--not-a-flag", "x"]);
        assert_eq!(
            args.positional(),
            &["--not-a-flag".to_string(), "x".to_string()]
        );
        assert!(args.get("not-a-flag").is_none());
    }

    #[test]
    fn test_raw_preserved() {
        let input = ["build", "--env", "prod"];
        let args = ParsedArgs::parse(input);
        assert_eq!(args.raw(), &input.map(String::from));
    }

    #[test]
    fn test_to_json_shape() {
        let args = ParsedArgs::parse(["one", "--name", "two"]);
        let json = args.to_json();
        assert_eq!(json["_"], serde_json::json!(["one"]));
        assert_eq!(json["name"], serde_json::json!("two"));
    }
}
