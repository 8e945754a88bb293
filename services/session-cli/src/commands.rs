//! Session commands
//!
//! Each command operates on the namespace blob through `KeyedStore` and
//! returns the text to print.

use implicit_auth::{KeyedStore, generate_token};
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};

pub const USAGE: &str = "\
usage: implicit-session [--config <path>] <command>

commands:
  token              print a fresh state/nonce token
  show [key]         print the session blob, or one key of it
  set <key> <json>   store a JSON value under key
  clear [key]        remove one key, or the whole session blob
  logout             remove the whole session blob";

/// A parsed CLI command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Token,
    Show { key: Option<String> },
    Set { key: String, value: Value },
    Clear { key: Option<String> },
    Logout,
}

impl Command {
    /// Parse the positional arguments that follow the global flags.
    pub fn parse(args: &[String]) -> Result<Self> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| Error::Usage("missing command".into()))?;

        let command = match (name.as_str(), rest) {
            ("token", []) => Command::Token,
            ("show", []) => Command::Show { key: None },
            ("show", [key]) => Command::Show {
                key: Some(key.clone()),
            },
            ("set", [key, value]) => Command::Set {
                key: key.clone(),
                value: serde_json::from_str(value)?,
            },
            ("clear", []) => Command::Clear { key: None },
            ("clear", [key]) => Command::Clear {
                key: Some(key.clone()),
            },
            ("logout", []) => Command::Logout,
            ("token" | "show" | "set" | "clear" | "logout", _) => {
                return Err(Error::Usage(format!("wrong arguments for `{name}`")));
            }
            _ => return Err(Error::Usage(format!("unknown command: {name}"))),
        };
        Ok(command)
    }

    /// Run against `store`, returning the output to print.
    pub fn run(&self, store: &KeyedStore) -> Result<String> {
        match self {
            Command::Token => Ok(generate_token()),
            Command::Show { key: None } => Ok(pretty(&Value::Object(store.try_retrieve_all()?))),
            Command::Show { key: Some(key) } => {
                Ok(pretty(&store.try_retrieve_one(key)?.unwrap_or(Value::Null)))
            }
            Command::Set { key, value } => {
                store.store(key, value.clone())?;
                info!(key = %key, "stored value");
                Ok(format!("stored `{key}`"))
            }
            Command::Clear { key: Some(key) } => {
                store.clear_key(key)?;
                info!(key = %key, "cleared key");
                Ok(format!("cleared `{key}`"))
            }
            Command::Clear { key: None } | Command::Logout => {
                store.clear()?;
                info!(namespace = store.namespace(), "cleared session");
                Ok("session cleared".to_string())
            }
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
