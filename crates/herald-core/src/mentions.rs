use std::collections::HashMap;

use log::warn;
use serde::Deserialize;

/// Chat identity of a GitHub user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    /// Chat user id, rendered as `<@id>`.
    pub id: String,
    /// Name shown when the user should not be pinged.
    pub display_name: String,
}

impl Mention {
    /// The chat mention token, e.g. `<@1234>`.
    pub fn tag(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// One value of the `DISCORD_MENTION` JSON object.
///
/// Older workflows map a login straight to the chat id; newer ones carry a
/// display name as well.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMention {
    Id(String),
    Full {
        id: String,
        #[serde(rename = "displayName", alias = "display_name")]
        display_name: Option<String>,
    },
}

/// Mapping from GitHub login to chat identity.
///
/// # Examples
///
/// ```
/// use herald_core::MentionDirectory;
///
/// let dir = MentionDirectory::from_json(r#"{"alice": "111", "bob": {"id": "222", "displayName": "Bob"}}"#).unwrap();
/// assert_eq!(dir.lookup("alice").tag(), "<@111>");
/// assert_eq!(dir.lookup("bob").display_name, "Bob");
/// assert_eq!(dir.lookup("carol").tag(), "<@carol>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MentionDirectory {
    entries: HashMap<String, Mention>,
}

impl MentionDirectory {
    /// Parse a directory from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the input is not an object of
    /// strings or `{id, displayName}` objects.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, RawMention> = serde_json::from_str(json)?;
        let entries = raw
            .into_iter()
            .map(|(login, value)| {
                let mention = match value {
                    RawMention::Id(id) => Mention {
                        display_name: id.clone(),
                        id,
                    },
                    RawMention::Full { id, display_name } => Mention {
                        display_name: display_name.unwrap_or_else(|| id.clone()),
                        id,
                    },
                };
                (login, mention)
            })
            .collect();
        Ok(Self { entries })
    }

    /// Parse a directory, degrading to an empty one on missing or malformed input.
    ///
    /// A broken mention table should not stop reminders from going out; the
    /// raw logins are used instead.
    pub fn from_json_lenient(json: Option<&str>) -> Self {
        let Some(json) = json.filter(|s| !s.trim().is_empty()) else {
            return Self::default();
        };
        match Self::from_json(json) {
            Ok(dir) => dir,
            Err(e) => {
                warn!("ignoring malformed mention directory: {e}");
                Self::default()
            }
        }
    }

    /// Resolve a login; unknown logins map to themselves.
    pub fn lookup(&self, login: &str) -> Mention {
        self.entries.get(login).cloned().unwrap_or_else(|| Mention {
            id: login.to_string(),
            display_name: login.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
