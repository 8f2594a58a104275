//! MIME database.
//!
//! Media types with their file extensions and compressibility, in the
//! format of [jshttp/mime-db](https://github.com/jshttp/mime-db). A subset of
//! the common types is embedded; [`MimeDb::from_path`] loads a full copy.
//!
//! Several types may claim the same extension. The IANA-registered one wins;
//! without one, the last type in database order does.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::Error;

const EMBEDDED: &str = include_str!("db.json");

#[derive(Debug, Deserialize)]
struct Descriptor {
    source: Option<String>,
    #[serde(default)]
    compressible: bool,
    #[serde(default)]
    extensions: Vec<String>,
}

/// Extension and compressibility lookups built from a mime-db table.
#[derive(Clone, Debug)]
pub struct MimeDb {
    by_extension: HashMap<String, String>,
    compressible: HashSet<String>,
}

impl MimeDb {
    /// The embedded database.
    pub fn load() -> Result<Self, Error> {
        Self::from_json(EMBEDDED)
    }

    /// A mime-db `db.json` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("MIME database {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let table: Map<String, Value> = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("MIME database: {e}")))?;

        // extension -> (type, from IANA), in database order
        let mut candidates: HashMap<String, Vec<(String, bool)>> = HashMap::new();
        let mut compressible = HashSet::new();
        for (name, descriptor) in table {
            let descriptor: Descriptor = serde_json::from_value(descriptor)
                .map_err(|e| Error::config(format!("MIME database entry {name}: {e}")))?;
            let iana = descriptor.source.as_deref() == Some("iana");
            for extension in descriptor.extensions {
                candidates.entry(extension).or_default().push((name.clone(), iana));
            }
            if descriptor.compressible {
                compressible.insert(name);
            }
        }

        let mut from_iana = Vec::new();
        let mut from_order = Vec::new();
        let by_extension: HashMap<String, String> = candidates
            .into_iter()
            .filter_map(|(extension, mut types)| {
                let chosen = if types.len() == 1 {
                    types.pop()
                } else if let Some(i) = types.iter().position(|(_, iana)| *iana) {
                    from_iana.push(extension.clone());
                    Some(types.swap_remove(i))
                } else {
                    from_order.push(extension.clone());
                    types.pop()
                };
                chosen.map(|(name, _)| (extension, name))
            })
            .collect();

        info!(extensions = by_extension.len(), compressible = compressible.len(), "MIME database loaded");
        from_iana.sort();
        from_order.sort();
        debug!(?from_iana, "MIME extensions with duplicates resolved to the IANA type");
        debug!(?from_order, "MIME extensions with duplicates resolved to the last type");

        Ok(Self { by_extension, compressible })
    }

    /// Media type by extension (without the dot), e.g. `"css" => "text/css"`.
    pub fn names_by_extension(&self) -> &HashMap<String, String> {
        &self.by_extension
    }

    /// Media types worth compressing.
    pub fn compressible(&self) -> &HashSet<String> {
        &self.compressible
    }

    pub fn lookup(&self, extension: &str) -> Option<&str> {
        self.by_extension.get(extension).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_database_loads() {
        let db = MimeDb::load().unwrap();
        assert_eq!(db.lookup("css"), Some("text/css"));
        assert_eq!(db.lookup("json"), Some("application/json"));
        assert_eq!(db.lookup("png"), Some("image/png"));
        assert!(db.compressible().contains("application/json"));
        assert!(db.compressible().contains("text/html"));
        assert!(!db.compressible().contains("image/png"));
    }

    #[test]
    fn duplicates_prefer_iana_then_last() {
        let db = MimeDb::load().unwrap();
        // audio/mp3 has no source, audio/mpeg is IANA
        assert_eq!(db.lookup("mp3"), Some("audio/mpeg"));
        // two IANA types: the first one wins
        assert_eq!(db.lookup("xml"), Some("application/xml"));
        assert_eq!(db.lookup("rtf"), Some("application/rtf"));
        // no IANA type at all
        assert_eq!(db.lookup("wav"), Some("audio/x-wav"));
    }

    #[test]
    fn order_of_the_file_decides() {
        let db = MimeDb::from_json(
            r#"{
                "z/first": { "extensions": ["dup"] },
                "a/second": { "extensions": ["dup"], "compressible": true }
            }"#,
        )
        .unwrap();
        assert_eq!(db.lookup("dup"), Some("a/second"));
        assert!(db.compressible().contains("a/second"));
    }

    #[test]
    fn unreadable_database_is_a_configuration_error() {
        assert!(matches!(MimeDb::from_json("[1, 2]"), Err(Error::Config(_))));
        assert!(matches!(MimeDb::from_json("{ nope"), Err(Error::Config(_))));
        assert!(matches!(MimeDb::from_path("/nonexistent/db.json"), Err(Error::Config(_))));
    }
}
