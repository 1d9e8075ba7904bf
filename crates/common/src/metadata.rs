// Provenance record for the plot currently loaded in the annotator.
//
// Stored as `current_meta.json`; older `*_meta.json` files share the same shape.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

const SOURCE: &str = "source";
const NAME: &str = "name";
const SOURCE_SCRIPT: &str = "source_script";
const REGEN_CWD: &str = "regen_cwd";

/// Provenance of a plot: where the image came from and which script drew it.
///
/// Keys the server does not know about are carried through `extra` so a
/// read-modify-write cycle never drops them. A known key holding something
/// other than a string is kept in `extra` too, and is replaced the next time
/// that key is written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataRecord {
    /// Absolute path to the original plot image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Logical name, usually the plot or script basename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Absolute path to the script inferred to have produced the plot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_script: Option<String>,
    /// Project root the script should be re-run from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regen_cwd: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<'de> Deserialize<'de> for MetadataRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut extra: Map<String, Value> = Map::deserialize(deserializer)?;
        Ok(Self {
            source: take_string(&mut extra, SOURCE),
            name: take_string(&mut extra, NAME),
            source_script: take_string(&mut extra, SOURCE_SCRIPT),
            regen_cwd: take_string(&mut extra, REGEN_CWD),
            extra,
        })
    }
}

/// Remove `key` from `map` if it holds a string.
fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    if !map.get(key).is_some_and(Value::is_string) {
        return None;
    }
    match map.remove(key) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}

impl MetadataRecord {
    /// A fresh record pointing at `source`. Replaces whatever was there
    /// before; used by the refresh and set-source flows.
    pub fn for_source(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Merge the outcome of a script search into this record.
    ///
    /// `regen_cwd` is only overwritten when a project root was found for the
    /// script; every other key is left untouched.
    pub fn merge_script(
        &mut self,
        name: impl Into<String>,
        script: impl Into<String>,
        regen_cwd: Option<String>,
    ) {
        self.name = Some(name.into());
        self.extra.remove(NAME);
        self.source_script = Some(script.into());
        self.extra.remove(SOURCE_SCRIPT);
        if regen_cwd.is_some() {
            self.regen_cwd = regen_cwd;
            self.extra.remove(REGEN_CWD);
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
