//! Observation records as uploaded to the dataset repository.

use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::table::Row;

/// Extension of the per-observation files.
pub const OBSERVATION_FILE_EXTENSION: &str = ".json";

/// One observation parsed from a single JSON file.
///
/// Only the deduplication key is inspected. Every other field is carried through
/// unchanged and becomes a column of the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    key: String,
    fields: Row,
}

impl Observation {
    /// Parses `bytes` as a single JSON object holding a string `key_column` field.
    ///
    /// `path` is only used for error details.
    pub fn parse(path: &str, bytes: &[u8], key_column: &str) -> SyncResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;

        let Value::Object(fields) = value else {
            bail!(
                ErrorKind::InvalidData,
                "Observation file does not hold a JSON object",
                path
            );
        };

        let key = match fields.get(key_column) {
            Some(Value::String(key)) => key.clone(),
            Some(_) => bail!(
                ErrorKind::InvalidData,
                "Observation deduplication key is not a string",
                format!("{path}: field `{key_column}`")
            ),
            None => bail!(
                ErrorKind::InvalidData,
                "Observation is missing its deduplication key",
                format!("{path}: field `{key_column}`")
            ),
        };

        Ok(Self { key, fields })
    }

    /// Returns the deduplication key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns all fields of the observation.
    pub fn fields(&self) -> &Row {
        &self.fields
    }

    /// Consumes the observation, returning it as a table row.
    pub fn into_row(self) -> Row {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_and_keeps_field_order() {
        let observation = Observation::parse(
            "a.json",
            br#"{"species": "orca", "image_md5": "h1", "count": 3}"#,
            "image_md5",
        )
        .unwrap();

        assert_eq!(observation.key(), "h1");
        let columns: Vec<_> = observation.fields().keys().collect();
        assert_eq!(columns, ["species", "image_md5", "count"]);
    }

    #[test]
    fn rejects_invalid_json() {
        let err = Observation::parse("a.json", b"{\"image_md5\": ", "image_md5").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }

    #[test]
    fn rejects_non_object_documents() {
        let err = Observation::parse("a.json", b"[1, 2]", "image_md5").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.detail(), Some("a.json"));
    }

    #[test]
    fn rejects_missing_or_non_string_key() {
        let missing = Observation::parse("a.json", br#"{"species": "orca"}"#, "image_md5");
        let numeric = Observation::parse("b.json", br#"{"image_md5": 42}"#, "image_md5");

        assert_eq!(missing.unwrap_err().kind(), ErrorKind::InvalidData);
        assert_eq!(numeric.unwrap_err().kind(), ErrorKind::InvalidData);
    }
}
