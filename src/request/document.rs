use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::request::RequestError;

/// A JSON document on disk and the schema it has to satisfy
pub struct Document {
    pub path: PathBuf,
    pub compiled_schema: JSONSchema,
}

impl Document {
    /// Read, validate, and deserialise the document
    pub fn read<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        let json: Value = self.parse_untyped_json()?;

        match self.validate(&json) {
            Ok(_) => {
                info!("{} is valid", self.path.display());
                self.parse_json(json)
            }
            Err(err) => {
                warn!("{} fails validation", self.path.display());
                Err(err)
            }
        }
    }

    fn validate(&self, json: &Value) -> Result<(), RequestError> {
        info!("Validating {} against JSON schema", self.path.display());
        self.compiled_schema.validate(json).map_err(|errors| RequestError::Validation {
            path: self.display_path(),
            errors: errors.map(|err| format!("{}: {}", err.instance_path, err)).collect(),
        })
    }

    fn read_file(&self) -> Result<String, RequestError> {
        let path: &Path = self.path.as_path();
        info!("Reading {}", path.display());
        fs::read_to_string(path).map_err(|source| {
            warn!("Can't read {}: {}", path.display(), source);
            RequestError::Read { path: self.display_path(), source }
        })
    }

    fn parse_json<T: DeserializeOwned>(&self, value: Value) -> Result<T, RequestError> {
        info!("Deserialising valid JSON into typed Rust object");
        serde_json::from_value::<T>(value)
            .map_err(|source| RequestError::Deserialise { path: self.display_path(), source })
    }

    fn parse_untyped_json(&self) -> Result<Value, RequestError> {
        let json_string = self.read_file()?;
        // from_str is a generic function, so request Value (generic json) specifically
        serde_json::from_str::<Value>(&json_string)
            .map_err(|source| RequestError::Decode { path: self.display_path(), source })
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}
