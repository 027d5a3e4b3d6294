use jsonschema::JSONSchema;
use serde_json::Value;

use crate::request::RequestError;

static PROFILE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/profile.json"));
static JOBS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/jobs.json"));

pub fn profile_schema() -> Result<JSONSchema, RequestError> {
    compile_schema("profile.json", PROFILE)
}

pub fn jobs_schema() -> Result<JSONSchema, RequestError> {
    compile_schema("jobs.json", JOBS)
}

/*
The bundled schemas only use local references (#/definitions/...), so no resolver is needed
*/
fn compile_schema(name: &'static str, text: &str) -> Result<JSONSchema, RequestError> {
    let schema: Value = serde_json::from_str(text)
        .map_err(|err| RequestError::Schema { name, reason: err.to_string() })?;
    JSONSchema::compile(&schema)
        .map_err(|err| RequestError::Schema { name, reason: err.to_string() })
}
