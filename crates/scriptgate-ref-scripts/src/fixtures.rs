//! Reference script directories and fictional fare data.
//!
//! Everything here is hardcoded. No airline or loyalty system is contacted;
//! the fare table stands in for a scraped award-availability page.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_json::{json, Value};

use scriptgate_contracts::{
    error::{ScriptGateError, ScriptGateResult},
    manifest::MANIFEST_FILE,
};

pub const AWARD_SEARCH: &str = "award-search";
pub const FARE_PREVIEW: &str = "fare-preview";
pub const FLAKY_CHECKOUT: &str = "flaky-checkout";
pub const LOYALTY_SUMMARY: &str = "loyalty-summary";

const INPUTS_SCHEMA_FILE: &str = "inputs.schema.json";
const OUTPUTS_SCHEMA_FILE: &str = "outputs.schema.json";
const ENTRYPOINT_FILE: &str = "script.rs";

// ── Fare table (mock) ────────────────────────────────────────────────────────

/// Award fares between two airports.
///
/// Known routes (order-independent):
/// - SFO ↔ NRT: two saver fares
/// - JFK ↔ LHR: one standard fare
///
/// Any other pair has no availability.
pub fn award_fares(origin: &str, destination: &str) -> Vec<Value> {
    let a = origin.to_ascii_uppercase();
    let b = destination.to_ascii_uppercase();
    let is_route = |x: &str, y: &str| (a == x && b == y) || (a == y && b == x);

    if is_route("SFO", "NRT") {
        vec![
            json!({ "flight": "UA837", "cabin": "business", "miles": 88000, "taxes_usd": 5.6 }),
            json!({ "flight": "NH7", "cabin": "business", "miles": 75000, "taxes_usd": 42.1 }),
        ]
    } else if is_route("JFK", "LHR") {
        vec![json!({ "flight": "BA178", "cabin": "economy", "miles": 30000, "taxes_usd": 198.4 })]
    } else {
        Vec::new()
    }
}

// ── Script directories ───────────────────────────────────────────────────────

/// A script directory's contract files.
#[derive(Debug, Clone)]
pub struct ScriptFixture {
    pub manifest: Value,
    pub inputs_schema: Value,
    pub outputs_schema: Value,
}

impl ScriptFixture {
    fn new(id: &str, extra: Value, outputs_schema: Value) -> Self {
        let mut manifest = json!({
            "id": id,
            "version": "1.0.0",
            "entrypoint": ENTRYPOINT_FILE,
            "inputs_schema": INPUTS_SCHEMA_FILE,
            "outputs_schema": OUTPUTS_SCHEMA_FILE
        });
        if let (Some(manifest), Some(extra)) = (manifest.as_object_mut(), extra.as_object()) {
            manifest.extend(extra.clone());
        }
        Self { manifest, inputs_schema: route_inputs_schema(), outputs_schema }
    }

    /// Write the fixture into `root/<script id>` and return that directory.
    pub fn write(&self, root: &Path) -> ScriptGateResult<PathBuf> {
        let id = self.manifest["id"].as_str().unwrap_or("script");
        let dir = root.join(id);
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

        write_json(&dir.join(MANIFEST_FILE), &self.manifest)?;
        write_json(&dir.join(INPUTS_SCHEMA_FILE), &self.inputs_schema)?;
        write_json(&dir.join(OUTPUTS_SCHEMA_FILE), &self.outputs_schema)?;

        // Registered scripts run in-process; the file only has to exist.
        let entrypoint = dir.join(ENTRYPOINT_FILE);
        fs::write(&entrypoint, format!("// body registered in-process for {id}\n"))
            .map_err(|e| io_error(&entrypoint, e))?;
        Ok(dir)
    }
}

/// Browser-driven award search behind an airline login with 2FA.
pub fn award_search() -> ScriptFixture {
    ScriptFixture::new(
        AWARD_SEARCH,
        json!({
            "description": "Search award availability on the airline site",
            "permissions": { "browser": true, "network_domains": ["united.com"] },
            "requires_human_steps": ["Enter 2FA code"]
        }),
        fares_outputs_schema(),
    )
}

/// A preview that answers from canned data instead of the live site.
pub fn fare_preview() -> ScriptFixture {
    ScriptFixture::new(FARE_PREVIEW, json!({}), fares_outputs_schema())
}

/// A checkout script whose body always fails.
pub fn flaky_checkout() -> ScriptFixture {
    ScriptFixture::new(
        FLAKY_CHECKOUT,
        json!({ "security": { "risk_level": "low" } }),
        fares_outputs_schema(),
    )
}

/// A summary whose outputs schema demands a `total` the body never returns.
pub fn loyalty_summary() -> ScriptFixture {
    ScriptFixture::new(
        LOYALTY_SUMMARY,
        json!({}),
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "summary": { "type": "string" },
                "total": { "type": "integer", "minimum": 0 }
            },
            "required": ["summary", "total"]
        }),
    )
}

/// Every reference fixture.
pub fn all() -> Vec<ScriptFixture> {
    vec![award_search(), fare_preview(), flaky_checkout(), loyalty_summary()]
}

fn route_inputs_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "origin": { "type": "string", "pattern": "^[A-Za-z]{3}$" },
            "destination": { "type": "string", "pattern": "^[A-Za-z]{3}$" },
            "credential_refs": { "type": "object" }
        },
        "required": ["origin", "destination"]
    })
}

fn fares_outputs_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "fares": { "type": "array" },
            "mode": { "type": "string" },
            "warnings": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["summary", "fares"]
    })
}

fn write_json(path: &Path, value: &Value) -> ScriptGateResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| ScriptGateError::Config {
        reason: format!("cannot encode '{}': {e}", path.display()),
    })?;
    fs::write(path, text).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, e: std::io::Error) -> ScriptGateError {
    ScriptGateError::Config { reason: format!("cannot write fixture '{}': {e}", path.display()) }
}
