//! In-process bodies for the reference scripts.
//!
//! Each type implements `Runnable` and is registered under its fixture's
//! script id by [`registry`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use scriptgate_contracts::context::ScriptContext;
use scriptgate_core::{
    loader::ScriptRegistry,
    traits::{Runnable, ScriptFailure},
};

use crate::fixtures::{award_fares, AWARD_SEARCH, FARE_PREVIEW, FLAKY_CHECKOUT, LOYALTY_SUMMARY};

fn route(inputs: &Value) -> (String, String) {
    let field = |key: &str| inputs.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    (field("origin"), field("destination"))
}

/// Looks up award fares for the requested route.
///
/// Logging in needs the `password` credential; without it the script still
/// answers but warns that availability may be incomplete.
pub struct AwardSearchScript;

#[async_trait]
impl Runnable for AwardSearchScript {
    async fn run(&self, context: ScriptContext, inputs: Value) -> Result<Value, ScriptFailure> {
        let (origin, destination) = route(&inputs);
        let fares = award_fares(&origin, &destination);

        let mut warnings = Vec::new();
        if !context.credentials.contains_key("password") {
            warnings.push("not logged in; member-only fares are not shown".to_string());
        }

        Ok(json!({
            "summary": format!("{} award fare(s) {origin} → {destination}", fares.len()),
            "fares": fares,
            "warnings": warnings
        }))
    }
}

/// Answers from canned data and says so.
pub struct FarePreviewScript;

#[async_trait]
impl Runnable for FarePreviewScript {
    async fn run(&self, _context: ScriptContext, inputs: Value) -> Result<Value, ScriptFailure> {
        let (origin, destination) = route(&inputs);
        Ok(json!({
            "summary": format!("sample fares {origin} → {destination}"),
            "fares": [{ "flight": "XX000", "cabin": "economy", "miles": 0 }],
            "mode": "placeholder"
        }))
    }
}

/// Always fails.
pub struct FlakyCheckoutScript;

#[async_trait]
impl Runnable for FlakyCheckoutScript {
    async fn run(&self, _context: ScriptContext, _inputs: Value) -> Result<Value, ScriptFailure> {
        Err(ScriptFailure::new("boom"))
    }
}

/// Returns a summary without the `total` its outputs schema requires.
pub struct LoyaltySummaryScript;

#[async_trait]
impl Runnable for LoyaltySummaryScript {
    async fn run(&self, context: ScriptContext, _inputs: Value) -> Result<Value, ScriptFailure> {
        Ok(json!({ "summary": format!("loyalty balance for {}", context.script_id) }))
    }
}

/// A registry with every reference script body.
pub fn registry() -> ScriptRegistry {
    let mut registry = ScriptRegistry::new();
    registry.register(AWARD_SEARCH, Arc::new(AwardSearchScript));
    registry.register(FARE_PREVIEW, Arc::new(FarePreviewScript));
    registry.register(FLAKY_CHECKOUT, Arc::new(FlakyCheckoutScript));
    registry.register(LOYALTY_SUMMARY, Arc::new(LoyaltySummaryScript));
    registry
}
