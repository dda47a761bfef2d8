use metrics_exporter_prometheus::PrometheusHandle;
use risk_assessment::workflows::assessment::reconciler::provider::parse_suggestion_response;
use risk_assessment::workflows::assessment::{
    ProviderError, SeverityTier, SuggestionProvider, SuggestionRequest, SuggestionResponse,
};
use serde_json::{json, Value};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Offline stand-in for the sector-suggestion service. Answers every query
/// with the same small bakery/warehouse sample in the provider's wire format.
#[derive(Default, Clone)]
pub(crate) struct DemoSuggestionProvider {
    queries: Arc<Mutex<Vec<String>>>,
}

impl DemoSuggestionProvider {
    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("query mutex poisoned").clone()
    }
}

impl SuggestionProvider for DemoSuggestionProvider {
    async fn suggest(
        &self,
        request: SuggestionRequest,
    ) -> Result<SuggestionResponse, ProviderError> {
        self.queries
            .lock()
            .expect("query mutex poisoned")
            .push(request.query.clone());
        parse_suggestion_response(demo_payload(&request.query, request.limit))
    }
}

fn demo_payload(query: &str, limit: usize) -> Value {
    let results: Vec<Value> = vec![
        json!({
            "categoryCode": "05", "riskNo": "05.01", "subCategory": "Ovens",
            "source": "Bake room", "hazard": "Hot oven surfaces", "risk": "Burns",
            "affected": "Bakers", "responsible": "Production manager",
            "measures": "Heat-resistant gloves, guarded doors",
            "p": 3, "f": 6, "s": 15, "p2": 1, "f2": 6, "s2": 7,
            "sectorTags": ["bakery"]
        }),
        json!({
            "categoryCode": "05", "subCategory": "Raw materials",
            "source": "Mixing area", "hazard": "Airborne flour dust", "risk": "Occupational asthma",
            "affected": "Bakers", "responsible": "Occupational physician",
            "measures": "Local exhaust ventilation, FFP2 masks",
            "probability": 6, "frequency": 6, "severity": 7,
            "probability2": 3, "frequency2": 6, "severity2": 3,
            "sectorTags": ["bakery"]
        }),
        json!({
            "category_code": "02", "source": "Production floor",
            "hazard": "Wet floor", "risk": "Slip and fall",
            "affected": "All staff", "responsible": "Cleaning supervisor",
            "measures": "Anti-slip flooring, spill kits",
            "p": 6, "f": 6, "s": 3, "p2": 1, "f2": 6, "s2": 3
        }),
        json!({
            "hazard": "Forklift traffic", "risk": "Collision with pedestrians",
            "source": "Warehouse", "affected": "Warehouse staff",
            "p": 3, "f": 6, "s": 40, "p2": 1, "f2": 6, "s2": 15,
            "sectorTags": ["warehouse"]
        }),
        json!({
            "hazard": "Display screen work", "risk": "Eye strain",
            "source": "Office", "p": 3, "f": 6, "s": 1
        }),
    ];
    let results: Vec<Value> = results.into_iter().take(limit).collect();
    let method = if query.to_lowercase().contains("bakery") {
        "sector"
    } else {
        "general"
    };

    json!({
        "count": results.len(),
        "results": results,
        "method": method,
        "sectorCount": 2,
        "generalCount": 3,
        "matchedTags": ["bakery"],
    })
}

pub(crate) fn parse_severity_tier(raw: &str) -> Result<SeverityTier, String> {
    let value = raw
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("'{raw}' is not a number ({err})"))?;
    SeverityTier::try_from(value).map_err(|err| err.to_string())
}
