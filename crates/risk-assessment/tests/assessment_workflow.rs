use std::io::Cursor;
use std::sync::Arc;

use risk_assessment::config::AssessmentConfig;
use risk_assessment::workflows::assessment::{
    AssessmentReport, AssessmentService, AssessmentStorage, CategoryCode, CategoryLibrary,
    HeaderMetadata, JsonFileStorage, PreviewId, ProviderError, RiskLevel, SearchOutcome,
    SeverityTier, SuggestionProvider, SuggestionRequest, SuggestionResponse,
};
use risk_assessment::workflows::assessment::reconciler::provider::parse_suggestion_response;
use serde_json::json;

const CATALOG: &str = r#"[
    {
        "code": "02",
        "category": "Slips and trips",
        "items": [
            {"hazard": "Wet floor", "risk": "Slip and fall", "p": 6, "f": 6, "s": 3, "p2": 1, "f2": 6, "s2": 3},
            {"hazard": "Cables across walkway", "risk": "Trip", "p": 3, "f": 6, "s": 3, "p2": 1, "f2": 6, "s2": 3},
            {"hazard": "Uneven stairs", "risk": "Fall", "p": 3, "f": 6, "s": 7}
        ]
    }
]"#;

struct BakeryProvider;

impl SuggestionProvider for BakeryProvider {
    async fn suggest(
        &self,
        _request: SuggestionRequest,
    ) -> Result<SuggestionResponse, ProviderError> {
        parse_suggestion_response(json!({
            "results": [
                {"categoryCode": "05", "riskNo": "05.09", "hazard": "Hot oven", "risk": "Burn",
                 "p": 3, "f": 6, "s": 15, "p2": 1, "f2": 6, "s2": 7},
                {"categoryCode": "05", "hazard": "Flour dust", "risk": "Asthma",
                 "probability": 6, "frequency": 6, "severity": 7},
                {"hazard": "Wet floor", "risk": "Slip and fall", "p": 6, "f": 6, "s": 3},
                {"hazard": "Paper cut", "risk": "Minor cut", "p": 1, "f": 1, "s": 1}
            ],
            "method": "sector",
            "sectorCount": 3,
            "generalCount": 1,
            "matchedTags": ["bakery"]
        }))
    }
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "risk-assessment-workflow-{}-{}.json",
        name,
        std::process::id()
    ))
}

#[tokio::test]
async fn catalog_search_commit_report_and_restore() {
    let library = CategoryLibrary::from_reader(Cursor::new(CATALOG)).expect("catalog parses");
    let service = AssessmentService::new(
        Arc::new(library.clone()),
        Arc::new(BakeryProvider),
        &AssessmentConfig::default(),
        30,
    );
    service.update_header(HeaderMetadata {
        company_name: "Acme Bakery".to_string(),
        hazard_class: "Dangerous".to_string(),
        ..HeaderMetadata::default()
    });

    let report = service
        .bulk_add_category(&CategoryCode::new("02"))
        .expect("category fits");
    assert_eq!(report.added.len(), 3);

    let preview = match service.search("bakery", SeverityTier::MediumAndAbove).await {
        SearchOutcome::Preview(preview) => preview,
        other => panic!("expected preview, got {other:?}"),
    };
    let hazards: Vec<&str> = preview
        .candidates()
        .iter()
        .map(|candidate| candidate.text.hazard.as_str())
        .collect();
    assert_eq!(hazards, vec!["Hot oven", "Flour dust"]);
    assert_eq!(preview.meta.matched_tags, vec!["bakery".to_string()]);
    assert_eq!(
        preview.candidates()[0].suggested_risk_no.as_deref(),
        Some("05.09")
    );

    let committed = service
        .commit_preview(Some(&[PreviewId(1), PreviewId(2)]))
        .expect("commit fits");
    let numbers: Vec<&str> = committed
        .added
        .iter()
        .map(|item| item.risk_no.as_str())
        .collect();
    assert_eq!(numbers, vec!["05.01", "05.02"]);

    let compiled: AssessmentReport = service.report();
    assert_eq!(compiled.rows.len(), 5);
    assert_eq!(compiled.header.company_name, "Acme Bakery");
    assert_eq!(compiled.highest_current_score, Some(270));
    let high = compiled
        .current_distribution
        .iter()
        .find(|bucket| bucket.level == RiskLevel::High)
        .expect("bucket per level");
    assert_eq!(high.count, 2);

    let mut csv = Vec::new();
    compiled.export_csv(&mut csv).expect("csv export");
    let csv = String::from_utf8(csv).expect("utf-8 csv");
    let mut lines = csv.lines();
    assert!(lines
        .next()
        .expect("header row")
        .starts_with("risk_no,category_code"));
    assert_eq!(lines.count(), 5);

    let path = temp_path("restore");
    let storage = JsonFileStorage::new(&path, 1024 * 1024);
    storage.save(&service.snapshot()).expect("snapshot saved");

    let restored = AssessmentService::new(
        Arc::new(library),
        Arc::new(BakeryProvider),
        &AssessmentConfig::default(),
        30,
    );
    assert!(restored.restore(&storage).expect("snapshot readable"));
    assert_eq!(restored.entries(), service.entries());
    assert_eq!(restored.remaining_slots(), Some(15));

    std::fs::remove_file(&path).ok();
}
