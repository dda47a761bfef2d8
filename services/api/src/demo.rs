use crate::infra::{parse_severity_tier, DemoSuggestionProvider};
use crate::routes::{score_triple, ScoreRequest};
use clap::Args;
use risk_assessment::config::AssessmentConfig;
use risk_assessment::error::AppError;
use risk_assessment::workflows::assessment::{
    AssessmentReport, AssessmentService, AssessmentStorage, CategoryCode, CategoryLibrary,
    CoefficientField, FineKinneyScale, JsonFileStorage, SearchOutcome, SeverityTier,
    StorageError,
};
use std::fs::File;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_CATALOG: &str = r#"[
    {
        "code": "01",
        "category": "Electrical installations",
        "items": [
            {"sub_category": "Distribution boards", "source": "Plant room", "hazard": "Exposed live parts", "risk": "Electric shock",
             "affected": "Maintenance staff", "responsible": "Electrical supervisor", "measures": "Lockable covers, periodic inspection",
             "p": 3, "f": 3, "s": 40, "p2": 1, "f2": 3, "s2": 15},
            {"source": "Workshops", "hazard": "Damaged extension cables", "risk": "Fire",
             "affected": "All staff", "responsible": "Shift supervisor", "measures": "Visual checks before use",
             "p": 3, "f": 6, "s": 15, "p2": 1, "f2": 6, "s2": 15}
        ]
    },
    {
        "code": "02",
        "category": "Slips, trips and falls",
        "items": [
            {"source": "Production floor", "hazard": "Wet floor", "risk": "Slip and fall",
             "affected": "All staff", "responsible": "Cleaning supervisor", "measures": "Anti-slip flooring, spill kits",
             "p": 6, "f": 6, "s": 3, "p2": 1, "f2": 6, "s2": 3},
            {"source": "Corridors", "hazard": "Cables across walkway", "risk": "Trip",
             "affected": "All staff", "responsible": "Facility manager", "measures": "Cable ducts",
             "p": 3, "f": 6, "s": 3, "p2": 1, "f2": 6, "s2": 3},
            {"source": "Stairs", "hazard": "Missing handrail", "risk": "Fall from stairs",
             "affected": "All staff", "responsible": "Facility manager", "measures": "Install handrails",
             "p": 3, "f": 6, "s": 7, "p2": 1, "f2": 6, "s2": 7}
        ]
    }
]"#;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Probability coefficient (standard grades: 1, 3, 6, 10)
    #[arg(short, long)]
    pub(crate) probability: u32,
    /// Frequency coefficient (standard grades: 1, 2, 3, 6, 10)
    #[arg(short, long)]
    pub(crate) frequency: u32,
    /// Severity coefficient (standard grades: 1, 3, 7, 15, 40, 100)
    #[arg(short, long)]
    pub(crate) severity: u32,
}

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// Saved assessment snapshot (JSON)
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
    /// Write the risk table as CSV to this path
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
    /// Only list entries at or above this score threshold (0, 70 or 200)
    #[arg(long, value_parser = parse_severity_tier, default_value = "0")]
    pub(crate) tier: SeverityTier,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Sector query sent to the suggestion provider
    #[arg(long, default_value = "bakery")]
    pub(crate) query: String,
    /// Minimum score for suggested candidates (0, 70 or 200)
    #[arg(long, value_parser = parse_severity_tier, default_value = "70")]
    pub(crate) tier: SeverityTier,
    /// Category catalog to use instead of the built-in sample
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Write the resulting risk table as CSV to this path
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let response = score_triple(&ScoreRequest {
        probability: args.probability,
        frequency: args.frequency,
        severity: args.severity,
    });

    println!(
        "R = {} x {} x {} = {}",
        args.probability, args.frequency, args.severity, response.score
    );
    println!("Level: {} ({})", response.label, response.color);
    for field in &response.off_scale {
        let options = FineKinneyScale::STANDARD.options(*field);
        println!(
            "Note: {:?} is not a standard grade; standard values are {:?}",
            field, options
        );
    }
    Ok(())
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let storage = JsonFileStorage::new(&args.snapshot, usize::MAX);
    let snapshot = storage.load()?.ok_or_else(|| {
        StorageError::Unavailable(format!("no snapshot at {}", args.snapshot.display()))
    })?;

    let report = AssessmentReport::compile(&snapshot);
    render_assessment_report(&report, args.tier);
    if let Some(path) = args.csv {
        report.export_csv(File::create(&path)?)?;
        println!("\nCSV written to {}", path.display());
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        query,
        tier,
        catalog,
        csv,
    } = args;

    let library = match catalog {
        Some(path) => CategoryLibrary::from_path(path)?,
        None => CategoryLibrary::from_reader(Cursor::new(DEMO_CATALOG))?,
    };
    let provider = Arc::new(DemoSuggestionProvider::default());
    let service = AssessmentService::new(
        Arc::new(library),
        provider,
        &AssessmentConfig::default(),
        30,
    );

    println!("Fine-Kinney assessment demo");
    println!("\nCatalog");
    for category in service.library().list_categories() {
        println!(
            "- {} {} ({} templates)",
            category.code,
            category.category,
            category.items.len()
        );
    }

    let slips = CategoryCode::new("02");
    match service.quick_add(&slips, 0) {
        Ok(item) => println!("\nQuick add: {} {}", item.risk_no, item.text.hazard),
        Err(err) => println!("\nQuick add failed: {err}"),
    }
    match service.bulk_add_category(&slips) {
        Ok(report) => println!(
            "Bulk add {}: {} added, {} already present",
            slips,
            report.added.len(),
            report.skipped_duplicates
        ),
        Err(err) => println!("Bulk add failed: {err}"),
    }

    println!(
        "\nSuggestion search for '{}' (score >= {})",
        query,
        tier.min_score()
    );
    match service.search(&query, tier).await {
        SearchOutcome::Preview(preview) => {
            for candidate in preview.candidates() {
                println!(
                    "  [{}] {} / {} (R={}, {})",
                    candidate.preview_id,
                    candidate.text.hazard,
                    candidate.text.risk,
                    candidate.current.score(),
                    candidate.current.level().label()
                );
            }
            match service.commit_preview(None) {
                Ok(report) => println!("  Committed {} candidates", report.added.len()),
                Err(err) => println!("  Commit rejected: {err}"),
            }
        }
        SearchOutcome::NoEligibleResults { received, .. } => {
            println!("  {received} suggestions received, none eligible")
        }
        SearchOutcome::ProviderUnavailable { reason } => {
            println!("  Suggestion provider unavailable: {reason}")
        }
    }

    if let Some(entry) = service.entries().first() {
        println!("\nEditing {}: clearing probability, then leaving the field", entry.risk_no);
        let edited = service.update_coefficient(entry.id, CoefficientField::Probability, "")?;
        println!("  While empty: R={}", edited.current.score());
        let finalized = service.finalize_coefficient(entry.id, CoefficientField::Probability)?;
        println!(
            "  After finalize: P={} R={}",
            finalized.current.probability(),
            finalized.current.score()
        );
    }

    match service.remaining_slots() {
        Some(remaining) => println!("\nFree-tier slots remaining: {remaining}"),
        None => println!("\nPremium session: no entry limit"),
    }

    let report = service.report();
    render_assessment_report(&report, SeverityTier::All);
    if let Some(path) = csv {
        report.export_csv(File::create(&path)?)?;
        println!("\nCSV written to {}", path.display());
    }
    Ok(())
}

pub(crate) fn render_assessment_report(report: &AssessmentReport, tier: SeverityTier) {
    let header = &report.header;
    if !header.company_name.is_empty() {
        println!("\n{}", header.company_name);
        if !header.workplace_address.is_empty() {
            println!("{}", header.workplace_address);
        }
        if !header.hazard_class.is_empty() {
            println!("Hazard class: {}", header.hazard_class);
        }
        if let Some(date) = header.assessment_date {
            match header.valid_until {
                Some(until) => println!("Assessed {date}, valid until {until}"),
                None => println!("Assessed {date}"),
            }
        }
        if !header.prepared_by.is_empty() {
            println!("Prepared by: {}", header.prepared_by.join(", "));
        }
    }

    println!("\nRisk register ({} entries)", report.rows.len());
    for row in report.rows.iter().filter(|row| tier.admits(row.score)) {
        println!(
            "  {:<7} {:<32} R={:>5} {:<15} -> R2={:>5} {}",
            row.risk_no, row.hazard, row.score, row.level, row.score2, row.level2
        );
    }

    println!("\nCurrent distribution");
    for bucket in &report.current_distribution {
        println!("  {:<15} {}", bucket.label, bucket.count);
    }
    println!("\nAfter measures");
    for bucket in &report.target_distribution {
        println!("  {:<15} {}", bucket.label, bucket.count);
    }
    if let Some(highest) = report.highest_current_score {
        println!("\nHighest current score: {highest}");
    }
    if report.unmitigated > 0 {
        println!("Entries without planned reduction: {}", report.unmitigated);
    }
    if report.images > 0 {
        println!("Entries with attached images: {}", report.images);
    }
}
