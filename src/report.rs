use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use member_scoring::aggregate::*;
use member_scoring::builder::Builder;
use member_scoring::store::*;
use member_scoring::suggestions::*;
use member_scoring::*;

use crate::args::Args;

pub mod config_reader;
pub mod io_common;
pub mod io_store;
pub mod io_table;
pub mod metadata;
pub mod normalize;
pub mod training;

use crate::report::config_reader::*;
use crate::report::io_common::{parse_date_text, simplify_file_name};
use crate::report::io_store::JsonFileStore;
use crate::report::io_table::load_table;
use crate::report::metadata::*;
use crate::report::normalize::*;
use crate::report::training::*;

/// Where the periods are stored when neither the command line nor the
/// configuration says otherwise.
pub const DEFAULT_STORE_PATH: &str = "scorecard_store.json";

#[derive(Debug, Snafu)]
pub enum ReportError {
    #[snafu(display("Unsupported file type for {filename}: expected .xlsx, .xls or .csv"))]
    UnsupportedFormat { filename: String },
    #[snafu(display("Could not read {filename}: {message}"))]
    UnreadableFile { filename: String, message: String },
    #[snafu(display(
        "Could not locate the header row starting with \"First Name\" in the first {scanned} rows"
    ))]
    HeaderNotFound { scanned: usize },
    #[snafu(display("Training report must have First Name and Last Name columns"))]
    MissingNameColumns {},
    #[snafu(display("Invalid date or date range {value:?}: expected YYYY-MM-DD or FROM:TO"))]
    InvalidDate { value: String },
    #[snafu(display("The report {filename} has no member rows"))]
    EmptyReport { filename: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading input file {path}"))]
    OpeningInput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing the store file {path}"))]
    WritingStore {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid period in the store {path} (batch {batch_id})"))]
    CorruptStore {
        source: ScoringErrors,
        path: String,
        batch_id: u64,
    },
    #[snafu(display("Could not save the members of {filename}: {source}"))]
    SavingPeriod {
        source: ScoringErrors,
        filename: String,
    },
    #[snafu(display("Difference detected between the computed summary and the reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ReportResult<T> = Result<T, ReportError>;

// ********* Ingestion ***********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct IngestSettings {
    pub header_scan_rows: usize,
    pub training_scan_rows: usize,
    pub excel_worksheet_name: Option<String>,
    /// The period used when the dates of a report cannot be read.
    pub today: NaiveDate,
}

impl Default for IngestSettings {
    fn default() -> Self {
        IngestSettings {
            header_scan_rows: MAIN_SCAN_ROWS,
            training_scan_rows: TRAINING_SCAN_ROWS,
            excel_worksheet_name: None,
            today: Utc::now().date_naive(),
        }
    }
}

/// The content of an uploaded file.
#[derive(Debug, Clone, Copy)]
pub struct InputFile<'a> {
    pub filename: &'a str,
    pub bytes: &'a [u8],
}

#[derive(PartialEq, Debug, Clone)]
pub struct IngestResult {
    pub period: ReportingPeriod,
    /// False when the dates could not be read and the period fell back to today.
    pub dates_detected: bool,
    pub report: NormalizedReport,
    pub training: Option<TrainingCounts>,
    /// Why the training report was not used, if one was provided.
    pub training_error: Option<String>,
    /// Members of the report found in the training report.
    pub training_matched: usize,
    /// The rows to persist for the period.
    pub rows: Vec<PeriodRow>,
    pub scored: ScoredPeriod,
}

/// The reporting period of a report. Both dates must be present and in order,
/// otherwise the period is today.
pub fn resolve_period(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> (ReportingPeriod, bool) {
    if let (Some(f), Some(t)) = (from, to) {
        if let Ok(p) = ReportingPeriod::new(f, t) {
            return (p, true);
        }
    }
    warn!(
        "resolve_period: could not use the dates from: {:?} to: {:?}, using {} instead",
        from, to, today
    );
    (ReportingPeriod::single_day(today), false)
}

/// Reads a main report, and optionally a training report, and scores the
/// members of the report.
///
/// Nothing is persisted. A training report that cannot be used is reported in
/// [IngestResult::training_error] and the members are scored without it.
pub fn ingest(
    main: &InputFile,
    training: Option<&InputFile>,
    settings: &IngestSettings,
) -> ReportResult<IngestResult> {
    info!("ingest: {:?}", main.filename);
    let grid = load_table(
        main.bytes,
        main.filename,
        settings.excel_worksheet_name.as_deref(),
    )?;
    let meta = scan_metadata(&grid, HeaderRule::FirstCell, settings.header_scan_rows)?;
    let report = normalize(&grid, &meta)?;
    if report.records.is_empty() {
        return EmptyReportSnafu {
            filename: main.filename,
        }
        .fail();
    }
    let (period, dates_detected) = resolve_period(report.from, report.to, settings.today);

    let (training_counts, training_error) = match training {
        Some(t) => match read_training(t.bytes, t.filename, None, settings.training_scan_rows) {
            Ok(tc) => (Some(tc), None),
            Err(e) => {
                warn!(
                    "ingest: training report {:?} ignored: {}",
                    t.filename, e
                );
                (None, Some(e.to_string()))
            }
        },
        None => (None, None),
    };
    if let Some(tp) = training_counts.as_ref().and_then(|tc| tc.period()) {
        if tp != period {
            warn!(
                "ingest: the training report covers {:?} but the main report covers {:?}",
                tp, period
            );
        }
    }
    let training_matched = match &training_counts {
        Some(tc) => {
            let matched = report
                .records
                .iter()
                .filter(|r| tc.get(&r.full_name()).is_some())
                .count();
            info!(
                "ingest: {} of {} members found in the training report ({} events)",
                matched,
                report.records.len(),
                tc.total_events()
            );
            matched
        }
        None => 0,
    };

    let pairs = training_counts
        .as_ref()
        .map(|tc| tc.as_pairs())
        .unwrap_or_default();
    let mut builder = Builder::new(period)
        .and_then(|b| b.training_counts(&pairs))
        .context(SavingPeriodSnafu {
            filename: main.filename,
        })?;
    for record in report.records.iter() {
        builder.add_record(record).context(SavingPeriodSnafu {
            filename: main.filename,
        })?;
    }
    let rows = builder.rows().context(SavingPeriodSnafu {
        filename: main.filename,
    })?;
    let scored = builder.scored().context(SavingPeriodSnafu {
        filename: main.filename,
    })?;
    debug!("ingest: scored: {:?}", scored);

    Ok(IngestResult {
        period,
        dates_detected,
        report,
        training: training_counts,
        training_error,
        training_matched,
        rows,
        scored,
    })
}

/// Same as [ingest], then replaces the period in the repository.
///
/// If the report cannot be read, the repository is not modified.
pub fn ingest_into<R: PeriodRepository>(
    repo: &mut R,
    main: &InputFile,
    training: Option<&InputFile>,
    settings: &IngestSettings,
) -> ReportResult<(IngestResult, SaveReport)> {
    let res = ingest(main, training, settings)?;
    let batch = UploadBatch {
        id: 0,
        source: simplify_file_name(main.filename),
        training_source: res
            .training
            .as_ref()
            .and(training)
            .map(|t| simplify_file_name(t.filename)),
        training_period: res.training.as_ref().and_then(|tc| tc.period()),
    };
    let save = repo
        .replace_period(res.period, batch, res.rows.clone())
        .context(SavingPeriodSnafu {
            filename: main.filename,
        })?;
    for failure in save.failures.iter() {
        warn!(
            "ingest_into: {:?} row {} ({:?}) not saved: {}",
            main.filename, failure.row, failure.name, failure.reason
        );
    }
    info!(
        "ingest_into: {:?}: period {} saved with {} members (batch {}, replaced: {})",
        main.filename,
        res.period.label(),
        save.saved,
        save.batch_id,
        save.replaced
    );
    Ok((res, save))
}

// ********* Summary ***********

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn score_result_to_json(r: &ScoreResult) -> JSValue {
    let mut metrics: JSMap<String, JSValue> = JSMap::new();
    for ms in r.metrics.iter() {
        metrics.insert(
            ms.metric.key().to_string(),
            json!({
                "score": ms.score,
                "max": ms.metric.max_score(),
                "color": ms.color.label(),
            }),
        );
    }
    json!({
        "name": r.name,
        "totalScore": r.total_score,
        "color": r.color.label(),
        "colorHex": r.color.hex(),
        "metrics": metrics,
        "rates": {
            "weeks": round2(r.rates.weeks),
            "referralsPerWeek": round2(r.rates.referrals_per_week()),
            "visitorsPerWeek": round2(r.rates.visitors_per_week()),
            "testimonialsPerWeek": round2(r.rates.testimonials_per_week()),
            "trainingInput": r.rates.training_input,
        }
    })
}

fn matrix_to_json(matrix: &ScoreMatrix) -> JSValue {
    let columns: Vec<JSValue> = matrix
        .columns
        .iter()
        .map(|c| {
            json!({
                "label": c.label,
                "start": c.period.start().to_string(),
                "end": c.period.end().to_string(),
                "average": c.average.map(round2),
                "color": c.color.map(|x| x.label()),
            })
        })
        .collect();
    let rows: Vec<JSValue> = matrix
        .rows
        .iter()
        .map(|row| {
            let cells: Vec<JSValue> = row
                .cells
                .iter()
                .zip(matrix.columns.iter())
                .map(|(cell, col)| {
                    json!({
                        "period": col.label,
                        "total": render_cell(cell),
                        "color": cell.as_ref().map(|r| r.color.label()),
                    })
                })
                .collect();
            json!({
                "name": row.name,
                "sumScore": row.sum_score,
                "periodsScored": row.periods_scored(),
                "cells": cells,
            })
        })
        .collect();
    json!({ "columns": columns, "rows": rows })
}

fn rankings_to_json(periods: &[ScoredPeriod], options: &AggregateOptions) -> Vec<JSValue> {
    let mut sorted: Vec<&ScoredPeriod> = periods.iter().collect();
    sorted.sort_by_key(|p| (p.period.end(), p.period.start()));
    sorted
        .iter()
        .map(|sp| {
            let ranking: Vec<JSValue> = period_rankings(sp, options)
                .iter()
                .map(|e| {
                    json!({
                        "rank": e.rank,
                        "name": e.name,
                        "totalScore": e.total_score,
                        "color": e.color.label(),
                    })
                })
                .collect();
            json!({ "period": sp.period.label(), "ranking": ranking })
        })
        .collect()
}

fn member_to_json(periods: &[ScoredPeriod], name: &str, options: &AggregateOptions) -> JSValue {
    let history: Vec<JSValue> = member_history(periods, name, options)
        .iter()
        .map(|h| {
            json!({
                "period": h.label,
                "totalScore": h.result.total_score,
                "color": h.result.color.label(),
            })
        })
        .collect();
    match latest_snapshot(periods, name, options) {
        Some(latest) => {
            let suggestions: Vec<JSValue> = generate_suggestions(&latest.result)
                .iter()
                .map(|s| {
                    json!({
                        "category": s.category,
                        "message": s.message,
                        "priority": s.priority.label(),
                    })
                })
                .collect();
            json!({
                "name": latest.result.name,
                "history": history,
                "latest": {
                    "period": latest.label,
                    "score": score_result_to_json(&latest.result),
                },
                "suggestions": suggestions,
            })
        }
        None => {
            warn!("member_to_json: no scores found for {:?}", name);
            json!({ "name": name, "history": history, "latest": null, "suggestions": [] })
        }
    }
}

fn uploads_to_json(stored: &[StoredPeriod]) -> Vec<JSValue> {
    let mut sorted: Vec<&StoredPeriod> = stored.iter().collect();
    sorted.sort_by_key(|p| std::cmp::Reverse((p.period.start(), p.period.end())));
    sorted
        .iter()
        .map(|sp| {
            json!({
                "label": sp.period.label(),
                "start": sp.period.start().to_string(),
                "end": sp.period.end().to_string(),
                "batchId": sp.batch.id,
                "source": sp.batch.source,
                "trainingSource": sp.batch.training_source,
                "memberCount": sp.rows.len(),
            })
        })
        .collect()
}

/// The JSON summary of the stored periods: the uploads, the heatmap, the
/// rankings of each period and, if a member is given, the detail for that
/// member.
pub fn summary_to_json(
    config: &ScorecardConfig,
    stored: &[StoredPeriod],
    options: &AggregateOptions,
    member: Option<&str>,
) -> JSValue {
    let scored: Vec<ScoredPeriod> = stored.iter().map(|p| p.score()).collect();
    let matrix = aggregate(&scored, options);
    let mut js: JSMap<String, JSValue> = JSMap::new();
    js.insert(
        "config".to_string(),
        json!({
            "chapter": config.output_settings.chapter_name,
            "periods": scored.len(),
            "ignoredMemberNames": options.ignored_names,
        }),
    );
    js.insert(
        "periods".to_string(),
        JSValue::Array(uploads_to_json(stored)),
    );
    js.insert("heatmap".to_string(), matrix_to_json(&matrix));
    js.insert(
        "rankings".to_string(),
        JSValue::Array(rankings_to_json(&scored, options)),
    );
    if let Some(name) = member {
        js.insert("member".to_string(), member_to_json(&scored, name, options));
    }
    JSValue::Object(js)
}

// ********* Command line ***********

fn read_training_input(path: &str) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(b) => Some(b),
        Err(e) => {
            warn!("read_training_input: {:?} ignored: {}", path, e);
            None
        }
    }
}

fn ingest_source(
    store: &mut JsonFileStore,
    source: &ReportSource,
    settings: &IngestSettings,
) -> ReportResult<()> {
    let bytes = fs::read(&source.file_path).context(OpeningInputSnafu {
        path: source.file_path.clone(),
    })?;
    let training_bytes: Option<(String, Vec<u8>)> = source
        .training_file_path
        .as_ref()
        .and_then(|p| read_training_input(p).map(|b| (p.clone(), b)));
    let main = InputFile {
        filename: &source.file_path,
        bytes: &bytes,
    };
    let training = training_bytes.as_ref().map(|(p, b)| InputFile {
        filename: p,
        bytes: b,
    });
    let source_settings = IngestSettings {
        excel_worksheet_name: source
            .excel_worksheet_name
            .clone()
            .or_else(|| settings.excel_worksheet_name.clone()),
        ..settings.clone()
    };
    let (res, save) = ingest_into(store, &main, training.as_ref(), &source_settings)?;
    store.save()?;
    info!(
        "ingest_source: {:?}: {} members saved for {} ({} rows skipped, {} failures)",
        source.file_path,
        save.saved,
        res.period.label(),
        res.report.dropped_rows,
        save.failures.len()
    );
    Ok(())
}

/// A date given on the command line: YYYY-MM-DD, or one of the formats of the
/// reports.
pub fn parse_cli_date(value: &str) -> ReportResult<NaiveDate> {
    let s = value.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_date_text(s))
        .context(InvalidDateSnafu { value })
}

/// A FROM:TO range given on the command line. The end may not be before the
/// start.
pub fn parse_cli_range(value: &str) -> ReportResult<(NaiveDate, NaiveDate)> {
    let (from, to) = value
        .split_once(':')
        .context(InvalidDateSnafu { value })?;
    let from = parse_cli_date(from)?;
    let to = parse_cli_date(to)?;
    ensure!(from <= to, InvalidDateSnafu { value });
    Ok((from, to))
}

fn check_reference(reference_path: &str, pretty_js_stats: &str) -> ReportResult<()> {
    let summary_ref = read_summary(reference_path)?;
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference string");
        print_diff(pretty_js_summary_ref.as_str(), pretty_js_stats, "\n");
        return ReferenceMismatchSnafu {}.fail();
    }
    Ok(())
}

/// Runs the whole program: ingests the reports given on the command line or
/// in the configuration, then writes the summary of all the stored periods.
pub fn run_scorecard(args: &Args) -> ReportResult<()> {
    let (config, root): (ScorecardConfig, PathBuf) = match &args.config {
        Some(p) => {
            let config = read_config(p)?;
            let root = Path::new(p)
                .parent()
                .map(|x| x.to_path_buf())
                .unwrap_or_default();
            (config, root)
        }
        None => (ScorecardConfig::default(), PathBuf::new()),
    };
    info!("run_scorecard: config: {:?}", config);

    let from = args.from.as_deref().map(parse_cli_date).transpose()?;
    let to = args.to.as_deref().map(parse_cli_date).transpose()?;
    let removal = args
        .remove_period
        .as_deref()
        .map(parse_cli_range)
        .transpose()?;

    let settings = IngestSettings {
        header_scan_rows: config.header_scan_rows.unwrap_or(MAIN_SCAN_ROWS),
        training_scan_rows: config.training_scan_rows.unwrap_or(TRAINING_SCAN_ROWS),
        excel_worksheet_name: args.excel_worksheet_name.clone(),
        today: Utc::now().date_naive(),
    };

    let store_path = match (&args.store, &config.store_path) {
        (Some(p), _) => p.clone(),
        (None, Some(p)) => resolve_path(&root, p),
        (None, None) => DEFAULT_STORE_PATH.to_string(),
    };
    let mut store = JsonFileStore::open(&store_path)?;
    if args.reset {
        warn!(
            "run_scorecard: removing the {} periods of {:?}",
            store.periods().len(),
            store.path()
        );
        store.clear();
    }
    if let Some((start, end)) = removal {
        let removed = store.remove_within(start, end);
        if removed == 0 {
            warn!(
                "run_scorecard: no stored period between {} and {}",
                start, end
            );
        }
    }
    if args.reset || removal.is_some() {
        store.save()?;
    }

    let sources: Vec<ReportSource> = match &args.input {
        Some(input) => vec![ReportSource {
            file_path: input.clone(),
            training_file_path: args.training.clone(),
            excel_worksheet_name: None,
        }],
        None => {
            if args.training.is_some() {
                warn!("run_scorecard: --training is ignored without --input");
            }
            config
                .report_sources
                .iter()
                .map(|s| ReportSource {
                    file_path: resolve_path(&root, &s.file_path),
                    training_file_path: s
                        .training_file_path
                        .as_ref()
                        .map(|t| resolve_path(&root, t)),
                    excel_worksheet_name: s.excel_worksheet_name.clone(),
                })
                .collect()
        }
    };
    for source in sources.iter() {
        ingest_source(&mut store, source, &settings)?;
    }

    let stored: Vec<StoredPeriod> = store
        .periods()
        .into_iter()
        .filter(|p| p.period.within(from, to))
        .collect();
    info!(
        "run_scorecard: summarizing {} of the {} periods in {:?}",
        stored.len(),
        store.periods().len(),
        store.path()
    );
    let options = match &config.ignored_member_names {
        Some(names) => AggregateOptions {
            ignored_names: names.clone(),
        },
        None => AggregateOptions::default(),
    };
    let summary = summary_to_json(&config, &stored, &options, args.member.as_deref());
    let pretty_js_stats = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu {})?;

    let out_path: Option<String> = match (&args.out, &config.output_settings.output_path) {
        (Some(p), _) => Some(p.clone()),
        (None, Some(p)) if p == "stdout" => Some(p.clone()),
        (None, Some(p)) => Some(resolve_path(&root, p)),
        (None, None) => None,
    };
    match out_path.as_deref() {
        None | Some("") | Some("stdout") => println!("{}", pretty_js_stats),
        Some(path) => {
            fs::write(path, &pretty_js_stats).context(WritingOutputSnafu { path })?;
            info!("run_scorecard: summary written to {:?}", path);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(reference_path) = &args.reference {
        check_reference(reference_path, &pretty_js_stats)?;
    }
    Ok(())
}
