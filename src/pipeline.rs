use log::{debug, info, warn};

use item_scoring::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::pipeline::acquire::{DataSource, FileDataSource};
use crate::pipeline::config_reader::*;

pub mod acquire;
pub mod config_reader;
pub mod export;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PipelineError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Cannot find worksheet {worksheet} in {path}"))]
    MissingWorksheet { path: String, worksheet: String },
    #[snafu(display("The file {path} has no worksheet or an empty worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("The file {path} has several worksheets, the worksheet name must be provided"))]
    AmbiguousWorksheet { path: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing CSV file {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing {path}"))]
    Writing {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Cannot find the directory containing {path}"))]
    MissingParentDir { path: String },
    #[snafu(display("Column {column} is missing in {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("{path}, line {lineno}: cannot understand {value:?} in column {column}"))]
    InvalidCell {
        path: String,
        lineno: usize,
        column: String,
        value: String,
    },
    #[snafu(display("Scoring error: {source}"))]
    Scoring { source: ScoringErrors },
    #[snafu(display("Difference detected between calculated summary and reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Turns a path given on the command line into an absolute path.
fn absolute_path(p: &str) -> PipelineResult<String> {
    let cwd = std::env::current_dir().context(WritingSnafu { path: "." })?;
    Ok(cwd.join(p).display().to_string())
}

/// Builds a configuration out of the command line only.
fn config_from_args(args: &Args) -> PipelineResult<PipelineConfig> {
    let provider = args.input_type.clone().unwrap_or_else(|| "csv".to_string());
    let source = |name: &str, p: &Option<String>| -> PipelineResult<FileSource> {
        match p {
            Some(path) => Ok(FileSource::new(&provider, path)),
            None => whatever!("--{} must be provided when no configuration file is given", name),
        }
    };
    Ok(PipelineConfig {
        output_settings: OutputSettings {
            run_name: "psychscore".to_string(),
            output_directory: None,
        },
        sources: SourceSettings {
            responses: source("responses", &args.responses)?,
            participants: source("participants", &args.participants)?,
            items: source("items", &args.items)?,
        },
        drop_columns: None,
        filter: None,
        rules: None,
    })
}

/// Applies the command line options on top of a configuration file.
fn apply_overrides(config: PipelineConfig, args: &Args) -> PipelineResult<PipelineConfig> {
    let mut config = config;
    if let Some(p) = &args.output_dir {
        config.output_settings.output_directory = Some(absolute_path(p)?);
    }
    if let Some(p) = &args.responses {
        config.sources.responses.file_path = absolute_path(p)?;
    }
    if let Some(p) = &args.participants {
        config.sources.participants.file_path = absolute_path(p)?;
    }
    if let Some(p) = &args.items {
        config.sources.items.file_path = absolute_path(p)?;
    }
    if let Some(cols) = &args.drop_column {
        let mut all = config.drop_columns();
        all.extend(cols.iter().cloned());
        config.drop_columns = Some(all);
    }
    let mut rules = config.rules.clone().unwrap_or_default();
    if let Some(policy) = &args.missing_data_policy {
        // Validated early so that a typo does not wait for the data to load.
        parse_missing_data_policy(policy)?;
        rules.missing_data_policy = Some(policy.clone());
    }
    if args.abort_on_error {
        rules.abort_on_error = Some(true);
    }
    config.rules = Some(rules);
    Ok(config)
}

/// Runs a configuration: acquisition, cleaning and scoring, exports.
///
/// Relative paths are resolved against `root_path`. Returns the summary of the run.
pub fn run_config(config: &PipelineConfig, root_path: &Path) -> PipelineResult<JSValue> {
    info!("config: {:?}", config);
    let rules = config.scoring_rules()?;

    let source = FileDataSource::new(root_path, config)?;
    let batch = source.fetch()?;
    info!(
        "Retrieved {} responses, {} participants, {} items",
        batch.responses.len(),
        batch.participants.len(),
        batch.items.len()
    );

    let mut output =
        clean_and_score(&batch.responses, &batch.participants, &batch.items, &rules)
            .context(ScoringSnafu {})?;
    // Responses without a participant record count as lacking consent.
    output.report.excluded_without_consent += batch.without_participant;

    info!("Cleaned dataset: {} responses", output.long_scored.len());
    info!("Items analyzed: {}", output.item_stats.len());
    for r in output.alpha.values() {
        info!(
            "Cronbach's alpha for {}: {}",
            r.scale_id,
            export::format_estimate(&r.alpha)
        );
    }
    for e in output.report.config_errors.iter() {
        warn!("Item could not be scored: {}", e);
    }

    let summary = export::build_summary_js(config, &rules, &output);

    if let Some(dir) = &config.output_settings.output_directory {
        let out_dir: PathBuf = root_path.join(dir);
        fs::create_dir_all(&out_dir).context(WritingSnafu {
            path: out_dir.display().to_string(),
        })?;
        export::write_tables(&out_dir, &output)?;
        let summary_path = out_dir.join("summary.json");
        let pretty = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu {})?;
        fs::write(&summary_path, pretty).context(WritingSnafu {
            path: summary_path.display().to_string(),
        })?;
        info!("Exported results to {}", out_dir.display());
    }

    Ok(summary)
}

/// Compares a summary with a reference summary, printing the differences.
pub fn check_reference(reference_path: &str, summary: &JSValue) -> PipelineResult<()> {
    let pretty_js_stats = serde_json::to_string_pretty(summary).context(ParsingJsonSnafu {})?;
    let summary_ref = read_summary(reference_path)?;
    debug!("summary: {:?}", summary_ref);
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference summary");
        print_diff(
            pretty_js_summary_ref.as_str(),
            pretty_js_stats.as_ref(),
            "\n",
        );
        return ReferenceMismatchSnafu {}.fail();
    }
    Ok(())
}

pub fn run_pipeline(args: &Args) -> PipelineResult<()> {
    let (config, root_path) = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            let root_p = Path::new(config_path)
                .parent()
                .context(MissingParentDirSnafu { path: config_path })?
                .to_path_buf();
            (config, root_p)
        }
        None => (config_from_args(args)?, PathBuf::from(".")),
    };
    let config = apply_overrides(config, args)?;

    let summary = run_config(&config, &root_path)?;
    let pretty_js_stats = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu {})?;

    match args.out.as_deref() {
        Some("stdout") => println!("{}", pretty_js_stats),
        Some(out_path) => {
            fs::write(out_path, &pretty_js_stats).context(WritingSnafu { path: out_path })?;
        }
        None => {}
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        check_reference(summary_p, &summary)?;
    }
    Ok(())
}
