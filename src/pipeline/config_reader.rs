use crate::pipeline::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use item_scoring::{KeyMatching, MissingDataPolicy, ScaleAggregation, ScaleBounds, ScoringRules};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "runName")]
    pub run_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "delimiter")]
    pub delimiter: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

impl FileSource {
    pub fn new(provider: &str, file_path: &str) -> FileSource {
        FileSource {
            provider: provider.to_string(),
            file_path: file_path.to_string(),
            delimiter: None,
            excel_worksheet_name: None,
        }
    }

    pub fn delimiter_byte(&self) -> PipelineResult<u8> {
        match self.delimiter.as_deref() {
            None => Ok(b','),
            Some("\\t") | Some("tab") => Ok(b'\t'),
            Some(s) if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
            Some(s) => whatever!("delimiter must be a single ascii character, got {:?}", s),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    pub responses: FileSource,
    pub participants: FileSource,
    pub items: FileSource,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterSettings {
    #[serde(rename = "consentValue")]
    pub consent_value: Option<String>,
    #[serde(rename = "responsesFrom")]
    pub responses_from: Option<String>,
    #[serde(rename = "responsesTo")]
    pub responses_to: Option<String>,
}

impl FilterSettings {
    pub fn consent_value(&self) -> String {
        self.consent_value.clone().unwrap_or_else(|| "yes".to_string())
    }

    /// The inclusive date range for responses, if any.
    pub fn date_range(&self) -> PipelineResult<(Option<NaiveDate>, Option<NaiveDate>)> {
        let from = parse_config_date(&self.responses_from)?;
        let to = parse_config_date(&self.responses_to)?;
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                whatever!("responsesFrom {} is after responsesTo {}", f, t)
            }
        }
        Ok((from, to))
    }
}

fn parse_config_date(x: &Option<String>) -> PipelineResult<Option<NaiveDate>> {
    match x {
        None => Ok(None),
        Some(s) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
            Ok(d) => Ok(Some(d)),
            Err(_) => whatever!("could not understand date {:?}, expected YYYY-MM-DD", s),
        },
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BoundsConfig {
    pub min: f64,
    pub max: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct RulesConfig {
    #[serde(rename = "missingDataPolicy")]
    pub missing_data_policy: Option<String>,
    #[serde(rename = "keyMatching")]
    pub key_matching: Option<String>,
    #[serde(rename = "aggregation")]
    pub aggregation: Option<String>,
    #[serde(rename = "abortOnError")]
    pub abort_on_error: Option<bool>,
    #[serde(rename = "requireTimeLimits")]
    pub require_time_limits: Option<bool>,
    #[serde(rename = "scaleBounds")]
    pub scale_bounds: Option<BTreeMap<String, BoundsConfig>>,
}

impl RulesConfig {
    pub fn scoring_rules(&self) -> PipelineResult<ScoringRules> {
        let defaults = ScoringRules::DEFAULT_RULES;
        let res = ScoringRules {
            missing_data_policy: match self.missing_data_policy.as_deref() {
                None => defaults.missing_data_policy,
                Some(x) => parse_missing_data_policy(x)?,
            },
            key_matching: match self.key_matching.as_deref() {
                None => defaults.key_matching,
                Some("caseInsensitive") => KeyMatching::CaseInsensitive,
                Some("trimmed") | Some("caseSensitive") => KeyMatching::Trimmed,
                Some(x) => whatever!("unknown key matching mode: {}", x),
            },
            aggregation: match self.aggregation.as_deref() {
                None => defaults.aggregation,
                Some("mean") => ScaleAggregation::Mean,
                Some("sum") => ScaleAggregation::Sum,
                Some(x) => whatever!("unknown aggregation: {}", x),
            },
            abort_on_error: self.abort_on_error.unwrap_or(defaults.abort_on_error),
            require_time_limits: self
                .require_time_limits
                .unwrap_or(defaults.require_time_limits),
            scale_bounds: self
                .scale_bounds
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(|(scale, b)| (scale, ScaleBounds::new(b.min, b.max)))
                .collect(),
        };
        Ok(res)
    }
}

pub fn parse_missing_data_policy(x: &str) -> PipelineResult<MissingDataPolicy> {
    match x {
        "listwise" | "listwiseDeletion" => Ok(MissingDataPolicy::ListwiseDeletion),
        "mean" | "meanImputation" => Ok(MissingDataPolicy::MeanImputation),
        _ => whatever!("unknown missing data policy: {}", x),
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub sources: SourceSettings,
    #[serde(rename = "dropColumns")]
    pub drop_columns: Option<Vec<String>>,
    pub filter: Option<FilterSettings>,
    pub rules: Option<RulesConfig>,
}

impl PipelineConfig {
    pub fn drop_columns(&self) -> Vec<String> {
        self.drop_columns.clone().unwrap_or_default()
    }

    pub fn filter(&self) -> FilterSettings {
        self.filter.clone().unwrap_or_default()
    }

    pub fn scoring_rules(&self) -> PipelineResult<ScoringRules> {
        self.rules.clone().unwrap_or_default().scoring_rules()
    }
}

pub fn read_config(path: &str) -> PipelineResult<PipelineConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_config: {:?}", contents);
    let config: PipelineConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    Ok(config)
}

pub fn read_summary(path: &str) -> PipelineResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_full_config() {
        let js = r#"{
            "outputSettings": {"runName": "october", "outputDirectory": "out"},
            "sources": {
                "responses": {"provider": "csv", "filePath": "r.csv", "delimiter": ";"},
                "participants": {"provider": "csv", "filePath": "p.csv"},
                "items": {"provider": "xlsx", "filePath": "i.xlsx", "excelWorksheetName": "items"}
            },
            "dropColumns": ["email"],
            "filter": {"consentValue": "Y", "responsesFrom": "2025-10-01", "responsesTo": "2025-10-31"},
            "rules": {
                "missingDataPolicy": "mean",
                "keyMatching": "trimmed",
                "aggregation": "sum",
                "abortOnError": true,
                "scaleBounds": {"EXT": {"min": 1, "max": 7}}
            }
        }"#;
        let config: PipelineConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config.drop_columns(), vec!["email".to_string()]);
        assert_eq!(config.sources.responses.delimiter_byte().unwrap(), b';');
        assert_eq!(config.sources.participants.delimiter_byte().unwrap(), b',');
        assert_eq!(config.filter().consent_value(), "Y");
        let (from, to) = config.filter().date_range().unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2025, 10, 1));
        assert_eq!(to, NaiveDate::from_ymd_opt(2025, 10, 31));

        let rules = config.scoring_rules().unwrap();
        assert_eq!(rules.missing_data_policy, MissingDataPolicy::MeanImputation);
        assert_eq!(rules.key_matching, KeyMatching::Trimmed);
        assert_eq!(rules.aggregation, ScaleAggregation::Sum);
        assert!(rules.abort_on_error);
        assert!(!rules.require_time_limits);
        assert_eq!(rules.bounds_for_scale("EXT"), Some(ScaleBounds::new(1.0, 7.0)));
    }

    #[test]
    fn defaults_when_rules_are_absent() {
        let js = r#"{
            "outputSettings": {"runName": "minimal"},
            "sources": {
                "responses": {"provider": "csv", "filePath": "r.csv"},
                "participants": {"provider": "csv", "filePath": "p.csv"},
                "items": {"provider": "csv", "filePath": "i.csv"}
            }
        }"#;
        let config: PipelineConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config.scoring_rules().unwrap(), ScoringRules::DEFAULT_RULES);
        assert_eq!(config.filter().consent_value(), "yes");
        assert_eq!(config.filter().date_range().unwrap(), (None, None));
        assert!(config.drop_columns().is_empty());
    }

    #[test]
    fn rejects_unknown_options() {
        let rules = RulesConfig {
            missing_data_policy: Some("pairwise".to_string()),
            ..RulesConfig::default()
        };
        assert!(rules.scoring_rules().is_err());
        let filter = FilterSettings {
            responses_from: Some("2025-11-01".to_string()),
            responses_to: Some("2025-10-01".to_string()),
            ..FilterSettings::default()
        };
        assert!(filter.date_range().is_err());
        let mut fs = FileSource::new("csv", "x.csv");
        fs.delimiter = Some(";;".to_string());
        assert!(fs.delimiter_byte().is_err());
    }
}
