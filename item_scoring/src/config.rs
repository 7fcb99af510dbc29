// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

/// One recorded answer, in long format.
///
/// Timestamps are milliseconds since the Unix epoch. The attributes are the
/// extra columns that came along with the response (session metadata,
/// participant columns from the join, ...) and are passed through untouched.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Response {
    pub respondent_id: String,
    pub session_id: String,
    pub item_id: String,
    pub response: Option<String>,
    pub response_ts: Option<i64>,
    pub response_time_ms: Option<u64>,
    pub attributes: Vec<(String, String)>,
}

impl Response {
    /// A response with no timing information and no attributes.
    pub fn simple(respondent_id: &str, item_id: &str, response: &str) -> Response {
        Response {
            respondent_id: respondent_id.to_string(),
            session_id: "".to_string(),
            item_id: item_id.to_string(),
            response: Some(response.to_string()),
            response_ts: None,
            response_time_ms: None,
            attributes: Vec::new(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Participant {
    pub respondent_id: String,
    pub consent: bool,
    pub cohort: Option<String>,
    pub started_at: Option<i64>,
}

/// The numeric range of the answers of a Likert-style item, e.g. 1 to 5.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ScaleBounds {
    pub min: f64,
    pub max: f64,
}

impl ScaleBounds {
    pub fn new(min: f64, max: f64) -> ScaleBounds {
        ScaleBounds { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Mirrors a value inside the bounds: on a 1-5 item, 1 becomes 5 and 2 becomes 4.
    pub fn reverse(&self, value: f64) -> f64 {
        self.min + self.max - value
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Item {
    pub item_id: String,
    pub scale_id: String,
    /// If present, the item is scored 1 for a matching answer and 0 otherwise.
    pub key_correct: Option<String>,
    pub reverse_scored: bool,
    pub time_limit_sec: Option<f64>,
    pub bounds: Option<ScaleBounds>,
}

impl Item {
    /// A Likert-style item without time limit.
    pub fn likert(item_id: &str, scale_id: &str, min: f64, max: f64, reverse_scored: bool) -> Item {
        Item {
            item_id: item_id.to_string(),
            scale_id: scale_id.to_string(),
            key_correct: None,
            reverse_scored,
            time_limit_sec: None,
            bounds: Some(ScaleBounds::new(min, max)),
        }
    }

    /// A correctness-keyed item without time limit.
    pub fn keyed(item_id: &str, scale_id: &str, key: &str) -> Item {
        Item {
            item_id: item_id.to_string(),
            scale_id: scale_id.to_string(),
            key_correct: Some(key.to_string()),
            reverse_scored: false,
            time_limit_sec: None,
            bounds: None,
        }
    }
}

// ******** Output data structures *********

/// The outcome of cleaning for one response row. Exactly one applies per row.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum ValidityFlag {
    Valid,
    /// The item id is not in the catalog.
    UnknownItem,
    /// The answer took longer than the time limit of the item.
    TimedOut,
    /// No usable answer: blank, or not a number within bounds for a Likert item.
    MissingResponse,
    /// A more recent attempt for the same respondent and item was kept instead.
    DuplicateDiscarded,
}

impl ValidityFlag {
    pub const ALL: [ValidityFlag; 5] = [
        ValidityFlag::Valid,
        ValidityFlag::UnknownItem,
        ValidityFlag::TimedOut,
        ValidityFlag::MissingResponse,
        ValidityFlag::DuplicateDiscarded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidityFlag::Valid => "valid",
            ValidityFlag::UnknownItem => "unknown_item",
            ValidityFlag::TimedOut => "timed_out",
            ValidityFlag::MissingResponse => "missing_response",
            ValidityFlag::DuplicateDiscarded => "duplicate_discarded",
        }
    }
}

/// A row of the long scored table.
#[derive(PartialEq, Debug, Clone)]
pub struct ScoredResponse {
    pub response: Response,
    /// None for responses to unknown items.
    pub scale_id: Option<String>,
    pub flag: ValidityFlag,
    pub score: Option<f64>,
}

/// Why a statistic could not be computed.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum UndefinedReason {
    NoResponses,
    InsufficientResponses,
    InsufficientItems,
    InsufficientRespondents,
    ZeroVariance,
    ScoringFailed,
}

impl UndefinedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UndefinedReason::NoResponses => "no_responses",
            UndefinedReason::InsufficientResponses => "insufficient_responses",
            UndefinedReason::InsufficientItems => "insufficient_items",
            UndefinedReason::InsufficientRespondents => "insufficient_respondents",
            UndefinedReason::ZeroVariance => "zero_variance",
            UndefinedReason::ScoringFailed => "scoring_failed",
        }
    }
}

/// A statistic that may not be defined for the data at hand.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Estimate {
    Value(f64),
    Undefined(UndefinedReason),
}

impl Estimate {
    pub fn value(&self) -> Option<f64> {
        match self {
            Estimate::Value(v) => Some(*v),
            Estimate::Undefined(_) => None,
        }
    }

    pub fn reason(&self) -> Option<UndefinedReason> {
        match self {
            Estimate::Value(_) => None,
            Estimate::Undefined(r) => Some(*r),
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Estimate::Value(_))
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ItemStatus {
    Ok,
    InsufficientData,
    ScoringFailed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Ok => "ok",
            ItemStatus::InsufficientData => "insufficient_data",
            ItemStatus::ScoringFailed => "scoring_failed",
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct ItemStats {
    pub item_id: String,
    pub scale_id: String,
    pub status: ItemStatus,
    /// Number of scored responses.
    pub count: usize,
    pub mean: Estimate,
    pub sd: Estimate,
    /// Correlation with the sum of the other items of the same scale.
    pub item_total_correlation: Estimate,
}

#[derive(PartialEq, Debug, Clone)]
pub struct WideRow {
    pub respondent_id: String,
    pub cohort: Option<String>,
    /// Aligned with `WideTable::item_ids`.
    pub scores: Vec<Option<f64>>,
}

/// One row per respondent, one column per scorable item.
#[derive(PartialEq, Debug, Clone)]
pub struct WideTable {
    pub item_ids: Vec<String>,
    pub rows: Vec<WideRow>,
}

impl WideTable {
    pub fn column(&self, item_id: &str) -> Option<usize> {
        self.item_ids.iter().position(|i| i == item_id)
    }

    pub fn row(&self, respondent_id: &str) -> Option<&WideRow> {
        self.rows.iter().find(|r| r.respondent_id == respondent_id)
    }

    pub fn get(&self, respondent_id: &str, item_id: &str) -> Option<f64> {
        let col = self.column(item_id)?;
        self.row(respondent_id).and_then(|r| r.scores[col])
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct ScaleScore {
    pub scale_id: String,
    pub score: Option<f64>,
    pub items_answered: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub struct RespondentScores {
    pub respondent_id: String,
    pub cohort: Option<String>,
    pub scales: Vec<ScaleScore>,
}

impl RespondentScores {
    pub fn scale(&self, scale_id: &str) -> Option<&ScaleScore> {
        self.scales.iter().find(|s| s.scale_id == scale_id)
    }
}

/// Cronbach's alpha for one scale, with the size of the matrix it was computed on.
#[derive(PartialEq, Debug, Clone)]
pub struct Reliability {
    pub scale_id: String,
    pub items: usize,
    pub respondents: usize,
    pub alpha: Estimate,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ConfigIssue {
    /// A reverse-scored item with no bounds to reverse against.
    MissingBounds,
    InvalidBounds,
    MissingTimeLimit,
}

impl ConfigIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigIssue::MissingBounds => "missing_bounds",
            ConfigIssue::InvalidBounds => "invalid_bounds",
            ConfigIssue::MissingTimeLimit => "missing_time_limit",
        }
    }
}

/// The scoring configuration of an item is unusable. Only this item is affected.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct ScoringConfigError {
    pub item_id: String,
    pub issue: ConfigIssue,
}

impl Display for ScoringConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item {}: {}", self.item_id, self.issue.as_str())
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct CleaningReport {
    pub flag_counts: BTreeMap<ValidityFlag, usize>,
    /// Distinct item ids referenced by responses but absent from the catalog.
    pub orphan_item_ids: Vec<String>,
    pub excluded_without_consent: usize,
    pub config_errors: Vec<ScoringConfigError>,
}

impl CleaningReport {
    pub fn count(&self, flag: ValidityFlag) -> usize {
        self.flag_counts.get(&flag).cloned().unwrap_or(0)
    }
}

/// All the tables derived from one batch.
#[derive(PartialEq, Debug, Clone)]
pub struct ScoredOutput {
    pub long_scored: Vec<ScoredResponse>,
    pub wide_scored: WideTable,
    pub item_stats: Vec<ItemStats>,
    pub respondent_scores: Vec<RespondentScores>,
    pub alpha: BTreeMap<String, Reliability>,
    pub report: CleaningReport,
}

/// Errors that prevent the engine from producing any output.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ScoringErrors {
    EmptyItemCatalog,
    DuplicateItem(String),
    DuplicateParticipant(String),
    /// Only returned when aborting on configuration errors.
    ScoringConfig(Vec<ScoringConfigError>),
}

impl Error for ScoringErrors {}

impl Display for ScoringErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringErrors::EmptyItemCatalog => write!(f, "the item catalog is empty"),
            ScoringErrors::DuplicateItem(id) => {
                write!(f, "item {} appears more than once in the catalog", id)
            }
            ScoringErrors::DuplicateParticipant(id) => {
                write!(f, "respondent {} has more than one participant record", id)
            }
            ScoringErrors::ScoringConfig(errs) => {
                let msgs: Vec<String> = errs.iter().map(|e| e.to_string()).collect();
                write!(f, "scoring configuration errors: {}", msgs.join(", "))
            }
        }
    }
}

// ********* Configuration **********

/// How respondents with gaps in a scale enter alpha and item-total correlations.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum MissingDataPolicy {
    /// Only respondents who answered every item of the scale.
    ListwiseDeletion,
    /// Respondents with at least one answer; gaps are filled with the item mean.
    MeanImputation,
}

/// How answers are compared with the key of a keyed item.
///
/// Whitespace is always trimmed and numbers compare by value ("1" matches "1.0").
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum KeyMatching {
    Trimmed,
    CaseInsensitive,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ScaleAggregation {
    Mean,
    Sum,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ScoringRules {
    pub missing_data_policy: MissingDataPolicy,
    pub key_matching: KeyMatching,
    pub aggregation: ScaleAggregation,
    pub abort_on_error: bool,
    /// If set, an item without a time limit is a configuration error.
    pub require_time_limits: bool,
    /// Bounds used for the items of a scale that do not declare their own.
    pub scale_bounds: Vec<(String, ScaleBounds)>,
}

impl ScoringRules {
    pub const DEFAULT_RULES: ScoringRules = ScoringRules {
        missing_data_policy: MissingDataPolicy::ListwiseDeletion,
        key_matching: KeyMatching::CaseInsensitive,
        aggregation: ScaleAggregation::Mean,
        abort_on_error: false,
        require_time_limits: false,
        scale_bounds: Vec::new(),
    };

    pub fn bounds_for_scale(&self, scale_id: &str) -> Option<ScaleBounds> {
        self.scale_bounds
            .iter()
            .find(|(s, _)| s == scale_id)
            .map(|(_, b)| *b)
    }
}

impl Default for ScoringRules {
    fn default() -> Self {
        ScoringRules::DEFAULT_RULES
    }
}
