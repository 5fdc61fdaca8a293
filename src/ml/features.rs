use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TrendError};
use crate::types::{MarketRecord, TrendClass};

/// Rolling windows for the moving-average features. A record's MA is
/// defined once its company has this many observations ending at the
/// record itself; earlier rows are excluded from training outright.
pub const MA_SHORT_WINDOW: usize = 5;
pub const MA_LONG_WINDOW: usize = 20;

/// Fixed-size feature vector consumed by the scaler and classifier.
/// Field order is the contract: the artifact schema records these names
/// and predictors validate against them before any computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub market_cap: f64,
    pub pe_ratio: f64,
    pub dividend_yield: f64,
    pub volatility: f64,
    pub sentiment_score: f64,
    pub ma5: f64,
    pub ma20: f64,
    pub price_range: f64,
    pub price_change: f64,
}

impl FeatureVector {
    pub const NUM_FEATURES: usize = 14;

    pub const FEATURE_NAMES: [&'static str; Self::NUM_FEATURES] = [
        "Open",
        "High",
        "Low",
        "Close",
        "Volume",
        "Market_Cap",
        "PE_Ratio",
        "Dividend_Yield",
        "Volatility",
        "Sentiment_Score",
        "MA5",
        "MA20",
        "Price_Range",
        "Price_Change",
    ];

    pub fn to_array(&self) -> [f64; Self::NUM_FEATURES] {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.market_cap,
            self.pe_ratio,
            self.dividend_yield,
            self.volatility,
            self.sentiment_score,
            self.ma5,
            self.ma20,
            self.price_range,
            self.price_change,
        ]
    }

    /// Build a vector from externally supplied fields. Price_Range and
    /// Price_Change are always derived here, never accepted directly.
    pub fn from_external(input: &PredictionInput) -> Self {
        Self {
            open: input.open,
            high: input.high,
            low: input.low,
            close: input.close,
            volume: input.volume,
            market_cap: input.market_cap,
            pe_ratio: input.pe_ratio,
            dividend_yield: input.dividend_yield,
            volatility: input.volatility,
            sentiment_score: input.sentiment_score,
            ma5: input.ma5,
            ma20: input.ma20,
            price_range: input.high - input.low,
            price_change: input.close - input.open,
        }
    }
}

/// The 12 numeric fields a caller may supply at the CLI/web boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionInput {
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(rename = "Market_Cap")]
    pub market_cap: f64,
    #[serde(rename = "PE_Ratio")]
    pub pe_ratio: f64,
    #[serde(rename = "Dividend_Yield")]
    pub dividend_yield: f64,
    #[serde(rename = "Volatility")]
    pub volatility: f64,
    #[serde(rename = "Sentiment_Score")]
    pub sentiment_score: f64,
    #[serde(rename = "MA5")]
    pub ma5: f64,
    #[serde(rename = "MA20")]
    pub ma20: f64,
}

/// Ordered feature-name list plus a version tag, embedded in both halves
/// of a persisted artifact so they can be cross-checked on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub fields: Vec<String>,
}

impl FeatureSchema {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn current() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            fields: FeatureVector::FEATURE_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Per-batch accounting of what featurization kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub total_records: usize,
    pub used: usize,
    pub excluded_short_history: usize,
    pub excluded_bad_label: usize,
    pub excluded_non_finite: usize,
}

/// Featurized training set: feature rows paired 1:1 with labels.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<TrendClass>,
    pub report: BuildReport,
}

/// Derive the training set from raw records.
///
/// Moving averages are computed per company over that company's sequence
/// in input order. A record is kept only once its company has
/// `MA_LONG_WINDOW` observations ending at the record; shorter-history
/// rows are excluded, never imputed. Records with an out-of-enum trend
/// label are likewise excluded and counted.
pub fn build_training_set(records: &[MarketRecord]) -> Result<TrainingSet> {
    let mut closes_by_company: HashMap<&str, Vec<f64>> = HashMap::new();
    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut report = BuildReport {
        total_records: records.len(),
        ..Default::default()
    };

    for record in records {
        // NaN/infinite cells would poison the moving averages and the
        // fitted statistics downstream; exclude the whole record.
        if !numeric_fields(record).iter().all(|v| v.is_finite()) {
            warn!(company = %record.company, "excluding record with non-finite value");
            report.excluded_non_finite += 1;
            continue;
        }

        let closes = closes_by_company
            .entry(record.company.as_str())
            .or_default();
        closes.push(record.close);

        let label = match record.trend.parse::<TrendClass>() {
            Ok(label) => label,
            Err(_) => {
                warn!(
                    company = %record.company,
                    label = %record.trend,
                    "excluding record with unrecognized trend label"
                );
                report.excluded_bad_label += 1;
                continue;
            }
        };

        let (ma5, ma20) = match (
            trailing_mean(closes, MA_SHORT_WINDOW),
            trailing_mean(closes, MA_LONG_WINDOW),
        ) {
            (Some(ma5), Some(ma20)) => (ma5, ma20),
            _ => {
                report.excluded_short_history += 1;
                continue;
            }
        };

        features.push(FeatureVector {
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
            market_cap: record.market_cap,
            pe_ratio: record.pe_ratio,
            dividend_yield: record.dividend_yield,
            volatility: record.volatility,
            sentiment_score: record.sentiment_score,
            ma5,
            ma20,
            price_range: record.price_range(),
            price_change: record.price_change(),
        });
        labels.push(label);
        report.used += 1;
    }

    debug!(
        total = report.total_records,
        used = report.used,
        short_history = report.excluded_short_history,
        bad_label = report.excluded_bad_label,
        non_finite = report.excluded_non_finite,
        "featurization complete"
    );

    if report.used == 0 && report.total_records > 0 {
        return Err(TrendError::TrainingPrecondition(format!(
            "no usable records: {} of {} excluded for short history, {} for bad labels",
            report.excluded_short_history, report.total_records, report.excluded_bad_label
        )));
    }

    Ok(TrainingSet {
        features,
        labels,
        report,
    })
}

fn numeric_fields(record: &MarketRecord) -> [f64; 10] {
    [
        record.open,
        record.high,
        record.low,
        record.close,
        record.volume,
        record.market_cap,
        record.pe_ratio,
        record.dividend_yield,
        record.volatility,
        record.sentiment_score,
    ]
}

/// Mean of the last `window` values, or None until that many exist.
fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    if values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}
