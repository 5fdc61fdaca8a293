use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use tracing::info;

use crate::error::{Result, TrendError};
use crate::types::MarketRecord;

/// Columns the training CSV must carry. Extra columns are ignored.
const REQUIRED_COLUMNS: [&str; 13] = [
    "Company",
    "Sector",
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
    "Trend",
];

/// Load market records from a CSV file, preserving file order (the
/// per-company chronological ordering precondition rides on it).
pub fn load_records(path: &Path) -> Result<Vec<MarketRecord>> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers: HashSet<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.contains(*c))
        .collect();
    if !missing.is_empty() {
        return Err(TrendError::InputValidation(format!(
            "{}: missing required columns: {}",
            path.display(),
            missing.join(", ")
        )));
    }

    let mut records = Vec::new();
    for result in reader.deserialize() {
        let record: MarketRecord = result?;
        records.push(record);
    }

    info!(path = %path.display(), records = records.len(), "loaded dataset");
    Ok(records)
}

/// Textual dataset summary for the `analyze` command. Plotting and
/// statistical reports are deliberately not produced here.
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub total_records: usize,
    pub companies: usize,
    pub sectors: usize,
    pub bearish: usize,
    pub stable: usize,
    pub bullish: usize,
    pub unlabeled: usize,
}

impl DatasetSummary {
    pub fn from_records(records: &[MarketRecord]) -> Self {
        let companies: HashSet<&str> = records.iter().map(|r| r.company.as_str()).collect();
        let sectors: HashSet<&str> = records.iter().map(|r| r.sector.as_str()).collect();

        let mut summary = Self {
            total_records: records.len(),
            companies: companies.len(),
            sectors: sectors.len(),
            bearish: 0,
            stable: 0,
            bullish: 0,
            unlabeled: 0,
        };
        for record in records {
            match record.trend.as_str() {
                "Bearish" => summary.bearish += 1,
                "Stable" => summary.stable += 1,
                "Bullish" => summary.bullish += 1,
                _ => summary.unlabeled += 1,
            }
        }
        summary
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total records:    {}", self.total_records)?;
        writeln!(f, "Unique companies: {}", self.companies)?;
        writeln!(f, "Unique sectors:   {}", self.sectors)?;
        writeln!(f, "Trend distribution:")?;
        writeln!(f, "  Bearish: {}", self.bearish)?;
        writeln!(f, "  Stable:  {}", self.stable)?;
        writeln!(f, "  Bullish: {}", self.bullish)?;
        if self.unlabeled > 0 {
            writeln!(f, "  (unrecognized labels: {})", self.unlabeled)?;
        }
        Ok(())
    }
}
