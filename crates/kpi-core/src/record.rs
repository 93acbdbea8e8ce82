//! One output row per recording

use crate::kpi::{KpiKey, KpiSchema, KpiValue};
use crate::recording::RecordingMeta;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendering of a not-computable KPI in the output table
pub const MISSING_MARKER: &str = "NaN";

/// Metadata columns preceding the KPI columns
pub const METADATA_COLUMNS: [&str; 4] = ["subject", "condition", "trial", "filename"];

/// Decimal places kept in the output table
pub const DECIMALS: i32 = 6;

/// Recording-level outcome that replaces every KPI with not-computable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Disqualification {
    ShortRecording,
    InsufficientCleanEpochs,
}

impl Disqualification {
    pub fn reason(self) -> &'static str {
        match self {
            Disqualification::ShortRecording => "short recording",
            Disqualification::InsufficientCleanEpochs => "insufficient clean epochs",
        }
    }
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Computed,
    Disqualified(Disqualification),
}

/// Aggregated KPIs of one recording, in schema column order
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub meta: RecordingMeta,
    pub status: RecordStatus,
    pub values: Vec<(KpiKey, KpiValue)>,
    /// False when every core KPI is not computable; such rows are not written
    pub retained: bool,
}

impl AggregatedRecord {
    /// All-not-computable record for a disqualified recording
    pub fn disqualified(meta: RecordingMeta, schema: &KpiSchema, reason: Disqualification) -> Self {
        Self {
            meta,
            status: RecordStatus::Disqualified(reason),
            values: schema
                .columns()
                .iter()
                .map(|&key| (key, KpiValue::NotComputable))
                .collect(),
            retained: false,
        }
    }

    pub fn value(&self, key: &KpiKey) -> KpiValue {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map_or(KpiValue::NotComputable, |(_, v)| *v)
    }

    pub fn computable_count(&self) -> usize {
        self.values.iter().filter(|(_, v)| v.is_computable()).count()
    }

    /// Header for a table of records produced with `schema`
    pub fn header(schema: &KpiSchema) -> Vec<String> {
        METADATA_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(schema.header())
            .collect()
    }

    /// Cells of this record in header order
    pub fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(METADATA_COLUMNS.len() + self.values.len());
        row.push(self.meta.subject.clone());
        row.push(self.meta.condition.code().to_string());
        row.push(self.meta.trial.to_string());
        row.push(self.meta.filename.clone());
        row.extend(self.values.iter().map(|(_, v)| render_value(*v)));
        row
    }
}

/// Round to the table precision, folding negative zero
pub fn round_decimals(value: f64) -> f64 {
    let scale = 10f64.powi(DECIMALS);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn render_value(value: KpiValue) -> String {
    match value {
        KpiValue::Value(v) => format!("{:.*}", DECIMALS as usize, round_decimals(v)),
        KpiValue::NotComputable => MISSING_MARKER.to_string(),
    }
}
