//! Per-recording aggregation of epoch features

use crate::gate::FlatChannels;
use kpi_core::{
    round_decimals, AggregatedRecord, Criticality, FeatureVector, KpiKey, KpiSchema, KpiValue, RecordStatus,
    RecordingMeta, Scope,
};

/// Averages accepted-epoch features into one output row
#[derive(Debug, Clone)]
pub struct Aggregator {
    schema: KpiSchema,
}

impl Aggregator {
    pub fn new(schema: &KpiSchema) -> Self {
        Self { schema: schema.clone() }
    }

    /// Mean of every KPI over the epochs where it was computable.
    ///
    /// KPIs of a flat channel, and cross KPIs when either channel is flat,
    /// are not computable regardless of the epoch values.
    pub fn aggregate(&self, meta: RecordingMeta, epochs: &[FeatureVector], flat: FlatChannels) -> AggregatedRecord {
        let values: Vec<(KpiKey, KpiValue)> = self
            .schema
            .columns()
            .iter()
            .map(|&key| {
                let forced = match key.scope {
                    Scope::Cross => flat.any(),
                    Scope::Channel(channel) => flat.is_flat(channel),
                };
                let value = if forced {
                    KpiValue::NotComputable
                } else {
                    mean_computable(epochs, &key)
                };
                (key, value)
            })
            .collect();

        let retained = values
            .iter()
            .any(|(key, value)| value.is_computable() && self.schema.criticality(key.metric) == Criticality::Core);

        AggregatedRecord {
            meta,
            status: RecordStatus::Computed,
            values,
            retained,
        }
    }
}

fn mean_computable(epochs: &[FeatureVector], key: &KpiKey) -> KpiValue {
    let (sum, count) = epochs
        .iter()
        .filter_map(|features| features.get(key).value())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        KpiValue::NotComputable
    } else {
        KpiValue::from_f64(round_decimals(sum / count as f64))
    }
}
