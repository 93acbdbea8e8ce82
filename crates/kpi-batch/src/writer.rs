//! KPI table writer

use anyhow::{anyhow, Context, Result};
use kpi_core::{AggregatedRecord, KpiSchema};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// CSV table with metadata columns followed by the schema's KPI columns
pub struct TableWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl TableWriter<File> {
    pub fn create(path: &Path, schema: &KpiSchema) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create output directory {}", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
        Self::from_writer(file, schema)
    }
}

impl<W: Write> TableWriter<W> {
    /// Wrap `inner` and write the header row
    pub fn from_writer(inner: W, schema: &KpiSchema) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer
            .write_record(AggregatedRecord::header(schema))
            .context("cannot write table header")?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write_record(&mut self, record: &AggregatedRecord) -> Result<()> {
        self.writer
            .write_record(record.to_row())
            .with_context(|| format!("cannot write row for {}", record.meta))?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far, excluding the header
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush().context("cannot flush KPI table")?;
        self.writer
            .into_inner()
            .map_err(|e| anyhow!("cannot flush KPI table: {}", e.error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpi_core::{Condition, Disqualification, FeatureGroup, RecordingMeta};

    #[test]
    fn test_header_and_rows() {
        let schema = KpiSchema::build(&[FeatureGroup::Time], &["stat_mean".to_string()]).unwrap();
        let mut writer = TableWriter::from_writer(Vec::new(), &schema).unwrap();

        let meta = RecordingMeta::new("S01", Condition::Negative, 2, "S01_B_002.txt");
        let record = AggregatedRecord::disqualified(meta, &schema, Disqualification::ShortRecording);
        writer.write_record(&record).unwrap();
        assert_eq!(writer.rows(), 1);

        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("subject,condition,trial,filename,"));
        assert_eq!(header.split(',').count(), 4 + schema.columns().len());
        let row = lines.next().unwrap();
        assert!(row.starts_with("S01,2,2,S01_B_002.txt,NaN"));
        assert!(lines.next().is_none());
    }
}
