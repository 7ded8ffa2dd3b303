//! CSV sinks for streamed catalog chunks.
//!
//! The first chunk creates (or truncates) the file and writes the header;
//! later chunks append. Each chunk is flushed before the call returns, so a
//! failure part-way through a stream leaves every earlier chunk on disk.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use etas_types::{InfoColumn, OutputFormat, SimulatedEvent};

/// Timestamp layout of plain output.
const PLAIN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Timestamp layout of csep output.
const CSEP_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Writes catalog chunks to one CSV file.
#[derive(Debug)]
pub struct ChunkWriter {
    path: PathBuf,
    format: OutputFormat,
    info_columns: Vec<InfoColumn>,
    with_catalog_id: bool,
    magnitude_decimals: usize,
    chunks_written: usize,
    rows_written: usize,
}

impl ChunkWriter {
    /// Create a writer; nothing touches the disk until the first chunk.
    ///
    /// Plain output only carries a `catalog_id` column when more than one
    /// realization is simulated. Info columns are ignored for csep output.
    pub fn new(
        path: impl Into<PathBuf>,
        format: OutputFormat,
        info_columns: Vec<InfoColumn>,
        n_realizations: u32,
        magnitude_decimals: usize,
    ) -> Self {
        Self {
            path: path.into(),
            format,
            info_columns,
            with_catalog_id: n_realizations != 1,
            magnitude_decimals,
            chunks_written: 0,
            rows_written: 0,
        }
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of event rows written so far.
    pub const fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// The header line, without a trailing newline.
    pub fn header(&self) -> String {
        match self.format {
            OutputFormat::Csep => "lon,lat,m,time,depth,catalog_id,event_id".to_owned(),
            OutputFormat::Plain => {
                let mut columns = vec!["id", "latitude", "longitude", "time", "magnitude"];
                columns.extend(self.info_columns.iter().map(|c| c.name()));
                if self.with_catalog_id {
                    columns.push("catalog_id");
                }
                columns.join(",")
            }
        }
    }

    /// One data line, without a trailing newline.
    pub fn format_row(&self, row: &SimulatedEvent) -> String {
        let event = &row.event;
        let precision = self.magnitude_decimals;
        match self.format {
            OutputFormat::Csep => format!(
                "{},{},{:.precision$},{},0,{},{}",
                event.longitude,
                event.latitude,
                event.magnitude,
                event.time.format(CSEP_TIME_FORMAT),
                row.catalog_id,
                event.id,
            ),
            OutputFormat::Plain => {
                let mut fields = vec![
                    event.id.to_string(),
                    event.latitude.to_string(),
                    event.longitude.to_string(),
                    event.time.format(PLAIN_TIME_FORMAT).to_string(),
                    format!("{:.precision$}", event.magnitude),
                ];
                fields.extend(self.info_columns.iter().map(|c| c.value(event)));
                if self.with_catalog_id {
                    fields.push(row.catalog_id.to_string());
                }
                fields.join(",")
            }
        }
    }

    /// Write one chunk of rows and flush it.
    pub fn write_chunk(&mut self, rows: &[SimulatedEvent]) -> std::io::Result<()> {
        let first = self.chunks_written == 0;
        let missing_dir = self.path.parent().filter(|d| first && !d.as_os_str().is_empty());
        if let Some(dir) = missing_dir {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(first)
            .append(!first)
            .open(&self.path)?;
        let mut out = BufWriter::new(file);
        if first {
            writeln!(out, "{}", self.header())?;
        }
        for row in rows {
            writeln!(out, "{}", self.format_row(row))?;
        }
        out.flush()?;

        self.chunks_written = self.chunks_written.saturating_add(1);
        self.rows_written = self.rows_written.saturating_add(rows.len());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use etas_types::{Event, EventId, RealizationId};

    use super::*;

    fn row(catalog_id: u32, id: u64) -> SimulatedEvent {
        SimulatedEvent {
            catalog_id: RealizationId::new(catalog_id),
            event: Event {
                id: EventId::new(id),
                time: NaiveDate::from_ymd_opt(2022, 5, 17)
                    .unwrap()
                    .and_hms_micro_opt(8, 30, 0, 250)
                    .unwrap(),
                latitude: 46.5,
                longitude: 8.25,
                magnitude: 2.3,
                generation: 1,
                parent: EventId::new(3),
                gen_0_parent: EventId::new(3),
                is_background: false,
                xi_plus_1: 1.0,
                expected_n_aftershocks: 0.5,
                n_aftershocks: 0,
                origin_id: None,
            },
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("etas-output-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn plain_layout() {
        let writer = ChunkWriter::new(
            "unused.csv",
            OutputFormat::Plain,
            vec![InfoColumn::IsBackground, InfoColumn::Generation],
            3,
            1,
        );
        assert_eq!(
            writer.header(),
            "id,latitude,longitude,time,magnitude,is_background,generation,catalog_id"
        );
        assert_eq!(
            writer.format_row(&row(2, 7)),
            "7,46.5,8.25,2022-05-17 08:30:00.000250,2.3,false,1,2"
        );
    }

    #[test]
    fn single_realization_plain_has_no_catalog_id() {
        let writer = ChunkWriter::new("unused.csv", OutputFormat::Plain, Vec::new(), 1, 1);
        assert_eq!(writer.header(), "id,latitude,longitude,time,magnitude");
        assert!(!writer.format_row(&row(0, 1)).ends_with(",0"));
    }

    #[test]
    fn csep_layout() {
        let writer = ChunkWriter::new("unused.csv", OutputFormat::Csep, Vec::new(), 1, 1);
        assert_eq!(writer.header(), "lon,lat,m,time,depth,catalog_id,event_id");
        assert_eq!(
            writer.format_row(&row(0, 4)),
            "8.25,46.5,2.3,2022-05-17T08:30:00.000250,0,0,4"
        );
    }

    #[test]
    fn first_chunk_truncates_later_chunks_append() {
        let path = temp_path("catalogs.csv");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale\n").unwrap();

        let mut writer = ChunkWriter::new(&path, OutputFormat::Csep, Vec::new(), 2, 1);
        writer.write_chunk(&[row(0, 1), row(0, 2)]).unwrap();
        writer.write_chunk(&[]).unwrap();
        writer.write_chunk(&[row(1, 1)]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines.first().copied(), Some("lon,lat,m,time,depth,catalog_id,event_id"));
        assert!(!text.contains("stale"));
        assert_eq!(writer.rows_written(), 3);
        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn missing_directories_are_created() {
        let root = temp_path("nested");
        let path = root.join("deeper").join("out.csv");
        let mut writer = ChunkWriter::new(&path, OutputFormat::Plain, Vec::new(), 1, 1);
        writer.write_chunk(&[row(0, 1)]).unwrap();
        assert!(path.exists());
        fs::remove_dir_all(root.parent().unwrap()).unwrap();
    }
}
