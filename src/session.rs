//! Detection session ledger.
//!
//! This module provides `SessionAccumulator`, the append-only record of
//! every box detected since the session started or was last cleared.
//!
//! The accumulator is responsible for:
//! - Assigning each box a session-wide sequence index, starting at 1
//! - Remembering the source label the box came from
//! - Exporting the ledger as a spreadsheet-friendly CSV file
//!
//! The accumulator MUST NOT:
//! - Deduplicate, reorder, or re-score boxes
//! - Retain frames

use std::path::Path;

use crate::detect::DetectionBox;
use crate::error::{Error, Result};

/// Export column headers, in ledger order.
pub const CSV_HEADERS: [&str; 5] = ["序号", "文件路径", "类别", "置信度", "坐标位置"];

/// One detected box, as remembered by the session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionRecord {
    /// 1-based position in the session ledger.
    pub sequence_index: u64,
    /// Label of the originating media at the time of detection.
    pub source_label: String,
    pub class_name: String,
    pub confidence: f32,
    /// Corners truncated to whole pixels.
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// Append-only box ledger for one operator session.
#[derive(Debug)]
pub struct SessionAccumulator {
    records: Vec<SessionRecord>,
    next_index: u64,
}

impl Default for SessionAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAccumulator {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_index: 1,
        }
    }

    /// Record every box of one frame result under the given source
    /// label. Boxes keep their emitted order; indexes keep counting
    /// across frames and across source switches.
    pub fn append(&mut self, source_label: &str, boxes: &[DetectionBox]) {
        for b in boxes {
            self.records.push(SessionRecord {
                sequence_index: self.next_index,
                source_label: source_label.to_string(),
                class_name: b.class_name.clone(),
                confidence: b.confidence,
                x1: b.x1 as i32,
                y1: b.y1 as i32,
                x2: b.x2 as i32,
                y2: b.y2 as i32,
            });
            self.next_index += 1;
        }
    }

    /// Drop every record and restart sequence numbering at 1.
    pub fn clear(&mut self) {
        let dropped = self.records.len();
        self.records.clear();
        self.next_index = 1;
        log::info!("session cleared ({} record(s) dropped)", dropped);
    }

    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the ledger as CSV. The file opens with a UTF-8 BOM so
    /// spreadsheet tools detect the encoding; an empty session still
    /// produces the header row.
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        use std::io::Write;

        let mut file = std::fs::File::create(path)
            .map_err(|e| Error::Export(format!("create {}: {}", path.display(), e)))?;
        file.write_all(b"\xEF\xBB\xBF")
            .map_err(|e| Error::Export(format!("write {}: {}", path.display(), e)))?;

        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(CSV_HEADERS)
            .map_err(|e| Error::Export(format!("write {}: {}", path.display(), e)))?;
        for record in &self.records {
            writer
                .write_record([
                    record.sequence_index.to_string(),
                    record.source_label.clone(),
                    record.class_name.clone(),
                    format!("{:.2}", record.confidence),
                    format!(
                        "({}, {}, {}, {})",
                        record.x1, record.y1, record.x2, record.y2
                    ),
                ])
                .map_err(|e| Error::Export(format!("write {}: {}", path.display(), e)))?;
        }
        writer
            .flush()
            .map_err(|e| Error::Export(format!("flush {}: {}", path.display(), e)))?;

        log::info!("exported {} record(s) to {}", self.records.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_box(class_name: &str, confidence: f32) -> DetectionBox {
        DetectionBox {
            x1: 10.7,
            y1: 20.2,
            x2: 110.9,
            y2: 220.5,
            confidence,
            class_id: 0,
            class_name: class_name.to_string(),
        }
    }

    #[test]
    fn indexes_count_across_frames_and_sources() {
        let mut session = SessionAccumulator::new();
        session.append("a.jpg", &[make_box("person", 0.9), make_box("vehicle", 0.8)]);
        session.append("Camera Source 0", &[make_box("animal", 0.7)]);

        let indexes: Vec<u64> = session.records().iter().map(|r| r.sequence_index).collect();
        assert_eq!(indexes, [1, 2, 3]);
        assert_eq!(session.records()[2].source_label, "Camera Source 0");
    }

    #[test]
    fn coordinates_are_truncated_to_whole_pixels() {
        let mut session = SessionAccumulator::new();
        session.append("a.jpg", &[make_box("person", 0.9)]);

        let r = &session.records()[0];
        assert_eq!((r.x1, r.y1, r.x2, r.y2), (10, 20, 110, 220));
    }

    #[test]
    fn empty_box_list_appends_nothing() {
        let mut session = SessionAccumulator::new();
        session.append("a.jpg", &[]);
        assert!(session.is_empty());
    }

    #[test]
    fn clear_restarts_numbering_at_one() {
        let mut session = SessionAccumulator::new();
        session.append("a.jpg", &[make_box("person", 0.9)]);
        session.clear();
        assert!(session.is_empty());

        session.append("b.jpg", &[make_box("vehicle", 0.6)]);
        assert_eq!(session.records()[0].sequence_index, 1);
    }

    #[test]
    fn csv_export_layout() -> anyhow::Result<()> {
        let mut session = SessionAccumulator::new();
        session.append("a.jpg", &[make_box("person", 0.876)]);

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.csv");
        session.export_csv(&path)?;

        let bytes = std::fs::read(&path)?;
        assert!(bytes.starts_with(b"\xEF\xBB\xBF"));

        let text = String::from_utf8(bytes[3..].to_vec())?;
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("序号,文件路径,类别,置信度,坐标位置"));
        assert_eq!(
            lines.next(),
            Some("1,a.jpg,person,0.88,\"(10, 20, 110, 220)\"")
        );
        assert_eq!(lines.next(), None);
        Ok(())
    }

    #[test]
    fn empty_session_exports_header_only() -> anyhow::Result<()> {
        let session = SessionAccumulator::new();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("empty.csv");
        session.export_csv(&path)?;

        let bytes = std::fs::read(&path)?;
        let text = String::from_utf8(bytes[3..].to_vec())?;
        assert_eq!(text.lines().count(), 1);
        Ok(())
    }
}
