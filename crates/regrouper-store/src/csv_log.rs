//! CSV-backed audit log

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Terminator, WriterBuilder};
use regrouper_util::{AgentId, GroupId};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{AuditSink, MoveMode, MoveRecord, StoreError, StoreResult};

/// Column names, in file order
pub const AUDIT_HEADER: [&str; 7] = [
    "timestamp",
    "hostname",
    "category",
    "agentid",
    "groupid_moved_from",
    "groupid_moved_to",
    "mode",
];

/// Append-only CSV audit log.
///
/// The header is written only when the file is new or empty. Each row is
/// encoded in memory and handed to the file with a single write, so a
/// failed append never leaves bytes behind that a later append would
/// flush. If a failed write leaves a partial row that cannot be truncated
/// away, the next append terminates it first.
pub struct CsvAuditLog {
    path: PathBuf,
    file: Mutex<LogFile>,
}

struct LogFile {
    file: File,
    /// The last write failed and may have left a partial row
    torn: bool,
}

impl CsvAuditLog {
    /// Open or create an audit log at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = open_for_append(&path)?;
        let len = file.metadata()?.len();

        if len == 0 {
            file.write_all(&encode_row(AUDIT_HEADER)?)?;
            file.flush()?;
            info!(path = %path.display(), "Created audit log");
        } else {
            // A crash mid-row leaves a fragment without a trailing newline;
            // terminate it so the next row starts on its own line.
            terminate_partial_row(&mut file)?;
            debug!(path = %path.display(), bytes = len, "Appending to existing audit log");
        }

        Ok(Self {
            path,
            file: Mutex::new(LogFile { file, torn: false }),
        })
    }

    #[cfg(test)]
    fn replace_file(&self, file: File) {
        if let Ok(mut log) = self.file.lock() {
            log.file = file;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record from an audit log file
    pub fn read_all(path: impl AsRef<Path>) -> StoreResult<Vec<MoveRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row?;
            let row_number = index + 1;
            let field = |i: usize| {
                row.get(i).ok_or_else(|| StoreError::MalformedRow {
                    row: row_number,
                    message: format!("missing column '{}'", AUDIT_HEADER[i]),
                })
            };

            let timestamp = DateTime::parse_from_rfc3339(field(0)?)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StoreError::MalformedRow {
                    row: row_number,
                    message: e.to_string(),
                })?;
            let mode = field(6)?
                .parse::<MoveMode>()
                .map_err(|message| StoreError::MalformedRow {
                    row: row_number,
                    message,
                })?;

            records.push(MoveRecord {
                timestamp,
                hostname: field(1)?.to_string(),
                category: field(2)?.to_string(),
                agent_id: AgentId::new(field(3)?),
                from_group: GroupId::new(field(4)?),
                to_group: GroupId::new(field(5)?),
                mode,
            });
        }

        Ok(records)
    }
}

fn open_for_append(path: &Path) -> StoreResult<File> {
    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .read(true)
        .open(path)?)
}

/// Encode one CSV row, newline-terminated
fn encode_row<I, T>(fields: I) -> StoreResult<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))
}

/// Append a newline if the file does not end with one
fn terminate_partial_row(file: &mut File) -> StoreResult<()> {
    if file.metadata()?.len() == 0 {
        return Ok(());
    }

    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        warn!("Audit log ends with a partial row, terminating it");
        file.write_all(b"\n")?;
        file.flush()?;
    }
    Ok(())
}

impl AuditSink for CsvAuditLog {
    fn append(&self, record: &MoveRecord) -> StoreResult<()> {
        let timestamp = record.timestamp.to_rfc3339();
        let row = encode_row([
            timestamp.as_str(),
            record.hostname.as_str(),
            record.category.as_str(),
            record.agent_id.as_str(),
            record.from_group.as_str(),
            record.to_group.as_str(),
            record.mode.as_str(),
        ])?;

        let mut log = self.file.lock().map_err(|_| StoreError::LockPoisoned)?;

        if log.torn {
            terminate_partial_row(&mut log.file)?;
            log.torn = false;
        }

        let len = log.file.metadata()?.len();
        let written = log.file.write_all(&row).and_then(|()| log.file.flush());
        if let Err(e) = written {
            // Drop whatever part of the row made it to disk
            if log.file.set_len(len).is_err() {
                log.torn = true;
            }
            return Err(e.into());
        }

        debug!(
            agent_id = %record.agent_id,
            to_group = %record.to_group,
            "Move record appended"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: usize) -> MoveRecord {
        MoveRecord::new(
            format!("host-{n}"),
            "Lab Machines",
            AgentId::new(format!("agent-{n}")),
            GroupId::new("z"),
            GroupId::new("a"),
            MoveMode::Live,
        )
    }

    fn header_count(path: &Path) -> usize {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|l| l.starts_with("timestamp,"))
            .count()
    }

    #[test]
    fn test_creates_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("moves.csv");

        let log = CsvAuditLog::open(&path).unwrap();
        assert_eq!(log.path(), path);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("{}\n", AUDIT_HEADER.join(",")));
    }

    #[test]
    fn test_append_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moves.csv");

        {
            let log = CsvAuditLog::open(&path).unwrap();
            log.append(&record(1)).unwrap();
            log.append(&record(2)).unwrap();
        }
        {
            let log = CsvAuditLog::open(&path).unwrap();
            log.append(&record(3)).unwrap();
        }

        assert_eq!(header_count(&path), 1);
        let records = CsvAuditLog::read_all(&path).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["agent-1", "agent-2", "agent-3"]);
        assert_eq!(records[0].category, "Lab Machines");
        assert_eq!(records[0].mode, MoveMode::Live);
    }

    #[test]
    fn test_empty_existing_file_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moves.csv");
        File::create(&path).unwrap();

        let log = CsvAuditLog::open(&path).unwrap();
        log.append(&record(1)).unwrap();

        assert_eq!(header_count(&path), 1);
        assert_eq!(CsvAuditLog::read_all(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_torn_last_line_is_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moves.csv");
        {
            let log = CsvAuditLog::open(&path).unwrap();
            log.append(&record(1)).unwrap();
        }
        // Simulate a crash mid-row
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"2024-01-01T00:00:00+00:00,partial").unwrap();
        }

        let log = CsvAuditLog::open(&path).unwrap();
        log.append(&record(2)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let last = content.lines().last().unwrap();
        assert!(last.contains("agent-2"));
        assert!(content.contains("partial\n"));
        assert_eq!(header_count(&path), 1);
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moves.csv");
        let log = CsvAuditLog::open(&path).unwrap();

        let mut r = record(1);
        r.category = "Servers, production".into();
        log.append(&r).unwrap();

        let records = CsvAuditLog::read_all(&path).unwrap();
        assert_eq!(records[0].category, "Servers, production");
    }

    #[test]
    fn test_failed_append_is_not_written_later() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moves.csv");
        let log = CsvAuditLog::open(&path).unwrap();
        log.append(&record(1)).unwrap();

        // A read-only handle makes every write fail
        log.replace_file(File::open(&path).unwrap());
        assert!(log.append(&record(2)).is_err());
        assert!(log.append(&record(3)).is_err());

        log.replace_file(open_for_append(&path).unwrap());
        log.append(&record(4)).unwrap();

        let ids: Vec<_> = CsvAuditLog::read_all(&path)
            .unwrap()
            .into_iter()
            .map(|r| r.agent_id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["agent-1", "agent-4"]);
    }

    #[test]
    fn test_partial_row_after_failure_is_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moves.csv");
        let log = CsvAuditLog::open(&path).unwrap();
        log.append(&record(1)).unwrap();

        log.replace_file(File::open(&path).unwrap());
        assert!(log.append(&record(2)).is_err());

        // A short write that could not be rolled back
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"2026-10-19T02:36:").unwrap();
        }
        log.replace_file(open_for_append(&path).unwrap());
        log.append(&record(3)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "2026-10-19T02:36:");
        assert!(lines[3].contains("agent-3"));
        assert!(!content.contains("agent-2"));
    }
}
