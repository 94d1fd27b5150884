//! The per-task log file format (§4.6 "Per-task log", §6 "Task log file
//! format"): a header, one `[HH:MM:SS] message` line per progress event,
//! and a footer written on terminal transition. The file is the
//! authoritative source for Task state on restart, so every field the
//! orchestrator needs to rebuild a `TaskRecord` round-trips through it.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local, NaiveTime};
use uuid::Uuid;
use vaultkeeper_core::{TaskKind, TaskStatus, TaskSubmission};

const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Open a fresh log file for `submission` and write its header.
pub fn write_header(path: &Path, submission: &TaskSubmission, started_at: DateTime<Local>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "Task started: {}", started_at.format(TIMESTAMP_FMT))?;
    writeln!(file, "Type: {}", submission.kind)?;
    writeln!(file, "User: {}", submission.username)?;
    writeln!(file, "Data: {}", submission.data)?;
    writeln!(file)?;
    Ok(())
}

/// Append one progress line. Called at most once per emitted
/// `ProgressUpdate`; the orchestrator is responsible for any throttling
/// of the live stream, not of what lands in the file.
pub fn append_line(path: &Path, message: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().append(true).open(path)?;
    writeln!(file, "[{}] {}", Local::now().format("%H:%M:%S"), message)?;
    Ok(())
}

pub struct Footer<'a> {
    pub stopped: bool,
    pub final_status: TaskStatus,
    pub duration_secs: i64,
    pub progress_percentage: Option<u8>,
    pub current_step: Option<u64>,
    pub total_steps: Option<u64>,
    pub system: Option<&'a str>,
    pub stats: &'a BTreeMap<String, i64>,
}

/// Append the terminal footer. Idempotent only in the sense that calling
/// it twice appends two footers; callers must only call it once per Task.
pub fn write_footer(path: &Path, footer: &Footer<'_>, ended_at: DateTime<Local>) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().append(true).open(path)?;
    writeln!(file)?;
    let key = if footer.stopped { "Task stopped" } else { "Task ended" };
    writeln!(file, "{key}: {}", ended_at.format(TIMESTAMP_FMT))?;
    writeln!(file, "Status: {}", footer.final_status)?;
    writeln!(file, "Duration: {}s", footer.duration_secs)?;
    writeln!(file, "Final Status: {}", footer.final_status)?;
    writeln!(
        file,
        "Progress: {}",
        footer.progress_percentage.map(|p| p.to_string()).unwrap_or_default()
    )?;
    writeln!(
        file,
        "Current Step: {}",
        footer.current_step.map(|s| s.to_string()).unwrap_or_default()
    )?;
    writeln!(
        file,
        "Total Steps: {}",
        footer.total_steps.map(|s| s.to_string()).unwrap_or_default()
    )?;
    writeln!(file, "System: {}", footer.system.unwrap_or_default())?;
    writeln!(file, "Stats: {}", serde_json::to_string(footer.stats).unwrap_or_default())?;
    Ok(())
}

pub fn read_full(path: &Path) -> std::io::Result<String> {
    std::fs::read_to_string(path)
}

/// What history reload can recover by re-reading a log file on disk,
/// without any in-memory state from the prior process (§4.6 "History
/// reload").
#[derive(Debug, Clone)]
pub struct ParsedLog {
    pub id: Uuid,
    pub kind: Option<TaskKind>,
    pub username: Option<String>,
    pub data: Option<serde_json::Value>,
    pub started_at: Option<DateTime<Local>>,
    pub terminal_at: Option<DateTime<Local>>,
    pub final_status: Option<TaskStatus>,
    pub progress_percentage: Option<u8>,
    pub current_step: Option<u64>,
    pub total_steps: Option<u64>,
    pub system: Option<String>,
    pub stats: BTreeMap<String, i64>,
    /// true once a footer block was found; a log with no footer belonged
    /// to a Task that was still `running` when the prior process exited.
    pub has_footer: bool,
}

/// Parse `<task-id>.log` back into a `ParsedLog`. `id` comes from the file
/// stem, not from file contents, matching how the orchestrator names logs.
pub fn parse_log_file(path: &Path, id: Uuid) -> std::io::Result<ParsedLog> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_log_str(&contents, id))
}

fn parse_log_str(contents: &str, id: Uuid) -> ParsedLog {
    let mut parsed = ParsedLog {
        id,
        kind: None,
        username: None,
        data: None,
        started_at: None,
        terminal_at: None,
        final_status: None,
        progress_percentage: None,
        current_step: None,
        total_steps: None,
        system: None,
        stats: BTreeMap::new(),
        has_footer: false,
    };

    for line in contents.lines() {
        let Some((key, value)) = line.split_once(": ") else { continue };
        match key {
            "Task started" => parsed.started_at = parse_local_timestamp(value),
            "Type" => parsed.kind = TaskKind::from_str_loose(value),
            "User" => parsed.username = Some(value.to_string()),
            "Data" => parsed.data = serde_json::from_str(value).ok(),
            "Task ended" | "Task stopped" => {
                parsed.has_footer = true;
                parsed.terminal_at = parse_local_timestamp(value);
            }
            "Final Status" => parsed.final_status = parse_status(value),
            "Progress" => parsed.progress_percentage = value.parse().ok(),
            "Current Step" => parsed.current_step = value.parse().ok(),
            "Total Steps" => parsed.total_steps = value.parse().ok(),
            "System" => {
                if !value.is_empty() {
                    parsed.system = Some(value.to_string());
                }
            }
            "Stats" => parsed.stats = serde_json::from_str(value).unwrap_or_default(),
            _ => {}
        }
    }

    parsed
}

fn parse_local_timestamp(value: &str) -> Option<DateTime<Local>> {
    let naive = chrono::NaiveDateTime::parse_from_str(value, TIMESTAMP_FMT).ok()?;
    naive.and_local_timezone(Local).single()
}

fn parse_status(value: &str) -> Option<TaskStatus> {
    Some(match value {
        "idle" => TaskStatus::Idle,
        "queued" => TaskStatus::Queued,
        "running" => TaskStatus::Running,
        "completed" => TaskStatus::Completed,
        "error" => TaskStatus::Error,
        "stopped" => TaskStatus::Stopped,
        _ => return None,
    })
}

/// Extract `[HH:MM:SS]`-prefixed body lines, ignoring header/footer keys.
pub fn body_lines(contents: &str) -> Vec<(NaiveTime, String)> {
    let mut out = Vec::new();
    for line in contents.lines() {
        let Some(rest) = line.strip_prefix('[') else { continue };
        let Some((ts, msg)) = rest.split_once("] ") else { continue };
        if let Ok(time) = NaiveTime::parse_from_str(ts, "%H:%M:%S") {
            out.push((time, msg.to_string()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn submission() -> TaskSubmission {
        TaskSubmission {
            id: Uuid::new_v4(),
            kind: TaskKind::Scraping,
            username: "alice".to_string(),
            system: Some("snes".to_string()),
            data: serde_json::json!({"paths": ["a.zip"]}),
        }
    }

    #[test]
    fn writes_and_parses_header_and_footer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.log");
        let submission = submission();
        let now = Local::now();

        write_header(&path, &submission, now).unwrap();
        append_line(&path, "loaded platform view").unwrap();
        append_line(&path, "matched 10/20").unwrap();

        let mut stats = BTreeMap::new();
        stats.insert("matched".to_string(), 10);
        write_footer(
            &path,
            &Footer {
                stopped: false,
                final_status: TaskStatus::Completed,
                duration_secs: 42,
                progress_percentage: Some(100),
                current_step: Some(20),
                total_steps: Some(20),
                system: Some("snes"),
                stats: &stats,
            },
            now,
        )
        .unwrap();

        let parsed = parse_log_file(&path, submission.id).unwrap();
        assert_eq!(parsed.kind, Some(TaskKind::Scraping));
        assert_eq!(parsed.username.as_deref(), Some("alice"));
        assert!(parsed.has_footer);
        assert_eq!(parsed.final_status, Some(TaskStatus::Completed));
        assert_eq!(parsed.progress_percentage, Some(100));
        assert_eq!(parsed.system.as_deref(), Some("snes"));
        assert_eq!(parsed.stats.get("matched"), Some(&10));

        let contents = read_full(&path).unwrap();
        let lines = body_lines(&contents);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].1, "matched 10/20");
    }

    #[test]
    fn missing_footer_means_still_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.log");
        let submission = submission();
        write_header(&path, &submission, Local::now()).unwrap();
        append_line(&path, "scanning").unwrap();

        let parsed = parse_log_file(&path, submission.id).unwrap();
        assert!(!parsed.has_footer);
        assert_eq!(parsed.final_status, None);
    }
}
