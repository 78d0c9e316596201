//! Session results: in-memory record sequence plus the CSV contract.
//!
//! One file per session. Leading `#` comment lines carry session metadata,
//! then a fixed header, then one row per executed trial in execution order:
//!
//! ```text
//! # participant=jane
//! # seed=42
//! Module,TargetOrCheck,Condition,Flanker,Response,Correct,ReactionTimeSeconds
//! Letter,A,incongruent,C,left,true,0.4310
//! Letter,ATTENTION,,,clicked,true,0.8120
//! ```
//!
//! Reaction times are seconds with four decimals, empty when no response was
//! captured. Attention-check rows leave condition and flanker empty. Writes
//! go through a temp file and rename, so a replaced file is never truncated.

use crate::schedule::Condition;
use crate::trial::{ResponseKind, TrialOutcome, TrialSpec};
use std::fs;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

pub const CSV_HEADER: &str =
    "Module,TargetOrCheck,Condition,Flanker,Response,Correct,ReactionTimeSeconds";

/// Stands in for the target column on attention-check rows.
pub const ATTENTION_LABEL: &str = "ATTENTION";

/// One row of the results file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub module: String,
    pub target: String,
    pub condition: Option<Condition>,
    pub flanker: Option<String>,
    pub response: ResponseKind,
    pub correct: bool,
    pub reaction_seconds: Option<f64>,
}

impl TrialRecord {
    pub fn normal(spec: &TrialSpec, outcome: &TrialOutcome) -> Self {
        Self {
            module: spec.module.clone(),
            target: spec.target.clone(),
            condition: Some(spec.condition),
            flanker: Some(spec.flanker.clone()),
            response: outcome.response,
            correct: outcome.correct,
            reaction_seconds: outcome.reaction_seconds,
        }
    }

    pub fn check(module: &str, outcome: &TrialOutcome) -> Self {
        Self {
            module: module.to_string(),
            target: ATTENTION_LABEL.to_string(),
            condition: None,
            flanker: None,
            response: outcome.response,
            correct: outcome.correct,
            reaction_seconds: outcome.reaction_seconds,
        }
    }

    pub fn is_check(&self) -> bool {
        self.condition.is_none()
    }
}

/// Who ran, with what seed. Written as `# key=value` comment lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMeta {
    pub participant: String,
    pub age: Option<u32>,
    pub seed: Option<u64>,
    pub started_unix: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("line {line}: expected header `{CSV_HEADER}`")]
    BadHeader { line: usize },
    #[error("line {line}: {reason}")]
    BadRow { line: usize, reason: String },
}

/// Append-only record sequence for one session.
#[derive(Debug, Clone, Default)]
pub struct ResultsLog {
    pub meta: SessionMeta,
    records: Vec<TrialRecord>,
}

impl ResultsLog {
    pub fn new(meta: SessionMeta) -> Self {
        Self {
            meta,
            records: Vec::new(),
        }
    }

    pub fn append(&mut self, record: TrialRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rewrite the whole file. Called at block boundaries and session end, so
    /// a crash mid-session loses at most the unflushed block.
    pub fn write_csv(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("csv.tmp");
        let mut w = BufWriter::new(File::create(&tmp)?);

        writeln!(w, "# participant={}", self.meta.participant)?;
        if let Some(age) = self.meta.age {
            writeln!(w, "# age={age}")?;
        }
        if let Some(seed) = self.meta.seed {
            writeln!(w, "# seed={seed}")?;
        }
        if let Some(t) = self.meta.started_unix {
            writeln!(w, "# started_unix={t}")?;
        }
        writeln!(w, "{CSV_HEADER}")?;
        for record in &self.records {
            writeln!(w, "{}", format_row(record))?;
        }

        w.flush()?;
        drop(w);
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self, ReadError> {
        let reader = BufReader::new(File::open(path)?);
        let mut meta = SessionMeta::default();
        let mut records = Vec::new();
        let mut saw_header = false;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let lineno = idx + 1;
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                apply_meta(&mut meta, comment.trim());
                continue;
            }
            if !saw_header {
                if line != CSV_HEADER {
                    return Err(ReadError::BadHeader { line: lineno });
                }
                saw_header = true;
                continue;
            }
            records.push(parse_row(&line, lineno)?);
        }

        if !saw_header {
            return Err(ReadError::BadHeader { line: 0 });
        }
        Ok(Self { meta, records })
    }
}

fn apply_meta(meta: &mut SessionMeta, comment: &str) {
    let Some((key, value)) = comment.split_once('=') else {
        return;
    };
    match key {
        "participant" => meta.participant = value.to_string(),
        "age" => meta.age = value.parse().ok(),
        "seed" => meta.seed = value.parse().ok(),
        "started_unix" => meta.started_unix = value.parse().ok(),
        _ => {}
    }
}

fn format_row(record: &TrialRecord) -> String {
    let rt = record
        .reaction_seconds
        .map(|rt| format!("{rt:.4}"))
        .unwrap_or_default();
    [
        escape_field(&record.module),
        escape_field(&record.target),
        record.condition.map(|c| c.label()).unwrap_or("").to_string(),
        escape_field(record.flanker.as_deref().unwrap_or("")),
        record.response.label().to_string(),
        record.correct.to_string(),
        rt,
    ]
    .join(",")
}

fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn parse_row(line: &str, lineno: usize) -> Result<TrialRecord, ReadError> {
    let bad = |reason: &str| ReadError::BadRow {
        line: lineno,
        reason: reason.to_string(),
    };

    let fields = split_fields(line).map_err(|reason| ReadError::BadRow {
        line: lineno,
        reason,
    })?;
    if fields.len() != 7 {
        return Err(bad(&format!("expected 7 fields, got {}", fields.len())));
    }

    let condition = if fields[2].is_empty() {
        None
    } else {
        Some(Condition::from_label(&fields[2]).ok_or_else(|| bad("unknown condition"))?)
    };
    let flanker = if fields[3].is_empty() && condition.is_none() {
        None
    } else {
        Some(fields[3].clone())
    };
    let response = ResponseKind::from_label(&fields[4]).ok_or_else(|| bad("unknown response"))?;
    let correct = match fields[5].as_str() {
        "true" => true,
        "false" => false,
        _ => return Err(bad("correct must be true or false")),
    };
    let reaction_seconds = if fields[6].is_empty() {
        None
    } else {
        Some(
            fields[6]
                .parse::<f64>()
                .map_err(|_| bad("bad reaction time"))?,
        )
    };

    Ok(TrialRecord {
        module: fields[0].clone(),
        target: fields[1].clone(),
        condition,
        flanker,
        response,
        correct,
        reaction_seconds,
    })
}

fn split_fields(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("eriksen_{}_{}.csv", name, std::process::id()))
    }

    fn sample_log() -> ResultsLog {
        let mut log = ResultsLog::new(SessionMeta {
            participant: "jane".into(),
            age: Some(31),
            seed: Some(42),
            started_unix: Some(1_766_000_000),
        });
        log.append(TrialRecord {
            module: "Letter".into(),
            target: "A".into(),
            condition: Some(Condition::Incongruent),
            flanker: Some("C".into()),
            response: ResponseKind::Left,
            correct: true,
            reaction_seconds: Some(0.4315),
        });
        log.append(TrialRecord {
            module: "Letter".into(),
            target: ATTENTION_LABEL.into(),
            condition: None,
            flanker: None,
            response: ResponseKind::None,
            correct: false,
            reaction_seconds: None,
        });
        log.append(TrialRecord {
            module: "Letter, v2".into(),
            target: "\"D\"".into(),
            condition: Some(Condition::Neutral),
            flanker: Some("X".into()),
            response: ResponseKind::Right,
            correct: true,
            reaction_seconds: Some(1.25),
        });
        log
    }

    #[test]
    fn csv_round_trips_records_and_meta() {
        let path = temp_path("round_trip");
        let log = sample_log();
        log.write_csv(&path).unwrap();

        let back = ResultsLog::read_csv(&path).unwrap();
        assert_eq!(back.meta, log.meta);
        assert_eq!(back.records(), log.records());
        assert!(back.records()[1].is_check());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn rewrite_replaces_the_file() {
        let path = temp_path("rewrite");
        let mut log = sample_log();
        log.write_csv(&path).unwrap();
        log.append(TrialRecord {
            module: "Shape".into(),
            target: "square".into(),
            condition: Some(Condition::Congruent),
            flanker: Some("square".into()),
            response: ResponseKind::Left,
            correct: true,
            reaction_seconds: Some(0.5),
        });
        log.write_csv(&path).unwrap();

        let back = ResultsLog::read_csv(&path).unwrap();
        assert_eq!(back.len(), 4);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn reader_rejects_malformed_rows() {
        let path = temp_path("malformed");
        std::fs::write(
            &path,
            format!("{CSV_HEADER}\nLetter,A,upside-down,C,left,true,0.4\n"),
        )
        .unwrap();
        match ResultsLog::read_csv(&path) {
            Err(ReadError::BadRow { line: 2, .. }) => {}
            other => panic!("expected bad row, got {other:?}"),
        }
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn reader_requires_the_header() {
        let path = temp_path("no_header");
        std::fs::write(&path, "Letter,A,neutral,X,left,true,0.4\n").unwrap();
        assert!(matches!(
            ResultsLog::read_csv(&path),
            Err(ReadError::BadHeader { .. })
        ));
        std::fs::remove_file(&path).unwrap();
    }
}
