//! Per-profile answer statistics
//!
//! Every resolved answer lands here, counted per table and per operation
//! family. Areas with enough samples and a poor success rate are reported as
//! weak and can seed a training session.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sim::{AnswerRecord, OperationConfig, OperationType};

/// Samples needed before an area can be judged
pub const MIN_SAMPLES: u32 = 10;
/// Success rate under which an area is weak
pub const WEAK_THRESHOLD: f64 = 0.7;
/// Distinct mistakes remembered per profile
pub const MAX_FREQUENT_ERRORS: usize = 20;

/// Correct/wrong tally for one table or operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AreaCounters {
    pub correct: u32,
    pub wrong: u32,
    pub total_response_time_ms: u64,
}

impl AreaCounters {
    fn record(&mut self, correct: bool, response_time_ms: u64) {
        if correct {
            self.correct += 1;
        } else {
            self.wrong += 1;
        }
        self.total_response_time_ms += response_time_ms;
    }

    pub fn total(&self) -> u32 {
        self.correct + self.wrong
    }

    pub fn success_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.correct as f64 / n as f64,
        }
    }

    pub fn average_response_ms(&self) -> u64 {
        match self.total() {
            0 => 0,
            n => self.total_response_time_ms / n as u64,
        }
    }
}

/// A table or an operation family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Area {
    Table(i32),
    Operation(OperationType),
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Area::Table(n) => write!(f, "table of {}", n),
            Area::Operation(op) => write!(f, "{}", op.as_str()),
        }
    }
}

/// An area the player struggles with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeakArea {
    pub area: Area,
    pub success_rate: f64,
    pub samples: u32,
}

/// A question the player keeps missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequentError {
    pub question: String,
    pub correct_answer: i32,
    /// Most recent wrong answer
    pub given_answer: i32,
    pub count: u32,
}

/// Everything recorded for one profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatedStats {
    pub by_table: BTreeMap<i32, AreaCounters>,
    pub by_operation: BTreeMap<OperationType, AreaCounters>,
    /// Most frequent first
    pub frequent_errors: Vec<FrequentError>,
}

impl AggregatedStats {
    pub fn record(&mut self, record: &AnswerRecord, correct: bool) {
        let rt = record.response_time_ms;
        self.by_operation
            .entry(record.operator.operation_type())
            .or_default()
            .record(correct, rt);
        if let Some(table) = record.table {
            self.by_table.entry(table).or_default().record(correct, rt);
        }

        if let (false, Some(given)) = (correct, record.given_answer) {
            self.note_error(record, given);
        }
    }

    fn note_error(&mut self, record: &AnswerRecord, given: i32) {
        let existing = self
            .frequent_errors
            .iter()
            .position(|e| e.question == record.question);
        let entry = match existing {
            Some(i) => {
                let mut entry = self.frequent_errors.remove(i);
                entry.count += 1;
                entry.given_answer = given;
                entry
            }
            None => FrequentError {
                question: record.question.clone(),
                correct_answer: record.correct_answer,
                given_answer: given,
                count: 1,
            },
        };

        // Ahead of ties, so fresh mistakes survive the trim
        let at = self
            .frequent_errors
            .iter()
            .position(|e| e.count <= entry.count)
            .unwrap_or(self.frequent_errors.len());
        self.frequent_errors.insert(at, entry);
        self.frequent_errors.truncate(MAX_FREQUENT_ERRORS);
    }

    pub fn total_answers(&self) -> u32 {
        self.by_operation.values().map(AreaCounters::total).sum()
    }

    /// Areas with at least `MIN_SAMPLES` answers and a success rate below
    /// `WEAK_THRESHOLD`, weakest first
    pub fn weak_areas(&self) -> Vec<WeakArea> {
        let tables = self
            .by_table
            .iter()
            .map(|(&t, c)| (Area::Table(t), c));
        let operations = self
            .by_operation
            .iter()
            .map(|(&op, c)| (Area::Operation(op), c));

        let mut weak: Vec<WeakArea> = tables
            .chain(operations)
            .filter(|(_, c)| c.total() >= MIN_SAMPLES && c.success_rate() < WEAK_THRESHOLD)
            .map(|(area, c)| WeakArea {
                area,
                success_rate: c.success_rate(),
                samples: c.total(),
            })
            .collect();
        weak.sort_by(|a, b| a.success_rate.total_cmp(&b.success_rate));
        weak
    }
}

/// Build a drill restricted to the weak areas. `None` when nothing is weak.
///
/// Weak tables become the table set. The weakest weak operation picks the
/// family. When only tables are weak the configured family is kept if it
/// draws from tables, otherwise the drill is multiplication.
pub fn training_config(weak: &[WeakArea], fallback: &OperationConfig) -> Option<OperationConfig> {
    if weak.is_empty() {
        return None;
    }

    let tables: Vec<i32> = weak
        .iter()
        .filter_map(|w| match w.area {
            Area::Table(t) => Some(t),
            Area::Operation(_) => None,
        })
        .collect();
    let op = weak
        .iter()
        .find_map(|w| match w.area {
            Area::Operation(op) => Some(op),
            Area::Table(_) => None,
        })
        .unwrap_or(if fallback.op.uses_tables() {
            fallback.op
        } else {
            OperationType::Multiplication
        });

    let mut config = fallback.clone();
    config.op = op;
    if !tables.is_empty() {
        config.tables = tables.into_iter().collect();
    }
    Some(config)
}
