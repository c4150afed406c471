//! Arithmetic question generation
//!
//! Every question is built so its answer is an exact integer. Uniqueness
//! against the answers already on screen is best effort: after
//! `MAX_GENERATION_ATTEMPTS` the last candidate is accepted as is.

use std::collections::{BTreeSet, HashSet};

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::consts::MAX_GENERATION_ATTEMPTS;

/// Arithmetic operator of a generated question
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Mul,
    Add,
    Sub,
    Div,
    Frac,
    Pct,
    Pow,
}

impl Operator {
    /// Symbol shown between operands
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Mul => "×",
            Operator::Add => "+",
            Operator::Sub => "−",
            Operator::Div => "÷",
            Operator::Frac => "frac",
            Operator::Pct => "%",
            Operator::Pow => "^",
        }
    }

    /// The single-operation family that produces this operator
    pub fn operation_type(&self) -> OperationType {
        match self {
            Operator::Mul => OperationType::Multiplication,
            Operator::Add => OperationType::Addition,
            Operator::Sub => OperationType::Subtraction,
            Operator::Div => OperationType::Division,
            Operator::Frac => OperationType::Fractions,
            Operator::Pct => OperationType::Percentages,
            Operator::Pow => OperationType::Powers,
        }
    }
}

/// A generated question. Immutable once minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub answer: i32,
    pub operator: Operator,
    /// Multiplication/division factor, for weak-table analytics
    pub table: Option<i32>,
}

/// Operation family selected for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    #[default]
    Multiplication,
    Addition,
    Subtraction,
    Division,
    Combined,
    Fractions,
    Percentages,
    Powers,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Multiplication => "multiplication",
            OperationType::Addition => "addition",
            OperationType::Subtraction => "subtraction",
            OperationType::Division => "division",
            OperationType::Combined => "combined",
            OperationType::Fractions => "fractions",
            OperationType::Percentages => "percentages",
            OperationType::Powers => "powers",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "multiplication" | "mul" => Some(OperationType::Multiplication),
            "addition" | "add" => Some(OperationType::Addition),
            "subtraction" | "sub" => Some(OperationType::Subtraction),
            "division" | "div" => Some(OperationType::Division),
            "combined" | "mixed" => Some(OperationType::Combined),
            "fractions" | "frac" => Some(OperationType::Fractions),
            "percentages" | "pct" => Some(OperationType::Percentages),
            "powers" | "pow" => Some(OperationType::Powers),
            _ => None,
        }
    }

    /// Whether this family draws from the configured tables
    pub fn uses_tables(&self) -> bool {
        matches!(
            self,
            OperationType::Multiplication | OperationType::Division | OperationType::Combined
        )
    }
}

/// Operand size for addition and subtraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitCount {
    #[default]
    One,
    Two,
}

/// Tables used when a table-based family is configured without any
static DEFAULT_TABLES: [i32; 5] = [1, 2, 3, 4, 5];

/// Per-session operation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationConfig {
    pub op: OperationType,
    pub tables: BTreeSet<i32>,
    pub digit_count: DigitCount,
    pub allow_negatives: bool,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            op: OperationType::Multiplication,
            tables: DEFAULT_TABLES.iter().copied().collect(),
            digit_count: DigitCount::One,
            allow_negatives: false,
        }
    }
}

impl OperationConfig {
    /// Multiplication drill over the given tables
    pub fn multiplication(tables: impl IntoIterator<Item = i32>) -> Self {
        Self {
            op: OperationType::Multiplication,
            tables: tables.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_op(op: OperationType) -> Self {
        Self {
            op,
            ..Self::default()
        }
    }
}

/// Fraction table: (numerator, denominator, label, bases divisible by the denominator)
const FRACTIONS: [(i32, i32, &str, &[i32]); 7] = [
    (1, 2, "½", &[2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 22, 24, 26, 28, 30]),
    (1, 3, "⅓", &[3, 6, 9, 12, 15, 18, 21, 24, 27, 30]),
    (1, 4, "¼", &[4, 8, 12, 16, 20, 24, 28, 32, 36, 40]),
    (1, 5, "⅕", &[5, 10, 15, 20, 25, 30, 35, 40, 45, 50]),
    (1, 10, "1/10", &[10, 20, 30, 40, 50, 60, 70, 80, 90, 100]),
    (2, 3, "⅔", &[3, 6, 9, 12, 15, 18, 21, 24, 27, 30]),
    (3, 4, "¾", &[4, 8, 12, 16, 20, 24, 28, 32, 36, 40]),
];

/// Percentage table: (percent, bases giving an integer result)
const PERCENTAGES: [(i32, &[i32]); 6] = [
    (10, &[10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120]),
    (20, &[5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55, 60]),
    (25, &[4, 8, 12, 16, 20, 24, 28, 32, 36, 40, 44, 48]),
    (50, &[2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 22, 24, 26, 28, 30]),
    (75, &[4, 8, 12, 16, 20, 24, 28, 32, 36, 40]),
    (100, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 15, 20, 25]),
];

/// Power table: (base, allowed exponents)
const POWERS: [(i32, &[u32]); 11] = [
    (2, &[2, 3, 4, 5, 6]),
    (3, &[2, 3, 4]),
    (4, &[2, 3]),
    (5, &[2, 3]),
    (6, &[2]),
    (7, &[2]),
    (8, &[2]),
    (9, &[2]),
    (10, &[2, 3]),
    (11, &[2]),
    (12, &[2]),
];

fn superscript(exponent: u32) -> String {
    match exponent {
        2 => "²".to_string(),
        3 => "³".to_string(),
        4 => "⁴".to_string(),
        5 => "⁵".to_string(),
        6 => "⁶".to_string(),
        n => format!("^{}", n),
    }
}

/// Mints questions for one operation config
#[derive(Debug, Clone, Copy)]
pub struct QuestionGenerator<'a> {
    config: &'a OperationConfig,
}

impl<'a> QuestionGenerator<'a> {
    pub fn new(config: &'a OperationConfig) -> Self {
        Self { config }
    }

    /// Generate a question whose answer avoids `existing`, retrying up to
    /// `MAX_GENERATION_ATTEMPTS` times before accepting a duplicate.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R, existing: &HashSet<i32>) -> Question {
        let mut question = self.generate_once(rng);
        let mut attempts = 1;
        while existing.contains(&question.answer) && attempts < MAX_GENERATION_ATTEMPTS {
            question = self.generate_once(rng);
            attempts += 1;
        }
        if existing.contains(&question.answer) {
            log::debug!(
                "No unique answer after {} attempts, accepting duplicate {}",
                attempts,
                question.answer
            );
        }
        question
    }

    fn generate_once<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
        match self.config.op {
            OperationType::Multiplication => self.multiplication(rng),
            OperationType::Addition => self.addition(rng),
            OperationType::Subtraction => self.subtraction(rng),
            OperationType::Division => self.division(rng),
            OperationType::Combined => self.combined(rng),
            OperationType::Fractions => self.fraction(rng),
            OperationType::Percentages => self.percentage(rng),
            OperationType::Powers => self.power(rng),
        }
    }

    fn pick_table<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        let tables: Vec<i32> = self.config.tables.iter().copied().collect();
        tables
            .choose(rng)
            .or_else(|| DEFAULT_TABLES.choose(rng))
            .copied()
            .unwrap_or(1)
    }

    fn multiplication<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
        let table = self.pick_table(rng);
        let multiplier = rng.random_range(1..=10);
        Question {
            text: format!("{} {} {}", table, Operator::Mul.symbol(), multiplier),
            answer: table * multiplier,
            operator: Operator::Mul,
            table: Some(table),
        }
    }

    fn division<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
        let divisor = self.pick_table(rng);
        let quotient = rng.random_range(1..=10);
        let dividend = divisor * quotient;
        Question {
            text: format!("{} {} {}", dividend, Operator::Div.symbol(), divisor),
            answer: quotient,
            operator: Operator::Div,
            table: Some(divisor),
        }
    }

    fn two_operands<R: Rng + ?Sized>(&self, rng: &mut R) -> (i32, i32) {
        match self.config.digit_count {
            DigitCount::One => (rng.random_range(1..=9), rng.random_range(1..=9)),
            DigitCount::Two => {
                let two_digit = rng.random_range(10..=99);
                let any = rng.random_range(1..=99);
                if rng.random_bool(0.5) {
                    (two_digit, any)
                } else {
                    (any, two_digit)
                }
            }
        }
    }

    fn addition<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
        let (a, b) = self.two_operands(rng);
        Question {
            text: format!("{} {} {}", a, Operator::Add.symbol(), b),
            answer: a + b,
            operator: Operator::Add,
            table: None,
        }
    }

    fn subtraction<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
        let (mut a, mut b) = self.two_operands(rng);
        if !self.config.allow_negatives && a < b {
            std::mem::swap(&mut a, &mut b);
        }
        Question {
            text: format!("{} {} {}", a, Operator::Sub.symbol(), b),
            answer: a - b,
            operator: Operator::Sub,
            table: None,
        }
    }

    fn combined<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
        let mut ops = vec![OperationType::Addition, OperationType::Subtraction];
        if !self.config.tables.is_empty() {
            ops.push(OperationType::Multiplication);
            ops.push(OperationType::Division);
        }
        match ops.choose(rng).copied().unwrap_or(OperationType::Addition) {
            OperationType::Multiplication => self.multiplication(rng),
            OperationType::Subtraction => self.subtraction(rng),
            OperationType::Division => self.division(rng),
            _ => self.addition(rng),
        }
    }

    fn fraction<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
        let (num, den, label, bases) = FRACTIONS[rng.random_range(0..FRACTIONS.len())];
        let base = bases[rng.random_range(0..bases.len())];
        Question {
            text: format!("{} of {}", label, base),
            answer: base * num / den,
            operator: Operator::Frac,
            table: None,
        }
    }

    fn percentage<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
        let (percent, bases) = PERCENTAGES[rng.random_range(0..PERCENTAGES.len())];
        let base = bases[rng.random_range(0..bases.len())];
        Question {
            text: format!("{}% of {}", percent, base),
            answer: base * percent / 100,
            operator: Operator::Pct,
            table: None,
        }
    }

    fn power<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
        let (base, exponents) = POWERS[rng.random_range(0..POWERS.len())];
        let exponent = exponents[rng.random_range(0..exponents.len())];
        Question {
            text: format!("{}{}", base, superscript(exponent)),
            answer: base.pow(exponent),
            operator: Operator::Pow,
            table: None,
        }
    }
}
