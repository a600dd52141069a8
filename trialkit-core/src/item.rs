//! Item bank domain types.
//!
//! An [`Item`] is one stimulus a respondent can be shown. Items are built once
//! by the corpus loader and never mutated afterwards; pools move them around
//! by value.

use serde::{Deserialize, Serialize};

use crate::assets::AssetRefs;

/// Stable identity of an item: the source it came from and its item number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId {
    pub source: String,
    pub number: u32,
}

impl ItemId {
    pub fn new(source: impl Into<String>, number: u32) -> Self {
        Self {
            source: source.into(),
            number,
        }
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.source, self.number)
    }
}

/// Label grouping items by question format.
///
/// Used for skip bookkeeping and response history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialType(String);

impl TrialType {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Instruction screens carry this trial type in addition to their stage.
    pub fn is_instructions(&self) -> bool {
        self.0 == "instructions"
    }
}

impl From<&str> for TrialType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TrialType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for TrialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classification of an item within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStage {
    Instructions,
    Practice,
    Test,
}

impl AssessmentStage {
    /// Parse the stage spellings found in item banks.
    ///
    /// Unknown or empty values are treated as test items.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "instructions" | "instruction" => Self::Instructions,
            "practice" | "practice_response" => Self::Practice,
            _ => Self::Test,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instructions => "instructions",
            Self::Practice => "practice",
            Self::Test => "test",
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Self::Test)
    }
}

impl std::fmt::Display for AssessmentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item response theory parameters attached to an item.
///
/// `difficulty` is `None` for unnormed items; those are never used for
/// ability estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrtParams {
    /// Discrimination (a).
    pub discrimination: f64,
    /// Difficulty (b).
    pub difficulty: Option<f64>,
    /// Guessing / chance level (c).
    pub guessing: f64,
    /// Upper asymptote (d).
    pub upper: f64,
}

impl Default for IrtParams {
    fn default() -> Self {
        Self {
            discrimination: 1.0,
            difficulty: None,
            guessing: 0.0,
            upper: 1.0,
        }
    }
}

impl IrtParams {
    /// Build parameters from a difficulty. NaN and infinite difficulties
    /// mean "unnormed".
    pub fn with_difficulty(difficulty: f64) -> Self {
        Self {
            difficulty: difficulty.is_finite().then_some(difficulty),
            ..Self::default()
        }
    }

    pub fn is_normed(&self) -> bool {
        self.difficulty.is_some_and(f64::is_finite)
    }

    /// Copy with every non-finite parameter replaced by its default.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let or_default = |v: f64, default: f64| if v.is_finite() { v } else { default };
        Self {
            discrimination: or_default(self.discrimination, defaults.discrimination),
            difficulty: self.difficulty.filter(|b| b.is_finite()),
            guessing: or_default(self.guessing, defaults.guessing),
            upper: or_default(self.upper, defaults.upper),
        }
    }
}

/// Raw stimulus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemPayload {
    Text(String),
    Numbers(Vec<f64>),
}

impl ItemPayload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Numbers(_) => None,
        }
    }
}

/// Correct answer of an item, numeric where the source value parses as one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One stimulus of the item bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub task: String,
    pub trial_type: TrialType,
    pub stage: AssessmentStage,
    pub block_index: Option<u32>,
    pub prompt: Option<String>,
    pub payload: ItemPayload,
    pub images: Vec<String>,
    pub audio_file: Option<String>,
    pub answer: Option<Answer>,
    pub distractors: Vec<String>,
    pub time_limit_ms: Option<u64>,
    pub irt: IrtParams,
    /// Asset keys referenced by this item, resolved at load time.
    pub assets: AssetRefs,
}

impl Item {
    pub fn difficulty(&self) -> Option<f64> {
        self.irt.difficulty.filter(|b| b.is_finite())
    }

    pub fn is_normed(&self) -> bool {
        self.irt.is_normed()
    }

    pub fn is_instruction_or_practice(&self) -> bool {
        matches!(
            self.stage,
            AssessmentStage::Instructions | AssessmentStage::Practice
        )
    }

    /// Items that take part in type-preserving randomization.
    pub fn is_stimulus(&self) -> bool {
        self.stage.is_test() && !self.trial_type.is_instructions()
    }
}
