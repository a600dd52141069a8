//! Item bank ingestion.
//!
//! Rows arrive as JSON objects or CSV records keyed by the item bank's column
//! names. Each row is normalized into an [`Item`]; practice rows are capped per contiguous run
//! of a trial type, and test items can be shuffled within their trial type
//! while the positional skeleton of the bank is kept.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::assets::{AssetRefs, ItemField};
use crate::config::SessionConfig;
use crate::error::{Result, TrialkitError};
use crate::item::{Answer, AssessmentStage, IrtParams, Item, ItemId, ItemPayload, TrialType};

/// A single cell of the item bank. Banks exported from spreadsheets mix
/// numbers and strings freely.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    pub fn text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }

    pub fn number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// One row of the item bank, as stored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub source: Option<Cell>,
    #[serde(default)]
    pub block_index: Option<Cell>,
    #[serde(default)]
    pub task: Option<Cell>,
    #[serde(default)]
    pub trial_type: Option<Cell>,
    #[serde(default)]
    pub assessment_stage: Option<Cell>,
    #[serde(default)]
    pub notes: Option<Cell>,
    #[serde(default)]
    pub item: Option<Cell>,
    #[serde(default)]
    pub orig_item_num: Option<Cell>,
    #[serde(default)]
    pub prompt: Option<Cell>,
    #[serde(default)]
    pub image: Option<Cell>,
    #[serde(default)]
    pub audio_file: Option<Cell>,
    #[serde(default)]
    pub answer: Option<Cell>,
    #[serde(default)]
    pub response_alternatives: Option<Cell>,
    #[serde(default)]
    pub difficulty: Option<Cell>,
    #[serde(default)]
    pub discrimination: Option<Cell>,
    #[serde(default, alias = "chance_level")]
    pub guessing: Option<Cell>,
    #[serde(default)]
    pub upper_asymptote: Option<Cell>,
    #[serde(default)]
    pub time_limit: Option<Cell>,
}

fn text_of(cell: &Option<Cell>) -> Option<String> {
    cell.as_ref().map(Cell::text).filter(|s| !s.is_empty())
}

fn number_of(cell: &Option<Cell>) -> Option<f64> {
    cell.as_ref().and_then(Cell::number)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl RawRow {
    /// Normalize the row into an item. `position` is the row's index in the
    /// bank and stands in for a missing item number.
    pub fn normalize(&self, position: usize) -> Item {
        let task = text_of(&self.task).unwrap_or_default();
        let trial_type = TrialType::new(text_of(&self.trial_type).unwrap_or_default());
        let source = text_of(&self.source).unwrap_or_else(|| task.clone());
        let number = number_of(&self.orig_item_num)
            .filter(|n| *n >= 0.0)
            .map(|n| n as u32)
            .unwrap_or(position as u32 + 1);

        let stage = match text_of(&self.assessment_stage) {
            Some(stage) => AssessmentStage::parse(&stage),
            None if trial_type.is_instructions() => AssessmentStage::Instructions,
            None if text_of(&self.notes).as_deref() == Some("practice") => {
                AssessmentStage::Practice
            }
            None => AssessmentStage::Test,
        };

        let raw_item = text_of(&self.item).unwrap_or_default();
        let payload = if task.to_ascii_lowercase().contains("math")
            && trial_type.as_str().contains("Number Line")
        {
            ItemPayload::Numbers(
                split_list(&raw_item)
                    .iter()
                    .map(|n| n.parse().unwrap_or(f64::NAN))
                    .collect(),
            )
        } else {
            ItemPayload::Text(raw_item)
        };

        let images = text_of(&self.image)
            .map(|raw| split_list(&raw))
            .unwrap_or_default();
        let audio_file = text_of(&self.audio_file);
        let answer = self.answer.as_ref().and_then(|cell| match cell.number() {
            Some(n) => Some(Answer::Number(n)),
            None => Some(cell.text()).filter(|s| !s.is_empty()).map(Answer::Text),
        });
        let distractors = text_of(&self.response_alternatives)
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        // "NaN" and "inf" parse as floats; non-finite cells count as missing.
        let finite = |cell: &Option<Cell>| number_of(cell).filter(|v| v.is_finite());
        let defaults = IrtParams::default();
        let irt = IrtParams {
            discrimination: finite(&self.discrimination).unwrap_or(defaults.discrimination),
            difficulty: finite(&self.difficulty),
            guessing: finite(&self.guessing).unwrap_or(defaults.guessing),
            upper: finite(&self.upper_asymptote).unwrap_or(defaults.upper),
        };

        let mut assets = AssetRefs::default();
        if let Some(text) = payload.as_text() {
            assets.insert(ItemField::Item, [text]);
        }
        assets.insert(ItemField::Image, images.iter().map(String::as_str));
        assets.insert(ItemField::AudioFile, audio_file.as_deref());
        if let Some(Answer::Text(answer)) = &answer {
            assets.insert(ItemField::Answer, [answer.as_str()]);
        }
        assets.insert(
            ItemField::Distractors,
            distractors.iter().map(String::as_str),
        );

        Item {
            id: ItemId::new(source, number),
            task,
            trial_type,
            stage,
            block_index: number_of(&self.block_index)
                .filter(|n| *n >= 0.0)
                .map(|n| n as u32),
            prompt: text_of(&self.prompt),
            payload,
            images,
            audio_file,
            answer,
            distractors,
            time_limit_ms: number_of(&self.time_limit)
                .filter(|n| *n > 0.0)
                .map(|n| n as u64),
            irt,
            assets,
        }
    }
}

/// On-disk format of an item bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BankFormat {
    /// A JSON array of row objects.
    #[default]
    Json,
    /// CSV with a header row naming the columns.
    Csv,
}

impl BankFormat {
    /// Guess the format from a file extension. Anything but `.csv` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Json,
        }
    }

    pub fn parse_rows(self, text: &str) -> Result<Vec<RawRow>> {
        match self {
            Self::Json => CorpusLoader::parse_rows(text),
            Self::Csv => CorpusLoader::parse_csv_rows(text),
        }
    }
}

/// Turns raw item bank rows into the ordered session corpus.
#[derive(Debug, Clone)]
pub struct CorpusLoader {
    practice_cap: usize,
    randomize: bool,
}

impl CorpusLoader {
    pub fn new(practice_cap: usize, randomize: bool) -> Self {
        Self {
            practice_cap,
            randomize,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.num_practice_trials, config.randomize)
    }

    /// Parse a JSON array of rows.
    pub fn parse_rows(json: &str) -> Result<Vec<RawRow>> {
        serde_json::from_str(json).map_err(|e| TrialkitError::CorpusParse(e.to_string()))
    }

    /// Parse CSV rows with a header line. Blank lines are skipped and cells
    /// are trimmed. A record with the wrong number of fields is an error.
    pub fn parse_csv_rows(text: &str) -> Result<Vec<RawRow>> {
        csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes())
            .deserialize()
            .collect::<std::result::Result<Vec<RawRow>, _>>()
            .map_err(|e| TrialkitError::CorpusParse(e.to_string()))
    }

    /// Parse and load a JSON item bank.
    pub fn load_str<R: Rng + ?Sized>(&self, json: &str, rng: &mut R) -> Result<Vec<Item>> {
        self.load_bank(BankFormat::Json, json, rng)
    }

    /// Parse and load an item bank of the given format.
    pub fn load_bank<R: Rng + ?Sized>(
        &self,
        format: BankFormat,
        text: &str,
        rng: &mut R,
    ) -> Result<Vec<Item>> {
        let rows = format.parse_rows(text)?;
        Ok(self.load_rows(&rows, rng))
    }

    /// Like [`load_str`](Self::load_str), but an unparseable bank yields an
    /// empty corpus. The failure is logged, never retried.
    pub fn load_or_empty<R: Rng + ?Sized>(&self, json: &str, rng: &mut R) -> Vec<Item> {
        self.load_bank_or_empty(BankFormat::Json, json, rng)
    }

    pub fn load_bank_or_empty<R: Rng + ?Sized>(
        &self,
        format: BankFormat,
        text: &str,
        rng: &mut R,
    ) -> Vec<Item> {
        match self.load_bank(format, text, rng) {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, ?format, "Item bank could not be parsed, using empty corpus");
                Vec::new()
            }
        }
    }

    /// Normalize rows, apply the practice cap and the optional shuffle.
    pub fn load_rows<R: Rng + ?Sized>(&self, rows: &[RawRow], rng: &mut R) -> Vec<Item> {
        let mut items = Vec::with_capacity(rows.len());
        let mut seen = HashSet::new();
        let mut current_type: Option<TrialType> = None;
        let mut practice_in_run = 0usize;
        let mut capped = 0usize;

        for (position, row) in rows.iter().enumerate() {
            let item = row.normalize(position);

            if current_type.as_ref() != Some(&item.trial_type) {
                current_type = Some(item.trial_type.clone());
                practice_in_run = 0;
            }

            if item.stage == AssessmentStage::Practice {
                if practice_in_run >= self.practice_cap {
                    capped += 1;
                    continue;
                }
                practice_in_run += 1;
            }

            if !seen.insert(item.id.clone()) {
                warn!(item_id = %item.id, "Duplicate item identity in bank, keeping first");
                continue;
            }

            items.push(item);
        }

        debug!(
            rows = rows.len(),
            kept = items.len(),
            capped_practice = capped,
            "Loaded item bank"
        );

        if self.randomize {
            shuffle_within_trial_types(items, rng)
        } else {
            items
        }
    }
}

enum Slot {
    Fixed(Item),
    Stimulus(TrialType),
}

/// Shuffle test items within their trial type.
///
/// Instruction and practice items keep their positions, and every position
/// that held a test item of type `T` still holds a test item of type `T`.
pub fn shuffle_within_trial_types<R: Rng + ?Sized>(items: Vec<Item>, rng: &mut R) -> Vec<Item> {
    let mut group_index: HashMap<TrialType, usize> = HashMap::new();
    let mut groups: Vec<Vec<Item>> = Vec::new();
    let mut slots = Vec::with_capacity(items.len());

    for item in items {
        if item.is_stimulus() {
            let trial_type = item.trial_type.clone();
            let idx = *group_index.entry(trial_type.clone()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[idx].push(item);
            slots.push(Slot::Stimulus(trial_type));
        } else {
            slots.push(Slot::Fixed(item));
        }
    }

    let mut shuffled: Vec<VecDeque<Item>> = groups
        .into_iter()
        .map(|mut group| {
            group.shuffle(rng);
            VecDeque::from(group)
        })
        .collect();

    slots
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Fixed(item) => Some(item),
            Slot::Stimulus(trial_type) => group_index
                .get(&trial_type)
                .and_then(|idx| shuffled[*idx].pop_front()),
        })
        .collect()
}
