use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{calendar_date, Document};

/// Kind of agronomic action, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Planting,
    Fertilizing,
    Observation,
    Bbch,
    Damage,
    Prune,
    Harvest,
    Brix,
}

impl ActionType {
    pub const ALL: [ActionType; 8] = [
        ActionType::Planting,
        ActionType::Fertilizing,
        ActionType::Observation,
        ActionType::Bbch,
        ActionType::Damage,
        ActionType::Prune,
        ActionType::Harvest,
        ActionType::Brix,
    ];

    /// Storage key, as written in action documents.
    pub fn key(&self) -> &'static str {
        match self {
            ActionType::Planting => "planting",
            ActionType::Fertilizing => "fertilizing",
            ActionType::Observation => "observation",
            ActionType::Bbch => "bbch",
            ActionType::Damage => "damage",
            ActionType::Prune => "prune",
            ActionType::Harvest => "harvest",
            ActionType::Brix => "brix",
        }
    }

    pub fn from_key(key: &str) -> Option<ActionType> {
        ActionType::ALL.into_iter().find(|t| t.key() == key)
    }

    /// Human label used in chart titles.
    pub fn label(&self) -> &'static str {
        match self {
            ActionType::Planting => "Planting",
            ActionType::Fertilizing => "Fertilizing",
            ActionType::Observation => "Observation",
            ActionType::Bbch => "BBCH-stage",
            ActionType::Damage => "Damage",
            ActionType::Prune => "Prune",
            ActionType::Harvest => "Harvest",
            ActionType::Brix => "Brix",
        }
    }

    pub fn color(&self) -> DisplayColor {
        ACTION_COLORS
            .iter()
            .find(|(t, _)| t == self)
            .map(|(_, c)| *c)
            .unwrap_or(DisplayColor("#808080"))
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A CSS hex color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayColor(pub &'static str);

impl fmt::Display for DisplayColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Chart color of each action type.
pub const ACTION_COLORS: [(ActionType, DisplayColor); 8] = [
    (ActionType::Planting, DisplayColor("#2e7d32")),
    (ActionType::Fertilizing, DisplayColor("#8d6e63")),
    (ActionType::Observation, DisplayColor("#1e88e5")),
    (ActionType::Bbch, DisplayColor("#7cb342")),
    (ActionType::Damage, DisplayColor("#e53935")),
    (ActionType::Prune, DisplayColor("#fb8c00")),
    (ActionType::Harvest, DisplayColor("#6a1b9a")),
    (ActionType::Brix, DisplayColor("#fdd835")),
];

/// Extra fields of a planting action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Planting {
    pub rows: u32,
    pub plants_per_row: u32,
}

/// A dated agronomic event recorded against a parcel.
///
/// `html` is the rendered description; it is filled by the action store and
/// never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActionType,
    #[serde(with = "calendar_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "bbch", skip_serializing_if = "Option::is_none")]
    pub bbch_stage: Option<String>,
    #[serde(default, rename = "variety", skip_serializing_if = "Vec::is_empty")]
    pub variety_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, rename = "files", skip_serializing_if = "Vec::is_empty")]
    pub file_refs: Vec<String>,
    #[serde(flatten)]
    pub planting: Option<Planting>,
    #[serde(skip)]
    pub html: String,
}

impl Action {
    pub fn new(kind: ActionType, date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            kind,
            date,
            description: description.into(),
            bbch_stage: None,
            variety_ids: Vec::new(),
            value: None,
            file_refs: Vec::new(),
            planting: None,
            html: String::new(),
        }
    }

    pub fn planting(date: NaiveDate, rows: u32, plants_per_row: u32) -> Self {
        Self {
            planting: Some(Planting {
                rows,
                plants_per_row,
            }),
            ..Self::new(ActionType::Planting, date, "")
        }
    }

    pub fn with_varieties<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variety_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_bbch_stage(mut self, stage: impl Into<String>) -> Self {
        self.bbch_stage = Some(stage.into());
        self
    }
}

impl Document for Action {
    const COLLECTION: &'static str = "actions";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
