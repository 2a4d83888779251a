use serde::{Deserialize, Serialize};

use super::{DisplayColor, Document};

/// Lifecycle state of a vintage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VintageStatus {
    Planned,
    Growing,
    Harvested,
    Vinified,
    Bottled,
}

impl VintageStatus {
    pub fn color(&self) -> DisplayColor {
        VINTAGE_STATUS_COLORS
            .iter()
            .find(|(s, _)| s == self)
            .map(|(_, c)| *c)
            .unwrap_or(DisplayColor("#808080"))
    }
}

pub const VINTAGE_STATUS_COLORS: [(VintageStatus, DisplayColor); 5] = [
    (VintageStatus::Planned, DisplayColor("#90a4ae")),
    (VintageStatus::Growing, DisplayColor("#43a047")),
    (VintageStatus::Harvested, DisplayColor("#8e24aa")),
    (VintageStatus::Vinified, DisplayColor("#c62828")),
    (VintageStatus::Bottled, DisplayColor("#3949ab")),
];

/// Per-season record of a parcel.
///
/// Several vintages may exist for the same year; nothing here prevents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vintage {
    #[serde(skip)]
    pub id: String,
    pub year: i32,
    #[serde(default)]
    pub name: String,
    pub status: VintageStatus,
    #[serde(default, rename = "varieties")]
    pub variety_ids: Vec<String>,
}

impl Vintage {
    pub fn new(year: i32, name: impl Into<String>, status: VintageStatus) -> Self {
        Self {
            id: String::new(),
            year,
            name: name.into(),
            status,
            variety_ids: Vec::new(),
        }
    }
}

impl Document for Vintage {
    const COLLECTION: &'static str = "vintages";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
