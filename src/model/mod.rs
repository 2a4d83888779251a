//! Models - the documents mirrored from the remote store.
//!
//! Every mirrored type implements [`Document`]: it knows the collection name
//! it lives under and carries the store-assigned id, which is never part of
//! the JSON body.
//!
//! ## Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//! use vineyard_sync::model::Document;
//! use vineyard_sync::remote::RawDocument;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Note {
//!     #[serde(skip)]
//!     id: String,
//!     text: String,
//! }
//!
//! impl Document for Note {
//!     const COLLECTION: &'static str = "notes";
//!     fn id(&self) -> &str { &self.id }
//!     fn set_id(&mut self, id: String) { self.id = id; }
//! }
//!
//! let note = Note::decode(&RawDocument::new("n1", json!({"text": "budbreak"}))).unwrap();
//! assert_eq!(note.id(), "n1");
//! assert_eq!(note.encode().unwrap(), json!({"text": "budbreak"}));
//! ```

mod action;
mod parcel;
mod vintage;
mod weather;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::remote::RawDocument;

pub use action::{Action, ActionType, DisplayColor, Planting, ACTION_COLORS};
pub use parcel::{Meteo, Parcel, ParcelDoc, ParcelKey, SharedParcelRef, Variety};
pub use vintage::{Vintage, VintageStatus, VINTAGE_STATUS_COLORS};
pub use weather::{missing_dates, WeatherSample};

/// Trait for types mirrored from a remote collection.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The collection (or sub-collection) name, e.g. "vineyards", "actions".
    const COLLECTION: &'static str;

    /// The store-assigned identifier.
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Decode a raw document body and attach its id.
    fn decode(raw: &RawDocument) -> Result<Self, serde_json::Error> {
        let mut document: Self = serde_json::from_value(raw.data.clone())?;
        document.set_id(raw.id.clone());
        Ok(document)
    }

    /// Encode the document body. The id is not part of it.
    fn encode(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Serde adapter for calendar dates.
///
/// Writes `YYYY-MM-DD`. Reads either that form or a full RFC 3339 timestamp,
/// keeping only its calendar date.
pub(crate) mod calendar_date {
    use chrono::{DateTime, NaiveDate};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid calendar date: {}", raw)))
    }

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(raw, FORMAT)
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
    }

}
