use serde::{Deserialize, Serialize};

use super::{Action, Document, WeatherSample};
use crate::geometry::{self, geojson, GeometryError, Polygon, Projection};

/// A cultivated grape variety.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variety {
    pub id: String,
    pub name: String,
}

/// Daily weather history of a parcel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Meteo {
    #[serde(default)]
    pub data: Vec<WeatherSample>,
}

/// A parcel as persisted: boundary serialized in the storage projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelDoc {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub location: String,
    #[serde(default, with = "inline_actions")]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub varieties: Vec<Variety>,
    #[serde(default)]
    pub meteo: Meteo,
}

impl Document for ParcelDoc {
    const COLLECTION: &'static str = "vineyards";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Serde adapter for actions embedded in a parcel document.
///
/// Unlike sub-collection documents, an embedded action carries its id in
/// its own body.
mod inline_actions {
    use serde::de::{self, Deserializer};
    use serde::ser::{self, SerializeSeq, Serializer};
    use serde::Deserialize;
    use serde_json::Value;

    use crate::model::Action;

    pub fn serialize<S: Serializer>(actions: &[Action], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(actions.len()))?;
        for action in actions {
            let mut body = serde_json::to_value(action).map_err(<S::Error as ser::Error>::custom)?;
            if let Value::Object(fields) = &mut body {
                if !action.id.is_empty() {
                    fields.insert("id".to_string(), Value::String(action.id.clone()));
                }
            }
            seq.serialize_element(&body)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Action>, D::Error> {
        let bodies = Vec::<Value>::deserialize(deserializer)?;
        bodies
            .into_iter()
            .map(|mut body| {
                let id = match &mut body {
                    Value::Object(fields) => match fields.remove("id") {
                        Some(Value::String(id)) => id,
                        Some(other) => other.to_string(),
                        None => String::new(),
                    },
                    _ => String::new(),
                };
                let mut action: Action =
                    serde_json::from_value(body).map_err(<D::Error as de::Error>::custom)?;
                action.id = id;
                Ok(action)
            })
            .collect()
    }
}

/// A reference to another user's parcel, stored under the viewer's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedParcelRef {
    #[serde(skip)]
    pub id: String,
    /// Owner uid.
    pub user: String,
    /// Parcel id inside the owner's collection.
    pub vineyard: String,
}

impl Document for SharedParcelRef {
    const COLLECTION: &'static str = "sharedVineyards";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Addresses a parcel's document and sub-collections: owner uid plus parcel id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParcelKey {
    pub owner: String,
    pub parcel_id: String,
}

impl ParcelKey {
    pub fn new(owner: impl Into<String>, parcel_id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            parcel_id: parcel_id.into(),
        }
    }
}

/// A resident parcel. Its boundary is always in the working projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
    pub id: String,
    pub owner: String,
    /// True when reached through a shared reference rather than owned.
    pub shared: bool,
    pub name: String,
    pub address: Option<String>,
    pub boundary: Polygon,
    pub varieties: Vec<Variety>,
    /// Legacy inline actions carried on the parcel document.
    pub actions: Vec<Action>,
    pub meteo: Vec<WeatherSample>,
}

impl Parcel {
    /// Materialize a persisted document, projecting its boundary storage to working.
    pub fn from_doc(
        doc: ParcelDoc,
        owner: &str,
        shared: bool,
        storage: Projection,
        working: Projection,
    ) -> Result<Self, GeometryError> {
        let stored = geojson::read_polygon(&doc.location)?;
        let boundary = geometry::to_working(&stored, storage, working)?;
        Ok(Self {
            id: doc.id,
            owner: owner.to_string(),
            shared,
            name: doc.name,
            address: doc.address,
            boundary,
            varieties: doc.varieties,
            actions: doc.actions,
            meteo: doc.meteo.data,
        })
    }

    /// Persisted form, projecting the boundary working to storage.
    pub fn to_doc(&self, working: Projection, storage: Projection) -> Result<ParcelDoc, GeometryError> {
        let stored = geometry::to_storage(&self.boundary, working, storage)?;
        Ok(ParcelDoc {
            id: self.id.clone(),
            name: self.name.clone(),
            address: self.address.clone(),
            location: geojson::write_polygon(&stored)?,
            actions: self.actions.clone(),
            varieties: self.varieties.clone(),
            meteo: Meteo {
                data: self.meteo.clone(),
            },
        })
    }

    pub fn key(&self) -> ParcelKey {
        ParcelKey::new(self.owner.clone(), self.id.clone())
    }

    pub fn variety(&self, id: &str) -> Option<&Variety> {
        self.varieties.iter().find(|v| v.id == id)
    }
}
