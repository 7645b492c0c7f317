use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Id, Record};
use crate::models::{location::GeoPoint, time};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Event {
    #[serde(default)]
    pub id: Option<Id>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub address: String,
    #[serde(with = "time::timestamp")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "time::timestamp")]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub url: String,
    #[serde(default, with = "time::timestamp_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "time::timestamp_opt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Event {
    const COLLECTION: &'static str = "Events";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
}
