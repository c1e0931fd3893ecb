use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::EventId;

/// A photographed event, created by a producer.
///
/// Events are immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub description: Option<String>,
    /// Calendar date the event took place.
    pub date: NaiveDate,
    /// The producer who created the event.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Event {
    #[must_use]
    pub fn new(name: impl Into<String>, date: NaiveDate, created_by: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            name: name.into(),
            description: None,
            date,
            created_by: created_by.into(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
