//! Audit events appended to a ticket's log.
//!
//! The event type vocabulary is `created`, `assigned` for reassignment, and
//! one entry per [`Action`]. An `assign` event is always the table's
//! `created -> assigned` transition.
//! `from_status`/`to_status` are stored verbatim so historical events stay
//! interpretable even if the transition table changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;

use super::ticket::{Action, ParseEnumError, Status};

/// Kind of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// The ticket was created.
    Created,
    /// The assignee was set; status unchanged.
    Assigned,
    /// An action was accepted.
    Action(Action),
}

impl EventType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Assigned => "assigned",
            Self::Action(action) => action.as_str(),
        }
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl From<Action> for EventType {
    fn from(action: Action) -> Self {
        Self::Action(action)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("created") {
            return Ok(Self::Created);
        }
        if trimmed.eq_ignore_ascii_case("assigned") {
            return Ok(Self::Assigned);
        }
        s.parse::<Action>().map(Self::Action).map_err(|_| ParseEnumError {
            expected: "event type",
            got: s.to_string(),
        })
    }
}

/// One immutable entry in a ticket's audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketEvent {
    /// 1-based position in the ticket's log.
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Absent only on the `created` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_status: Option<Status>,
    pub to_status: Status,
    /// Agent named by an `assigned` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl TicketEvent {
    /// The first event of every ticket.
    #[must_use]
    pub fn created(at: DateTime<Utc>, note: Option<String>) -> Self {
        Self {
            seq: 1,
            event_type: EventType::Created,
            at,
            note,
            from_status: None,
            to_status: Status::Created,
            assignee: None,
        }
    }

    /// `true` for events that moved the ticket to a different status.
    #[must_use]
    pub fn changes_status(&self) -> bool {
        self.from_status.is_some_and(|from| from != self.to_status)
    }
}
