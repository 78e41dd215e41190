use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The eight lifecycle states a ticket can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Created,
    Assigned,
    InProgress,
    Waiting,
    Escalated,
    Resolved,
    Closed,
    Canceled,
}

impl Status {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::Created,
        Self::Assigned,
        Self::InProgress,
        Self::Waiting,
        Self::Escalated,
        Self::Resolved,
        Self::Closed,
        Self::Canceled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Waiting => "waiting",
            Self::Escalated => "escalated",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Canceled => "canceled",
        }
    }

    /// Terminal statuses: `resolved`, `closed`, `canceled`.
    ///
    /// Only `resolved` has an outgoing edge (`reopen`).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed | Self::Canceled)
    }

    /// Statuses with no outgoing edges at all.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Closed | Self::Canceled)
    }
}

/// Caller-requested lifecycle intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Assign,
    Start,
    Wait,
    Escalate,
    Resolve,
    Close,
    Cancel,
    Reopen,
}

impl Action {
    pub const ALL: [Self; 8] = [
        Self::Assign,
        Self::Start,
        Self::Wait,
        Self::Escalate,
        Self::Resolve,
        Self::Close,
        Self::Cancel,
        Self::Reopen,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::Start => "start",
            Self::Wait => "wait",
            Self::Escalate => "escalate",
            Self::Resolve => "resolve",
            Self::Close => "close",
            Self::Cancel => "cancel",
            Self::Reopen => "reopen",
        }
    }
}

/// Opaque ticket identifier (`tk-` followed by lowercase hex).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    pub const PREFIX: &'static str = "tk-";

    /// Wrap a raw string without validation.
    ///
    /// Used for values read back from storage or freshly minted by the
    /// [`IdGenerator`](crate::clock::IdGenerator).
    pub fn new_unchecked(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Parse and validate a caller-supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ParseEnumError`] when the value does not look like
    /// `tk-[0-9a-f]+`.
    pub fn parse(raw: &str) -> Result<Self, ParseEnumError> {
        let value = raw.trim();
        let valid = value.strip_prefix(Self::PREFIX).is_some_and(|rest| {
            !rest.is_empty()
                && rest
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        });
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(ParseEnumError {
                expected: "ticket id",
                got: raw.to_string(),
            })
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current state of a support ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    #[serde(rename = "desc")]
    pub description: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        self.assignee.as_deref().is_none_or(str::is_empty)
    }

    /// `due_at` is set, has passed, and the ticket is not terminal.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.due_at.is_some_and(|due| due < now)
    }
}

/// Caller input for ticket creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    pub title: String,
    #[serde(default, rename = "desc")]
    pub description: String,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

impl NewTicket {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub const fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "created" => Ok(Self::Created),
            "assigned" => Ok(Self::Assigned),
            "in_progress" => Ok(Self::InProgress),
            "waiting" => Ok(Self::Waiting),
            "escalated" => Ok(Self::Escalated),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Action {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "assign" => Ok(Self::Assign),
            "start" => Ok(Self::Start),
            "wait" => Ok(Self::Wait),
            "escalate" => Ok(Self::Escalate),
            "resolve" => Ok(Self::Resolve),
            "close" => Ok(Self::Close),
            "cancel" => Ok(Self::Cancel),
            "reopen" => Ok(Self::Reopen),
            _ => Err(ParseEnumError {
                expected: "action",
                got: s.to_string(),
            }),
        }
    }
}
