//! Ticket domain model: statuses, actions, tickets, and audit events.

pub mod event;
pub mod ticket;

pub use event::{EventType, TicketEvent};
pub use ticket::{Action, NewTicket, ParseEnumError, Status, Ticket, TicketId};
