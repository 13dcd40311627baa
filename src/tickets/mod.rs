//! Tickets, tasks, and the status machine.

mod event;
mod history;
mod status;
mod types;

pub use event::{Event, EventKind, SlaClock};
pub use history::{Actor, HistoryRecord};
pub use status::{NoReopenFromClosed, StatusMachine, TransitionPolicy, Unrestricted};
pub use types::{NewTicket, Priority, Task, TaskStatus, Ticket, TicketStatus};
