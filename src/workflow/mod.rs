//! Status enums and their transition tables. Callers apply side effects
//! (timestamps, attribution, balances) only after a transition is accepted.

pub mod attendance;
pub mod booking;
pub mod ticket;
pub mod transaction;

pub use booking::{ResourceAction, ResourceStatus};
pub use ticket::{TicketPriority, TicketStatus};
pub use transaction::{DeletePolicy, TransactionAction, TransactionStatus};
