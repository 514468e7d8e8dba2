//! MULTI / EXEC / DISCARD.
//!
//! The dispatcher queues everything between MULTI and EXEC/DISCARD into the
//! connection's session; these handlers only flip transaction state and, for
//! EXEC, drain the queue.

mod discard;
mod exec;
mod multi;

pub use discard::discard;
pub use exec::exec;
pub use multi::multi;
