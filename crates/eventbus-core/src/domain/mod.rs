//! Domain model (keys, ids, envelope, errors, faults).

pub mod envelope;
pub mod errors;
pub mod fault;
pub mod ids;
pub mod key;

pub use self::envelope::Envelope;
pub use self::errors::{HandlerError, RegisterError, SendError};
pub use self::fault::{FaultKind, HandlerFault};
pub use self::ids::{BusId, HandlerId};
pub use self::key::MessageTypeKey;
