pub mod admission;
pub mod export;
pub mod import;
pub mod registry;

pub use admission::{AdmissionEngine, Decision, RejectReason};
pub use registry::{RegistryTx, TicketRegistry};
