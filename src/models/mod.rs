pub mod scan;
pub mod stats;
pub mod ticket;

pub use scan::{NewScan, ScanAction, ScanFilter, ScanRecord, ScanStatus};
pub use stats::{SeriesStats, Stats};
pub use ticket::{NewTicket, Phase, Ticket, TicketFilter};
