use csv::WriterBuilder;

use crate::models::ticket::TICKET_COLUMNS;
use crate::models::Ticket;
use crate::utils::error::ExportError;

pub const CSV_FILENAME: &str = "tickets_export.csv";

/// Renders tickets as CSV. The header row is always written, even for an
/// empty registry.
pub fn tickets_to_csv(tickets: &[Ticket]) -> Result<Vec<u8>, ExportError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(TICKET_COLUMNS)?;
    for ticket in tickets {
        writer.serialize(ticket)?;
    }

    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}
