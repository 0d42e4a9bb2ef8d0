pub mod extractor;
pub mod record;

pub use extractor::{extract, extract_records, transport_label};
pub use record::PacketRecord;
