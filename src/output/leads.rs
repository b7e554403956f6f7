//! CSV leads export

use crate::storage::LinkRecord;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Header row of the leads file
pub const LEADS_HEADER: &str = "category,title,url,source,timestamp";

/// Appends records to the leads file, writing the header if the file is new
///
/// # Returns
///
/// The number of rows written
pub fn append_leads(path: &Path, records: &[LinkRecord]) -> io::Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let needs_header = path.metadata().map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);

    if needs_header {
        writeln!(writer, "{}", LEADS_HEADER)?;
    }

    for record in records {
        writeln!(
            writer,
            "{},{},{},{},{}",
            escape(&record.category),
            escape(&record.title),
            escape(&record.url),
            escape(&record.source),
            escape(&record.first_seen)
        )?;
    }

    writer.flush()?;
    Ok(records.len())
}

/// Quotes a field if it contains a delimiter, quote or line break
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
