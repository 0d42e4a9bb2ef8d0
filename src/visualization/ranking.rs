use std::io::{self, Write};

use crate::analysis::ValueCount;

/// Prints a ranked `address  count` list under a heading.
pub fn write_top_talkers<W: Write>(out: &mut W, title: &str, counts: &[ValueCount]) -> io::Result<()> {
    writeln!(out, "{}:", title)?;
    if counts.is_empty() {
        writeln!(out, "  (none)")?;
        return Ok(());
    }

    let width = counts.iter().map(|entry| entry.value.len()).max().unwrap_or(0);

    for (rank, entry) in counts.iter().enumerate() {
        writeln!(out, "{:>3}. {:<width$}  {:>8}", rank + 1, entry.value, entry.count, width = width)?;
    }
    Ok(())
}
