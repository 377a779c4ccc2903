use std::{fs, path::Path};

use csv::WriterBuilder;

use super::valuation::Report;

const CSV_HEADER: [&str; 3] = ["Transaction Date", "DIMO Tokens", "Cost Basis Value"];

/// Serializes the itemized report to CSV. The header row is written even when
/// no transfer could be priced.
pub fn report_to_csv(report: &Report) -> anyhow::Result<String> {
    let mut buffer = vec![];
    {
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut buffer);

        wtr.write_record(CSV_HEADER)?;
        for row in &report.rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    }

    Ok(String::from_utf8(buffer)?)
}

pub fn export_csv(report: &Report, path: &Path) -> anyhow::Result<()> {
    fs::write(path, report_to_csv(report)?)?;
    Ok(())
}
