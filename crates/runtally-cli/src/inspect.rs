//! `runtally inspect`: tallies over a record stream.

use miette::{IntoDiagnostic, Result};
use runtally::recorder::read_record_stream;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Containers carry no result code; they are tallied under this key.
const NO_RESULT: &str = "-";

#[derive(Debug, Default, Serialize)]
pub struct StreamReport {
    pub records: usize,
    /// Leaf records written without a detail block.
    pub previews: usize,
    /// Result type, then result code, to count.
    pub tally: BTreeMap<String, BTreeMap<String, u64>>,
}

pub fn tally_records(records: &[Value]) -> StreamReport {
    let mut report = StreamReport {
        records: records.len(),
        ..StreamReport::default()
    };
    for record in records {
        let rtype = record
            .get("rtype")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN");
        let result = record.get("result").and_then(Value::as_str);
        if result.is_some() && record.get("detail").is_none() {
            report.previews += 1;
        }
        *report
            .tally
            .entry(rtype.to_string())
            .or_default()
            .entry(result.unwrap_or(NO_RESULT).to_string())
            .or_default() += 1;
    }
    report
}

pub fn cmd_inspect(path: &Path, json: bool) -> Result<()> {
    let records = read_record_stream(path)?;
    let report = tally_records(&records);
    if json {
        let payload = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{payload}");
        return Ok(());
    }

    println!(
        "{}: {} records ({} previews)",
        path.display(),
        report.records,
        report.previews
    );
    for (rtype, results) in &report.tally {
        for (result, count) in results {
            println!("  {rtype:<16} {result:<10} {count}");
        }
    }
    Ok(())
}
