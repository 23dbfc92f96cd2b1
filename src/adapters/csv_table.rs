use crate::domain::model::{Column, Table};
use crate::utils::error::{EtlError, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

/// Parses CSV bytes with a header row into a [`Table`].
///
/// In a single-column file an empty cell is a blank line, which the csv reader skips;
/// those lines are put back as empty cells so row positions match the file.
pub fn read_table(data: &[u8]) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(data);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let single_column = headers.len() == 1;
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

    let mut record = StringRecord::new();
    let mut index = 0;
    loop {
        let start = reader.position().byte() as usize;
        // csv 在欄位數不一致時回傳 UnequalLengths
        let has_record = reader.read_record(&mut record).map_err(|e| {
            if matches!(e.kind(), csv::ErrorKind::UnequalLengths { .. }) {
                EtlError::MalformedTable {
                    message: format!("row {}: {}", index + 1, e),
                }
            } else {
                EtlError::CsvError(e)
            }
        })?;
        if !has_record {
            break;
        }

        if single_column {
            let skipped = blank_lines_at(data, start);
            cells[0].extend(std::iter::repeat(String::new()).take(skipped));
        }
        for (column, value) in cells.iter_mut().zip(record.iter()) {
            column.push(value.to_string());
        }
        index += 1;
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, cells)| Column::new(name, cells))
        .collect();
    Table::new(columns)
}

/// Counts the empty lines between the end of the previous record (`start`) and the next one.
fn blank_lines_at(data: &[u8], start: usize) -> usize {
    let (consumed, mut rest) = data.split_at(start.min(data.len()));

    // 前一筆記錄的換行符可能尚未被讀取器完全消耗
    rest = match (consumed.last(), rest) {
        (Some(b'\r'), [b'\n', tail @ ..]) => tail,
        (Some(b'\r' | b'\n') | None, _) => rest,
        (Some(_), _) => strip_line_end(rest).unwrap_or(rest),
    };

    let mut count = 0;
    while let Some(tail) = strip_line_end(rest) {
        rest = tail;
        count += 1;
    }
    count
}

fn strip_line_end(data: &[u8]) -> Option<&[u8]> {
    match data {
        [b'\r', b'\n', tail @ ..] | [b'\n', tail @ ..] | [b'\r', tail @ ..] => Some(tail),
        _ => None,
    }
}

/// Serializes a [`Table`] to CSV with a header row.
pub fn write_table(table: &Table) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(table.column_names())?;
    for index in 0..table.row_count() {
        if let Some(row) = table.row(index) {
            writer.write_record(row)?;
        }
    }

    writer.into_inner().map_err(|e| EtlError::IoError(e.into_error()))
}
