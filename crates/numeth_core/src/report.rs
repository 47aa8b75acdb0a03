//! Text and CSV renderings of a [`Trace`].

use crate::trace::{Cell, Trace, TraceRow};
use csv::Writer;
use std::io;

const COLUMN_WIDTH: usize = 18;

/// Renders a fixed-width table: a header line followed by one line per row.
/// An empty trace renders as an empty string.
pub fn render_table<R: TraceRow>(trace: &Trace<R>) -> String {
    let Some(first) = trace.rows().first() else {
        return String::new();
    };

    let mut out = table_line(first.headers());
    for row in trace {
        out.push_str(&table_line(row.cells().into_iter().map(|cell| match cell {
            Cell::Integer(v) => v.to_string(),
            Cell::Value(v) => format!("{v:.10e}"),
        })));
    }
    out
}

// Trailing padding is dropped.
fn table_line(fields: impl IntoIterator<Item = String>) -> String {
    let padded: String = fields
        .into_iter()
        .map(|field| format!("{field:<w$}", w = COLUMN_WIDTH))
        .collect();
    format!("{}\n", padded.trim_end_matches(' '))
}

/// Writes the trace as CSV (header record, then one record per row).
/// Nothing is written for an empty trace.
pub fn write_csv<R: TraceRow, W: io::Write>(trace: &Trace<R>, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    if let Some(first) = trace.rows().first() {
        wtr.write_record(first.headers())?;
        for row in trace {
            wtr.write_record(row.cells().iter().map(Cell::to_string))?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Indices of the rows worth showing for a long run of `len` rows: every
/// `max(1, len / 10)`-th row plus the last one.
pub fn sample_rows(len: usize) -> Vec<usize> {
    let stride = (len / 10).max(1);
    (0..len)
        .filter(|&i| (i + 1) % stride == 0 || i + 1 == len)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(usize, f64);

    impl TraceRow for Row {
        fn headers(&self) -> Vec<String> {
            vec!["iter".to_string(), "value".to_string()]
        }

        fn cells(&self) -> Vec<Cell> {
            vec![self.0.into(), self.1.into()]
        }
    }

    fn trace_of(values: &[f64]) -> Trace<Row> {
        let mut trace = Trace::new();
        for (i, &v) in values.iter().enumerate() {
            trace.push(Row(i, v));
        }
        trace
    }

    #[test]
    fn table_has_header_and_one_line_per_row() {
        let table = render_table(&trace_of(&[1.5, -0.25]));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("iter"));
        assert!(lines[0].ends_with("value"));
        assert!(lines[1].starts_with('0'));
        assert!(lines[2].contains("-2.5000000000e-1"));
    }

    #[test]
    fn table_pads_columns_without_trailing_blanks() {
        let table = render_table(&trace_of(&[1.0]));
        let mut lines = table.lines();
        assert_eq!(lines.next(), Some(format!("iter{}value", " ".repeat(14)).as_str()));
        assert_eq!(lines.next(), Some(format!("0{}1.0000000000e0", " ".repeat(17)).as_str()));
        assert!(table.ends_with("e0\n"));
    }

    #[test]
    fn empty_trace_renders_nothing() {
        assert!(render_table(&trace_of(&[])).is_empty());
        let mut buffer = Vec::new();
        write_csv(&trace_of(&[]), &mut buffer).expect("csv write");
        assert!(buffer.is_empty());
    }

    #[test]
    fn csv_round_trips_values() {
        let mut buffer = Vec::new();
        write_csv(&trace_of(&[0.5, 2.0]), &mut buffer).expect("csv write");
        let text = String::from_utf8(buffer).expect("utf8");
        assert_eq!(text, "iter,value\n0,0.5\n1,2\n");
    }

    #[test]
    fn sample_rows_takes_every_tenth_and_the_last() {
        assert_eq!(sample_rows(0), Vec::<usize>::new());
        assert_eq!(sample_rows(3), vec![0, 1, 2]);
        assert_eq!(sample_rows(20), vec![1, 3, 5, 7, 9, 11, 13, 15, 17, 19]);
        assert_eq!(sample_rows(25), vec![1, 3, 5, 7, 9, 11, 13, 15, 17, 19, 21, 23, 24]);
    }
}
