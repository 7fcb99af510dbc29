// Reading worksheets of Excel workbooks.

use calamine::{open_workbook, DataType, Reader, Xlsx};
use chrono::{Duration, NaiveDate};

use crate::pipeline::{
    io_common::{simplify_file_name, Table},
    *,
};

pub fn read_excel_table(path: &str, cfs: &FileSource) -> PipelineResult<Table> {
    let wrange = get_range(path, cfs)?;
    let mut iter = wrange.rows();
    let header: Vec<String> = iter
        .next()
        .context(EmptyExcelSnafu { path })?
        .iter()
        .map(cell_to_string)
        .collect();
    debug!("read_excel_table: {}: header: {:?}", path, header);

    let rows: Vec<Vec<String>> = iter
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    debug!("read_excel_table: {}: {} rows", path, rows.len());
    Ok(Table::new(&simplify_file_name(path), header, rows))
}

fn get_range(path: &str, cfs: &FileSource) -> PipelineResult<calamine::Range<DataType>> {
    let worksheet_name_o = cfs.excel_worksheet_name.clone();
    debug!(
        "read_excel_table: path: {:?} worksheet: {:?}",
        &path, &worksheet_name_o
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet_name_o {
        let wrange = workbook
            .worksheet_range(&worksheet_name)
            .context(MissingWorksheetSnafu {
                path,
                worksheet: worksheet_name.clone(),
            })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        let all_worksheets = workbook.worksheets();
        match all_worksheets.as_slice() {
            [] => EmptyExcelSnafu { path }.fail(),
            [(worksheet_name, wrange)] => {
                debug!(
                    "read_excel_table: path: {:?} worksheet: {:?}",
                    &path, &worksheet_name
                );
                Ok(wrange.clone())
            }
            _ => AmbiguousWorksheetSnafu { path }.fail(),
        }
    }
}

/// Text content of a cell. Dates are written the way the acquisition layer reads them.
fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::Empty => "".to_string(),
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        // Integral floats are how most spreadsheets store whole numbers.
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::DateTime(serial) => excel_serial_to_string(*serial),
        x => format!("{:?}", x),
    }
}

/// Excel counts days from 1899-12-30, with the fraction of the day as time.
fn excel_serial_to_string(serial: f64) -> String {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0));
    match base {
        Some(b) => {
            let millis = (serial * 86_400_000.0).round() as i64;
            let dt = b + Duration::milliseconds(millis);
            dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
        }
        None => serial.to_string(),
    }
}
