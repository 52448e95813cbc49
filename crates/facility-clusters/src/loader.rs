//! Facility table loading from spreadsheets and CSV exports

use crate::{ClusterError, Facility, Result, UNKNOWN_SUBDIVISION};
use calamine::{open_workbook_auto, Data, Reader};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use utmk_projection::{GeoPoint, TransverseMercator};

/// Header names of the required columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNames {
    pub longitude: String,
    pub latitude: String,
    pub subdivision: String,
    pub name: String,
    pub distance: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            longitude: "longitude".to_string(),
            latitude: "latitude".to_string(),
            subdivision: "읍면동".to_string(),
            name: "시설명".to_string(),
            distance: "real_distance(m)".to_string(),
        }
    }
}

/// Facilities that survived loading plus the number of dropped rows
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub facilities: Vec<Facility>,
    pub total_rows: usize,
    pub skipped: usize,
}

static EMPTY_CELL: Cell = Cell::Empty;

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Empty => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            Cell::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Cell::Number(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Float(v) => Cell::Number(*v),
            Data::Int(v) => Cell::Number(*v as f64),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            _ => Cell::Empty,
        }
    }
}

fn text_cell(field: &str) -> Cell {
    if field.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(field.to_string())
    }
}

struct ColumnIndex {
    longitude: usize,
    latitude: usize,
    subdivision: usize,
    name: usize,
    distance: usize,
}

impl ColumnIndex {
    fn resolve(headers: &[String], names: &ColumnNames) -> Result<Self> {
        let find = |wanted: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == wanted)
                .ok_or_else(|| ClusterError::MissingColumn(wanted.to_string()))
        };
        Ok(Self {
            longitude: find(&names.longitude)?,
            latitude: find(&names.latitude)?,
            subdivision: find(&names.subdivision)?,
            name: find(&names.name)?,
            distance: find(&names.distance)?,
        })
    }
}

fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon) && lon.is_finite()
}

/// Load facilities from `.csv` or a spreadsheet (`.xlsx`, `.xlsm`, `.xlsb`,
/// `.xls`, `.ods`). `sheet` selects a worksheet; the first one is used
/// otherwise.
pub fn load_facilities(
    path: impl AsRef<Path>,
    columns: &ColumnNames,
    sheet: Option<&str>,
    projection: &TransverseMercator,
) -> Result<LoadedTable> {
    let path = path.as_ref();
    info!("Loading facilities from {:?}", path);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let (headers, rows) = match extension.as_str() {
        "csv" => read_csv(path)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path, sheet)?,
        other => return Err(ClusterError::UnsupportedFormat(other.to_string())),
    };

    build_facilities(&headers, rows, columns, projection)
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<Cell>>)> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(text_cell).collect());
    }

    Ok((headers, rows))
}

fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<(Vec<String>, Vec<Vec<Cell>>)> {
    let mut workbook = open_workbook_auto(path)?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ClusterError::MissingSheet("<first>".to_string()))?,
    };
    if !workbook.sheet_names().contains(&sheet_name) {
        return Err(ClusterError::MissingSheet(sheet_name));
    }

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut iter = range.rows();

    let headers = match iter.next() {
        Some(row) => row
            .iter()
            .map(|c| Cell::from(c).as_text().unwrap_or_default())
            .collect(),
        None => Vec::new(),
    };
    let rows = iter.map(|row| row.iter().map(Cell::from).collect()).collect();

    Ok((headers, rows))
}

fn build_facilities(
    headers: &[String],
    rows: Vec<Vec<Cell>>,
    columns: &ColumnNames,
    projection: &TransverseMercator,
) -> Result<LoadedTable> {
    let index = ColumnIndex::resolve(headers, columns)?;
    let total_rows = rows.len();

    let mut facilities = Vec::new();
    let mut skipped = 0;

    for (i, row) in rows.into_iter().enumerate() {
        // Header is spreadsheet row 1
        let row_number = i + 2;
        let cell = |col: usize| row.get(col).unwrap_or(&EMPTY_CELL);

        let lon = match cell(index.longitude).as_f64() {
            Some(l) if is_valid_longitude(l) => l,
            _ => {
                skipped += 1;
                continue;
            }
        };
        let lat = match cell(index.latitude).as_f64() {
            Some(l) if is_valid_latitude(l) => l,
            _ => {
                skipped += 1;
                continue;
            }
        };
        let distance_m = match cell(index.distance).as_f64() {
            Some(d) if d.is_finite() && d >= 0.0 => d,
            _ => {
                skipped += 1;
                continue;
            }
        };

        let planar = match projection.forward(GeoPoint::new(lon, lat)) {
            Ok(p) => p,
            Err(e) => {
                warn!("Row {}: {}", row_number, e);
                skipped += 1;
                continue;
            }
        };

        let name = cell(index.name)
            .as_text()
            .unwrap_or_else(|| "Unknown".to_string());
        let subdivision = cell(index.subdivision)
            .as_text()
            .unwrap_or_else(|| UNKNOWN_SUBDIVISION.to_string());

        facilities.push(Facility {
            row: row_number,
            name,
            subdivision,
            longitude: lon,
            latitude: lat,
            x: planar.x,
            y: planar.y,
            distance_m,
        });
    }

    if skipped > 0 {
        warn!(
            "Dropped {} of {} rows with missing or invalid coordinates/distance",
            skipped, total_rows
        );
    }
    info!("Loaded {} facilities", facilities.len());

    Ok(LoadedTable {
        facilities,
        total_rows,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_csv_drops_incomplete_rows() {
        let file = csv_file(
            "시설명,읍면동,longitude,latitude,real_distance(m)\n\
             Hall A,Onam-eup,127.20,37.70,45.5\n\
             Hall B,,127.21,37.71,320\n\
             Hall C,Onam-eup,,37.72,10\n\
             Hall D,Onam-eup,127.22,37.72,\n\
             Hall E,Onam-eup,127.23,abc,10\n",
        );

        let tm = TransverseMercator::utm_k();
        let table = load_facilities(file.path(), &ColumnNames::default(), None, &tm).unwrap();

        assert_eq!(table.total_rows, 5);
        assert_eq!(table.skipped, 3);
        assert_eq!(table.facilities.len(), 2);

        let a = &table.facilities[0];
        assert_eq!(a.name, "Hall A");
        assert_eq!(a.row, 2);
        assert!((a.distance_m - 45.5).abs() < 1e-12);
        assert!(a.x < 1_000_000.0 && a.y < 2_000_000.0);

        assert_eq!(table.facilities[1].subdivision, UNKNOWN_SUBDIVISION);
    }

    #[test]
    fn test_missing_column() {
        let file = csv_file("name,longitude,latitude\nx,127,37\n");
        let tm = TransverseMercator::utm_k();
        let err = load_facilities(file.path(), &ColumnNames::default(), None, &tm).unwrap_err();
        assert!(matches!(err, ClusterError::MissingColumn(c) if c == "읍면동"));
    }

    #[test]
    fn test_custom_column_names_and_bom() {
        let file = csv_file(
            "\u{feff}name,area,lon,lat,dist\n\
             Hall,North,127.0,37.0,12\n",
        );
        let columns = ColumnNames {
            longitude: "lon".into(),
            latitude: "lat".into(),
            subdivision: "area".into(),
            name: "name".into(),
            distance: "dist".into(),
        };
        let tm = TransverseMercator::utm_k();
        let table = load_facilities(file.path(), &columns, None, &tm).unwrap();
        assert_eq!(table.facilities.len(), 1);
        assert_eq!(table.facilities[0].subdivision, "North");
    }

    #[test]
    fn test_unsupported_extension() {
        let file = Builder::new().suffix(".txt").tempfile().unwrap();
        let tm = TransverseMercator::utm_k();
        let err = load_facilities(file.path(), &ColumnNames::default(), None, &tm).unwrap_err();
        assert!(matches!(err, ClusterError::UnsupportedFormat(ext) if ext == "txt"));
    }

    enum XCell {
        Text(&'static str),
        Number(f64),
        Blank,
    }

    /// Minimal single-sheet workbook with shared strings
    fn xlsx_file(sheet: &str, rows: &[Vec<XCell>]) -> tempfile::NamedTempFile {
        use zip::write::SimpleFileOptions;

        let mut strings: Vec<&str> = Vec::new();
        let mut sheet_data = String::new();
        for (r, row) in rows.iter().enumerate() {
            sheet_data.push_str(&format!("<row r=\"{}\">", r + 1));
            for (c, cell) in row.iter().enumerate() {
                let reference = format!("{}{}", (b'A' + c as u8) as char, r + 1);
                match cell {
                    XCell::Text(t) => {
                        let idx = match strings.iter().position(|s| s == t) {
                            Some(idx) => idx,
                            None => {
                                strings.push(*t);
                                strings.len() - 1
                            }
                        };
                        sheet_data.push_str(&format!(
                            "<c r=\"{}\" t=\"s\"><v>{}</v></c>",
                            reference, idx
                        ));
                    }
                    XCell::Number(v) => {
                        sheet_data.push_str(&format!("<c r=\"{}\"><v>{}</v></c>", reference, v));
                    }
                    XCell::Blank => {}
                }
            }
            sheet_data.push_str("</row>");
        }

        let main_ns = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
        let rel_ns = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
        let pkg_ns = "http://schemas.openxmlformats.org/package/2006/relationships";
        let shared: String = strings
            .iter()
            .map(|s| format!("<si><t>{}</t></si>", s))
            .collect();

        let parts = [
            (
                "[Content_Types].xml",
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
                 <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
                 <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
                 <Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
                 <Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\
                 <Override PartName=\"/xl/sharedStrings.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml\"/>\
                 </Types>"
                    .to_string(),
            ),
            (
                "_rels/.rels",
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Relationships xmlns=\"{pkg_ns}\">\
                     <Relationship Id=\"rId1\" Type=\"{rel_ns}/officeDocument\" Target=\"xl/workbook.xml\"/>\
                     </Relationships>"
                ),
            ),
            (
                "xl/workbook.xml",
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                     <workbook xmlns=\"{main_ns}\" xmlns:r=\"{rel_ns}\">\
                     <sheets><sheet name=\"{sheet}\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>"
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Relationships xmlns=\"{pkg_ns}\">\
                     <Relationship Id=\"rId1\" Type=\"{rel_ns}/worksheet\" Target=\"worksheets/sheet1.xml\"/>\
                     <Relationship Id=\"rId2\" Type=\"{rel_ns}/sharedStrings\" Target=\"sharedStrings.xml\"/>\
                     </Relationships>"
                ),
            ),
            (
                "xl/sharedStrings.xml",
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                     <sst xmlns=\"{main_ns}\" count=\"{n}\" uniqueCount=\"{n}\">{shared}</sst>",
                    n = strings.len()
                ),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                     <worksheet xmlns=\"{main_ns}\"><sheetData>{sheet_data}</sheetData></worksheet>"
                ),
            ),
        ];

        let file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        let mut zip = zip::ZipWriter::new(file.reopen().unwrap());
        for (name, body) in parts {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        file
    }

    fn facility_sheet() -> Vec<Vec<XCell>> {
        use XCell::*;
        vec![
            vec![
                Text("시설명"),
                Text("읍면동"),
                Text("longitude"),
                Text("latitude"),
                Text("real_distance(m)"),
            ],
            vec![Text("Hall A"), Text("X-dong"), Number(127.2), Number(37.7), Number(40.0)],
            vec![Number(123.0), Blank, Number(127.21), Number(37.71), Number(150.0)],
            vec![Text("Hall C"), Text("X-dong"), Blank, Number(37.72), Number(10.0)],
        ]
    }

    #[test]
    fn test_load_xlsx_first_sheet() {
        let file = xlsx_file("Facilities", &facility_sheet());
        let tm = TransverseMercator::utm_k();
        let table = load_facilities(file.path(), &ColumnNames::default(), None, &tm).unwrap();

        assert_eq!(table.total_rows, 3);
        assert_eq!(table.skipped, 1);

        let rows: Vec<(&str, &str, usize)> = table
            .facilities
            .iter()
            .map(|f| (f.name.as_str(), f.subdivision.as_str(), f.row))
            .collect();
        assert_eq!(
            rows,
            vec![("Hall A", "X-dong", 2), ("123", UNKNOWN_SUBDIVISION, 3)]
        );
        assert!((table.facilities[1].distance_m - 150.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_xlsx_named_sheet() {
        let file = xlsx_file("Facilities", &facility_sheet());
        let tm = TransverseMercator::utm_k();

        let table =
            load_facilities(file.path(), &ColumnNames::default(), Some("Facilities"), &tm).unwrap();
        assert_eq!(table.facilities.len(), 2);

        let err =
            load_facilities(file.path(), &ColumnNames::default(), Some("Nope"), &tm).unwrap_err();
        assert!(matches!(err, ClusterError::MissingSheet(name) if name == "Nope"));
    }

    #[test]
    fn test_negative_distance_dropped() {
        let file = csv_file(
            "시설명,읍면동,longitude,latitude,real_distance(m)\n\
             Hall,Onam-eup,127.2,37.7,-5\n",
        );
        let tm = TransverseMercator::utm_k();
        let table = load_facilities(file.path(), &ColumnNames::default(), None, &tm).unwrap();
        assert!(table.facilities.is_empty());
        assert_eq!(table.skipped, 1);
    }
}
