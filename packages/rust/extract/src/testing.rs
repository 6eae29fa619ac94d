//! In-memory `.xlsx` workbooks for tests.
//!
//! Enabled for this crate's own tests and, through the `test-util` feature,
//! for dependents that need real workbook bytes.

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Build a workbook with one worksheet per `(name, rows)` entry.
///
/// Empty strings leave the cell out, the way a merged region stores only its
/// top-left value. A `None` sheet is listed in the workbook but its XML part
/// is missing from the archive, so reading it fails.
pub fn workbook(sheets: &[(&str, Option<&[&[&str]]>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let mut sheet_list = String::new();
    let mut relationships = String::new();
    let mut overrides = String::new();
    for (idx, (name, rows)) in sheets.iter().enumerate() {
        let n = idx + 1;
        write!(
            sheet_list,
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            escape(name)
        )
        .expect("write to string");
        write!(
            relationships,
            r#"<Relationship Id="rId{n}" Type="{REL_NS}/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        )
        .expect("write to string");
        write!(
            overrides,
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        )
        .expect("write to string");

        if let Some(rows) = rows {
            let part = format!("xl/worksheets/sheet{n}.xml");
            put(&mut zip, &part, &worksheet(rows), options);
        }
    }

    put(
        &mut zip,
        "[Content_Types].xml",
        &format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}</Types>"#
        ),
        options,
    );
    put(
        &mut zip,
        "_rels/.rels",
        &format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
        ),
        options,
    );
    put(
        &mut zip,
        "xl/workbook.xml",
        &format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets>{sheet_list}</sheets></workbook>"#
        ),
        options,
    );
    put(
        &mut zip,
        "xl/_rels/workbook.xml.rels",
        &format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}">{relationships}</Relationships>"#
        ),
        options,
    );

    zip.finish().expect("finish workbook").into_inner()
}

fn worksheet(rows: &[&[&str]]) -> String {
    let mut data = String::new();
    for (r, cells) in rows.iter().enumerate() {
        let row_num = r + 1;
        write!(data, r#"<row r="{row_num}">"#).expect("write to string");
        for (c, text) in cells.iter().enumerate() {
            if text.is_empty() {
                continue;
            }
            assert!(c < 26, "fixture sheets stay within columns A-Z");
            let col = char::from(b'A' + c as u8);
            write!(
                data,
                r#"<c r="{col}{row_num}" t="inlineStr"><is><t>{}</t></is></c>"#,
                escape(text)
            )
            .expect("write to string");
        }
        data.push_str("</row>");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{MAIN_NS}"><sheetData>{data}</sheetData></worksheet>"#
    )
}

fn put(zip: &mut ZipWriter<Cursor<Vec<u8>>>, path: &str, body: &str, options: SimpleFileOptions) {
    zip.start_file(path, options).expect("start zip entry");
    zip.write_all(body.as_bytes()).expect("write zip entry");
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
