use crate::error::Sheet2PgError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::ElementAttributes;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::TextBuffer;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::BufReader;
use tracing::debug;
use zip::read::ZipFile;
use zip::ZipArchive;

// XML tag names in SpreadsheetML parts
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");   // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");  // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");         // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr"); // Workbook properties
const TAG_SHEET: QName = QName(b"sheet");             // Worksheet definition
const TAG_ROW: QName = QName(b"row");                 // Row in worksheet
const TAG_CELL: QName = QName(b"c");                  // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");        // Inline string value
const TAG_VALUE: QName = QName(b"v");                 // Cell value content

/// An opened xlsx workbook
pub struct XlsxSpreadsheet {
    /// File name of the workbook
    pub(crate) name: String,
    /// ZIP archive containing the package parts
    zip: ZipArchive<UnifiedReader>,
    /// Cell type per style index, used to tell dates from plain numbers
    number_formats: Vec<CellType>,
    /// Worksheets in workbook order as (name, zip_path) pairs
    sheets: Vec<(String, String)>,
}

impl XlsxSpreadsheet {
    /// Opens an xlsx file from disk and parses its structure
    pub fn open(file_name: &str) -> Result<XlsxSpreadsheet, Sheet2PgError> {
        let reader = UnifiedReader::open(file_name)?;
        Self::load(file_name, reader)
    }

    /// Parses an xlsx workbook already held in memory, e.g. an uploaded file
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<XlsxSpreadsheet, Sheet2PgError> {
        Self::load(name, UnifiedReader::from_bytes(bytes))
    }

    fn load(name: &str, reader: UnifiedReader) -> Result<XlsxSpreadsheet, Sheet2PgError> {
        let mut zip = ZipArchive::new(reader)?;
        let (sheets, is_1904) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
        }
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        debug!(workbook = name, sheets = sheets.len(), is_1904, "workbook opened");
        Ok(XlsxSpreadsheet {
            name: name.to_owned(),
            zip,
            number_formats,
            sheets,
        })
    }

    /// Returns the file name of this workbook
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Loads the whole shared string table
    fn load_shared_strings(&mut self) -> Result<Vec<String>, Sheet2PgError> {
        let mut shared_strings = Vec::<String>::new();
        let mut reader = match self.zip.xml_reader("xl/sharedStrings.xml")? {
            Some(reader) => reader,
            None => return Ok(shared_strings),
        };

        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
                let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
                shared_strings.push(string);
            }
        });
        Ok(shared_strings)
    }

    /// Reads one worksheet: the named one, or the first sheet when `sheet_name` is `None`
    ///
    /// Shared string references are resolved, error cells are dropped so they read as missing.
    pub fn read_sheet(&mut self, sheet_name: Option<&str>) -> Result<Sheet, Sheet2PgError> {
        let (sheet_name, zip_path) = match sheet_name {
            Some(wanted) => self.sheets.iter().find(|(name, _)| name == wanted),
            None => self.sheets.first(),
        }
        .cloned()
        .ok_or_else(|| SpreadsheetError::SheetNotFound {
            file_name: self.name.to_owned(),
            sheet_name: sheet_name.unwrap_or_default().to_owned(),
        })?;
        let shared_strings = self.load_shared_strings()?;

        let mut sheet = Sheet::new(&self.name, &sheet_name);
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut reader = self.zip.xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                if let Some(number) = event.parse_attribute::<usize>("r")? {
                    row_count = number.saturating_sub(1);
                }
                col_count = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => {
                row_count += 1;
                col_count = 0;
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = match event.attribute("r")? {
                    Some(reference) => reference_to_index(&reference)
                        .ok_or_else(|| SpreadsheetError::CellReferenceError(reference.to_string()))?,
                    None => (row_count, col_count),
                };
                col_count = col + 1;
                kind = match event.attribute("t")?.as_deref() {
                    Some("inlineStr") | Some("str") => CellType::InlineString,
                    Some("s") => CellType::SharedString,
                    Some("d") => CellType::IsoDateTime,
                    Some("b") => CellType::Boolean,
                    Some("e") => CellType::Error,
                    _ => CellType::Number,
                };
                if kind == CellType::Number {
                    if let Some(style) = event.parse_attribute::<usize>("s")? {
                        kind = self.number_formats.get(style).copied().unwrap_or(CellType::Number);
                    }
                }
                value.clear();
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.name() == TAG_CELL => {
                if kind != CellType::Error && !value.is_empty() {
                    if kind == CellType::SharedString {
                        let index = value.parse::<usize>()?;
                        value = shared_strings.get(index)
                            .cloned()
                            .ok_or_else(|| SpreadsheetError::SharedStringError(index))?;
                        kind = CellType::InlineString;
                    }
                    sheet.push(Cell {
                        row,
                        col,
                        kind,
                        value: std::mem::take(&mut value),
                    });
                }
                value.clear();
                kind = CellType::Empty;
            }
        });
        sheet.finish();
        debug!(workbook = %self.name, sheet = %sheet.name, cells = sheet.cells.len(), "sheet read");
        Ok(sheet)
    }
}

/// Loads worksheet names and part paths from `xl/workbook.xml`, plus the date system in use
fn load_workbook(zip: &mut ZipArchive<UnifiedReader>) -> Result<(Vec<(String, String)>, bool), Sheet2PgError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let name = event.attribute("name")?;
            let id = event.attribute("id")?;
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&*id) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.attribute("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Loads cell style number formats from `xl/styles.xml`
fn load_number_formats(zip: &mut ZipArchive<UnifiedReader>, is_1904: bool) -> Result<Vec<CellType>, Sheet2PgError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();

    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.attribute("numFmtId")?;
            let format = event.attribute("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                let style = CellType::parse_custom_number_format(&format, is_1904);
                custom_formats.insert(id.to_string(), style);
            }
        }

        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => {
            format_indexes_context = false;
        }
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.attribute("numFmtId")?;
            format_indexes.push(id.map(|id| id.to_string()).unwrap_or_else(|| "0".to_owned()));
        }
    });

    Ok(excel::load_number_formats(format_indexes, custom_formats, is_1904))
}

/// Reads the string content of a `<si>`, `<is>` or `<v>` element up to its end tag,
/// skipping phonetic runs
fn read_string_value(
    reader: &mut XmlReader<BufReader<ZipFile<'_, UnifiedReader>>>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, Sheet2PgError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_reference(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellType;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr/>
<sheets><sheet name="People" sheetId="1" r:id="rId1"/><sheet name="Other" sheetId="2" r:id="rId2"/></sheets>
</workbook>"#;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd hh:mm"/></numFmts>
<cellXfs count="4"><xf numFmtId="0"/><xf numFmtId="14"/><xf numFmtId="164"/><xf numFmtId="2"/></cellXfs>
</styleSheet>"#;

    const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="6" uniqueCount="6">
<si><t>First Name</t></si>
<si><t>Age</t></si>
<si><t>Joined</t></si>
<si><t>Ann</t></si>
<si><r><t>O&apos;</t></r><r><t>Brien</t></r><rPh sb="0" eb="1"><t>ignored</t></rPh></si>
<si><t>Score</t></si>
</sst>"#;

    const SHEET1: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c><c r="D1" t="s"><v>5</v></c></row>
<row r="2"><c r="A2" t="s"><v>3</v></c><c r="B2"><v>30</v></c><c r="C2" s="1"><v>44927</v></c><c r="D2" s="3"><v>1.5</v></c></row>
<row r="3"><c r="A3" t="s"><v>4</v></c><c r="B3"><v>41</v></c><c r="C3" s="2"><v>45306.5</v></c><c r="D3" t="e"><v>#N/A</v></c></row>
<row r="5"><c r="A5" t="inlineStr"><is><t>Bob</t></is></c><c r="B5"><v>7</v></c><c r="D5"><v>2</v></c></row>
</sheetData></worksheet>"#;

    const SHEET2: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row><c t="b"><v>1</v></c><c t="str"><v>x</v></c></row>
</sheetData></worksheet>"#;

    /// Builds a small two-sheet workbook in memory.
    pub(crate) fn workbook_bytes() -> Vec<u8> {
        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/styles.xml", STYLES),
            ("xl/sharedStrings.xml", SHARED_STRINGS),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ];
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn values(sheet: &Sheet) -> Vec<(String, CellType, String)> {
        sheet.cells.iter()
            .map(|cell| (cell.reference(), cell.kind, cell.value.to_owned()))
            .collect()
    }

    #[test]
    fn sheet_names_in_workbook_order() {
        let spreadsheet = XlsxSpreadsheet::from_bytes("book.xlsx", workbook_bytes()).unwrap();
        assert_eq!(spreadsheet.name(), "book.xlsx");
        assert_eq!(spreadsheet.sheet_names(), vec!["People", "Other"]);
    }

    #[test]
    fn reads_first_sheet_by_default() {
        let mut spreadsheet = XlsxSpreadsheet::from_bytes("book.xlsx", workbook_bytes()).unwrap();
        let sheet = spreadsheet.read_sheet(None).unwrap();
        assert_eq!(sheet.name(), "People");
        let inline = CellType::InlineString;
        assert_eq!(
            values(&sheet),
            vec![
                ("A1".to_owned(), inline, "First Name".to_owned()),
                ("B1".to_owned(), inline, "Age".to_owned()),
                ("C1".to_owned(), inline, "Joined".to_owned()),
                ("D1".to_owned(), inline, "Score".to_owned()),
                ("A2".to_owned(), inline, "Ann".to_owned()),
                ("B2".to_owned(), CellType::Number, "30".to_owned()),
                ("C2".to_owned(), CellType::NumberDate1900, "44927".to_owned()),
                ("D2".to_owned(), CellType::Number, "1.5".to_owned()),
                ("A3".to_owned(), inline, "O'Brien".to_owned()),
                ("B3".to_owned(), CellType::Number, "41".to_owned()),
                ("C3".to_owned(), CellType::NumberDateTime1900, "45306.5".to_owned()),
                ("A5".to_owned(), inline, "Bob".to_owned()),
                ("B5".to_owned(), CellType::Number, "7".to_owned()),
                ("D5".to_owned(), CellType::Number, "2".to_owned()),
            ]
        );
        assert_eq!(sheet.row_upper_bound, Some(4));
        assert_eq!(sheet.col_upper_bound, Some(3));
    }

    #[test]
    fn reads_named_sheet_without_references() {
        let mut spreadsheet = XlsxSpreadsheet::from_bytes("book.xlsx", workbook_bytes()).unwrap();
        let sheet = spreadsheet.read_sheet(Some("Other")).unwrap();
        assert_eq!(
            values(&sheet),
            vec![
                ("A1".to_owned(), CellType::Boolean, "1".to_owned()),
                ("B1".to_owned(), CellType::InlineString, "x".to_owned()),
            ]
        );
    }

    #[test]
    fn missing_sheet_is_an_error() {
        let mut spreadsheet = XlsxSpreadsheet::from_bytes("book.xlsx", workbook_bytes()).unwrap();
        let error = spreadsheet.read_sheet(Some("Nope")).err().unwrap();
        assert_eq!(error.to_string(), "Sheet 'Nope' not found in 'book.xlsx'");
    }

    #[test]
    fn not_a_zip_is_an_error() {
        let result = XlsxSpreadsheet::from_bytes("book.xlsx", b"not a workbook".to_vec());
        assert!(matches!(result, Err(Sheet2PgError::ZipError(_))));
    }
}
