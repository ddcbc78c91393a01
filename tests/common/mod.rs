//! Shared fixtures: small source files written into a temporary directory.

#![allow(dead_code)]

use ecom_panel::data::{ClassificationRecord, EcommerceRecord, InternetRecord, PanelRow};
use ecom_panel::PipelineConfig;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

const SEGMENT: (&str, &str, &str) = ("Total", "All (persons employed)", "Total");

pub fn ecom(economy: &str, year: i32, sales: f64, share: f64) -> EcommerceRecord {
    EcommerceRecord {
        economy: economy.to_string(),
        year,
        market: Some(SEGMENT.0.to_string()),
        enterprise_size: Some(SEGMENT.1.to_string()),
        sale_type: Some(SEGMENT.2.to_string()),
        sales_usd_millions: Some(sales),
        share_of_turnover_pct: Some(share),
    }
}

pub fn classified(country: &str, iso3: &str, region: &str, income: &str) -> ClassificationRecord {
    ClassificationRecord {
        country: country.to_string(),
        iso3: Some(iso3.to_string()),
        region: Some(region.to_string()),
        income_group: Some(income.to_string()),
    }
}

pub fn internet(iso3: &str, year: i32, pct: f64) -> InternetRecord {
    InternetRecord {
        iso3: iso3.to_string(),
        year,
        users_pct: Some(pct),
    }
}

pub fn find<'a>(rows: &'a [PanelRow], country: &str, year: i32) -> Option<&'a PanelRow> {
    rows.iter()
        .find(|r| r.country_name == country && r.year == year)
}

pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

const ECOMMERCE_CSV: &str = "\
Economy Label,Year,Market Label,EnterpriseSize Label,ECommerceSale Label,US$ at current prices in millions,Percentage in total turnover
Testland,2018,Total,All (persons employed),Total,30,1.5
Testland,2019,Total,All (persons employed),Total,10,2.0
Testland,2019,Total,All (persons employed),Total,20,3.0
Testland,2019,Total,All (persons employed),Total,5,1.0
Testland,2019,B2B,All (persons employed),Total,999,9.0
Testland,2020,Total,All (persons employed),Total,50,4.0
Testland,2021,Total,All (persons employed),Total,60,5.0
Testland,not a year,Total,All (persons employed),Total,1,1.0
Otherland,2019,Total,All (persons employed),Total,4,1.0
Otherland,2020,Total,All (persons employed),Total,6,2.0
Otherland,2021,Total,All (persons employed),Total,6,2.5
Ghostland,2019,Total,All (persons employed),Total,1,0.5
Ghostland,2020,Total,All (persons employed),Total,2,0.6
Loneland,2020,Total,All (persons employed),Total,3,0.7
Latina,2019,Total,All (persons employed),Total,5,1.0
Latina,2020,Total,All (persons employed),Total,6,1.0
Malta,2019,Total,All (persons employed),Total,2,1.0
Malta,2020,Total,All (persons employed),Total,3,1.2
Canada,2019,Total,All (persons employed),Total,100,3.0
Canada,2020,Total,All (persons employed),Total,110,3.5
\"Hong Kong SAR, China\",2019,Total,All (persons employed),Total,7,2.0
\"Hong Kong SAR, China\",2020,Total,All (persons employed),Total,8,2.0
";

const CLASSIFICATION_CSV: &str = "\
Economy,Code,Region,Income group
Testland,TST,Europe & Central Asia,High income
Otherland,OTH,Sub-Saharan Africa,Lower middle income
Loneland,LON,South Asia,Low income
Latina,LAT,Latin America & Caribbean,Upper middle income
Malta,MLT,Middle East & North Africa,High income
Canada,CAN,North America,High income
\"Hong Kong SAR, China\",HKG,East Asia & Pacific,High income
";

const INTERNET_CSV: &str = "\
Entity,Code,Year,Individuals using the Internet (% of population)
Testland,TST,2018,80
Testland,TST,2019,82
Testland,TST,2020,85
Testland,TST,2021,88
Otherland,OTH,2019,20
Otherland,OTH,2020,25
World,,2020,60
";

const MONTHLY_CSV: &str = "\
REF_DATE,GEO,Sales,VALUE
2020-06,Canada,\"Retail E-commerce sales, unadjusted\",100
2020-06,Canada,\"Retail trade, unadjusted [44-453]\",1000
2020-07,Canada,\"Retail E-commerce sales, unadjusted\",200
2020-07,Canada,\"Retail trade, unadjusted [44-453]\",1000
2020-12,Canada,\"Retail E-commerce sales, unadjusted\",300
";

const CONFLICT_CSV: &str = "\
year,country,best,deaths_civilians
2020,Otherland,60,10
2020,Otherland,50,5
2021,Testland,5,0
";

/// Source files for a complete run plus a configuration pointing at them.
pub struct Fixture {
    pub dir: TempDir,
    pub config: PipelineConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();

        for (name, body) in [
            ("ecommerce.csv", ECOMMERCE_CSV),
            ("classification.csv", CLASSIFICATION_CSV),
            ("internet.csv", INTERNET_CSV),
            ("monthly.csv", MONTHLY_CSV),
            ("conflict.csv", CONFLICT_CSV),
        ] {
            fs::write(data.join(name), body).unwrap();
        }

        let mut config = PipelineConfig::default();
        config.sources.data_dir = data;
        config.sources.ecommerce = PathBuf::from("ecommerce.csv");
        config.sources.classification = PathBuf::from("classification.csv");
        config.sources.internet = PathBuf::from("internet.csv");
        config.sources.monthly_detail = Some(PathBuf::from("monthly.csv"));
        config.sources.conflict = Some(PathBuf::from("conflict.csv"));
        config.output.dir = dir.path().join("out");
        config.reporting.charts = false;

        Self { dir, config }
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.config.sources.data_dir.join(name)
    }
}

const XLSX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#;

const XLSX_ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        letters.push((b'A' + ((n - 1) % 26) as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn sheet_xml(rows: &[Vec<&str>]) -> String {
    let mut body = String::new();
    for (r, row) in rows.iter().enumerate() {
        body.push_str(&format!("<row r=\"{}\">", r + 1));
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let cell = format!("{}{}", column_letter(c), r + 1);
            if value.parse::<f64>().is_ok() {
                body.push_str(&format!("<c r=\"{cell}\"><v>{value}</v></c>"));
            } else {
                body.push_str(&format!(
                    "<c r=\"{cell}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                    xml_escape(value)
                ));
            }
        }
        body.push_str("</row>");
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
         <sheetData>{body}</sheetData></worksheet>"
    )
}

/// Write a minimal xlsx workbook. Cells that parse as numbers are stored as
/// numeric cells, everything else as inline strings; empty cells are omitted.
pub fn write_xlsx(path: &Path, sheets: &[(&str, Vec<Vec<&str>>)]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = FileOptions::default();

    let mut workbook_sheets = String::new();
    let mut workbook_rels = String::new();
    for (i, (name, _)) in sheets.iter().enumerate() {
        let id = i + 1;
        workbook_sheets.push_str(&format!(
            "<sheet name=\"{}\" sheetId=\"{id}\" r:id=\"rId{id}\"/>",
            xml_escape(name)
        ));
        workbook_rels.push_str(&format!(
            "<Relationship Id=\"rId{id}\" \
             Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" \
             Target=\"worksheets/sheet{id}.xml\"/>"
        ));
    }

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(XLSX_CONTENT_TYPES.as_bytes()).unwrap();
    zip.start_file("_rels/.rels", options).unwrap();
    zip.write_all(XLSX_ROOT_RELS.as_bytes()).unwrap();

    zip.start_file("xl/workbook.xml", options).unwrap();
    zip.write_all(
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
             <workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
             xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
             <sheets>{workbook_sheets}</sheets></workbook>"
        )
        .as_bytes(),
    )
    .unwrap();

    zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    zip.write_all(
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
             <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
             {workbook_rels}</Relationships>"
        )
        .as_bytes(),
    )
    .unwrap();

    for (i, (_, rows)) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
            .unwrap();
        zip.write_all(sheet_xml(rows).as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}
