//! Tests for the assessment report extractor.

use super::*;

const SAMPLE_REPORT: &str = r#"
<html>
<head><title>Migration Assessment</title></head>
<body>
<h1>Cluster Inventory</h1>
<p>Generated by the assessment tool.</p>
<table border="1">
  <tr><th>Database</th><th>Collection</th><th>Doc Count</th><th>Data Size</th></tr>
  <tr><td>sample_mflix</td><td>movies</td><td>21,349</td><td>0.032 GB</td></tr>
  <tr><td>sample_mflix</td><td>comments</td><td>41,079</td><td>11 MB</td></tr>
  <tr><td>analytics</td><td>events</td><td>1,000,000</td><td>4.2 GB</td></tr>
</table>
</body>
</html>
"#;

#[test]
fn test_extract_sample_report() {
    let extraction = extract_records(SAMPLE_REPORT).unwrap();
    assert_eq!(extraction.records.len(), 3);
    assert!(extraction.skipped.is_empty());

    let movies = &extraction.records[0];
    assert_eq!(movies.database, "sample_mflix");
    assert_eq!(movies.collection, "movies");
    assert_eq!(movies.doc_count, 21349);
    assert!((movies.data_size_gb - 0.032).abs() < 1e-9);
}

#[test]
fn test_extract_normalizes_mb_to_gb() {
    let extraction = extract_records(SAMPLE_REPORT).unwrap();
    let comments = &extraction.records[1];
    assert!((comments.data_size_gb - 11.0 / 1024.0).abs() < 1e-9);
}

#[test]
fn test_extract_no_tables_is_parse_error() {
    let html = "<html><body><p>Nothing here</p></body></html>";
    let err = extract_records(html).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn test_extract_unrecognized_table_is_parse_error() {
    let html = r#"
<table>
  <tr><th>Host</th><th>Version</th></tr>
  <tr><td>node-1</td><td>5.0</td></tr>
</table>
"#;
    let err = extract_records(html).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn test_extract_skips_malformed_rows() {
    let html = r#"
<table>
  <tr><th>Database</th><th>Collection</th><th>Doc Count</th><th>Data Size</th></tr>
  <tr><td>good_db</td><td>good_coll</td><td>10</td><td>1 GB</td></tr>
  <tr><td>bad_db</td><td>bad_coll</td><td>not-a-number</td><td>1 GB</td></tr>
  <tr><td></td><td>orphan</td><td>5</td><td>1 GB</td></tr>
</table>
"#;
    let extraction = extract_records(html).unwrap();
    assert_eq!(extraction.records.len(), 1);
    assert_eq!(extraction.skipped.len(), 2);
    assert_eq!(extraction.records[0].database, "good_db");
}

#[test]
fn test_extract_all_rows_malformed_is_parse_error() {
    let html = r#"
<table>
  <tr><th>Database</th><th>Collection</th><th>Doc Count</th></tr>
  <tr><td></td><td>a</td><td>1</td></tr>
  <tr><td></td><td>b</td><td>2</td></tr>
</table>
"#;
    let err = extract_records(html).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn test_extract_missing_size_defaults_to_zero() {
    let html = r#"
<table>
  <tr><th>Database</th><th>Collection</th><th>Doc Count</th></tr>
  <tr><td>db1</td><td>coll1</td><td>42</td></tr>
</table>
"#;
    let extraction = extract_records(html).unwrap();
    assert_eq!(extraction.records[0].doc_count, 42);
    assert_eq!(extraction.records[0].data_size_gb, 0.0);
}

#[test]
fn test_extract_deduplicates_repeated_rows() {
    let html = r#"
<table>
  <tr><th>Database</th><th>Collection</th><th>Doc Count</th></tr>
  <tr><td>db1</td><td>coll1</td><td>42</td></tr>
  <tr><td>db1</td><td>coll1</td><td>99</td></tr>
</table>
"#;
    let extraction = extract_records(html).unwrap();
    assert_eq!(extraction.records.len(), 1);
    // First occurrence wins.
    assert_eq!(extraction.records[0].doc_count, 42);
    assert_eq!(extraction.skipped.len(), 1);
}

#[test]
fn test_extract_multiple_tables() {
    let html = r#"
<table>
  <tr><th>Host</th><th>Version</th></tr>
  <tr><td>node-1</td><td>5.0</td></tr>
</table>
<table>
  <tr><th>Database</th><th>Collection</th><th>Doc Count</th></tr>
  <tr><td>db1</td><td>coll1</td><td>1</td></tr>
</table>
<table>
  <tr><th>Database</th><th>Collection</th><th>Doc Count</th></tr>
  <tr><td>db2</td><td>coll2</td><td>2</td></tr>
</table>
"#;
    let extraction = extract_records(html).unwrap();
    assert_eq!(extraction.records.len(), 2);
    assert_eq!(extraction.records[1].database, "db2");
}

#[test]
fn test_extract_tolerates_markup_inside_cells() {
    let html = r#"
<TABLE class="report">
  <TR><TH><b>Database</b></TH><TH>Collection</TH><TH>Doc Count</TH><TH>Data Size</TH></TR>
  <TR><TD><span class="name">my&amp;db</span></TD><TD>stuff</TD><TD>1&nbsp;234</TD><TD>512&nbsp;MB</TD></TR>
</TABLE>
"#;
    let extraction = extract_records(html).unwrap();
    let record = &extraction.records[0];
    assert_eq!(record.database, "my&db");
    assert_eq!(record.doc_count, 1234);
    assert!((record.data_size_gb - 0.5).abs() < 1e-9);
}

#[test]
fn test_parse_count_thousands_separators() {
    assert_eq!(parse_count("21,349").unwrap(), 21349);
    assert_eq!(parse_count(" 7 ").unwrap(), 7);
    assert_eq!(parse_count("").unwrap(), 0);
    assert!(parse_count("abc").is_err());
}

#[test]
fn test_parse_size_units() {
    assert!((parse_size_gb("0.032 GB").unwrap() - 0.032).abs() < 1e-9);
    assert!((parse_size_gb("1024 MB").unwrap() - 1.0).abs() < 1e-9);
    assert!((parse_size_gb("2.5").unwrap() - 2.5).abs() < 1e-9);
    assert_eq!(parse_size_gb("").unwrap(), 0.0);
    assert_eq!(parse_size_gb("-").unwrap(), 0.0);
    assert!(parse_size_gb("twelve GB").is_err());
    assert!(parse_size_gb("-3 GB").is_err());
}

#[test]
fn test_decode_entities() {
    assert_eq!(decode_entities("a&amp;b"), "a&b");
    assert_eq!(decode_entities("&lt;x&gt;"), "<x>");
    assert_eq!(decode_entities("&#65;"), "A");
    assert_eq!(decode_entities("&unknown;"), "&unknown;");
    assert_eq!(decode_entities("a & b"), "a & b");
}
