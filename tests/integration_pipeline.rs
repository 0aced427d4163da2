mod common;

use std::process::Command;
use std::str::FromStr;

use rust_decimal::Decimal;
use statement_ledger::{
    ConvertError, ConvertOptions, TransactionKind, convert_pdf_bytes_to_csv_string,
    convert_pdf_to_csv,
};
use tempfile::tempdir;

fn statement_pages() -> Vec<Vec<String>> {
    vec![
        vec![
            "Statement of Account".to_string(),
            "01/02/2024  Salary  200.00  1,200.00".to_string(),
            "02/02/2024  Rent  150.00  1,050.00".to_string(),
        ],
        vec![
            "Page 2 of 2".to_string(),
            "05/02/2024  Grocery Store  49.99  1,000.01".to_string(),
        ],
    ]
}

fn declared_opening() -> ConvertOptions {
    ConvertOptions {
        declared_opening_balance: Some(Decimal::from_str("1000.00").expect("valid decimal")),
        ..ConvertOptions::default()
    }
}

#[test]
fn converts_statement_pdf_to_csv() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("statement.pdf");
    let output = dir.path().join("statement.csv");

    common::create_test_pdf(&input, &statement_pages()).expect("PDF fixture should be created");

    let report = convert_pdf_to_csv(&input, &output, &declared_opening())
        .expect("conversion should succeed");

    let csv = std::fs::read_to_string(&output).expect("CSV should be readable");
    assert!(
        csv.starts_with("date,description,amount,kind,balance,page\n"),
        "unexpected CSV output: {csv:?}, report: {report:?}"
    );
    assert!(
        csv.contains("2024-02-02,Rent,-150.00,debit,1050.00,1"),
        "unexpected CSV output: {csv:?}, report: {report:?}"
    );
    assert!(
        csv.contains("2024-02-05,Grocery Store,-49.99,debit,1000.01,2"),
        "unexpected CSV output: {csv:?}, report: {report:?}"
    );
    assert_eq!(report.summary.total_transactions, 3);
    assert!(!report.summary.needs_review, "report: {report:?}");
}

#[test]
fn converts_pdf_bytes_in_memory() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("bytes.pdf");
    common::create_test_pdf(&input, &statement_pages()).expect("PDF fixture should be created");
    let bytes = std::fs::read(&input).expect("PDF should be readable");

    let (csv, report) = convert_pdf_bytes_to_csv_string(&bytes, &declared_opening())
        .expect("conversion should succeed");

    assert_eq!(csv.lines().count(), 4, "unexpected CSV output: {csv:?}");
    let kinds = report
        .transactions
        .iter()
        .map(|transaction| transaction.kind)
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::Credit,
            TransactionKind::Debit,
            TransactionKind::Debit
        ]
    );
}

#[test]
fn page_ceiling_applies_to_pdf_input() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("ceiling.pdf");
    let output = dir.path().join("ceiling.csv");
    common::create_test_pdf(&input, &statement_pages()).expect("PDF fixture should be created");

    let options = ConvertOptions {
        max_pages: 1,
        ..ConvertOptions::default()
    };
    let error = convert_pdf_to_csv(&input, &output, &options).expect_err("ceiling should trip");
    assert!(matches!(
        error,
        ConvertError::CeilingExceeded {
            resource: "page",
            limit: 1,
            actual: 2
        }
    ));
    assert!(!output.exists());
}

#[test]
fn rejects_non_pdf_input() {
    let error = convert_pdf_bytes_to_csv_string(b"not a pdf", &ConvertOptions::default())
        .expect_err("garbage should not load");
    assert!(matches!(error, ConvertError::PdfLoad(_)));
}

#[test]
fn cli_writes_csv_and_summary() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("cli.pdf");
    let output = dir.path().join("cli.csv");
    let summary = dir.path().join("cli.json");

    common::create_test_pdf(&input, &statement_pages()).expect("PDF fixture should be created");

    let status = Command::new(env!("CARGO_BIN_EXE_stmt2csv"))
        .args([
            "convert",
            "-i",
            &input.to_string_lossy(),
            "-o",
            &output.to_string_lossy(),
            "--summary",
            &summary.to_string_lossy(),
            "--opening-balance",
            "1000.00",
        ])
        .status()
        .expect("CLI should run");

    assert_eq!(status.code(), Some(0));
    let csv = std::fs::read_to_string(&output).expect("CSV should be readable");
    assert_eq!(csv.lines().count(), 4, "unexpected CSV output: {csv:?}");

    let text = std::fs::read_to_string(&summary).expect("summary should be readable");
    let json: serde_json::Value = serde_json::from_str(&text).expect("summary should be JSON");
    assert_eq!(json["summary"]["total_transactions"], 3);
    assert_eq!(json["summary"]["closing_balance"], "1000.01");
}

#[test]
fn cli_exits_with_code_2_when_no_transactions() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("cli-empty.pdf");
    let output = dir.path().join("cli-empty.csv");

    common::create_test_pdf(&input, &[vec!["No transactions here".to_string()]])
        .expect("PDF fixture should be created");

    let status = Command::new(env!("CARGO_BIN_EXE_stmt2csv"))
        .args([
            "convert",
            "-i",
            &input.to_string_lossy(),
            "-o",
            &output.to_string_lossy(),
        ])
        .status()
        .expect("CLI should run");

    assert_eq!(status.code(), Some(2));
}

#[test]
fn cli_exits_with_code_1_on_bad_configuration() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("cli-bad.pdf");
    let output = dir.path().join("cli-bad.csv");

    common::create_test_pdf(&input, &statement_pages()).expect("PDF fixture should be created");

    let status = Command::new(env!("CARGO_BIN_EXE_stmt2csv"))
        .args([
            "convert",
            "-i",
            &input.to_string_lossy(),
            "-o",
            &output.to_string_lossy(),
            "--date-format",
            "%d/%m",
        ])
        .status()
        .expect("CLI should run");

    assert_eq!(status.code(), Some(1));
}
