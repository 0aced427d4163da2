use std::io::{self, Write};
use std::path::Path;

use csv::{Writer, WriterBuilder};

use crate::error::ConvertError;
use crate::model::ClassifiedTransaction;

const HEADERS: [&str; 6] = ["date", "description", "amount", "kind", "balance", "page"];

fn write_rows<W: Write>(
    writer: &mut Writer<W>,
    transactions: &[ClassifiedTransaction],
) -> Result<(), ConvertError> {
    writer.write_record(HEADERS)?;
    for transaction in transactions {
        let draft = &transaction.draft;
        writer.write_record([
            draft.date.format("%Y-%m-%d").to_string(),
            draft.description.clone(),
            transaction.signed_amount.to_string(),
            transaction.kind.as_str().to_string(),
            draft.balance_after.to_string(),
            draft.source_page.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub(crate) fn write_csv(
    path: &Path,
    transactions: &[ClassifiedTransaction],
    delimiter: u8,
) -> Result<(), ConvertError> {
    let mut writer = WriterBuilder::new().delimiter(delimiter).from_path(path)?;
    write_rows(&mut writer, transactions)
}

pub(crate) fn write_csv_to_string(
    transactions: &[ClassifiedTransaction],
    delimiter: u8,
) -> Result<String, ConvertError> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::<u8>::new());
    write_rows(&mut writer, transactions)?;

    let bytes = writer
        .into_inner()
        .map_err(|error| ConvertError::Csv(error.into_error().into()))?;
    utf8_output(bytes)
}

fn utf8_output(bytes: Vec<u8>) -> Result<String, ConvertError> {
    String::from_utf8(bytes)
        .map_err(|error| ConvertError::Io(io::Error::new(io::ErrorKind::InvalidData, error)))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    use super::{utf8_output, write_csv_to_string};
    use crate::error::ConvertError;
    use crate::model::{ClassifiedTransaction, ColumnHint, DraftTransaction, TransactionKind};

    fn transaction(description: &str, signed: &str, balance: &str) -> ClassifiedTransaction {
        let signed_amount = Decimal::from_str(signed).expect("valid decimal");
        ClassifiedTransaction {
            draft: DraftTransaction {
                sequence_index: 0,
                date: NaiveDate::from_ymd_opt(2024, 1, 5).expect("valid date"),
                description: description.to_string(),
                amount_magnitude: signed_amount.abs(),
                balance_after: Decimal::from_str(balance).expect("valid decimal"),
                source_page: 2,
                column_hint: ColumnHint::Unknown,
            },
            signed_amount,
            kind: if signed_amount.is_sign_negative() {
                TransactionKind::Debit
            } else {
                TransactionKind::Credit
            },
        }
    }

    #[test]
    fn writes_signed_amounts_with_header() {
        let csv = write_csv_to_string(
            &[
                transaction("Salary, March", "2500.00", "3500.00"),
                transaction("Rent", "-900.00", "2600.00"),
            ],
            b',',
        )
        .expect("csv output");
        assert_eq!(
            csv,
            "date,description,amount,kind,balance,page\n\
             2024-01-05,\"Salary, March\",2500.00,credit,3500.00,2\n\
             2024-01-05,Rent,-900.00,debit,2600.00,2\n"
        );
    }

    #[test]
    fn honours_delimiter() {
        let csv = write_csv_to_string(&[transaction("Fee", "-1.50", "10.00")], b';').expect("csv");
        assert!(csv.starts_with("date;description;amount;kind;balance;page\n"));
        assert!(csv.contains("2024-01-05;Fee;-1.50;debit;10.00;2"));
    }

    #[test]
    fn invalid_utf8_output_is_an_io_error() {
        let error = utf8_output(vec![b'a', 0xff, b'b']).expect_err("invalid utf-8");
        let ConvertError::Io(io) = error else {
            panic!("unexpected error: {error:?}");
        };
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
    }
}
