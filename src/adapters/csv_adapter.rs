//! Broker CSV export adapter.

use crate::domain::error::LedgerError;
use crate::domain::normalize::CellValue;
use crate::domain::transaction::Transaction;
use crate::ports::transaction_port::TransactionPort;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

/// Rows with fewer fields than this are not ledger lines.
pub const MIN_FIELDS: usize = 8;

enum CsvSource {
    File(PathBuf),
    Text(String),
}

pub struct CsvTransactionAdapter {
    source: CsvSource,
    delimiter: u8,
}

impl CsvTransactionAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            source: CsvSource::File(path),
            delimiter: b',',
        }
    }

    pub fn from_string(content: &str) -> Self {
        Self {
            source: CsvSource::Text(content.to_string()),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn parse<R: Read>(&self, reader: R) -> Result<Vec<Transaction>, LedgerError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(reader);

        let mut transactions = Vec::new();
        for (row, result) in rdr.byte_records().enumerate() {
            let record = result.map_err(|e| LedgerError::Input {
                reason: format!("CSV parse error at row {}: {}", row + 2, e),
            })?;

            let cells: Vec<CellValue> = record
                .iter()
                .map(|field| CellValue::from(String::from_utf8_lossy(field).as_ref()))
                .collect();
            if cells.len() < MIN_FIELDS || cells.iter().all(CellValue::is_empty) {
                log::debug!("row {}: {} fields, skipped", row + 2, cells.len());
                continue;
            }

            let index = transactions.len();
            transactions.push(Transaction::from_cells(index, &cells));
        }
        Ok(transactions)
    }
}

impl TransactionPort for CsvTransactionAdapter {
    fn load_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        match &self.source {
            CsvSource::File(path) => {
                let file = File::open(path).map_err(|e| LedgerError::Input {
                    reason: format!("failed to read {}: {}", path.display(), e),
                })?;
                self.parse(file)
            }
            CsvSource::Text(content) => self.parse(content.as_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "Fecha,Hora,Fecha valor,Producto,ISIN,Descripción,Tipo,Variación,,Saldo,,ID Orden\n";

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn loads_rows_after_header() {
        let content = format!(
            "{HEADER}\
05-03-2024,10:15,05-03-2024,APPLE INC,US0378331005,\"Compra 10 Apple Inc@170,5 USD (US0378331005)\",,USD,\"-1.705,00\",USD,\"-1.705,00\",abc\n\
06-03-2024,09:00,06-03-2024,,,Ingreso,,EUR,\"2.000,00\",EUR,\"295,00\",\n"
        );
        let adapter = CsvTransactionAdapter::from_string(&content);
        let txs = adapter.load_transactions().unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].index, 0);
        assert_eq!(txs[0].date, "2024-03-05");
        assert_eq!(
            txs[0].description,
            "Compra 10 Apple Inc@170,5 USD (US0378331005)"
        );
        assert!((txs[0].amount + 1705.0).abs() < 1e-9);
        assert_eq!(txs[0].order_id, "abc");
        assert_eq!(txs[1].index, 1);
        assert!((txs[1].amount - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn short_and_blank_rows_are_skipped() {
        let content = format!("{HEADER}a,b,c\n,,,,,,,,,,,\n01-01-2024,,,X,,Ingreso,,EUR,1,EUR,1,\n");
        let txs = CsvTransactionAdapter::from_string(&content)
            .load_transactions()
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].product, "X");
        assert_eq!(txs[0].index, 0);
    }

    #[test]
    fn semicolon_delimiter() {
        let content = "h\n01-01-2024;;;X;;Ingreso;;EUR;5;EUR;5;\n";
        let txs = CsvTransactionAdapter::from_string(content)
            .with_delimiter(b';')
            .load_transactions()
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, 5.0);
    }

    #[test]
    fn reads_from_file() {
        let file = create_temp_csv(&format!("{HEADER}01-01-2024,,,X,,Ingreso,,EUR,1,EUR,1,\n"));
        let adapter = CsvTransactionAdapter::new(file.path().to_path_buf());
        assert_eq!(adapter.load_transactions().unwrap().len(), 1);
    }

    #[test]
    fn missing_file_is_input_error() {
        let adapter = CsvTransactionAdapter::new(PathBuf::from("/nonexistent/ledger.csv"));
        assert!(matches!(
            adapter.load_transactions(),
            Err(LedgerError::Input { .. })
        ));
    }
}
