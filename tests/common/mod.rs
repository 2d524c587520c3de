#![allow(dead_code)]

use brokerledger::domain::error::LedgerError;
use brokerledger::domain::transaction::Transaction;
use brokerledger::ports::transaction_port::TransactionPort;

pub struct MockTransactionPort {
    pub transactions: Vec<Transaction>,
    pub error: Option<String>,
}

impl MockTransactionPort {
    pub fn new() -> Self {
        Self {
            transactions: Vec::new(),
            error: None,
        }
    }

    pub fn with_transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl TransactionPort for MockTransactionPort {
    fn load_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        if let Some(reason) = &self.error {
            return Err(LedgerError::Input {
                reason: reason.clone(),
            });
        }
        Ok(self.transactions.clone())
    }
}

/// Renumber `index` to match the vector position.
pub fn indexed(mut transactions: Vec<Transaction>) -> Vec<Transaction> {
    for (i, tx) in transactions.iter_mut().enumerate() {
        tx.index = i;
    }
    transactions
}

/// A buy or sell line in the broker's description format.
pub fn trade_tx(date: &str, isin: &str, product: &str, action: &str, qty: u64, price: &str) -> Transaction {
    Transaction {
        date: date.to_string(),
        time: "10:00".to_string(),
        value_date: date.to_string(),
        product: product.to_string(),
        isin: isin.to_string(),
        description: format!("{action} {qty} {product}@{price} EUR ({isin})"),
        currency: "EUR".to_string(),
        balance_currency: "EUR".to_string(),
        ..Default::default()
    }
}

pub fn buy(date: &str, isin: &str, qty: u64, price: f64) -> Transaction {
    trade_tx(date, isin, "ACME", "Compra", qty, &price.to_string().replace('.', ","))
}

pub fn sell(date: &str, isin: &str, qty: u64, price: f64) -> Transaction {
    trade_tx(date, isin, "ACME", "Venta", qty, &price.to_string().replace('.', ","))
}

pub fn dividend_tx(value_date: &str, isin: &str, currency: &str, amount: f64) -> Transaction {
    Transaction {
        date: value_date.to_string(),
        value_date: value_date.to_string(),
        product: "ACME".to_string(),
        isin: isin.to_string(),
        description: "Dividendo".to_string(),
        currency: currency.to_string(),
        amount,
        balance_currency: currency.to_string(),
        ..Default::default()
    }
}

pub fn withholding_tx(value_date: &str, isin: &str, currency: &str, amount: f64) -> Transaction {
    Transaction {
        description: "Retención del dividendo".to_string(),
        ..dividend_tx(value_date, isin, currency, amount)
    }
}

pub fn deposit_tx(date: &str, amount: f64) -> Transaction {
    Transaction {
        date: date.to_string(),
        description: "Ingreso Depósito".to_string(),
        currency: "EUR".to_string(),
        amount,
        balance_currency: "EUR".to_string(),
        ..Default::default()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Header plus rows of a ledger export in the broker's column order.
pub const LEDGER_CSV: &str = "\
Fecha,Hora,Fecha valor,Producto,ISIN,Descripción,Tipo,Variación,,Saldo,,ID Orden
02-01-2024,09:00,02-01-2024,,,Depósito,,EUR,\"1.000,00\",EUR,\"1.000,00\",
03-01-2024,10:00,03-01-2024,ACME CORP,XX0000000001,\"Compra 10 Acme Corp@50 EUR (XX0000000001)\",,EUR,\"-500,00\",EUR,\"500,00\",o-1
05-02-2024,10:00,05-02-2024,ACME CORP,XX0000000001,\"Compra 10 Acme Corp@60 EUR (XX0000000001)\",,EUR,\"-600,00\",EUR,\"-100,00\",o-2
01-03-2024,11:30,01-03-2024,ACME CORP,XX0000000001,\"Venta 15 Acme Corp@70 EUR (XX0000000001)\",,EUR,\"1.050,00\",EUR,\"950,00\",o-3
15-06-2024,07:00,14-06-2024,ACME CORP,XX0000000001,Dividendo,,EUR,\"10,00\",EUR,\"960,00\",
15-06-2024,07:00,14-06-2024,ACME CORP,XX0000000001,Retención del dividendo,,EUR,\"-1,50\",EUR,\"958,50\",
";
