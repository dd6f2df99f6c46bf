//! Reference adapters for two common export shapes.

pub mod bank_csv;
pub mod wallet_csv;

pub use bank_csv::BankCsvAdapter;
pub use wallet_csv::WalletCsvAdapter;
