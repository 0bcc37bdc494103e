pub mod csv;
pub mod synthetic;

pub use self::csv::CsvDirectoryProvider;
pub use self::synthetic::SyntheticProvider;
