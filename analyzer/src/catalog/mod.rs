pub mod run_table;

pub use run_table::RunCatalog;
