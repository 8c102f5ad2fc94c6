pub mod aggregation;
pub mod csr_summary;
pub mod dashboard;
pub mod ingest;
pub mod submissions;
pub mod tokens;
pub mod uploads;
pub mod validator;
