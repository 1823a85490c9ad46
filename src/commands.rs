mod captures;
mod compare_images;
mod ingest;
mod records;
mod report;

pub use captures::run_captures;
pub use compare_images::run_compare_images;
pub use ingest::run_ingest;
pub use records::run_records;
pub use report::run_report;
