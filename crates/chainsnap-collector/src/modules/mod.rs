//! 수집 워크플로우 모듈.

pub mod chain_collect;
pub mod csv_export;

pub use chain_collect::collect_chains;
pub use csv_export::export_snapshot;
