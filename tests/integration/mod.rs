//! Integration tests for sql-chain.

pub mod config_test;
pub mod pipeline_test;
pub mod postgres_test;
pub mod stage_contract_test;
