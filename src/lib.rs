//! LotDB - an embedded relational engine for used-car sales analysis
//!
//! This crate provides a small end-to-end pipeline:
//! - CSV dataset loading into a persistent catalog
//! - SQL parsing, planning and execution (filters, aggregates, joins,
//!   scalar subqueries, views, secondary indexes)
//! - Pluggable storage engines (in-memory and append-only disk log)
//! - Column-aligned text reports for query results

pub mod error;
pub mod loader;
pub mod report;
pub mod script;
pub mod sql;
pub mod storage;
