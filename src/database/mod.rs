//! Relational side of the conversion: dataset model, column typing, SQL generation
//! and provisioning against a database server.
pub mod column;
pub mod dataset;
pub mod executor;
pub mod pg;
pub mod statement;
