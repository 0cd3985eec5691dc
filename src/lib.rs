//! Core library for the chart-importer command line application.
//!
//! A chart upload flows through narrow stages: [`io`] reads spreadsheet rows,
//! [`decode`] turns them into a flat table, [`validate`] checks the table,
//! [`forest`] nests it, [`import`] writes the records through a
//! [`store::RecordStore`], and [`distribution`] links distributed cost centers
//! once every record exists. [`pipeline`] strings the stages together.

pub mod decode;
pub mod distribution;
pub mod error;
pub mod forest;
pub mod import;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod validate;

pub use error::{Result, ToolError};
