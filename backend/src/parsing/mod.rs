//! Parsers for the file formats exchanged with the telescope side.
//!
//! # Parsers
//!
//! - [`fields_parser`]: the `.fields` commented-header tables holding the
//!   fields still to be observed for a plan
//! - [`txt_plan_parser`]: plain-text tile lists (`rank_id id ra dec weight date time`)
//! - [`fits_header`]: FITS primary header access for the exporter
//!
//! SkyPortal's JSON plan payload is handled in [`crate::models::plan`].

pub mod fields_parser;
pub mod fits_header;
pub mod txt_plan_parser;

#[cfg(test)]
mod fields_parser_tests;

pub use fields_parser::{parse_fields_file, parse_fields_str, write_fields_str};
pub use fits_header::{FitsError, FitsHeader, FitsValue};
pub use txt_plan_parser::{parse_txt_plan_file, parse_txt_plan_str};
