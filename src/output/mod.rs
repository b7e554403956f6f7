//! Output module for run summaries, statistics and exports
//!
//! This module handles:
//! - Appending newly harvested records to the CSV leads file
//! - Printing local search results
//! - Printing run summaries and store statistics

mod leads;
mod report;
mod stats;

pub use leads::{append_leads, LEADS_HEADER};
pub use report::{print_run_summary, print_search_results, SearchResults};
pub use stats::print_statistics;
