//! Search result and run summary display

use crate::crawler::HuntSummary;
use crate::storage::LinkRecord;
use std::fmt;

/// Local search results, one `- [category] title | url` line each
pub struct SearchResults<'a> {
    pub query: &'a str,
    pub records: &'a [LinkRecord],
}

impl fmt::Display for SearchResults<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.records.is_empty() {
            return writeln!(f, "No stored links match {:?}", self.query);
        }

        writeln!(f, "{} stored links match {:?}:", self.records.len(), self.query)?;
        for record in self.records {
            writeln!(f, "- [{}] {} | {}", record.category, record.title, record.url)?;
        }
        Ok(())
    }
}

/// Prints local search results to stdout
pub fn print_search_results(query: &str, records: &[LinkRecord]) {
    print!("{}", SearchResults { query, records });
}

impl fmt::Display for HuntSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = &self.report;

        writeln!(f, "=== Hunt Summary ===\n")?;
        writeln!(
            f,
            "Run #{} {} in {:.1}s",
            self.run_id,
            self.status.to_db_string(),
            self.elapsed.as_secs_f64()
        )?;
        writeln!(f, "  Keywords: {}", self.keywords.join(", "))?;
        writeln!(f, "  Depth: {} (deepest task {})", self.depth, report.max_task_depth)?;
        writeln!(
            f,
            "  Tasks: {} completed, {} failed ({} seeded, {} spawned)",
            report.tasks_completed, report.tasks_failed, report.seeded, report.tasks_spawned
        )?;
        writeln!(
            f,
            "  Discoveries: {} accepted, {} duplicates, {} invalid",
            report.accepted, report.duplicates, report.invalid
        )?;
        writeln!(f, "  New links stored: {}", report.inserted)?;

        if report.worker_panics > 0 {
            writeln!(f, "  Worker panics: {}", report.worker_panics)?;
        }
        if let Some(error) = &report.storage_error {
            writeln!(f, "  Storage failure: {}", error)?;
            writeln!(f, "  Records lost: {}", report.records_lost)?;
        }
        if let Some(path) = &self.leads_path {
            writeln!(f, "  Leads appended: {} ({})", self.leads_written, path.display())?;
        }
        Ok(())
    }
}

/// Prints the end-of-run summary to stdout
pub fn print_run_summary(summary: &HuntSummary) {
    print!("{}", summary);
}
