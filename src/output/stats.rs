//! Knowledge store statistics display

use crate::storage::StoreStats;
use std::fmt;

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Knowledge Store Statistics ===\n")?;

        writeln!(f, "Overview:")?;
        writeln!(f, "  Total links: {}", self.total_links)?;
        writeln!(f, "  Recorded runs: {}", self.runs)?;
        writeln!(
            f,
            "  Full-text search: {}",
            if self.full_text { "enabled" } else { "substring fallback" }
        )?;
        writeln!(f)?;

        if !self.by_category.is_empty() {
            writeln!(f, "Links by Category:")?;
            for (category, count) in &self.by_category {
                writeln!(
                    f,
                    "  {}: {} ({:.1}%)",
                    category,
                    count,
                    percentage(*count, self.total_links)
                )?;
            }
            writeln!(f)?;
        }

        if !self.by_source.is_empty() {
            writeln!(f, "Links by Source:")?;
            for (source, count) in &self.by_source {
                writeln!(f, "  {}: {}", source, count)?;
            }
            writeln!(f)?;
        }

        if let Some(run) = &self.latest_run {
            writeln!(f, "Latest Run:")?;
            writeln!(f, "  #{} {:?} ({})", run.id, run.query, run.status.to_db_string())?;
            writeln!(f, "  Started: {}", run.started_at)?;
            if let Some(finished) = &run.finished_at {
                writeln!(f, "  Finished: {}", finished)?;
            }
            writeln!(f, "  New links: {}", run.inserted)?;
        }
        Ok(())
    }
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &StoreStats) {
    print!("{}", stats);
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64) * 100.0
}
