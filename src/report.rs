// src/report.rs

use std::fmt;
use tracing::info;

/// Free-text summary of one pipeline phase, shown when the phase ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: String,
    pub lines: Vec<String>,
}

impl PhaseReport {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            lines: Vec::new(),
        }
    }

    pub fn note(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!(phase = %self.phase, "{}", line);
        self.lines.push(line);
    }

    /// Print the banner and collected lines to stdout.
    pub fn print(&self) {
        println!("{}", self);
    }
}

impl fmt::Display for PhaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "─── {} ───", self.phase)?;
        if self.lines.is_empty() {
            write!(f, "  (nothing to report)")
        } else {
            let body: Vec<String> = self.lines.iter().map(|l| format!("  {}", l)).collect();
            write!(f, "{}", body.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_banner_and_lines() {
        let mut r = PhaseReport::new("Remove test rows");
        assert!(r.to_string().ends_with("(nothing to report)"));
        r.note("Deleted 2 rows. See deleted_test_rows.csv");
        assert_eq!(
            r.to_string(),
            "─── Remove test rows ───\n  Deleted 2 rows. See deleted_test_rows.csv"
        );
    }
}
