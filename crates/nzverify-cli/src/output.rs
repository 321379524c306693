//! Output formatting

use console::{style, Style, Term};
use nzverify::{ScenarioReport, ScenarioState, SuiteReport};
use std::fmt::Write as _;

/// Status lines on stdout
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            use_color,
            quiet,
        }
    }

    fn prefixed(&self, symbol: &str, plain: &str, color: &Style, message: &str) {
        let prefix = if self.use_color {
            color.apply_to(symbol).bold().to_string()
        } else {
            plain.to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.prefixed("✓", "PASS", &Style::new().green(), message);
        }
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        self.prefixed("✗", "FAIL", &Style::new().red(), message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            self.prefixed("⚠", "WARN", &Style::new().yellow(), message);
        }
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        let _ = self.term.write_line(&styled);
    }

    /// Print plain lines
    pub fn lines(&self, text: &str) {
        if !self.quiet {
            let _ = self.term.write_str(text);
        }
    }

    /// Print one scenario report and its summary line
    pub fn scenario(&self, report: &ScenarioReport) {
        self.header(&report.scenario);
        self.lines(&render_scenario(report));
        if report.soft_checks.failed > 0 {
            self.warning(&format!(
                "{}: {} of {} soft check(s) failed",
                report.scenario, report.soft_checks.failed, report.soft_checks.total
            ));
        }
        if report.passed() {
            self.success(&format!("{} ({} ms)", report.scenario, report.duration_ms));
        } else {
            self.failure(&report.scenario);
        }
    }

    /// Print the suite summary
    pub fn summary(&self, report: &SuiteReport) {
        let line = format!(
            "{} scenario(s): {} passed, {} failed, {} skipped in {} ms",
            report.reports.len() + report.skipped,
            report.passed_count(),
            report.failed_count(),
            report.skipped,
            report.duration_ms
        );
        if report.all_passed() {
            self.success(&line);
        } else {
            self.failure(&line);
        }
    }
}

/// Render the body of a scenario report as indented text
#[must_use]
pub fn render_scenario(report: &ScenarioReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  record: {}", report.record_id);
    for total in &report.totals {
        let _ = writeln!(out, "  {}: {} ({})", total.label, total.observed, total.breakdown);
    }
    if report.retained > 0 {
        let _ = writeln!(out, "  retained across tabs: {}", report.retained);
    }
    for field in &report.fallbacks {
        let _ = writeln!(out, "  fallback written: {field}");
    }
    let checks = report.soft_checks;
    if checks.total > 0 {
        let _ = writeln!(out, "  soft checks: {}/{} passed", checks.passed, checks.total);
    }
    for soft in &report.soft_failures {
        let _ = writeln!(
            out,
            "  diagnostic: {}: {}",
            soft.location.as_deref().unwrap_or("-"),
            soft.message
        );
    }
    if let Some(failure) = &report.failure {
        let _ = writeln!(out, "  failed at {} [{}]: {}", failure.step, failure.kind, failure.message);
    }
    let states: Vec<String> = report.transitions.iter().map(ScenarioState::to_string).collect();
    let _ = writeln!(out, "  states: {}", states.join(" → "));
    out
}
