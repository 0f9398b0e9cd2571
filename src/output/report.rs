//! Human-readable cycle and diagnostics reports

use crate::crawler::{ConnectionReport, ProbeOutcome};
use crate::model::CrawlResult;

/// Formats a cycle result as plain text
pub fn format_crawl_result(result: &CrawlResult) -> String {
    let mut out = String::new();

    let status = match (result.success, result.is_degraded()) {
        (true, false) => "success",
        (true, true) => "success (with warnings)",
        (false, _) => "failed",
    };

    out.push_str("=== Cycle Result ===\n\n");
    out.push_str(&format!("  Status: {}\n", status));
    out.push_str(&format!("  Started: {}\n", result.timestamp.to_rfc3339()));
    out.push_str(&format!("  Duration: {}ms\n", result.execution_time_ms));
    if result.first_run {
        out.push_str("  First run since deployment: yes\n");
    }
    out.push_str(&format!("  Items on page: {}\n", result.items.len()));
    out.push_str(&format!("  New items: {}\n", result.new_items.len()));
    if !result.new_items.is_empty() {
        out.push_str(&format!(
            "  Notification delivered: {}\n",
            if result.notified { "yes" } else { "no" }
        ));
    }

    if !result.new_items.is_empty() {
        out.push_str("\nNew items:\n");
        for item in &result.new_items {
            match item.date() {
                Some(date) => out.push_str(&format!("  - [{}] {}\n", date, item.title())),
                None => out.push_str(&format!("  - {}\n", item.title())),
            }
            out.push_str(&format!("    {}\n", item.link()));
        }
    }

    if !result.errors.is_empty() {
        out.push_str("\nErrors:\n");
        for error in &result.errors {
            out.push_str(&format!("  - {}\n", error));
        }
    }

    out
}

/// Prints a cycle result to stdout
pub fn print_crawl_result(result: &CrawlResult) {
    print!("{}", format_crawl_result(result));
}

/// Formats a connection report as plain text
pub fn format_connection_report(report: &ConnectionReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== Connection Test: {}:{} ===\n\n", report.host, report.port));
    out.push_str(&probe_line("DNS resolution", Some(&report.resolution)));
    if let Some(addr) = report.resolved_addr {
        out.push_str(&format!("    address: {}\n", addr));
    }
    out.push_str(&probe_line("TCP connect", report.tcp_connect.as_ref()));
    out.push_str(&probe_line("HEAD request", report.head_request.as_ref()));
    out.push_str(&format!(
        "\nOverall: {}\n",
        if report.is_healthy() { "reachable" } else { "unreachable" }
    ));

    out
}

/// Prints a connection report to stdout
pub fn print_connection_report(report: &ConnectionReport) {
    print!("{}", format_connection_report(report));
}

fn probe_line(label: &str, probe: Option<&ProbeOutcome>) -> String {
    match probe {
        Some(p) if p.success => format!("  [ok]   {} ({}ms): {}\n", label, p.elapsed_ms, p.detail),
        Some(p) => format!("  [fail] {} ({}ms): {}\n", label, p.elapsed_ms, p.detail),
        None => format!("  [skip] {}\n", label),
    }
}
