//! finsight-cli - command-line client for the Finsight HTTP API
//!
//! # Subcommands
//! - `ingest <file> [--source <name>]` - upload one JSON accounting export
//! - `ask <question> [--json]`         - ask a question over stored records
//! - `status`                          - show server health

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8780";
const DEFAULT_SOURCE: &str = "generic";
const MAX_TABLE_ROWS: usize = 20;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "finsight-cli",
    version,
    about = "Finsight: upload accounting exports and ask financial questions"
)]
struct Cli {
    /// Finsight HTTP server URL (overrides FINSIGHT_HTTP_URL env var)
    #[arg(long, env = "FINSIGHT_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Upload a JSON export from an accounting platform
    Ingest {
        /// Path to the export file
        file: PathBuf,

        /// Source platform (quickbooks, rootfi, generic)
        #[arg(short, long, default_value = DEFAULT_SOURCE)]
        source: String,
    },

    /// Ask a question about the stored transactions
    Ask {
        /// Question in plain language
        question: String,

        /// Print the raw response JSON
        #[arg(long)]
        json: bool,
    },

    /// Show Finsight server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IngestResponse {
    pub source: String,
    pub parsed: usize,
    pub inserted: usize,
    pub took_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub data_points: Vec<serde_json::Map<String, serde_json::Value>>,
    pub generated_sql: String,
    pub status: String,
    pub took_ms: Option<u64>,
}

// ============================================================================
// Rendering
// ============================================================================

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Render result rows as a plain-text table, columns taken from the first row.
pub fn render_table(rows: &[serde_json::Map<String, serde_json::Value>]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let columns: Vec<&String> = first.keys().collect();
    let shown = &rows[..rows.len().min(MAX_TABLE_ROWS)];

    let cells: Vec<Vec<String>> = shown
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c.as_str()).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(shown.len() + 3);
    out.push(format_line(columns.iter().map(|c| c.as_str()).collect()));
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in &cells {
        out.push(format_line(row.iter().map(String::as_str).collect()));
    }
    if rows.len() > shown.len() {
        out.push(format!("... {} more rows", rows.len() - shown.len()));
    }
    out.join("\n")
}

/// Human-readable rendering of an ask response.
pub fn render_answer(resp: &AskResponse) -> String {
    let mut out = String::new();
    if resp.status != "answered" {
        out.push_str(&format!("[{}] ", resp.status));
    }
    out.push_str(&resp.answer);

    if !resp.generated_sql.is_empty() {
        out.push_str(&format!("\n\nSQL: {}", resp.generated_sql));
    }

    let table = render_table(&resp.data_points);
    if !table.is_empty() {
        out.push_str("\n\n");
        out.push_str(&table);
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn fail_on_status(resp: reqwest::blocking::Response) -> reqwest::blocking::Response {
    if !resp.status().is_success() {
        let status = resp.status();
        let body: serde_json::Value = resp.json().unwrap_or_default();
        let message = body["error"].as_str().unwrap_or("no error message");
        eprintln!("finsight-cli: server returned {}: {}", status, message);
        std::process::exit(1);
    }
    resp
}

/// Upload one export file via POST /ingest.
fn do_ingest(server: &str, file: &Path, source: &str) -> anyhow::Result<()> {
    let content = std::fs::read(file)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", file.display(), e))?;

    let url = format!("{}/ingest", server);
    let resp = client(120)?
        .post(&url)
        .query(&[("source", source)])
        .header("content-type", "application/json")
        .body(content)
        .send();

    let resp = match resp {
        Ok(r) => fail_on_status(r),
        Err(e) => {
            eprintln!("finsight-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let report: IngestResponse = resp.json()?;
    println!(
        "Ingested {} of {} records from {} ({})",
        report.inserted,
        report.parsed,
        file.display(),
        report.source
    );
    if let Some(ms) = report.took_ms {
        println!("Took {} ms", ms);
    }
    Ok(())
}

/// Ask one question via POST /ask.
fn do_ask(server: &str, question: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/ask", server);
    let body = serde_json::json!({ "question": question });

    let resp = match client(120)?.post(&url).json(&body).send() {
        Ok(r) => fail_on_status(r),
        Err(e) => {
            eprintln!("finsight-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if json_output {
        let raw: serde_json::Value = resp.json()?;
        println!("{}", serde_json::to_string_pretty(&raw)?);
    } else {
        let answer: AskResponse = resp.json()?;
        println!("{}", render_answer(&answer));
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);

    match client(10)?.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Finsight server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
            println!("PostgreSQL:      {}", body["postgresql"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("finsight-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("finsight-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Ingest { file, source } => do_ingest(&server, &file, &source),
        Commands::Ask { question, json } => do_ask(&server, &question, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("finsight-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: serde_json::Value) -> Vec<serde_json::Map<String, serde_json::Value>> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_cli_parses_ingest() {
        let cli = Cli::try_parse_from([
            "finsight-cli",
            "--server",
            "http://localhost:9000",
            "ingest",
            "export.json",
            "--source",
            "quickbooks",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://localhost:9000");
        match cli.command {
            Commands::Ingest { file, source } => {
                assert_eq!(file, PathBuf::from("export.json"));
                assert_eq!(source, "quickbooks");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_ingest_source_defaults_to_generic() {
        let cli = Cli::try_parse_from(["finsight-cli", "ingest", "export.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Ingest { ref source, .. } if source == "generic"));
    }

    #[test]
    fn test_cli_parses_ask_json() {
        let cli = Cli::try_parse_from(["finsight-cli", "ask", "What was revenue?", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Ask { json: true, .. }));
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let table = render_table(&rows(json!([
            { "month": "2024-01", "revenue": 1500.5 },
            { "month": "2024-02", "revenue": 20 }
        ])));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "month    revenue");
        assert_eq!(lines[1], "-------  -------");
        assert_eq!(lines[2], "2024-01  1500.5");
        assert_eq!(lines[3], "2024-02  20");
    }

    #[test]
    fn test_render_table_empty() {
        assert!(render_table(&[]).is_empty());
    }

    #[test]
    fn test_render_table_truncates_long_results() {
        let many: Vec<serde_json::Value> = (0..25).map(|i| json!({ "n": i })).collect();
        let table = render_table(&rows(serde_json::Value::Array(many)));
        assert!(table.ends_with("... 5 more rows"));
    }

    #[test]
    fn test_render_answer_marks_non_answered_status() {
        let resp = AskResponse {
            answer: "No data found.".to_string(),
            data_points: Vec::new(),
            generated_sql: "SELECT 1 WHERE false".to_string(),
            status: "no_data".to_string(),
            took_ms: None,
        };
        let text = render_answer(&resp);
        assert!(text.starts_with("[no_data] No data found."));
        assert!(text.contains("SQL: SELECT 1 WHERE false"));
    }

    #[test]
    fn test_ask_response_deserializes_server_payload() {
        let payload = json!({
            "answer": "Revenue was 1500.",
            "data_points": [ { "revenue": 1500 } ],
            "generated_sql": "SELECT SUM(amount) AS revenue FROM financial_records WHERE amount > 0",
            "status": "answered",
            "took_ms": 42
        });
        let resp: AskResponse = serde_json::from_value(payload).unwrap();
        let text = render_answer(&resp);
        assert!(text.starts_with("Revenue was 1500."));
        assert!(text.contains("revenue"));
        assert_eq!(resp.took_ms, Some(42));
    }
}
