//! Static HTML report for a block verification run.

use block_audit::{ReportData, VerificationResult};
use std::io::Write;
use std::path::Path;

/// Render a static HTML report to `out_path`. Embeds the full report JSON.
pub fn render_report(data: &ReportData, out_path: impl AsRef<Path>) -> Result<(), ReportError> {
    let html = build_html(data)?;
    let mut f = std::fs::File::create(out_path.as_ref()).map_err(ReportError::Io)?;
    f.write_all(html.as_bytes()).map_err(ReportError::Io)?;
    Ok(())
}

/// Build HTML string from report data (for testing or in-memory use).
pub fn build_html(data: &ReportData) -> Result<String, ReportError> {
    let json_embed = serde_json::to_string(&data).map_err(ReportError::Json)?;
    let s = &data.summary;
    let status = if s.all_clean() { "PASS" } else { "FAIL" };
    let rows: String = data.progress.results.iter().map(result_row).collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8"/>
<meta name="viewport" content="width=device-width,initial-scale=1"/>
<title>Block Verification – {batch}</title>
<style>
:root {{ font-family: system-ui, sans-serif; background: #0f1419; color: #e6edf3; }}
body {{ max-width: 960px; margin: 0 auto; padding: 1.5rem; }}
h1 {{ font-size: 1.4rem; margin-bottom: 0.5rem; }}
h2 {{ font-size: 1.1rem; margin-top: 1.5rem; color: #8b949e; }}
.mono {{ font-family: ui-monospace, monospace; font-size: 0.9em; word-break: break-all; }}
.card {{ background: #161b22; border: 1px solid #30363d; border-radius: 6px; padding: 1rem; margin: 0.5rem 0; }}
.grid {{ display: grid; grid-template-columns: auto 1fr; gap: 0.25rem 1rem; }}
.label {{ color: #8b949e; }}
table {{ width: 100%; border-collapse: collapse; font-size: 0.85rem; }}
td, th {{ border-bottom: 1px solid #30363d; padding: 0.3rem; text-align: left; }}
.ok {{ color: #3fb950; }}
.bad {{ color: #f85149; }}
.footer {{ margin-top: 2rem; font-size: 0.85rem; color: #8b949e; }}
</style>
</head>
<body>
<h1>Block Verification Report: <span class="{status_class}">{status}</span></h1>
<p class="mono">{batch}</p>
<p class="mono">{endpoint}</p>
<p>Generated: {created}</p>

<h2>Summary</h2>
<div class="card">
  <div class="grid">
    <span class="label">Blocks</span><span>{total}</span>
    <span class="label">Verified</span><span>{verified}</span>
    <span class="label">Data mismatches</span><span>{data}</span>
    <span class="label">Hash mismatches</span><span>{hash}</span>
    <span class="label">Local continuity breaks</span><span>{local}</span>
    <span class="label">Chain continuity breaks</span><span>{chain}</span>
    <span class="label">Live fetch failures</span><span>{fetch}</span>
  </div>
</div>

<h2>Blocks</h2>
<div class="card">
<table>
<tr><th>Block</th><th>Data</th><th>Hash</th><th>Local</th><th>Chain</th><th>Local hash</th><th>Chain hash</th><th>Message</th></tr>
{rows}</table>
</div>

<h2>Results (embedded)</h2>
<div class="card">
  <script type="application/json" id="verification-report">{json_embed}</script>
</div>

<div class="footer">
  <p>Structural checks only: continuity, field equality and block id as reported by the endpoint.</p>
</div>
</body>
</html>"#,
        batch = escape_html(&data.batch),
        endpoint = escape_html(&data.endpoint),
        created = escape_html(&data.generated_utc_rfc3339),
        status = status,
        status_class = if s.all_clean() { "ok" } else { "bad" },
        total = s.total,
        verified = s.verified,
        data = s.data_mismatches,
        hash = s.hash_mismatches,
        local = s.local_breaks,
        chain = s.chain_breaks,
        fetch = s.fetch_failures,
        rows = rows,
        json_embed = escape_json_in_script(&json_embed),
    );
    Ok(html)
}

fn flag(ok: bool) -> &'static str {
    if ok {
        r#"<td class="ok">ok</td>"#
    } else {
        r#"<td class="bad">no</td>"#
    }
}

fn result_row(r: &VerificationResult) -> String {
    format!(
        "<tr><td>{}</td>{}{}{}{}<td class=\"mono\">{}</td><td class=\"mono\">{}</td><td>{}</td></tr>\n",
        r.block_number,
        flag(r.data_match),
        flag(r.hash_match),
        flag(r.is_local_continuous),
        flag(r.is_chain_continuous),
        escape_html(&r.local_hash),
        escape_html(&r.chain_hash),
        escape_html(&r.message),
    )
}

/// JSON stays valid; only `<` is rewritten so `</script>` cannot close the tag.
fn escape_json_in_script(s: &str) -> String {
    s.replace('<', "\\u003c")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "io: {}", e),
            ReportError::Json(e) => write!(f, "json: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}
