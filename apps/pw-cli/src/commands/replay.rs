// replay.rs — Read-only replay of a plan's audit history.

use std::path::Path;

use pw_replay::{replay, ReplayFilters};

pub fn execute(
    root: &Path,
    plan: &str,
    phase: Option<String>,
    tool: Option<String>,
) -> anyhow::Result<()> {
    let filters = ReplayFilters {
        phase,
        tool,
        seq_range: None,
    };
    let verdict = replay(root, plan, &filters)?;

    println!(
        "{} — {} record(s) considered",
        if verdict.pass { "PASS" } else { "FAIL" },
        verdict.records_considered
    );
    for finding in &verdict.findings {
        let seqs: Vec<String> = finding.seqs.iter().map(u64::to_string).collect();
        println!(
            "  {} [{}] {}",
            finding.kind.as_str(),
            seqs.join(","),
            finding.detail
        );
    }
    if !verdict.pass {
        std::process::exit(1);
    }
    Ok(())
}
