//! groundcheck CLI.
//!
//! Runs the citation validator and quality gate over an answer file
//! against an evidence file, under a policy. Exit code 0 means the gate
//! passed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use groundcheck_core::{
    chunk_id, Citation, Claim, EvidenceLink, EvidenceStore, Groundcheck, Policy, Severity,
};

#[derive(Parser)]
#[command(name = "groundcheck", version, about = "Grounding and quality-gate checks for agent answers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check an answer file against an evidence file.
    Check {
        /// Policy YAML; defaults apply when omitted.
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Evidence JSON: an array of {source, locator, text}.
        #[arg(long)]
        evidence: PathBuf,

        /// Answer JSON: {answer, citations, claims?, evidence_links?}.
        #[arg(long)]
        answer: PathBuf,

        /// Emit the full verdict as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Deserialize)]
struct ChunkInput {
    source: String,
    locator: String,
    text: String,
}

#[derive(Deserialize)]
struct AnswerInput {
    answer: String,
    #[serde(default)]
    citations: Vec<Citation>,
    #[serde(default)]
    claims: Vec<Claim>,
    #[serde(default)]
    evidence_links: Vec<EvidenceLink>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Check {
            policy,
            evidence,
            answer,
            json,
        } => check(policy, evidence, answer, json),
    }
}

fn check(policy: Option<PathBuf>, evidence: PathBuf, answer: PathBuf, json: bool) -> Result<()> {
    let policy = match policy {
        Some(path) => Policy::from_yaml_file(&path)
            .with_context(|| format!("loading policy {}", path.display()))?,
        None => Policy::default(),
    };

    let chunks: Vec<ChunkInput> = read_json(&evidence)?;
    let input: AnswerInput = read_json(&answer)?;

    let store = Arc::new(EvidenceStore::new());
    for chunk in &chunks {
        let id = store.add_chunk(&chunk.source, &chunk.locator, &chunk.text);
        tracing::debug!(%id, source = %chunk.source, locator = %chunk.locator, "ingested chunk");
    }

    // Convenience: a citation may name its chunk by (source, locator)
    // instead of a precomputed id.
    let citations: Vec<Citation> = input
        .citations
        .into_iter()
        .map(|mut citation| {
            if citation.chunk_id.is_empty() && !citation.source.is_empty() {
                if let Some(chunk) = chunks
                    .iter()
                    .find(|c| c.source == citation.source && c.locator == citation.locator)
                {
                    citation.chunk_id = chunk_id(&chunk.source, &chunk.locator, &chunk.text);
                }
            }
            citation
        })
        .collect();

    let checker = Groundcheck::new(store, &policy);
    let claims = (!input.claims.is_empty()).then_some(input.claims.as_slice());
    let links = (!input.evidence_links.is_empty()).then_some(input.evidence_links.as_slice());
    let report = checker.assess(&input.answer, &citations, claims, links);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if !report.verify.gate_passed {
        std::process::exit(1);
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_summary(report: &groundcheck_core::Assessment) {
    let verdict = if report.verify.gate_passed { "PASSED" } else { "FAILED" };
    println!("gate: {verdict}");
    println!("citations kept: {}", report.citations.len());

    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    for reason in &report.verify.fail_reasons {
        let tag = match reason.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        println!("  {tag}: {} ({})", reason.message, reason.code);
    }
    for (name, value) in &report.verify.metrics {
        println!("  metric: {name} = {value}");
    }
}
