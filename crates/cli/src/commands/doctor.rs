use std::time::Duration;

use dealdesk_agent::BackendTools;
use dealdesk_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_UNAVAILABLE};

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime.block_on(build_report(AppConfig::load(LoadOptions::default()))),
        Err(error) => finalize(vec![DoctorCheck {
            name: "async_runtime",
            status: CheckStatus::Fail,
            details: format!("failed to initialize async runtime: {error}"),
        }]),
    };
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_UNAVAILABLE };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

pub async fn build_report<E: std::fmt::Display>(loaded: Result<AppConfig, E>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            match BackendTools::from_config(&config.backends) {
                Ok(backend) => {
                    let endpoints = backend.endpoints();
                    let (sales, deal) = tokio::join!(
                        check_backend(&backend, "sales_backend", &endpoints.sales_url),
                        check_backend(&backend, "deal_backend", &endpoints.deal_url),
                    );
                    checks.push(sales);
                    checks.push(deal);
                }
                Err(error) => {
                    checks.push(DoctorCheck {
                        name: "http_client",
                        status: CheckStatus::Fail,
                        details: error.to_string(),
                    });
                    checks.push(skipped("sales_backend", "http client unavailable"));
                    checks.push(skipped("deal_backend", "http client unavailable"));
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("sales_backend", "configuration did not load"));
            checks.push(skipped("deal_backend", "configuration did not load"));
        }
    }

    finalize(checks)
}

fn finalize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Any HTTP status proves the backend is listening.
async fn check_backend(backend: &BackendTools, name: &'static str, base_url: &str) -> DoctorCheck {
    match backend.probe(base_url, PROBE_TIMEOUT).await {
        Ok(status) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("`{base_url}` answered HTTP {status}"),
        },
        Err(error) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("`{base_url}` unreachable: {error}"),
        },
    }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
