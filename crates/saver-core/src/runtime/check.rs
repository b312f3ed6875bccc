//! Availability checks for the tools a build needs

use super::tool::ToolManager;
use anyhow::Result;
use colored::Colorize;

/// Tool detection result
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: &'static str,
    pub version: Option<String>,
    pub available: bool,
    pub required: bool,
}

impl ToolInfo {
    pub fn probe(tool: &ToolManager) -> Self {
        let config = tool.config();
        let available = tool.is_installed();
        ToolInfo {
            name: config.display_name,
            version: if available { tool.get_version() } else { None },
            available,
            required: config.required,
        }
    }
}

/// Probe every tool; fail when a required one is missing. Advisory tools are
/// reported but never cause failure.
pub fn check_tools(tools: &[ToolManager]) -> Result<Vec<ToolInfo>> {
    let results: Vec<ToolInfo> = tools.iter().map(ToolInfo::probe).collect();
    missing_required(tools, &results)?;
    Ok(results)
}

fn missing_required(tools: &[ToolManager], results: &[ToolInfo]) -> Result<()> {
    let missing: Vec<String> = tools
        .iter()
        .zip(results)
        .filter(|(_, info)| info.required && !info.available)
        .map(|(tool, info)| format!("  - {} (see {})", info.name, tool.config().docs_url))
        .collect();

    if !missing.is_empty() {
        anyhow::bail!("Missing required tools:\n{}", missing.join("\n"));
    }
    Ok(())
}

/// Print one line per tool
pub fn print_report(results: &[ToolInfo]) {
    for info in results {
        let status = match (&info.version, info.available) {
            (Some(version), true) => format!("{} ({})", "found".green(), version),
            (None, true) => "found".green().to_string(),
            (_, false) if info.required => "missing".red().bold().to_string(),
            (_, false) => format!("{} (optional)", "missing".yellow()),
        };
        println!("  {} {}: {}", "->".blue(), info.name, status);
    }
}
