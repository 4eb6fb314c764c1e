//! Output formatting for multiple formats
//!
//! Machine formats serialize the library types directly. The human format is meant for a
//! terminal and may change between releases.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::backend::{HardwareProfile, InstalledModels, ModelSpec, Tier};
use crate::provider::BackendConfig;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format
    Yaml,
    /// Human-readable formatted text
    Human,
}

#[derive(Serialize)]
struct ProfileReport<'a> {
    #[serde(flatten)]
    profile: &'a HardwareProfile,
    tier: Tier,
    guidance: &'static str,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn machine<T: Serialize + ?Sized>(&self, value: &T, what: &str) -> Option<Result<String>> {
        match self.format {
            OutputFormat::Json => Some(
                serde_json::to_string_pretty(value)
                    .with_context(|| format!("Failed to serialize {} to JSON", what)),
            ),
            OutputFormat::Yaml => Some(
                serde_yaml::to_string(value)
                    .with_context(|| format!("Failed to serialize {} to YAML", what)),
            ),
            OutputFormat::Human => None,
        }
    }

    pub fn format_config(&self, config: &BackendConfig) -> Result<String> {
        if let Some(rendered) = self.machine(config, "backend configuration") {
            return rendered;
        }

        let mut output = String::new();
        output.push_str("\u{2713} Local backend configured\n");
        output.push_str(RULE);
        output.push_str("\n\n");
        for line in config.to_string().lines() {
            output.push_str(&format!("  {}\n", line));
        }
        Ok(output)
    }

    pub fn format_profile(&self, profile: &HardwareProfile, tier: Tier) -> Result<String> {
        let report = ProfileReport {
            profile,
            tier,
            guidance: tier.guidance(),
        };
        if let Some(rendered) = self.machine(&report, "hardware profile") {
            return rendered;
        }

        Ok(format!(
            "Memory:      {:.2}GB\nFree disk:   {:.2}GB\nTier:        {}\n\n{}\n",
            profile.total_ram_gb,
            profile.free_disk_gb,
            tier,
            tier.guidance()
        ))
    }

    pub fn format_catalog(&self, entries: &[&ModelSpec]) -> Result<String> {
        if let Some(rendered) = self.machine(entries, "catalog") {
            return rendered;
        }

        if entries.is_empty() {
            return Ok("No catalog model fits on this machine.\n".to_string());
        }

        let mut output = String::new();
        for (i, spec) in entries.iter().enumerate() {
            let connector = if i + 1 == entries.len() {
                "\u{2514}"
            } else {
                "\u{251C}"
            };
            output.push_str(&format!(
                "{}\u{2500} {:<28} {:>6.2}GB  {}\n",
                connector, spec.name, spec.size_gb, spec.file_name
            ));
        }
        Ok(output)
    }

    pub fn format_installed(&self, installed: &InstalledModels) -> Result<String> {
        if let Some(rendered) = self.machine(installed.artifacts(), "installed models") {
            return rendered;
        }

        if installed.is_empty() {
            return Ok("No models currently downloaded.\n".to_string());
        }

        let mut output = String::new();
        for artifact in installed.artifacts() {
            output.push_str(&format!(
                "{}  ({})\n",
                artifact.file_name,
                artifact.local_path.display()
            ));
        }
        Ok(output)
    }
}
