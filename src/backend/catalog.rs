//! Catalog of downloadable llamafile artifacts and hardware-based recommendation

use super::hardware::HardwareProfile;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// A downloadable model artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSpec {
    /// Human-readable name
    pub name: &'static str,
    /// File name once downloaded; unique within the catalog
    pub file_name: &'static str,
    /// Download size in gigabytes
    pub size_gb: f64,
    /// Where the artifact is fetched from
    pub source_url: &'static str,
}

impl ModelSpec {
    /// Menu label, e.g. `Phi-2 (1.96GB)`
    pub fn label(&self) -> String {
        format!("{} ({:.2}GB)", self.name, self.size_gb)
    }
}

impl ModelSpec {
    pub const LLAMA_3_8B_INSTRUCT: ModelSpec = ModelSpec {
        name: "Llama-3-8B-Instruct",
        file_name: "Meta-Llama-3-8B-Instruct.Q5_K_M.llamafile",
        size_gb: 5.76,
        source_url: "https://huggingface.co/jartine/Meta-Llama-3-8B-Instruct-llamafile/resolve/main/Meta-Llama-3-8B-Instruct.Q5_K_M.llamafile?download=true",
    };

    pub const PHI_3_MINI: ModelSpec = ModelSpec {
        name: "Phi-3-mini",
        file_name: "Phi-3-mini-4k-instruct.Q5_K_M.llamafile",
        size_gb: 2.84,
        source_url: "https://huggingface.co/jartine/Phi-3-mini-4k-instruct-llamafile/resolve/main/Phi-3-mini-4k-instruct.Q5_K_M.llamafile?download=true",
    };

    pub const TINYLLAMA_1_1B: ModelSpec = ModelSpec {
        name: "TinyLlama-1.1B",
        file_name: "TinyLlama-1.1B-Chat-v1.0.Q5_K_M.llamafile",
        size_gb: 0.76,
        source_url: "https://huggingface.co/jartine/TinyLlama-1.1B-Chat-v1.0-GGUF/resolve/main/TinyLlama-1.1B-Chat-v1.0.Q5_K_M.llamafile?download=true",
    };

    pub const ROCKET_3B: ModelSpec = ModelSpec {
        name: "Rocket-3B",
        file_name: "rocket-3b.Q5_K_M.llamafile",
        size_gb: 1.89,
        source_url: "https://huggingface.co/jartine/rocket-3B-llamafile/resolve/main/rocket-3b.Q5_K_M.llamafile?download=true",
    };

    pub const PHI_2: ModelSpec = ModelSpec {
        name: "Phi-2",
        file_name: "phi-2.Q5_K_M.llamafile",
        size_gb: 1.96,
        source_url: "https://huggingface.co/jartine/phi-2-llamafile/resolve/main/phi-2.Q5_K_M.llamafile?download=true",
    };

    pub const LLAVA_1_5: ModelSpec = ModelSpec {
        name: "LLaVA 1.5",
        file_name: "llava-v1.5-7b-q4.llamafile",
        size_gb: 3.97,
        source_url: "https://huggingface.co/jartine/llava-v1.5-7B-GGUF/resolve/main/llava-v1.5-7b-q4.llamafile?download=true",
    };

    pub const MISTRAL_7B_INSTRUCT: ModelSpec = ModelSpec {
        name: "Mistral-7B-Instruct",
        file_name: "mistral-7b-instruct-v0.2.Q5_K_M.llamafile",
        size_gb: 5.15,
        source_url: "https://huggingface.co/jartine/Mistral-7B-Instruct-v0.2-llamafile/resolve/main/mistral-7b-instruct-v0.2.Q5_K_M.llamafile?download=true",
    };

    pub const WIZARDCODER_PYTHON_13B: ModelSpec = ModelSpec {
        name: "WizardCoder-Python-13B",
        file_name: "wizardcoder-python-13b.llamafile",
        size_gb: 7.33,
        source_url: "https://huggingface.co/jartine/wizardcoder-13b-python/resolve/main/wizardcoder-python-13b.llamafile?download=true",
    };

    pub const WIZARDCODER_PYTHON_34B: ModelSpec = ModelSpec {
        name: "WizardCoder-Python-34B",
        file_name: "wizardcoder-python-34b-v1.0.Q5_K_M.llamafile",
        size_gb: 22.23,
        source_url: "https://huggingface.co/jartine/WizardCoder-Python-34B-V1.0-llamafile/resolve/main/wizardcoder-python-34b-v1.0.Q5_K_M.llamafile?download=true",
    };

    pub const MIXTRAL_8X7B_INSTRUCT: ModelSpec = ModelSpec {
        name: "Mixtral-8x7B-Instruct",
        file_name: "mixtral-8x7b-instruct-v0.1.Q5_K_M.llamafile",
        size_gb: 30.03,
        source_url: "https://huggingface.co/jartine/Mixtral-8x7B-Instruct-v0.1-llamafile/resolve/main/mixtral-8x7b-instruct-v0.1.Q5_K_M.llamafile?download=true",
    };

    /// The built-in catalog in menu order
    pub const ALL_MODELS: &'static [ModelSpec] = &[
        Self::LLAMA_3_8B_INSTRUCT,
        Self::PHI_3_MINI,
        Self::TINYLLAMA_1_1B,
        Self::ROCKET_3B,
        Self::PHI_2,
        Self::LLAVA_1_5,
        Self::MISTRAL_7B_INSTRUCT,
        Self::WIZARDCODER_PYTHON_13B,
        Self::WIZARDCODER_PYTHON_34B,
        Self::MIXTRAL_8X7B_INSTRUCT,
    ];
}

/// Coarse RAM class used only for guidance text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Mid,
    High,
}

impl Tier {
    /// Human-readable recommendation for this tier
    pub fn guidance(&self) -> &'static str {
        match self {
            Tier::Low => {
                "Your computer realistically can only run smaller models less than 4GB, \
                 Phi-2 might be the best model for your computer."
            }
            Tier::Mid => {
                "Your computer could handle a mid-sized model (4-10GB), \
                 Mistral-7B might be the best model for your computer."
            }
            Tier::High => "Your computer should have enough RAM to run any model below.",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Low => write!(f, "low"),
            Tier::Mid => write!(f, "mid"),
            Tier::High => write!(f, "high"),
        }
    }
}

/// Fixed list of downloadable artifacts
#[derive(Debug, Clone, Copy)]
pub struct ModelCatalog {
    entries: &'static [ModelSpec],
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelCatalog {
    /// The built-in llamafile catalog
    pub fn builtin() -> Self {
        Self {
            entries: ModelSpec::ALL_MODELS,
        }
    }

    pub fn with_entries(entries: &'static [ModelSpec]) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &'static [ModelSpec] {
        self.entries
    }

    /// Candidates the user may download on this machine.
    ///
    /// Drops entries that are already installed or that would not fit on disk, keeping
    /// catalog order. An empty result means no local model is viable.
    pub fn recommend(
        &self,
        profile: &HardwareProfile,
        already_installed: &HashSet<String>,
    ) -> Vec<&'static ModelSpec> {
        let recommended: Vec<&'static ModelSpec> = self
            .entries
            .iter()
            .filter(|spec| !already_installed.contains(spec.file_name))
            .filter(|spec| spec.size_gb <= profile.free_disk_gb)
            .collect();

        debug!(
            free_disk_gb = profile.free_disk_gb,
            installed = already_installed.len(),
            "Recommended {} of {} catalog entries",
            recommended.len(),
            self.entries.len()
        );

        if recommended.is_empty() {
            info!(
                "No catalog model fits in {:.1}GB of free disk",
                profile.free_disk_gb
            );
        }

        recommended
    }

    /// Classify the machine by RAM. Never filters the catalog.
    pub fn tier_hint(profile: &HardwareProfile) -> Tier {
        if profile.total_ram_gb < 10.0 {
            Tier::Low
        } else if profile.total_ram_gb < 30.0 {
            Tier::Mid
        } else {
            Tier::High
        }
    }

    /// Look up an entry by file name
    pub fn find(&self, file_name: &str) -> Option<&'static ModelSpec> {
        self.entries.iter().find(|spec| spec.file_name == file_name)
    }

    /// Look up an entry by display name, ignoring case
    pub fn find_by_name(&self, name: &str) -> Option<&'static ModelSpec> {
        self.entries
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(name))
    }
}
