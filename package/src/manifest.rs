//! Package metadata, stored as `manifest.json`.
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::internal::*;
use convoy_core::target::TargetSpec;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const FORMAT_VERSION: &str = "1.0";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub producer: String,
    pub format_version: String,
    pub source_model: Option<String>,
    pub input: InputDescription,
    pub outputs: Vec<OutputDescription>,
    pub minimum_platform: String,
    #[serde(default)]
    pub applied_overrides: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// The image input, with the normalization the graph applies to raw pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputDescription {
    pub name: String,
    pub shape: Vec<usize>,
    pub scale: f32,
    pub bias: Vec<f32>,
    pub color_layout: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputDescription {
    pub name: String,
    pub shape: Vec<usize>,
    pub datum_type: String,
}

impl Manifest {
    pub fn for_trace(trace: &Trace, spec: &TargetSpec, outputs: Vec<OutputDescription>) -> Manifest {
        let input = &spec.input;
        let mut properties = trace.properties().clone();
        let source_model = properties.remove("model");
        Manifest {
            producer: format!("convoy {}", env!("CARGO_PKG_VERSION")),
            format_version: FORMAT_VERSION.to_string(),
            source_model,
            input: InputDescription {
                name: input.name.clone(),
                shape: input.shape.to_vec(),
                scale: input.scale,
                bias: input.bias.to_vec(),
                color_layout: "RGB".to_string(),
            },
            outputs,
            minimum_platform: spec.minimum_platform.to_string(),
            applied_overrides: trace
                .applied_overrides()
                .map(|set| set.iter().map(|o| o.to_string()).collect())
                .unwrap_or_default(),
            properties,
        }
    }

    pub fn to_json(&self) -> ConvoyResult<String> {
        serde_json::to_string_pretty(self).context("Serializing manifest")
    }
}

/// Reads the manifest of the package directory at `path`.
pub fn read_manifest(path: impl AsRef<Path>) -> ConvoyResult<Manifest> {
    let path = path.as_ref().join(MANIFEST_FILE);
    let file = std::fs::File::open(&path).with_context(|| format!("Opening {path:?}"))?;
    serde_json::from_reader(file).with_context(|| format!("Parsing {path:?}"))
}
