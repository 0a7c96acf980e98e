use std::path::{Path, PathBuf};

use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use convoy_core::internal::*;
use convoy_models::{DEPTH_ANYTHING_V2_SMALL, WeightSource, output_name};
use convoy_package::Package;

/// Settings of an export run. Every field can be given in a JSON file and
/// overridden on the command line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub model: String,
    pub field: String,
    /// Weights root directory. Seeded random weights when absent.
    pub weights: Option<PathBuf>,
    pub weight_seed: u64,
    pub size: usize,
    pub min_platform: String,
    pub output_dir: PathBuf,
    pub name: Option<String>,
    /// Seed of the tracing sample.
    pub seed: u64,
    pub tgz: bool,
    pub force: bool,
    pub fallback: bool,
}

impl Default for ExportConfig {
    fn default() -> ExportConfig {
        ExportConfig {
            model: DEPTH_ANYTHING_V2_SMALL.to_string(),
            field: ModelAdapter::DEPTH_FIELD.to_string(),
            weights: None,
            weight_seed: 0,
            size: 518,
            min_platform: PlatformVersion::default().to_string(),
            output_dir: PathBuf::from("."),
            name: None,
            seed: 0,
            tgz: false,
            force: false,
            fallback: true,
        }
    }
}

impl ExportConfig {
    pub fn load(path: impl AsRef<Path>) -> ConvoyResult<ExportConfig> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).with_context(|| format!("Opening config {path:?}"))?;
        serde_json::from_reader(file).with_context(|| format!("Parsing config {path:?}"))
    }

    pub fn apply_matches(&mut self, matches: &ArgMatches) -> ConvoyResult<()> {
        if let Some(model) = matches.value_of("model") {
            self.model = model.to_string();
        }
        if let Some(field) = matches.value_of("field") {
            self.field = field.to_string();
        }
        if let Some(weights) = matches.value_of("weights") {
            self.weights = Some(PathBuf::from(weights));
        }
        if let Some(seed) = matches.value_of("seed") {
            self.weights = None;
            self.weight_seed = seed.parse().with_context(|| format!("Parsing weight seed {seed:?}"))?;
        }
        if let Some(size) = matches.value_of("size") {
            self.size = size.parse().with_context(|| format!("Parsing input size {size:?}"))?;
        }
        if let Some(platform) = matches.value_of("min-platform") {
            self.min_platform = platform.to_string();
        }
        if let Some(dir) = matches.value_of("output-dir") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(name) = matches.value_of("name") {
            self.name = Some(name.to_string());
        }
        if let Some(seed) = matches.value_of("sample-seed") {
            self.seed = seed.parse().with_context(|| format!("Parsing sample seed {seed:?}"))?;
        }
        self.tgz |= matches.is_present("tgz");
        self.force |= matches.is_present("force");
        if matches.is_present("no-fallback") {
            self.fallback = false;
        }
        Ok(())
    }

    pub fn weight_source(&self) -> WeightSource {
        match &self.weights {
            Some(root) => WeightSource::Directory(root.clone()),
            None => WeightSource::Seeded(self.weight_seed),
        }
    }

    pub fn target_spec(&self) -> ConvoyResult<TargetSpec> {
        ensure!(self.size > 0, "Input size must be positive");
        let platform = self.min_platform.parse::<PlatformVersion>()?;
        Ok(TargetSpec::new(ImageInput::imagenet("image", self.size, self.size), platform))
    }

    pub fn output_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| output_name(&self.model))
    }

    pub fn package_path(&self) -> PathBuf {
        let ext = if self.tgz { format!("{}.tgz", Package::EXTENSION) } else { Package::EXTENSION.to_string() };
        self.output_dir.join(format!("{}.{}", self.output_name(), ext))
    }
}
