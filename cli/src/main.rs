#[macro_use]
extern crate log;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Arg, ArgMatches, Command};
use convoy_core::internal::*;
use convoy_models::Hub;
use convoy_package::Package;

use crate::config::ExportConfig;

mod config;

fn command() -> Command<'static> {
    Command::new("convoy")
        .version(clap::crate_version!())
        .about("Exports a pretrained depth model to an on-device package")
        .arg(Arg::new("model").takes_value(true).help("Registry identifier of the model to export"))
        .arg(
            Arg::new("field")
                .long("field")
                .takes_value(true)
                .help("Model output to export [default: predicted_depth]"),
        )
        .arg(
            Arg::new("weights")
                .long("weights")
                .takes_value(true)
                .conflicts_with("seed")
                .help("Directory holding <model>/weights.npz"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .takes_value(true)
                .help("Use deterministic random weights from this seed"),
        )
        .arg(Arg::new("size").long("size").takes_value(true).help("Input height and width [default: 518]"))
        .arg(
            Arg::new("min-platform")
                .long("min-platform")
                .takes_value(true)
                .help("Minimum deployment platform, like iOS16 [default: iOS16]"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .takes_value(true)
                .help("Where to save the package [default: .]"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .takes_value(true)
                .help("Package name (derived from the model identifier otherwise)"),
        )
        .arg(
            Arg::new("sample-seed")
                .long("sample-seed")
                .takes_value(true)
                .help("Seed of the random sample the model is traced on [default: 0]"),
        )
        .arg(Arg::new("tgz").long("tgz").help("Save as a gzipped tar archive"))
        .arg(Arg::new("force").long("force").help("Replace an existing package"))
        .arg(
            Arg::new("no-fallback")
                .long("no-fallback")
                .help("Fail instead of retrying with operator overrides"),
        )
        .arg(Arg::new("config").long("config").takes_value(true).help("JSON export configuration"))
        .arg(
            Arg::new("verbosity")
                .short('v')
                .multiple_occurrences(true)
                .help("Sets the level of verbosity."),
        )
}

fn main() {
    let matches = command().get_matches();

    let level = match matches.occurrences_of("verbosity") {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env(env_logger::Env::default())
        .format_timestamp(None)
        .init();

    if let Err(e) = handle(&matches) {
        error!("{e:?}");
        process::exit(1)
    }
}

fn handle(matches: &ArgMatches) -> ConvoyResult<()> {
    let mut config = match matches.value_of("config") {
        Some(path) => ExportConfig::load(path)?,
        None => ExportConfig::default(),
    };
    config.apply_matches(matches)?;
    debug!("{config:?}");
    let path = export(&config)?;

    println!("Saved to {}", path.display());
    println!();
    println!("To compile for on-device use, run the {} model compiler on it.", config.min_platform);
    Ok(())
}

fn export(config: &ExportConfig) -> ConvoyResult<PathBuf> {
    let spec = config.target_spec()?;
    let hub = Hub::new(config.weight_source());
    let model = ModelAdapter::load_field(&hub, &config.model, &config.field)?;

    let tracer = Tracer::new(&spec.input.shape).with_input_name(&spec.input.name);
    let mut exporter = Exporter::new(tracer, convoy_package::lowering(), spec).with_seed(config.seed);
    if !config.fallback {
        exporter = exporter.without_fallback();
    }
    let mut dispatch = Dispatch::default();
    let exported = exporter.export(&model, &mut dispatch)?;
    debug!("{:?}", exported.report);

    let path = config.package_path();
    save(&exported.artifact, &path, config)
        .map_err(|source| ExportError::Persist { path: path.clone(), source })?;
    Ok(path)
}

fn save(package: &Package, path: &Path, config: &ExportConfig) -> ConvoyResult<()> {
    if path.exists() {
        ensure!(config.force, "{path:?} already exists. Use --force to replace it.");
        info!("Removing {path:?}");
        if path.is_dir() {
            std::fs::remove_dir_all(path)?;
        } else {
            std::fs::remove_file(path)?;
        }
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("Creating {dir:?}"))?;
    }
    if config.tgz {
        let file = std::fs::File::create(path).with_context(|| format!("Creating {path:?}"))?;
        package.write_to_tgz(file)?;
        info!("Saved {path:?}");
        Ok(())
    } else {
        package.write_to_dir(path)
    }
}
