use std::io::Write;
use std::path::Path;

use crate::ast::{Document, ProtoPackage};
use crate::internal::*;
use crate::manifest::{MANIFEST_FILE, Manifest};

pub const GRAPH_FILE: &str = "graph.nnef";

/// A lowered model, ready to be persisted: graph, tensors and manifest.
#[derive(Clone, Debug)]
pub struct Package {
    pub doc: Document,
    pub tensors: Vec<(String, Arc<Tensor>)>,
    pub manifest: Manifest,
}

impl Package {
    /// Directory extension of persisted packages.
    pub const EXTENSION: &'static str = "convoy";

    pub fn new(proto: ProtoPackage, manifest: Manifest) -> Package {
        Package { doc: proto.doc, tensors: proto.tensors, manifest }
    }

    pub fn graph_text(&self) -> ConvoyResult<String> {
        crate::dump::to_string(&self.doc)
    }

    pub fn tensor(&self, label: &str) -> Option<&Arc<Tensor>> {
        self.tensors.iter().find(|(l, _)| l == label).map(|(_, t)| t)
    }

    fn files(&self) -> ConvoyResult<Vec<(String, Vec<u8>)>> {
        let mut files = vec![
            (GRAPH_FILE.to_string(), self.graph_text()?.into_bytes()),
            (MANIFEST_FILE.to_string(), self.manifest.to_json()?.into_bytes()),
        ];
        for (label, t) in &self.tensors {
            if files.iter().any(|(name, _)| *name == format!("{label}.dat")) {
                bail!("Two tensors are labelled {label}");
            }
            let mut data = vec![];
            crate::tensors::write_tensor(&mut data, t)
                .with_context(|| format!("Serializing tensor {label}: {t:?}"))?;
            files.push((format!("{label}.dat"), data));
        }
        Ok(files)
    }

    /// Writes the package as a directory. Refuses to overwrite.
    pub fn write_to_dir(&self, path: impl AsRef<Path>) -> ConvoyResult<()> {
        let path = path.as_ref();
        if path.exists() {
            bail!("{:?} already exists. Won't overwrite.", path);
        }
        let files = self.files()?;
        std::fs::create_dir_all(path).with_context(|| format!("Creating dir {path:?}"))?;
        for (name, data) in files {
            let filename = path.join(&name);
            std::fs::write(&filename, data).with_context(|| format!("Writing {filename:?}"))?;
        }
        info!("Saved {:?}", path);
        Ok(())
    }

    pub fn write_to_tar<W: Write>(&self, w: W) -> ConvoyResult<W> {
        let mut ar = tar::Builder::new(w);
        let now = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        for (name, data) in self.files()? {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(now);
            header.set_cksum();
            ar.append_data(&mut header, &name, &mut &*data).with_context(|| format!("Appending {name}"))?;
        }
        ar.into_inner().context("Finalizing tar")
    }

    pub fn write_to_tgz<W: Write>(&self, w: W) -> ConvoyResult<W> {
        let encoder = flate2::write::GzEncoder::new(w, flate2::Compression::default());
        let encoder = self.write_to_tar(encoder)?;
        encoder.finish().context("Finalizing gzip stream")
    }
}

/// Reads tensor `label` from the package directory at `path`.
pub fn read_tensor(path: impl AsRef<Path>, label: &str) -> ConvoyResult<Tensor> {
    let filename = path.as_ref().join(format!("{label}.dat"));
    let mut file = std::fs::File::open(&filename).with_context(|| format!("Opening {filename:?}"))?;
    crate::tensors::read_tensor(&mut file).with_context(|| format!("Reading {filename:?}"))
}
