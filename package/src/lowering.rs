use convoy_core::lowering::{Lowering, LoweringFailure};
use convoy_core::target::TargetSpec;

use crate::internal::*;
use crate::manifest::{Manifest, OutputDescription};
use crate::ops::convoy_registry;
use crate::package::Package;
use crate::registry::Registry;

/// Lowers traces to packages.
#[derive(Debug)]
pub struct PackageLowering {
    pub registry: Registry,
}

impl Default for PackageLowering {
    fn default() -> PackageLowering {
        PackageLowering { registry: convoy_registry() }
    }
}

impl Lowering for PackageLowering {
    type Artifact = Package;

    fn lower(&self, trace: &Trace, spec: &TargetSpec) -> Result<Package, LoweringFailure> {
        debug!("Lowering {} nodes with registry {}", trace.nodes().len(), self.registry.id);
        let proto = crate::ser::to_proto_package(&self.registry, trace, spec)?;
        let outputs = proto
            .doc
            .graph_def
            .results
            .iter()
            .zip(trace.output_outlets())
            .map(|(name, outlet)| {
                let fact = trace.outlet_fact(*outlet)?;
                Ok(OutputDescription {
                    name: name.clone(),
                    shape: fact.shape.to_vec(),
                    datum_type: fact.datum_type.to_string(),
                })
            })
            .collect::<ConvoyResult<Vec<_>>>()?;
        let manifest = Manifest::for_trace(trace, spec, outputs);
        Ok(Package::new(proto, manifest))
    }
}
