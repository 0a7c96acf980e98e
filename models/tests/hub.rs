use std::fs::{self, File};

use convoy_core::internal::*;
use convoy_models::depth_anything::DepthAnythingConfig;
use convoy_models::*;
use ndarray_npy::NpzWriter;

fn write_archive(root: &std::path::Path, identifier: &str, weights: &Weights, skip: Option<&str>) {
    let path = WeightSource::archive_path(root, identifier);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut npz = NpzWriter::new_compressed(File::create(&path).unwrap());
    for (name, tensor) in weights.iter() {
        if Some(name) != skip {
            npz.add_array(format!("{name}.npy"), &tensor.to_array_view()).unwrap();
        }
    }
    npz.finish().unwrap();
}

#[test]
fn directory_weights_match_their_source() {
    let dir = temp_dir::TempDir::new().unwrap();
    let specs = DepthAnythingConfig::small().weight_specs();
    let seeded = WeightSource::Seeded(12).load(DEPTH_ANYTHING_V2_SMALL, &specs).unwrap();
    write_archive(dir.path(), DEPTH_ANYTHING_V2_SMALL, &seeded, None);

    let from_disk = Hub::new(WeightSource::Directory(dir.path().to_path_buf()));
    let from_seed = Hub::new(WeightSource::Seeded(12));
    let tracer = Tracer::new(&[1, 3, 28, 28]);
    let sample = tracer.sample_input(0).unwrap();
    let dispatch = Dispatch::default();
    let traces = [from_disk, from_seed].map(|hub| {
        let model = ModelAdapter::load(&hub, DEPTH_ANYTHING_V2_SMALL).unwrap();
        tracer.trace(&model, &sample, &dispatch).unwrap()
    });
    assert!(traces[0].same_as(&traces[1]));
    assert_eq!(&*traces[0].output_fact(0).unwrap().shape, &[1, 28, 28]);
}

#[test]
fn missing_parameter_is_a_load_error() {
    let dir = temp_dir::TempDir::new().unwrap();
    let specs = DepthAnythingConfig::small().weight_specs();
    let seeded = WeightSource::Seeded(0).load(DEPTH_ANYTHING_V2_SMALL, &specs).unwrap();
    write_archive(dir.path(), DEPTH_ANYTHING_V2_SMALL, &seeded, Some("head.bias"));
    let hub = Hub::new(WeightSource::Directory(dir.path().to_path_buf()));
    let err = ModelAdapter::load(&hub, DEPTH_ANYTHING_V2_SMALL).unwrap_err();
    let ExportError::ModelLoad { source, .. } = err else { panic!("expected a load error") };
    assert!(format!("{source:?}").contains("head.bias"));
}

#[test]
fn depth_model_upsamples_with_bicubic() {
    let hub = Hub::new(WeightSource::Seeded(1));
    let model = ModelAdapter::load(&hub, DEPTH_ANYTHING_V2_SMALL).unwrap();
    let tracer = Tracer::new(&[1, 3, 14, 28]);
    let trace = tracer.trace(&model, &tracer.sample_input(0).unwrap(), &Dispatch::default()).unwrap();
    assert!(trace.uses(&"bicubic_resize".into()));
    assert!(!trace.uses(&"grid_sample".into()));
    let depth = trace.run(tvec!(tracer.sample_input(5).unwrap())).unwrap();
    assert_eq!(depth[0].shape(), &[1, 14, 28]);
    assert!(depth[0].as_slice().unwrap().iter().all(|&d| d >= 0.0));
}
