//! Models the exporter knows how to fetch.
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate log;

pub mod depth_anything;
pub mod hub;
pub mod weights;

pub use hub::{DEPTH_ANYTHING_V2_SMALL, Hub, output_name};
pub use weights::{WeightSource, WeightSpec, Weights};
