pub mod checkpoint;
pub mod model;
pub mod spec;

use rand::Rng;

use crate::error::Result;

pub use checkpoint::{save_checkpoint, Checkpoint, CheckpointMetadata};
pub use model::SegmentationModel;
pub use spec::{Architecture, ModelSpec};

/// Builds a freshly initialized model for `arch`, validated against the
/// training image size.
pub fn get_model<R: Rng + ?Sized>(
    arch: Architecture,
    n_classes: usize,
    feature_scale: usize,
    img_size: (usize, usize),
    rng: &mut R,
) -> Result<SegmentationModel> {
    let spec = ModelSpec::new(arch, n_classes, feature_scale);
    spec.validate(img_size.0, img_size.1)?;
    spec.build(rng)
}
