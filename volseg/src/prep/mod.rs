pub mod consts;
pub mod dataset;
pub mod log;
pub mod nii;
pub mod orient;
pub mod transform;

pub use dataset::{PairDataset, Sample, VolumePair};
pub use log::AccTimer;
pub use nii::Volume;
pub use orient::Orientation;
pub use transform::{CropAnchor, ScaleIntensityRange, SpatialCrop, TransformChain, TransformConfig};
