pub mod args;
mod evaluate;
mod nii2gif;
mod utils;
