//! 逐切片的GIF动画渲染。

pub mod colormap;
pub mod gif;

pub use colormap::{slice_to_rgb, Colormap, Window};
pub use gif::{render_records, render_volume_gif, GifOptions};
