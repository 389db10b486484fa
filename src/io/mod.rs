//! Persistence of named tensor blobs
//!
//! Initial values, accumulated sensitivities and masks are stored as
//! SafeTensors files under one directory. Float tensors use `F32`, masks use
//! `BOOL`. [`SnipPaths`] names the files.

mod load;
mod paths;
mod save;

pub use load::{load_masks, load_tensors};
pub use paths::SnipPaths;
pub use save::{save_masks, save_tensors};
