//! In-place max-norm clipping of the rows addressed by an index list.

mod kernel;
mod launch;

pub use kernel::RENORM_UNITS;
pub use launch::{RenormInputs, RenormKernel, RenormParams};
