mod efficient;
mod standard;

pub use efficient::*;
pub use standard::*;

/// Both variants pool and upsample by this factor.
pub const POOL_SIZE: usize = 2;
