// Pipeline orchestration for staged swap jobs

pub mod swap;
pub mod workspace;

pub use swap::SwapPipeline;
pub use workspace::{WorkArea, Workspace};
