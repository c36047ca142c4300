pub mod caption;
pub mod store;
pub mod transform;

// Re-export commonly used services
pub use caption::{CaptionBackend, Captioner, VisionApiClient};
pub use store::{ContentStore, HttpStore};
pub use transform::{BlendSwap, SwapTransform};
