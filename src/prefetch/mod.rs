pub mod image;
pub mod scheduler;

pub use image::{ImagePrefetcher, LoggingImagePrefetcher};
pub use scheduler::{PrefetchReport, PrefetchScheduler, prefetch_window};
