//! # Preprocess
//!
//! Camera frame preprocessing.
//!
//! Responsibilities:
//! - Decode the base64 camera payload into RGB
//! - Crop away sky and hood, blur, area-resize to the model input size
//! - Convert to the colour space the model was trained on
//!
//! ## Usage Example
//!
//! ```ignore
//! use preprocess::Preprocessor;
//! use contracts::PreprocessConfig;
//!
//! let pre = Preprocessor::new(PreprocessConfig::default())?;
//! let frame = pre.run_base64(&telemetry.image)?;
//! assert_eq!(frame.len(), 200 * 66 * 3);
//! ```

mod decode;
mod error;
pub mod ops;
mod pipeline;

// Re-exports
pub use contracts::ModelInput;
pub use decode::{decode_base64, decode_image, decode_image_bytes};
pub use error::{PreprocessError, Result};
pub use image::RgbImage;
pub use pipeline::Preprocessor;
