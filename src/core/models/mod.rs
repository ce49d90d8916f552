mod image_format;
mod image_reference;
mod ocr;
mod pipeline_error;
mod uploaded_image;

pub use image_format::ImageFormat;
pub use image_reference::ImageReference;
pub use ocr::{BoundingBox, DetectedText, ExtractionOutcome, OcrResult};
pub use pipeline_error::PipelineError;
pub use uploaded_image::UploadedImage;
