mod ocr_service;
mod transient_store;

pub use ocr_service::OcrService;
pub use transient_store::{ClaimedImage, TransientStore};
