mod disk_transient_store;
mod google_vision_ocr_service;
mod memory_transient_store;
mod tesseract_ocr_service;

pub use disk_transient_store::DiskTransientStore;
pub use google_vision_ocr_service::{GoogleVisionOcrService, VisionCredential};
pub use memory_transient_store::MemoryTransientStore;
pub use tesseract_ocr_service::TesseractOcrService;
