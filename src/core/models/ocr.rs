#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Smallest box enclosing all `(x, y)` vertices.
    pub fn enclosing(vertices: &[(f32, f32)]) -> Option<Self> {
        let (first_x, first_y) = *vertices.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first_x, first_y, first_x, first_y);

        for &(x, y) in vertices.iter().skip(1) {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DetectedText {
    pub content: String,
    pub bounds: Option<BoundingBox>,
}

impl DetectedText {
    pub fn new(content: String, bounds: Option<BoundingBox>) -> Self {
        Self { content, bounds }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OcrResult {
    pub text_blocks: Vec<DetectedText>,
    pub full_text: String,
}

impl OcrResult {
    pub fn from_full_text(full_text: String) -> Self {
        Self {
            text_blocks: vec![],
            full_text,
        }
    }

    pub fn has_text(&self) -> bool {
        !self.full_text.trim().is_empty()
            || self
                .text_blocks
                .iter()
                .any(|block| !block.content.trim().is_empty())
    }

    /// Plain text for the client; falls back to joining blocks when the
    /// backend gave no full text.
    pub fn into_plain_text(self) -> String {
        if !self.full_text.trim().is_empty() {
            return self.full_text;
        }

        self.text_blocks
            .into_iter()
            .map(|block| block.content)
            .filter(|content| !content.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// What an OCR attempt produced. Zero detections is a valid outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    TextDetected(String),
    NoTextDetected,
}

impl From<OcrResult> for ExtractionOutcome {
    fn from(result: OcrResult) -> Self {
        if result.has_text() {
            ExtractionOutcome::TextDetected(result.into_plain_text())
        } else {
            ExtractionOutcome::NoTextDetected
        }
    }
}
