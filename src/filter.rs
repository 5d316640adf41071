use crate::ocr::DetectedToken;

/// Thresholds that separate real text from OCR noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterPolicy {
    /// Tokens must score strictly above this confidence.
    pub min_confidence: f32,
    /// Tokens must have strictly more trimmed characters than this.
    pub min_chars: usize,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            min_confidence: 60.0,
            min_chars: 1,
        }
    }
}

impl FilterPolicy {
    pub fn keeps(&self, token: &DetectedToken) -> bool {
        token.confidence > self.min_confidence
            && token.text.trim().chars().count() > self.min_chars
    }
}

/// Returns the tokens worth translating, in their original order.
pub fn filter_tokens(tokens: &[DetectedToken], policy: &FilterPolicy) -> Vec<DetectedToken> {
    tokens
        .iter()
        .filter(|token| policy.keeps(token))
        .cloned()
        .collect()
}
