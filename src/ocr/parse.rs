use crate::ocr::{DetectedToken, TextBox};

const WORD_LEVEL: i32 = 5;

/// Parses tesseract TSV output into word tokens.
///
/// Only word rows (level 5) with non-empty text and a non-degenerate box are
/// returned. Confidence is kept as reported (0..=100, `-1` for rows the
/// engine did not score) so that filtering stays a separate step.
pub fn parse_tsv_tokens(tsv: &str) -> Vec<DetectedToken> {
    let mut tokens = Vec::new();
    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].trim().parse().unwrap_or(0);
        if level != WORD_LEVEL {
            continue;
        }
        let left: u32 = cols[6].trim().parse().unwrap_or(0);
        let top: u32 = cols[7].trim().parse().unwrap_or(0);
        let width: u32 = cols[8].trim().parse().unwrap_or(0);
        let height: u32 = cols[9].trim().parse().unwrap_or(0);
        let confidence: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        // text may itself contain tabs on odd engines; keep the remainder
        let text = cols[11..].join("\t");
        let text = text.trim_end_matches(['\r', '\n']);
        if text.trim().is_empty() || width == 0 || height == 0 {
            continue;
        }
        tokens.push(DetectedToken {
            text: text.to_string(),
            confidence,
            bbox: TextBox::new(left, top, width, height),
        });
    }
    tokens
}
