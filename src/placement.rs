use crate::ocr::TextBox;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f32,
    pub height: f32,
}

/// Top-left corner at which replacement text is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPlacement {
    pub x: f32,
    pub y: f32,
}

/// Centers `extent` inside `bbox`, never starting above or left of the box
/// origin. Text larger than the box overflows to the right and bottom.
pub fn place_text(bbox: &TextBox, extent: TextExtent) -> RenderPlacement {
    let left = bbox.left as f32;
    let top = bbox.top as f32;
    let center_x = left + (bbox.width as f32 - extent.width) / 2.0;
    let center_y = top + (bbox.height as f32 - extent.height) / 2.0;
    RenderPlacement {
        x: center_x.max(left),
        y: center_y.max(top),
    }
}
