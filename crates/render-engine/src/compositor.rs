//! Grid compositor: fits every channel's latest frame into a labelled cell and
//! tiles the cells into one wall image.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::label::{draw_text, fit_text, text_height};
use crate::layout::GridLayout;
use crate::VideoFrame;

/// Letterbox colour around scaled frames.
pub const PADDING_COLOR: Rgb<u8> = Rgb([20, 20, 20]);
/// Background of placeholder and padding cells.
pub const BLANK_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
/// Caption colour on live cells.
pub const LABEL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Caption colour on placeholder cells.
pub const NO_FRAME_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const LABEL_MARGIN: u32 = 10;

/// What the compositor knows about one channel at tick time.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Channel display name.
    pub label: String,
    /// Latest decoded frame, if any.
    pub frame: Option<Arc<VideoFrame>>,
    /// Optional status line shown on placeholders (e.g. "RECONNECTING").
    pub detail: Option<String>,
}

impl Tile {
    pub fn new(label: impl Into<String>, frame: Option<Arc<VideoFrame>>) -> Self {
        Self {
            label: label.into(),
            frame,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Fixed-cell video wall builder.
#[derive(Debug, Clone)]
pub struct GridCompositor {
    cell_width: u32,
    cell_height: u32,
    max_tiles: usize,
    label_scale: u32,
}

impl GridCompositor {
    pub fn new(cell_width: u32, cell_height: u32, max_tiles: usize) -> Self {
        let cell_width = cell_width.max(1);
        let cell_height = cell_height.max(1);
        Self {
            cell_width,
            cell_height,
            max_tiles: max_tiles.max(1),
            label_scale: (cell_height / 180).clamp(1, 4),
        }
    }

    pub fn cell_size(&self) -> (u32, u32) {
        (self.cell_width, self.cell_height)
    }

    pub fn max_tiles(&self) -> usize {
        self.max_tiles
    }

    /// Layout used for `num_tiles` channels after the tile cap.
    pub fn layout_for(&self, num_tiles: usize) -> GridLayout {
        GridLayout::for_cells(num_tiles.min(self.max_tiles))
    }

    /// Canvas size for `num_tiles` channels.
    pub fn canvas_size(&self, num_tiles: usize) -> (u32, u32) {
        self.layout_for(num_tiles)
            .canvas_size(self.cell_width, self.cell_height)
    }

    /// Build one wall image. Tiles beyond `max_tiles` are ignored; unused grid
    /// positions are blank.
    pub fn compose(&self, tiles: &[Tile]) -> RgbImage {
        if tiles.len() > self.max_tiles {
            tracing::trace!(
                tiles = tiles.len(),
                max_tiles = self.max_tiles,
                "Dropping tiles beyond the cap"
            );
        }
        let tiles = &tiles[..tiles.len().min(self.max_tiles)];
        let layout = GridLayout::for_cells(tiles.len());
        let (width, height) = layout.canvas_size(self.cell_width, self.cell_height);
        let mut canvas = RgbImage::from_pixel(width, height, BLANK_COLOR);

        for (index, tile) in tiles.iter().enumerate() {
            let cell = self.render_tile(tile);
            let (x, y) = layout.cell_origin(index, self.cell_width, self.cell_height);
            imageops::replace(&mut canvas, &cell, x as i64, y as i64);
        }

        canvas
    }

    /// Render one tile as a full cell.
    pub fn render_tile(&self, tile: &Tile) -> RgbImage {
        match tile.frame.as_deref() {
            Some(frame) if frame.width() > 0 && frame.height() > 0 => {
                let mut cell = self.fit_frame(frame);
                self.draw_caption(&mut cell, &tile.label, LABEL_COLOR, LABEL_MARGIN);
                cell
            }
            _ => self.placeholder(&tile.label, tile.detail.as_deref()),
        }
    }

    /// Scale `frame` to fit inside the cell, preserving aspect ratio, and
    /// centre it on a padded background.
    pub fn fit_frame(&self, frame: &VideoFrame) -> RgbImage {
        let (w, h) = frame.dimensions();
        let (cw, ch) = (self.cell_width, self.cell_height);
        if (w, h) == (cw, ch) {
            return frame.clone();
        }

        let scale = (cw as f64 / w.max(1) as f64).min(ch as f64 / h.max(1) as f64);
        let nw = ((w as f64 * scale) as u32).clamp(1, cw);
        let nh = ((h as f64 * scale) as u32).clamp(1, ch);
        let resized = imageops::resize(frame, nw, nh, FilterType::Triangle);

        let mut cell = RgbImage::from_pixel(cw, ch, PADDING_COLOR);
        let left = (cw - nw) / 2;
        let top = (ch - nh) / 2;
        imageops::replace(&mut cell, &resized, left as i64, top as i64);
        cell
    }

    /// Cell shown for a channel without a current frame.
    pub fn placeholder(&self, label: &str, detail: Option<&str>) -> RgbImage {
        let mut cell = RgbImage::from_pixel(self.cell_width, self.cell_height, BLANK_COLOR);
        let line = text_height(self.label_scale);
        let mid = (self.cell_height / 2).saturating_sub(line / 2);
        self.draw_caption(&mut cell, &format!("NO FRAME: {label}"), NO_FRAME_COLOR, mid);
        if let Some(detail) = detail {
            self.draw_caption(&mut cell, detail, NO_FRAME_COLOR, mid + line * 2);
        }
        cell
    }

    /// Cell used to pad an incomplete last row.
    pub fn blank_cell(&self) -> RgbImage {
        RgbImage::from_pixel(self.cell_width, self.cell_height, BLANK_COLOR)
    }

    fn draw_caption(&self, cell: &mut RgbImage, text: &str, color: Rgb<u8>, top: u32) {
        let available = self.cell_width.saturating_sub(LABEL_MARGIN * 2);
        let text = fit_text(text, available, self.label_scale);
        draw_text(
            cell,
            LABEL_MARGIN as i32,
            top as i32,
            &text,
            color,
            self.label_scale,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, color: [u8; 3]) -> Arc<VideoFrame> {
        Arc::new(RgbImage::from_pixel(w, h, Rgb(color)))
    }

    fn close_to(pixel: &Rgb<u8>, expected: [u8; 3]) -> bool {
        pixel
            .0
            .iter()
            .zip(expected)
            .all(|(a, b)| a.abs_diff(b) <= 1)
    }

    #[test]
    fn test_fit_wide_frame_letterboxes_vertically() {
        let compositor = GridCompositor::new(640, 360, 4);
        let cell = compositor.fit_frame(&solid(1280, 480, [200, 10, 10]));
        assert_eq!(cell.dimensions(), (640, 360));
        // 1280x480 scales to 640x240, centred with 60px bars.
        assert_eq!(*cell.get_pixel(320, 10), PADDING_COLOR);
        assert!(close_to(cell.get_pixel(320, 180), [200, 10, 10]));
        assert_eq!(*cell.get_pixel(320, 350), PADDING_COLOR);
    }

    #[test]
    fn test_fit_tall_frame_pillarboxes() {
        let compositor = GridCompositor::new(640, 360, 4);
        let cell = compositor.fit_frame(&solid(360, 720, [0, 0, 200]));
        // 360x720 scales to 180x360, centred horizontally.
        assert_eq!(*cell.get_pixel(100, 180), PADDING_COLOR);
        assert!(close_to(cell.get_pixel(320, 180), [0, 0, 200]));
        assert_eq!(*cell.get_pixel(600, 180), PADDING_COLOR);
    }

    #[test]
    fn test_compose_canvas_size_and_padding() {
        let compositor = GridCompositor::new(64, 36, 16);
        let tiles: Vec<_> = (1..=3)
            .map(|i| Tile::new(format!("CH{i}"), Some(solid(64, 36, [9, 9, 9]))))
            .collect();
        let wall = compositor.compose(&tiles);
        assert_eq!(wall.dimensions(), (128, 72));
        // Fourth grid position is a blank padding cell.
        assert_eq!(*wall.get_pixel(100, 60), BLANK_COLOR);
        assert_eq!(*wall.get_pixel(60, 30), Rgb([9, 9, 9]));
    }

    #[test]
    fn test_compose_caps_tiles() {
        let compositor = GridCompositor::new(32, 18, 4);
        let tiles: Vec<_> = (0..9).map(|i| Tile::new(format!("{i}"), None)).collect();
        assert_eq!(compositor.compose(&tiles).dimensions(), (64, 36));
        assert_eq!(compositor.canvas_size(9), (64, 36));
    }

    #[test]
    fn test_missing_frame_renders_placeholder() {
        let compositor = GridCompositor::new(320, 180, 4);
        let cell = compositor.render_tile(&Tile::new("Gate-CH2", None).with_detail("RECONNECTING"));
        assert_eq!(cell.dimensions(), (320, 180));
        assert!(cell.pixels().any(|p| *p == NO_FRAME_COLOR));
        assert!(!cell.pixels().any(|p| *p == LABEL_COLOR));
    }

    #[test]
    fn test_live_cell_carries_label() {
        let compositor = GridCompositor::new(320, 180, 4);
        let cell = compositor.render_tile(&Tile::new("Gate-CH1", Some(solid(320, 180, [1, 2, 3]))));
        assert!(cell.pixels().any(|p| *p == LABEL_COLOR));
    }

    #[test]
    fn test_empty_frame_treated_as_missing() {
        let compositor = GridCompositor::new(32, 18, 1);
        let cell = compositor.render_tile(&Tile::new("x", Some(Arc::new(RgbImage::new(0, 0)))));
        assert_eq!(cell.dimensions(), (32, 18));
    }

    #[test]
    fn test_empty_wall_is_one_blank_cell() {
        let compositor = GridCompositor::new(32, 18, 4);
        let wall = compositor.compose(&[]);
        assert_eq!(wall, compositor.blank_cell());
    }
}
