use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::vectorize::Segment;

#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub color: String,
    pub width: f32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: "black".to_string(),
            width: 0.6,
        }
    }
}

/// Canvas of the source raster's size holding one stroke per segment.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    pub width: u32,
    pub height: u32,
    pub segments: Vec<Segment>,
    pub stroke: StrokeStyle,
}

impl VectorDocument {
    pub fn new(width: u32, height: u32, segments: Vec<Segment>, stroke: StrokeStyle) -> Self {
        Self {
            width,
            height,
            segments,
            stroke,
        }
    }

    pub fn to_svg(&self) -> String {
        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        ));
        svg.push('\n');
        let color = escape_attr(&self.stroke.color);
        for segment in &self.segments {
            svg.push_str(&format!(
                r#"<line x1="{x1}" y1="{y1}" x2="{x2}" y2="{y2}" stroke="{color}" stroke-width="{width}"/>"#,
                x1 = segment.x1,
                y1 = segment.y1,
                x2 = segment.x2,
                y2 = segment.y2,
                color = color,
                width = self.stroke.width
            ));
            svg.push('\n');
        }
        svg.push_str("</svg>\n");
        svg
    }

    pub fn to_svg_base64(&self) -> String {
        BASE64.encode(self.to_svg().as_bytes())
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(svg: &str) -> usvg::Tree {
        usvg::Tree::from_str(svg, &usvg::Options::default()).expect("valid svg")
    }

    #[test]
    fn empty_document_keeps_canvas_size() {
        let doc = VectorDocument::new(120, 80, Vec::new(), StrokeStyle::default());
        let tree = parse(&doc.to_svg());
        assert_eq!(tree.size().width(), 120.0);
        assert_eq!(tree.size().height(), 80.0);
        assert!(tree.root().children().is_empty());
    }

    #[test]
    fn one_stroke_per_segment_in_order() {
        let segments = vec![
            Segment::new(0, 10, 90, 10),
            Segment::new(5, 0, 5, 70),
            Segment::new(10, 10, 60, 60),
        ];
        let doc = VectorDocument::new(100, 80, segments, StrokeStyle::default());
        let svg = doc.to_svg();
        assert_eq!(svg.matches("<line ").count(), 3);
        let first = svg.find(r#"x1="0" y1="10""#).expect("first");
        let second = svg.find(r#"x1="5" y1="0""#).expect("second");
        let third = svg.find(r#"x1="10" y1="10""#).expect("third");
        assert!(first < second && second < third);
        assert!(svg.contains(r#"stroke="black" stroke-width="0.6""#));
        assert_eq!(parse(&svg).root().children().len(), 3);
    }

    #[test]
    fn base64_payload_round_trips_to_markup() {
        let doc = VectorDocument::new(10, 10, Vec::new(), StrokeStyle::default());
        let decoded = BASE64.decode(doc.to_svg_base64()).expect("base64");
        assert_eq!(String::from_utf8(decoded).expect("utf8"), doc.to_svg());
    }

    #[test]
    fn stroke_color_is_escaped() {
        let style = StrokeStyle {
            color: "a\"b".to_string(),
            width: 1.0,
        };
        let doc = VectorDocument::new(10, 10, vec![Segment::new(0, 0, 9, 9)], style);
        assert!(doc.to_svg().contains(r#"stroke="a&quot;b""#));
    }
}
