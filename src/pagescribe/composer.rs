//! # Background Composer
//!
//! Builds the annotation document for a page: an SVG sized like the page whose
//! only content is the page's vector export, embedded as a locked image. The
//! editor cannot select or move that image, so whatever the user draws sits on
//! top of it. On save the background image is cut out again
//! ([`strip_background`]) and only the user's drawing is converted to PDF.
//!
//! Only three attributes of the exported page are ever read: `width`,
//! `height` and `viewBox` of the root element.

use once_cell::sync::Lazy;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

/// Fixed id of the locked background image.
pub const BACKGROUND_ID: &str = "pagescribe-background";

static BACKGROUND_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#"<image[^>]*id="{}"[^>]*>"#, BACKGROUND_ID))
        .expect("background pattern is a valid regex")
});

/// Size attributes of a page's root `svg` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageGeometry {
    pub width: String,
    pub height: String,
    pub view_box: String,
}

impl PageGeometry {
    /// Reads the geometry from the root element of an SVG document.
    pub fn from_svg(doc: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(doc);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    if e.local_name().as_ref() != b"svg" {
                        return Err(format!(
                            "root element is '{}', not 'svg'",
                            String::from_utf8_lossy(e.name().as_ref())
                        ));
                    }

                    let mut width = None;
                    let mut height = None;
                    let mut view_box = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| e.to_string())?;
                        let slot = match attr.key.as_ref() {
                            b"width" => &mut width,
                            b"height" => &mut height,
                            b"viewBox" => &mut view_box,
                            _ => continue,
                        };
                        let value = attr.unescape_value().map_err(|e| e.to_string())?;
                        *slot = Some(value.into_owned());
                    }

                    let width = width.ok_or("missing width attribute")?;
                    let height = height.ok_or("missing height attribute")?;
                    let view_box = view_box.unwrap_or_else(|| {
                        format!("0 0 {} {}", strip_unit(&width), strip_unit(&height))
                    });
                    return Ok(Self {
                        width,
                        height,
                        view_box,
                    });
                }
                Ok(Event::Eof) => return Err("no root element".to_string()),
                Ok(_) => {}
                Err(e) => return Err(e.to_string()),
            }
        }
    }
}

/// Drops a trailing unit (px, pt, mm, cm, in, em, %) from a length.
pub fn strip_unit(value: &str) -> &str {
    value.trim_end_matches(|c| "x%npiemtc".contains(c))
}

/// Builds the annotation document with `href` as its locked background.
pub fn compose_annotation(geometry: &PageGeometry, href: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<svg
   width="{width}"
   height="{height}"
   viewBox="{view_box}"
   version="1.1"
   xmlns:xlink="http://www.w3.org/1999/xlink"
   xmlns="http://www.w3.org/2000/svg"
   xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd"
   xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
   xmlns:svg="http://www.w3.org/2000/svg">
  <g
     inkscape:label="Layer 1"
     inkscape:groupmode="layer"
     id="layer1">
    <image
       id="{id}"
       preserveAspectRatio="none"
       width="{image_width}"
       height="{image_height}"
       style="image-rendering:optimizeQuality"
       xlink:href="{href}"
       sodipodi:insensitive="true"
       inkscape:svg-dpi="300"
       x="0"
       y="0" />
  </g>
</svg>
"#,
        width = escape(&geometry.width),
        height = escape(&geometry.height),
        view_box = escape(&geometry.view_box),
        id = BACKGROUND_ID,
        image_width = escape(strip_unit(&geometry.width)),
        image_height = escape(strip_unit(&geometry.height)),
        href = escape(href),
    )
}

/// Removes the locked background image, leaving everything else verbatim.
pub fn strip_background(doc: &str) -> String {
    BACKGROUND_PATTERN.replace_all(doc, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INKSCAPE_EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<!-- Created with Inkscape -->
<svg
   width="210mm"
   height="297mm"
   viewBox="0 0 793.70081 1122.5197"
   version="1.1"
   id="svg1"
   xmlns="http://www.w3.org/2000/svg">
  <g id="page"><path d="M 0,0 H 10" /></g>
</svg>
"#;

    #[test]
    fn reads_root_geometry() {
        let geometry = PageGeometry::from_svg(INKSCAPE_EXPORT).unwrap();
        assert_eq!(geometry.width, "210mm");
        assert_eq!(geometry.height, "297mm");
        assert_eq!(geometry.view_box, "0 0 793.70081 1122.5197");
    }

    #[test]
    fn missing_view_box_falls_back_to_size() {
        let geometry =
            PageGeometry::from_svg(r#"<svg width="612pt" height="792pt"></svg>"#).unwrap();
        assert_eq!(geometry.view_box, "0 0 612 792");
    }

    #[test]
    fn missing_width_is_an_error() {
        let err = PageGeometry::from_svg(r#"<svg height="10"/>"#).unwrap_err();
        assert!(err.contains("width"));
    }

    #[test]
    fn non_svg_root_is_an_error() {
        let err = PageGeometry::from_svg("<html></html>").unwrap_err();
        assert!(err.contains("html"));
    }

    #[test]
    fn empty_document_is_an_error() {
        assert!(PageGeometry::from_svg("").is_err());
    }

    #[test]
    fn strips_units() {
        assert_eq!(strip_unit("210mm"), "210");
        assert_eq!(strip_unit("612pt"), "612");
        assert_eq!(strip_unit("8.5in"), "8.5");
        assert_eq!(strip_unit("100%"), "100");
        assert_eq!(strip_unit("595.28"), "595.28");
    }

    #[test]
    fn composed_document_locks_background() {
        let geometry = PageGeometry::from_svg(INKSCAPE_EXPORT).unwrap();
        let doc = compose_annotation(&geometry, "/tmp/stage/page-0.source.svg");

        assert!(doc.contains(r#"width="210mm""#));
        assert!(doc.contains(r#"viewBox="0 0 793.70081 1122.5197""#));
        assert!(doc.contains(r#"width="210""#));
        assert!(doc.contains(r#"xlink:href="/tmp/stage/page-0.source.svg""#));
        assert!(doc.contains(r#"sodipodi:insensitive="true""#));
        assert!(doc.contains(r#"inkscape:svg-dpi="300""#));
        assert_eq!(PageGeometry::from_svg(&doc).unwrap(), geometry);
    }

    #[test]
    fn href_is_escaped() {
        let geometry = PageGeometry {
            width: "10".into(),
            height: "10".into(),
            view_box: "0 0 10 10".into(),
        };
        let doc = compose_annotation(&geometry, "/tmp/a&b/page.svg");
        assert!(doc.contains("/tmp/a&amp;b/page.svg"));
    }

    #[test]
    fn strip_removes_only_background() {
        let geometry = PageGeometry::from_svg(INKSCAPE_EXPORT).unwrap();
        let composed = compose_annotation(&geometry, "bg.svg");
        let drawn = composed.replace(
            "  </g>\n</svg>",
            "    <path id=\"stroke\" d=\"M 1,1 L 5,5\" />\n  </g>\n  <rect id=\"offpage\" x=\"-50\" y=\"-50\" width=\"5\" height=\"5\" />\n</svg>",
        );

        let cleaned = strip_background(&drawn);

        assert!(!cleaned.contains(BACKGROUND_ID));
        assert!(!cleaned.contains("bg.svg"));
        assert!(cleaned.contains(r#"<path id="stroke" d="M 1,1 L 5,5" />"#));
        assert!(cleaned.contains(r#"id="offpage""#));
        assert!(cleaned.contains(r#"inkscape:label="Layer 1""#));
    }

    #[test]
    fn strip_handles_editor_reserialization() {
        let doc = format!(
            r#"<svg><g><image x="0" y="0" id="{}" xlink:href="bg.svg" sodipodi:insensitive="true"/><circle r="3"/></g></svg>"#,
            BACKGROUND_ID
        );
        assert_eq!(
            strip_background(&doc),
            r#"<svg><g><circle r="3"/></g></svg>"#
        );
    }
}
