//! A minimal PresentationML writer.
//!
//! A deck is a list of slides made of positioned text boxes and filled
//! rectangles. It is packaged with one blank layout, one master and a plain
//! theme, which is the smallest package PowerPoint and LibreOffice open.

use quick_xml::escape::escape;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::retro::*;

/// 16:9, in EMU.
pub const SLIDE_WIDTH: i64 = 12_192_000;
pub const SLIDE_HEIGHT: i64 = 6_858_000;
pub const EMU_PER_INCH: i64 = 914_400;

pub fn inches(x: f64) -> i64 {
    (x * EMU_PER_INCH as f64).round() as i64
}

/// Position and size of a shape, in EMU.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Frame {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Frame {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Frame {
        Frame {
            x,
            y,
            width: width.max(1),
            height: height.max(1),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Paragraph {
    pub text: String,
    /// In points.
    pub size: u32,
    pub bold: bool,
    /// RGB hex, without the leading '#'.
    pub color: Option<String>,
}

impl Paragraph {
    pub fn new(text: &str, size: u32) -> Paragraph {
        Paragraph {
            text: text.to_string(),
            size,
            bold: false,
            color: None,
        }
    }

    pub fn bold(mut self) -> Paragraph {
        self.bold = true;
        self
    }

    pub fn color(mut self, rgb: &str) -> Paragraph {
        self.color = Some(rgb.to_string());
        self
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Shape {
    Text {
        frame: Frame,
        paragraphs: Vec<Paragraph>,
    },
    Box {
        frame: Frame,
        fill: String,
    },
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Slide {
    pub shapes: Vec<Shape>,
}

impl Slide {
    pub fn new() -> Slide {
        Slide::default()
    }

    pub fn text(&mut self, frame: Frame, paragraphs: Vec<Paragraph>) -> &mut Slide {
        self.shapes.push(Shape::Text { frame, paragraphs });
        self
    }

    pub fn rect(&mut self, frame: Frame, fill: &str) -> &mut Slide {
        self.shapes.push(Shape::Box {
            frame,
            fill: fill.to_string(),
        });
        self
    }

    /// All the text of the slide, one line per paragraph.
    #[cfg(test)]
    pub fn plain_text(&self) -> Vec<String> {
        self.shapes
            .iter()
            .flat_map(|s| match s {
                Shape::Text { paragraphs, .. } => {
                    paragraphs.iter().map(|p| p.text.clone()).collect()
                }
                Shape::Box { .. } => Vec::new(),
            })
            .collect()
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Deck {
    pub slides: Vec<Slide>,
}

impl Deck {
    pub fn new() -> Deck {
        Deck::default()
    }

    pub fn push(&mut self, slide: Slide) {
        self.slides.push(slide);
    }

    pub fn extend(&mut self, slides: Vec<Slide>) {
        self.slides.extend(slides);
    }

    /// Serializes the deck as a `.pptx` package.
    pub fn to_bytes(&self) -> RetroResult<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut parts: Vec<(String, String)> = vec![
            ("[Content_Types].xml".to_string(), content_types(self.slides.len())),
            ("_rels/.rels".to_string(), ROOT_RELS.to_string()),
            ("ppt/presentation.xml".to_string(), presentation(self.slides.len())),
            (
                "ppt/_rels/presentation.xml.rels".to_string(),
                presentation_rels(self.slides.len()),
            ),
            (
                "ppt/slideMasters/slideMaster1.xml".to_string(),
                SLIDE_MASTER.to_string(),
            ),
            (
                "ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(),
                SLIDE_MASTER_RELS.to_string(),
            ),
            (
                "ppt/slideLayouts/slideLayout1.xml".to_string(),
                SLIDE_LAYOUT.to_string(),
            ),
            (
                "ppt/slideLayouts/_rels/slideLayout1.xml.rels".to_string(),
                SLIDE_LAYOUT_RELS.to_string(),
            ),
            ("ppt/theme/theme1.xml".to_string(), THEME.to_string()),
        ];
        for (idx, slide) in self.slides.iter().enumerate() {
            parts.push((format!("ppt/slides/slide{}.xml", idx + 1), slide_xml(slide)));
            parts.push((
                format!("ppt/slides/_rels/slide{}.xml.rels", idx + 1),
                SLIDE_RELS.to_string(),
            ));
        }

        for (name, content) in parts {
            zip.start_file(name, opts).context(WritingDeckSnafu {})?;
            zip.write_all(content.as_bytes())
                .context(WritingDeckIoSnafu {})?;
        }
        let cursor = zip.finish().context(WritingDeckSnafu {})?;
        let bytes = cursor.into_inner();
        debug!(
            "to_bytes: {} slides, {} bytes",
            self.slides.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Escapes text for an attribute or element. Characters XML 1.0 does not allow are dropped.
pub fn escape_xml(s: &str) -> String {
    let allowed: String = s.chars().filter(|c| is_xml_char(*c)).collect();
    escape(allowed.as_str()).into_owned()
}

// ********* Package parts ***********

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn content_types(num_slides: usize) -> String {
    let mut s = format!(
        "{}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>\
<Override PartName=\"/ppt/slideMasters/slideMaster1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml\"/>\
<Override PartName=\"/ppt/slideLayouts/slideLayout1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml\"/>\
<Override PartName=\"/ppt/theme/theme1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.theme+xml\"/>",
        XML_HEADER
    );
    for idx in 1..=num_slides {
        s.push_str(&format!(
            "<Override PartName=\"/ppt/slides/slide{}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>",
            idx
        ));
    }
    s.push_str("</Types>");
    s
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#;

// rId1 is the master, rId2 the theme, the slides start at rId3.
fn presentation(num_slides: usize) -> String {
    let slide_ids: String = (0..num_slides)
        .map(|idx| format!("<p:sldId id=\"{}\" r:id=\"rId{}\"/>", 256 + idx, idx + 3))
        .collect();
    let slide_list = if num_slides > 0 {
        format!("<p:sldIdLst>{}</p:sldIdLst>", slide_ids)
    } else {
        String::new()
    };
    format!(
        "{}<p:presentation {} saveSubsetFonts=\"1\">\
<p:sldMasterIdLst><p:sldMasterId id=\"2147483648\" r:id=\"rId1\"/></p:sldMasterIdLst>\
{}<p:sldSz cx=\"{}\" cy=\"{}\"/><p:notesSz cx=\"6858000\" cy=\"9144000\"/></p:presentation>",
        XML_HEADER, NS, slide_list, SLIDE_WIDTH, SLIDE_HEIGHT
    )
}

fn presentation_rels(num_slides: usize) -> String {
    let mut s = format!(
        "{}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"{}/slideMaster\" Target=\"slideMasters/slideMaster1.xml\"/>\
<Relationship Id=\"rId2\" Type=\"{}/theme\" Target=\"theme/theme1.xml\"/>",
        XML_HEADER, REL_BASE, REL_BASE
    );
    for idx in 0..num_slides {
        s.push_str(&format!(
            "<Relationship Id=\"rId{}\" Type=\"{}/slide\" Target=\"slides/slide{}.xml\"/>",
            idx + 3,
            REL_BASE,
            idx + 1
        ));
    }
    s.push_str("</Relationships>");
    s
}

const EMPTY_TREE: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#;

const SLIDE_MASTER: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
    r#"<p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>"#,
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
    r#"</p:spTree></p:cSld>"#,
    r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#,
    r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>"#,
    r#"<p:txStyles><p:titleStyle><a:lvl1pPr><a:defRPr sz="4400"/></a:lvl1pPr></p:titleStyle><p:bodyStyle><a:lvl1pPr><a:defRPr sz="1800"/></a:lvl1pPr></p:bodyStyle><p:otherStyle><a:lvl1pPr><a:defRPr sz="1800"/></a:lvl1pPr></p:otherStyle></p:txStyles>"#,
    r#"</p:sldMaster>"#
);

const SLIDE_MASTER_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme1.xml"/></Relationships>"#;

const SLIDE_LAYOUT: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" type="blank" preserve="1">"#,
    r#"<p:cSld name="Blank"><p:spTree>"#,
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
    r#"</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
);

const SLIDE_LAYOUT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#;

const SLIDE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/></Relationships>"#;

const THEME: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Retro"><a:themeElements>"#,
    r#"<a:clrScheme name="Retro">"#,
    r#"<a:dk1><a:srgbClr val="000000"/></a:dk1><a:lt1><a:srgbClr val="FFFFFF"/></a:lt1>"#,
    r#"<a:dk2><a:srgbClr val="1F2937"/></a:dk2><a:lt2><a:srgbClr val="F3F4F6"/></a:lt2>"#,
    r#"<a:accent1><a:srgbClr val="1F77B4"/></a:accent1><a:accent2><a:srgbClr val="FF7F0E"/></a:accent2>"#,
    r#"<a:accent3><a:srgbClr val="2CA02C"/></a:accent3><a:accent4><a:srgbClr val="D62728"/></a:accent4>"#,
    r#"<a:accent5><a:srgbClr val="9467BD"/></a:accent5><a:accent6><a:srgbClr val="8C564B"/></a:accent6>"#,
    r#"<a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink>"#,
    r#"</a:clrScheme>"#,
    r#"<a:fontScheme name="Retro">"#,
    r#"<a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
    r#"<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>"#,
    r#"</a:fontScheme>"#,
    r#"<a:fmtScheme name="Retro">"#,
    r#"<a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst>"#,
    r#"<a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst>"#,
    r#"<a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst>"#,
    r#"<a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst>"#,
    r#"</a:fmtScheme></a:themeElements></a:theme>"#
);

fn xfrm(frame: &Frame) -> String {
    format!(
        "<a:xfrm><a:off x=\"{}\" y=\"{}\"/><a:ext cx=\"{}\" cy=\"{}\"/></a:xfrm>",
        frame.x, frame.y, frame.width, frame.height
    )
}

fn paragraph_xml(p: &Paragraph) -> String {
    if p.text.is_empty() {
        return format!("<a:p><a:endParaRPr lang=\"en-US\" sz=\"{}\"/></a:p>", p.size * 100);
    }
    let fill = p
        .color
        .as_ref()
        .map(|c| format!("<a:solidFill><a:srgbClr val=\"{}\"/></a:solidFill>", escape_xml(c)))
        .unwrap_or_default();
    format!(
        "<a:p><a:r><a:rPr lang=\"en-US\" sz=\"{}\" b=\"{}\" dirty=\"0\">{}</a:rPr><a:t>{}</a:t></a:r></a:p>",
        p.size * 100,
        if p.bold { 1 } else { 0 },
        fill,
        escape_xml(&p.text)
    )
}

fn shape_xml(shape: &Shape, id: usize) -> String {
    match shape {
        Shape::Text { frame, paragraphs } => {
            let body: String = paragraphs.iter().map(paragraph_xml).collect();
            format!(
                "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"TextBox {id}\"/><p:cNvSpPr txBox=\"1\"/><p:nvPr/></p:nvSpPr>\
<p:spPr>{}<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>\
<p:txBody><a:bodyPr wrap=\"square\" rtlCol=\"0\"><a:normAutofit/></a:bodyPr><a:lstStyle/>{}</p:txBody></p:sp>",
                xfrm(frame),
                if body.is_empty() { "<a:p/>".to_string() } else { body },
                id = id
            )
        }
        Shape::Box { frame, fill } => format!(
            "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"Rectangle {id}\"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>\
<p:spPr>{}<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom><a:solidFill><a:srgbClr val=\"{}\"/></a:solidFill><a:ln><a:noFill/></a:ln></p:spPr></p:sp>",
            xfrm(frame),
            escape_xml(fill),
            id = id
        ),
    }
}

fn slide_xml(slide: &Slide) -> String {
    // Shape ids start after the group shape of the tree.
    let shapes: String = slide
        .shapes
        .iter()
        .enumerate()
        .map(|(idx, s)| shape_xml(s, idx + 2))
        .collect();
    format!(
        "{}<p:sld {}><p:cSld><p:spTree>{}{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>",
        XML_HEADER, NS, EMPTY_TREE, shapes
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut f = archive.by_name(name).unwrap();
        let mut s = String::new();
        f.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn package_has_all_parts() {
        let mut deck = Deck::new();
        let mut slide = Slide::new();
        slide.text(
            Frame::new(0, 0, inches(4.0), inches(1.0)),
            vec![Paragraph::new("Team <A> & co", 24).bold()],
        );
        slide.rect(Frame::new(0, inches(1.0), inches(1.0), 0), "1F77B4");
        deck.push(slide);
        deck.push(Slide::new());
        let bytes = deck.to_bytes().unwrap();

        let archive = zip::ZipArchive::new(Cursor::new(bytes.clone())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "ppt/presentation.xml",
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/theme/theme1.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/_rels/slide2.xml.rels",
        ] {
            assert!(names.contains(&part), "missing {}", part);
        }

        let slide1 = read_part(&bytes, "ppt/slides/slide1.xml");
        assert!(slide1.contains("Team &lt;A&gt; &amp; co"));
        assert!(slide1.contains("b=\"1\""));
        assert!(slide1.contains("<a:srgbClr val=\"1F77B4\"/>"));
        // Zero heights are bumped so that the shape stays valid.
        assert!(slide1.contains("cy=\"1\""));

        let pres = read_part(&bytes, "ppt/presentation.xml");
        assert!(pres.contains("r:id=\"rId4\""));
        let types = read_part(&bytes, "[Content_Types].xml");
        assert!(types.contains("/ppt/slides/slide2.xml"));
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_xml("a\"b'c\u{1}"), "a&quot;b&apos;c");
        assert_eq!(escape_xml("<R&D>\u{FFFE}\u{FFFF}\tok"), "&lt;R&amp;D&gt;\tok");
        assert_eq!(escape_xml("caf\u{e9} \u{1F600}"), "caf\u{e9} \u{1F600}");
        assert_eq!(inches(1.0), EMU_PER_INCH);
    }

    #[test]
    fn plain_text() {
        let mut slide = Slide::new();
        slide.text(
            Frame::new(0, 0, 10, 10),
            vec![Paragraph::new("one", 12), Paragraph::new("two", 12).color("FF0000")],
        );
        assert_eq!(slide.plain_text(), vec!["one", "two"]);
    }
}
