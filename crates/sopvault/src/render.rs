//! PDF generation for structured SOPs.
//!
//! Rendering is a collaborator behind [`PdfRenderer`]; the engine hands it
//! HTML and a footer and gets bytes back. [`TextPdfRenderer`] is the built-in
//! implementation: it flattens the HTML to text and lays it out in Courier
//! with `lopdf`. Deployments that need real layout plug in their own renderer.

use crate::error::{Result, VaultError};
use crate::model::StructuredSop;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

#[derive(Debug, Clone, PartialEq)]
pub struct PageSettings {
    /// Page size in points.
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub font_size: f32,
}

impl Default for PageSettings {
    /// A4 portrait.
    fn default() -> Self {
        Self {
            width: 595.0,
            height: 842.0,
            margin: 50.0,
            font_size: 10.0,
        }
    }
}

impl PageSettings {
    fn leading(&self) -> f32 {
        self.font_size * 1.25
    }

    fn lines_per_page(&self) -> usize {
        let usable = self.height - 2.0 * self.margin - 2.0 * self.leading();
        ((usable / self.leading()).floor() as usize).max(1)
    }

    /// Courier glyphs are 0.6 em wide.
    fn chars_per_line(&self) -> usize {
        let usable = self.width - 2.0 * self.margin;
        ((usable / (self.font_size * 0.6)).floor() as usize).max(10)
    }
}

pub trait PdfRenderer {
    fn render(&self, html: &str, footer_html: &str, settings: &PageSettings) -> Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextPdfRenderer;

impl PdfRenderer for TextPdfRenderer {
    fn render(&self, html: &str, footer_html: &str, settings: &PageSettings) -> Result<Vec<u8>> {
        let width = settings.chars_per_line();
        let lines: Vec<String> = html_to_text(html)
            .lines()
            .flat_map(|line| wrap(line, width))
            .collect();
        let footer = html_to_text(footer_html).replace('\n', " ");

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let chunks: Vec<&[String]> = if lines.is_empty() {
            vec![&lines[..]]
        } else {
            lines.chunks(settings.lines_per_page()).collect()
        };
        let total = chunks.len();
        let mut kids: Vec<Object> = Vec::with_capacity(total);

        for (i, chunk) in chunks.into_iter().enumerate() {
            let page_footer = format!("{}    Page {} of {}", footer.trim(), i + 1, total);
            let content = page_content(chunk, &page_footer, settings);
            let encoded = content
                .encode()
                .map_err(|e| VaultError::External(format!("PDF encoding failed: {}", e)))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => total as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(settings.width),
                Object::Real(settings.height),
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| VaultError::External(format!("PDF write failed: {}", e)))?;
        Ok(bytes)
    }
}

fn page_content(lines: &[String], footer: &str, settings: &PageSettings) -> Content {
    let leading = settings.leading();
    let top = settings.height - settings.margin - settings.font_size;
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), Object::Real(settings.font_size)]),
        Operation::new("TL", vec![Object::Real(leading)]),
        Operation::new("Td", vec![Object::Real(settings.margin), Object::Real(top)]),
    ];
    for line in lines {
        ops.push(Operation::new("Tj", vec![Object::string_literal(pdf_safe(line))]));
        ops.push(Operation::new("T*", vec![]));
    }
    ops.push(Operation::new("ET", vec![]));

    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec!["F1".into(), Object::Real(settings.font_size * 0.8)],
    ));
    ops.push(Operation::new(
        "Td",
        vec![Object::Real(settings.margin), Object::Real(settings.margin / 2.0)],
    ));
    ops.push(Operation::new("Tj", vec![Object::string_literal(pdf_safe(footer))]));
    ops.push(Operation::new("ET", vec![]));

    Content { operations: ops }
}

/// Courier in the standard encoding covers ASCII only.
fn pdf_safe(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    if line.trim().is_empty() {
        return vec![String::new()];
    }
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > width {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            out.push(head);
        }
        let needed = if current.is_empty() { 0 } else { 1 } + word.chars().count();
        if current.chars().count() + needed > width {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Flattens HTML to plain text: block tags become line breaks, other tags are
/// dropped, common entities decoded.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('>') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let tag = rest[start + 1..start + end]
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if matches!(
            tag.as_str(),
            "br" | "p" | "div" | "li" | "tr" | "h1" | "h2" | "h3" | "h4" | "ul" | "ol" | "table"
        ) {
            out.push('\n');
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    let mut text = String::new();
    let mut blank = false;
    for line in decoded.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            if !blank && !text.is_empty() {
                text.push('\n');
            }
            blank = true;
        } else {
            text.push_str(line.trim_start());
            text.push('\n');
            blank = false;
        }
    }
    text.trim_end().to_string()
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// HTML body for a structured SOP.
pub fn sop_html(sop: &StructuredSop) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        "<h1>{} {}</h1>\n",
        escape(&sop.sop_number),
        escape(&sop.title)
    ));
    html.push_str("<table>\n");
    let rows = [
        ("Revision", sop.revision.to_string()),
        (
            "Effective",
            sop.effective_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
        ("Department", sop.department.clone()),
        ("Type", sop.doc_type.clone()),
        ("Area", sop.area.clone()),
        ("Author", sop.author.clone()),
    ];
    for (label, value) in rows {
        html.push_str(&format!("<tr>{}: {}</tr>\n", label, escape(&value)));
    }
    html.push_str("</table>\n");

    for step in &sop.steps {
        html.push_str(&format!("<h3>Step {}</h3>\n", step.sequence));
        html.push_str(&format!("<div>{}</div>\n", step.instruction_html));
        if !step.key_point_html.trim().is_empty() {
            html.push_str(&format!("<div>Key point: {}</div>\n", step.key_point_html));
        }
        for image in step.images() {
            html.push_str(&format!("<div>[image: {}]</div>\n", escape(image)));
        }
    }
    html
}

pub fn sop_footer(sop: &StructuredSop) -> String {
    format!(
        "{} {} | {}",
        escape(&sop.sop_number),
        sop.revision,
        sop.effective_date
            .map(|d| format!("Effective {}", d))
            .unwrap_or_else(|| "Draft".to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_sop;

    #[test]
    fn html_is_flattened_to_lines() {
        let text = html_to_text("<p>Wear <b>gloves</b></p><ul><li>One</li><li>Two &amp; three</li></ul>");
        assert_eq!(text, "Wear gloves\n\nOne\n\nTwo & three");
    }

    #[test]
    fn long_lines_wrap() {
        let lines = wrap("aaaa bbbb cccc", 9);
        assert_eq!(lines, vec!["aaaa bbbb", "cccc"]);
        let lines = wrap("abcdefghijkl", 5);
        assert_eq!(lines, vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn renders_a_loadable_pdf() {
        let sop = sample_sop("QA-010");
        let bytes = TextPdfRenderer
            .render(&sop_html(&sop), &sop_footer(&sop), &PageSettings::default())
            .unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn paginates_long_documents() {
        let html = "<p>line</p>".repeat(200);
        let bytes = TextPdfRenderer
            .render(&html, "footer", &PageSettings::default())
            .unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn sop_html_lists_steps() {
        let sop = sample_sop("QA-010");
        let html = sop_html(&sop);
        assert!(html.contains("Step 1"));
        assert!(html.contains("QA-010"));
        assert!(sop_footer(&sop).starts_with("QA-010 Rev: 0"));
    }
}
