//! Document assembly: ordered page texts → DOCX bytes.
//!
//! A DOCX file is a deflate ZIP container of WordprocessingML parts. Only
//! the minimal part set is written:
//!
//! ```text
//! [Content_Types].xml
//! _rels/.rels
//! docProps/core.xml              title
//! word/document.xml              body
//! word/styles.xml                Normal, Title, Heading1
//! word/_rels/document.xml.rels   body → styles
//! ```
//!
//! The body is one `Title` paragraph with the display name, then for each
//! page with text a `Heading1` carrying the page number followed by one
//! paragraph holding the page text. Pages without text follow
//! [`BlankPagePolicy`].
//!
//! Output is deterministic: parts are written in a fixed order with a fixed
//! timestamp, so the same input always yields the same bytes.

use crate::config::{AssemblyOptions, BlankPagePolicy};
use crate::error::AssemblyError;
use crate::output::ExtractedDocument;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:eastAsia="Calibri" w:cs="Calibri"/><w:sz w:val="22"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="200" w:line="276" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:spacing w:after="300"/></w:pPr><w:rPr><w:sz w:val="52"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="480" w:after="0"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="28"/></w:rPr></w:style></w:styles>"#;

/// `page` value reported by [`AssemblyError::InvalidCharacter`] for the title.
pub const TITLE_PAGE: usize = 0;

/// Assemble `doc` into DOCX bytes titled `"{title_prefix}{display_name}"`.
pub fn assemble_document(
    doc: &ExtractedDocument,
    display_name: &str,
    options: &AssemblyOptions,
) -> Result<Vec<u8>, AssemblyError> {
    let title = format!("{}{}", options.title_prefix, display_name);
    check_xml_chars(&title, TITLE_PAGE)?;

    let mut body = String::new();
    body.push_str(&paragraph(Some("Title"), &title));

    let mut sections = 0usize;
    for page in doc.pages() {
        if page.is_empty() && options.blank_pages == BlankPagePolicy::Omit {
            continue;
        }
        let heading = options.page_heading(page.page);
        check_xml_chars(&heading, page.page)?;
        check_xml_chars(&page.text, page.page)?;
        body.push_str(&paragraph(Some("Heading1"), &heading));
        body.push_str(&paragraph(None, &page.text));
        sections += 1;
    }

    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#
    );

    let core = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{}</dc:title></cp:coreProperties>"#,
        escape_xml(&title)
    );

    let parts: [(&str, &str); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("docProps/core.xml", &core),
        ("word/document.xml", &document),
        ("word/styles.xml", STYLES),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS),
    ];

    let bytes = write_container(&parts)?;
    debug!(
        "Assembled '{}': {} page sections, {} bytes",
        display_name,
        sections,
        bytes.len()
    );
    Ok(bytes)
}

/// ZIP entry options with a fixed timestamp for reproducible output.
pub(crate) fn deterministic_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
}

fn write_container(parts: &[(&str, &str)]) -> Result<Vec<u8>, AssemblyError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = deterministic_options();

    for (name, content) in parts {
        zip.start_file(*name, options)
            .map_err(|source| AssemblyError::Container {
                part: name.to_string(),
                source,
            })?;
        zip.write_all(content.as_bytes())
            .map_err(|source| AssemblyError::Io {
                part: name.to_string(),
                source,
            })?;
    }

    let cursor = zip.finish().map_err(|source| AssemblyError::Container {
        part: "central directory".to_string(),
        source,
    })?;
    Ok(cursor.into_inner())
}

/// One paragraph, optionally styled. Newlines become line breaks and tabs
/// become tab stops inside a single run.
fn paragraph(style: Option<&str>, text: &str) -> String {
    let mut p = String::from("<w:p>");
    if let Some(style) = style {
        p.push_str(&format!(r#"<w:pPr><w:pStyle w:val="{style}"/></w:pPr>"#));
    }
    if !text.is_empty() {
        p.push_str("<w:r>");
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                p.push_str("<w:br/>");
            }
            for (j, chunk) in line.trim_end_matches('\r').split('\t').enumerate() {
                if j > 0 {
                    p.push_str("<w:tab/>");
                }
                if !chunk.is_empty() {
                    p.push_str(&format!(
                        r#"<w:t xml:space="preserve">{}</w:t>"#,
                        escape_xml(chunk)
                    ));
                }
            }
        }
        p.push_str("</w:r>");
    }
    p.push_str("</w:p>");
    p
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// XML 1.0 `Char`: tab, LF, CR, and everything from U+0020 except U+FFFE/U+FFFF.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= '\u{20}' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

fn check_xml_chars(text: &str, page: usize) -> Result<(), AssemblyError> {
    match text.chars().find(|c| !is_xml_char(*c)) {
        Some(c) => Err(AssemblyError::InvalidCharacter {
            page,
            codepoint: c as u32,
        }),
        None => Ok(()),
    }
}
