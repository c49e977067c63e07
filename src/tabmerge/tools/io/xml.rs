use std::fs;
use std::io::Write;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;

use crate::tabmerge::tools::error::{Result, ToolError};
use crate::tabmerge::tools::io::write_atomically;
use crate::tabmerge::tools::merge::DEFAULT_MAX_DEPTH;
use crate::tabmerge::tools::model::{Declaration, Document, Element};

const INDENT: &str = "  ";
const UTF8_LABELS: [&str; 4] = ["utf-8", "utf8", "us-ascii", "ascii"];

/// Loads the XML document stored at `path`, nested at most
/// [`DEFAULT_MAX_DEPTH`] elements deep.
pub fn read_document(path: &Path) -> Result<Document> {
    read_document_within(path, DEFAULT_MAX_DEPTH)
}

/// Loads the XML document stored at `path`, rejecting trees nested deeper
/// than `max_depth` elements.
pub fn read_document_within(path: &Path, max_depth: usize) -> Result<Document> {
    let bytes = fs::read(path)?;
    let source = String::from_utf8(bytes).map_err(|err| {
        ToolError::Format(format!("{} is not valid UTF-8: {err}", path.display()))
    })?;
    let document = parse_document_within(&source, max_depth)?;
    debug!(
        path = %path.display(),
        element_count = document.root.count(),
        "XML document loaded"
    );
    Ok(document)
}

/// Parses XML text into a [`Document`].
///
/// Whitespace-only text between child elements is dropped, text of elements
/// with children is trimmed, and leaf text is kept verbatim. Comments and
/// processing instructions are discarded.
pub fn parse_document(source: &str) -> Result<Document> {
    parse_document_within(source, DEFAULT_MAX_DEPTH)
}

/// Parses XML text like [`parse_document`] with an explicit nesting limit.
///
/// A lone root has depth 1. Deeper trees fail with
/// [`ToolError::DepthExceeded`] while reading, before they are built.
pub fn parse_document_within(source: &str, max_depth: usize) -> Result<Document> {
    let mut reader = Reader::from_str(source);
    let mut declaration: Option<Declaration> = None;
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Decl(decl) => {
                declaration = Some(parse_declaration(&decl)?);
            }
            Event::Start(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err(ToolError::Format("document has more than one root element".into()));
                }
                check_depth(&stack, max_depth)?;
                stack.push(Frame::new(element_from_start(&start)?));
            }
            Event::Empty(start) => {
                check_depth(&stack, max_depth)?;
                let element = element_from_start(&start)?;
                attach(element, &mut stack, &mut root)?;
            }
            Event::End(end) => {
                let frame = stack.pop().ok_or_else(|| {
                    ToolError::Format("closing tag without a matching opening tag".into())
                })?;
                let qname = end.name();
                let name = utf8(qname.as_ref())?;
                if name != frame.element.tag {
                    return Err(ToolError::Format(format!(
                        "expected </{}> but found </{name}>",
                        frame.element.tag
                    )));
                }
                attach(frame.finish(), &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(malformed)?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(cdata) => {
                let text = utf8(&cdata)?;
                push_text(&mut stack, text)?;
            }
            Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(ToolError::Format(format!(
            "unclosed element <{}>",
            open.element.tag
        )));
    }

    let root = root.ok_or_else(|| ToolError::Format("document has no root element".into()))?;
    Ok(Document {
        declaration: declaration.unwrap_or_default(),
        root,
    })
}

/// Serialises `document` to `path`, replacing the file only after the whole
/// document was written.
pub fn write_document(path: &Path, document: &Document) -> Result<()> {
    write_atomically(path, |sink| write_document_to(sink, document))
}

/// Serialises `document` into a string.
pub fn document_to_string(document: &Document) -> Result<String> {
    let mut buffer = Vec::new();
    write_document_to(&mut buffer, document)?;
    String::from_utf8(buffer).map_err(|err| ToolError::Format(err.to_string()))
}

/// Serialises `document` into `sink`: declaration first, then one element per
/// line indented by two spaces, leaf text inline.
pub fn write_document_to<W: Write>(sink: W, document: &Document) -> Result<()> {
    let mut writer = Writer::new(sink);
    let declaration = &document.declaration;
    writer.write_event(Event::Decl(BytesDecl::new(
        &declaration.version,
        declaration.encoding.as_deref(),
        declaration.standalone.as_deref(),
    )))?;
    write_indent(&mut writer, 0)?;
    write_element(&mut writer, &document.root, 0)?;
    writer.get_mut().write_all(b"\n")?;
    Ok(())
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element, depth: usize) -> Result<()> {
    let mut start = BytesStart::new(element.tag.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        match element.text.as_deref() {
            None => writer.write_event(Event::Empty(start))?,
            Some(text) => {
                writer.write_event(Event::Start(start))?;
                if !text.is_empty() {
                    writer.write_event(Event::Text(BytesText::new(text)))?;
                }
                writer.write_event(Event::End(BytesEnd::new(element.tag.as_str())))?;
            }
        }
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(text) = element.text.as_deref().map(str::trim).filter(|text| !text.is_empty()) {
        write_indent(writer, depth + 1)?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in &element.children {
        write_indent(writer, depth + 1)?;
        write_element(writer, child, depth + 1)?;
    }
    write_indent(writer, depth)?;
    writer.write_event(Event::End(BytesEnd::new(element.tag.as_str())))?;
    Ok(())
}

fn write_indent<W: Write>(writer: &mut Writer<W>, depth: usize) -> Result<()> {
    let sink = writer.get_mut();
    sink.write_all(b"\n")?;
    for _ in 0..depth {
        sink.write_all(INDENT.as_bytes())?;
    }
    Ok(())
}

/// Element under construction together with the text collected so far.
struct Frame {
    element: Element,
    text: String,
}

impl Frame {
    fn new(element: Element) -> Self {
        Self {
            element,
            text: String::new(),
        }
    }

    fn finish(mut self) -> Element {
        if self.element.children.is_empty() {
            self.element.text = Some(self.text);
        } else {
            let trimmed = self.text.trim();
            if !trimmed.is_empty() {
                self.element.text = Some(trimmed.to_string());
            }
        }
        self.element
    }
}

fn attach(element: Element, stack: &mut [Frame], root: &mut Option<Element>) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.element.children.push(element);
            Ok(())
        }
        None if root.is_some() => Err(ToolError::Format(
            "document has more than one root element".into(),
        )),
        None => {
            *root = Some(element);
            Ok(())
        }
    }
}

fn check_depth(stack: &[Frame], max_depth: usize) -> Result<()> {
    if stack.len() >= max_depth {
        return Err(ToolError::DepthExceeded { limit: max_depth });
    }
    Ok(())
}

fn push_text(stack: &mut [Frame], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(frame) => {
            frame.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(ToolError::Format(format!(
            "text outside the root element: '{}'",
            text.trim()
        ))),
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(utf8(start.name().as_ref())?);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(malformed)?;
        let key = utf8(attribute.key.as_ref())?.to_string();
        let value = attribute.unescape_value().map_err(malformed)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn parse_declaration(decl: &BytesDecl<'_>) -> Result<Declaration> {
    let version = decl.version().map_err(malformed)?;
    let version = utf8(&version)?.to_string();
    let encoding = match decl.encoding() {
        Some(label) => Some(utf8(&label.map_err(malformed)?)?.to_string()),
        None => None,
    };
    let standalone = match decl.standalone() {
        Some(flag) => Some(utf8(&flag.map_err(malformed)?)?.to_string()),
        None => None,
    };

    if let Some(label) = &encoding {
        if !UTF8_LABELS.contains(&label.to_ascii_lowercase().as_str()) {
            return Err(ToolError::Format(format!(
                "unsupported document encoding '{label}'; only UTF-8 is accepted"
            )));
        }
    }

    Ok(Declaration {
        version,
        encoding,
        standalone,
    })
}

fn malformed(err: impl std::fmt::Display) -> ToolError {
    ToolError::Format(err.to_string())
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|err| ToolError::Format(err.to_string()))
}
