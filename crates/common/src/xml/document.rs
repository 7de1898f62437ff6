use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: usize, message: String },

    #[error("document has no root element")]
    NoRoot,

    #[error("document is not valid UTF-8: {0}")]
    Encoding(String),
}

/// One element of the parsed tree. Namespace prefixes are stripped so
/// mapping source paths stay prefix-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn new(name: String, attributes: Vec<(String, String)>) -> Self {
        Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All elements matched by a slash-separated path relative to this
    /// element, in document order.
    pub fn select_all(&self, path: &str) -> Vec<&XmlElement> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Vec::new();
        }
        let mut current: Vec<&XmlElement> = vec![self];
        for segment in segments {
            current = current
                .iter()
                .flat_map(|element| element.children.iter())
                .filter(|child| child.name == segment)
                .collect();
        }
        current
    }

    /// First non-empty value at a path relative to this element. A trailing
    /// `@name` segment selects an attribute instead of element text. An
    /// element that exists but has no text counts as not found, so
    /// defaulting rules apply to it.
    pub fn first_text(&self, path: &str) -> Option<String> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return None;
        }

        let (element_segments, attribute) = match segments.last() {
            Some(last) if last.starts_with('@') => {
                (&segments[..segments.len() - 1], Some(&last[1..]))
            }
            _ => (&segments[..], None),
        };

        let mut current: Vec<&XmlElement> = vec![self];
        for segment in element_segments {
            current = current
                .iter()
                .flat_map(|element| element.children.iter())
                .filter(|child| child.name == *segment)
                .collect();
        }

        current.iter().find_map(|element| {
            let value = match attribute {
                Some(name) => element.attribute(name).map(str::trim),
                None => Some(element.text.trim()),
            };
            value.filter(|v| !v.is_empty()).map(str::to_string)
        })
    }
}

/// A parsed inbound document. Paths are evaluated relative to the root
/// element, so "Header/OrderNumber" addresses `<Root><Header><OrderNumber>`.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    pub fn parse(bytes: &[u8]) -> Result<XmlDocument, XmlError> {
        let content =
            std::str::from_utf8(bytes).map_err(|e| XmlError::Encoding(e.to_string()))?;

        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    let element = XmlElement::new(
                        local_name(start.name().as_ref()),
                        read_attributes(&start, &reader)?,
                    );
                    stack.push(element);
                }
                Ok(Event::Empty(start)) => {
                    let element = XmlElement::new(
                        local_name(start.name().as_ref()),
                        read_attributes(&start, &reader)?,
                    );
                    attach(&mut stack, &mut root, element);
                }
                Ok(Event::Text(text)) => {
                    if let Some(current) = stack.last_mut() {
                        let value = text.unescape().map_err(|e| XmlError::Malformed {
                            position: reader.buffer_position() as usize,
                            message: e.to_string(),
                        })?;
                        current.text.push_str(&value);
                    }
                }
                Ok(Event::CData(cdata)) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&cdata));
                    }
                }
                Ok(Event::End(_)) => {
                    let element = stack.pop().ok_or_else(|| XmlError::Malformed {
                        position: reader.buffer_position() as usize,
                        message: "unmatched closing tag".to_string(),
                    })?;
                    attach(&mut stack, &mut root, element);
                }
                Ok(Event::Eof) => break,
                Ok(_) => continue,
                Err(e) => {
                    return Err(XmlError::Malformed {
                        position: reader.buffer_position() as usize,
                        message: e.to_string(),
                    });
                }
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::Malformed {
                position: reader.buffer_position() as usize,
                message: "unclosed element".to_string(),
            });
        }

        root.map(|root| XmlDocument { root })
            .ok_or(XmlError::NoRoot)
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn first_text(&self, path: &str) -> Option<String> {
        self.root.first_text(path)
    }

    pub fn select_all(&self, path: &str) -> Vec<&XmlElement> {
        self.root.select_all(path)
    }
}

fn attach(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            // Only the first top-level element becomes the root.
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn local_name(qualified: &[u8]) -> String {
    let name = String::from_utf8_lossy(qualified);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.to_string(),
    }
}

fn read_attributes<R>(
    start: &quick_xml::events::BytesStart<'_>,
    reader: &Reader<R>,
) -> Result<Vec<(String, String)>, XmlError> {
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| XmlError::Malformed {
            position: reader.buffer_position() as usize,
            message: e.to_string(),
        })?;
        let value = attribute.unescape_value().map_err(|e| XmlError::Malformed {
            position: reader.buffer_position() as usize,
            message: e.to_string(),
        })?;
        attributes.push((local_name(attribute.key.as_ref()), value.to_string()));
    }
    Ok(attributes)
}
