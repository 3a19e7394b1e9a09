//! Form entry lists and the request bodies built from them.

use encoding_rs::Encoding;
use encoding_rs::UTF_8;
use url::form_urlencoded::byte_serialize;

const BOUNDARY_PREFIX: &str = "----PixelDustFormBoundary";
const BOUNDARY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789AB";

/// Body encodings a form can request through `enctype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormEncodingType {
    #[default]
    UrlEncoded,
    Multipart,
    TextPlain,
}

impl FormEncodingType {
    /// Unknown values fall back to urlencoded.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("multipart/form-data") {
            Self::Multipart
        } else if value.eq_ignore_ascii_case("text/plain") {
            Self::TextPlain
        } else {
            Self::UrlEncoded
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UrlEncoded => "application/x-www-form-urlencoded",
            Self::Multipart => "multipart/form-data",
            Self::TextPlain => "text/plain",
        }
    }
}

/// Value half of a form entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormDataValue {
    Text(Vec<u8>),
    File {
        filename: String,
        content_type: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDataEntry {
    pub name: Vec<u8>,
    pub value: FormDataValue,
}

/// Entries appended by form controls, already encoded in the submission charset.
#[derive(Debug, Clone)]
pub struct FormDataList {
    encoding: &'static Encoding,
    entries: Vec<FormDataEntry>,
}

impl FormDataList {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding: encoding.output_encoding(),
            entries: Vec::new(),
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn append_text(&mut self, name: &str, value: &str) {
        let name = self.encode(name);
        let value = self.encode(value);
        self.entries.push(FormDataEntry {
            name,
            value: FormDataValue::Text(value),
        });
    }

    pub fn append_file(&mut self, name: &str, filename: &str, content_type: &str) {
        let name = self.encode(name);
        self.entries.push(FormDataEntry {
            name,
            value: FormDataValue::File {
                filename: filename.to_owned(),
                content_type: content_type.to_owned(),
            },
        });
    }

    pub fn entries(&self) -> &[FormDataEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Unmappable characters become numeric character references.
    fn encode(&self, text: &str) -> Vec<u8> {
        let normalized = normalize_line_endings_to_crlf(text);
        let (bytes, _, _) = self.encoding.encode(&normalized);
        bytes.into_owned()
    }

    /// Builds a urlencoded or text/plain body.
    pub fn to_form_data(&self, encoding_type: FormEncodingType) -> FormData {
        let mut body = Vec::new();
        for entry in &self.entries {
            let value = match &entry.value {
                FormDataValue::Text(bytes) => bytes.clone(),
                FormDataValue::File { filename, .. } => self.encode(filename),
            };
            match encoding_type {
                FormEncodingType::TextPlain => {
                    if !body.is_empty() {
                        body.extend_from_slice(b"\r\n");
                    }
                    body.extend_from_slice(&entry.name);
                    body.push(b'=');
                    body.extend_from_slice(&value);
                }
                FormEncodingType::UrlEncoded | FormEncodingType::Multipart => {
                    if !body.is_empty() {
                        body.push(b'&');
                    }
                    encode_string_as_form_data(&mut body, &entry.name);
                    body.push(b'=');
                    encode_string_as_form_data(&mut body, &value);
                }
            }
        }
        FormData::from_bytes(body)
    }

    /// Builds a multipart body; `seed` makes the boundary reproducible.
    pub fn to_multipart_form_data(&self, seed: i64) -> FormData {
        let boundary = generate_boundary(seed);
        let mut form_data = FormData::new();
        let mut chunk = Vec::new();

        for entry in &self.entries {
            chunk.extend_from_slice(b"--");
            chunk.extend_from_slice(boundary.as_bytes());
            chunk.extend_from_slice(b"\r\nContent-Disposition: form-data; name=\"");
            chunk.extend_from_slice(&escape_multipart_name(&entry.name));
            chunk.push(b'"');

            match &entry.value {
                FormDataValue::Text(bytes) => {
                    chunk.extend_from_slice(b"\r\n\r\n");
                    chunk.extend_from_slice(bytes);
                }
                FormDataValue::File {
                    filename,
                    content_type,
                } => {
                    chunk.extend_from_slice(b"; filename=\"");
                    chunk.extend_from_slice(&escape_multipart_name(&self.encode(filename)));
                    chunk.extend_from_slice(b"\"\r\nContent-Type: ");
                    let content_type = if content_type.is_empty() {
                        "application/octet-stream"
                    } else {
                        content_type.as_str()
                    };
                    chunk.extend_from_slice(content_type.as_bytes());
                    chunk.extend_from_slice(b"\r\n\r\n");
                    form_data.append_data(&chunk);
                    chunk.clear();
                    if !filename.is_empty() {
                        form_data.append_file(filename);
                    }
                }
            }
            chunk.extend_from_slice(b"\r\n");
        }

        chunk.extend_from_slice(b"--");
        chunk.extend_from_slice(boundary.as_bytes());
        chunk.extend_from_slice(b"--\r\n");
        form_data.append_data(&chunk);
        form_data.boundary = Some(boundary);
        form_data
    }
}

/// One piece of a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormDataElement {
    Data(Vec<u8>),
    File { path: String },
}

/// Request body produced by a form or replayed from history.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormData {
    elements: Vec<FormDataElement>,
    identifier: i64,
    boundary: Option<String>,
    contains_password_data: bool,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mut form_data = Self::new();
        if !bytes.is_empty() {
            form_data.elements.push(FormDataElement::Data(bytes));
        }
        form_data
    }

    pub fn append_data(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let Some(FormDataElement::Data(existing)) = self.elements.last_mut() {
            existing.extend_from_slice(bytes);
            return;
        }
        self.elements.push(FormDataElement::Data(bytes.to_vec()));
    }

    pub fn append_file(&mut self, path: &str) {
        self.elements.push(FormDataElement::File {
            path: path.to_owned(),
        });
    }

    pub fn elements(&self) -> &[FormDataElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Concatenates the in-memory parts; file parts are skipped.
    pub fn flatten(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for element in &self.elements {
            if let FormDataElement::Data(data) = element {
                bytes.extend_from_slice(data);
            }
        }
        bytes
    }

    /// UTF-8 with a Latin-1 fallback for bodies in legacy charsets.
    pub fn flatten_to_string(&self) -> String {
        let bytes = self.flatten();
        match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(error) => error
                .into_bytes()
                .into_iter()
                .map(char::from)
                .collect(),
        }
    }

    pub fn identifier(&self) -> i64 {
        self.identifier
    }

    pub fn set_identifier(&mut self, identifier: i64) {
        self.identifier = identifier;
    }

    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    pub fn contains_password_data(&self) -> bool {
        self.contains_password_data
    }

    pub fn set_contains_password_data(&mut self, contains: bool) {
        self.contains_password_data = contains;
    }
}

/// application/x-www-form-urlencoded serialization of raw bytes.
pub fn encode_string_as_form_data(buffer: &mut Vec<u8>, bytes: &[u8]) {
    let normalized = normalize_bytes_to_crlf(bytes);
    for piece in byte_serialize(&normalized) {
        buffer.extend_from_slice(piece.as_bytes());
    }
}

/// Resolves `accept-charset` to the first label encoding_rs knows.
pub fn encoding_from_accept_charset(
    accept_charset: &str,
    input_encoding: Option<&'static Encoding>,
    default_charset: Option<&'static Encoding>,
) -> &'static Encoding {
    let normalized = accept_charset.replace(',', " ");
    for label in normalized.split_ascii_whitespace() {
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            return encoding;
        }
    }
    input_encoding.or(default_charset).unwrap_or(UTF_8)
}

pub fn generate_boundary(seed: i64) -> String {
    let mut state = (seed as u64) ^ 0x9E37_79B9_7F4A_7C15;
    if state == 0 {
        state = 0x2545_F491_4F6C_DD1D;
    }
    let mut boundary = String::with_capacity(BOUNDARY_PREFIX.len() + 16);
    boundary.push_str(BOUNDARY_PREFIX);
    for _ in 0..16 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let index = (state % BOUNDARY_ALPHABET.len() as u64) as usize;
        boundary.push(char::from(BOUNDARY_ALPHABET[index]));
    }
    boundary
}

fn escape_multipart_name(name: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(name.len());
    for &byte in name {
        match byte {
            b'"' => escaped.extend_from_slice(b"%22"),
            b'\r' => escaped.extend_from_slice(b"%0D"),
            b'\n' => escaped.extend_from_slice(b"%0A"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn normalize_line_endings_to_crlf(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                normalized.push_str("\r\n");
            }
            '\n' => normalized.push_str("\r\n"),
            other => normalized.push(other),
        }
    }
    normalized
}

fn normalize_bytes_to_crlf(bytes: &[u8]) -> Vec<u8> {
    let mut normalized = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'\r' => {
                if bytes.get(index + 1) == Some(&b'\n') {
                    index += 1;
                }
                normalized.extend_from_slice(b"\r\n");
            }
            b'\n' => normalized.extend_from_slice(b"\r\n"),
            other => normalized.push(other),
        }
        index += 1;
    }
    normalized
}
