//! TSDL metadata parsing.
//!
//! Covers the subset of TSDL that LTTng-UST writes: type aliases and
//! typedefs, the `trace`, `env`, `clock`, `stream` and `event` blocks, and
//! the integer, floating point, string, enum, struct, variant, array and
//! sequence types. `callsite` blocks are skipped.

use super::lexer::{tokenize, Token};
use crate::utils::error::TraceError;
use log::debug;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegerType {
    pub size: u32,
    pub align: u32,
    pub signed: bool,
    /// `None` means the trace's native byte order
    pub byte_order: Option<ByteOrder>,
    /// Encoded as characters (`encoding = UTF8`/`ASCII`)
    pub text: bool,
    /// Clock this integer is mapped to (`map = clock.<name>.value`)
    pub clock: Option<String>,
}

impl IntegerType {
    fn with_size(size: u32) -> Self {
        Self {
            size,
            align: if size % 8 == 0 { 8 } else { 1 },
            signed: false,
            byte_order: None,
            text: false,
            clock: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatType {
    pub exp_dig: u32,
    pub mant_dig: u32,
    pub align: u32,
    pub byte_order: Option<ByteOrder>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMapping {
    pub label: String,
    pub low: i64,
    pub high: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub container: IntegerType,
    pub mappings: Vec<EnumMapping>,
}

impl EnumType {
    pub fn label_for(&self, value: i64) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.low <= value && value <= m.high)
            .map(|m| m.label.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeDecl,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub fields: Vec<FieldDecl>,
    pub min_align: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantType {
    pub tag: Option<String>,
    pub options: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDecl {
    Integer(IntegerType),
    Float(FloatType),
    String,
    Enum(EnumType),
    Struct(StructType),
    Variant(VariantType),
    Array { element: Box<TypeDecl>, length: usize },
    Sequence { element: Box<TypeDecl>, length_ref: String },
}

impl TypeDecl {
    /// Alignment in bits required before decoding this type
    pub fn alignment(&self) -> u32 {
        match self {
            Self::Integer(int) => int.align,
            Self::Float(float) => float.align,
            Self::String => 8,
            Self::Enum(e) => e.container.align,
            Self::Struct(s) => s
                .fields
                .iter()
                .map(|f| f.ty.alignment())
                .fold(s.min_align.max(1), u32::max),
            // A variant is aligned by the option it selects
            Self::Variant(_) => 1,
            Self::Array { element, .. } | Self::Sequence { element, .. } => element.alignment(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClockClass {
    pub name: String,
    pub freq: u64,
    pub offset_s: i64,
    pub offset: i64,
}

impl Default for ClockClass {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            freq: 1_000_000_000,
            offset_s: 0,
            offset: 0,
        }
    }
}

impl ClockClass {
    /// Convert a raw cycle count to nanoseconds from the clock origin,
    /// `None` when the result does not fit in an `i64`
    pub fn cycles_to_ns(&self, cycles: u64) -> Option<i64> {
        let freq = i128::from(self.freq.max(1));
        let cycles = i128::from(cycles) + i128::from(self.offset);
        let ns = i128::from(self.offset_s) * 1_000_000_000 + cycles * 1_000_000_000 / freq;
        i64::try_from(ns).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamClass {
    pub id: u64,
    pub packet_context: Option<TypeDecl>,
    pub event_header: Option<TypeDecl>,
    pub event_context: Option<TypeDecl>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventClass {
    pub id: u64,
    pub stream_id: u64,
    pub name: String,
    pub context: Option<TypeDecl>,
    pub fields: Option<TypeDecl>,
}

/// Parsed trace metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub byte_order: ByteOrder,
    pub packet_header: Option<TypeDecl>,
    pub clocks: Vec<ClockClass>,
    pub env: BTreeMap<String, String>,
    pub streams: BTreeMap<u64, StreamClass>,
    /// Keyed by (stream id, event id)
    pub events: BTreeMap<(u64, u64), EventClass>,
}

impl Metadata {
    pub fn clock(&self, name: Option<&str>) -> Option<&ClockClass> {
        match name {
            Some(name) => self.clocks.iter().find(|c| c.name == name),
            None => self.clocks.first(),
        }
    }
}

/// Right-hand side of a `key = value;` entry
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i128),
    Str(String),
    Path(String),
}

impl Value {
    fn as_text(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Str(s) | Self::Path(s) => s.clone(),
        }
    }
}

enum Entry {
    Value(String, Value),
    Type(String, TypeDecl),
}

const TYPE_KEYWORDS: &[&str] = &["integer", "floating_point", "string", "struct", "variant", "enum"];

/// Parse TSDL source text into [`Metadata`]
pub fn parse_metadata(src: &str) -> Result<Metadata, TraceError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser::new(tokens);
    parser.parse_top_level()?;
    debug!(
        "Parsed metadata: {} stream classes, {} event classes, {} clocks",
        parser.meta.streams.len(),
        parser.meta.events.len(),
        parser.meta.clocks.len()
    );
    Ok(parser.meta)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    aliases: HashMap<String, TypeDecl>,
    structs: HashMap<String, StructType>,
    variants: HashMap<String, VariantType>,
    enums: HashMap<String, EnumType>,
    meta: Metadata,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            aliases: HashMap::new(),
            structs: HashMap::new(),
            variants: HashMap::new(),
            enums: HashMap::new(),
            meta: Metadata {
                byte_order: ByteOrder::Little,
                packet_header: None,
                clocks: Vec::new(),
                env: BTreeMap::new(),
                streams: BTreeMap::new(),
                events: BTreeMap::new(),
            },
        }
    }

    // --- token helpers ---

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead)
    }

    fn next(&mut self) -> Result<Token, TraceError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| TraceError::Metadata("unexpected end of metadata".to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn error(&self, expected: &str) -> TraceError {
        let found = self
            .peek()
            .map(Token::describe)
            .unwrap_or_else(|| "end of metadata".to_string());
        TraceError::Metadata(format!(
            "expected {} but found {} (token {})",
            expected, found, self.pos
        ))
    }

    fn is_punct(&self, c: char) -> bool {
        self.peek() == Some(&Token::Punct(c))
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.is_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), TraceError> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.error(&format!("'{}'", c)))
        }
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Ident(s)) => Some(s),
            _ => None,
        }
    }

    fn expect_ident(&mut self) -> Result<String, TraceError> {
        match self.peek() {
            Some(Token::Ident(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            _ => Err(self.error("identifier")),
        }
    }

    fn peek_is_type_keyword(&self) -> bool {
        self.peek_ident().is_some_and(|s| TYPE_KEYWORDS.contains(&s))
    }

    /// `ident ( '.' ident )*`
    fn parse_path(&mut self) -> Result<String, TraceError> {
        let mut path = self.expect_ident()?;
        while self.is_punct('.') {
            self.pos += 1;
            path.push('.');
            path.push_str(&self.expect_ident()?);
        }
        Ok(path)
    }

    fn parse_signed_int(&mut self) -> Result<i128, TraceError> {
        let negative = self.eat_punct('-');
        if !negative {
            self.eat_punct('+');
        }
        match self.next()? {
            Token::Int(v) => Ok(if negative { -v } else { v }),
            other => Err(TraceError::Metadata(format!(
                "expected integer but found {}",
                other.describe()
            ))),
        }
    }

    fn parse_value(&mut self) -> Result<Value, TraceError> {
        match self.peek() {
            Some(Token::Str(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(Value::Str(s))
            }
            Some(Token::Ident(_)) => Ok(Value::Path(self.parse_path()?)),
            Some(Token::Int(_)) | Some(Token::Punct('-')) | Some(Token::Punct('+')) => {
                Ok(Value::Int(self.parse_signed_int()?))
            }
            _ => Err(self.error("value")),
        }
    }

    // --- top level ---

    fn parse_top_level(&mut self) -> Result<(), TraceError> {
        while let Some(token) = self.peek() {
            let Token::Ident(keyword) = token else {
                return Err(self.error("top-level declaration"));
            };
            let keyword = keyword.clone();

            match keyword.as_str() {
                "typealias" => self.parse_typealias()?,
                "typedef" => self.parse_typedef()?,
                "trace" => self.parse_trace_block()?,
                "env" => self.parse_env_block()?,
                "clock" => self.parse_clock_block()?,
                "stream" => self.parse_stream_block()?,
                "event" => self.parse_event_block()?,
                "callsite" => {
                    self.pos += 1;
                    self.parse_block_entries()?;
                }
                k if TYPE_KEYWORDS.contains(&k) => {
                    // Named type definition, e.g. `struct packet_context { ... };`
                    self.parse_keyword_type()?;
                    self.expect_punct(';')?;
                }
                _ => return Err(self.error("top-level declaration")),
            }
        }
        Ok(())
    }

    /// `{ key = value; key := type; ... };`
    fn parse_block_entries(&mut self) -> Result<Vec<Entry>, TraceError> {
        self.expect_punct('{')?;
        let mut entries = Vec::new();
        while !self.eat_punct('}') {
            let key = self.parse_path()?;
            match self.next()? {
                Token::Punct('=') => {
                    let value = self.parse_value()?;
                    entries.push(Entry::Value(key, value));
                }
                Token::Assign => {
                    let ty = self.parse_type_reference()?;
                    entries.push(Entry::Type(key, ty));
                }
                other => {
                    return Err(TraceError::Metadata(format!(
                        "expected '=' or ':=' after '{}' but found {}",
                        key,
                        other.describe()
                    )))
                }
            }
            self.expect_punct(';')?;
        }
        self.expect_punct(';')?;
        Ok(entries)
    }

    fn parse_trace_block(&mut self) -> Result<(), TraceError> {
        self.pos += 1;
        for entry in self.parse_block_entries()? {
            match entry {
                Entry::Value(key, value) if key == "byte_order" => {
                    self.meta.byte_order = parse_byte_order(&value.as_text())?
                        .ok_or_else(|| {
                            TraceError::Metadata("trace byte_order cannot be native".to_string())
                        })?;
                }
                Entry::Value(key, value) if key == "major" => {
                    if value != Value::Int(1) {
                        return Err(TraceError::Metadata(format!(
                            "unsupported CTF major version {}",
                            value.as_text()
                        )));
                    }
                }
                Entry::Type(key, ty) if key == "packet.header" => {
                    self.meta.packet_header = Some(ty);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_env_block(&mut self) -> Result<(), TraceError> {
        self.pos += 1;
        for entry in self.parse_block_entries()? {
            if let Entry::Value(key, value) = entry {
                self.meta.env.insert(key, value.as_text());
            }
        }
        Ok(())
    }

    fn parse_clock_block(&mut self) -> Result<(), TraceError> {
        self.pos += 1;
        let mut clock = ClockClass::default();
        for entry in self.parse_block_entries()? {
            let Entry::Value(key, value) = entry else {
                continue;
            };
            match (key.as_str(), value) {
                ("name", v) => clock.name = v.as_text(),
                ("freq", Value::Int(v)) => clock.freq = int_attr(v, "freq")?,
                ("offset_s", Value::Int(v)) => clock.offset_s = int_attr(v, "offset_s")?,
                ("offset", Value::Int(v)) => clock.offset = int_attr(v, "offset")?,
                _ => {}
            }
        }
        if clock.freq == 0 {
            return Err(TraceError::Metadata(format!(
                "clock '{}' has zero frequency",
                clock.name
            )));
        }
        self.meta.clocks.push(clock);
        Ok(())
    }

    fn parse_stream_block(&mut self) -> Result<(), TraceError> {
        self.pos += 1;
        let mut stream = StreamClass::default();
        for entry in self.parse_block_entries()? {
            match entry {
                Entry::Value(key, Value::Int(v)) if key == "id" => stream.id = int_attr(v, "id")?,
                Entry::Type(key, ty) => match key.as_str() {
                    "packet.context" => stream.packet_context = Some(ty),
                    "event.header" => stream.event_header = Some(ty),
                    "event.context" => stream.event_context = Some(ty),
                    _ => {}
                },
                _ => {}
            }
        }
        self.meta.streams.insert(stream.id, stream);
        Ok(())
    }

    fn parse_event_block(&mut self) -> Result<(), TraceError> {
        self.pos += 1;
        let mut event = EventClass::default();
        for entry in self.parse_block_entries()? {
            match entry {
                Entry::Value(key, value) => match (key.as_str(), value) {
                    ("name", v) => event.name = v.as_text(),
                    ("id", Value::Int(v)) => event.id = int_attr(v, "id")?,
                    ("stream_id", Value::Int(v)) => event.stream_id = int_attr(v, "stream_id")?,
                    _ => {}
                },
                Entry::Type(key, ty) => match key.as_str() {
                    "fields" => event.fields = Some(ty),
                    "context" => event.context = Some(ty),
                    _ => {}
                },
            }
        }
        self.meta.events.insert((event.stream_id, event.id), event);
        Ok(())
    }

    // --- type declarations ---

    /// `typealias <type> := <name words>;`
    fn parse_typealias(&mut self) -> Result<(), TraceError> {
        self.pos += 1;
        let ty = if self.peek_is_type_keyword() {
            self.parse_keyword_type()?
        } else {
            let mut words = Vec::new();
            while let Some(Token::Ident(word)) = self.peek() {
                words.push(word.clone());
                self.pos += 1;
            }
            self.lookup_alias(&words.join(" "))?
        };
        if self.next()? != Token::Assign {
            return Err(TraceError::Metadata("expected ':=' in typealias".to_string()));
        }
        let mut words = Vec::new();
        while let Some(Token::Ident(word)) = self.peek() {
            words.push(word.clone());
            self.pos += 1;
        }
        if words.is_empty() {
            return Err(self.error("typealias name"));
        }
        self.expect_punct(';')?;
        self.aliases.insert(words.join(" "), ty);
        Ok(())
    }

    /// `typedef <type> <name>;`
    fn parse_typedef(&mut self) -> Result<(), TraceError> {
        self.pos += 1;
        let field = self.parse_field()?;
        self.expect_punct(';')?;
        self.aliases.insert(field.name, field.ty);
        Ok(())
    }

    fn lookup_alias(&self, name: &str) -> Result<TypeDecl, TraceError> {
        self.aliases
            .get(name)
            .cloned()
            .ok_or_else(|| TraceError::Metadata(format!("unknown type '{}'", name)))
    }

    /// A type in a position where no declarator follows (after `:=`)
    fn parse_type_reference(&mut self) -> Result<TypeDecl, TraceError> {
        if self.peek_is_type_keyword() {
            return self.parse_keyword_type();
        }
        let mut words = Vec::new();
        while let Some(Token::Ident(word)) = self.peek() {
            words.push(word.clone());
            self.pos += 1;
        }
        if words.is_empty() {
            return Err(self.error("type"));
        }
        self.lookup_alias(&words.join(" "))
    }

    fn parse_keyword_type(&mut self) -> Result<TypeDecl, TraceError> {
        let keyword = self.expect_ident()?;
        match keyword.as_str() {
            "integer" => Ok(TypeDecl::Integer(self.parse_integer_attrs()?)),
            "floating_point" => Ok(TypeDecl::Float(self.parse_float_attrs()?)),
            "string" => {
                if self.is_punct('{') {
                    // Only `encoding` is allowed here, and it does not change decoding
                    self.skip_braced()?;
                }
                Ok(TypeDecl::String)
            }
            "struct" => Ok(TypeDecl::Struct(self.parse_struct()?)),
            "variant" => Ok(TypeDecl::Variant(self.parse_variant()?)),
            "enum" => Ok(TypeDecl::Enum(self.parse_enum()?)),
            other => Err(TraceError::Metadata(format!("unknown type keyword '{}'", other))),
        }
    }

    fn skip_braced(&mut self) -> Result<(), TraceError> {
        self.expect_punct('{')?;
        let mut depth = 1;
        while depth > 0 {
            match self.next()? {
                Token::Punct('{') => depth += 1,
                Token::Punct('}') => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// `{ attr = value; ... }` as a flat list
    fn parse_attrs(&mut self) -> Result<Vec<(String, Value)>, TraceError> {
        self.expect_punct('{')?;
        let mut attrs = Vec::new();
        while !self.eat_punct('}') {
            let key = self.expect_ident()?;
            self.expect_punct('=')?;
            let value = self.parse_value()?;
            self.expect_punct(';')?;
            attrs.push((key, value));
        }
        Ok(attrs)
    }

    fn parse_integer_attrs(&mut self) -> Result<IntegerType, TraceError> {
        let mut size = None;
        let mut align = None;
        let mut int = IntegerType::with_size(0);

        for (key, value) in self.parse_attrs()? {
            match key.as_str() {
                "size" => size = Some(uint_value(&value, "size")?),
                "align" => align = Some(uint_value(&value, "align")?),
                "signed" => int.signed = bool_value(&value)?,
                "byte_order" => int.byte_order = parse_byte_order(&value.as_text())?,
                "encoding" => {
                    int.text = !value.as_text().eq_ignore_ascii_case("none");
                }
                "map" => int.clock = clock_name_from_map(&value.as_text()),
                _ => {}
            }
        }

        let size = size.ok_or_else(|| TraceError::Metadata("integer without size".to_string()))?;
        if size == 0 || size > 64 {
            return Err(TraceError::Metadata(format!(
                "unsupported integer size {}",
                size
            )));
        }
        int.size = size;
        int.align = align.unwrap_or(if size % 8 == 0 { 8 } else { 1 });
        Ok(int)
    }

    fn parse_float_attrs(&mut self) -> Result<FloatType, TraceError> {
        let mut float = FloatType {
            exp_dig: 0,
            mant_dig: 0,
            align: 8,
            byte_order: None,
        };
        for (key, value) in self.parse_attrs()? {
            match key.as_str() {
                "exp_dig" => float.exp_dig = uint_value(&value, "exp_dig")?,
                "mant_dig" => float.mant_dig = uint_value(&value, "mant_dig")?,
                "align" => float.align = uint_value(&value, "align")?,
                "byte_order" => float.byte_order = parse_byte_order(&value.as_text())?,
                _ => {}
            }
        }
        match (float.exp_dig, float.mant_dig) {
            (8, 24) | (11, 53) => Ok(float),
            (e, m) => Err(TraceError::Metadata(format!(
                "unsupported floating point layout exp_dig={} mant_dig={}",
                e, m
            ))),
        }
    }

    /// `struct [name] [{ fields }] [align(n)]`
    fn parse_struct(&mut self) -> Result<StructType, TraceError> {
        let name = if !self.is_punct('{') && self.peek_ident().is_some() {
            Some(self.expect_ident()?)
        } else {
            None
        };

        let mut st = if self.is_punct('{') {
            self.pos += 1;
            let mut fields = Vec::new();
            while !self.eat_punct('}') {
                if self.peek_ident() == Some("typealias") {
                    self.parse_typealias()?;
                    continue;
                }
                fields.push(self.parse_field()?);
                self.expect_punct(';')?;
            }
            StructType {
                fields,
                min_align: 1,
            }
        } else {
            let name = name
                .as_deref()
                .ok_or_else(|| self.error("struct name or body"))?;
            self.structs
                .get(name)
                .cloned()
                .ok_or_else(|| TraceError::Metadata(format!("unknown struct '{}'", name)))?
        };

        if self.peek_ident() == Some("align") && self.peek_at(1) == Some(&Token::Punct('(')) {
            self.pos += 2;
            let align = self.parse_signed_int()?;
            self.expect_punct(')')?;
            st.min_align = int_attr(align, "align")?;
        }

        if let Some(name) = name {
            self.structs.entry(name).or_insert_with(|| st.clone());
        }
        Ok(st)
    }

    /// `variant [name] [<tag>] [{ options }]`
    fn parse_variant(&mut self) -> Result<VariantType, TraceError> {
        let name = if self.peek_ident().is_some() {
            Some(self.expect_ident()?)
        } else {
            None
        };

        let tag = if self.eat_punct('<') {
            let tag = self.parse_path()?;
            self.expect_punct('>')?;
            Some(tag)
        } else {
            None
        };

        let options = if self.is_punct('{') {
            self.pos += 1;
            let mut options = Vec::new();
            while !self.eat_punct('}') {
                options.push(self.parse_field()?);
                self.expect_punct(';')?;
            }
            options
        } else {
            let name = name
                .as_deref()
                .ok_or_else(|| self.error("variant name or body"))?;
            self.variants
                .get(name)
                .map(|v| v.options.clone())
                .ok_or_else(|| TraceError::Metadata(format!("unknown variant '{}'", name)))?
        };

        let variant = VariantType { tag, options };
        if let Some(name) = name {
            self.variants.entry(name).or_insert_with(|| variant.clone());
        }
        Ok(variant)
    }

    /// `enum [name] [: container] [{ label [= v [... w]], ... }]`
    fn parse_enum(&mut self) -> Result<EnumType, TraceError> {
        let name = if self.peek_ident().is_some() {
            Some(self.expect_ident()?)
        } else {
            None
        };

        let container = if self.eat_punct(':') {
            let ty = self.parse_type_reference()?;
            match ty {
                TypeDecl::Integer(int) => int,
                _ => {
                    return Err(TraceError::Metadata(
                        "enum container must be an integer".to_string(),
                    ))
                }
            }
        } else {
            match self.aliases.get("int") {
                Some(TypeDecl::Integer(int)) => int.clone(),
                _ => IntegerType {
                    signed: true,
                    ..IntegerType::with_size(32)
                },
            }
        };

        if !self.is_punct('{') {
            let name = name.as_deref().ok_or_else(|| self.error("enum name or body"))?;
            return self
                .enums
                .get(name)
                .cloned()
                .ok_or_else(|| TraceError::Metadata(format!("unknown enum '{}'", name)));
        }

        self.pos += 1;
        let mut mappings = Vec::new();
        let mut next_value: i64 = 0;
        while !self.eat_punct('}') {
            let label = match self.next()? {
                Token::Ident(s) | Token::Str(s) => s,
                other => {
                    return Err(TraceError::Metadata(format!(
                        "expected enum label but found {}",
                        other.describe()
                    )))
                }
            };
            let (low, high) = if self.eat_punct('=') {
                let low = int_attr(self.parse_signed_int()?, "enum value")?;
                let high = if self.peek() == Some(&Token::Ellipsis) {
                    self.pos += 1;
                    int_attr(self.parse_signed_int()?, "enum value")?
                } else {
                    low
                };
                (low, high)
            } else {
                (next_value, next_value)
            };
            next_value = high.saturating_add(1);
            mappings.push(EnumMapping { label, low, high });

            if !self.eat_punct(',') && !self.is_punct('}') {
                return Err(self.error("',' or '}' in enum"));
            }
        }

        let en = EnumType {
            container,
            mappings,
        };
        if let Some(name) = name {
            self.enums.entry(name).or_insert_with(|| en.clone());
        }
        Ok(en)
    }

    /// `<type> <name> ([len])*` inside a struct, variant or typedef
    fn parse_field(&mut self) -> Result<FieldDecl, TraceError> {
        let (mut ty, name) = if self.peek_is_type_keyword() {
            let ty = self.parse_keyword_type()?;
            (ty, self.expect_ident()?)
        } else {
            let mut words = Vec::new();
            while let Some(Token::Ident(word)) = self.peek() {
                words.push(word.clone());
                self.pos += 1;
            }
            if words.len() < 2 {
                return Err(self.error("field type and name"));
            }
            let name = words.pop().unwrap_or_default();
            (self.lookup_alias(&words.join(" "))?, name)
        };

        let mut lengths = Vec::new();
        while self.eat_punct('[') {
            let length = match self.peek() {
                Some(Token::Int(_)) => {
                    ArrayLength::Fixed(int_attr(self.parse_signed_int()?, "array length")?)
                }
                Some(Token::Ident(_)) => ArrayLength::Field(self.parse_path()?),
                _ => return Err(self.error("array length")),
            };
            self.expect_punct(']')?;
            lengths.push(length);
        }
        for length in lengths.into_iter().rev() {
            ty = match length {
                ArrayLength::Fixed(length) => TypeDecl::Array {
                    element: Box::new(ty),
                    length,
                },
                ArrayLength::Field(length_ref) => TypeDecl::Sequence {
                    element: Box::new(ty),
                    length_ref,
                },
            };
        }

        Ok(FieldDecl { name, ty })
    }
}

enum ArrayLength {
    Fixed(usize),
    Field(String),
}

fn int_attr<T: TryFrom<i128>>(value: i128, what: &str) -> Result<T, TraceError> {
    T::try_from(value)
        .map_err(|_| TraceError::Metadata(format!("{} value {} is out of range", what, value)))
}

fn uint_value(value: &Value, what: &str) -> Result<u32, TraceError> {
    match value {
        Value::Int(v) => int_attr(*v, what),
        other => Err(TraceError::Metadata(format!(
            "{} must be an integer, found '{}'",
            what,
            other.as_text()
        ))),
    }
}

fn bool_value(value: &Value) -> Result<bool, TraceError> {
    match value {
        Value::Int(v) => Ok(*v != 0),
        Value::Path(s) | Value::Str(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(TraceError::Metadata(format!("invalid boolean '{}'", s))),
        },
    }
}

/// `None` for native byte order
fn parse_byte_order(text: &str) -> Result<Option<ByteOrder>, TraceError> {
    match text {
        "le" | "little" => Ok(Some(ByteOrder::Little)),
        "be" | "big" | "network" => Ok(Some(ByteOrder::Big)),
        "native" => Ok(None),
        other => Err(TraceError::Metadata(format!("invalid byte order '{}'", other))),
    }
}

/// `clock.monotonic.value` -> `monotonic`
fn clock_name_from_map(path: &str) -> Option<String> {
    let mut parts = path.split('.');
    match (parts.next(), parts.next()) {
        (Some("clock"), Some(name)) => Some(name.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LTTNG_METADATA: &str = r#"
/* CTF 1.8 */
typealias integer { size = 8; align = 8; signed = false; } := uint8_t;
typealias integer { size = 32; align = 8; signed = false; } := uint32_t;
typealias integer { size = 64; align = 8; signed = false; } := uint64_t;
typealias integer { size = 64; align = 8; signed = false; } := unsigned long;
typealias integer { size = 5; align = 1; signed = false; } := uint5_t;

trace {
    major = 1;
    minor = 8;
    uuid = "2a6422d0-6cee-11e0-8c08-cb07d7b3a564";
    byte_order = le;
    packet.header := struct {
        uint32_t magic;
        uint8_t  uuid[16];
        uint32_t stream_id;
        uint64_t stream_instance_id;
    };
};

env {
    hostname = "bench";
    tracer_name = "lttng-ust";
    tracer_major = 2;
};

clock {
    name = "monotonic";
    freq = 1000000000; /* Frequency, in Hz */
    offset_s = 1556046234;
    offset = 123;
};

typealias integer {
    size = 27; align = 1; signed = false;
    map = clock.monotonic.value;
} := uint27_clock_monotonic_t;

typealias integer {
    size = 64; align = 8; signed = false;
    map = clock.monotonic.value;
} := uint64_clock_monotonic_t;

struct packet_context {
    uint64_clock_monotonic_t timestamp_begin;
    uint64_clock_monotonic_t timestamp_end;
    uint64_t content_size;
    uint64_t packet_size;
    unsigned long events_discarded;
    uint32_t cpu_id;
};

struct event_header_compact {
    enum : uint5_t { compact = 0 ... 30, extended = 31 } id;
    variant <id> {
        struct {
            uint27_clock_monotonic_t timestamp;
        } compact;
        struct {
            uint32_t id;
            uint64_clock_monotonic_t timestamp;
        } extended;
    } v;
} align(8);

stream {
    id = 0;
    event.header := struct event_header_compact;
    packet.context := struct packet_context;
};

event {
    name = "HPX:chunk_start";
    id = 0;
    stream_id = 0;
    loglevel = 13;
    fields := struct {
        integer { size = 64; align = 8; signed = 0; encoding = none; base = 10; } _start_ofs;
        integer { size = 64; align = 8; signed = 0; encoding = none; base = 10; } _stop_ofs;
        integer { size = 32; align = 8; signed = 1; encoding = none; base = 10; } _stage;
    };
};

event {
    name = "HPX_ALG:benchmark_exe_stop";
    id = 1;
    stream_id = 0;
    fields := struct { };
};
"#;

    #[test]
    fn test_parse_lttng_metadata() {
        let meta = parse_metadata(LTTNG_METADATA).unwrap();

        assert_eq!(meta.byte_order, ByteOrder::Little);
        assert_eq!(meta.env.get("hostname").map(String::as_str), Some("bench"));
        assert_eq!(meta.clocks.len(), 1);
        assert_eq!(meta.clocks[0].name, "monotonic");
        assert_eq!(meta.clocks[0].offset_s, 1_556_046_234);

        let stream = &meta.streams[&0];
        assert!(stream.packet_context.is_some());
        let Some(TypeDecl::Struct(header)) = &stream.event_header else {
            panic!("event header should be a struct");
        };
        assert_eq!(header.min_align, 8);
        assert_eq!(header.fields[0].name, "id");
        assert!(matches!(header.fields[1].ty, TypeDecl::Variant(_)));

        let event = &meta.events[&(0, 0)];
        assert_eq!(event.name, "HPX:chunk_start");
        let Some(TypeDecl::Struct(fields)) = &event.fields else {
            panic!("fields should be a struct");
        };
        assert_eq!(fields.fields.len(), 3);
        assert_eq!(fields.fields[2].name, "_stage");
        assert!(matches!(&fields.fields[2].ty, TypeDecl::Integer(int) if int.signed));

        assert_eq!(meta.events[&(0, 1)].name, "HPX_ALG:benchmark_exe_stop");
    }

    #[test]
    fn test_packet_header_array() {
        let meta = parse_metadata(LTTNG_METADATA).unwrap();
        let Some(TypeDecl::Struct(header)) = &meta.packet_header else {
            panic!("packet header should be a struct");
        };
        assert!(matches!(
            &header.fields[1].ty,
            TypeDecl::Array { length: 16, .. }
        ));
    }

    #[test]
    fn test_clock_mapping_on_alias() {
        let meta = parse_metadata(LTTNG_METADATA).unwrap();
        let Some(TypeDecl::Struct(ctx)) = &meta.streams[&0].packet_context else {
            panic!("packet context should be a struct");
        };
        let TypeDecl::Integer(ts) = &ctx.fields[0].ty else {
            panic!("timestamp_begin should be an integer");
        };
        assert_eq!(ts.clock.as_deref(), Some("monotonic"));
        assert_eq!(ts.size, 64);
    }

    #[test]
    fn test_enum_auto_increment_and_negative() {
        let meta = parse_metadata(
            r#"
            typealias integer { size = 8; signed = true; } := int8_t;
            enum state : int8_t { idle, busy, error = -1, "quoted label" = 10 ... 12, };
            typealias enum state := state_t;
            event { name = "e"; fields := struct { state_t _s; }; };
            "#,
        )
        .unwrap();

        let Some(TypeDecl::Struct(fields)) = &meta.events[&(0, 0)].fields else {
            panic!("fields should be a struct");
        };
        let TypeDecl::Enum(en) = &fields.fields[0].ty else {
            panic!("field should be an enum");
        };
        assert!(en.container.signed);
        assert_eq!(en.label_for(0), Some("idle"));
        assert_eq!(en.label_for(1), Some("busy"));
        assert_eq!(en.label_for(-1), Some("error"));
        assert_eq!(en.label_for(11), Some("quoted label"));
        assert_eq!(en.label_for(5), None);
    }

    #[test]
    fn test_enum_labels() {
        let en = EnumType {
            container: IntegerType::with_size(5),
            mappings: vec![
                EnumMapping { label: "compact".into(), low: 0, high: 30 },
                EnumMapping { label: "extended".into(), low: 31, high: 31 },
            ],
        };
        assert_eq!(en.label_for(7), Some("compact"));
        assert_eq!(en.label_for(31), Some("extended"));
        assert_eq!(en.label_for(32), None);
    }

    #[test]
    fn test_sequence_field() {
        let meta = parse_metadata(
            r#"
            typealias integer { size = 8; align = 8; signed = false; } := uint8_t;
            typealias integer { size = 32; align = 8; signed = false; } := uint32_t;
            trace { major = 1; minor = 8; byte_order = be; };
            event {
                name = "blob";
                fields := struct {
                    uint32_t _len;
                    uint8_t _data[_len];
                    string _msg;
                };
            };
            "#,
        )
        .unwrap();

        assert_eq!(meta.byte_order, ByteOrder::Big);
        let Some(TypeDecl::Struct(fields)) = &meta.events[&(0, 0)].fields else {
            panic!("fields should be a struct");
        };
        assert!(matches!(
            &fields.fields[1].ty,
            TypeDecl::Sequence { length_ref, .. } if length_ref == "_len"
        ));
        assert_eq!(fields.fields[2].ty, TypeDecl::String);
    }

    #[test]
    fn test_unknown_type_is_error() {
        let result = parse_metadata("event { name = \"x\"; fields := struct { mystery_t _a; }; };");
        assert!(matches!(result, Err(TraceError::Metadata(_))));
    }

    #[test]
    fn test_clock_conversion() {
        let clock = ClockClass {
            name: "monotonic".into(),
            freq: 1_000_000_000,
            offset_s: 10,
            offset: 5,
        };
        assert_eq!(clock.cycles_to_ns(100), Some(10_000_000_105));

        let slow = ClockClass {
            freq: 1_000,
            offset_s: 0,
            offset: 0,
            ..clock
        };
        assert_eq!(slow.cycles_to_ns(3), Some(3_000_000));

        let far = ClockClass {
            offset_s: 9_300_000_000,
            ..slow
        };
        assert_eq!(far.cycles_to_ns(0), None);
    }
}
