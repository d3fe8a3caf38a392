//! Fonts for generated PDFs
//!
//! Two kinds of font exist. Built-in Helvetica, one of the PDF standard 14
//! fonts, needs no embedding and is written with WinAnsiEncoding, one byte
//! per character. Text outside that code page is rejected rather than
//! substituted. An embedded TrueType program is written as a Type0 font with
//! Identity-H encoding: each character becomes its two-byte glyph id from the
//! font's `cmap`, read with `ttf-parser`, and a ToUnicode CMap maps the glyph
//! ids back to text so the result stays searchable and extractable.

use crate::error::ConvertError;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

pub const FIRST_CHAR: u8 = 32;
pub const LAST_CHAR: u8 = 255;

/// Entries per `beginbfchar` block; the CMap format caps it at 100.
const BFCHAR_BLOCK: usize = 100;

/// Characters listed in an unsupported-text error before it is cut short.
const MAX_REPORTED_CHARS: usize = 12;

/// Helvetica advance widths (1/1000 em) for codes 32..=126, from the AFM.
const HELVETICA_ASCII_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

/// Code points of WinAnsiEncoding bytes 0x80..=0x9F (0 marks undefined codes).
const WIN_ANSI_HIGH: [u32; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

/// Map a character to its WinAnsiEncoding byte.
pub fn win_ansi_byte(ch: char) -> Option<u8> {
    match ch as u32 {
        0x20..=0x7E | 0xA0..=0xFF => Some(ch as u32 as u8),
        cp => WIN_ANSI_HIGH
            .iter()
            .position(|&mapped| mapped != 0 && mapped == cp)
            .map(|i| 0x80 + i as u8),
    }
}

/// Inverse of [`win_ansi_byte`].
pub fn win_ansi_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as char),
        0x80..=0x9F => match WIN_ANSI_HIGH[(code - 0x80) as usize] {
            0 => None,
            cp => char::from_u32(cp),
        },
        _ => None,
    }
}

fn helvetica_width(code: u8) -> u16 {
    match code {
        32..=126 => HELVETICA_ASCII_WIDTHS[(code - 32) as usize],
        0xA0 => 278,
        0x91 | 0x92 | 0x82 => 222,
        0x93 | 0x94 | 0x84 => 333,
        0x95 => 350,
        0x85 | 0x89 | 0x97 => 1000,
        _ => 556,
    }
}

/// Characters that end up on a drawn line. Line breaks are dropped and tabs
/// are laid out as a single space.
fn drawn_chars(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .map(|c| if c == '\t' { ' ' } else { c })
}

#[derive(Debug, Clone, Copy)]
struct Glyph {
    id: u16,
    /// Advance width in 1/1000 em
    width: u16,
}

/// A TrueType program plus the metrics needed to reference it.
#[derive(Debug, Clone)]
struct EmbeddedProgram {
    data: Vec<u8>,
    glyphs: HashMap<char, Glyph>,
    notdef_width: u16,
    ascent: i64,
    descent: i64,
    cap_height: i64,
    bbox: [i64; 4],
}

#[derive(Debug, Clone)]
enum FontKind {
    /// Widths in 1/1000 em for codes FIRST_CHAR..=LAST_CHAR
    Builtin { widths: Vec<u16> },
    Embedded(EmbeddedProgram),
}

/// A font usable for laying out and drawing text.
#[derive(Debug, Clone)]
pub struct PdfFont {
    base_font: String,
    kind: FontKind,
}

impl PdfFont {
    /// Standard-14 Helvetica. Always available, never embedded.
    pub fn helvetica() -> Self {
        Self {
            base_font: "Helvetica".to_string(),
            kind: FontKind::Builtin {
                widths: (FIRST_CHAR..=LAST_CHAR).map(helvetica_width).collect(),
            },
        }
    }

    /// Build a font from a TrueType/OpenType (glyf) program.
    pub fn from_truetype(data: Vec<u8>, name: &str) -> Result<Self, ConvertError> {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|e| ConvertError::InvalidFont(e.to_string()))?;

        let units_per_em = face.units_per_em() as i64;
        let scale = |v: i64| v * 1000 / units_per_em;
        let advance = |glyph: ttf_parser::GlyphId| {
            face.glyph_hor_advance(glyph)
                .map(|a| scale(a as i64).clamp(0, u16::MAX as i64) as u16)
                .unwrap_or(0)
        };

        let mut glyphs = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|code_point| {
                    let Some(ch) = char::from_u32(code_point) else {
                        return;
                    };
                    if glyphs.contains_key(&ch) {
                        return;
                    }
                    if let Some(glyph) = subtable.glyph_index(code_point) {
                        if glyph.0 != 0 {
                            glyphs.insert(
                                ch,
                                Glyph {
                                    id: glyph.0,
                                    width: advance(glyph),
                                },
                            );
                        }
                    }
                });
            }
        }
        if glyphs.is_empty() {
            return Err(ConvertError::InvalidFont(
                "font has no Unicode character map".into(),
            ));
        }

        let bbox = face.global_bounding_box();
        let ascent = scale(face.ascender() as i64);
        let descent = scale(face.descender() as i64);
        let cap_height = face
            .capital_height()
            .map(|h| scale(h as i64))
            .unwrap_or(ascent);
        let bbox = [
            scale(bbox.x_min as i64),
            scale(bbox.y_min as i64),
            scale(bbox.x_max as i64),
            scale(bbox.y_max as i64),
        ];
        let notdef_width = advance(ttf_parser::GlyphId(0));

        let base_font: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();

        Ok(Self {
            base_font: if base_font.is_empty() {
                "EmbeddedFont".to_string()
            } else {
                base_font
            },
            kind: FontKind::Embedded(EmbeddedProgram {
                data,
                glyphs,
                notdef_width,
                ascent,
                descent,
                cap_height,
                bbox,
            }),
        })
    }

    pub fn base_font(&self) -> &str {
        &self.base_font
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.kind, FontKind::Embedded(_))
    }

    fn supports(&self, ch: char) -> bool {
        match &self.kind {
            FontKind::Builtin { .. } => win_ansi_byte(ch).is_some(),
            FontKind::Embedded(program) => program.glyphs.contains_key(&ch),
        }
    }

    /// Distinct characters of `texts` the font has no glyph for, in order of
    /// first appearance.
    pub fn missing_chars<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> Vec<char> {
        let mut seen = HashSet::new();
        texts
            .into_iter()
            .flat_map(drawn_chars)
            .filter(|&ch| !self.supports(ch) && seen.insert(ch))
            .collect()
    }

    /// Make sure every character of `texts` can be drawn.
    ///
    /// Helvetica cannot draw characters outside WinAnsiEncoding at all, so
    /// they are an error. An embedded font draws its `.notdef` glyph for
    /// characters it lacks while the ToUnicode map keeps the text itself, so
    /// those are only logged.
    pub fn check_coverage<'a>(
        &self,
        texts: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), ConvertError> {
        let missing = self.missing_chars(texts);
        if missing.is_empty() {
            return Ok(());
        }

        if self.is_embedded() {
            warn!(
                font = %self.base_font,
                missing = missing.len(),
                "Font lacks glyphs for some characters, drawing .notdef"
            );
            return Ok(());
        }

        let mut chars: String = missing
            .iter()
            .take(MAX_REPORTED_CHARS)
            .map(|c| format!("'{}' (U+{:04X})", c, *c as u32))
            .collect::<Vec<_>>()
            .join(", ");
        if missing.len() > MAX_REPORTED_CHARS {
            chars.push_str(&format!(" and {} more", missing.len() - MAX_REPORTED_CHARS));
        }
        Err(ConvertError::UnsupportedText {
            font: self.base_font.clone(),
            chars,
        })
    }

    /// Encode text for a `Tj` operand: WinAnsi bytes for Helvetica, big-endian
    /// glyph ids for an embedded font.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, ConvertError> {
        match &self.kind {
            FontKind::Builtin { .. } => drawn_chars(text)
                .map(|ch| {
                    win_ansi_byte(ch).ok_or_else(|| ConvertError::UnsupportedText {
                        font: self.base_font.clone(),
                        chars: format!("'{}' (U+{:04X})", ch, ch as u32),
                    })
                })
                .collect(),
            FontKind::Embedded(program) => Ok(drawn_chars(text)
                .flat_map(|ch| program.glyph_id(ch).to_be_bytes())
                .collect()),
        }
    }

    /// String form matching [`PdfFont::encode`] output.
    pub fn string_format(&self) -> StringFormat {
        match self.kind {
            FontKind::Builtin { .. } => StringFormat::Literal,
            FontKind::Embedded(_) => StringFormat::Hexadecimal,
        }
    }

    /// Width of `text` in points at `size`.
    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        let units: u64 = drawn_chars(text)
            .map(|ch| self.char_width(ch) as u64)
            .sum();
        units as f64 * size / 1000.0
    }

    fn char_width(&self, ch: char) -> u16 {
        match &self.kind {
            FontKind::Builtin { widths } => win_ansi_byte(ch)
                .filter(|code| *code >= FIRST_CHAR)
                .map(|code| widths[(code - FIRST_CHAR) as usize])
                .unwrap_or_else(|| helvetica_width(0)),
            FontKind::Embedded(program) => program.char_width(ch),
        }
    }

    /// Add the font (and its program, when embedded) to `doc`.
    ///
    /// `used` is every piece of text drawn with the font; an embedded font
    /// only lists widths and ToUnicode entries for those characters.
    pub fn add_to_document<'a>(
        &self,
        doc: &mut Document,
        used: impl IntoIterator<Item = &'a str>,
    ) -> ObjectId {
        match &self.kind {
            FontKind::Builtin { .. } => doc.add_object(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Font".to_vec())),
                ("Subtype", Object::Name(b"Type1".to_vec())),
                ("BaseFont", Object::Name(self.base_font.as_bytes().to_vec())),
                ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
            ])),
            FontKind::Embedded(program) => self.add_type0(doc, program, used),
        }
    }

    fn add_type0<'a>(
        &self,
        doc: &mut Document,
        program: &EmbeddedProgram,
        used: impl IntoIterator<Item = &'a str>,
    ) -> ObjectId {
        // glyph id -> first character drawn with it
        let mut used_glyphs: BTreeMap<u16, char> = BTreeMap::new();
        for ch in used.into_iter().flat_map(drawn_chars) {
            let id = program.glyph_id(ch);
            if id != 0 {
                used_glyphs.entry(id).or_insert(ch);
            }
        }

        let name = Object::Name(self.base_font.as_bytes().to_vec());

        let mut file_dict = Dictionary::new();
        file_dict.set("Length1", Object::Integer(program.data.len() as i64));
        let file_id = doc.add_object(Stream::new(file_dict, program.data.clone()));

        let descriptor_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"FontDescriptor".to_vec())),
            ("FontName", name.clone()),
            // Symbolic
            ("Flags", Object::Integer(4)),
            (
                "FontBBox",
                Object::Array(program.bbox.iter().map(|&v| Object::Integer(v)).collect()),
            ),
            ("ItalicAngle", Object::Integer(0)),
            ("Ascent", Object::Integer(program.ascent)),
            ("Descent", Object::Integer(program.descent)),
            ("CapHeight", Object::Integer(program.cap_height)),
            ("StemV", Object::Integer(80)),
            ("FontFile2", Object::Reference(file_id)),
        ]));

        let mut widths = Vec::with_capacity(used_glyphs.len() * 2);
        for (&id, &ch) in &used_glyphs {
            widths.push(Object::Integer(id as i64));
            widths.push(Object::Array(vec![Object::Integer(
                program.char_width(ch) as i64,
            )]));
        }

        let cid_font_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("BaseFont", name.clone()),
            (
                "CIDSystemInfo",
                Object::Dictionary(Dictionary::from_iter(vec![
                    ("Registry", Object::string_literal("Adobe")),
                    ("Ordering", Object::string_literal("Identity")),
                    ("Supplement", Object::Integer(0)),
                ])),
            ),
            ("FontDescriptor", Object::Reference(descriptor_id)),
            ("DW", Object::Integer(program.notdef_width as i64)),
            ("W", Object::Array(widths)),
            ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
        ]));

        let to_unicode_id = doc.add_object(Stream::new(
            Dictionary::new(),
            to_unicode_cmap(&used_glyphs).into_bytes(),
        ));

        doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", name),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
            (
                "DescendantFonts",
                Object::Array(vec![Object::Reference(cid_font_id)]),
            ),
            ("ToUnicode", Object::Reference(to_unicode_id)),
        ]))
    }
}

impl EmbeddedProgram {
    /// Glyph id for `ch`, 0 (`.notdef`) when the font lacks it.
    fn glyph_id(&self, ch: char) -> u16 {
        self.glyphs.get(&ch).map(|g| g.id).unwrap_or(0)
    }

    fn char_width(&self, ch: char) -> u16 {
        self.glyphs
            .get(&ch)
            .map(|g| g.width)
            .unwrap_or(self.notdef_width)
    }
}

/// ToUnicode CMap mapping two-byte glyph ids to UTF-16BE text.
fn to_unicode_cmap(glyphs: &BTreeMap<u16, char>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );

    let entries: Vec<(&u16, &char)> = glyphs.iter().collect();
    for block in entries.chunks(BFCHAR_BLOCK) {
        cmap.push_str(&format!("{} beginbfchar\n", block.len()));
        for (id, ch) in block {
            let mut units = [0u16; 2];
            let utf16: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{:04X}", unit))
                .collect();
            cmap.push_str(&format!("<{:04X}> <{}>\n", id, utf16));
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap
}
