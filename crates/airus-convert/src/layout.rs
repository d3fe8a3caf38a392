//! Line breaking and pagination for plain-text documents

use crate::font::PdfFont;

/// A4 portrait page with the typography used for converted documents.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSetup {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    pub font_size: f64,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            width: 595.28,
            height: 841.89,
            margin: 50.0,
            font_size: 11.0,
        }
    }
}

impl PageSetup {
    pub fn line_height(&self) -> f64 {
        self.font_size * 1.25
    }

    /// Vertical advance after the last line of a paragraph.
    pub fn paragraph_advance(&self) -> f64 {
        self.line_height() * 1.5
    }

    pub fn text_width(&self) -> f64 {
        self.width - 2.0 * self.margin
    }

    fn top(&self) -> f64 {
        self.height - self.margin
    }
}

/// One line of text positioned on a page (PDF user space, origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

/// Greedy word wrap.
///
/// Words are accumulated until adding the next one would exceed `max_width`;
/// the accumulated line is then emitted and the word starts a new line. The
/// line still buffered when the words run out is always emitted, so every
/// paragraph yields at least one line (an empty paragraph yields `""`). A
/// single word wider than `max_width` occupies a line of its own.
pub fn wrap_paragraph<F>(paragraph: &str, max_width: f64, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f64,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in paragraph.split(' ') {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if !current.is_empty() && measure(&candidate) > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }

    lines.push(current);
    lines
}

/// Wrap every paragraph and distribute the lines over pages.
///
/// Always returns at least one (possibly empty) page.
pub fn layout_pages(paragraphs: &[String], font: &PdfFont, setup: &PageSetup) -> Vec<Vec<PlacedLine>> {
    let mut pages: Vec<Vec<PlacedLine>> = vec![Vec::new()];
    let mut y = setup.top();
    let max_width = setup.text_width();

    for paragraph in paragraphs {
        let lines = wrap_paragraph(paragraph, max_width, |s| {
            font.text_width(s, setup.font_size)
        });

        for line in lines {
            if y < setup.margin {
                pages.push(Vec::new());
                y = setup.top();
            }
            if let Some(page) = pages.last_mut() {
                page.push(PlacedLine {
                    text: line,
                    x: setup.margin,
                    y,
                });
            }
            y -= setup.line_height();
        }

        y -= setup.paragraph_advance() - setup.line_height();
    }

    pages
}
