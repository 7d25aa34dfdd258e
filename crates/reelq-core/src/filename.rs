//! Output file naming: template rendering and ASCII-safe base names.

/// Values available to a filename template. `None` renders as the field's placeholder default.
#[derive(Debug, Clone, Default)]
pub struct FilenameFields<'a> {
    pub title: Option<&'a str>,
    pub year: Option<&'a str>,
    pub genre: Option<&'a str>,
    pub imdb_score: Option<&'a str>,
    pub director: Option<&'a str>,
}

impl<'a> FilenameFields<'a> {
    fn title_or_default(&self) -> &'a str {
        non_blank(self.title).unwrap_or("Unknown")
    }

    fn lookup(&self, name: &str) -> Option<&'a str> {
        let value = match name {
            "title" => return Some(self.title_or_default()),
            "year" => non_blank(self.year).unwrap_or("YYYY"),
            "genre" => non_blank(self.genre).unwrap_or("Genre"),
            "imdb_score" => non_blank(self.imdb_score).unwrap_or("N/A"),
            "director" => non_blank(self.director).unwrap_or("Director"),
            _ => return None,
        };
        Some(value)
    }
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.filter(|s| !s.trim().is_empty())
}

#[derive(Debug, PartialEq)]
enum TemplateError {
    UnknownPlaceholder(String),
    Unbalanced,
}

fn try_render(template: &str, fields: &FilenameFields<'_>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + 32);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(TemplateError::Unbalanced),
                        Some(c) => name.push(c),
                    }
                }
                let value = fields
                    .lookup(name.trim())
                    .ok_or(TemplateError::UnknownPlaceholder(name))?;
                out.push_str(value);
            }
            '}' => return Err(TemplateError::Unbalanced),
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Render a filename template.
///
/// Placeholders: `{title}`, `{year}`, `{genre}`, `{imdb_score}`, `{director}`.
/// `{{` and `}}` are literal braces. An unknown placeholder or a stray brace
/// makes the whole template fall back to the bare title.
pub fn render_template(template: &str, fields: &FilenameFields<'_>) -> String {
    match try_render(template, fields) {
        Ok(rendered) => rendered,
        Err(err) => {
            tracing::warn!(template, ?err, "invalid filename template, using title");
            fields.title_or_default().to_string()
        }
    }
}

fn transliterate(c: char) -> Option<&'static str> {
    let s = match c {
        'ı' => "i",
        'İ' => "I",
        'ğ' => "g",
        'Ğ' => "G",
        'ş' | 'ș' => "s",
        'Ş' | 'Ș' => "S",
        'ç' => "c",
        'Ç' => "C",
        'ö' | 'ó' | 'ò' | 'ô' | 'õ' | 'ø' => "o",
        'Ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ø' => "O",
        'ü' | 'ú' | 'ù' | 'û' => "u",
        'Ü' | 'Ú' | 'Ù' | 'Û' => "U",
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => "a",
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => "A",
        'é' | 'è' | 'ê' | 'ë' => "e",
        'É' | 'È' | 'Ê' | 'Ë' => "E",
        'í' | 'ì' | 'î' | 'ï' => "i",
        'Í' | 'Ì' | 'Î' | 'Ï' => "I",
        'ñ' => "n",
        'Ñ' => "N",
        'ý' | 'ÿ' => "y",
        'Ý' => "Y",
        'ß' => "ss",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        'ț' => "t",
        'Ț' => "T",
        _ => return None,
    };
    Some(s)
}

/// Turn a rendered template into a base name that is safe on any filesystem.
///
/// - Turkish and common Latin diacritics become ASCII; other non-ASCII is dropped
/// - Removes `<>:"/\|?*` and control characters
/// - Collapses whitespace runs and trims
/// - Limits length to 200 bytes; empty results become `untitled`
pub fn sanitize_base_name(name: &str) -> String {
    const MAX_BASE: usize = 200;

    let mut ascii = String::with_capacity(name.len());
    for c in name.chars() {
        if let Some(s) = transliterate(c) {
            ascii.push_str(s);
        } else if c.is_ascii() {
            ascii.push(c);
        }
    }

    let mut out = String::with_capacity(ascii.len());
    let mut prev_space = false;
    for c in ascii.chars() {
        if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
            continue;
        }
        if c.is_whitespace() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
            continue;
        }
        if c.is_control() {
            continue;
        }
        out.push(c);
        prev_space = false;
    }

    let mut trimmed = out.trim();
    if trimmed.len() > MAX_BASE {
        // All ASCII at this point, any byte offset is a char boundary.
        trimmed = trimmed[..MAX_BASE].trim_end();
    }

    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Render and sanitize in one step.
pub fn resolve_base_name(template: &str, fields: &FilenameFields<'_>) -> String {
    sanitize_base_name(&render_template(template, fields))
}
