//! Text normalisation for free-text fields sent to AEAT.

/// Characters AEAT rejects in names and descriptions; each becomes `_`.
const FORBIDDEN: &[char] = &[
    '"', '/', '*', '+', '?', '¿', '!', '$', '[', ']', '{', '}', '@', '#', '`', '^', ':', ';',
    '<', '>', '=', '~', '%', '\\',
];

/// Strip accents and forbidden symbols, keeping plain ASCII.
///
/// Forbidden symbols turn into `_`, accented Latin letters lose their
/// diacritics, anything else outside ASCII is dropped, and leading or
/// trailing underscores are trimmed.
///
/// ```
/// use aeat_sii::core::unaccent;
///
/// assert_eq!(unaccent("áéíóú"), "aeiou");
/// assert_eq!(unaccent("__aé@ou__"), "ae_ou");
/// ```
pub fn unaccent(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if FORBIDDEN.contains(&c) {
            out.push('_');
        } else if c.is_ascii() {
            out.push(c);
        } else if let Some(base) = strip_diacritic(c) {
            out.push_str(base);
        }
    }
    out.trim_matches('_').to_string()
}

fn strip_diacritic(c: char) -> Option<&'static str> {
    let base = match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => "a",
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => "A",
        'é' | 'è' | 'ê' | 'ë' => "e",
        'É' | 'È' | 'Ê' | 'Ë' => "E",
        'í' | 'ì' | 'î' | 'ï' => "i",
        'Í' | 'Ì' | 'Î' | 'Ï' => "I",
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => "o",
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => "O",
        'ú' | 'ù' | 'û' | 'ü' => "u",
        'Ú' | 'Ù' | 'Û' | 'Ü' => "U",
        'ñ' => "n",
        'Ñ' => "N",
        'ç' => "c",
        'Ç' => "C",
        'ý' | 'ÿ' => "y",
        'Ý' => "Y",
        'ß' => "ss",
        'æ' => "ae",
        'Æ' => "AE",
        'ø' => "o",
        'Ø' => "O",
        _ => return None,
    };
    Some(base)
}
