/// Derive the canonical folder name for a display name.
///
/// Lowercases, maps spaces to `-`, strips everything outside `[a-z0-9-]`,
/// collapses runs of `-` and trims them from both ends. Idempotent, so a
/// folder name that is already a slug passes through unchanged.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.to_lowercase().chars() {
        let ch = if ch == ' ' { '-' } else { ch };
        match ch {
            'a'..='z' | '0'..='9' => {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(ch);
            }
            '-' => pending_dash = true,
            _ => {}
        }
    }

    slug
}

/// Strip a legacy `NN-` ordering prefix from a folder name.
///
/// Older layouts numbered task folders (`01-fix-login`). The prefix carries
/// no meaning anymore and is only honored when matching folder names.
pub fn strip_numeric_prefix(name: &str) -> &str {
    let digits = name.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = name[digits..].strip_prefix('-') {
            if !rest.is_empty() {
                return rest;
            }
        }
    }
    name
}

pub fn has_numeric_prefix(name: &str) -> bool {
    strip_numeric_prefix(name) != name
}
