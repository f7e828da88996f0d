//! Label casing for form fields: field names like "first_name" become display labels.

/// Title-case an identifier: every run of letters starts upper-case, the rest of the run is lower-case.
/// Any non-letter (digit, '_', space) starts a new run.
/// e.g. "first_name" -> "First_Name", "bio" -> "Bio", "x2y" -> "X2Y"
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(c);
            prev_letter = false;
        }
    }
    out
}

/// Upper-case the first character and lower-case the rest.
/// e.g. "createdAt" -> "Createdat", "name" -> "Name"
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(s.len());
            out.extend(first.to_uppercase());
            for c in chars {
                out.extend(c.to_lowercase());
            }
            out
        }
        None => String::new(),
    }
}
