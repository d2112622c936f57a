// q_shared.rs -- tokenizer, lenient number parsing and shared limits

// ============================================================
// Limits
// ============================================================

/// Longest single token the parser will keep; extra characters are dropped.
pub const MAX_TOKEN_CHARS: usize = 1024;
/// Tokens past this count are parsed but not stored in argv.
pub const MAX_STRING_TOKENS: usize = 80;
pub const MAX_STRING_CHARS: usize = 1024;
pub const MAX_QPATH: usize = 64;

pub type Vec3 = [f32; 3];

pub const PITCH: usize = 0;
pub const YAW: usize = 1;
pub const ROLL: usize = 2;

// ============================================================
// COM_Parse
// ============================================================

/// Characters that always form a token on their own.
fn is_single_char_token(c: u8) -> bool {
    matches!(c, b'{' | b'}' | b'(' | b')' | b'\'' | b':')
}

/// Parse one token out of `data`.
///
/// Returns the token and the unparsed remainder. The remainder is `None` once
/// the input is exhausted, including the case of an unterminated quoted string,
/// where the partial quoted content is still returned as the token.
/// `;` is an ordinary word character here.
pub fn com_parse(data: &str) -> (String, Option<&str>) {
    let bytes = data.as_bytes();
    let mut pos = 0;

    // skip whitespace and // comments
    loop {
        while pos < bytes.len() && bytes[pos] <= b' ' {
            pos += 1;
        }
        if pos >= bytes.len() {
            return (String::new(), None);
        }
        if bytes[pos] == b'/' && pos + 1 < bytes.len() && bytes[pos + 1] == b'/' {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }
        break;
    }

    let remainder = |at: usize| if at < bytes.len() { Some(&data[at..]) } else { None };

    // quoted string
    if bytes[pos] == b'"' {
        pos += 1;
        let start = pos;
        while pos < bytes.len() && bytes[pos] != b'"' {
            pos += 1;
        }
        let token = truncate_token(&data[start..pos]);
        if pos >= bytes.len() {
            return (token, None);
        }
        return (token, remainder(pos + 1));
    }

    if is_single_char_token(bytes[pos]) {
        return (data[pos..pos + 1].to_string(), remainder(pos + 1));
    }

    // regular word
    let start = pos;
    while pos < bytes.len() && bytes[pos] > b' ' && !is_single_char_token(bytes[pos]) {
        pos += 1;
    }
    (truncate_token(&data[start..pos]), remainder(pos))
}

fn truncate_token(s: &str) -> String {
    if s.len() < MAX_TOKEN_CHARS {
        return s.to_string();
    }
    let mut end = MAX_TOKEN_CHARS - 1;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

// ============================================================
// Lenient numeric parsing (Q_atoi / Q_atof)
// ============================================================

/// C-style integer parse: optional sign, `0x` hex, `'c'` character literal,
/// otherwise decimal digits up to the first non-digit. Garbage yields 0.
pub fn q_atoi(s: &str) -> i32 {
    let s = s.trim_start();
    let (sign, rest) = split_sign(s);
    let b = rest.as_bytes();

    if b.len() > 2 && b[0] == b'0' && (b[1] == b'x' || b[1] == b'X') {
        let mut val: i32 = 0;
        for &c in &b[2..] {
            let d = match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'f' => c - b'a' + 10,
                b'A'..=b'F' => c - b'A' + 10,
                _ => break,
            };
            val = val.wrapping_mul(16).wrapping_add(d as i32);
        }
        return val.wrapping_mul(sign);
    }

    if b.len() > 1 && b[0] == b'\'' {
        return sign * b[1] as i32;
    }

    let mut val: i32 = 0;
    for &c in b {
        if !c.is_ascii_digit() {
            break;
        }
        val = val.wrapping_mul(10).wrapping_add((c - b'0') as i32);
    }
    val.wrapping_mul(sign)
}

/// C-style float parse of the longest numeric prefix; garbage yields 0.0.
pub fn q_atof(s: &str) -> f32 {
    let s = s.trim_start();
    let (sign, rest) = split_sign(s);
    let b = rest.as_bytes();

    if b.len() > 2 && b[0] == b'0' && (b[1] == b'x' || b[1] == b'X') {
        return q_atoi(s) as f32;
    }
    if b.len() > 1 && b[0] == b'\'' {
        return sign as f32 * b[1] as f32;
    }

    let mut end = 0;
    let mut seen_dot = false;
    while end < b.len() {
        match b[end] {
            b'0'..=b'9' => {}
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    // optional exponent, only if it has digits
    if end < b.len() && (b[end] == b'e' || b[end] == b'E') {
        let mut e = end + 1;
        if e < b.len() && (b[e] == b'+' || b[e] == b'-') {
            e += 1;
        }
        let digits_start = e;
        while e < b.len() && b[e].is_ascii_digit() {
            e += 1;
        }
        if e > digits_start {
            end = e;
        }
    }

    rest[..end]
        .parse::<f32>()
        .map(|v| sign as f32 * v)
        .unwrap_or(0.0)
}

fn split_sign(s: &str) -> (i32, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (-1, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (1, rest)
    } else {
        (1, s)
    }
}

/// Formats a float the way cvars store numbers: integral values lose the `.0`.
pub fn format_value(value: f32) -> String {
    if value == value.trunc() && value.abs() < 1e9 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Append `ext` to `path` unless it already has an extension in its file part.
pub fn com_default_extension(path: &str, ext: &str) -> String {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    if file.contains('.') {
        path.to_string()
    } else {
        format!("{}{}", path, ext)
    }
}

// ============================================================
// Tests
// ============================================================
