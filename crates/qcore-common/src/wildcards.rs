// wildcards.rs -- `*` / `?` pattern matching for the list commands
//
// Matching is ASCII case-insensitive since command, alias and cvar names are.

/// Test if `wildcard` pattern matches `test` string.
pub fn wildcardfit(wildcard: &str, test: &str) -> bool {
    let w = wildcard.as_bytes();
    let t = test.as_bytes();

    let mut wi = 0;
    let mut ti = 0;
    // position of the last `*` seen and the test index it was tried against
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if wi < w.len() && (w[wi] == b'?' || w[wi].eq_ignore_ascii_case(&t[ti])) {
            wi += 1;
            ti += 1;
        } else if wi < w.len() && w[wi] == b'*' {
            star = Some((wi, ti));
            wi += 1;
        } else if let Some((swi, sti)) = star {
            // let the last `*` swallow one more character
            wi = swi + 1;
            ti = sti + 1;
            star = Some((swi, sti + 1));
        } else {
            return false;
        }
    }

    while wi < w.len() && w[wi] == b'*' {
        wi += 1;
    }
    wi == w.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(wildcardfit("hello", "hello"));
        assert!(!wildcardfit("hello", "world"));
        assert!(wildcardfit("Hello", "hELLO"));
    }

    #[test]
    fn test_question_mark() {
        assert!(wildcardfit("h?llo", "hello"));
        assert!(!wildcardfit("h?llo", "hllo"));
    }

    #[test]
    fn test_asterisk() {
        assert!(wildcardfit("*", "anything"));
        assert!(wildcardfit("cl_*", "cl_demo"));
        assert!(wildcardfit("*demo", "timedemo"));
        assert!(wildcardfit("*.cfg", "config.cfg"));
        assert!(!wildcardfit("*.cfg", "config.dem"));
        assert!(wildcardfit("a*b*c", "axxbyyc"));
        assert!(!wildcardfit("a*b*c", "axxbyy"));
    }

    #[test]
    fn test_empty() {
        assert!(wildcardfit("", ""));
        assert!(!wildcardfit("", "x"));
        assert!(!wildcardfit("x", ""));
        assert!(wildcardfit("*", ""));
    }
}
