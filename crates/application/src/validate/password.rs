//! Password quality heuristics shared by the WiFi and auth checks.

/// Passwords the fleet refuses to treat as credentials at strict level.
const COMMON_PASSWORDS: &[&str] = &[
    "admin",
    "password",
    "passwort",
    "12345678",
    "123456789",
    "qwertyuiop",
    "letmein1",
    "shelly123",
    "changeme",
    "default1",
];

pub fn is_too_short(password: &str) -> bool {
    password.chars().count() < 8
}

pub fn is_common(password: &str) -> bool {
    let lowered = password.to_lowercase();
    COMMON_PASSWORDS.iter().any(|p| *p == lowered)
}

/// Count of character classes out of {upper, lower, digit, special}.
pub fn character_classes(password: &str) -> u8 {
    let mut upper = false;
    let mut lower = false;
    let mut digit = false;
    let mut special = false;
    for c in password.chars() {
        if c.is_ascii_uppercase() {
            upper = true;
        } else if c.is_ascii_lowercase() {
            lower = true;
        } else if c.is_ascii_digit() {
            digit = true;
        } else {
            special = true;
        }
    }
    u8::from(upper) + u8::from(lower) + u8::from(digit) + u8::from(special)
}

pub fn is_low_complexity(password: &str) -> bool {
    character_classes(password) < 3
}

/// Three or more identical characters in a row ("aaa", "111").
pub fn has_consecutive_repeats(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

/// Three ascending characters in a row ("abc", "123").
pub fn has_ascending_run(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| {
        let (a, b, c) = (w[0] as u32, w[1] as u32, w[2] as u32);
        b == a + 1 && c == b + 1
    })
}

/// Predictable = easy for a sweep to guess even when long enough.
pub fn is_predictable(password: &str) -> bool {
    has_consecutive_repeats(password) || has_ascending_run(password)
}
