use proptest::prelude::*;

/// Email-like tenant identifiers: segments of `[a-z0-9]` joined by `.` or `-`.
pub fn tenant_identifier_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,8}([.-][a-z0-9]{1,8}){0,4}"
}

/// Arbitrary printable identifiers without whitespace, including edge characters.
pub fn raw_identifier_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9._@+-]{1,40}"
}

/// Two identifiers that differ only by `.` versus `-` at one separator position.
pub fn separator_twins_strategy() -> impl Strategy<Value = (String, String)> {
    ("[a-z0-9]{1,8}", "[a-z0-9]{1,8}")
        .prop_map(|(left, right)| (format!("{left}.{right}"), format!("{left}-{right}")))
}
