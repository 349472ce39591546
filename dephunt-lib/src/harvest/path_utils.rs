//! Path utilities for turning registry identifiers into file names.

/// Characters that are separators or reserved in file names on some platform.
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Sanitize a package identifier for use as a single path component.
///
/// Path traversal sequences, reserved characters and control characters all
/// become `_`. Scoped npm names (`@types/node`) and Maven coordinates
/// (`org.slf4j:slf4j-api`) both flatten to a single component.
///
/// The mapping is not injective: `a.b:c_d` and `a.b_c:d` share a file name.
/// Registries reserve neither `_` nor `:`, so such pairs are possible in principle.
#[must_use]
pub fn sanitize_path_component(s: &str) -> String {
    s.replace("..", "__")
        .chars()
        .map(|c| if RESERVED.contains(&c) || c.is_control() { '_' } else { c })
        .collect()
}
