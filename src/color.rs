//! Deterministic fallback colors for groups and tables.

/// Fallback palette, in selection order.
pub const PALETTE: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#F4A460", "#87CEEB",
    "#DEB887", "#F0E68C",
];

/// Pick a palette color for `name`.
///
/// Hashes UTF-16 code units with `hash = unit + ((hash << 5) - hash)`, where the
/// shift operates on the low 32 bits and the subtraction does not, so names
/// map to the same color a browser-side renderer would compute.
pub fn color_for(name: &str) -> &'static str {
    let mut hash: i64 = 0;
    for unit in name.encode_utf16() {
        let shifted = i64::from((hash as i32).wrapping_shl(5));
        hash = i64::from(unit).wrapping_add(shifted.wrapping_sub(hash));
    }
    PALETTE[(hash.unsigned_abs() % PALETTE.len() as u64) as usize]
}

/// Resolve an entity color: the first explicit color wins, then the
/// inherited one, then the generated fallback for `name`.
pub fn resolve<'a>(
    explicit: impl IntoIterator<Item = Option<&'a str>>,
    inherited: Option<&str>,
    name: &str,
) -> String {
    explicit
        .into_iter()
        .flatten()
        .next()
        .or(inherited)
        .unwrap_or_else(|| color_for(name))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names() {
        assert_eq!(color_for("Sales"), "#FFEAA7");
        assert_eq!(color_for("E_Commerce"), "#F0E68C");
        assert_eq!(color_for("users"), "#45B7D1");
        assert_eq!(color_for("orders"), "#4ECDC4");
        assert_eq!(color_for("a"), "#87CEEB");
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(color_for(""), PALETTE[0]);
    }

    #[test]
    fn test_hash_beyond_32_bits() {
        // Intermediate hashes leave the i32 range for these names.
        assert_eq!(color_for("categories"), "#FF6B6B");
        assert_eq!(
            color_for("a_very_long_table_name_for_overflow_checks"),
            "#4ECDC4"
        );
    }

    #[test]
    fn test_non_ascii() {
        assert_eq!(color_for("ユーザー"), "#DEB887");
    }

    #[test]
    fn test_stable_across_calls() {
        let first = color_for("inventory");
        for _ in 0..10 {
            assert_eq!(color_for("inventory"), first);
        }
    }

    #[test]
    fn test_resolve_precedence() {
        assert_eq!(resolve([Some("#111"), Some("#222")], Some("#333"), "t"), "#111");
        assert_eq!(resolve([None, Some("#222")], Some("#333"), "t"), "#222");
        assert_eq!(resolve([None, None], Some("#333"), "t"), "#333");
        assert_eq!(resolve([None, None], None, "users"), "#45B7D1");
    }
}
