//! Label sanitation and allocation.
//!
//! A label is the identifier a node's data is materialized under in the
//! backing engine, so it must be a valid identifier there:
//! `[A-Za-z_][A-Za-z0-9_]*`. Candidates derived from file names are
//! sanitized, then suffixed with a session-monotonic counter so two
//! imports of the same file never collide.

/// Returns `true` if `label` is a valid engine identifier.
pub fn is_valid_label(label: &str) -> bool {
    let mut chars = label.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Derives a table-name candidate from a file name.
///
/// Strips the extension, replaces every character outside `[A-Za-z0-9_]`
/// with `_`, and prepends `tbl_` if the result does not start with a
/// letter or underscore. The result is a valid identifier but carries no
/// uniqueness guarantee; pair it with [`LabelAllocator::allocate`].
pub fn sanitize_table_name(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        // Only treat the dot as an extension separator if something
        // follows it and it is not the leading character.
        Some(idx) if idx > 0 && idx + 1 < file_name.len() => &file_name[..idx],
        _ => file_name,
    };

    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    match sanitized.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => sanitized,
        _ => format!("tbl_{sanitized}"),
    }
}

/// Issues collision-free labels for one session.
///
/// The counter is monotonic for the allocator's lifetime and never
/// reused, independent of node deletions, so `sales.csv` imported twice
/// yields `sales_1` then `sales_2`.
#[derive(Debug, Default)]
pub struct LabelAllocator {
    next: u64,
}

impl LabelAllocator {
    pub fn new() -> Self {
        LabelAllocator { next: 0 }
    }

    /// Appends the next counter value to a sanitized stem.
    pub fn allocate(&mut self, stem: &str) -> String {
        self.next += 1;
        format!("{stem}_{}", self.next)
    }

    /// Sanitizes a file name and allocates a unique label from it.
    pub fn allocate_for_file(&mut self, file_name: &str) -> String {
        let stem = sanitize_table_name(file_name);
        self.allocate(&stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_extension_and_replaces_invalid_chars() {
        assert_eq!(sanitize_table_name("sales.csv"), "sales");
        assert_eq!(sanitize_table_name("q1 report (final).xlsx"), "q1_report__final_");
        assert_eq!(sanitize_table_name("a.b.c.csv"), "a_b_c");
    }

    #[test]
    fn prepends_prefix_when_leading_char_is_not_identifier_start() {
        assert_eq!(sanitize_table_name("2024.csv"), "tbl_2024");
        assert_eq!(sanitize_table_name("-data.csv"), "tbl__data");
    }

    #[test]
    fn dotfiles_keep_their_name() {
        // ".gitignore" has no stem before the dot; the whole name is the stem.
        assert_eq!(sanitize_table_name(".gitignore"), "tbl__gitignore");
    }

    #[test]
    fn allocator_counter_is_monotonic_and_never_reused() {
        let mut alloc = LabelAllocator::new();
        assert_eq!(alloc.allocate("sales"), "sales_1");
        assert_eq!(alloc.allocate("sales"), "sales_2");
        // Counter is shared across stems and unaffected by anything the
        // graph does with earlier labels.
        assert_eq!(alloc.allocate("tbl_union"), "tbl_union_3");
        assert_eq!(alloc.allocate("sales"), "sales_4");
    }

    #[test]
    fn allocate_for_file_combines_sanitize_and_suffix() {
        let mut alloc = LabelAllocator::new();
        assert_eq!(alloc.allocate_for_file("sales.csv"), "sales_1");
        assert_eq!(alloc.allocate_for_file("sales.csv"), "sales_2");
    }

    proptest! {
        /// Sanitation is idempotent: re-sanitizing its own output is a
        /// no-op (modulo the uniqueness suffix, which is the allocator's
        /// concern, not sanitation's).
        #[test]
        fn sanitize_is_idempotent(name in "\\PC{0,40}") {
            let once = sanitize_table_name(&name);
            let twice = sanitize_table_name(&once);
            prop_assert_eq!(&once, &twice);
        }

        /// Every sanitized output is a valid engine identifier.
        #[test]
        fn sanitize_yields_valid_labels(name in "\\PC{1,40}") {
            let label = sanitize_table_name(&name);
            prop_assert!(is_valid_label(&label), "invalid label: {:?}", label);
        }

        /// Allocator suffixes strictly increase.
        #[test]
        fn allocator_suffix_strictly_increases(stems in proptest::collection::vec("[a-z]{1,8}", 1..10)) {
            let mut alloc = LabelAllocator::new();
            let mut last = 0u64;
            for stem in &stems {
                let label = alloc.allocate(stem);
                let suffix: u64 = label.rsplit('_').next().unwrap().parse().unwrap();
                prop_assert!(suffix > last);
                last = suffix;
            }
        }
    }
}
