pub mod error;
pub mod extract;
pub mod types;

pub use error::ApiError;
pub use error::handler_404;

use std::collections::BTreeMap;

/// Collapses duplicate product ids into a single line by summing quantities,
/// so downstream stock checks and upserts see each product once.
pub fn merge_quantities(pairs: impl IntoIterator<Item = (i32, i32)>) -> Vec<(i32, i32)> {
    let mut merged = BTreeMap::new();
    for (product_id, quantity) in pairs {
        *merged.entry(product_id).or_insert(0) += quantity;
    }
    merged.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_duplicates_and_keeps_singletons() {
        let merged = merge_quantities(vec![(3, 2), (1, 1), (3, 4)]);
        assert_eq!(merged, vec![(1, 1), (3, 6)]);
    }

    #[test]
    fn merge_of_empty_input_is_empty() {
        assert!(merge_quantities(vec![]).is_empty());
    }
}
