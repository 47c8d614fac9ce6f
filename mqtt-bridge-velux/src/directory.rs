//! In-memory directory of enumerated products.
//!
//! The directory is a snapshot: it is rebuilt wholesale from every
//! enumeration and never mutated in place. Handlers only read it.

use std::collections::HashMap;

use klf200::Product;

use crate::topic::normalize_name;

/// Typed repository over the last product enumeration.
#[derive(Debug, Default)]
pub struct ProductDirectory {
    products: Vec<Product>,
    by_node: HashMap<u8, usize>,
    by_name: HashMap<String, usize>,
}

impl ProductDirectory {
    /// Build a directory, indexing by node id and normalized name.
    ///
    /// On a normalized-name collision the first product wins, matching the
    /// first-match-wins lookup contract.
    pub fn new(products: Vec<Product>) -> Self {
        let mut by_node = HashMap::with_capacity(products.len());
        let mut by_name = HashMap::with_capacity(products.len());

        for (index, product) in products.iter().enumerate() {
            by_node.entry(product.node_id).or_insert(index);
            by_name.entry(normalize_name(&product.name)).or_insert(index);
        }

        Self {
            products,
            by_node,
            by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn find_by_node_id(&self, node_id: u8) -> Option<&Product> {
        self.by_node.get(&node_id).map(|&i| &self.products[i])
    }

    /// Look up a product by display name or any spelling that normalizes to
    /// the same topic segment.
    pub fn find_by_name(&self, name: &str) -> Option<&Product> {
        self.by_name
            .get(&normalize_name(name))
            .map(|&i| &self.products[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use klf200::Position;

    fn product(node_id: u8, name: &str, target_percent: u8) -> Product {
        Product {
            node_id,
            name: name.to_string(),
            current_position: Position::from_percent(target_percent),
            target_position: Position::from_percent(target_percent),
        }
    }

    #[test]
    fn test_find_by_node_id() {
        let directory = ProductDirectory::new(vec![
            product(1, "Living Room", 30),
            product(2, "Office", 75),
        ]);

        assert_eq!(directory.find_by_node_id(2).unwrap().name, "Office");
        assert!(directory.find_by_node_id(9).is_none());
    }

    #[test]
    fn test_find_by_name_normalizes_both_sides() {
        let directory = ProductDirectory::new(vec![product(1, "Kitchen Blind", 0)]);

        assert!(directory.find_by_name("Kitchen Blind").is_some());
        assert!(directory.find_by_name("kitchen blind").is_some());
        assert!(directory.find_by_name("kitchen_blind").is_some());
        assert!(directory.find_by_name("KITCHEN-BLIND").is_some());
        assert!(directory.find_by_name("pantry blind").is_none());
    }

    #[test]
    fn test_first_match_wins_on_collision() {
        let directory = ProductDirectory::new(vec![
            product(1, "Kitchen Blind", 10),
            product(2, "kitchen blind", 90),
        ]);

        assert_eq!(directory.find_by_name("Kitchen Blind").unwrap().node_id, 1);
    }

    #[test]
    fn test_empty_directory() {
        let directory = ProductDirectory::default();
        assert!(directory.is_empty());
        assert!(directory.find_by_name("anything").is_none());
    }
}
