// Shopping cart state
// Line items plus derived totals, optionally saved as JSON

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::catalog::Product;

/// One cart line
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: u64,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub discount_percentage: Option<f64>,
    pub quantity: u32,
    pub thumbnail: String,
}

impl CartItem {
    /// Line item for a catalog product
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            id: product.id,
            title: product.title.clone(),
            price: product.price,
            discount_percentage: Some(product.discount_percentage),
            quantity,
            thumbnail: product.thumbnail.clone(),
        }
    }

    fn unit_price_after_discount(&self) -> f64 {
        let discount = self.discount_percentage.unwrap_or(0.0);
        self.price * (1.0 - discount / 100.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Cart {
    products: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.products
    }

    /// Add `quantity` of an item, merging with an existing line of the same id
    ///
    /// The incoming item's own quantity is ignored.
    pub fn add(&mut self, item: CartItem, quantity: u32) {
        match self.products.iter_mut().find(|p| p.id == item.id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(quantity),
            None => self.products.push(CartItem { quantity, ..item }),
        }
    }

    /// Set the quantity of an existing line; unknown ids are ignored
    pub fn update_quantity(&mut self, id: u64, quantity: u32) {
        if let Some(item) = self.products.iter_mut().find(|p| p.id == id) {
            item.quantity = quantity;
        }
    }

    pub fn remove(&mut self, id: u64) {
        self.products.retain(|p| p.id != id);
    }

    pub fn clear(&mut self) {
        self.products.clear();
    }

    /// Sum of price times quantity
    pub fn total(&self) -> f64 {
        self.products
            .iter()
            .map(|p| p.price * p.quantity as f64)
            .sum()
    }

    /// Sum of discounted price times quantity
    pub fn discounted_total(&self) -> f64 {
        self.products
            .iter()
            .map(|p| p.unit_price_after_discount() * p.quantity as f64)
            .sum()
    }

    /// Number of distinct lines
    pub fn total_products(&self) -> usize {
        self.products.len()
    }

    pub fn total_quantity(&self) -> u64 {
        self.products.iter().map(|p| p.quantity as u64).sum()
    }

    /// Load a cart from a JSON file; a missing file yields an empty cart
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Cart file not found, starting empty");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cart file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cart file: {}", path.display()))
    }

    /// Save the cart as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize cart")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write cart file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), lines = self.products.len(), "Saved cart");
        Ok(())
    }
}
