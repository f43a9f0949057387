use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: u64,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Overwrite the editable fields from `req` and bump `updated_at`.
    pub fn apply(&mut self, req: ProductRequest) {
        self.sku = req.sku;
        self.name = req.name;
        self.description = req.description;
        self.price = req.price;
        self.quantity = req.quantity;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductRequest {
    #[garde(custom(not_blank))]
    pub sku: String,
    #[garde(custom(not_blank))]
    pub name: String,
    #[garde(skip)]
    #[serde(default)]
    pub description: Option<String>,
    #[garde(range(min = 0.0))]
    pub price: f64,
    #[garde(skip)]
    pub quantity: u32,
}

fn not_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("must not be blank"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductResponse {
    pub id: u64,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            sku: p.sku,
            name: p.name,
            description: p.description,
            price: p.price,
            quantity: p.quantity,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Pagination parameters (`?page=0&size=10`).
#[derive(Debug, Clone, Copy)]
pub struct Pageable {
    pub page: u64,
    pub size: u64,
}

impl Default for Pageable {
    fn default() -> Self {
        Self { page: 0, size: 10 }
    }
}

impl Pageable {
    pub const MAX_SIZE: u64 = 100;

    pub fn new(page: u64, size: u64) -> Self {
        Self {
            page,
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }
}

/// A page of results with pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u64,
    pub size: u64,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, pageable: &Pageable, total_elements: u64) -> Self {
        Self {
            content,
            page: pageable.page,
            size: pageable.size,
            total_elements,
            total_pages: total_elements.div_ceil(pageable.size.max(1)),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}
