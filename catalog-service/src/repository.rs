use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::{Page, Pageable, Product, ProductRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Another product already uses this SKU.
    DuplicateSku(String),
    NotFound(u64),
    /// The store could not be reached.
    Unavailable(String),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::DuplicateSku(sku) => write!(f, "SKU already exists: {sku}"),
            RepositoryError::NotFound(id) => write!(f, "Product not found: {id}"),
            RepositoryError::Unavailable(msg) => write!(f, "product store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// Storage for products.
///
/// SKU uniqueness is enforced by the store itself, atomically with the
/// write, so two concurrent creates with the same SKU cannot both succeed.
pub trait ProductRepository: Send + Sync + 'static {
    fn find_by_id(&self, id: u64) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Products whose name contains `name` (case-insensitive), ordered by id.
    fn find_by_name_containing(
        &self,
        name: &str,
        pageable: Pageable,
    ) -> impl Future<Output = Result<Page<Product>, RepositoryError>> + Send;

    fn insert(&self, req: ProductRequest) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    fn update(&self, id: u64, req: ProductRequest) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    fn delete(&self, id: u64) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

#[derive(Default)]
struct Table {
    rows: BTreeMap<u64, Product>,
    next_id: u64,
}

/// In-memory product store. Ids start at 1 and are never reused.
#[derive(Clone, Default)]
pub struct InMemoryProductRepository {
    table: Arc<RwLock<Table>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: u64) -> Result<Option<Product>, RepositoryError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_name_containing(
        &self,
        name: &str,
        pageable: Pageable,
    ) -> Result<Page<Product>, RepositoryError> {
        let needle = name.to_lowercase();
        let table = self.table.read().await;
        let matching: Vec<&Product> = table
            .rows
            .values()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect();
        let total = matching.len() as u64;
        let content = matching
            .into_iter()
            .skip(usize::try_from(pageable.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(pageable.size).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(Page::new(content, &pageable, total))
    }

    async fn insert(&self, req: ProductRequest) -> Result<Product, RepositoryError> {
        let mut table = self.table.write().await;
        if table.rows.values().any(|p| p.sku == req.sku) {
            return Err(RepositoryError::DuplicateSku(req.sku));
        }
        table.next_id += 1;
        let now = Utc::now();
        let product = Product {
            id: table.next_id,
            sku: req.sku,
            name: req.name,
            description: req.description,
            price: req.price,
            quantity: req.quantity,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update(&self, id: u64, req: ProductRequest) -> Result<Product, RepositoryError> {
        let mut table = self.table.write().await;
        if !table.rows.contains_key(&id) {
            return Err(RepositoryError::NotFound(id));
        }
        if table.rows.values().any(|p| p.id != id && p.sku == req.sku) {
            return Err(RepositoryError::DuplicateSku(req.sku));
        }
        let product = table
            .rows
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        product.apply(req);
        Ok(product.clone())
    }

    async fn delete(&self, id: u64) -> Result<(), RepositoryError> {
        self.table
            .write()
            .await
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound(id))
    }
}
