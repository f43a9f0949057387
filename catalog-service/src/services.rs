use std::sync::Arc;

use catalog_core::HttpError;
use garde::Validate;

use crate::events::{ProductCreatedEvent, ProductEvents};
use crate::models::{Page, Pageable, ProductRequest, ProductResponse};
use crate::repository::{ProductRepository, RepositoryError};

impl From<RepositoryError> for HttpError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateSku(_) => HttpError::Conflict("SKU already exists".into()),
            RepositoryError::NotFound(_) => HttpError::NotFound("Product not found".into()),
            RepositoryError::Unavailable(msg) => HttpError::Internal(msg),
        }
    }
}

pub struct ProductService<R> {
    repo: Arc<R>,
    events: ProductEvents,
}

impl<R> Clone for ProductService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            events: self.events.clone(),
        }
    }
}

impl<R: ProductRepository> ProductService<R> {
    pub fn new(repo: R, events: ProductEvents) -> Self {
        Self {
            repo: Arc::new(repo),
            events,
        }
    }

    pub fn events(&self) -> &ProductEvents {
        &self.events
    }

    pub async fn create(&self, req: ProductRequest) -> Result<ProductResponse, HttpError> {
        req.validate()?;
        let product = self.repo.insert(req).await?;
        self.events.publish(ProductCreatedEvent {
            id: product.id,
            sku: product.sku.clone(),
        });
        Ok(product.into())
    }

    pub async fn find_by_id(&self, id: u64) -> Result<ProductResponse, HttpError> {
        self.repo
            .find_by_id(id)
            .await?
            .map(ProductResponse::from)
            .ok_or_else(|| HttpError::NotFound("Product not found".into()))
    }

    pub async fn search(
        &self,
        name: Option<&str>,
        pageable: Pageable,
    ) -> Result<Page<ProductResponse>, HttpError> {
        let page = self
            .repo
            .find_by_name_containing(name.unwrap_or(""), pageable)
            .await?;
        Ok(page.map(ProductResponse::from))
    }

    pub async fn update(&self, id: u64, req: ProductRequest) -> Result<ProductResponse, HttpError> {
        req.validate()?;
        Ok(self.repo.update(id, req).await?.into())
    }

    pub async fn delete(&self, id: u64) -> Result<(), HttpError> {
        self.repo.delete(id).await?;
        Ok(())
    }
}
