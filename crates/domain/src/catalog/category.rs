//! Product categories.

use common::CategoryId;
use store::{Category, NewCategory, Store, StoreError, StoreTx};

use super::CatalogError;
use crate::auth::Identity;
use crate::error::DomainError;

/// Derives the URL slug of a category name: lowercase words joined by `-`.
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Service for browsing and administering categories.
pub struct CategoryService<S: Store> {
    store: S,
}

impl<S: Store> CategoryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists categories with their product counts, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, DomainError> {
        let mut tx = self.store.begin().await?;
        let categories = tx.list_categories().await?;
        tx.commit().await?;
        Ok(categories)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_category(&self, id: CategoryId) -> Result<Category, DomainError> {
        let mut tx = self.store.begin().await?;
        let category = tx.get_category(id).await?;
        tx.commit().await?;
        category.ok_or_else(|| CatalogError::CategoryNotFound(id).into())
    }

    /// Creates a category. Admin only.
    #[tracing::instrument(skip(self, identity))]
    pub async fn create_category(
        &self,
        identity: &Identity,
        name: &str,
    ) -> Result<Category, DomainError> {
        identity.require_admin()?;
        let category = validate_name(name)?;

        let mut tx = self.store.begin().await?;
        let slug = category.slug.clone();
        let category = tx
            .insert_category(category)
            .await
            .map_err(|e| slug_taken(e, slug))?;
        tx.commit().await?;

        tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
        Ok(category)
    }

    /// Renames a category. Admin only.
    #[tracing::instrument(skip(self, identity))]
    pub async fn rename_category(
        &self,
        identity: &Identity,
        id: CategoryId,
        name: &str,
    ) -> Result<Category, DomainError> {
        identity.require_admin()?;
        let category = validate_name(name)?;

        let mut tx = self.store.begin().await?;
        let slug = category.slug.clone();
        let category = tx
            .update_category(id, category)
            .await
            .map_err(|e| slug_taken(e, slug))?
            .ok_or(CatalogError::CategoryNotFound(id))?;
        tx.commit().await?;

        Ok(category)
    }

    /// Deletes a category. Its products stay in the catalog uncategorized. Admin only.
    #[tracing::instrument(skip(self, identity))]
    pub async fn delete_category(
        &self,
        identity: &Identity,
        id: CategoryId,
    ) -> Result<(), DomainError> {
        identity.require_admin()?;

        let mut tx = self.store.begin().await?;
        if !tx.delete_category(id).await? {
            return Err(CatalogError::CategoryNotFound(id).into());
        }
        tx.commit().await?;

        tracing::info!(category_id = %id, "Category deleted");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<NewCategory, CatalogError> {
    let name = name.trim();
    let slug = slugify(name);
    if !(2..=100).contains(&name.chars().count()) || slug.is_empty() {
        return Err(CatalogError::InvalidCategoryName);
    }
    Ok(NewCategory {
        name: name.to_string(),
        slug,
    })
}

fn slug_taken(err: StoreError, slug: String) -> DomainError {
    match err {
        StoreError::UniqueViolation(_) => CatalogError::CategoryExists(slug).into(),
        other => other.into(),
    }
}
