//! Category registry: the fixed table of catalog sections that can be synced

use serde::{Deserialize, Serialize};

use crate::domain::errors::SyncError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDef {
    /// Local name, also the inventory sub-directory
    pub name: String,
    /// Id the remote listing filters by (`categories_id`)
    pub remote_id: u32,
}

impl CategoryDef {
    pub fn new(name: &str, remote_id: u32) -> Self {
        Self {
            name: name.to_string(),
            remote_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: Vec<CategoryDef>,
}

impl CategoryRegistry {
    pub fn new(categories: Vec<CategoryDef>) -> Self {
        Self { categories }
    }

    pub fn all(&self) -> &[CategoryDef] {
        &self.categories
    }

    /// Legacy single-category data belongs to the first registered category
    pub fn first(&self) -> Option<&CategoryDef> {
        self.categories.first()
    }

    pub fn find(&self, name: &str) -> Option<&CategoryDef> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Resolve requested names in the order given; an empty request selects
    /// every registered category. Any unknown name rejects the whole request.
    pub fn resolve(&self, requested: &[String]) -> Result<Vec<CategoryDef>, SyncError> {
        if requested.is_empty() {
            return Ok(self.categories.clone());
        }

        let mut selected: Vec<CategoryDef> = Vec::with_capacity(requested.len());
        for name in requested {
            let category = self.find(name.trim()).ok_or_else(|| SyncError::UnknownCategory {
                name: name.clone(),
                known: self.known_names(),
            })?;
            if !selected.iter().any(|c| c.name == category.name) {
                selected.push(category.clone());
            }
        }
        Ok(selected)
    }

    fn known_names(&self) -> String {
        self.categories
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
