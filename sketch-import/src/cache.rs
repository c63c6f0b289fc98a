//! Cache des références (classes de sketch, dossiers) pour un run
//!
//! Chaque table est protégée par un mutex asynchrone tenu pendant le
//! chargement: deux résolutions concurrentes du même dossier ne peuvent
//! pas créer deux dossiers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ImportError;
use crate::model::{Folder, NewSketch, SketchClass};
use crate::store::SketchStore;

/// Cache des classes de sketch et des dossiers
pub struct ReferenceCache {
    store: Arc<dyn SketchStore>,
    classes: Mutex<HashMap<String, Arc<SketchClass>>>,
    folders: Mutex<HashMap<String, Folder>>,
}

impl ReferenceCache {
    pub fn new(store: Arc<dyn SketchStore>) -> Self {
        Self {
            store,
            classes: Mutex::new(HashMap::new()),
            folders: Mutex::new(HashMap::new()),
        }
    }

    /// Stockage sous-jacent
    pub fn store(&self) -> &Arc<dyn SketchStore> {
        &self.store
    }

    /// Vide le cache (entre deux runs)
    pub async fn reset(&self) {
        self.classes.lock().await.clear();
        self.folders.lock().await.clear();
    }

    /// Classe de sketch avec ses attributs actifs indexés par `export_id`
    pub async fn resolve_class(&self, id: &str) -> Result<Arc<SketchClass>, ImportError> {
        let mut classes = self.classes.lock().await;
        if let Some(class) = classes.get(id) {
            return Ok(Arc::clone(class));
        }

        let row = self
            .store
            .find_sketch_class(id)
            .await
            .map_err(ImportError::Store)?
            .ok_or_else(|| ImportError::not_found("SketchClass", id))?;
        let attributes = self
            .store
            .find_form_attributes(&row.id)
            .await
            .map_err(ImportError::Store)?;

        let class = Arc::new(SketchClass::new(row, attributes));
        debug!(
            sketch_class_id = %class.id,
            name = %class.name,
            attributes = class.attributes.len(),
            "Loaded sketch class"
        );
        classes.insert(id.to_string(), Arc::clone(&class));
        Ok(class)
    }

    /// Dossier par nom, créé au premier appel
    pub async fn resolve_or_create_folder(
        &self,
        name: &str,
        sketch_class_id: &str,
        project_id: &str,
        user_id: &str,
    ) -> Result<Folder, ImportError> {
        let mut folders = self.folders.lock().await;
        if let Some(folder) = folders.get(name) {
            return Ok(folder.clone());
        }

        let class = self.resolve_class(sketch_class_id).await?;
        let sketch = NewSketch::folder(name, &class.id, project_id, user_id);
        let id = self
            .store
            .create_sketch(&sketch)
            .await
            .map_err(ImportError::Store)?;

        info!(folder = name, id = %id, sketch_class_id = %class.id, "Created folder");

        let folder = Folder {
            id,
            name: name.to_string(),
            sketch_class_id: class.id.clone(),
        };
        folders.insert(name.to_string(), folder.clone());
        Ok(folder)
    }

    /// Nombre de classes en cache
    pub async fn cached_classes(&self) -> usize {
        self.classes.lock().await.len()
    }

    /// Nombre de dossiers en cache
    pub async fn cached_folders(&self) -> usize {
        self.folders.lock().await.len()
    }
}
