use std::{
    collections::{BTreeSet, HashMap},
    sync::{Mutex, MutexGuard},
};

use indexmap::IndexMap;
use log::debug;

use crate::{
    transformation::{StepRegistry, TransformationMeta},
    BatchError,
};

use super::{normalize_path, AttributeValue, ObjectId, Repository, DIRECTORY_SEPARATOR};

#[derive(Debug, Clone)]
struct StoredTransformation {
    name: String,
    directory: String,
    document: String,
}

#[derive(Debug)]
struct State {
    directories: BTreeSet<String>,
    transformations: IndexMap<ObjectId, StoredTransformation>,
    attributes: HashMap<(ObjectId, String, usize), AttributeValue>,
}

/// A repository held in memory, safe to share between threads.
///
/// Transformations are stored as their JSON documents, so loading one goes
/// through a [`StepRegistry`] exactly like a template file.
#[derive(Debug)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        let mut directories = BTreeSet::new();
        directories.insert(DIRECTORY_SEPARATOR.to_string());
        Self {
            state: Mutex::new(State {
                directories,
                transformations: IndexMap::new(),
                attributes: HashMap::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of stored transformations.
    pub fn transformation_count(&self) -> usize {
        self.state().transformations.len()
    }
}

impl Repository for InMemoryRepository {
    fn find_directory(&self, path: &str) -> Option<String> {
        let path = normalize_path(path);
        self.state().directories.contains(&path).then_some(path)
    }

    fn create_directory(&self, path: &str) -> Result<String, BatchError> {
        let path = normalize_path(path);
        let mut state = self.state();

        let mut current = String::new();
        for part in path.split(DIRECTORY_SEPARATOR).filter(|p| !p.is_empty()) {
            current.push_str(DIRECTORY_SEPARATOR);
            current.push_str(part);
            if state.directories.insert(current.clone()) {
                debug!("Created repository directory {}", current);
            }
        }

        Ok(path)
    }

    fn load_transformation(
        &self,
        name: &str,
        directory: &str,
        registry: &StepRegistry,
    ) -> Result<TransformationMeta, BatchError> {
        let id = self.transformation_id(name, directory).ok_or_else(|| {
            BatchError::Repository(format!(
                "transformation '{}' not found in directory '{}'",
                name, directory
            ))
        })?;
        self.load_transformation_by_id(&id, registry)
    }

    fn load_transformation_by_id(
        &self,
        id: &ObjectId,
        registry: &StepRegistry,
    ) -> Result<TransformationMeta, BatchError> {
        let stored = self
            .state()
            .transformations
            .get(id)
            .cloned()
            .ok_or_else(|| BatchError::Repository(format!("no transformation with id {}", id)))?;

        let mut meta = TransformationMeta::from_json(&stored.document, registry)?;
        meta.name = stored.name;
        meta.repository_directory = Some(stored.directory);
        meta.object_id = Some(id.clone());
        Ok(meta)
    }

    fn transformation_id(&self, name: &str, directory: &str) -> Option<ObjectId> {
        let directory = normalize_path(directory);
        self.state()
            .transformations
            .iter()
            .find(|(_, t)| t.name == name && t.directory == directory)
            .map(|(id, _)| id.clone())
    }

    fn save_transformation(&self, meta: &TransformationMeta) -> Result<ObjectId, BatchError> {
        let directory = normalize_path(meta.repository_directory.as_deref().unwrap_or_default());
        let document = meta.to_json()?;

        let mut state = self.state();
        if !state.directories.contains(&directory) {
            return Err(BatchError::Repository(format!(
                "directory '{}' does not exist",
                directory
            )));
        }

        let id = meta.object_id.clone().unwrap_or_else(ObjectId::generate);
        state.transformations.insert(
            id.clone(),
            StoredTransformation {
                name: meta.name.clone(),
                directory,
                document,
            },
        );
        Ok(id)
    }

    fn save_step_attribute(
        &self,
        step_id: &ObjectId,
        nr: usize,
        code: &str,
        value: AttributeValue,
    ) -> Result<(), BatchError> {
        self.state()
            .attributes
            .insert((step_id.clone(), code.to_string(), nr), value);
        Ok(())
    }

    fn step_attribute(&self, step_id: &ObjectId, nr: usize, code: &str) -> Option<AttributeValue> {
        self.state()
            .attributes
            .get(&(step_id.clone(), code.to_string(), nr))
            .cloned()
    }

    fn count_step_attributes(&self, step_id: &ObjectId, code: &str) -> usize {
        self.state()
            .attributes
            .keys()
            .filter(|(id, c, _)| id == step_id && c == code)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::RowGeneratorMeta;

    fn template(name: &str) -> TransformationMeta {
        let mut meta = TransformationMeta::new(name);
        meta.add_step("Generator", Box::new(RowGeneratorMeta::default()));
        meta
    }

    #[test]
    fn directories_are_created_with_parents() -> Result<(), BatchError> {
        let repository = InMemoryRepository::new();
        assert_eq!(repository.create_directory("etl/generated/")?, "/etl/generated");

        assert_eq!(repository.find_directory("/etl"), Some("/etl".to_string()));
        assert!(repository.find_directory("/other").is_none());
        assert!(repository.find_directory("/").is_some());
        Ok(())
    }

    #[test]
    fn saving_twice_with_the_id_updates_in_place() -> Result<(), BatchError> {
        let repository = InMemoryRepository::new();
        repository.create_directory("/etl")?;

        let mut meta = template("load");
        meta.repository_directory = Some("/etl".to_string());
        let id = repository.save_transformation(&meta)?;

        meta.object_id = Some(id.clone());
        let second = repository.save_transformation(&meta)?;

        assert_eq!(id, second);
        assert_eq!(repository.transformation_count(), 1);
        assert_eq!(repository.transformation_id("load", "etl"), Some(id.clone()));

        let loaded = repository.load_transformation("load", "/etl", StepRegistry::builtin())?;
        assert_eq!(loaded.object_id, Some(id));
        assert_eq!(loaded.repository_directory.as_deref(), Some("/etl"));
        assert_eq!(loaded.step_names(), vec!["Generator".to_string()]);
        Ok(())
    }

    #[test]
    fn saving_into_a_missing_directory_fails() {
        let repository = InMemoryRepository::new();
        let mut meta = template("load");
        meta.repository_directory = Some("/nowhere".to_string());

        let result = repository.save_transformation(&meta);
        assert!(matches!(result, Err(BatchError::Repository(_))));
    }

    #[test]
    fn step_attributes_are_counted_per_code() -> Result<(), BatchError> {
        let repository = InMemoryRepository::new();
        let step = ObjectId::new("step-1");

        for nr in 0..3 {
            repository.save_step_attribute(
                &step,
                nr,
                "mapping_source_step",
                AttributeValue::String(Some(format!("s{}", nr))),
            )?;
        }
        repository.save_step_attribute(&step, 0, "no_execution", AttributeValue::Boolean(true))?;

        assert_eq!(repository.count_step_attributes(&step, "mapping_source_step"), 3);
        assert_eq!(
            repository.step_attribute_string(&step, 2, "mapping_source_step"),
            Some("s2".to_string())
        );
        assert!(repository.step_attribute_boolean(&step, 0, "no_execution"));
        assert_eq!(repository.step_attribute_integer(&step, 0, "missing"), 0);
        Ok(())
    }
}
