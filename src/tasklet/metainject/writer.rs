use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, Mutex, MutexGuard},
};

use log::{debug, info};

use crate::{
    core::{row::parse_boolean, variables::Variables},
    repository::{normalize_path, ObjectId, Repository, DIRECTORY_SEPARATOR},
    transformation::TransformationMeta,
    BatchError,
};

use super::loader::TEMPLATE_EXTENSION;

/// When set to a true value, injected templates are written to the
/// filesystem even when a repository is connected.
pub const FORCE_FILESYSTEM_VARIABLE: &str =
    "KETTLE_COMPATIBILITY_MDI_INJECTED_FILE_ALWAYS_IN_FILESYSTEM";

/// Serialises writes of injected templates into a repository.
#[derive(Debug)]
pub struct RepositoryWriteLock {
    name: String,
    lock: Mutex<()>,
}

static SHARED_WRITE_LOCK: LazyLock<RepositoryWriteLock> =
    LazyLock::new(|| RepositoryWriteLock::new("metainject-repository-save"));

impl RepositoryWriteLock {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lock: Mutex::new(()),
        }
    }

    /// The lock shared by every injection step of the process.
    pub fn shared() -> &'static RepositoryWriteLock {
        &SHARED_WRITE_LOCK
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        debug!("Acquiring repository write lock {}", self.name);
        match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Where an injected template ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrittenTemplate {
    File(PathBuf),
    Repository(ObjectId),
}

/// Writes an injected template to a file or to a repository, never both.
pub struct InjectedTemplateWriter<'a> {
    repository: Option<&'a dyn Repository>,
    lock: &'a RepositoryWriteLock,
    force_filesystem: bool,
}

impl<'a> InjectedTemplateWriter<'a> {
    pub fn new(repository: Option<&'a dyn Repository>, lock: &'a RepositoryWriteLock) -> Self {
        Self {
            repository,
            lock,
            force_filesystem: false,
        }
    }

    pub fn force_filesystem(mut self, force_filesystem: bool) -> Self {
        self.force_filesystem = force_filesystem;
        self
    }

    /// Reads the filesystem override from `variables`.
    pub fn with_variables(self, variables: &Variables) -> Self {
        let force = variables
            .get(FORCE_FILESYSTEM_VARIABLE)
            .is_some_and(parse_boolean);
        self.force_filesystem(force)
    }

    /// Writes `template` to `target`.
    ///
    /// # Errors
    /// [`BatchError::ItemWriter`] wrapping the I/O or repository failure.
    pub fn write(
        &self,
        template: &TransformationMeta,
        target: &str,
    ) -> Result<WrittenTemplate, BatchError> {
        let written = match self.repository {
            Some(repository) if !self.force_filesystem => {
                self.write_to_repository(repository, template, target)
            }
            _ => write_to_file(template, target),
        };

        written.map_err(|e| {
            BatchError::ItemWriter(format!(
                "unable to write injected transformation to '{}': {}",
                target, e
            ))
        })
    }

    fn write_to_repository(
        &self,
        repository: &dyn Repository,
        template: &TransformationMeta,
        target: &str,
    ) -> Result<WrittenTemplate, BatchError> {
        let _guard = self.lock.acquire();

        let path = normalize_path(target);
        let (directory, file) = path
            .rsplit_once(DIRECTORY_SEPARATOR)
            .unwrap_or((DIRECTORY_SEPARATOR, path.as_str()));

        let directory = if directory.is_empty() {
            template
                .repository_directory
                .clone()
                .unwrap_or_else(|| DIRECTORY_SEPARATOR.to_string())
        } else {
            directory.to_string()
        };
        let directory = match repository.find_directory(&directory) {
            Some(found) => found,
            None => repository.create_directory(&directory)?,
        };

        let mut generated = template.clone();
        generated.name = trans_name(file);
        generated.filename = None;
        generated.object_id = repository.transformation_id(&generated.name, &directory);
        generated.repository_directory = Some(directory.clone());

        let id = repository.save_transformation(&generated)?;
        info!(
            "Saved injected transformation {} in repository directory {}",
            generated.name, directory
        );
        Ok(WrittenTemplate::Repository(id))
    }
}

fn trans_name(file: &str) -> String {
    file.strip_suffix(TEMPLATE_EXTENSION).unwrap_or(file).to_string()
}

fn write_to_file(
    template: &TransformationMeta,
    target: &str,
) -> Result<WrittenTemplate, BatchError> {
    let path = Path::new(target);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut generated = template.clone();
    if let Some(file) = path.file_name() {
        generated.name = trans_name(&file.to_string_lossy());
    }

    fs::write(path, generated.to_json()?)?;
    info!("Wrote injected transformation to {}", path.display());
    Ok(WrittenTemplate::File(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        repository::InMemoryRepository,
        steps::RowGeneratorMeta,
        transformation::StepRegistry,
    };

    fn template() -> TransformationMeta {
        let mut meta = TransformationMeta::new("template");
        meta.add_step("Generator", Box::new(RowGeneratorMeta::default()));
        meta
    }

    #[test]
    fn writes_file_named_after_target() -> Result<(), BatchError> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("out/generated.ktr");
        let lock = RepositoryWriteLock::new("test");

        let written = InjectedTemplateWriter::new(None, &lock)
            .write(&template(), &target.to_string_lossy())?;

        assert_eq!(written, WrittenTemplate::File(target.clone()));
        let loaded = TransformationMeta::from_file(&target, StepRegistry::builtin())?;
        assert_eq!(loaded.name, "generated");
        assert_eq!(loaded.step_names(), vec!["Generator".to_string()]);
        Ok(())
    }

    #[test]
    fn rewrites_in_place_in_repository() -> Result<(), BatchError> {
        let repository = InMemoryRepository::new();
        let lock = RepositoryWriteLock::new("test");
        let writer = InjectedTemplateWriter::new(Some(&repository), &lock);

        let first = writer.write(&template(), "/generated/out.ktr")?;
        let second = writer.write(&template(), "/generated/out.ktr")?;

        assert_eq!(first, second);
        assert_eq!(repository.transformation_count(), 1);
        assert!(repository.find_directory("/generated").is_some());
        assert!(repository.transformation_id("out", "/generated").is_some());
        Ok(())
    }

    #[test]
    fn variable_forces_filesystem() -> Result<(), BatchError> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("forced.ktr");
        let repository = InMemoryRepository::new();
        let lock = RepositoryWriteLock::new("test");
        let variables = Variables::new().with(FORCE_FILESYSTEM_VARIABLE, "Y");

        let written = InjectedTemplateWriter::new(Some(&repository), &lock)
            .with_variables(&variables)
            .write(&template(), &target.to_string_lossy())?;

        assert!(matches!(written, WrittenTemplate::File(_)));
        assert_eq!(repository.transformation_count(), 0);
        Ok(())
    }

    #[test]
    fn failed_write_is_wrapped() -> Result<(), BatchError> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory")?;
        let target = blocker.join("out.ktr");
        let lock = RepositoryWriteLock::new("test");

        let result =
            InjectedTemplateWriter::new(None, &lock).write(&template(), &target.to_string_lossy());

        assert!(matches!(result, Err(BatchError::ItemWriter(_))));
        Ok(())
    }

    #[test]
    fn shared_lock_is_a_single_instance() {
        assert!(std::ptr::eq(RepositoryWriteLock::shared(), RepositoryWriteLock::shared()));
        assert_eq!(RepositoryWriteLock::shared().name(), "metainject-repository-save");
    }
}
