use log::{debug, info};

use crate::{
    core::variables::Variables,
    repository::{normalize_path, Repository, DIRECTORY_SEPARATOR},
    transformation::{StepRegistry, TransformationMeta},
    BatchError,
};

use super::meta::{MetaInjectMeta, SpecificationMethod};

/// Extension of template files.
pub const TEMPLATE_EXTENSION: &str = ".ktr";

pub const INTERNAL_TRANSFORMATION_NAME: &str = "Internal.Transformation.Name";
pub const INTERNAL_TRANSFORMATION_FILENAME_DIRECTORY: &str =
    "Internal.Transformation.Filename.Directory";
pub const INTERNAL_TRANSFORMATION_FILENAME_NAME: &str = "Internal.Transformation.Filename.Name";

/// Loads the template a [`MetaInjectMeta`] points at.
///
/// Every path and name is resolved against the given variables first. A
/// file name is looked up in the repository when there is one, and on the
/// filesystem otherwise or when the repository does not have it.
pub struct TemplateLoader<'a> {
    registry: &'a StepRegistry,
    repository: Option<&'a dyn Repository>,
}

impl<'a> TemplateLoader<'a> {
    pub fn new(registry: &'a StepRegistry, repository: Option<&'a dyn Repository>) -> Self {
        Self {
            registry,
            repository,
        }
    }

    /// Loads the template and copies `variables` into it.
    ///
    /// # Errors
    /// [`BatchError::TemplateLoad`] naming the path, name or id that was
    /// tried.
    pub fn load(
        &self,
        meta: &MetaInjectMeta,
        variables: &Variables,
    ) -> Result<TransformationMeta, BatchError> {
        let mut template = match meta.specification_method() {
            SpecificationMethod::Filename => self.load_by_filename(meta, variables)?,
            SpecificationMethod::RepositoryByName => self.load_by_name(meta, variables)?,
            SpecificationMethod::RepositoryByReference => self.load_by_reference(meta)?,
        };

        template.copy_variables_from(variables);
        set_internal_variables(&mut template);

        info!(
            "Loaded template transformation {} with {} step(s)",
            template.name,
            template.steps.len()
        );
        Ok(template)
    }

    fn load_by_filename(
        &self,
        meta: &MetaInjectMeta,
        variables: &Variables,
    ) -> Result<TransformationMeta, BatchError> {
        let file_name = variables.substitute(meta.file_name().unwrap_or_default());
        if file_name.trim().is_empty() {
            return Err(BatchError::TemplateLoad(
                "no file name specified for the template".to_string(),
            ));
        }

        if let Some(repository) = self.repository {
            if let Some(template) = self.find_in_repository(repository, &file_name) {
                return Ok(template);
            }
        }

        self.load_file(&file_name)
    }

    fn find_in_repository(
        &self,
        repository: &dyn Repository,
        file_name: &str,
    ) -> Option<TransformationMeta> {
        let path = normalize_path(file_name);
        let (directory, name) = path.rsplit_once(DIRECTORY_SEPARATOR)?;
        let directory = repository.find_directory(directory)?;

        let mut names = vec![name];
        if let Some(stripped) = name.strip_suffix(TEMPLATE_EXTENSION) {
            names.push(stripped);
        }

        names.into_iter().find_map(|candidate| {
            match repository.load_transformation(candidate, &directory, self.registry) {
                Ok(template) => Some(template),
                Err(e) => {
                    debug!(
                        "Template {} not in repository directory {}: {}",
                        candidate, directory, e
                    );
                    None
                }
            }
        })
    }

    fn load_file(&self, path: &str) -> Result<TransformationMeta, BatchError> {
        TransformationMeta::from_file(path, self.registry).map_err(|e| {
            BatchError::TemplateLoad(format!("unable to read template file '{}': {}", path, e))
        })
    }

    fn load_by_name(
        &self,
        meta: &MetaInjectMeta,
        variables: &Variables,
    ) -> Result<TransformationMeta, BatchError> {
        let name = variables.substitute(meta.trans_name().unwrap_or_default());
        let directory = variables.substitute(meta.directory_path().unwrap_or_default());

        let Some(repository) = self.repository else {
            let path = format!("{}{}{}", directory, DIRECTORY_SEPARATOR, name);
            return self.load_file(&path).or_else(|_| {
                self.load_file(&format!("{}{}", path, TEMPLATE_EXTENSION))
                    .map_err(|e| {
                        BatchError::TemplateLoad(format!(
                            "template '{}' is stored in a repository and none is connected: {}",
                            path, e
                        ))
                    })
            });
        };

        if name.trim().is_empty() || directory.trim().is_empty() {
            return Err(BatchError::TemplateLoad(format!(
                "empty template name '{}' or directory '{}'",
                name, directory
            )));
        }

        let found = repository.find_directory(&directory).ok_or_else(|| {
            BatchError::TemplateLoad(format!("unable to find repository directory '{}'", directory))
        })?;

        repository
            .load_transformation(&name, &found, self.registry)
            .map_err(|e| {
                BatchError::TemplateLoad(format!(
                    "unable to load transformation '{}': {}",
                    name, e
                ))
            })
    }

    fn load_by_reference(&self, meta: &MetaInjectMeta) -> Result<TransformationMeta, BatchError> {
        let id = meta.trans_object_id().ok_or_else(|| {
            BatchError::TemplateLoad("no object id specified for the template".to_string())
        })?;
        let repository = self.repository.ok_or_else(|| {
            BatchError::TemplateLoad(format!(
                "template {} is referenced in a repository and none is connected",
                id
            ))
        })?;

        repository
            .load_transformation_by_id(id, self.registry)
            .map_err(|e| {
                BatchError::TemplateLoad(format!("unable to load transformation {}: {}", id, e))
            })
    }
}

fn set_internal_variables(template: &mut TransformationMeta) {
    let name = template.name.clone();
    template.variables.set(INTERNAL_TRANSFORMATION_NAME, &name);

    if let Some(filename) = template.filename.clone() {
        let path = std::path::Path::new(&filename);
        let directory = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        template
            .variables
            .set(INTERNAL_TRANSFORMATION_FILENAME_DIRECTORY, &directory);
        template.variables.set(INTERNAL_TRANSFORMATION_FILENAME_NAME, &file);
    } else if let Some(directory) = template.repository_directory.clone() {
        template
            .variables
            .set(INTERNAL_TRANSFORMATION_FILENAME_DIRECTORY, &directory);
    }
}
