//! Mock version of the template repository.
use mockall::mock;

use spring_batch_metainject::{
    repository::{AttributeValue, ObjectId, Repository},
    transformation::{StepRegistry, TransformationMeta},
    BatchError,
};

mock! {
    pub Repo {}
    impl Repository for Repo {
        fn find_directory(&self, path: &str) -> Option<String>;
        fn create_directory(&self, path: &str) -> Result<String, BatchError>;
        fn load_transformation(
            &self,
            name: &str,
            directory: &str,
            registry: &StepRegistry,
        ) -> Result<TransformationMeta, BatchError>;
        fn load_transformation_by_id(
            &self,
            id: &ObjectId,
            registry: &StepRegistry,
        ) -> Result<TransformationMeta, BatchError>;
        fn transformation_id(&self, name: &str, directory: &str) -> Option<ObjectId>;
        fn save_transformation(&self, meta: &TransformationMeta) -> Result<ObjectId, BatchError>;
        fn save_step_attribute(
            &self,
            step_id: &ObjectId,
            nr: usize,
            code: &str,
            value: AttributeValue,
        ) -> Result<(), BatchError>;
        fn step_attribute(
            &self,
            step_id: &ObjectId,
            nr: usize,
            code: &str,
        ) -> Option<AttributeValue>;
        fn count_step_attributes(&self, step_id: &ObjectId, code: &str) -> usize;
    }
}
