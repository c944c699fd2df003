//! Project persistence trait

use async_trait::async_trait;

use crate::model::{NewProject, Page, ProjectInfo, ProjectQuery};

#[async_trait]
pub trait ProjectPersistence: Send + Sync {
    async fn project_create(&self, project: NewProject) -> anyhow::Result<ProjectInfo>;

    async fn project_find(&self, id: &str) -> anyhow::Result<Option<ProjectInfo>>;

    /// Search projects with pagination, newest first
    async fn project_find_page(&self, query: &ProjectQuery) -> anyhow::Result<Page<ProjectInfo>>;

    /// All projects where the user is the client or the assigned professional
    async fn project_list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<ProjectInfo>>;

    /// Move the project from `expected_status` to `status`.
    ///
    /// `None` when the project does not exist; `IllegalState` when its status
    /// is no longer `expected_status`.
    async fn project_update_status(
        &self,
        id: &str,
        expected_status: &str,
        status: &str,
    ) -> anyhow::Result<Option<ProjectInfo>>;

    /// Assign a professional to an unassigned project in `expected_status`
    /// and move it to `status`, failing like `project_update_status`
    async fn project_assign(
        &self,
        id: &str,
        professional_id: &str,
        expected_status: &str,
        status: &str,
    ) -> anyhow::Result<Option<ProjectInfo>>;
}
