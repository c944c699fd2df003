//! Project marketplace endpoints

use actix_web::{HttpResponse, Scope, get, post, put, web};
use serde::Deserialize;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use bazaar_common::{
    BazaarError, DEFAULT_PAGE_SIZE, Feature, NotificationType, ProjectStatus, UserType,
};
use bazaar_persistence::{NewNotification, NewProject, Page, ProjectInfo, ProjectQuery};

use crate::{
    auth::model::AuthUser,
    error::AppError,
    middleware::FeatureGate,
    model::{AppState, response},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectListQuery {
    status: Option<String>,
    client_id: Option<String>,
    professional_id: Option<String>,
    page_no: Option<u64>,
    page_size: Option<u64>,
}

fn validate_skills(skills: &[String]) -> Result<(), ValidationError> {
    if skills.iter().any(|skill| skill.trim().is_empty() || skill.len() > 50) {
        let mut error = ValidationError::new("skills");
        error.message = Some("each skill must be 1 to 50 characters".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_budget"))]
struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    title: String,
    #[validate(length(min = 1, max = 10000, message = "must be 1 to 10000 characters"))]
    description: String,
    #[validate(range(min = 0_i64, max = 100_000_000_000_i64, message = "must be 0 to 100000000000 cents"))]
    budget_min: i64,
    #[validate(range(min = 0_i64, max = 100_000_000_000_i64, message = "must be 0 to 100000000000 cents"))]
    budget_max: i64,
    #[validate(range(min = 1, max = 365, message = "must be 1 to 365 days"))]
    timeline_days: i32,
    #[serde(default)]
    #[validate(length(max = 20, message = "at most 20 skills"), custom(function = "validate_skills"))]
    skills: Vec<String>,
    /// Create as draft instead of publishing right away
    #[serde(default)]
    draft: bool,
}

fn validate_budget(request: &CreateProjectRequest) -> Result<(), ValidationError> {
    if request.budget_max < request.budget_min {
        let mut error = ValidationError::new("budget");
        error.message = Some("budgetMax must not be below budgetMin".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignRequest {
    professional_id: String,
}

fn parse_status(value: &str) -> Result<ProjectStatus, AppError> {
    value
        .parse::<ProjectStatus>()
        .map_err(|e| BazaarError::IllegalArgument(e).into())
}

async fn find_project(data: &AppState, id: &str) -> Result<ProjectInfo, AppError> {
    data.persistence()
        .project_find(id)
        .await?
        .ok_or_else(|| BazaarError::NotFound(format!("project {}", id)).into())
}

/// Notify the other party of a project change; failures are only logged
async fn notify_project(data: &AppState, user_id: &str, project: &ProjectInfo, body: String) {
    let notification = NewNotification {
        user_id: user_id.to_string(),
        r#type: NotificationType::Project.to_string(),
        title: project.title.clone(),
        body,
        action_url: Some(format!("/projects/{}", project.id)),
    };
    if let Err(e) = data.messaging.notify(notification).await {
        warn!(project_id = %project.id, "Failed to notify {}: {}", user_id, e);
    }
}

fn invalidate_parties(data: &AppState, project: &ProjectInfo) {
    data.dashboards.invalidate_user(&project.client_id);
    if let Some(professional_id) = &project.professional_id {
        data.dashboards.invalidate_user(professional_id);
    }
}

#[get("")]
async fn list(
    data: web::Data<AppState>,
    params: web::Query<ProjectListQuery>,
) -> Result<HttpResponse, AppError> {
    let params = params.into_inner();
    let status = params
        .status
        .as_deref()
        .map(parse_status)
        .transpose()?
        .map(|status| status.to_string());

    let query = ProjectQuery {
        status,
        client_id: params.client_id,
        professional_id: params.professional_id,
        page_no: params.page_no.unwrap_or(1),
        page_size: params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    };
    let page = data.persistence().project_find_page(&query).await?;

    Ok(response::Result::<Page<ProjectInfo>>::http_success(page))
}

#[get("/{id}")]
async fn detail(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let project = find_project(&data, &path.into_inner()).await?;
    Ok(response::Result::<ProjectInfo>::http_success(project))
}

#[post("", wrap = "FeatureGate::usage(Feature::ProjectPosts)")]
async fn create(
    data: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<CreateProjectRequest>,
) -> Result<HttpResponse, AppError> {
    if user.user_type != UserType::Client {
        return Err(BazaarError::AccessDenied("only clients can post projects".to_string()).into());
    }
    let request = body.into_inner();
    request.validate()?;

    let status = if request.draft {
        ProjectStatus::Draft
    } else {
        ProjectStatus::Open
    };
    let project = data
        .persistence()
        .project_create(NewProject {
            client_id: user.user_id.clone(),
            title: request.title.trim().to_string(),
            description: request.description,
            status: status.to_string(),
            budget_min: request.budget_min,
            budget_max: request.budget_max,
            timeline_days: request.timeline_days,
            skills: request.skills.into_iter().map(|s| s.trim().to_string()).collect(),
        })
        .await?;

    info!(project_id = %project.id, client_id = %user.user_id, "Project posted");
    data.dashboards.invalidate_user(&user.user_id);

    Ok(response::Result::<ProjectInfo>::http_created(project))
}

#[put("/{id}/status")]
async fn update_status(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let project = find_project(&data, &path.into_inner()).await?;
    let is_client = project.client_id == user.user_id;
    let is_professional = project.professional_id.as_deref() == Some(user.user_id.as_str());
    if !is_client && !is_professional {
        return Err(BazaarError::AccessDenied("not a party to this project".to_string()).into());
    }

    let current = parse_status(&project.status)?;
    let next = parse_status(&body.status)?;
    if !current.can_transition_to(next) {
        return Err(BazaarError::IllegalArgument(format!(
            "project cannot move from {} to {}",
            current, next
        ))
        .into());
    }

    let updated = data
        .persistence()
        .project_update_status(&project.id, current.as_str(), next.as_str())
        .await?
        .ok_or_else(|| BazaarError::NotFound(format!("project {}", project.id)))?;

    info!(project_id = %updated.id, from = %current, to = %next, "Project status changed");
    invalidate_parties(&data, &updated);

    let counterpart = if is_client {
        updated.professional_id.clone()
    } else {
        Some(updated.client_id.clone())
    };
    if let Some(counterpart) = counterpart {
        notify_project(&data, &counterpart, &updated, format!("Project is now {}.", next)).await;
    }

    Ok(response::Result::<ProjectInfo>::http_success(updated))
}

#[put("/{id}/assign", wrap = "FeatureGate::usage(Feature::ActiveProjects)")]
async fn assign(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<AssignRequest>,
) -> Result<HttpResponse, AppError> {
    let project = find_project(&data, &path.into_inner()).await?;
    if project.client_id != user.user_id {
        return Err(
            BazaarError::AccessDenied("only the project owner can assign it".to_string()).into(),
        );
    }
    if parse_status(&project.status)? != ProjectStatus::Open {
        return Err(BazaarError::IllegalState(format!(
            "only open projects can be assigned, project is {}",
            project.status
        ))
        .into());
    }

    let professional = data
        .persistence()
        .user_find_by_id(&body.professional_id)
        .await?
        .ok_or_else(|| BazaarError::NotFound(format!("user {}", body.professional_id)))?;
    if professional.user_type != UserType::Professional.as_str() {
        return Err(BazaarError::IllegalArgument(format!(
            "user {} is not a professional",
            professional.id
        ))
        .into());
    }

    let updated = data
        .persistence()
        .project_assign(
            &project.id,
            &professional.id,
            ProjectStatus::Open.as_str(),
            ProjectStatus::InProgress.as_str(),
        )
        .await?
        .ok_or_else(|| BazaarError::NotFound(format!("project {}", project.id)))?;

    info!(project_id = %updated.id, professional_id = %professional.id, "Project assigned");
    invalidate_parties(&data, &updated);
    notify_project(
        &data,
        &professional.id,
        &updated,
        "You have been assigned to this project.".to_string(),
    )
    .await;

    Ok(response::Result::<ProjectInfo>::http_success(updated))
}

pub fn routes() -> Scope {
    web::scope("/projects")
        .service(list)
        .service(create)
        .service(detail)
        .service(update_status)
        .service(assign)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(budget_min: i64, budget_max: i64) -> CreateProjectRequest {
        CreateProjectRequest {
            title: "Landing page".to_string(),
            description: "Build a landing page".to_string(),
            budget_min,
            budget_max,
            timeline_days: 14,
            skills: vec!["rust".to_string()],
            draft: false,
        }
    }

    #[test]
    fn test_budget_bounds_are_checked() {
        assert!(request(100, 500).validate().is_ok());
        assert!(request(500, 100).validate().is_err());
        assert!(request(-1, 100).validate().is_err());
        assert!(request(0, 100_000_000_000).validate().is_ok());
        assert!(request(0, 100_000_000_001).validate().is_err());
    }

    #[test]
    fn test_blank_skill_is_rejected() {
        let mut invalid = request(0, 10);
        invalid.skills.push("  ".to_string());
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("in_progress").unwrap(), ProjectStatus::InProgress);
        assert!(parse_status("archived").is_err());
    }
}
