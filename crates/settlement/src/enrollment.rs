//! Enrollment operations - enroll, look up and remove palm templates

use palmpay_biometrics::extract;
use palmpay_core::{validate_user_id, Detection, EnrolledTemplate};
use palmpay_persistence::TemplateRepo;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::services::{ServiceContext, StoreChange, TemplateResult};

/// Enrollment Service - manages the biometric template store
pub struct EnrollmentService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> EnrollmentService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Enroll (or re-enroll) a user's palm from one detection.
    ///
    /// Identical inputs are a no-op; different inputs replace the template,
    /// bump its version and append an `Enrollment` ledger entry.
    pub async fn start_enrollment(
        &self,
        user_id: &str,
        image_ref: &str,
        detection: &Detection,
    ) -> ServiceResult<TemplateResult> {
        validate_user_id(user_id)?;
        if image_ref.trim().is_empty() {
            return Err(ServiceError::EmptyImageRef);
        }
        let features = extract(detection)?;

        let enrollment = self.ctx.db().enroll(user_id, image_ref, &features).await?;
        if enrollment.changed {
            info!(user_id, version = enrollment.template.version, "palm enrolled");
            self.ctx.publish(StoreChange::TemplateEnrolled {
                user_id: user_id.to_string(),
                version: enrollment.template.version,
            });
        } else {
            info!(user_id, "palm already enrolled with identical inputs");
        }
        if let Some(event) = &enrollment.event {
            self.ctx.publish(StoreChange::LedgerAppended {
                event_id: event.id,
                kind: event.kind,
            });
        }

        Ok(TemplateResult {
            event_id: enrollment.event.as_ref().map(|e| e.id),
            template: enrollment.template,
            changed: enrollment.changed,
        })
    }

    pub async fn lookup(&self, user_id: &str) -> ServiceResult<Option<EnrolledTemplate>> {
        Ok(TemplateRepo::get(self.ctx.db().pool(), user_id).await?)
    }

    /// The single enrolled template; fails when several users are enrolled
    pub async fn lookup_any(&self) -> ServiceResult<Option<EnrolledTemplate>> {
        Ok(TemplateRepo::get_any(self.ctx.db().pool()).await?)
    }

    pub async fn count(&self) -> ServiceResult<i64> {
        Ok(TemplateRepo::count(self.ctx.db().pool()).await?)
    }

    /// Delete a user's template. Ledger entries are kept.
    pub async fn remove(&self, user_id: &str) -> ServiceResult<bool> {
        let removed = TemplateRepo::delete(self.ctx.db().pool(), user_id).await?;
        if removed {
            info!(user_id, "palm template removed");
            self.ctx.publish(StoreChange::TemplateRemoved {
                user_id: user_id.to_string(),
            });
        }
        Ok(removed)
    }
}
