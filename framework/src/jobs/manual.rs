use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{Job, JobContext, JobError};
use crate::mail::MailRequest;
use crate::models::{Plan, User};

pub const MANUAL_ATTACHMENT_NAME: &str = "manual.pdf";

/// Renders a user's plan manual to a file.
///
/// The document backend is pluggable; implementations must either leave a
/// complete file at `path` or return an error.
#[async_trait]
pub trait ManualRenderer: Send + Sync + 'static {
    async fn render(&self, user: &User, plan: &Plan, path: &Path) -> Result<(), JobError>;
}

/// Writes a short personalised guide after a fixed render delay.
#[derive(Debug, Clone)]
pub struct PlainManualRenderer {
    delay: Duration,
}

impl PlainManualRenderer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ManualRenderer for PlainManualRenderer {
    async fn render(&self, user: &User, plan: &Plan, path: &Path) -> Result<(), JobError> {
        tokio::time::sleep(self.delay).await;

        let document = format!(
            "Welcome {}\n\n{} User Guide\n",
            user.full_name(),
            plan.name
        );
        tokio::fs::write(path, document)
            .await
            .map_err(|source| JobError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Renders the plan manual and mails it as an attachment.
#[derive(Debug, Clone)]
pub struct ManualJob {
    pub user: User,
    pub plan: Plan,
}

impl ManualJob {
    pub fn new(user: User, plan: Plan) -> Self {
        Self { user, plan }
    }

    /// Unique per invocation, so two jobs for the same user never share a file.
    fn output_path(&self, tmp_dir: &Path) -> PathBuf {
        tmp_dir.join(format!(
            "{}_{}_manual.pdf",
            self.user.id,
            Uuid::new_v4().simple()
        ))
    }
}

#[async_trait]
impl Job for ManualJob {
    const JOB_TYPE: &'static str = "manual";

    async fn perform(self, ctx: &JobContext) -> Result<(), JobError> {
        let path = self.output_path(&ctx.tmp_dir);
        ctx.renderer.render(&self.user, &self.plan, &path).await?;

        let request = MailRequest::builder()
            .to(&self.user.email)
            .subject("Manual")
            .text("Please find the manual attached.")
            .attach(MANUAL_ATTACHMENT_NAME, &path)
            .remove_attachments_after_send()
            .build()?;

        if let Err(e) = ctx.mailer.enqueue(request).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }

        ctx.errors
            .completed(Self::JOB_TYPE, format!("manual sent to user {}", self.user.id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_renderer_writes_greeting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1_manual.pdf");
        let user = User {
            id: 1,
            email: "a@b.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        };
        let plan = Plan {
            id: 1,
            name: "Gold".into(),
            amount_formatted: "$30.00".into(),
        };

        PlainManualRenderer::new(Duration::ZERO)
            .render(&user, &plan, &path)
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Welcome Ada Lovelace"));
        assert!(content.contains("Gold User Guide"));
    }

    #[test]
    fn output_paths_are_unique_per_invocation() {
        let job = ManualJob::new(
            User {
                id: 42,
                email: "a@b.com".into(),
                first_name: "A".into(),
                last_name: "B".into(),
            },
            Plan {
                id: 1,
                name: "Bronze".into(),
                amount_formatted: "$10.00".into(),
            },
        );
        let first = job.output_path(Path::new("./tmp"));
        let second = job.output_path(Path::new("./tmp"));

        assert_ne!(first, second);
        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("42_"));
        assert!(name.ends_with("_manual.pdf"));
    }
}
