use async_trait::async_trait;

use super::{Job, JobContext, JobError};
use crate::mail::MailRequest;
use crate::models::{Plan, User};

pub const INVOICE_TEMPLATE: &str = "invoice";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub user_id: i64,
    pub plan_id: i64,
    pub amount: String,
}

/// Price the subscription. Reads the plan's formatted amount; a plan without
/// one cannot be invoiced.
pub fn compute_invoice(user: &User, plan: &Plan) -> Result<Invoice, JobError> {
    let amount = plan.amount_formatted.trim();
    if amount.is_empty() {
        return Err(JobError::Invoice(format!("plan {} has no amount", plan.id)));
    }
    Ok(Invoice {
        user_id: user.id,
        plan_id: plan.id,
        amount: amount.to_string(),
    })
}

/// Computes the invoice and mails it with the `invoice` template.
#[derive(Debug, Clone)]
pub struct InvoiceJob {
    pub user: User,
    pub plan: Plan,
}

impl InvoiceJob {
    pub fn new(user: User, plan: Plan) -> Self {
        Self { user, plan }
    }
}

#[async_trait]
impl Job for InvoiceJob {
    const JOB_TYPE: &'static str = "invoice";

    async fn perform(self, ctx: &JobContext) -> Result<(), JobError> {
        let invoice = compute_invoice(&self.user, &self.plan)?;

        let request = MailRequest::builder()
            .to(&self.user.email)
            .subject("Invoice")
            .template(INVOICE_TEMPLATE)
            .text(invoice.amount)
            .build()?;
        ctx.mailer.enqueue(request).await?;

        tracing::debug!(user_id = self.user.id, plan_id = self.plan.id, "invoice queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 1,
            email: "admin@example.com".into(),
            first_name: "Admin".into(),
            last_name: "User".into(),
        }
    }

    #[test]
    fn invoice_uses_formatted_amount() {
        let plan = Plan {
            id: 2,
            name: "Silver".into(),
            amount_formatted: "$20.00".into(),
        };
        let invoice = compute_invoice(&user(), &plan).unwrap();
        assert_eq!(invoice.amount, "$20.00");
        assert_eq!(invoice.plan_id, 2);
    }

    #[test]
    fn plan_without_amount_fails() {
        let plan = Plan {
            id: 3,
            name: "Broken".into(),
            amount_formatted: "  ".into(),
        };
        assert!(matches!(
            compute_invoice(&user(), &plan),
            Err(JobError::Invoice(_))
        ));
    }
}
