use rusqlite::{params, OptionalExtension};

use crate::db::{Database, DbResult};
use crate::models::{EmailAnalysis, EmailSummary};

impl Database {
    pub fn get_email_summary(&self, user_id: i64, original_email_id: &str) -> DbResult<Option<EmailSummary>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT email_id, user_id, original_email_id, sender, subject, summary_text, priority, category, received_at
                 FROM email_summaries WHERE user_id = ?1 AND original_email_id = ?2",
                params![user_id, original_email_id],
                |row| {
                    Ok(EmailSummary {
                        email_id: row.get(0)?,
                        user_id: row.get(1)?,
                        original_email_id: row.get(2)?,
                        sender: row.get(3)?,
                        subject: row.get(4)?,
                        summary_text: row.get(5)?,
                        priority: row.get(6)?,
                        category: row.get(7)?,
                        received_at: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn save_email_summary(
        &self,
        user_id: i64,
        original_email_id: &str,
        sender: &str,
        subject: &str,
        received_at: Option<&str>,
        analysis: &EmailAnalysis,
    ) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO email_summaries (user_id, original_email_id, sender, subject, summary_text, priority, category, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user_id, original_email_id) DO UPDATE SET
                summary_text = excluded.summary_text,
                priority = excluded.priority,
                category = excluded.category",
            params![
                user_id,
                original_email_id,
                sender,
                subject,
                analysis.summary,
                analysis.priority.as_ref(),
                analysis.category.as_ref(),
                received_at
            ],
        )?;
        Ok(())
    }
}
