//! Prompt and email composition for a remediation job.
//!
//! Everything here is pure string building; the engine feeds the results to
//! the generator and mailer.

use crate::model::StudentPerformance;
use crate::topics::clean_question_text;
use crate::traits::{Attachment, EmailMessage, RenderedDocument};

/// At most this many failed questions are listed in an email.
pub const MAX_LISTED_QUESTIONS: usize = 5;

/// Build the generation prompt for one student.
pub fn build_study_prompt(
    subject: &str,
    student_id: &str,
    topics: &[String],
    failed_questions: &[String],
    context: &str,
) -> String {
    let questions = failed_questions
        .iter()
        .map(|q| format!("- {q}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert educator creating personalized remedial content for a {subject} student.\n\
         \n\
         Student: {student_id}\n\
         Topics they struggled with: {topics}\n\
         \n\
         Questions they got wrong:\n\
         {questions}\n\
         \n\
         Context from knowledge base:\n\
         {context}\n\
         \n\
         Create a comprehensive study guide that:\n\
         1. Explains each concept in simple, clear language\n\
         2. Addresses common misconceptions\n\
         3. Provides practical examples relevant to {subject} work\n\
         4. Includes memory aids and tips\n\
         5. Adds 5 practice questions with detailed explanations\n\
         6. Uses encouraging, supportive tone\n\
         \n\
         Focus on helping them understand these specific topics better.",
        topics = topics.join(", "),
    )
}

/// The user turn sent alongside [`build_study_prompt`].
pub const STUDY_PROMPT_USER_TURN: &str = "Generate personalized study guide";

/// Title of the rendered study guide.
pub fn document_title(student_id: &str) -> String {
    format!("Personalized Study Guide - {student_id}")
}

/// `Study_Guide_{local-part}.{ext}`; the whole id is used when it has no `@`.
pub fn attachment_filename(student_id: &str, extension: &str) -> String {
    let local = student_id.split('@').next().unwrap_or(student_id);
    format!("Study_Guide_{local}.{extension}")
}

/// Fixed parts of an outgoing email.
#[derive(Debug, Clone)]
pub struct MessageTemplate<'a> {
    /// Course name shown in subject and body.
    pub subject: &'a str,
    /// Signature line.
    pub sender_name: &'a str,
}

impl MessageTemplate<'_> {
    pub fn email_subject(&self) -> String {
        format!("📚 Your Personalized Study Guide - {}", self.subject)
    }

    pub fn plain_body(&self, performance: &StudentPerformance, questions: &[String]) -> String {
        let topics = if questions.is_empty() {
            "- Personalized to your recent attempt".to_string()
        } else {
            questions
                .iter()
                .map(|q| format!("- {q}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "Hi Student,\n\n\
             You recently completed the {subject} assessment.\n\n\
             YOUR RESULTS:\n\
             Score: {score} ({percentage}%)\n\
             Status: Needs Improvement\n\n\
             We've analyzed your performance and attached a personalized study guide to help you revisit the areas that need attention.\n\
             Topics highlighted for revision:\n\
             {topics}\n\n\
             Review the attached guide before your next attempt to make the best progress.\n\n\
             Best regards,\n\
             {sender}",
            subject = self.subject,
            score = performance.score_label(),
            percentage = performance.display_percentage(),
            sender = self.sender_name,
        )
    }

    pub fn html_body(
        &self,
        performance: &StudentPerformance,
        questions: &[String],
        attachment_name: &str,
    ) -> String {
        let items = questions
            .iter()
            .map(|q| format!("<li>{}</li>", escape_html(q)))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"<div style="background-color: #f8f9fa; padding: 20px; border-radius: 5px; margin: 20px 0;">
    <h3 style="color: #2c3e50; margin-top: 0;">📊 YOUR RESULTS:</h3>
    <p style="font-size: 18px;"><strong>Score:</strong> {score} ({percentage}%)</p>
    <p style="color: #e74c3c;"><strong>Status:</strong> Needs Improvement</p>
</div>
<p>We've analyzed your performance and created a personalized study guide to help you master the concepts you found challenging.</p>
<div style="background-color: #fff3cd; padding: 15px; border-left: 4px solid #ffc107; margin: 20px 0;">
    <h4 style="color: #856404; margin-top: 0;">⚠️ TOPICS YOU STRUGGLED WITH:</h4>
    <ul style="color: #856404;">
{items}
    </ul>
</div>
<div style="background-color: #d4edda; padding: 15px; border-radius: 5px; margin: 20px 0;">
    <h4 style="color: #155724; margin-top: 0;">📎 ATTACHED: {attachment}</h4>
    <p style="color: #155724; margin-bottom: 10px;"><strong>This guide includes:</strong></p>
    <ul style="color: #155724;">
        <li>Clear explanations of each topic</li>
        <li>Practical examples for {subject} work</li>
        <li>Memory tips and tricks</li>
        <li>Practice questions with answers</li>
    </ul>
</div>
<p style="background-color: #e3f2fd; padding: 10px; border-left: 4px solid #2196f3; margin: 20px 0;">
    <strong>💡 TIP:</strong> Review this guide before your next attempt!
</p>
<p style="margin-top: 30px;">Best regards,<br><strong>{sender}</strong></p>"#,
            score = performance.score_label(),
            percentage = performance.display_percentage(),
            attachment = escape_html(attachment_name),
            subject = escape_html(self.subject),
            sender = escape_html(self.sender_name),
        )
    }

    /// Compose the full message for a student and their rendered guide.
    pub fn compose(
        &self,
        performance: &StudentPerformance,
        failed_questions: &[String],
        document: RenderedDocument,
    ) -> EmailMessage {
        let questions: Vec<String> = failed_questions
            .iter()
            .take(MAX_LISTED_QUESTIONS)
            .map(|q| clean_question_text(q))
            .collect();
        // Ids are grouped verbatim; the address itself must not carry padding.
        let recipient = performance.student_id.trim();
        let filename = attachment_filename(recipient, &document.extension);

        EmailMessage {
            to: recipient.to_string(),
            subject: self.email_subject(),
            plain_body: self.plain_body(performance, &questions),
            html_body: self.html_body(performance, &questions, &filename),
            attachment: Attachment {
                filename,
                content_type: document.content_type,
                bytes: document.bytes,
            },
        }
    }
}

/// Minimal HTML escaping for text placed inside element content.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn performance() -> StudentPerformance {
        StudentPerformance {
            student_id: "asha.k@example.org".into(),
            total_marks: 2.0,
            total_questions: 10,
            percentage: 20.0,
        }
    }

    fn template() -> MessageTemplate<'static> {
        MessageTemplate {
            subject: "Front Desk Associate",
            sender_name: "Tata Strive Learning Team",
        }
    }

    fn document() -> RenderedDocument {
        RenderedDocument {
            bytes: b"<html></html>".to_vec(),
            content_type: "text/html".into(),
            extension: "html".into(),
        }
    }

    #[test]
    fn attachment_name_uses_local_part() {
        assert_eq!(
            attachment_filename("asha.k@example.org", "pdf"),
            "Study_Guide_asha.k.pdf"
        );
        assert_eq!(attachment_filename("s-104", "html"), "Study_Guide_s-104.html");
    }

    #[test]
    fn padded_student_id_is_trimmed_for_the_recipient() {
        let perf = StudentPerformance {
            student_id: " asha.k@example.org ".into(),
            ..performance()
        };
        let msg = template().compose(&perf, &["Q1?".to_string()], document());
        assert_eq!(msg.to, "asha.k@example.org");
        assert_eq!(msg.attachment.filename, "Study_Guide_asha.k.html");
    }

    #[test]
    fn compose_lists_at_most_five_cleaned_questions() {
        let failed: Vec<String> = (1..=7).map(|i| format!("<p>Question {i}?</p>")).collect();
        let msg = template().compose(&performance(), &failed, document());

        assert_eq!(msg.to, "asha.k@example.org");
        assert_eq!(
            msg.subject,
            "📚 Your Personalized Study Guide - Front Desk Associate"
        );
        assert!(msg.plain_body.contains("Score: 2/10 (20%)"));
        assert!(msg.plain_body.contains("Status: Needs Improvement"));
        assert!(msg.plain_body.contains("- Question 5?"));
        assert!(!msg.plain_body.contains("Question 6?"));
        assert!(!msg.plain_body.contains("<p>"));
        assert_eq!(msg.html_body.matches("<li>Question").count(), 5);
        assert!(msg.html_body.contains("ATTACHED: Study_Guide_asha.k.html"));
        assert_eq!(msg.attachment.filename, "Study_Guide_asha.k.html");
        assert_eq!(msg.attachment.content_type, "text/html");
    }

    #[test]
    fn empty_question_list_has_fallback_line() {
        let body = template().plain_body(&performance(), &[]);
        assert!(body.contains("- Personalized to your recent attempt"));
        assert!(body.ends_with("Tata Strive Learning Team"));
    }

    #[test]
    fn prompt_mentions_everything_the_model_needs() {
        let prompt = build_study_prompt(
            "Front Desk Associate",
            "a@x.com",
            &["Front Desk Associate hotel definition and types".into()],
            &["What is a hotel?".into()],
            "A hotel is an establishment providing lodging.",
        );
        assert!(prompt.contains("Student: a@x.com"));
        assert!(prompt.contains("Topics they struggled with: Front Desk Associate hotel"));
        assert!(prompt.contains("- What is a hotel?"));
        assert!(prompt.contains("A hotel is an establishment providing lodging."));
    }

    #[test]
    fn html_escaping() {
        assert_eq!(escape_html("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }
}
