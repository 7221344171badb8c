//! HTML mail templates
//!
//! Every user-supplied value is escaped before it is placed in markup.

use std::fmt::Write;

use super::Notification;
use crate::domain::{Contact, Paper};

const CELL: &str = "padding:8px;border:1px solid #e2e8f0;vertical-align:top";

/// Escape text for inclusion in HTML element content or attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn row(out: &mut String, label: &str, value_html: &str) {
    let _ = write!(
        out,
        "<tr><td style=\"{CELL};font-weight:bold\">{}</td><td style=\"{CELL}\">{}</td></tr>",
        escape_html(label),
        value_html
    );
}

fn contact_html(contact: &Contact) -> String {
    format!(
        "{}<br/>{}<br/>{}<br/>{}",
        escape_html(&contact.full_name),
        escape_html(&contact.email),
        escape_html(&contact.phone),
        escape_html(&contact.affiliation)
    )
}

/// Detail table shared by all paper mails
fn paper_details(paper: &Paper) -> String {
    let mut out = String::from(
        "<table style=\"width:100%;border-collapse:collapse;font-family:Roboto,Verdana,sans-serif;font-size:14px\"><tbody>",
    );

    row(&mut out, "Title", &escape_html(&paper.content.title));
    row(&mut out, "Abstract", &escape_html(&paper.content.abstract_text));
    row(&mut out, "Keywords", &escape_html(&paper.content.keywords.join(", ")));
    row(&mut out, "Version", &paper.version.to_string());
    row(
        &mut out,
        "Submission Date",
        &paper.submitted_at.format("%d %b %Y").to_string(),
    );
    row(&mut out, "Status", paper.status().as_str());
    row(
        &mut out,
        "Reviewer Status",
        paper.reviewer_status().map(|s| s.as_str()).unwrap_or("-"),
    );
    row(&mut out, "Point of Contact", &contact_html(&paper.content.point_of_contact));

    let contributors = paper
        .content
        .contributors
        .iter()
        .map(contact_html)
        .collect::<Vec<_>>()
        .join("<hr/>");
    row(&mut out, "Contributors", &contributors);

    out.push_str("</tbody></table>");
    out
}

fn download_link(paper: &Paper) -> String {
    format!(
        "<p style=\"margin-top:20px\"><a href=\"{}\" style=\"background-color:#0f172a;color:#ffffff;padding:10px 20px;border-radius:5px;text-decoration:none;display:inline-block\">Download Paper</a></p>",
        escape_html(paper.files.manuscript.as_str())
    )
}

fn page(heading: &str, intro_html: &str, paper: &Paper) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><body><h2>{}</h2><p>{}</p>{}{}</body></html>",
        escape_html(heading),
        intro_html,
        paper_details(paper),
        download_link(paper)
    )
}

/// Confirmation sent to the author, contributors and editorial office
pub fn submission_confirmation(paper: &Paper, to: Vec<String>) -> Notification {
    let intro = format!(
        "Your paper <strong>{}</strong> has been received and is awaiting reviewer allocation.",
        escape_html(&paper.content.title)
    );

    Notification {
        to,
        subject: format!("Paper submitted successfully: {}", paper.content.title),
        html: page("Paper Submission Confirmation", &intro, paper),
    }
}

/// Review request sent to a newly assigned reviewer
pub fn reviewer_assignment(paper: &Paper, reviewer_name: &str, to: Vec<String>) -> Notification {
    let intro = format!(
        "Dear {}, you have been assigned to review the paper <strong>{}</strong>. Please accept or decline the assignment.",
        escape_html(reviewer_name),
        escape_html(&paper.content.title)
    );

    Notification {
        to,
        subject: format!("New paper assigned for review: {}", paper.content.title),
        html: page("Reviewer Allocation Notification", &intro, paper),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlobRef, PaperContent, PaperFiles, WorkflowState};
    use chrono::Utc;
    use uuid::Uuid;

    fn paper(title: &str) -> Paper {
        let contact = Contact {
            full_name: "Leslie <Lamport>".into(),
            email: "leslie@example.org".into(),
            phone: "+1 650 000 0000".into(),
            affiliation: "SRI & Co".into(),
        };
        Paper {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            content: PaperContent {
                title: title.into(),
                abstract_text: "a".repeat(400),
                keywords: vec!["clocks".into(), "ordering".into()],
                contributors: vec![contact.clone()],
                point_of_contact: contact,
            },
            files: PaperFiles {
                manuscript: BlobRef("http://localhost:8080/files/papers/p.pdf?a=1&b=2".into()),
                cover_letter: None,
            },
            state: WorkflowState::Draft,
            version: 1,
            submitted_at: Utc::now(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#39;x&#39;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_submission_mail() {
        let note = submission_confirmation(
            &paper("Time, Clocks, and the <b>Ordering</b> of Events"),
            vec!["leslie@example.org".into()],
        );

        assert_eq!(note.subject, "Paper submitted successfully: Time, Clocks, and the <b>Ordering</b> of Events");
        assert!(note.html.contains("the &lt;b&gt;Ordering&lt;/b&gt; of Events"));
        assert!(!note.html.contains("<b>Ordering"));
        assert!(note.html.contains("Leslie &lt;Lamport&gt;"));
        assert!(note.html.contains("SRI &amp; Co"));
        assert!(note.html.contains("clocks, ordering"));
        assert!(note.html.contains("UPLOAD"));
        assert!(note.html.contains("p.pdf?a=1&amp;b=2"));
    }

    #[test]
    fn test_assignment_mail() {
        let note = reviewer_assignment(&paper("Byzantine Generals Problem"), "Nancy", vec!["n@example.org".into()]);
        assert_eq!(note.subject, "New paper assigned for review: Byzantine Generals Problem");
        assert!(note.html.contains("Dear Nancy"));
        assert_eq!(note.to, vec!["n@example.org"]);
    }
}
