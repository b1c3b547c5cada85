//! Markdown report rendering for dispatched batches.
//!
//! Entity fields in the tagging log are stored as `Name [ID], Name [ID]`
//! strings; the renderer parses them back out and embeds CRM profile links
//! so the recipient can jump straight to a contact or company.

use std::collections::HashMap;

/// A parsed entity reference from a `Name [ID]` cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    pub id: String,
}

/// Entity kind, which determines the CRM profile URL shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Contact,
    Company,
}

/// Parse a `Name [ID], Name [ID]` string into entities.
///
/// Names may themselves contain spaces; an entry without a bracketed
/// numeric id is kept with an empty id so the name still renders.
pub fn parse_entities(cell: &str) -> Vec<Entity> {
    let mut out = Vec::new();
    for part in cell.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match split_bracketed_id(part) {
            Some((name, id)) => out.push(Entity {
                name: name.to_string(),
                id: id.to_string(),
            }),
            None => out.push(Entity {
                name: part.to_string(),
                id: String::new(),
            }),
        }
    }
    out
}

/// Split `"Jane Doe [123]"` into `("Jane Doe", "123")` when the trailing
/// bracket group is numeric.
fn split_bracketed_id(part: &str) -> Option<(&str, &str)> {
    let part = part.strip_suffix(']')?;
    let open = part.rfind('[')?;
    let id = &part[open + 1..];
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((part[..open].trim_end(), id))
}

/// Render entities as a comma-separated list of markdown CRM links.
/// Entities without an id render as bare names.
pub fn format_entities_with_links(entities: &[Entity], kind: EntityKind, portal_id: &str) -> String {
    entities
        .iter()
        .map(|e| {
            if e.id.is_empty() {
                e.name.clone()
            } else {
                let path = match kind {
                    EntityKind::Contact => "contact",
                    EntityKind::Company => "company",
                };
                format!(
                    "[{}](https://app.hubspot.com/contacts/{}/{}/{})",
                    e.name, portal_id, path, e.id
                )
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render one merged-log record as a report section
fn render_record(record: &HashMap<String, String>, index: usize, portal_id: &str) -> String {
    let get = |col: &str| record.get(col).map(String::as_str).unwrap_or("");

    let file_id = get("gd_transcript_file_id");
    let title = match get("transcript_title") {
        "" => "Untitled Transcript",
        t => t,
    };
    // Markdown needs two trailing spaces to keep intra-item line breaks
    let action_items = get("action_items").replace('\n', "  \n");

    let drive_link = if file_id.is_empty() {
        "#".to_string()
    } else {
        format!("https://drive.google.com/file/d/{}/view?usp=sharing", file_id)
    };

    let who_recorded = parse_entities(get("who_recorded"));
    let who_recorded_link = if who_recorded.is_empty() {
        get("who_recorded").to_string()
    } else {
        format_entities_with_links(&who_recorded[..1], EntityKind::Contact, portal_id)
    };

    let contacts_linked = parse_entities(get("contacts_linked"));
    let companies_linked = parse_entities(get("companies_linked"));
    let contacts_created = parse_entities(get("contacts_created"));
    let companies_created = parse_entities(get("companies_created"));

    format!(
        "### Transcript {index}: [{title}]({drive_link})\n\n\
         **Who Recorded:** {who}  \n\
         **Datetime Uploaded:** {uploaded}  \n\n\
         **Existing Contacts Linked:** {cl}  \n\
         **Existing Companies Linked:** {col}  \n\
         **New Contacts Linked:** {cc}  \n\
         **New Companies Linked:** {coc}  \n\n\
         **Action Items:**  \n{actions}\n\n---\n",
        index = index,
        title = title,
        drive_link = drive_link,
        who = who_recorded_link,
        uploaded = get("datetime_uploaded"),
        cl = format_entities_with_links(&contacts_linked, EntityKind::Contact, portal_id),
        col = format_entities_with_links(&companies_linked, EntityKind::Company, portal_id),
        cc = format_entities_with_links(&contacts_created, EntityKind::Contact, portal_id),
        coc = format_entities_with_links(&companies_created, EntityKind::Company, portal_id),
        actions = action_items,
    )
}

/// Render a whole batch of merged-log records into one markdown document.
/// The batch has no size limit: one report covers arbitrarily many records.
pub fn render_report(records: &[HashMap<String, String>], portal_id: &str) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        out.push_str(&render_record(record, i + 1, portal_id));
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entities() {
        let entities = parse_entities("Jane Doe [101], Acme Corp [202]");
        assert_eq!(
            entities,
            vec![
                Entity {
                    name: "Jane Doe".into(),
                    id: "101".into()
                },
                Entity {
                    name: "Acme Corp".into(),
                    id: "202".into()
                },
            ]
        );
    }

    #[test]
    fn test_parse_entities_without_id() {
        let entities = parse_entities("Unknown Person");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Unknown Person");
        assert!(entities[0].id.is_empty());
    }

    #[test]
    fn test_parse_entities_empty() {
        assert!(parse_entities("").is_empty());
        assert!(parse_entities(" , ").is_empty());
    }

    #[test]
    fn test_format_contact_links() {
        let entities = parse_entities("Jane Doe [101]");
        let rendered = format_entities_with_links(&entities, EntityKind::Contact, "987");
        assert_eq!(
            rendered,
            "[Jane Doe](https://app.hubspot.com/contacts/987/contact/101)"
        );
    }

    #[test]
    fn test_render_report_sections() {
        let mut record = HashMap::new();
        record.insert("gd_transcript_file_id".to_string(), "F1".to_string());
        record.insert("transcript_title".to_string(), "Kickoff Call".to_string());
        record.insert("who_recorded".to_string(), "Jane Doe [101]".to_string());
        record.insert("action_items".to_string(), "follow up\nsend deck".to_string());

        let body = render_report(&[record], "987");
        assert!(body.contains("### Transcript 1: [Kickoff Call]"));
        assert!(body.contains("drive.google.com/file/d/F1"));
        assert!(body.contains("[Jane Doe](https://app.hubspot.com/contacts/987/contact/101)"));
        assert!(body.contains("follow up  \nsend deck"));
    }

    #[test]
    fn test_render_report_untitled_fallback() {
        let record = HashMap::new();
        let body = render_report(&[record], "987");
        assert!(body.contains("Untitled Transcript"));
        assert!(body.contains("](#)"));
    }
}
