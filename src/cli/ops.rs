use crate::core::panel::{CATALOG, FieldKind, FieldSpec, OperationKind, catalog};
use crate::core::terminal::{GuideSection, print_error};

fn describe(field: &FieldSpec) -> String {
    let kind = match field.kind {
        FieldKind::Snowflake => "id".to_string(),
        FieldKind::UserId => format!("id or {}, default {}", catalog::SELF_USER_ID, catalog::SELF_USER_ID),
        FieldKind::WebhookUrl => "webhook url".to_string(),
        FieldKind::Count { min, max, default } => format!("{}-{}, default {}", min, max, default),
        FieldKind::Delay { default_ms } => format!("ms, default {}", default_ms),
        FieldKind::Flag { default } => format!("true/false, default {}", default),
        FieldKind::Text => "text".to_string(),
        FieldKind::Choice { options, default } => {
            format!("{}, default {}", options.join("|"), default)
        }
        FieldKind::Size { options, default } => {
            let options: Vec<_> = options.iter().map(u64::to_string).collect();
            format!("{}, default {}", options.join("|"), default)
        }
    };
    let required = if field.required { ", required" } else { "" };
    format!("{} ({}{})", field.label, kind, required)
}

fn print_operation(op: &OperationKind) {
    let mut section = GuideSection::new(&format!("{} ({})", op.title, op.name));
    for field in op.fields {
        section = section.command(&format!("--{}", field.name), &describe(field));
    }
    if op.fields.is_empty() {
        section = section.text("No fields; uses the active token.");
    }
    section = section.blank();
    section = match op.channel {
        Some(channel) => section.status("Log channel", channel),
        None => section.status("Log channel", "none"),
    };
    if let Some(session) = op.session {
        section = section.text(&format!(
            "Stays live after starting; Ctrl+C sends {}.",
            session.stop_command
        ));
    } else if op.cancel_command.is_some() {
        section = section.text("Ctrl+C asks the backend to stop.");
    }
    section.print();
    println!();
}

pub fn run_ops_command(args: &[String]) {
    if let Some(name) = args.get(2) {
        match catalog::find(name) {
            Some(op) => print_operation(op),
            None => print_error(&format!("Unknown operation: {}", name)),
        }
        return;
    }

    let mut section = GuideSection::new("Operations");
    for op in CATALOG {
        section = section.command(op.name, op.title);
    }
    section
        .blank()
        .hint("tokendeck ops bulk-delete", "show the fields of one operation")
        .print();
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_marks_required_fields() {
        let op = catalog::find("bulk-delete").unwrap();
        assert_eq!(
            describe(op.field("channel").unwrap()),
            "Channel ID (id, required)"
        );
        assert_eq!(
            describe(op.field("delay").unwrap()),
            "Delay (ms) (ms, default 1000)"
        );
    }

    #[test]
    fn describe_lists_numeric_choices() {
        let op = catalog::find("grab-avatar").unwrap();
        assert_eq!(
            describe(op.field("size").unwrap()),
            "Size (128|256|512|1024|2048, default 512)"
        );
        assert_eq!(
            describe(op.field("user").unwrap()),
            "User ID (id or @me, default @me)"
        );
    }
}
