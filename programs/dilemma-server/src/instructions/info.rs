//! "info" messages: subject id, profile, questionnaire answers

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::Context;
use crate::error::ServerError;
use crate::protocol::{parse_keys, parse_subject_id, plain_text, truthy, InfoKey};
use crate::state::Session;

pub fn handle(
    ctx: &mut Context,
    slot: &mut Option<Session>,
    data: &Map<String, Value>,
) -> Result<(), ServerError> {
    let keys = parse_keys(data, InfoKey::parse)?;

    if let Some((_, value)) = keys.iter().find(|(key, _)| *key == InfoKey::Sid) {
        set_subject(ctx, slot, value)?;
    }
    let Some(session) = slot.as_mut() else {
        warn!(conn = ?ctx.conn, "ignoring info message until the subject id is set");
        return Ok(());
    };
    let subject = session.subject_id;

    let mut terminate = false;
    for (key, value) in keys {
        match key {
            InfoKey::Sid => {}
            InfoKey::Terminate => {
                let success = truthy(value);
                ctx.audit.info(subject, "terminate", &success.to_string());
                if success {
                    info!(subject, "experiment was a success, resetting");
                } else {
                    info!(subject, "experiment failed, resetting");
                }
                terminate = true;
                break;
            }
            InfoKey::ClientType => ctx.identify(value),
            InfoKey::Name => {
                let name = plain_text(value);
                ctx.audit.info(subject, "name", &name);
                info!(subject, %name, "subject name set");
                session.profile.name = Some(name);
            }
            InfoKey::Avatar => {
                let avatar = plain_text(value);
                ctx.audit.info(subject, "avatar", &avatar);
                info!(subject, %avatar, "subject avatar set");
                session.profile.avatar = Some(avatar);
            }
            InfoKey::Gender => {
                let is_female = parse_gender(value);
                ctx.audit.info(subject, "gender", &is_female.to_string());
                info!(subject, is_female, "subject gender set");
                session.profile.is_female = Some(is_female);
            }
            InfoKey::Form(key) => ctx.audit.info(subject, &key, &plain_text(value)),
        }
    }

    if terminate {
        *slot = None;
    }
    Ok(())
}

fn set_subject(
    ctx: &mut Context,
    slot: &mut Option<Session>,
    value: &Value,
) -> Result<(), ServerError> {
    let requested = parse_subject_id(value)?;
    if let Some(session) = slot.as_ref() {
        if session.subject_id == requested {
            return Ok(());
        }
        return Err(ServerError::SubjectMismatch {
            active: session.subject_id,
            requested,
        });
    }
    *slot = Some(Session::new(requested));
    info!(subject = requested, conn = ?ctx.conn, "subject id set, starting experiment");
    Ok(())
}

/// `true` for female; accepts booleans, numbers and "female"/"male"
fn parse_gender(value: &Value) -> bool {
    match value.as_str().map(|s| s.trim().to_ascii_lowercase()) {
        Some(text) if text == "female" || text == "f" => true,
        Some(text) if text == "male" || text == "m" => false,
        _ => truthy(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_gender() {
        assert!(parse_gender(&json!(true)));
        assert!(parse_gender(&json!("female")));
        assert!(parse_gender(&json!(1)));
        assert!(!parse_gender(&json!("Male")));
        assert!(!parse_gender(&json!(false)));
        assert!(!parse_gender(&json!(0)));
    }
}
