//! Glue between `validator` derives on request bodies and `ApiError`.
//! A failed check is a `BadRequest` naming the offending field.

use std::borrow::Cow;

use validator::{Validate, ValidateEmail, ValidateLength, ValidationError, ValidationErrors};

use crate::error::ApiError;
use crate::models::{NewThread, UpdateUser};

/// Errors raised by struct-level checks land under this key.
const STRUCT_LEVEL: &str = "__all__";

/// Path segment naming a user, checked with the same rule as body nicknames.
#[derive(Debug, Validate)]
struct Nickname {
    #[validate(length(min = 3, max = 32, message = "must be 3 to 32 characters long"))]
    nickname: String,
}

pub fn nickname(value: &str) -> Result<(), ApiError> {
    Nickname { nickname: value.to_string() }.validate()?;
    Ok(())
}

fn field_error(field: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(field);
    err.message = Some(Cow::Borrowed(message));
    err
}

pub(crate) fn present_profile_fields(upd: &UpdateUser) -> Result<(), ValidationError> {
    if !upd.fullname.is_empty() && !upd.fullname.validate_length(Some(3), Some(32), None) {
        return Err(field_error("fullname", "must be 3 to 32 characters long"));
    }
    if !upd.email.is_empty() {
        if !upd.email.validate_email() {
            return Err(field_error("email", "is not a valid address"));
        }
        if !upd.email.validate_length(None, Some(64), None) {
            return Err(field_error("email", "must be at most 64 characters long"));
        }
    }
    Ok(())
}

/// An empty slug means "no slug".
pub(crate) fn present_thread_slug(new: &NewThread) -> Result<(), ValidationError> {
    match new.slug.as_deref() {
        Some(slug) if !slug.is_empty() && !slug.validate_length(Some(3), Some(64), None) => {
            Err(field_error("slug", "must be 3 to 64 characters long"))
        }
        _ => Ok(()),
    }
}

fn describe(field: &str, err: &ValidationError) -> String {
    let name = if field == STRUCT_LEVEL { err.code.as_ref() } else { field };
    match &err.message {
        Some(message) => format!("{name} {message}"),
        None => format!("{name} is invalid"),
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        let detail = fields
            .into_iter()
            .flat_map(|(field, errs)| errs.iter().map(move |e| describe(field, e)))
            .collect::<Vec<_>>()
            .join("; ");
        ApiError::BadRequest(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPost, NewUser, Vote};

    fn new_user(fullname: &str, email: &str) -> NewUser {
        NewUser { fullname: fullname.into(), email: email.into(), about: String::new() }
    }

    fn rejected<T: Validate>(body: &T) -> String {
        match body.validate().map_err(ApiError::from) {
            Err(ApiError::BadRequest(detail)) => detail,
            other => panic!("expected a bad request, got {other:?}"),
        }
    }

    #[test]
    fn user_fields() {
        assert!(new_user("Alice", "alice@example.org").validate().is_ok());
        assert_eq!(rejected(&new_user("Al", "alice@example.org")), "fullname must be 3 to 32 characters long");
        for bad in ["alice", "@example.org", "a@x..org", "a@-x-.org", "<script>@x.org", "a@x.o,rg", "a(b)@x.org", "al ice@example.org"] {
            assert_eq!(rejected(&new_user("Alice", bad)), "email is not a valid address", "{bad} accepted");
        }
    }

    #[test]
    fn update_checks_only_present_fields() {
        assert!(UpdateUser::default().validate().is_ok());
        let upd = UpdateUser { email: "nope".into(), ..Default::default() };
        let err = ApiError::from(upd.validate().unwrap_err());
        assert_eq!(err.to_string(), "Wrong request data: email is not a valid address");
        let upd = UpdateUser { fullname: "Al".into(), ..Default::default() };
        assert_eq!(rejected(&upd), "fullname must be 3 to 32 characters long");
    }

    #[test]
    fn thread_slug_is_optional_but_bounded() {
        let mut t = NewThread {
            title: "t".into(),
            author: "alice".into(),
            message: "m".into(),
            slug: Some(String::new()),
            created: None,
        };
        assert!(t.validate().is_ok());
        t.slug = Some("ab".into());
        assert_eq!(rejected(&t), "slug must be 3 to 64 characters long");
        t.slug = None;
        t.message = String::new();
        assert_eq!(rejected(&t), "message is required");
    }

    #[test]
    fn lengths_count_characters() {
        assert!(nickname("ёжик").is_ok());
        assert!(nickname(&"x".repeat(33)).is_err());
        assert!(Vote { nickname: "al".into(), voice: 1 }.validate().is_err());
        let drafts = [
            NewPost { author: "alice".into(), message: "m".into(), parent: 0 },
            NewPost { author: "al".into(), message: "m".into(), parent: 0 },
        ];
        assert!(drafts[..1].iter().try_for_each(Validate::validate).is_ok());
        assert!(drafts.iter().try_for_each(Validate::validate).is_err());
    }
}
