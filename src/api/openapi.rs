use super::{
    error::{ErrorBody, ErrorResponse},
    handlers::{auth, health},
};
use utoipa::{
    openapi::{Contact, License, OpenApi as OpenApiDoc},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(health::health, auth::current_user, auth::session_token),
    components(schemas(
        health::Health,
        auth::CurrentUser,
        auth::SessionToken,
        ErrorResponse,
        ErrorBody
    )),
    tags(
        (name = "health", description = "Service and account store health"),
        (name = "auth", description = "API key, login, session and second-factor checks")
    )
)]
pub struct ApiDoc;

/// The `OpenAPI` document with info taken from Cargo metadata.
#[must_use]
pub fn openapi() -> OpenApiDoc {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = cargo_license();
    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `:` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(':').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    let Some(start) = author.find('<') else {
        let name = author.trim();
        return (Some(name).filter(|name| !name.is_empty()), None);
    };
    let name = author[..start].trim();
    let email = author[start + 1..].trim_end_matches('>').trim();
    (
        Some(name).filter(|name| !name.is_empty()),
        Some(email).filter(|email| !email.is_empty()),
    )
}
